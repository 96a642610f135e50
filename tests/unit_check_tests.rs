//! # Pass Condition Unit Tests / 通过条件单元测试
//!
//! 测试白名单、黑名单、记录模式以及显式结果标记。

use sat_runner::core::env::EnvCtx;
use sat_runner::core::models::{CommandType, ExecResult, PassConditionKind, TestStep};
use sat_runner::runner::check::{
    PATTERN_NOT_SUPPORTED, RECORDED, WHITELIST_NOT_FOUND, check_result, parse_explicit_result,
};

fn step(kind: PassConditionKind, match_list: &[&str]) -> TestStep {
    TestStep {
        id: "s".to_string(),
        name: "s".to_string(),
        description: String::new(),
        enabled: true,
        command_type: CommandType::ScriptInline,
        command: "true".to_string(),
        pass_condition: kind,
        match_list: match_list.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod white_match_tests {
    use super::*;

    #[test]
    fn test_white_match_passes_on_any_entry_case_insensitively() {
        let env = EnvCtx::new();
        let step = step(PassConditionKind::WhiteMatch, &["absent", "ok"]);
        assert_eq!(check_result(&step, "Status: OK\n", &env), ExecResult::pass());
    }

    #[test]
    fn test_white_match_fails_when_nothing_matches() {
        let env = EnvCtx::new();
        let step = step(PassConditionKind::WhiteMatch, &["READY"]);
        assert_eq!(
            check_result(&step, "still booting\n", &env),
            ExecResult::fail(WHITELIST_NOT_FOUND)
        );
    }

    #[test]
    fn test_white_match_with_only_blank_entries_fails() {
        let env = EnvCtx::new();
        let step = step(PassConditionKind::WhiteMatch, &["", "   "]);
        assert!(check_result(&step, "anything", &env).is_fail());
    }

    #[test]
    fn test_entries_are_expanded_through_the_environment() {
        let env = EnvCtx::new();
        env.set("SAT_FW_VERSION", "2.4.1");
        let step = step(PassConditionKind::WhiteMatch, &["version ${SAT_FW_VERSION}"]);

        assert!(check_result(&step, "Version 2.4.1 running", &env).is_pass());
        assert!(check_result(&step, "Version 2.4.0 running", &env).is_fail());
    }
}

#[cfg(test)]
mod black_match_tests {
    use super::*;

    #[test]
    fn test_black_match_fails_on_first_entry_found() {
        let env = EnvCtx::new();
        let step = step(PassConditionKind::BlackMatch, &["timeout", "error"]);
        assert_eq!(
            check_result(&step, "ERROR: bus off, then TIMEOUT", &env),
            ExecResult::fail("blacklist item found: timeout")
        );
    }

    #[test]
    fn test_black_match_passes_when_nothing_matches() {
        let env = EnvCtx::new();
        let step = step(PassConditionKind::BlackMatch, &["error"]);
        assert!(check_result(&step, "all good", &env).is_pass());
    }

    #[test]
    fn test_black_match_with_empty_list_passes() {
        let env = EnvCtx::new();
        let step = step(PassConditionKind::BlackMatch, &[]);
        assert!(check_result(&step, "error everywhere", &env).is_pass());
    }
}

#[cfg(test)]
mod other_kinds_tests {
    use super::*;

    #[test]
    fn test_record_is_always_neutral() {
        let env = EnvCtx::new();
        let step = step(PassConditionKind::Record, &["ignored"]);
        assert_eq!(check_result(&step, "ignored", &env), ExecResult::neutral(RECORDED));
    }

    #[test]
    fn test_unsupported_kind_fails() {
        let env = EnvCtx::new();
        let step = step(PassConditionKind::Unsupported, &[]);
        assert_eq!(
            check_result(&step, "", &env),
            ExecResult::fail(PATTERN_NOT_SUPPORTED)
        );
    }

    #[test]
    fn test_unknown_pass_condition_deserializes_as_unsupported() {
        let step: TestStep = toml::from_str(
            r#"
id = "x"
name = "x"
command_type = "script-inline"
command = "true"
pass_condition = "regex-match"
"#,
        )
        .unwrap();
        assert_eq!(step.pass_condition, PassConditionKind::Unsupported);
    }
}

#[cfg(test)]
mod explicit_result_tests {
    use super::*;

    #[test]
    fn test_explicit_result_with_description() {
        let output = "noise\n@@SAT_RESULT -4 CAN bus silent\n";
        assert_eq!(
            parse_explicit_result(output),
            Some(ExecResult::with_code(-4, "CAN bus silent"))
        );
    }

    #[test]
    fn test_last_explicit_result_wins() {
        let output = "@@SAT_RESULT -1 early\n  @@SAT_RESULT 1\n";
        assert_eq!(parse_explicit_result(output), Some(ExecResult::with_code(1, "")));
    }

    #[test]
    fn test_malformed_or_missing_explicit_result() {
        assert_eq!(parse_explicit_result("@@SAT_RESULT abc text\n"), None);
        assert_eq!(parse_explicit_result("no markers here"), None);
        assert_eq!(parse_explicit_result("@@SAT_RESULTS 2 lookalike\n"), None);
    }
}
