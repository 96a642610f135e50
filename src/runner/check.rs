//! # Pass Condition Module / 通过条件模块
//!
//! Classifies the captured output of a step against its pass condition, and
//! recognises the explicit result a program may report instead.
//!
//! 根据步骤的通过条件对捕获的输出进行分类，并识别程序可能直接报告的显式结果。

use colored::*;

use crate::core::env::EnvCtx;
use crate::core::models::{ExecResult, PassConditionKind, TestStep};
use crate::infra::t;

/// Output marker for an explicit result: `@@SAT_RESULT <code> [description]`.
pub const RESULT_MARKER: &str = "@@SAT_RESULT";

pub const RECORDED: &str = "recorded";
pub const WHITELIST_NOT_FOUND: &str = "whitelist not found";
pub const PATTERN_NOT_SUPPORTED: &str = "check pattern not supported";

/// Evaluates the step's pass condition against `output`.
///
/// Each match-list entry is first expanded through the environment context,
/// then looked up case-insensitively as a substring of the output. Blank
/// entries are ignored.
///
/// | Kind | Rule |
/// |---|---|
/// | Record | always neutral |
/// | WhiteMatch | pass if any entry is found, else fail |
/// | BlackMatch | fail on the first entry found, else pass |
///
/// 根据 `output` 评估步骤的通过条件。
/// 每个匹配条目先通过环境上下文展开，然后以不区分大小写的子串方式在输出中查找。空条目被忽略。
pub fn check_result(step: &TestStep, output: &str, env: &EnvCtx) -> ExecResult {
    let patterns = || -> Vec<String> {
        env.explain_env_in_list(&step.match_list)
            .into_iter()
            .filter(|entry| !entry.trim().is_empty())
            .collect()
    };

    match step.pass_condition {
        PassConditionKind::Record => ExecResult::neutral(RECORDED),
        PassConditionKind::WhiteMatch => {
            let haystack = output.to_uppercase();
            if patterns()
                .iter()
                .any(|entry| haystack.contains(&entry.to_uppercase()))
            {
                ExecResult::pass()
            } else {
                ExecResult::fail(WHITELIST_NOT_FOUND)
            }
        }
        PassConditionKind::BlackMatch => {
            let haystack = output.to_uppercase();
            match patterns()
                .into_iter()
                .find(|entry| haystack.contains(&entry.to_uppercase()))
            {
                Some(entry) => ExecResult::fail(format!("blacklist item found: {}", entry)),
                None => ExecResult::pass(),
            }
        }
        PassConditionKind::Unsupported => ExecResult::fail(PATTERN_NOT_SUPPORTED),
    }
}

/// Finds the explicit result a program reported, if any. When several result
/// lines are printed, the last one wins.
///
/// 查找程序报告的显式结果（如果有）。如果打印了多行结果，以最后一行为准。
pub fn parse_explicit_result(output: &str) -> Option<ExecResult> {
    let mut found = None;
    for line in output.lines() {
        let Some(rest) = line.trim().strip_prefix(RESULT_MARKER) else {
            continue;
        };
        if !rest.starts_with(char::is_whitespace) {
            continue;
        }
        let rest = rest.trim();
        let (code, description) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        match code.parse::<i32>() {
            Ok(code) => found = Some(ExecResult::with_code(code, description.trim())),
            Err(_) => eprintln!(
                "{}",
                t!("runner.malformed_result", line = line.trim()).yellow()
            ),
        }
    }
    found
}
