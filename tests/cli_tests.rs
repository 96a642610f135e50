//! # CLI Integration Tests / CLI 集成测试
//!
//! Runs the `sat-runner` binary end to end inside a scratch workspace with real
//! `sh` scripts and checks exit codes, console output and written reports.
//!
//! 在临时工作区中使用真实的 `sh` 脚本端到端运行 `sat-runner` 可执行文件，
//! 检查退出码、控制台输出和写出的报告。

#![cfg(unix)]

mod common;

use assert_cmd::prelude::*;
use common::Workspace;
use predicates::prelude::*;
use std::fs;
use std::process::Command;

const FAILING_DEFINITIONS: &str = r#"
[[stands]]
id = "bench"
name = "Bench"
groups = ["g"]

[[groups]]
id = "g"
name = "Readiness"
cases = ["c"]

[[cases]]
id = "c"
name = "Ready check"
cleanup_step = "bye"
sequence = [{ step = "ready", sequence = 1 }]

[[steps]]
id = "ready"
name = "Ready"
command_type = "script-file"
command = "ready.sh"
pass_condition = "white-match"
match_list = ["READY"]

[[steps]]
id = "bye"
name = "Bye"
command_type = "script-inline"
command = "echo bye"
"#;

fn sat_runner(ws: &Workspace) -> Command {
    let mut cmd = Command::cargo_bin("sat-runner").unwrap();
    cmd.current_dir(ws.path()).env("NO_COLOR", "1").arg("--lang").arg("en");
    cmd
}

/// Writes the default files through `init`, then points the config at the workspace.
fn initialised_workspace() -> Workspace {
    let ws = Workspace::new();
    sat_runner(&ws)
        .arg("init")
        .arg("--non-interactive")
        .assert()
        .success();
    ws.write_config();
    ws
}

#[cfg(test)]
mod init_tests {
    use super::*;

    #[test]
    fn test_init_writes_config_and_sample_definitions() {
        let ws = Workspace::new();

        sat_runner(&ws)
            .arg("init")
            .arg("--non-interactive")
            .assert()
            .success()
            .stdout(predicate::str::contains("Created"));

        let config = fs::read_to_string(ws.path().join("SatHarness.toml")).unwrap();
        assert!(config.contains("[script]"));
        let defs = fs::read_to_string(ws.path().join("definitions.toml")).unwrap();
        assert!(defs.contains("[[stands]]"));
    }

    #[test]
    fn test_init_keeps_existing_definitions() {
        let ws = Workspace::new();
        ws.write_definitions("# mine\n");

        sat_runner(&ws)
            .args(["init", "--non-interactive", "-o", "conf/SatHarness.toml"])
            .assert()
            .success();

        assert!(ws.path().join("conf/SatHarness.toml").exists());
        assert!(ws.path().join("conf/definitions.toml").exists());
        assert_eq!(fs::read_to_string(ws.path().join("definitions.toml")).unwrap(), "# mine\n");
    }
}

#[cfg(test)]
mod run_tests {
    use super::*;

    #[test]
    fn test_sample_stand_passes() {
        let ws = initialised_workspace();

        sat_runner(&ws)
            .args(["run", "--stand", "bench", "--vehicle", "demo"])
            .assert()
            .success()
            .stdout(predicate::str::contains("RESULT: PASS"))
            .stdout(predicate::str::contains("1.1.1 [Case] Boot check"));

        let report = fs::read_to_string(ws.path().join("reports/report.md")).unwrap();
        assert!(report.contains("**RESULT: PASS**"));
        assert!(report.contains("- Vehicle: demo"));
        assert!(ws.path().join("reports/audit.jsonl").exists());
    }

    #[test]
    fn test_selection_by_name() {
        let ws = initialised_workspace();

        sat_runner(&ws)
            .args(["run", "--case", "Boot check"])
            .assert()
            .success()
            .stdout(predicate::str::contains("1 [Case] Boot check"));
    }

    #[test]
    fn test_failing_run_exits_with_failure() {
        let ws = Workspace::new();
        ws.write_config();
        ws.write_definitions(FAILING_DEFINITIONS);
        ws.write_script("ready.sh", "echo still booting\n");

        sat_runner(&ws)
            .args(["run", "--stand", "bench"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("RESULT: NOT PASS"))
            .stdout(predicate::str::contains("whitelist not found"));
    }

    #[test]
    fn test_html_report_is_written() {
        let ws = Workspace::new();
        ws.write_config();
        ws.write_definitions(FAILING_DEFINITIONS);
        ws.write_script("ready.sh", "echo READY\n");

        sat_runner(&ws)
            .args(["run", "--group", "g", "--force", "--html", "out/audit.html"])
            .assert()
            .success()
            .stdout(predicate::str::contains("HTML report written"));

        let html = fs::read_to_string(ws.path().join("out/audit.html")).unwrap();
        assert!(html.contains("Integration Audit"));
        assert!(html.contains("Ready check"));
    }

    #[test]
    fn test_unknown_target_is_an_error() {
        let ws = Workspace::new();
        ws.write_config();
        ws.write_definitions(FAILING_DEFINITIONS);

        sat_runner(&ws)
            .args(["run", "--stand", "nowhere"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No stand with identity or name 'nowhere'"));
    }

    #[test]
    fn test_target_selection_is_required() {
        let ws = Workspace::new();
        sat_runner(&ws).arg("run").assert().failure();
        sat_runner(&ws)
            .args(["run", "--stand", "a", "--case", "b"])
            .assert()
            .failure();
    }

    #[test]
    fn test_missing_config_is_reported() {
        let ws = Workspace::new();
        ws.write_definitions(FAILING_DEFINITIONS);

        sat_runner(&ws)
            .args(["run", "--stand", "bench", "--config", "absent.toml"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to read harness config"));
    }
}

#[cfg(test)]
mod inspection_tests {
    use super::*;

    #[test]
    fn test_plan_of_sample_is_clean() {
        let ws = initialised_workspace();

        sat_runner(&ws)
            .args(["plan", "--stand", "bench"])
            .assert()
            .success()
            .stdout(predicate::str::contains("1 group(s), 1 case(s), 4 step(s)"))
            .stdout(predicate::str::contains("No missing references or cycles."));
    }

    #[test]
    fn test_plan_with_missing_reference_fails() {
        let ws = Workspace::new();
        ws.write_definitions(
            "[[groups]]\nid = \"g\"\nname = \"G\"\ncases = [\"ghost\"]\n",
        );

        sat_runner(&ws)
            .args(["plan", "--group", "g"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("missing: case 'ghost'"));
    }

    #[test]
    fn test_list_one_level() {
        let ws = initialised_workspace();

        sat_runner(&ws)
            .args(["list", "--level", "steps"])
            .assert()
            .success()
            .stdout(predicate::str::contains("teardown"))
            .stdout(predicate::str::contains("Stands").not());
    }

    #[test]
    fn test_env_shows_vehicle_profile() {
        let ws = initialised_workspace();

        sat_runner(&ws)
            .args(["env", "--vehicle", "demo"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"SAT_VEHICLE_ID\": \"demo\""))
            .stdout(predicate::str::contains("\"REGION\": \"EU\""));
    }
}
