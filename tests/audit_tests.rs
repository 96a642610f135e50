//! # Audit Recorder Tests / 审计记录器测试
//!
//! Drives the recorder through the engine (with a fake runner) and checks the
//! outline numbering, the flushed `audit.jsonl`, the Markdown document with its
//! overall banner, the live status snapshot and the HTML renderer.
//!
//! 通过引擎（使用假运行器）驱动记录器，检查大纲编号、刷新的 `audit.jsonl`、
//! 带总体结果标识的 Markdown 文档、实时状态快照以及 HTML 渲染器。

mod common;

use common::{FakeRunner, store};
use sat_runner::audit::document::{RESULT_PLACEHOLDER, banner, toc_line};
use sat_runner::audit::recorder::{AUDIT_LOG_FILE, REPORT_FILE};
use sat_runner::audit::{AuditNode, AuditObserver, AuditRecorder, ReportRenderer};
use sat_runner::core::env::EnvCtx;
use sat_runner::core::execution::{Engine, RunTarget};
use sat_runner::core::models::{ExecResult, NodeKind, NodeState, TestStep};
use sat_runner::reporting::HtmlRenderer;
use sat_runner::runner::Runners;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

const DEFINITIONS: &str = r#"
[[groups]]
id = "g"
name = "Power"
description = "Power-on checks"
cases = ["c1", "c2", "off"]

[[cases]]
id = "c1"
name = "Wake up"
init_step = "s1"
sequence = [{ step = "s2", sequence = 1 }]

[[cases]]
id = "c2"
name = "Sleep"
sequence = [{ step = "s3", sequence = 1 }]

[[cases]]
id = "off"
name = "Disabled case"
enabled = false

[[steps]]
id = "s1"
name = "Prepare"
command_type = "script-inline"
command = "true"

[[steps]]
id = "s2"
name = "Wake"
command_type = "script-inline"
command = "true"

[[steps]]
id = "s3"
name = "Sleep"
command_type = "script-inline"
command = "true"
"#;

fn engine(runner: FakeRunner, recorder: Arc<AuditRecorder>) -> Engine {
    Engine::new(
        store(DEFINITIONS),
        EnvCtx::new(),
        Runners::uniform(Arc::new(runner)),
        recorder,
    )
}

fn numbers(roots: &[AuditNode]) -> Vec<String> {
    let mut out = Vec::new();
    for root in roots {
        root.walk(&mut |node| out.push(format!("{} {}", node.status.number, node.status.name)));
    }
    out
}

#[cfg(test)]
mod recorder_tests {
    use super::*;

    #[tokio::test]
    async fn test_nodes_are_numbered_in_outline_order() {
        let dir = tempdir().unwrap();
        let recorder = Arc::new(AuditRecorder::new(dir.path()));
        recorder.start_audit("Outline", None).unwrap();

        engine(FakeRunner::new(), recorder.clone())
            .run(&RunTarget::Group { id: "g".into(), force: false })
            .await;
        let summary = recorder.stop_audit(false, None).unwrap();

        assert_eq!(
            numbers(&summary.document.roots),
            vec![
                "1 Power",
                "1.1 Wake up",
                "1.1.1 Prepare",
                "1.1.2 Wake",
                "1.2 Sleep",
                "1.2.1 Sleep",
                "1.3 Disabled case",
            ]
        );
        let disabled = &summary.document.roots[0].children[2].status;
        assert_eq!(disabled.state, NodeState::Skipped);
        assert_eq!(disabled.kind, NodeKind::Case);
    }

    #[tokio::test]
    async fn test_each_top_level_node_is_flushed_as_one_json_line() {
        let dir = tempdir().unwrap();
        let recorder = Arc::new(AuditRecorder::new(dir.path()));
        recorder.start_audit("Flush", None).unwrap();
        let engine = engine(FakeRunner::new(), recorder.clone());

        engine.run(&RunTarget::Case("c1".into())).await;
        engine.run(&RunTarget::Step("s3".into())).await;

        let log = fs::read_to_string(dir.path().join(AUDIT_LOG_FILE)).unwrap();
        assert_eq!(log.lines().count(), 2);
        let first: AuditNode = serde_json::from_str(log.lines().next().unwrap()).unwrap();
        assert_eq!(first.status.number, "1");
        assert_eq!(first.children.len(), 2);
        assert_eq!(recorder.audit_status().finished_top_level, 2);

        let summary = recorder.stop_audit(false, None).unwrap();
        assert_eq!(numbers(&summary.document.roots)[3], "2 Sleep");
    }

    #[tokio::test]
    async fn test_start_audit_truncates_previous_log() {
        let dir = tempdir().unwrap();
        let recorder = Arc::new(AuditRecorder::new(dir.path()));
        let engine = engine(FakeRunner::new(), recorder.clone());

        recorder.start_audit("First", None).unwrap();
        engine.run(&RunTarget::Step("s1".into())).await;
        recorder.stop_audit(false, None).unwrap();

        recorder.start_audit("Second", None).unwrap();
        let status = recorder.audit_status();
        assert!(status.active);
        assert_eq!(status.title, "Second");
        assert_eq!(status.finished_top_level, 0);
        assert_eq!(fs::read_to_string(recorder.audit_log_path()).unwrap(), "");
    }

    #[tokio::test]
    async fn test_counters_track_step_states_only() {
        let dir = tempdir().unwrap();
        let recorder = Arc::new(AuditRecorder::new(dir.path()));
        recorder.start_audit("Counters", None).unwrap();
        let runner = FakeRunner::new()
            .with_result("s2", ExecResult::fail("no wake"))
            .with_result("s3", ExecResult::neutral("recorded"));

        engine(runner, recorder.clone())
            .run(&RunTarget::Group { id: "g".into(), force: false })
            .await;
        let counters = recorder.audit_status().counters;

        assert_eq!(counters.passed, 1);
        assert_eq!(counters.failed, 1);
        assert_eq!(counters.neutral, 1);
        assert_eq!(counters.total(), 3);
    }

    #[test]
    fn test_status_reports_the_open_chain() {
        let dir = tempdir().unwrap();
        let recorder = AuditRecorder::new(dir.path());
        recorder.start_audit("Live", Some("car-1")).unwrap();
        let step: TestStep = toml::from_str(
            "id = \"s\"\nname = \"Probe\"\ncommand_type = \"script-inline\"\ncommand = \"true\"\n",
        )
        .unwrap();

        let node = recorder.before_step(&step, None, 0);
        let running = recorder.audit_status().running;
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].state, NodeState::Running);
        assert_eq!(running[0].name, "Probe");

        recorder.after_step(node, &ExecResult::pass(), NodeState::Passed, "probe ok\n", 0);
        let status = recorder.audit_status();
        assert!(status.running.is_empty());
        assert_eq!(status.last.unwrap().code, Some(1));
    }
}

#[cfg(test)]
mod document_tests {
    use super::*;

    #[tokio::test]
    async fn test_report_substitutes_overall_banner() {
        let dir = tempdir().unwrap();
        let recorder = Arc::new(AuditRecorder::new(dir.path()));
        recorder.start_audit("Nightly", Some("car-1")).unwrap();

        engine(FakeRunner::new(), recorder.clone())
            .run(&RunTarget::Case("c1".into()))
            .await;
        let summary = recorder.stop_audit(false, None).unwrap();

        let report = fs::read_to_string(dir.path().join(REPORT_FILE)).unwrap();
        assert_eq!(report, summary.document.markdown);
        assert!(summary.passed());
        assert!(report.starts_with("# Nightly\n"));
        assert!(report.contains("**RESULT: PASS**"));
        assert!(!report.contains(RESULT_PLACEHOLDER));
        assert!(report.contains("- Vehicle: car-1"));
        assert!(report.contains("## Contents"));
        assert!(report.contains("  - 1.1 [Step] Prepare ... PASS"));
        assert!(report.contains("```text\nran s2\n```"));
    }

    #[tokio::test]
    async fn test_any_failing_root_means_not_pass() {
        let dir = tempdir().unwrap();
        let recorder = Arc::new(AuditRecorder::new(dir.path()));
        recorder.start_audit("Mixed", None).unwrap();
        let engine = engine(
            FakeRunner::new().with_result("s3", ExecResult::with_code(-5, "stuck awake")),
            recorder.clone(),
        );

        engine.run(&RunTarget::Case("c1".into())).await;
        engine.run(&RunTarget::Case("c2".into())).await;
        let summary = recorder.stop_audit(true, None).unwrap();

        let document = &summary.document;
        assert!(!document.passed);
        assert!(document.stopped);
        assert_eq!(document.banner, "NOT PASS (stopped)");
        assert_eq!(document.overall.code, -5);
        assert!(document.markdown.contains("**RESULT: NOT PASS (stopped)**"));
        assert!(document.markdown.contains("stuck awake"));
    }

    #[tokio::test]
    async fn test_neutral_root_is_not_a_pass() {
        let dir = tempdir().unwrap();
        let recorder = Arc::new(AuditRecorder::new(dir.path()));
        recorder.start_audit("Neutral", None).unwrap();

        engine(FakeRunner::new(), recorder.clone())
            .run(&RunTarget::Case("off".into()))
            .await;
        let summary = recorder.stop_audit(false, None).unwrap();

        assert!(!summary.passed());
        assert_eq!(summary.document.banner, "NOT PASS");
    }

    #[test]
    fn test_empty_audit_is_not_a_pass() {
        let dir = tempdir().unwrap();
        let recorder = AuditRecorder::new(dir.path());
        recorder.start_audit("Empty", None).unwrap();

        let summary = recorder.stop_audit(false, None).unwrap();

        assert!(summary.document.roots.is_empty());
        assert!(!summary.passed());
        assert_eq!(summary.document.overall.code, 0);
    }

    #[test]
    fn test_captured_log_is_kept_verbatim() {
        let dir = tempdir().unwrap();
        let recorder = AuditRecorder::new(dir.path());
        recorder.start_audit("Verbatim", None).unwrap();
        let step: TestStep = toml::from_str(
            "id = \"s\"\nname = \"Dump\"\ncommand_type = \"script-inline\"\ncommand = \"true\"\n",
        )
        .unwrap();
        let log = format!("template {}\n```\nafter fence\n", RESULT_PLACEHOLDER);

        let node = recorder.before_step(&step, None, 0);
        recorder.after_step(node, &ExecResult::pass(), NodeState::Passed, &log, 0);
        let summary = recorder.stop_audit(false, None).unwrap();

        let markdown = &summary.document.markdown;
        assert!(markdown.contains("**RESULT: PASS**"));
        assert!(markdown.contains(&format!("template {}", RESULT_PLACEHOLDER)));
        assert!(markdown.contains("````text\ntemplate"));
        assert!(markdown.contains("after fence\n````\n"));
    }

    #[tokio::test]
    async fn test_stopped_run_is_never_a_pass() {
        let dir = tempdir().unwrap();
        let recorder = Arc::new(AuditRecorder::new(dir.path()));
        recorder.start_audit("Stopped", None).unwrap();

        engine(FakeRunner::new(), recorder.clone())
            .run(&RunTarget::Case("c2".into()))
            .await;
        let summary = recorder.stop_audit(true, None).unwrap();

        assert!(summary.document.roots[0].status.is_pass());
        assert!(!summary.passed());
        assert_eq!(summary.document.banner, "NOT PASS (stopped)");
    }

    #[test]
    fn test_banner_is_binary() {
        assert_eq!(banner(true), "PASS");
        assert_eq!(banner(false), "NOT PASS");
    }

    #[tokio::test]
    async fn test_toc_line_reflects_level_and_verdict() {
        let dir = tempdir().unwrap();
        let recorder = Arc::new(AuditRecorder::new(dir.path()));
        recorder.start_audit("Toc", None).unwrap();
        engine(
            FakeRunner::new().with_result("s2", ExecResult::fail("asleep")),
            recorder.clone(),
        )
        .run(&RunTarget::Case("c1".into()))
        .await;
        let summary = recorder.stop_audit(false, None).unwrap();

        let wake = &summary.document.roots[0].children[1];
        let line = toc_line(&wake.status);
        assert!(line.starts_with("  - 1.2 [Step] Wake ... NOT PASS ("), "{line}");
        assert_eq!(line, wake.toc);
        assert!(wake.detail.starts_with("#### 1.2 Step: Wake"));
        assert!(wake.detail.contains("- State: FAILED (code -1)"));
    }
}

#[cfg(test)]
mod html_tests {
    use super::*;

    #[tokio::test]
    async fn test_html_renderer_writes_nested_sections() {
        let dir = tempdir().unwrap();
        let recorder = Arc::new(AuditRecorder::new(dir.path().join("reports")));
        recorder.start_audit("Html <Audit>", Some("car-1")).unwrap();
        engine(
            FakeRunner::new().with_result("s3", ExecResult::fail("stuck")),
            recorder.clone(),
        )
        .run(&RunTarget::Group { id: "g".into(), force: false })
        .await;

        let output = dir.path().join("html").join("report.html");
        let renderer = HtmlRenderer::new(&output, "en");
        let summary = recorder
            .stop_audit(false, Some(&renderer as &dyn ReportRenderer))
            .unwrap();

        assert_eq!(summary.rendered.as_deref(), Some(output.as_path()));
        let html = fs::read_to_string(&output).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Html &lt;Audit&gt;"));
        assert!(html.contains("NOT PASS"));
        assert!(html.contains("class=\"node failed\" open"));
        assert!(html.contains("class=\"node skipped\""));
        assert!(html.contains("1.2.1"));
        assert!(html.contains("car-1"));
    }
}
