//! # Run Command Module / 运行命令模块
//!
//! This module implements the `run` command, which executes a stand, group,
//! case or step against the selected vehicle profile and writes the audit
//! report.
//!
//! 此模块实现 `run` 命令，它针对所选车辆配置执行测试台、测试组、测试用例或测试步骤，
//! 并写出审计报告。

use anyhow::Result;
use colored::*;
use std::{path::PathBuf, sync::Arc};
use tokio::signal;

use crate::{
    audit::{AuditRecorder, NullObserver, ReportRenderer},
    core::{
        config,
        controller::RunController,
        env::EnvCtx,
        execution::Engine,
        planner::{self, Selector},
        store::TomlStore,
    },
    infra::t,
    reporting::{HtmlRenderer, print_summary},
    runner::Runners,
};

/// Arguments of `sat-runner run`.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub config: PathBuf,
    pub defs: PathBuf,
    pub vehicle: Option<String>,
    pub selector: Selector,
    pub html: Option<PathBuf>,
    /// `--lang` was given, so the configured language is ignored.
    pub lang_override: bool,
}

/// Executes the run command. Returns whether the overall verdict is PASS.
pub async fn execute(args: RunArgs) -> Result<bool> {
    let harness = config::load_config(&args.config)?;
    let locale = if args.lang_override {
        rust_i18n::locale().to_string()
    } else {
        crate::init(Some(&harness.language))
    };

    println!(
        "{}",
        t!("run.loading_definitions", path = args.defs.display())
    );
    let store = Arc::new(TomlStore::load(&args.defs)?);
    for dangling in store.dangling_references() {
        eprintln!("{}", t!("run.dangling_reference", entity = dangling).yellow());
    }
    let target = planner::resolve_target(store.as_ref(), &args.selector)?;

    let env = EnvCtx::new();
    let runners = Runners::from_config(&harness)?;
    let engine = Engine::new(store, env.clone(), runners, Arc::new(NullObserver));
    let recorder = Arc::new(AuditRecorder::new(&harness.audit.report_dir));
    let renderer = args
        .html
        .map(|path| Arc::new(HtmlRenderer::new(path, locale.as_str())) as Arc<dyn ReportRenderer>);
    let controller = RunController::new(&engine, recorder, renderer, harness.audit.title.clone());

    setup_signal_handler(env);
    controller.start_audit(target, args.vehicle)?;

    let Some(report) = controller.wait().await? else {
        return Ok(false);
    };

    print_summary(&report.summary.document);
    println!(
        "{}",
        t!("run.report_written", path = report.summary.report_path.display())
    );
    if let Some(html) = &report.summary.rendered {
        println!("{}", t!("run.html_written", path = html.display()).cyan());
    }
    Ok(report.passed())
}

/// Turns Ctrl-C into a cooperative stop request. The run finishes the step in
/// flight and then stops descending.
fn setup_signal_handler(env: EnvCtx) {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            println!("\n{}", t!("shutdown_signal").yellow());
            env.request_stop();
        }
    });
}
