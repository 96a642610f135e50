//! # Console Reporting Module / 控制台报告模块
//!
//! Prints the finished audit as a colour-coded outline followed by the step
//! counters and the overall banner.
//!
//! 以彩色大纲形式打印完成的审计，随后打印步骤计数和总体结果标识。

use colored::*;

use crate::audit::{AuditDocument, AuditNode};
use crate::core::models::{NodeKind, NodeState};
use crate::core::planner::RunPlan;
use crate::infra::t;

/// Prints a formatted summary of an audit document to the console.
///
/// # Output Format / 输出格式
/// ```text
/// --- Audit Summary ---
///   1 [Stand] Bench ... PASSED (3.12s)
///     1.1 [Group] Connectivity ... FAILED (1.02s)
///       1.1.1 [Case] Wi-Fi join ... FAILED (1.02s)
/// ```
pub fn print_summary(document: &AuditDocument) {
    println!("\n{}", t!("summary.banner").bold());

    for root in &document.roots {
        print_node(root);
    }

    let counters = &document.counters;
    println!(
        "\n{}",
        t!(
            "summary.counters",
            passed = counters.passed,
            neutral = counters.neutral,
            failed = counters.failed,
            skipped = counters.skipped,
            aborted = counters.aborted
        )
    );

    let banner = t!("summary.overall", banner = &document.banner);
    if document.passed {
        println!("{}", banner.green().bold());
    } else {
        println!("{}", banner.red().bold());
    }
}

fn print_node(node: &AuditNode) {
    let status = &node.status;
    let elapsed = status
        .elapsed_ms
        .map(|ms| format!("{:.2}s", ms as f64 / 1000.0))
        .unwrap_or_else(|| "N/A".to_string());
    let state = match status.state {
        NodeState::Passed => status.state.as_str().green(),
        NodeState::Neutral | NodeState::Skipped => status.state.as_str().yellow(),
        NodeState::Failed | NodeState::Aborted => status.state.as_str().red(),
        NodeState::Pending | NodeState::Running => status.state.as_str().normal(),
    };
    println!(
        "{}{} [{}] {} ... {} ({})",
        "  ".repeat(status.level + 1),
        status.number,
        status.kind.label(),
        status.name,
        state,
        elapsed
    );
    if status.state == NodeState::Failed && status.kind == NodeKind::Step {
        for line in status.description.lines() {
            println!("{}{}", "  ".repeat(status.level + 3), line.dimmed());
        }
    }
    for child in &node.children {
        print_node(child);
    }
}

/// Prints a dry-run plan.
/// 打印预演计划。
pub fn print_plan(target: &str, plan: &RunPlan) {
    println!("{}", t!("plan.header", target = target).bold());
    println!(
        "  {}",
        t!("plan.counts", groups = plan.groups, cases = plan.cases, steps = plan.steps)
    );
    for disabled in &plan.disabled {
        println!("  {}", t!("plan.disabled", entity = disabled).yellow());
    }
    for missing in &plan.missing {
        println!("  {}", t!("plan.missing", entity = missing).red());
    }
    for cycle in &plan.cycles {
        println!("  {}", t!("plan.cycle", chain = cycle).red());
    }
    if plan.is_clean() {
        println!("{}", t!("plan.clean").green());
    }
}
