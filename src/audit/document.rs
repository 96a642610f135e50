//! Node tree and document assembly for the audit report.

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::audit::recorder::StepCounters;
use crate::core::models::{ExecResult, NodeKind, NodeState};

/// Token in the document header replaced by the overall banner when the run closes.
pub const RESULT_PLACEHOLDER: &str = "{{SAT_OVERALL_RESULT}}";

/// Machine-readable status of one node.
/// 单个节点的机器可读状态。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Outline number, e.g. `1.2.3`.
    pub number: String,
    pub kind: NodeKind,
    pub name: String,
    pub level: usize,
    pub state: NodeState,
    pub code: Option<i32>,
    pub description: String,
    pub started_at: DateTime<Local>,
    pub elapsed_ms: Option<u64>,
}

impl StatusRecord {
    pub fn is_pass(&self) -> bool {
        self.code.is_some_and(|c| c > 0)
    }
}

/// A finished node: its TOC line, detail block, status, and children.
/// 已完成的节点：目录行、详细信息块、状态和子节点。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditNode {
    pub status: StatusRecord,
    pub toc: String,
    pub detail: String,
    #[serde(default)]
    pub children: Vec<AuditNode>,
}

impl AuditNode {
    /// Visits this node and its descendants in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a AuditNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// Binary summary banner: the summary only distinguishes pass from not-pass.
pub fn banner(passed: bool) -> &'static str {
    if passed { "PASS" } else { "NOT PASS" }
}

fn format_elapsed(elapsed_ms: Option<u64>) -> String {
    elapsed_ms
        .map(|ms| format!("{:.2}s", ms as f64 / 1000.0))
        .unwrap_or_else(|| "N/A".to_string())
}

/// Renders the table-of-contents line of a finished node.
pub fn toc_line(status: &StatusRecord) -> String {
    format!(
        "{}- {} [{}] {} ... {} ({})",
        "  ".repeat(status.level),
        status.number,
        status.kind.label(),
        status.name,
        banner(status.is_pass()),
        format_elapsed(status.elapsed_ms)
    )
}

/// Renders the detail block of a finished node. Unlike the TOC line it keeps the
/// finer state (neutral, skipped, aborted) and the captured log.
///
/// 渲染已完成节点的详细信息块。与目录行不同，它保留更细的状态（中性、跳过、中止）以及捕获的日志。
pub fn detail_block(status: &StatusRecord, entity_description: &str, log: &str) -> String {
    let heading = "#".repeat((status.level + 3).min(6));
    let mut block = format!(
        "{} {} {}: {}\n\n",
        heading,
        status.number,
        status.kind.label(),
        status.name
    );
    if !entity_description.is_empty() {
        block.push_str(&format!("_{}_\n\n", entity_description));
    }
    match status.code {
        Some(code) => block.push_str(&format!("- State: {} (code {})\n", status.state.as_str(), code)),
        None => block.push_str(&format!("- State: {}\n", status.state.as_str())),
    }
    block.push_str(&format!("- Started: {}\n", status.started_at.format("%Y-%m-%d %H:%M:%S")));
    block.push_str(&format!("- Elapsed: {}\n", format_elapsed(status.elapsed_ms)));
    if !status.description.is_empty() {
        block.push_str("- Description:\n\n");
        for line in status.description.lines() {
            block.push_str(&format!("    {}\n", line));
        }
    }
    if !log.trim().is_empty() {
        let fence = fence_for(log);
        block.push_str(&format!("\n{}text\n", fence));
        block.push_str(log.trim_end());
        block.push_str(&format!("\n{}\n", fence));
    }
    block.push('\n');
    block
}

/// A backtick fence longer than any backtick run inside `log`.
fn fence_for(log: &str) -> String {
    let longest = log
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

/// The assembled report handed to a renderer.
/// 交给渲染器的已组装报告。
#[derive(Debug, Clone, Serialize)]
pub struct AuditDocument {
    pub title: String,
    pub vehicle: Option<String>,
    pub overall: ExecResult,
    pub passed: bool,
    /// Set when the run was cut short by a stop request.
    pub stopped: bool,
    pub banner: String,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub elapsed: Duration,
    pub counters: StepCounters,
    pub roots: Vec<AuditNode>,
    /// The Markdown rendition, with the result placeholder already substituted.
    pub markdown: String,
}

impl AuditDocument {
    /// Assembles the document from the flushed top-level subtrees.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        title: &str,
        vehicle: Option<String>,
        started_at: DateTime<Local>,
        elapsed: Duration,
        counters: StepCounters,
        stopped: bool,
        roots: Vec<AuditNode>,
    ) -> Self {
        let overall = overall_result(&roots);
        let passed = !stopped && !roots.is_empty() && roots.iter().all(|r| r.status.is_pass());
        let banner = if stopped {
            format!("{} (stopped)", banner(passed))
        } else {
            banner(passed).to_string()
        };

        // Substituted before the body is appended so captured logs stay verbatim.
        let header = format!("# {}\n\n{}\n\n", title, RESULT_PLACEHOLDER);
        let mut markdown = header.replace(RESULT_PLACEHOLDER, &format!("**RESULT: {}**", banner));
        if let Some(vehicle) = &vehicle {
            markdown.push_str(&format!("- Vehicle: {}\n", vehicle));
        }
        let finished_at = Local::now();
        markdown.push_str(&format!("- Started: {}\n", started_at.format("%Y-%m-%d %H:%M:%S")));
        markdown.push_str(&format!("- Finished: {}\n", finished_at.format("%Y-%m-%d %H:%M:%S")));
        markdown.push_str(&format!("- Elapsed: {:.2}s\n", elapsed.as_secs_f64()));
        markdown.push_str(&format!(
            "- Steps: {} passed, {} neutral, {} failed, {} skipped, {} aborted\n\n",
            counters.passed, counters.neutral, counters.failed, counters.skipped, counters.aborted
        ));

        markdown.push_str("## Contents\n\n");
        for root in &roots {
            root.walk(&mut |node| {
                markdown.push_str(&node.toc);
                markdown.push('\n');
            });
        }
        markdown.push_str("\n## Details\n\n");
        for root in &roots {
            root.walk(&mut |node| markdown.push_str(&node.detail));
        }

        Self {
            title: title.to_string(),
            vehicle,
            overall,
            passed,
            stopped,
            banner,
            started_at,
            finished_at,
            elapsed,
            counters,
            roots,
            markdown,
        }
    }
}

/// The worst top-level result; neutral when nothing ran.
fn overall_result(roots: &[AuditNode]) -> ExecResult {
    if roots.is_empty() {
        return ExecResult::neutral("nothing was executed");
    }
    let mut overall = ExecResult::pass();
    for root in roots {
        let result = ExecResult::with_code(
            root.status.code.unwrap_or(0),
            root.status.description.clone(),
        );
        overall.absorb(&root.status.name, &result);
    }
    overall
}

/// Produces a browsable artifact from a finished document.
/// 从已完成的文档生成可浏览的产物。
pub trait ReportRenderer: Send + Sync {
    /// Renders the document and returns the path of the produced artifact.
    fn render(&self, document: &AuditDocument) -> Result<PathBuf>;
}
