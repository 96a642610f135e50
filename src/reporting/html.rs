//! # HTML Reporting Module / HTML 报告模块
//!
//! Renders a finished audit document as a single self-contained HTML file:
//! the overall banner, step counters, and the node tree as nested collapsible
//! sections with each node's state, elapsed time and detail block.
//!
//! 将完成的审计文档渲染为单个自包含的 HTML 文件：总体结果标识、步骤计数，
//! 以及以嵌套可折叠区块呈现的节点树，包含每个节点的状态、耗时和详细信息块。

use anyhow::{Context, Result};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fs;
use std::path::PathBuf;

use crate::audit::{AuditDocument, AuditNode, ReportRenderer};
use crate::core::models::NodeState;
use crate::infra::t;

/// Embedded CSS styles for HTML reports / HTML 报告的嵌入式 CSS 样式
const HTML_STYLE: &str = include_str!("assets/report.css");

/// Writes the audit document to `output` as HTML.
/// 将审计文档以 HTML 形式写入 `output`。
#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    output: PathBuf,
    locale: String,
}

impl HtmlRenderer {
    pub fn new(output: impl Into<PathBuf>, locale: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            locale: locale.into(),
        }
    }

    pub fn output(&self) -> &PathBuf {
        &self.output
    }

    fn node(&self, node: &AuditNode) -> Markup {
        let status = &node.status;
        let class = state_class(status.state);
        let elapsed = status
            .elapsed_ms
            .map(|ms| format!("{:.2}s", ms as f64 / 1000.0))
            .unwrap_or_else(|| "N/A".to_string());
        // Failing nodes start expanded.
        let open = !status.is_pass() && status.state != NodeState::Skipped;
        html! {
            details class={ "node " (class) } open[open] {
                summary {
                    strong { (status.number) }
                    " [" (status.kind.label()) "] "
                    (status.name)
                    span class="state" { (status.state.as_str()) }
                    span class="elapsed" { (elapsed) }
                }
                @if !status.description.is_empty() {
                    pre class="description" { (status.description) }
                }
                pre class="log" { (node.detail) }
                @for child in &node.children {
                    (self.node(child))
                }
            }
        }
    }
}

fn state_class(state: NodeState) -> &'static str {
    match state {
        NodeState::Passed => "passed",
        NodeState::Neutral => "neutral",
        NodeState::Failed => "failed",
        NodeState::Skipped => "skipped",
        NodeState::Aborted => "aborted",
        NodeState::Pending | NodeState::Running => "running",
    }
}

impl ReportRenderer for HtmlRenderer {
    fn render(&self, document: &AuditDocument) -> Result<PathBuf> {
        let locale = self.locale.as_str();
        let counters = &document.counters;
        let markup = html! {
            (DOCTYPE)
            html lang=(locale) {
                head {
                    meta charset="utf-8";
                    title { (document.title) }
                    style { (PreEscaped(HTML_STYLE)) }
                }
                body {
                    h1 { (document.title) }
                    div class={ "banner " (if document.passed { "pass" } else { "not-pass" }) } {
                        (t!("html_report.result", locale = locale)) ": " (document.banner)
                    }
                    @if let Some(vehicle) = &document.vehicle {
                        p { (t!("html_report.vehicle", locale = locale)) ": " (vehicle) }
                    }
                    p {
                        (t!("html_report.started", locale = locale)) ": "
                        (document.started_at.format("%Y-%m-%d %H:%M:%S").to_string())
                        " · "
                        (t!("html_report.elapsed", locale = locale)) ": "
                        (format!("{:.2}s", document.elapsed.as_secs_f64()))
                    }
                    div class="summary" {
                        div class="card" { div { (t!("html_report.passed", locale = locale)) } div class="value" { (counters.passed) } }
                        div class="card" { div { (t!("html_report.neutral", locale = locale)) } div class="value" { (counters.neutral) } }
                        div class="card" { div { (t!("html_report.failed", locale = locale)) } div class="value" { (counters.failed) } }
                        div class="card" { div { (t!("html_report.skipped", locale = locale)) } div class="value" { (counters.skipped) } }
                    }
                    @for root in &document.roots {
                        (self.node(root))
                    }
                }
            }
        };

        if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report directory: {}", parent.display()))?;
        }
        fs::write(&self.output, markup.into_string())
            .with_context(|| format!("Failed to write HTML report: {}", self.output.display()))?;
        Ok(self.output.clone())
    }
}
