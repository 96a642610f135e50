//! The audit recorder: an `AuditObserver` that builds the nested report.
//!
//! Open nodes live in an arena keyed by `AuditNodeId`. Closing a node renders
//! its TOC line and detail block and moves it into its parent's children.
//! Closing a top-level node appends the whole subtree to `audit.jsonl` and
//! drops it from memory, so at most one top-level subtree is held at a time.
//!
//! 审计记录器：构建嵌套报告的 `AuditObserver`。
//! 打开的节点保存在以 `AuditNodeId` 为键的区域中。关闭节点时渲染其目录行和详细信息块，
//! 并将其移入父节点的子节点列表。关闭顶层节点时，整个子树会追加到 `audit.jsonl` 并从内存中移除，
//! 因此内存中最多只保留一个顶层子树。

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use colored::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::audit::document::{self, AuditDocument, AuditNode, ReportRenderer, StatusRecord};
use crate::audit::{AuditNodeId, AuditObserver};
use crate::core::models::{ExecResult, NodeKind, NodeState, TestCase, TestGroup, TestStand, TestStep};
use crate::infra::{fs as infra_fs, t};

/// File the flushed top-level subtrees are appended to.
pub const AUDIT_LOG_FILE: &str = "audit.jsonl";
/// File the assembled Markdown document is written to.
pub const REPORT_FILE: &str = "report.md";

/// Terminal-state counters for steps.
/// 步骤最终状态计数器。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCounters {
    pub passed: usize,
    pub neutral: usize,
    pub failed: usize,
    pub skipped: usize,
    pub aborted: usize,
}

impl StepCounters {
    fn record(&mut self, state: NodeState) {
        match state {
            NodeState::Passed => self.passed += 1,
            NodeState::Neutral => self.neutral += 1,
            NodeState::Failed => self.failed += 1,
            NodeState::Skipped => self.skipped += 1,
            NodeState::Aborted => self.aborted += 1,
            NodeState::Pending | NodeState::Running => {}
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.neutral + self.failed + self.skipped + self.aborted
    }
}

/// Live snapshot returned by `audit_status`.
/// `audit_status` 返回的实时快照。
#[derive(Debug, Clone, Serialize)]
pub struct AuditStatus {
    pub active: bool,
    pub title: String,
    pub started_at: Option<DateTime<Local>>,
    pub elapsed_ms: Option<u64>,
    /// The chain of open nodes, outermost first.
    pub running: Vec<StatusRecord>,
    /// The most recently closed node.
    pub last: Option<StatusRecord>,
    pub finished_top_level: usize,
    pub counters: StepCounters,
}

/// What `stop_audit` hands back.
#[derive(Debug, Clone)]
pub struct AuditSummary {
    pub document: AuditDocument,
    pub report_path: PathBuf,
    /// Path of the renderer's artifact, if a renderer was given.
    pub rendered: Option<PathBuf>,
}

impl AuditSummary {
    pub fn passed(&self) -> bool {
        self.document.passed
    }
}

struct OpenNode {
    status: StatusRecord,
    entity_description: String,
    parent: Option<AuditNodeId>,
    opened_children: usize,
    children: Vec<AuditNode>,
    started: Instant,
}

#[derive(Default)]
struct RecorderState {
    active: bool,
    title: String,
    vehicle: Option<String>,
    started_at: Option<DateTime<Local>>,
    started: Option<Instant>,
    next_id: u64,
    open: HashMap<AuditNodeId, OpenNode>,
    roots_opened: usize,
    finished_top_level: usize,
    counters: StepCounters,
    last: Option<StatusRecord>,
}

/// Observes a traversal and assembles the audit report.
/// 观察遍历过程并组装审计报告。
pub struct AuditRecorder {
    report_dir: PathBuf,
    state: Mutex<RecorderState>,
}

impl AuditRecorder {
    pub fn new(report_dir: impl Into<PathBuf>) -> Self {
        Self {
            report_dir: report_dir.into(),
            state: Mutex::new(RecorderState::default()),
        }
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.report_dir.join(AUDIT_LOG_FILE)
    }

    fn lock(&self) -> MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resets the recorder and truncates durable storage for a new run.
    ///
    /// 为新的运行重置记录器并清空持久化存储。
    pub fn start_audit(&self, title: &str, vehicle: Option<&str>) -> Result<()> {
        infra_fs::ensure_dir(&self.report_dir)?;
        let log_path = self.audit_log_path();
        fs::write(&log_path, "")
            .with_context(|| format!("Failed to reset audit log: {}", log_path.display()))?;

        let mut state = self.lock();
        *state = RecorderState {
            active: true,
            title: title.to_string(),
            vehicle: vehicle.map(str::to_string),
            started_at: Some(Local::now()),
            started: Some(Instant::now()),
            ..RecorderState::default()
        };
        Ok(())
    }

    /// Closes the run: reloads the flushed subtrees, writes `report.md` with
    /// the overall banner substituted, and hands the document to `renderer`.
    ///
    /// 结束运行：重新加载已刷新的子树，写入替换了总体结果标识的 `report.md`，
    /// 并将文档交给 `renderer`。
    pub fn stop_audit(
        &self,
        stopped: bool,
        renderer: Option<&dyn ReportRenderer>,
    ) -> Result<AuditSummary> {
        let (title, vehicle, started_at, elapsed, counters) = {
            let mut state = self.lock();
            state.active = false;
            if !state.open.is_empty() {
                eprintln!(
                    "{}",
                    t!("audit.unclosed_nodes", count = state.open.len()).yellow()
                );
                state.open.clear();
            }
            (
                state.title.clone(),
                state.vehicle.clone(),
                state.started_at.unwrap_or_else(Local::now),
                state.started.map(|s| s.elapsed()).unwrap_or(Duration::ZERO),
                state.counters,
            )
        };

        let roots = self.load_flushed()?;
        let document =
            AuditDocument::assemble(&title, vehicle, started_at, elapsed, counters, stopped, roots);

        let report_path = self.report_dir.join(REPORT_FILE);
        fs::write(&report_path, &document.markdown)
            .with_context(|| format!("Failed to write report: {}", report_path.display()))?;

        let rendered = renderer.map(|r| r.render(&document)).transpose()?;

        Ok(AuditSummary {
            document,
            report_path,
            rendered,
        })
    }

    /// Returns a snapshot of the run in progress.
    ///
    /// 返回正在进行的运行的快照。
    pub fn audit_status(&self) -> AuditStatus {
        let state = self.lock();
        let mut ids: Vec<&AuditNodeId> = state.open.keys().collect();
        ids.sort_by_key(|id| id.0);
        let running = ids
            .into_iter()
            .filter_map(|id| state.open.get(id))
            .map(|node| {
                let mut status = node.status.clone();
                status.elapsed_ms = Some(node.started.elapsed().as_millis() as u64);
                status
            })
            .collect();

        AuditStatus {
            active: state.active,
            title: state.title.clone(),
            started_at: state.started_at,
            elapsed_ms: state.started.map(|s| s.elapsed().as_millis() as u64),
            running,
            last: state.last.clone(),
            finished_top_level: state.finished_top_level,
            counters: state.counters,
        }
    }

    fn load_flushed(&self) -> Result<Vec<AuditNode>> {
        let log_path = self.audit_log_path();
        if !log_path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&log_path)
            .with_context(|| format!("Failed to read audit log: {}", log_path.display()))?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(index, line)| {
                serde_json::from_str(line).with_context(|| {
                    format!("Corrupt audit log entry {} in {}", index + 1, log_path.display())
                })
            })
            .collect()
    }

    fn flush(&self, node: &AuditNode) -> Result<()> {
        infra_fs::ensure_dir(&self.report_dir)?;
        let log_path = self.audit_log_path();
        let line = serde_json::to_string(node).context("Failed to serialize audit node")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open audit log: {}", log_path.display()))?;
        writeln!(file, "{}", line)
            .with_context(|| format!("Failed to append to audit log: {}", log_path.display()))
    }

    fn open(
        &self,
        kind: NodeKind,
        name: &str,
        entity_description: &str,
        parent: Option<AuditNodeId>,
        toc_level: usize,
    ) -> AuditNodeId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = AuditNodeId(state.next_id);

        let parent = parent.filter(|p| toc_level > 0 && state.open.contains_key(p));
        let number = match parent.and_then(|p| state.open.get_mut(&p)) {
            Some(parent_node) => {
                parent_node.opened_children += 1;
                format!("{}.{}", parent_node.status.number, parent_node.opened_children)
            }
            None => {
                state.roots_opened += 1;
                state.roots_opened.to_string()
            }
        };

        let status = StatusRecord {
            number,
            kind,
            name: name.to_string(),
            level: toc_level,
            state: NodeState::Running,
            code: None,
            description: String::new(),
            started_at: Local::now(),
            elapsed_ms: None,
        };
        state.open.insert(
            id,
            OpenNode {
                status,
                entity_description: entity_description.to_string(),
                parent,
                opened_children: 0,
                children: Vec::new(),
                started: Instant::now(),
            },
        );
        id
    }

    fn close(&self, id: AuditNodeId, result: &ExecResult, node_state: NodeState, log: &str, toc_level: usize) {
        let finished = {
            let mut state = self.lock();
            let Some(open) = state.open.remove(&id) else {
                return;
            };

            let mut status = open.status;
            status.state = node_state;
            status.code = Some(result.code);
            status.description = result.description.clone();
            status.elapsed_ms = Some(open.started.elapsed().as_millis() as u64);
            if status.kind == NodeKind::Step {
                state.counters.record(node_state);
            }

            let node = AuditNode {
                toc: document::toc_line(&status),
                detail: document::detail_block(&status, &open.entity_description, log),
                status: status.clone(),
                children: open.children,
            };
            state.last = Some(status);

            match open.parent.filter(|_| toc_level > 0) {
                Some(parent) => match state.open.get_mut(&parent) {
                    Some(parent_node) => {
                        parent_node.children.push(node);
                        None
                    }
                    None => Some(node),
                },
                None => Some(node),
            }
        };

        if let Some(root) = finished {
            if let Err(e) = self.flush(&root) {
                eprintln!("{}", t!("audit.flush_failed", error = format!("{:#}", e)).red());
            }
            self.lock().finished_top_level += 1;
        }
    }
}

impl AuditObserver for AuditRecorder {
    fn before_stand(&self, stand: &TestStand, parent: Option<AuditNodeId>, toc_level: usize) -> AuditNodeId {
        self.open(NodeKind::Stand, &stand.name, &stand.description, parent, toc_level)
    }

    fn after_stand(&self, node: AuditNodeId, result: &ExecResult, state: NodeState, toc_level: usize) {
        self.close(node, result, state, "", toc_level);
    }

    fn before_group(&self, group: &TestGroup, parent: Option<AuditNodeId>, toc_level: usize) -> AuditNodeId {
        self.open(NodeKind::Group, &group.name, &group.description, parent, toc_level)
    }

    fn after_group(&self, node: AuditNodeId, result: &ExecResult, state: NodeState, toc_level: usize) {
        self.close(node, result, state, "", toc_level);
    }

    fn before_case(&self, case: &TestCase, parent: Option<AuditNodeId>, toc_level: usize) -> AuditNodeId {
        self.open(NodeKind::Case, &case.name, &case.description, parent, toc_level)
    }

    fn after_case(&self, node: AuditNodeId, result: &ExecResult, state: NodeState, toc_level: usize) {
        self.close(node, result, state, "", toc_level);
    }

    fn before_step(&self, step: &TestStep, parent: Option<AuditNodeId>, toc_level: usize) -> AuditNodeId {
        self.open(NodeKind::Step, &step.name, &step.description, parent, toc_level)
    }

    fn after_step(
        &self,
        node: AuditNodeId,
        result: &ExecResult,
        state: NodeState,
        log: &str,
        toc_level: usize,
    ) {
        self.close(node, result, state, log, toc_level);
    }
}
