//! # Audit Module / 审计模块
//!
//! The audit recorder observes a traversal through before/after notifications
//! at every hierarchy level and assembles a nested report from them: a table
//! of contents, detail blocks and machine-readable status records.
//!
//! 审计记录器通过每个层级的前置/后置通知观察遍历过程，并据此组装嵌套报告：
//! 目录、详细信息块和机器可读的状态记录。
//!
//! ## Module Organization / 模块组织
//!
//! - `recorder` - The recorder and its live status snapshot
//! - `document` - Node tree, rendering of TOC lines and detail blocks, the final document
//!
//! - `recorder` - 记录器及其实时状态快照
//! - `document` - 节点树、目录行和详细信息块的渲染、最终文档

use serde::{Deserialize, Serialize};

use crate::core::models::{ExecResult, NodeState, TestCase, TestGroup, TestStand, TestStep};

pub mod document;
pub mod recorder;

pub use document::{AuditDocument, AuditNode, ReportRenderer, StatusRecord};
pub use recorder::{AuditRecorder, AuditStatus, AuditSummary, StepCounters};

/// Handle to a node the observer opened. Children are linked under it.
/// 观察者打开的节点句柄。子节点链接在其下。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditNodeId(pub u64);

/// Notifications the engine emits while it walks the hierarchy.
///
/// A `before_*` call opens a node under `parent` (or as a root at
/// `toc_level == 0`) and returns its handle; the matching `after_*` call closes
/// it with the computed result.
///
/// 引擎遍历层级结构时发出的通知。
/// `before_*` 调用在 `parent` 下（或在 `toc_level == 0` 时作为根）打开一个节点并返回其句柄；
/// 对应的 `after_*` 调用使用计算出的结果关闭该节点。
pub trait AuditObserver: Send + Sync {
    fn before_stand(&self, stand: &TestStand, parent: Option<AuditNodeId>, toc_level: usize) -> AuditNodeId;
    fn after_stand(&self, node: AuditNodeId, result: &ExecResult, state: NodeState, toc_level: usize);

    fn before_group(&self, group: &TestGroup, parent: Option<AuditNodeId>, toc_level: usize) -> AuditNodeId;
    fn after_group(&self, node: AuditNodeId, result: &ExecResult, state: NodeState, toc_level: usize);

    fn before_case(&self, case: &TestCase, parent: Option<AuditNodeId>, toc_level: usize) -> AuditNodeId;
    fn after_case(&self, node: AuditNodeId, result: &ExecResult, state: NodeState, toc_level: usize);

    fn before_step(&self, step: &TestStep, parent: Option<AuditNodeId>, toc_level: usize) -> AuditNodeId;
    fn after_step(
        &self,
        node: AuditNodeId,
        result: &ExecResult,
        state: NodeState,
        log: &str,
        toc_level: usize,
    );
}

/// An observer that records nothing. Used for ad-hoc quick tests.
/// 不记录任何内容的观察者。用于临时快速测试。
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl AuditObserver for NullObserver {
    fn before_stand(&self, _: &TestStand, _: Option<AuditNodeId>, _: usize) -> AuditNodeId {
        AuditNodeId(0)
    }
    fn after_stand(&self, _: AuditNodeId, _: &ExecResult, _: NodeState, _: usize) {}

    fn before_group(&self, _: &TestGroup, _: Option<AuditNodeId>, _: usize) -> AuditNodeId {
        AuditNodeId(0)
    }
    fn after_group(&self, _: AuditNodeId, _: &ExecResult, _: NodeState, _: usize) {}

    fn before_case(&self, _: &TestCase, _: Option<AuditNodeId>, _: usize) -> AuditNodeId {
        AuditNodeId(0)
    }
    fn after_case(&self, _: AuditNodeId, _: &ExecResult, _: NodeState, _: usize) {}

    fn before_step(&self, _: &TestStep, _: Option<AuditNodeId>, _: usize) -> AuditNodeId {
        AuditNodeId(0)
    }
    fn after_step(&self, _: AuditNodeId, _: &ExecResult, _: NodeState, _: &str, _: usize) {}
}
