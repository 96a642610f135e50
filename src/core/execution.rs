//! # Test Execution Engine Module / 测试执行引擎模块
//!
//! This module walks the stand → group → case → step hierarchy depth-first and
//! computes one `ExecResult` per node. Each level notifies the audit observer
//! before and after it runs, honours the cooperative stop flag at child
//! boundaries, and folds its children's results into its own.
//!
//! 此模块以深度优先方式遍历 测试台 → 测试组 → 测试用例 → 测试步骤 层级结构，
//! 并为每个节点计算一个 `ExecResult`。每一层在运行前后通知审计观察者，
//! 在子节点边界处遵守协作式停止标志，并将子节点的结果合并到自身结果中。

use colored::*;
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::{
    audit::{AuditNodeId, AuditObserver},
    core::{
        env::EnvCtx,
        models::{ExecResult, NodeState, Outcome, TestCase, TestGroup, TestStand, TestStep},
        store::DefinitionStore,
    },
    infra::t,
    runner::{COMMAND_TYPE_NOT_SUPPORTED, Runners},
};

/// The root entity a run starts from.
/// 一次运行的起始实体。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTarget {
    Stand(String),
    Group { id: String, force: bool },
    Case(String),
    Step(String),
}

impl RunTarget {
    pub fn id(&self) -> &str {
        match self {
            RunTarget::Stand(id) | RunTarget::Case(id) | RunTarget::Step(id) => id,
            RunTarget::Group { id, .. } => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RunTarget::Stand(_) => "stand",
            RunTarget::Group { .. } => "group",
            RunTarget::Case(_) => "case",
            RunTarget::Step(_) => "step",
        }
    }
}

impl fmt::Display for RunTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind(), self.id())
    }
}

/// State that lives for exactly one run: the group result cache and the chain
/// of groups currently being executed. Create a fresh one for every run.
///
/// 仅存活于一次运行中的状态：测试组结果缓存以及当前正在执行的测试组链。每次运行都应新建一个。
#[derive(Debug, Default)]
pub struct RunContext {
    cache: HashMap<String, ExecResult>,
    group_path: Vec<String>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached result of a group, if it already ran in this run.
    pub fn cached(&self, group_id: &str) -> Option<&ExecResult> {
        self.cache.get(group_id)
    }

}

fn not_found(kind: &str, id: &str) -> ExecResult {
    ExecResult::fail(format!("{} '{}' not found", kind, id))
}

/// An aborted node never reports Pass: a stop before any failure leaves it neutral.
fn cut_short(result: ExecResult, aborted: bool) -> ExecResult {
    if aborted && result.is_pass() {
        ExecResult::stopped()
    } else {
        result
    }
}

fn paint(result: &ExecResult, text: String) -> ColoredString {
    match result.outcome() {
        Outcome::Pass => text.green(),
        Outcome::Neutral => text.yellow(),
        Outcome::Fail => text.red(),
    }
}

/// The Test Execution Engine.
///
/// Holds the collaborators a run needs. The engine itself is stateless between
/// runs; per-run state is carried in a `RunContext`.
///
/// 测试执行引擎。持有一次运行所需的协作者。引擎本身在运行之间无状态；
/// 每次运行的状态由 `RunContext` 携带。
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn DefinitionStore>,
    env: EnvCtx,
    runners: Runners,
    observer: Arc<dyn AuditObserver>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn DefinitionStore>,
        env: EnvCtx,
        runners: Runners,
        observer: Arc<dyn AuditObserver>,
    ) -> Self {
        Self {
            store,
            env,
            runners,
            observer,
        }
    }

    /// A copy of this engine reporting to a different observer.
    pub fn with_observer(&self, observer: Arc<dyn AuditObserver>) -> Self {
        Self {
            observer,
            ..self.clone()
        }
    }

    pub fn env(&self) -> &EnvCtx {
        &self.env
    }

    pub fn store(&self) -> &Arc<dyn DefinitionStore> {
        &self.store
    }

    /// Runs `target` with a fresh `RunContext`.
    pub async fn run(&self, target: &RunTarget) -> ExecResult {
        let mut ctx = RunContext::new();
        self.exec(target, &mut ctx).await
    }

    /// Runs `target` at the top level of the audit tree.
    ///
    /// Never fails: missing entities and runner errors are returned as a failing result.
    ///
    /// 在审计树的顶层运行 `target`。从不返回错误：缺失的实体和运行器错误都以失败结果返回。
    pub async fn exec(&self, target: &RunTarget, ctx: &mut RunContext) -> ExecResult {
        match target {
            RunTarget::Stand(id) => match self.store.stand(id) {
                Some(stand) => self.exec_stand(stand, ctx, None, 0).await,
                None => not_found("stand", id),
            },
            RunTarget::Group { id, force } => self.exec_group(id, *force, ctx, None, 0).await,
            RunTarget::Case(id) => self.exec_case(id, None, 0).await,
            RunTarget::Step(id) => self.exec_step_ref(id, None, 0).await,
        }
    }

    fn group_label<'a>(&'a self, id: &'a str) -> &'a str {
        self.store.group(id).map_or(id, |g| g.name.as_str())
    }

    fn case_label<'a>(&'a self, id: &'a str) -> &'a str {
        self.store.case(id).map_or(id, |c| c.name.as_str())
    }

    fn step_label<'a>(&'a self, id: &'a str) -> &'a str {
        self.store.step(id).map_or(id, |s| s.name.as_str())
    }

    /// Checks the cooperative stop flag at a child boundary.
    fn stop_at(&self, node: &str) -> bool {
        let stop = self.env.stop_requested();
        if stop {
            println!("{}", t!("engine.stop_observed", name = node).yellow());
        }
        stop
    }

    async fn exec_stand(
        &self,
        stand: &TestStand,
        ctx: &mut RunContext,
        parent: Option<AuditNodeId>,
        level: usize,
    ) -> ExecResult {
        let node = self.observer.before_stand(stand, parent, level);
        if !stand.enabled {
            let result = ExecResult::disabled();
            println!("{}", t!("engine.node_disabled", kind = "stand", name = &stand.name).dimmed());
            self.observer
                .after_stand(node, &result, NodeState::Skipped, level);
            return result;
        }

        println!("{}", t!("engine.stand_started", name = &stand.name).blue().bold());
        let started = Instant::now();
        let mut result = ExecResult::pass();
        let mut aborted = false;
        for group_id in &stand.groups {
            if self.stop_at(&stand.name) {
                aborted = true;
                break;
            }
            // Stand-level iteration never stops on a failing group.
            let child = self.exec_group(group_id, false, ctx, Some(node), level + 1).await;
            result.absorb(self.group_label(group_id), &child);
        }
        let result = cut_short(result, aborted);

        println!(
            "{}",
            paint(
                &result,
                t!(
                    "engine.node_finished",
                    kind = "stand",
                    name = &stand.name,
                    result = result.to_string(),
                    duration = format!("{:.2}", started.elapsed().as_secs_f64())
                )
                .to_string()
            )
        );
        self.observer
            .after_stand(node, &result, NodeState::settle(&result, false, aborted), level);
        result
    }

    /// Runs a group, consulting the per-run cache unless `force` is set.
    ///
    /// Child groups run first (pre-order), then the group's own cases. A failing
    /// child is recorded but never stops its siblings; only the stop flag does.
    ///
    /// 运行测试组，除非设置了 `force`，否则先查询单次运行缓存。
    /// 先运行子组（前序），再运行该组自己的用例。失败的子节点会被记录，但不会中止兄弟节点；只有停止标志会。
    fn exec_group<'a>(
        &'a self,
        id: &'a str,
        force: bool,
        ctx: &'a mut RunContext,
        parent: Option<AuditNodeId>,
        level: usize,
    ) -> BoxFuture<'a, ExecResult> {
        async move {
            if let Some(start) = ctx.group_path.iter().position(|g| g == id) {
                let mut chain = ctx.group_path[start..].to_vec();
                chain.push(id.to_string());
                let result = ExecResult::fail(format!("cycle detected: {}", chain.join(" -> ")));
                eprintln!("{}", t!("engine.cycle_detected", chain = chain.join(" -> ")).red());
                return result;
            }

            let Some(group) = self.store.group(id) else {
                return not_found("group", id);
            };

            if !force {
                if let Some(cached) = ctx.cache.get(id) {
                    println!("{}", t!("engine.group_cached", name = &group.name).dimmed());
                    return cached.clone();
                }
            }

            let node = self.observer.before_group(group, parent, level);
            if !group.enabled {
                let result = ExecResult::disabled();
                println!("{}", t!("engine.node_disabled", kind = "group", name = &group.name).dimmed());
                self.observer
                    .after_group(node, &result, NodeState::Skipped, level);
                return result;
            }

            println!("{}", t!("engine.group_started", name = &group.name).blue());
            let started = Instant::now();
            let (result, aborted) = self.exec_group_children(group, ctx, node, level).await;
            let result = cut_short(result, aborted);

            ctx.cache.insert(id.to_string(), result.clone());
            println!(
                "{}",
                paint(
                    &result,
                    t!(
                        "engine.node_finished",
                        kind = "group",
                        name = &group.name,
                        result = result.to_string(),
                        duration = format!("{:.2}", started.elapsed().as_secs_f64())
                    )
                    .to_string()
                )
            );
            self.observer
                .after_group(node, &result, NodeState::settle(&result, false, aborted), level);
            result
        }
        .boxed()
    }

    async fn exec_group_children(
        &self,
        group: &TestGroup,
        ctx: &mut RunContext,
        node: AuditNodeId,
        level: usize,
    ) -> (ExecResult, bool) {
        let mut result = ExecResult::pass();
        ctx.group_path.push(group.id.clone());

        for edge in &group.children {
            if self.stop_at(&group.name) {
                ctx.group_path.pop();
                return (result, true);
            }
            let child = self
                .exec_group(&edge.group, edge.force_exec, ctx, Some(node), level + 1)
                .await;
            result.absorb(self.group_label(&edge.group), &child);
        }

        for case_id in &group.cases {
            if self.stop_at(&group.name) {
                ctx.group_path.pop();
                return (result, true);
            }
            let child = self.exec_case(case_id, Some(node), level + 1).await;
            result.absorb(self.case_label(case_id), &child);
        }

        ctx.group_path.pop();
        (result, false)
    }

    /// Runs a case: init step, main sequence in `sequence` order, cleanup step.
    ///
    /// - A failing init step fails the case at once; neither the main sequence
    ///   nor the cleanup step runs.
    /// - A failing main step stops the sequence unless its entry ignores
    ///   failures, in which case it is noted and the next step runs.
    /// - The cleanup step runs after any main-sequence failure; if it fails,
    ///   its result replaces the case's.
    ///
    /// 运行测试用例：初始化步骤、按 `sequence` 顺序执行的主序列、清理步骤。
    /// - 初始化步骤失败会立即使用例失败；主序列和清理步骤都不会运行。
    /// - 主序列步骤失败会中止序列，除非该条目忽略失败，此时记录下来并继续运行下一步。
    /// - 主序列失败后仍会运行清理步骤；若清理步骤失败，其结果将替换用例的结果。
    async fn exec_case(&self, id: &str, parent: Option<AuditNodeId>, level: usize) -> ExecResult {
        let Some(case) = self.store.case(id) else {
            return not_found("case", id);
        };

        let node = self.observer.before_case(case, parent, level);
        if !case.enabled {
            let result = ExecResult::disabled();
            println!("{}", t!("engine.node_disabled", kind = "case", name = &case.name).dimmed());
            self.observer
                .after_case(node, &result, NodeState::Skipped, level);
            return result;
        }

        println!("{}", t!("engine.case_started", name = &case.name).blue());
        let started = Instant::now();
        let (result, aborted) = self.exec_case_body(case, node, level).await;
        let result = cut_short(result, aborted);

        println!(
            "{}",
            paint(
                &result,
                t!(
                    "engine.node_finished",
                    kind = "case",
                    name = &case.name,
                    result = result.to_string(),
                    duration = format!("{:.2}", started.elapsed().as_secs_f64())
                )
                .to_string()
            )
        );
        self.observer
            .after_case(node, &result, NodeState::settle(&result, false, aborted), level);
        result
    }

    async fn exec_case_body(
        &self,
        case: &TestCase,
        node: AuditNodeId,
        level: usize,
    ) -> (ExecResult, bool) {
        let mut result = ExecResult::pass();

        if let Some(init) = &case.init_step {
            if self.stop_at(&case.name) {
                return (result, true);
            }
            let init_result = self.exec_step_ref(init, Some(node), level + 1).await;
            result.absorb(self.step_label(init), &init_result);
            if init_result.is_fail() {
                return (result, false);
            }
        }

        let mut aborted = false;
        for entry in case.ordered_sequence() {
            if self.stop_at(&case.name) {
                aborted = true;
                break;
            }
            let child = self.exec_step_ref(&entry.step, Some(node), level + 1).await;
            if child.is_fail() && entry.ignore_fail {
                result.note(self.step_label(&entry.step), &child);
                continue;
            }
            result.absorb(self.step_label(&entry.step), &child);
            if child.is_fail() {
                break;
            }
        }

        if let Some(cleanup) = &case.cleanup_step {
            if self.stop_at(&case.name) {
                return (result, true);
            }
            let cleanup_result = self.exec_step_ref(cleanup, Some(node), level + 1).await;
            if cleanup_result.is_fail() {
                result = ExecResult::with_code(
                    cleanup_result.code,
                    format!("{}: {}", self.step_label(cleanup), cleanup_result.description),
                );
            }
        }

        (result, aborted)
    }

    async fn exec_step_ref(&self, id: &str, parent: Option<AuditNodeId>, level: usize) -> ExecResult {
        match self.store.step(id) {
            Some(step) => self.exec_step(step, parent, level).await,
            None => not_found("step", id),
        }
    }

    /// Runs a single step through the backend its command type selects and
    /// forwards the runner's result unchanged.
    ///
    /// 通过命令类型选择的后端运行单个步骤，并原样转发运行器的结果。
    pub async fn exec_step(
        &self,
        step: &TestStep,
        parent: Option<AuditNodeId>,
        level: usize,
    ) -> ExecResult {
        let node = self.observer.before_step(step, parent, level);
        if !step.enabled {
            let result = ExecResult::disabled();
            println!("{}", t!("engine.node_disabled", kind = "step", name = &step.name).dimmed());
            self.observer
                .after_step(node, &result, NodeState::Skipped, "", level);
            return result;
        }

        let Some(runner) = self.runners.for_step(step) else {
            let result = ExecResult::fail(COMMAND_TYPE_NOT_SUPPORTED);
            self.observer
                .after_step(node, &result, NodeState::Failed, "", level);
            return result;
        };

        println!(
            "{}",
            t!("engine.step_started", name = &step.name, runner = runner.name()).cyan()
        );
        let started = Instant::now();
        let outcome = runner.exec(step, &self.env).await;
        println!(
            "{}",
            paint(
                &outcome.result,
                t!(
                    "engine.node_finished",
                    kind = "step",
                    name = &step.name,
                    result = outcome.result.to_string(),
                    duration = format!("{:.2}", started.elapsed().as_secs_f64())
                )
                .to_string()
            )
        );

        let state = NodeState::settle(&outcome.result, false, false);
        self.observer
            .after_step(node, &outcome.result, state, &outcome.output, level);
        outcome.result
    }
}
