//! # Run Controller Module / 运行控制器模块
//!
//! Runs an audit on a background tokio task while the caller polls its status
//! or asks it to stop. At most one run (full audit or quick test) is active at
//! a time; the controller refuses to start another.
//!
//! 在后台 tokio 任务上运行审计，同时调用方可以轮询其状态或请求停止。
//! 同一时间最多只有一个运行（完整审计或快速测试）处于活动状态；控制器会拒绝启动另一个。

use anyhow::{Context, Result, bail};
use colored::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::{
    audit::{AuditRecorder, AuditStatus, AuditSummary, NullObserver, ReportRenderer},
    core::{
        execution::{Engine, RunContext, RunTarget},
        models::ExecResult,
    },
    infra::t,
};

/// The outcome of one background run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub target: RunTarget,
    pub result: ExecResult,
    /// Whether a stop request cut the run short.
    pub stopped: bool,
    pub summary: AuditSummary,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.summary.passed()
    }
}

/// Clears the active flag when a run ends, however it ends.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns the engine, the recorder and the renderer for background runs.
/// 为后台运行持有引擎、记录器和渲染器。
pub struct RunController {
    engine: Engine,
    recorder: Arc<AuditRecorder>,
    renderer: Option<Arc<dyn ReportRenderer>>,
    title: String,
    active: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<Result<RunReport>>>>,
}

impl RunController {
    /// Wraps `engine` so that every run reports to `recorder`.
    pub fn new(
        engine: &Engine,
        recorder: Arc<AuditRecorder>,
        renderer: Option<Arc<dyn ReportRenderer>>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            engine: engine.with_observer(recorder.clone()),
            recorder,
            renderer,
            title: title.into(),
            active: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// `true` while a run or quick test is in progress.
    pub fn check_test_status(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn claim(&self) -> Result<ActiveGuard> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            bail!("A test run is already active.");
        }
        Ok(ActiveGuard(self.active.clone()))
    }

    /// Starts a full audit of `target` on a background task.
    ///
    /// The stop flag is cleared before the task is spawned, so a stop requested
    /// right after this returns is honoured by the new run.
    ///
    /// 在后台任务上启动对 `target` 的完整审计。
    /// 停止标志在任务派生之前清除，因此本函数返回后立即发出的停止请求会被新运行遵守。
    pub fn start_audit(&self, target: RunTarget, vehicle: Option<String>) -> Result<()> {
        let guard = self.claim()?;
        self.engine.env().reset_stop();

        let engine = self.engine.clone();
        let recorder = self.recorder.clone();
        let renderer = self.renderer.clone();
        let title = self.title.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            run_audit(engine, recorder, renderer, title, target, vehicle).await
        });

        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    pub fn audit_status(&self) -> AuditStatus {
        self.recorder.audit_status()
    }

    /// Requests a cooperative stop and waits up to `timeout` for the worker.
    ///
    /// Returns `Ok(None)` if there is no worker or it did not finish in time.
    /// A timed-out worker is left running; a later `wait` can still collect it.
    ///
    /// 请求协作式停止，并最多等待 `timeout` 让工作任务结束。
    /// 如果没有工作任务或其未能按时结束，则返回 `Ok(None)`。超时的工作任务会继续运行；之后仍可通过 `wait` 收集。
    pub async fn stop_audit(&self, timeout: Duration) -> Result<Option<RunReport>> {
        self.engine.env().request_stop();
        let Some(mut handle) = self.take_worker() else {
            return Ok(None);
        };

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(joined) => joined.context("Run worker panicked")?.map(Some),
            Err(_) => {
                eprintln!(
                    "{}",
                    t!("controller.stop_timeout", secs = timeout.as_secs()).red()
                );
                *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                Ok(None)
            }
        }
    }

    /// Waits for the background run to finish.
    pub async fn wait(&self) -> Result<Option<RunReport>> {
        match self.take_worker() {
            Some(handle) => handle.await.context("Run worker panicked")?.map(Some),
            None => Ok(None),
        }
    }

    /// Runs one step outside any audit. Refused while a run is active.
    ///
    /// 在任何审计之外运行单个步骤。运行处于活动状态时拒绝执行。
    pub async fn quick_test(&self, step_id: &str) -> Result<ExecResult> {
        let _guard = self.claim()?;
        let Some(step) = self.engine.store().step(step_id) else {
            bail!("Step '{}' not found.", step_id);
        };
        self.engine.env().reset_stop();
        let quick = self.engine.with_observer(Arc::new(NullObserver));
        Ok(quick.exec_step(step, None, 0).await)
    }

    fn take_worker(&self) -> Option<JoinHandle<Result<RunReport>>> {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

async fn run_audit(
    engine: Engine,
    recorder: Arc<AuditRecorder>,
    renderer: Option<Arc<dyn ReportRenderer>>,
    title: String,
    target: RunTarget,
    vehicle: Option<String>,
) -> Result<RunReport> {
    let env = engine.env().clone();
    if let Some(vehicle) = &vehicle {
        env.update_vehicle_env(engine.store().as_ref(), vehicle)?;
    }
    recorder.start_audit(&title, vehicle.as_deref())?;
    println!("{}", t!("controller.run_started", target = target.to_string()).bold());

    let mut ctx = RunContext::new();
    let result = engine.exec(&target, &mut ctx).await;
    let stopped = env.stop_requested();
    if stopped {
        println!("{}", t!("controller.run_stopped").yellow());
    }

    let summary = recorder.stop_audit(stopped, renderer.as_deref())?;
    Ok(RunReport {
        target,
        result,
        stopped,
        summary,
    })
}
