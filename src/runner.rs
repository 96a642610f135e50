//! # Command Runner Module / 命令运行器模块
//!
//! The command execution subsystem. A test step is executed by one of two
//! interchangeable backends: the script runner (shell-style) and the module
//! runner (interpreted program units). Both stage the command, launch it with
//! the environment context snapshot, capture combined output and classify it.
//!
//! 命令执行子系统。测试步骤由两个可互换后端之一执行：脚本运行器（shell 风格）
//! 和模块运行器（解释执行的程序单元）。两者都会暂存命令、使用环境上下文快照启动、
//! 捕获合并的输出并对其分类。
//!
//! ## Module Organization / 模块组织
//!
//! - `check` - Pass-condition evaluation and output markers
//! - `script` - The shell-style backend
//! - `module` - The interpreter-backed backend
//!
//! - `check` - 通过条件评估和输出标记
//! - `script` - shell 风格的后端
//! - `module` - 基于解释器的后端

use anyhow::Result;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{BackendConfig, HarnessConfig, split_launcher};
use crate::core::env::EnvCtx;
use crate::core::models::{CommandType, ExecResult, StepOutcome, TestStep};
use crate::infra::{command, fs};

/// Pass-condition evaluation and output markers / 通过条件评估和输出标记
pub mod check;
/// Interpreter-backed backend / 基于解释器的后端
pub mod module;
/// Shell-style backend / shell 风格的后端
pub mod script;

pub use module::ModuleRunner;
pub use script::ScriptRunner;

pub const FILE_NOT_FOUND: &str = "file not found";
pub const COMMAND_TYPE_NOT_SUPPORTED: &str = "command type not supported";

/// The contract shared by both backends.
/// 两个后端共享的契约。
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// A short label used in logs.
    fn name(&self) -> &'static str;

    /// Executes one step and classifies its output. Never fails: spawn errors,
    /// missing files and unsupported pass conditions all become a failing result.
    ///
    /// 执行一个步骤并对其输出分类。从不返回错误：派生错误、文件缺失和不支持的通过条件
    /// 都会变为失败结果。
    async fn exec(&self, step: &TestStep, env: &EnvCtx) -> StepOutcome;
}

/// Staging and launch settings shared by the process-based backends.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    pub root: PathBuf,
    pub temp_file: PathBuf,
    pub launcher: Vec<String>,
    pub timeout: Option<Duration>,
}

impl ProcessBackend {
    pub fn new(root: impl Into<PathBuf>, temp_file: impl Into<PathBuf>, launcher: &str) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            temp_file: temp_file.into(),
            launcher: split_launcher(launcher)?,
            timeout: None,
        })
    }

    pub fn from_config(config: &BackendConfig, timeout: Option<Duration>) -> Result<Self> {
        let mut backend = Self::new(&config.root, &config.temp_file, &config.launcher)?;
        backend.timeout = timeout;
        Ok(backend)
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolves or writes the file the step runs.
    fn stage(&self, step: &TestStep) -> std::result::Result<PathBuf, ExecResult> {
        if step.command_type.is_file() {
            fs::resolve_script(&self.root, &step.command).ok_or_else(|| {
                ExecResult::fail(format!(
                    "{}: {}",
                    FILE_NOT_FOUND,
                    self.root.join(step.command.trim()).display()
                ))
            })
        } else {
            fs::stage_inline(&self.temp_file, &step.command)
                .map_err(|e| ExecResult::fail(format!("{:#}", e)))
        }
    }

    async fn launch(&self, path: &Path, env: &EnvCtx) -> (io::Result<ExitStatus>, String) {
        let Some((program, args)) = self.launcher.split_first() else {
            return (Err(io::Error::other("empty launcher")), String::new());
        };
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .arg(path)
            .env_clear()
            .envs(env.fork_sat_env())
            .kill_on_drop(true);
        if self.root.is_dir() {
            cmd.current_dir(&self.root);
        }
        command::spawn_and_capture(cmd, self.timeout).await
    }

    /// Stages and runs the step. `Err` carries a finished failing outcome
    /// (staging failed, or the process could not be spawned or waited on).
    pub(crate) async fn run(
        &self,
        step: &TestStep,
        env: &EnvCtx,
    ) -> std::result::Result<(ExitStatus, String), StepOutcome> {
        let path = self
            .stage(step)
            .map_err(|result| StepOutcome::new(result, String::new()))?;
        let (status, output) = self.launch(&path, env).await;
        match status {
            Ok(status) => Ok((status, output)),
            Err(e) => Err(StepOutcome::new(ExecResult::fail(e.to_string()), output)),
        }
    }
}

/// Common post-processing: merge exported variables, then prefer an explicit
/// result over `verdict`, falling back to the pass condition.
///
/// 通用后处理：合并导出的变量，然后优先使用显式结果，其次是 `verdict`，最后回退到通过条件。
pub(crate) fn settle(
    step: &TestStep,
    env: &EnvCtx,
    output: String,
    verdict: Option<ExecResult>,
) -> StepOutcome {
    env.read_sat_env_from_log(&output);
    let result = check::parse_explicit_result(&output)
        .or(verdict)
        .unwrap_or_else(|| check::check_result(step, &output, env));
    StepOutcome::new(result, output)
}

/// Both backends, selected per step by command type.
/// 两个后端，按步骤的命令类型选择。
#[derive(Clone)]
pub struct Runners {
    pub script: Arc<dyn CommandRunner>,
    pub module: Arc<dyn CommandRunner>,
}

impl Runners {
    pub fn new(script: Arc<dyn CommandRunner>, module: Arc<dyn CommandRunner>) -> Self {
        Self { script, module }
    }

    /// Builds the process-based backends from the harness configuration.
    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        let timeout = config.run.step_timeout();
        Ok(Self {
            script: Arc::new(ScriptRunner::new(ProcessBackend::from_config(
                &config.script,
                timeout,
            )?)),
            module: Arc::new(ModuleRunner::new(ProcessBackend::from_config(
                &config.module,
                timeout,
            )?)),
        })
    }

    /// Uses one runner for every command type.
    pub fn uniform(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            script: Arc::clone(&runner),
            module: runner,
        }
    }

    /// Picks the backend for a step, or `None` for an unsupported command type.
    pub fn for_step(&self, step: &TestStep) -> Option<&Arc<dyn CommandRunner>> {
        match step.command_type {
            CommandType::Unsupported => None,
            kind if kind.is_module() => Some(&self.module),
            _ => Some(&self.script),
        }
    }
}
