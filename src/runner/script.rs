use async_trait::async_trait;
use colored::*;

use crate::core::env::EnvCtx;
use crate::core::models::{StepOutcome, TestStep};
use crate::infra::t;
use crate::runner::{CommandRunner, ProcessBackend, settle};

/// Runs steps as shell scripts: `<launcher> <file>`.
///
/// The exit status is not part of the verdict. A script that wants to fail on
/// its own prints an explicit `@@SAT_RESULT` line; otherwise the pass
/// condition decides.
///
/// 以 shell 脚本方式运行步骤：`<launcher> <file>`。
/// 退出状态不参与判定。脚本若想自行判定失败，需打印显式的 `@@SAT_RESULT` 行；否则由通过条件决定。
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    backend: ProcessBackend,
}

impl ScriptRunner {
    pub fn new(backend: ProcessBackend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &ProcessBackend {
        &self.backend
    }
}

#[async_trait]
impl CommandRunner for ScriptRunner {
    fn name(&self) -> &'static str {
        "script"
    }

    async fn exec(&self, step: &TestStep, env: &EnvCtx) -> StepOutcome {
        match self.backend.run(step, env).await {
            Ok((status, output)) => {
                if !status.success() {
                    println!(
                        "{}",
                        t!("runner.script_exit", name = &step.name, status = status).dimmed()
                    );
                }
                settle(step, env, output, None)
            }
            Err(outcome) => outcome,
        }
    }
}
