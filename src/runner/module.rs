use async_trait::async_trait;

use crate::core::env::EnvCtx;
use crate::core::models::{ExecResult, StepOutcome, TestStep};
use crate::runner::{CommandRunner, ProcessBackend, settle};

/// Runs steps as program units through an interpreter: `<launcher> <file>`.
///
/// A unit reports an explicit result by printing `@@SAT_RESULT <code> [text]`.
/// Exiting non-zero without one means the unit raised, which fails the step.
///
/// 通过解释器以程序单元方式运行步骤：`<launcher> <file>`。
/// 程序单元通过打印 `@@SAT_RESULT <code> [text]` 报告显式结果。
/// 若非零退出且没有显式结果，表示程序单元抛出了异常，步骤失败。
#[derive(Debug, Clone)]
pub struct ModuleRunner {
    backend: ProcessBackend,
}

impl ModuleRunner {
    pub fn new(backend: ProcessBackend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &ProcessBackend {
        &self.backend
    }
}

#[async_trait]
impl CommandRunner for ModuleRunner {
    fn name(&self) -> &'static str {
        "module"
    }

    async fn exec(&self, step: &TestStep, env: &EnvCtx) -> StepOutcome {
        match self.backend.run(step, env).await {
            Ok((status, output)) => {
                let raised = (!status.success()).then(|| {
                    let code = status
                        .code()
                        .map_or_else(|| "signal".to_string(), |c| c.to_string());
                    ExecResult::fail(format!("module exited with status {}", code))
                });
                settle(step, env, output, raised)
            }
            Err(outcome) => outcome,
        }
    }
}
