//! # Data Models Module / 数据模型模块
//!
//! This module defines the core data structures used throughout the harness:
//! the four hierarchy levels (stand, group, case, step), the vehicle profile
//! records that feed the environment context, and the shared result type that
//! every level of the engine returns.
//!
//! 此模块定义了整个测试台中使用的核心数据结构：
//! 四个层级（测试台、测试组、测试用例、测试步骤）、为环境上下文提供数据的车辆配置记录，
//! 以及引擎每一层都返回的共享结果类型。

use serde::{Deserialize, Serialize};
use std::fmt;

fn default_enabled() -> bool {
    true
}

/// The command flavour of a test step. It selects both the backend (script or
/// module runner) and the staging mode (file reference or inline text).
///
/// 测试步骤的命令类型。它同时决定后端（脚本或模块运行器）和暂存方式（文件引用或内联文本）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandType {
    ScriptFile,
    ScriptInline,
    ModuleFile,
    ModuleInline,
    /// Any value the store did not recognise. Executing it fails.
    /// 存储中无法识别的任何值。执行时会失败。
    #[serde(other)]
    Unsupported,
}

impl CommandType {
    /// `true` if the command body is a path under the backend's script root.
    pub fn is_file(self) -> bool {
        matches!(self, CommandType::ScriptFile | CommandType::ModuleFile)
    }

    /// `true` if the step is handled by the module runner.
    pub fn is_module(self) -> bool {
        matches!(self, CommandType::ModuleFile | CommandType::ModuleInline)
    }
}

/// Policy for turning the raw output of a step into a verdict.
/// 将步骤原始输出转换为判定结果的策略。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassConditionKind {
    /// Always neutral; the output is only recorded.
    #[default]
    Record,
    /// Pass if any list entry appears in the output.
    WhiteMatch,
    /// Fail on the first list entry that appears in the output.
    BlackMatch,
    #[serde(other)]
    Unsupported,
}

/// The leaf unit of the hierarchy: one external script or program.
/// 层级结构的叶子单元：一个外部脚本或程序。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestStep {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub command_type: CommandType,
    /// A path relative to the backend root, or the inline command text.
    /// 相对于后端根目录的路径，或内联命令文本。
    pub command: String,
    #[serde(default)]
    pub pass_condition: PassConditionKind,
    /// Ordered pattern lines. Entries may reference `${KEY}` environment values.
    /// 有序的匹配行。条目可以引用 `${KEY}` 环境变量。
    #[serde(default)]
    pub match_list: Vec<String>,
}

/// Binds a step into a case's main sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSequenceEntry {
    pub step: String,
    pub sequence: i32,
    #[serde(default)]
    pub ignore_fail: bool,
}

/// An ordered sequence of steps with optional init and cleanup steps.
/// 有序的步骤序列，带有可选的初始化和清理步骤。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub init_step: Option<String>,
    #[serde(default)]
    pub cleanup_step: Option<String>,
    #[serde(default)]
    pub sequence: Vec<StepSequenceEntry>,
}

impl TestCase {
    /// Returns the main sequence in execution order. Entries sharing a sequence
    /// number keep their insertion order.
    ///
    /// 按执行顺序返回主序列。序号相同的条目保持插入顺序。
    pub fn ordered_sequence(&self) -> Vec<&StepSequenceEntry> {
        let mut entries: Vec<&StepSequenceEntry> = self.sequence.iter().collect();
        // `sort_by_key` is stable.
        entries.sort_by_key(|entry| entry.sequence);
        entries
    }
}

/// A parent → child group edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupEdge {
    pub group: String,
    /// Bypass the per-run result cache for this child.
    /// 对该子组绕过单次运行的结果缓存。
    #[serde(default)]
    pub force_exec: bool,
}

/// A recursive grouping of sub-groups and cases.
/// 子组和用例的递归分组。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub children: Vec<GroupEdge>,
    #[serde(default)]
    pub cases: Vec<String>,
}

/// The root of the hierarchy: an ordered set of groups.
/// 层级结构的根：一组有序的测试组。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestStand {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// The vehicle under test, including its PIN and connectivity attributes.
/// 被测车辆，包括其 PIN 码和连接属性。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pin: Option<String>,
    #[serde(default)]
    pub wifi: Option<String>,
    #[serde(default)]
    pub ble: Option<String>,
    #[serde(default)]
    pub adb: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub pass_condition: Option<String>,
    /// Free-text `KEY=VALUE` lines.
    #[serde(default)]
    pub attributes: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleModel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub attributes: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassCondition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub attributes: String,
}

/// The coarse verdict carried by a result code.
/// 结果码所表示的粗粒度判定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Pass,
    Neutral,
    Fail,
}

/// The result every level of the hierarchy returns.
///
/// `code > 0` is a pass, `code == 0` is a neutral/record outcome (ran without a
/// verdict, or disabled) and `code < 0` is a failure whose magnitude may carry a
/// finer diagnostic code.
///
/// 层级结构中每一层返回的结果。
///
/// `code > 0` 表示通过，`code == 0` 表示中性/记录结果（运行了但没有判定，或已禁用），
/// `code < 0` 表示失败，其绝对值可以携带更细的诊断码。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    pub code: i32,
    pub description: String,
}

impl ExecResult {
    pub fn pass() -> Self {
        Self {
            code: 1,
            description: String::new(),
        }
    }

    pub fn neutral(description: impl Into<String>) -> Self {
        Self {
            code: 0,
            description: description.into(),
        }
    }

    pub fn fail(description: impl Into<String>) -> Self {
        Self::with_code(-1, description)
    }

    pub fn with_code(code: i32, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    /// The neutral result of a disabled entity.
    pub fn disabled() -> Self {
        Self::neutral(DISABLED)
    }

    /// The neutral result of a node cut short by a stop request before
    /// anything in it failed.
    pub fn stopped() -> Self {
        Self::neutral(STOPPED)
    }

    pub fn outcome(&self) -> Outcome {
        match self.code {
            c if c > 0 => Outcome::Pass,
            0 => Outcome::Neutral,
            _ => Outcome::Fail,
        }
    }

    pub fn is_pass(&self) -> bool {
        self.code > 0
    }

    pub fn is_fail(&self) -> bool {
        self.code < 0
    }

    /// Folds a child's result into this aggregate: the worst (lowest) code wins,
    /// and the descriptions of non-passing children accumulate.
    ///
    /// 将子节点结果合并到此聚合结果中：最差（最低）的结果码胜出，
    /// 未通过子节点的描述会累加。
    pub fn absorb(&mut self, child_name: &str, child: &ExecResult) {
        if child.is_pass() {
            return;
        }
        if child.code < self.code {
            self.code = child.code;
        }
        if !self.description.is_empty() {
            self.description.push('\n');
        }
        self.description
            .push_str(&format!("{}: {}", child_name, child.description));
    }

    /// Records a child's description without letting its code affect this result.
    /// Used for failures a case was told to ignore.
    pub fn note(&mut self, child_name: &str, child: &ExecResult) {
        if !self.description.is_empty() {
            self.description.push('\n');
        }
        self.description
            .push_str(&format!("{}: {} (ignored)", child_name, child.description));
    }
}

impl fmt::Display for ExecResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "{:?} ({})", self.outcome(), self.code)
        } else {
            write!(f, "{:?} ({}): {}", self.outcome(), self.code, self.description)
        }
    }
}

/// Description used for disabled entities.
pub const DISABLED: &str = "disabled";

/// Description used for nodes a stop request cut short.
pub const STOPPED: &str = "stopped";

/// The terminal (or in-flight) state of one node, as shown in the audit.
/// 单个节点的最终（或进行中）状态，用于审计报告展示。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    Pending,
    Running,
    Passed,
    Neutral,
    Failed,
    Skipped,
    Aborted,
}

impl NodeState {
    /// Derives the terminal state of a node from how it finished.
    pub fn settle(result: &ExecResult, disabled: bool, aborted: bool) -> Self {
        if disabled {
            NodeState::Skipped
        } else if aborted {
            NodeState::Aborted
        } else {
            match result.outcome() {
                Outcome::Pass => NodeState::Passed,
                Outcome::Neutral => NodeState::Neutral,
                Outcome::Fail => NodeState::Failed,
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeState::Pending => "PENDING",
            NodeState::Running => "RUNNING",
            NodeState::Passed => "PASSED",
            NodeState::Neutral => "NEUTRAL",
            NodeState::Failed => "FAILED",
            NodeState::Skipped => "SKIPPED",
            NodeState::Aborted => "ABORTED",
        }
    }
}

/// The hierarchy level of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Stand,
    Group,
    Case,
    Step,
}

impl NodeKind {
    pub fn label(self) -> &'static str {
        match self {
            NodeKind::Stand => "Stand",
            NodeKind::Group => "Group",
            NodeKind::Case => "Case",
            NodeKind::Step => "Step",
        }
    }
}

/// What a command runner hands back for one step.
/// 命令运行器为单个步骤返回的内容。
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub result: ExecResult,
    /// Combined stdout/stderr of the child process.
    pub output: String,
}

impl StepOutcome {
    pub fn new(result: ExecResult, output: impl Into<String>) -> Self {
        Self {
            result,
            output: output.into(),
        }
    }
}
