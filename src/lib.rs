//! # SAT Runner Library / SAT Runner 库
//!
//! This library provides the core functionality for the SAT runner, an
//! acceptance-test harness for vehicle ECUs. Test logic is organised as a
//! stand → group → case → step hierarchy whose leaves run external scripts or
//! interpreted modules; the engine walks it, classifies each step's output and
//! records a nested audit report.
//!
//! 此库为 SAT Runner 提供核心功能，这是一个面向车辆 ECU 的验收测试台。
//! 测试逻辑按 测试台 → 测试组 → 测试用例 → 测试步骤 的层级组织，叶子节点运行外部脚本或解释执行的模块；
//! 引擎遍历该层级、对每个步骤的输出分类并记录嵌套的审计报告。
//!
//! ## Modules / 模块
//!
//! - `core` - Data models, configuration, definition store, environment context and the execution engine
//! - `runner` - The script and module command runners and pass-condition evaluation
//! - `audit` - The audit recorder and the report document
//! - `infra` - Infrastructure services like command execution and file system operations
//! - `reporting` - HTML and console renderers
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 数据模型、配置、定义存储、环境上下文和执行引擎
//! - `runner` - 脚本与模块命令运行器以及通过条件评估
//! - `audit` - 审计记录器和报告文档
//! - `infra` - 基础设施服务，如命令执行和文件系统操作
//! - `reporting` - HTML 和控制台渲染器
//! - `cli` - 命令行接口和命令

pub mod audit;
pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;
pub mod runner;

// Re-export commonly used items
pub use core::config;
pub use core::env;
pub use core::execution;
pub use core::models;

/// Selects the console language.
///
/// `preferred` (from `--lang` or the harness config) wins when it names an
/// available locale; otherwise the system locale is detected. Either is matched
/// in full (e.g. "zh-CN"), then by its language part (e.g. "en" from "en-US"),
/// and finally falls back to "en". Returns the locale that was set.
///
/// 选择控制台语言。`preferred`（来自 `--lang` 或测试台配置）若为可用语言则优先使用；
/// 否则检测系统语言。两者都先完整匹配（如 "zh-CN"），再按语言部分匹配（如 "en-US" 中的 "en"），
/// 最后回退到 "en"。返回实际设置的语言。
pub fn init(preferred: Option<&str>) -> String {
    let available_locales = rust_i18n::available_locales!();
    let matches = |candidate: &str| -> Option<String> {
        if available_locales.contains(&candidate) {
            return Some(candidate.to_string());
        }
        candidate
            .split(['-', '_'])
            .next()
            .filter(|lang_code| available_locales.contains(lang_code))
            .map(str::to_string)
    };

    let lang = preferred
        .and_then(&matches)
        .or_else(|| sys_locale::get_locale().and_then(|locale| matches(&locale)))
        .unwrap_or_else(|| "en".to_string());

    rust_i18n::set_locale(&lang);
    lang
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
