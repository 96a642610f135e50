//! # Harness Configuration Module / 测试台配置模块
//!
//! Loads the harness settings (`SatHarness.toml`): where file-based scripts and
//! modules live, the fixed temp files used for inline commands, launcher
//! commands, report location and run timeouts.
//!
//! 加载测试台设置（`SatHarness.toml`）：基于文件的脚本和模块所在位置、
//! 内联命令使用的固定临时文件、启动命令、报告位置以及运行超时。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for one command runner backend.
/// 单个命令运行器后端的设置。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Root directory that file-based commands resolve under.
    /// 基于文件的命令所解析的根目录。
    pub root: PathBuf,
    /// The single temp file that inline command bodies are written to.
    /// 内联命令内容写入的唯一临时文件。
    pub temp_file: PathBuf,
    /// Launcher command line, e.g. `sh` or `python3 -u`.
    /// 启动命令行，例如 `sh` 或 `python3 -u`。
    pub launcher: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            report_dir: default_report_dir(),
            title: default_title(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// How long a stop request waits for the worker before giving up.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,
    /// Optional per-step timeout. An overrun kills the child process.
    #[serde(default)]
    pub step_timeout_secs: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            stop_timeout_secs: default_stop_timeout(),
            step_timeout_secs: None,
        }
    }
}

impl RunConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_secs.map(Duration::from_secs)
    }
}

/// Represents the whole harness configuration, loaded from a TOML file.
/// 代表从 TOML 文件加载的整个测试台配置。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarnessConfig {
    /// The language for console messages (e.g., "en", "zh-CN").
    /// 控制台消息使用的语言（例如 "en", "zh-CN"）。
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_script_backend")]
    pub script: BackendConfig,
    #[serde(default = "default_module_backend")]
    pub module: BackendConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub run: RunConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            script: default_script_backend(),
            module: default_module_backend(),
            audit: AuditConfig::default(),
            run: RunConfig::default(),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("sat-reports")
}

fn default_title() -> String {
    "ECU Acceptance Test".to_string()
}

fn default_stop_timeout() -> u64 {
    10
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("sat-runner")
}

fn default_script_backend() -> BackendConfig {
    BackendConfig {
        root: PathBuf::from("scripts"),
        temp_file: default_temp_dir().join("inline_script.sh"),
        launcher: "sh".to_string(),
    }
}

fn default_module_backend() -> BackendConfig {
    BackendConfig {
        root: PathBuf::from("modules"),
        temp_file: default_temp_dir().join("inline_module.py"),
        launcher: "python3 -u".to_string(),
    }
}

/// Loads and parses the harness configuration from a TOML file.
/// Path values are expanded with `shellexpand` (`~`, `$VAR`).
///
/// 从 TOML 文件加载并解析测试台配置。
/// 路径值会通过 `shellexpand` 展开（`~`、`$VAR`）。
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read harness config: {}", path.display()))?;
    parse_config(&content)
        .with_context(|| format!("Failed to parse harness config: {}", path.display()))
}

/// Parses a harness configuration from TOML text.
pub fn parse_config(content: &str) -> Result<HarnessConfig> {
    let mut config: HarnessConfig = toml::from_str(content)?;
    for backend in [&mut config.script, &mut config.module] {
        backend.root = expand_path(&backend.root)?;
        backend.temp_file = expand_path(&backend.temp_file)?;
    }
    config.audit.report_dir = expand_path(&config.audit.report_dir)?;
    Ok(config)
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .with_context(|| format!("Failed to expand path: {raw}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Splits a launcher command line into program and arguments.
/// 将启动命令行拆分为程序和参数。
pub fn split_launcher(launcher: &str) -> Result<Vec<String>> {
    let parts = shlex::split(launcher)
        .ok_or_else(|| anyhow::anyhow!("Failed to parse launcher: {}", launcher))?;
    if parts.is_empty() {
        anyhow::bail!("Empty launcher command.");
    }
    Ok(parts)
}

/// The commented default written by `sat-runner init`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# sat-runner harness configuration
language = "en"

[script]
# File-based scripts are resolved under this directory.
root = "scripts"
# Inline scripts are always written to this single file before running.
temp_file = "/tmp/sat-runner/inline_script.sh"
launcher = "sh"

[module]
root = "modules"
temp_file = "/tmp/sat-runner/inline_module.py"
launcher = "python3 -u"

[audit]
report_dir = "sat-reports"
title = "ECU Acceptance Test"

[run]
stop_timeout_secs = 10
# step_timeout_secs = 600
"#;
