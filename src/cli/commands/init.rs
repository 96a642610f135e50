//! # Harness Initialization Module / 测试台初始化模块
//!
//! This module implements the `init` command: an interactive wizard that
//! writes a `SatHarness.toml` and, optionally, a sample `definitions.toml`
//! next to it.
//!
//! 此模块实现 `init` 命令：一个交互式向导，用于写出 `SatHarness.toml`，
//! 并可选地在其旁边写出示例 `definitions.toml`。
//!
//! ## Features / 功能特性
//!
//! - **Interactive Wizard**: Prompts for backend roots, launchers and report settings
//! - **Sample Definitions**: A small stand/group/case/step tree to start from
//! - **Overwrite Protection**: Confirmation prompts before overwriting existing files
//!
//! - **交互式向导**: 提示输入后端根目录、启动命令和报告设置
//! - **示例定义**: 一个可作为起点的小型测试台/测试组/用例/步骤树
//! - **覆盖保护**: 覆盖现有文件前的确认提示

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{Confirm, Input, theme::ColorfulTheme};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::config::{DEFAULT_CONFIG_TEMPLATE, HarnessConfig};
use crate::infra::t;

/// The definitions file written next to the harness config.
pub const SAMPLE_DEFINITIONS_FILE: &str = "definitions.toml";

/// A minimal but complete definition tree.
pub const SAMPLE_DEFINITIONS: &str = r#"# sat-runner test definitions

[[stands]]
id = "bench"
name = "Bench"
groups = ["smoke"]

[[groups]]
id = "smoke"
name = "Smoke"
cases = ["boot"]

[[cases]]
id = "boot"
name = "Boot check"
init_step = "prepare"
cleanup_step = "teardown"
sequence = [
    { step = "ping", sequence = 1 },
    { step = "version", sequence = 2, ignore_fail = true },
]

[[steps]]
id = "prepare"
name = "Prepare"
command_type = "script-inline"
command = "echo preparing ${SAT_VEHICLE_NAME:-bench}"
pass_condition = "white-match"
match_list = ["PREPARING"]

[[steps]]
id = "ping"
name = "Ping"
command_type = "script-inline"
command = "echo device ready"
pass_condition = "white-match"
match_list = ["READY"]

[[steps]]
id = "version"
name = "Version"
command_type = "script-inline"
command = "echo '@@SAT_ENV FW_VERSION=1.0.0'"
pass_condition = "white-match"
match_list = ["FW_VERSION"]

[[steps]]
id = "teardown"
name = "Teardown"
command_type = "script-inline"
command = "echo done"
pass_condition = "white-match"
match_list = ["DONE"]

[[vehicles]]
id = "demo"
name = "Demo vehicle"
model = "demo-model"
pin = "0000"
attributes = """
REGION=EU
"""

[[models]]
id = "demo-model"
name = "Demo model"
attributes = "ECU_COUNT=1"
"#;

/// Runs the interactive wizard to generate a harness configuration.
///
/// In non-interactive mode the commented default template is written, plus the
/// sample definitions if no definitions file exists yet.
///
/// 运行交互式向导以生成测试台配置。
/// 非交互模式下写出带注释的默认模板；若尚无定义文件，还会写出示例定义。
pub fn run_init_wizard(config_path: &Path, language: &str, non_interactive: bool) -> Result<()> {
    let defs_path = sample_definitions_path(config_path);

    if non_interactive {
        write_file(config_path, DEFAULT_CONFIG_TEMPLATE, language)?;
        if !defs_path.exists() {
            write_file(&defs_path, SAMPLE_DEFINITIONS, language)?;
        }
        println!("{}", t!("init_usage_hint", locale = language));
        return Ok(());
    }

    let theme = ColorfulTheme::default();
    println!("\n{}", t!("init_wizard_welcome", locale = language).cyan().bold());
    println!("{}", t!("init_wizard_description", locale = language));

    if config_path.exists() && !confirm_overwrite(&theme, config_path, language)? {
        println!("{}", t!("init_aborted", locale = language));
        return Ok(());
    }

    let mut config = HarnessConfig {
        language: language.to_string(),
        ..HarnessConfig::default()
    };
    config.script.root = prompt_path(&theme, &t!("init_script_root_prompt", locale = language), &config.script.root)?;
    config.script.launcher = Input::with_theme(&theme)
        .with_prompt(t!("init_script_launcher_prompt", locale = language))
        .default(config.script.launcher.clone())
        .interact_text()?;
    config.module.root = prompt_path(&theme, &t!("init_module_root_prompt", locale = language), &config.module.root)?;
    config.module.launcher = Input::with_theme(&theme)
        .with_prompt(t!("init_module_launcher_prompt", locale = language))
        .default(config.module.launcher.clone())
        .interact_text()?;
    config.audit.report_dir = prompt_path(&theme, &t!("init_report_dir_prompt", locale = language), &config.audit.report_dir)?;
    config.audit.title = Input::with_theme(&theme)
        .with_prompt(t!("init_title_prompt", locale = language))
        .default(config.audit.title.clone())
        .interact_text()?;

    let content = toml::to_string_pretty(&config)
        .context(t!("init_serialize_failed", locale = language).to_string())?;
    write_file(config_path, &content, language)?;

    let want_sample = Confirm::with_theme(&theme)
        .with_prompt(t!("init_sample_prompt", locale = language, path = defs_path.display()))
        .default(!defs_path.exists())
        .interact()
        .context(t!("init_user_confirmation_failed", locale = language).to_string())?;
    if want_sample && (!defs_path.exists() || confirm_overwrite(&theme, &defs_path, language)?) {
        write_file(&defs_path, SAMPLE_DEFINITIONS, language)?;
    }

    println!("{}", t!("init_usage_hint", locale = language));
    Ok(())
}

fn sample_definitions_path(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .map(|dir| dir.join(SAMPLE_DEFINITIONS_FILE))
        .unwrap_or_else(|| PathBuf::from(SAMPLE_DEFINITIONS_FILE))
}

fn confirm_overwrite(theme: &ColorfulTheme, path: &Path, language: &str) -> Result<bool> {
    Confirm::with_theme(theme)
        .with_prompt(t!("init_overwrite_prompt", locale = language, path = path.display()))
        .default(false)
        .interact()
        .context(t!("init_user_confirmation_failed", locale = language).to_string())
}

fn prompt_path(theme: &ColorfulTheme, prompt: &str, default: &Path) -> Result<PathBuf> {
    let value: String = Input::with_theme(theme)
        .with_prompt(prompt)
        .default(default.display().to_string())
        .interact_text()?;
    Ok(PathBuf::from(value))
}

fn write_file(path: &Path, content: &str, language: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| t!("init_write_failed", locale = language, path = parent.display()).to_string())?;
    }
    fs::write(path, content)
        .with_context(|| t!("init_write_failed", locale = language, path = path.display()).to_string())?;

    println!(
        "{} {}",
        "✔".green(),
        t!("init_success_created", locale = language, path = path.display()).bold()
    );
    Ok(())
}
