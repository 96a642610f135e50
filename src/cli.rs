// src/cli.rs
use anyhow::Result;
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use std::{env, path::PathBuf};

use crate::core::planner::Selector;
use crate::infra::t;

pub mod commands;

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
/// It looks for a `--lang <VALUE>` argument.
fn pre_parse_language() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    let pos = args.iter().position(|arg| arg == "--lang")?;
    args.get(pos + 1).cloned()
}

fn config_arg(locale: &str) -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .help(t!("arg_config", locale = locale).to_string())
        .value_name("CONFIG")
        .default_value("SatHarness.toml")
        .value_parser(clap::value_parser!(PathBuf))
        .action(ArgAction::Set)
}

fn defs_arg(locale: &str) -> Arg {
    Arg::new("defs")
        .short('d')
        .long("defs")
        .help(t!("arg_defs", locale = locale).to_string())
        .value_name("DEFINITIONS")
        .default_value("definitions.toml")
        .value_parser(clap::value_parser!(PathBuf))
        .action(ArgAction::Set)
}

/// Adds the mutually exclusive `--stand/--group/--case/--step` selection.
fn with_target_args(cmd: Command, locale: &str) -> Command {
    cmd.arg(
        Arg::new("stand")
            .long("stand")
            .help(t!("arg_stand", locale = locale).to_string())
            .value_name("STAND")
            .action(ArgAction::Set),
    )
    .arg(
        Arg::new("group")
            .long("group")
            .help(t!("arg_group", locale = locale).to_string())
            .value_name("GROUP")
            .action(ArgAction::Set),
    )
    .arg(
        Arg::new("case")
            .long("case")
            .help(t!("arg_case", locale = locale).to_string())
            .value_name("CASE")
            .action(ArgAction::Set),
    )
    .arg(
        Arg::new("step")
            .long("step")
            .help(t!("arg_step", locale = locale).to_string())
            .value_name("STEP")
            .action(ArgAction::Set),
    )
    .arg(
        Arg::new("force")
            .long("force")
            .help(t!("arg_force", locale = locale).to_string())
            .requires("group")
            .action(ArgAction::SetTrue),
    )
    .group(
        ArgGroup::new("target")
            .args(["stand", "group", "case", "step"])
            .required(true),
    )
}

fn build_cli(locale: &str) -> Command {
    Command::new("sat-runner")
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli_about", locale = locale).to_string())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli_lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .subcommand(with_target_args(
            Command::new("run")
                .about(t!("cmd_run_about", locale = locale).to_string())
                .arg(config_arg(locale))
                .arg(defs_arg(locale))
                .arg(
                    Arg::new("vehicle")
                        .long("vehicle")
                        .help(t!("arg_vehicle", locale = locale).to_string())
                        .value_name("VEHICLE")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("html")
                        .long("html")
                        .help(t!("arg_html", locale = locale).to_string())
                        .value_name("HTML")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                ),
            locale,
        ))
        .subcommand(with_target_args(
            Command::new("plan")
                .about(t!("cmd_plan_about", locale = locale).to_string())
                .arg(defs_arg(locale)),
            locale,
        ))
        .subcommand(
            Command::new("list")
                .about(t!("cmd_list_about", locale = locale).to_string())
                .arg(defs_arg(locale))
                .arg(
                    Arg::new("level")
                        .long("level")
                        .help(t!("arg_level", locale = locale).to_string())
                        .value_name("LEVEL")
                        .value_parser(["stands", "groups", "cases", "steps", "vehicles"])
                        .action(ArgAction::Set),
                ),
        )
        .subcommand(
            Command::new("env")
                .about(t!("cmd_env_about", locale = locale).to_string())
                .arg(defs_arg(locale))
                .arg(
                    Arg::new("vehicle")
                        .long("vehicle")
                        .help(t!("arg_vehicle", locale = locale).to_string())
                        .value_name("VEHICLE")
                        .required(true)
                        .action(ArgAction::Set),
                ),
        )
        .subcommand(
            Command::new("init")
                .about(t!("cmd_init_about", locale = locale).to_string())
                .arg(
                    Arg::new("non-interactive")
                        .long("non-interactive")
                        .help(t!("arg_non_interactive", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help(t!("arg_output", locale = locale).to_string())
                        .value_name("OUTPUT")
                        .default_value("SatHarness.toml")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                ),
        )
}

fn selector_from(matches: &ArgMatches) -> Option<Selector> {
    if let Some(key) = matches.get_one::<String>("stand") {
        return Some(Selector::Stand(key.clone()));
    }
    if let Some(key) = matches.get_one::<String>("group") {
        return Some(Selector::Group {
            key: key.clone(),
            force: matches.get_flag("force"),
        });
    }
    if let Some(key) = matches.get_one::<String>("case") {
        return Some(Selector::Case(key.clone()));
    }
    matches
        .get_one::<String>("step")
        .map(|key| Selector::Step(key.clone()))
}

fn path_arg(matches: &ArgMatches, id: &str) -> PathBuf {
    // Every path argument has a default value.
    matches.get_one::<PathBuf>(id).cloned().unwrap_or_default()
}

/// Parses the command line and runs the chosen subcommand.
///
/// Returns `Ok(false)` when the command ran but its verdict is negative (a run
/// that did not pass, a plan with problems), so the caller can set the exit code.
pub async fn run() -> Result<bool> {
    // Pre-parse language and initialize i18n first.
    let explicit_lang = pre_parse_language();
    let language = crate::init(explicit_lang.as_deref());

    let matches = build_cli(&language).get_matches();

    match matches.subcommand() {
        Some(("run", run_matches)) => {
            let selector = selector_from(run_matches)
                .ok_or_else(|| anyhow::anyhow!("No run target selected."))?;
            commands::run::execute(commands::run::RunArgs {
                config: path_arg(run_matches, "config"),
                defs: path_arg(run_matches, "defs"),
                vehicle: run_matches.get_one::<String>("vehicle").cloned(),
                selector,
                html: run_matches.get_one::<PathBuf>("html").cloned(),
                lang_override: explicit_lang.is_some(),
            })
            .await
        }
        Some(("plan", plan_matches)) => {
            let selector = selector_from(plan_matches)
                .ok_or_else(|| anyhow::anyhow!("No run target selected."))?;
            commands::plan::execute(&path_arg(plan_matches, "defs"), &selector)
        }
        Some(("list", list_matches)) => {
            let level = list_matches.get_one::<String>("level").map(String::as_str);
            commands::list::execute(&path_arg(list_matches, "defs"), level)?;
            Ok(true)
        }
        Some(("env", env_matches)) => {
            let vehicle = env_matches
                .get_one::<String>("vehicle")
                .cloned()
                .unwrap_or_default();
            commands::env::execute(&path_arg(env_matches, "defs"), &vehicle)?;
            Ok(true)
        }
        Some(("init", init_matches)) => {
            let non_interactive = init_matches.get_flag("non-interactive");
            commands::init::run_init_wizard(
                &path_arg(init_matches, "output"),
                &language,
                non_interactive,
            )?;
            Ok(true)
        }
        _ => Ok(true),
    }
}
