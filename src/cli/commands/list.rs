use anyhow::Result;
use colored::*;
use std::path::Path;

use crate::{
    core::store::{DefinitionStore, TomlStore},
    infra::t,
};

fn section(title: &str, rows: Vec<(&str, &str)>) {
    println!("{}", title.bold());
    if rows.is_empty() {
        println!("  {}", t!("list.empty").dimmed());
    }
    for (id, name) in rows {
        println!("  {:<24} {}", id.cyan(), name);
    }
}

/// Lists the enabled entities of one level, or of every level.
pub fn execute(defs: &Path, level: Option<&str>) -> Result<()> {
    let store = TomlStore::load(defs)?;
    let wants = |name: &str| level.is_none_or(|l| l == name);

    if wants("stands") {
        section(
            &t!("list.stands"),
            store.enabled_stands().into_iter().map(|s| (s.id.as_str(), s.name.as_str())).collect(),
        );
    }
    if wants("groups") {
        section(
            &t!("list.groups"),
            store.enabled_groups().into_iter().map(|g| (g.id.as_str(), g.name.as_str())).collect(),
        );
    }
    if wants("cases") {
        section(
            &t!("list.cases"),
            store.enabled_cases().into_iter().map(|c| (c.id.as_str(), c.name.as_str())).collect(),
        );
    }
    if wants("steps") {
        section(
            &t!("list.steps"),
            store.enabled_steps().into_iter().map(|s| (s.id.as_str(), s.name.as_str())).collect(),
        );
    }
    if wants("vehicles") {
        section(
            &t!("list.vehicles"),
            store.vehicles().iter().map(|v| (v.id.as_str(), v.name.as_str())).collect(),
        );
    }
    Ok(())
}
