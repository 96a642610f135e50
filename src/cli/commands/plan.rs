use anyhow::Result;
use colored::*;
use std::path::Path;

use crate::{
    core::{
        planner::{self, Selector},
        store::TomlStore,
    },
    infra::t,
    reporting::print_plan,
};

/// Executes the plan command: resolves the target and previews the run.
/// Returns `false` when the plan reaches a missing reference or a cycle.
pub fn execute(defs: &Path, selector: &Selector) -> Result<bool> {
    let store = TomlStore::load(defs)?;
    let target = planner::resolve_target(&store, selector)?;
    let plan = planner::plan_run(&store, &target);
    print_plan(&target.to_string(), &plan);

    let dangling = store.dangling_references();
    if !dangling.is_empty() {
        println!("\n{}", t!("plan.dangling_header").yellow());
        for entity in &dangling {
            println!("  - {}", entity);
        }
    }
    Ok(plan.is_clean())
}
