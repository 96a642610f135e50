use anyhow::Result;
use colored::*;
use std::path::Path;

use crate::{
    core::{env::EnvCtx, store::TomlStore},
    infra::t,
};

/// Loads a vehicle profile into a fresh environment context and prints it,
/// exactly as a run would see it before its first step.
pub fn execute(defs: &Path, vehicle: &str) -> Result<()> {
    let store = TomlStore::load(defs)?;
    let env = EnvCtx::new();
    env.update_vehicle_env(&store, vehicle)?;
    println!("{}", t!("env.header", vehicle = vehicle).bold());
    println!("{}", env.dump());
    Ok(())
}
