//! # Core Module / 核心模块
//!
//! This module contains the core functionality of the harness: the data
//! models, harness configuration, the definition store, the environment
//! context, the test execution engine and the controller that runs it.
//!
//! 此模块包含测试台的核心功能：数据模型、测试台配置、定义存储、
//! 环境上下文、测试执行引擎以及运行它的控制器。

pub mod config;
pub mod controller;
pub mod env;
pub mod execution;
pub mod models;
pub mod planner;
pub mod store;

// Re-exports
pub use config::HarnessConfig;
pub use controller::{RunController, RunReport};
pub use env::EnvCtx;
pub use execution::{Engine, RunContext, RunTarget};
pub use models::ExecResult;
pub use store::{DefinitionStore, TomlStore};
