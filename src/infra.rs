//! # Infrastructure Module / 基础设施模块
//!
//! This module provides infrastructure services for the harness:
//! child process execution with output capture, script staging on disk,
//! and i18n support.
//!
//! 此模块为测试台提供基础设施服务：
//! 带输出捕获的子进程执行、磁盘上的脚本暂存以及国际化支持。

pub mod command;
pub mod fs;

// Re-export i18n functions for easier access
pub use rust_i18n::t;
