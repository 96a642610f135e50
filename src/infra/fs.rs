//! # File System Operations Module / 文件系统操作模块
//!
//! Staging helpers for the command runners: resolving file-based commands under
//! a backend root and writing inline command bodies to the backend's temp file.
//!
//! 命令运行器的暂存辅助功能：在后端根目录下解析基于文件的命令，
//! 以及将内联命令内容写入后端的临时文件。

use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Resolves a file-based command relative to `root`.
///
/// Returns `None` if the file does not exist, or if the reference tries to
/// leave the root (absolute paths, `..` components).
///
/// 相对于 `root` 解析基于文件的命令。
/// 如果文件不存在，或者引用试图离开根目录（绝对路径、`..` 组件），则返回 `None`。
pub fn resolve_script(root: &Path, reference: &str) -> Option<PathBuf> {
    let relative = Path::new(reference.trim());
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || relative.as_os_str().is_empty() {
        return None;
    }
    let path = root.join(relative);
    path.is_file().then_some(path)
}

/// Writes an inline command body to the backend's fixed temp file, creating
/// its parent directory if needed, and returns the file path.
///
/// Every inline execution of a backend goes through this one path.
///
/// 将内联命令内容写入后端固定的临时文件（必要时创建父目录），并返回文件路径。
/// 后端的每次内联执行都使用同一路径。
pub fn stage_inline(temp_file: &Path, body: &str) -> Result<PathBuf> {
    if let Some(parent) = temp_file.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create staging directory: {}", parent.display())
        })?;
    }
    let mut content = body.replace("\r\n", "\n");
    if !content.ends_with('\n') {
        content.push('\n');
    }
    fs::write(temp_file, content)
        .with_context(|| format!("Failed to write inline command: {}", temp_file.display()))?;
    Ok(temp_file.to_path_buf())
}

/// Makes sure a directory exists and returns its canonical path.
pub fn ensure_dir(path: &Path) -> Result<PathBuf> {
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    fs::canonicalize(path).with_context(|| format!("Failed to resolve path: {}", path.display()))
}
