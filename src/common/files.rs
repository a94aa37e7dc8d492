//! File copies and path resolution.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Copy `from` to `to`, creating parent directories and replacing any
/// existing file at `to`.
pub fn copy_file_with_dirs(from: &Path, to: &Path) -> Result<u64> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::copy(from, to)
        .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))
}

/// Absolute, symlink-free form of `path`, which need not exist yet.
///
/// `.` and `..` are folded first, then the longest existing ancestor is
/// canonicalized and the missing tail appended, so two spellings of one
/// location compare equal.
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    let path = if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    };
    let absolute = std::path::absolute(path)
        .with_context(|| format!("Failed to resolve {}", path.display()))?;

    let mut normal = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normal.pop();
            }
            other => normal.push(other),
        }
    }

    let mut existing = normal.as_path();
    let mut tail = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return Ok(tail.iter().rev().fold(canonical, |acc, name| acc.join(name)));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(normal),
        }
    }
}
