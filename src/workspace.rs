//! Stage directories under the work root.
//!
//! Layout: `<work_root>/cli/{patched,aligned,signed}`. Subdirectories are
//! created on first use. Every cleanup call site goes through
//! [`Workspace::delete`]: a forced call always deletes, a non-forced call
//! deletes only in low-storage mode.

use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Name of the directory the stage subdirectories live in.
pub const CLI_DIR: &str = "cli";

/// One of the three intermediate stage directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageDir {
    Patched,
    Aligned,
    Signed,
}

impl StageDir {
    pub const ALL: [StageDir; 3] = [StageDir::Patched, StageDir::Aligned, StageDir::Signed];

    pub fn name(self) -> &'static str {
        match self {
            StageDir::Patched => "patched",
            StageDir::Aligned => "aligned",
            StageDir::Signed => "signed",
        }
    }
}

impl fmt::Display for StageDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The work root of one run.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    low_storage: bool,
}

impl Workspace {
    /// Wipe `root` completely and return a workspace over it.
    ///
    /// Fails if an existing root cannot be removed: reusing stale stage
    /// outputs would silently ship old artifacts.
    pub fn reset(root: &Path, low_storage: bool) -> Result<Self> {
        remove_dir(root).with_context(|| {
            format!(
                "Failed to delete work directory {}. Remove it manually and retry.",
                root.display()
            )
        })?;
        Ok(Self {
            root: root.to_path_buf(),
            low_storage,
        })
    }

    /// Workspace over `root` without touching the disk.
    pub fn existing(root: &Path, low_storage: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            low_storage,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a stage directory, whether or not it exists yet.
    pub fn path(&self, dir: StageDir) -> PathBuf {
        self.root.join(CLI_DIR).join(dir.name())
    }

    /// Path of a stage directory, created if missing.
    pub fn stage_dir(&self, dir: StageDir) -> Result<PathBuf> {
        let path = self.path(dir);
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(path)
    }

    /// Delete a stage directory per the cleanup policy.
    ///
    /// Returns whether anything was removed. A missing directory is fine.
    pub fn delete(&self, dir: StageDir, force: bool) -> Result<bool> {
        if !force && !self.low_storage {
            return Ok(false);
        }
        let path = self.path(dir);
        let removed = remove_dir(&path)
            .with_context(|| format!("Failed to delete {} directory {}", dir, path.display()))?;
        if removed {
            debug!(dir = %dir, "deleted stage directory");
        }
        Ok(removed)
    }

    /// Delete the whole work root.
    pub fn delete_root(&self) -> Result<bool> {
        remove_dir(&self.root)
            .with_context(|| format!("Failed to delete work directory {}", self.root.display()))
    }
}

fn remove_dir(path: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reset_wipes_stale_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("work");
        fs::create_dir_all(root.join("cli/signed")).unwrap();
        fs::write(root.join("cli/signed/base.apk"), b"stale").unwrap();

        let ws = Workspace::reset(&root, false).unwrap();
        assert!(!root.exists());
        assert!(!ws.path(StageDir::Signed).exists());
    }

    #[test]
    fn test_stage_dirs_are_lazy() {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::reset(&temp.path().join("work"), false).unwrap();

        assert!(!ws.path(StageDir::Aligned).exists());
        let aligned = ws.stage_dir(StageDir::Aligned).unwrap();
        assert!(aligned.is_dir());
        assert!(aligned.ends_with("cli/aligned"));
        assert!(!ws.path(StageDir::Patched).exists());
    }

    #[test]
    fn test_conditional_delete_respects_low_storage() {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::reset(&temp.path().join("work"), false).unwrap();
        let patched = ws.stage_dir(StageDir::Patched).unwrap();

        assert!(!ws.delete(StageDir::Patched, false).unwrap());
        assert!(patched.exists());

        assert!(ws.delete(StageDir::Patched, true).unwrap());
        assert!(!patched.exists());
    }

    #[test]
    fn test_low_storage_deletes_without_force() {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::reset(&temp.path().join("work"), true).unwrap();
        let signed = ws.stage_dir(StageDir::Signed).unwrap();

        assert!(ws.delete(StageDir::Signed, false).unwrap());
        assert!(!signed.exists());
        // Already gone: not an error.
        assert!(!ws.delete(StageDir::Signed, false).unwrap());
    }

    #[test]
    fn test_delete_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("work");
        let ws = Workspace::reset(&root, false).unwrap();
        ws.stage_dir(StageDir::Patched).unwrap();

        assert!(ws.delete_root().unwrap());
        assert!(!root.exists());
    }
}
