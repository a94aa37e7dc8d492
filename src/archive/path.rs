//! Entry path resolution.
//!
//! Archive entry names are `/`-separated and relative to the container root.
//! Resolution is a pure string mapping: it never touches the archive or disk.

use std::fmt;
use std::path::{Component, Path};

use super::ArchiveError;

/// A normalized entry path inside an archive.
///
/// The root of the archive is the empty path. Directory paths never carry a
/// trailing slash; that is a detail of how directories are stored in the
/// central directory, not of how they are addressed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntryPath(String);

impl EntryPath {
    /// Resolve a user-supplied path.
    ///
    /// Backslashes are treated as separators, empty and `.` components are
    /// dropped and `..` pops one level without ever leaving the root.
    pub fn new(path: &str) -> Self {
        let mut parts: Vec<&str> = Vec::new();
        for part in path.split(['/', '\\']) {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }
        Self(parts.join("/"))
    }

    /// Resolve a relative filesystem path (e.g. from a directory walk).
    pub fn from_relative(path: &Path) -> Result<Self, ArchiveError> {
        let mut parts = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => {
                    let part = part.to_str().ok_or_else(|| ArchiveError::NonUtf8Path {
                        path: path.to_path_buf(),
                    })?;
                    parts.push(part);
                }
                Component::ParentDir => {
                    parts.pop();
                }
                _ => {}
            }
        }
        Ok(Self(parts.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// First component, or `None` for the root.
    pub fn top_level(&self) -> Option<&str> {
        self.0.split('/').next().filter(|s| !s.is_empty())
    }

    /// The containing directory, or `None` for the root.
    pub fn parent(&self) -> Option<EntryPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::default()),
        }
    }

    /// Every proper ancestor below the root, outermost first.
    ///
    /// `a/b/c` yields `a`, `a/b`.
    pub fn ancestors(&self) -> Vec<EntryPath> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(dir) = current {
            if dir.is_root() {
                break;
            }
            current = dir.parent();
            out.push(dir);
        }
        out.reverse();
        out
    }

    /// Whether `other` lies strictly beneath this path.
    pub fn is_ancestor_of(&self, other: &str) -> bool {
        if self.is_root() {
            return !other.is_empty();
        }
        other.len() > self.0.len()
            && other.starts_with(self.0.as_str())
            && other.as_bytes()[self.0.len()] == b'/'
    }
}

impl fmt::Display for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl AsRef<str> for EntryPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
