//! Zip container as a mutable virtual filesystem.
//!
//! Patch output is grafted back into a copy of the original package without
//! re-encoding the entries that did not change:
//! - Untouched entries are raw-copied on close (compressed bytes, CRC and
//!   headers preserved).
//! - Imported, written or re-stored entries are re-encoded.
//!
//! The container is rewritten beside the original and renamed over it, so a
//! failed close never leaves a half-written file at the original path.

mod error;
pub mod path;
mod tree;

pub use error::ArchiveError;
pub use path::EntryPath;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, Clone)]
enum Data {
    /// Still backed by the source container.
    Original {
        index: usize,
        method: CompressionMethod,
    },
    Bytes(Vec<u8>),
    Disk(PathBuf),
}

#[derive(Debug, Clone)]
enum Entry {
    Dir { origin: Option<usize> },
    File { data: Data, stored: bool },
}

/// An open zip container.
///
/// Must be finished with [`Archive::close`], which consumes the handle.
/// Dropping it instead releases the source file and discards every change.
pub struct Archive {
    path: PathBuf,
    source: ZipArchive<BufReader<File>>,
    /// Entry key for each index of the source central directory.
    origin: Vec<String>,
    entries: BTreeMap<String, Entry>,
}

impl Archive {
    /// Open an existing zip container.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let open_err = |source| ArchiveError::Open {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(|e| open_err(e.into()))?;
        let mut source = ZipArchive::new(BufReader::new(file)).map_err(open_err)?;

        let mut origin = Vec::with_capacity(source.len());
        let mut entries = BTreeMap::new();
        for index in 0..source.len() {
            let file = source.by_index_raw(index)?;
            let key = EntryPath::new(file.name()).as_str().to_string();
            let entry = if file.is_dir() {
                Entry::Dir {
                    origin: Some(index),
                }
            } else {
                Entry::File {
                    data: Data::Original {
                        index,
                        method: file.compression(),
                    },
                    stored: false,
                }
            };
            if !key.is_empty() {
                entries.insert(key.clone(), entry);
            }
            origin.push(key);
        }

        debug!(path = %path.display(), entries = entries.len(), "opened archive");
        Ok(Self {
            path: path.to_path_buf(),
            source,
            origin,
            entries,
        })
    }

    /// Open, run `f`, and commit only if `f` succeeded.
    ///
    /// On failure the handle is dropped (source released, nothing written)
    /// before the error is returned.
    pub fn edit<T, F>(path: &Path, f: F) -> Result<T, ArchiveError>
    where
        F: FnOnce(&mut Archive) -> Result<T, ArchiveError>,
    {
        let mut archive = Archive::open(path)?;
        let value = f(&mut archive)?;
        archive.close()?;
        Ok(value)
    }

    /// Path of the backing container.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Map a path onto an entry handle. No I/O.
    pub fn resolve(&self, path: &str) -> EntryPath {
        EntryPath::new(path)
    }

    /// Whether `path` names a file or a directory (explicit or implied).
    pub fn contains(&self, path: &str) -> bool {
        let path = self.resolve(path);
        self.entries.contains_key(path.as_str()) || self.has_children(&path)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        let path = self.resolve(path);
        matches!(self.entries.get(path.as_str()), Some(Entry::Dir { .. })) || self.has_children(&path)
    }

    /// Whether the file at `path` will be written without compression.
    ///
    /// `None` if there is no such file.
    pub fn is_stored(&self, path: &str) -> Option<bool> {
        match self.entries.get(self.resolve(path).as_str()) {
            Some(Entry::File {
                data: Data::Original { method, .. },
                stored,
            }) => Some(*stored || *method == CompressionMethod::Stored),
            Some(Entry::File { stored, .. }) => Some(*stored),
            _ => None,
        }
    }

    /// Names of all file entries, sorted.
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, e)| matches!(e, Entry::File { .. }))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Force each listed entry to be stored without compression.
    ///
    /// Decompressed content is preserved. Paths that are not in the archive
    /// are skipped: the exception list can name entries that a resource
    /// import replaced or dropped.
    pub fn mark_stored<I, S>(&mut self, paths: I) -> Result<(), ArchiveError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            let path = self.resolve(path.as_ref());
            if self.is_dir(path.as_str()) {
                return Err(ArchiveError::NotAFile(path.to_string()));
            }
            match self.entries.get_mut(path.as_str()) {
                Some(Entry::File { stored, .. }) => *stored = true,
                _ => debug!(entry = %path, "not in archive, nothing to store"),
            }
        }
        Ok(())
    }

    /// Remove a file, or a directory and everything beneath it.
    pub fn delete_recursive(&mut self, path: &str) -> Result<(), ArchiveError> {
        let target = self.resolve(path);

        if matches!(self.entries.get(target.as_str()), Some(Entry::File { .. })) {
            self.entries.remove(target.as_str());
            trace!(entry = %target, "deleted file");
            return Ok(());
        }

        if !target.is_root() && !self.is_dir(target.as_str()) {
            return Err(ArchiveError::NotFound(target.to_string()));
        }

        let order = tree::post_order(self.entries.keys().map(String::as_str), &target);
        for name in &order {
            self.entries.remove(name);
        }
        trace!(entry = %target, removed = order.len(), "deleted directory");
        Ok(())
    }

    /// Copy a directory tree into the archive root.
    ///
    /// Existing top-level entries that share a name with a child of `source`
    /// are deleted first, so importing the same tree twice never leaves
    /// stale entries behind.
    pub fn import_tree(&mut self, source: &Path) -> Result<(), ArchiveError> {
        if !source.is_dir() {
            return Err(ArchiveError::NotADirectory(source.to_path_buf()));
        }

        let mut top_level = Vec::new();
        for child in fs::read_dir(source)? {
            let child = child?;
            let name = child.file_name();
            let name = name.to_str().ok_or_else(|| ArchiveError::NonUtf8Path {
                path: child.path(),
            })?;
            top_level.push(name.to_string());
        }
        for name in &top_level {
            if self.contains(name) {
                self.delete_recursive(name)?;
            }
        }

        let mut imported = 0usize;
        for entry in WalkDir::new(source)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|_| ArchiveError::NotADirectory(source.to_path_buf()))?;
            let key = EntryPath::from_relative(relative)?;

            if entry.file_type().is_dir() {
                self.ensure_dir(&key)?;
            } else {
                self.put_file(&key, Data::Disk(entry.path().to_path_buf()))?;
                imported += 1;
            }
        }

        debug!(source = %source.display(), files = imported, "imported tree");
        Ok(())
    }

    /// Write (or overwrite) one file entry. Parent directories are created.
    pub fn write_entry(&mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Result<(), ArchiveError> {
        let key = self.resolve(path);
        if key.is_root() {
            return Err(ArchiveError::NotAFile(key.to_string()));
        }
        self.put_file(&key, Data::Bytes(bytes.into()))
    }

    /// Commit all changes and release the container.
    pub fn close(mut self) -> Result<(), ArchiveError> {
        let partial = partial_path(&self.path);
        if let Err(e) = self.write_to(&partial) {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }

        let Archive { path, source, .. } = self;
        drop(source);
        fs::rename(&partial, &path)?;
        debug!(path = %path.display(), "closed archive");
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn has_children(&self, dir: &EntryPath) -> bool {
        if dir.is_root() {
            return !self.entries.is_empty();
        }
        let prefix = format!("{}/", dir.as_str());
        self.entries
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(name, _)| name.starts_with(&prefix))
    }

    fn ensure_parents(&mut self, path: &EntryPath) -> Result<(), ArchiveError> {
        for dir in path.ancestors() {
            match self.entries.get(dir.as_str()) {
                Some(Entry::File { .. }) => {
                    return Err(ArchiveError::Conflict {
                        path: path.to_string(),
                        existing: dir.to_string(),
                    })
                }
                Some(Entry::Dir { .. }) => {}
                None => {
                    self.entries
                        .insert(dir.as_str().to_string(), Entry::Dir { origin: None });
                }
            }
        }
        Ok(())
    }

    fn ensure_dir(&mut self, path: &EntryPath) -> Result<(), ArchiveError> {
        self.ensure_parents(path)?;
        match self.entries.get(path.as_str()) {
            Some(Entry::File { .. }) => Err(ArchiveError::Conflict {
                path: path.to_string(),
                existing: path.to_string(),
            }),
            Some(Entry::Dir { .. }) => Ok(()),
            None => {
                self.entries
                    .insert(path.as_str().to_string(), Entry::Dir { origin: None });
                Ok(())
            }
        }
    }

    fn put_file(&mut self, path: &EntryPath, data: Data) -> Result<(), ArchiveError> {
        if self.is_dir(path.as_str()) {
            return Err(ArchiveError::Conflict {
                path: path.to_string(),
                existing: format!("{}/", path),
            });
        }
        self.ensure_parents(path)?;
        self.entries.insert(
            path.as_str().to_string(),
            Entry::File {
                data,
                stored: false,
            },
        );
        Ok(())
    }

    fn write_to(&mut self, dest: &Path) -> Result<(), ArchiveError> {
        let mut writer = ZipWriter::new(File::create(dest)?);

        // Surviving source entries keep their original order.
        for (index, key) in self.origin.iter().enumerate() {
            match self.entries.get(key) {
                Some(Entry::Dir { origin: Some(i) }) if *i == index => {
                    writer.raw_copy_file(self.source.by_index_raw(index)?)?;
                }
                Some(Entry::File {
                    data: Data::Original { index: i, method },
                    stored,
                }) if *i == index => {
                    if *stored && *method != CompressionMethod::Stored {
                        let mut file = self.source.by_index(index)?;
                        writer.start_file(file.name().to_string(), file_options(true))?;
                        io::copy(&mut file, &mut writer)?;
                    } else {
                        writer.raw_copy_file(self.source.by_index_raw(index)?)?;
                    }
                }
                _ => {}
            }
        }

        for (name, entry) in &self.entries {
            match entry {
                Entry::Dir { origin: None } => {
                    writer.add_directory(format!("{}/", name), SimpleFileOptions::default())?;
                }
                Entry::File {
                    data: Data::Bytes(bytes),
                    stored,
                } => {
                    writer.start_file(name.clone(), file_options(*stored))?;
                    writer.write_all(bytes)?;
                }
                Entry::File {
                    data: Data::Disk(path),
                    stored,
                } => {
                    writer.start_file(name.clone(), file_options(*stored))?;
                    let mut src = File::open(path)?;
                    io::copy(&mut src, &mut writer)?;
                }
                _ => {}
            }
        }

        let file = writer.finish()?;
        file.sync_all()?;
        Ok(())
    }
}

fn file_options(stored: bool) -> SimpleFileOptions {
    let method = if stored {
        CompressionMethod::Stored
    } else {
        CompressionMethod::Deflated
    };
    SimpleFileOptions::default().compression_method(method)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}
