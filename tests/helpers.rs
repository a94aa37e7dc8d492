//! Shared test utilities for apkpatch tests: temp environments and fixture
//! archives.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Test environment with separate input, work and output directories.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Original packages and patch output
    pub inputs: PathBuf,
    /// Work root of the run (read by pipeline tests only)
    #[allow(dead_code)]
    pub work_root: PathBuf,
    /// Final output directory (read by pipeline tests only)
    #[allow(dead_code)]
    pub out_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        // Run configs resolve symlinks; keep expected paths in the same form.
        let base = temp_dir.path().canonicalize().expect("Failed to resolve temp dir");

        let inputs = base.join("inputs");
        fs::create_dir_all(&inputs).expect("Failed to create inputs dir");

        Self {
            inputs,
            work_root: base.join("work"),
            out_dir: base.join("out"),
            _temp_dir: temp_dir,
        }
    }
}

// =============================================================================
// Fixture archives
// =============================================================================

/// Write a zip archive. Names ending in `/` become directory entries.
pub fn write_apk(path: &Path, entries: &[(&str, &[u8], CompressionMethod)]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir for archive");
    }
    let mut zip = ZipWriter::new(File::create(path).expect("Failed to create archive"));
    for (name, data, method) in entries {
        let options = SimpleFileOptions::default().compression_method(*method);
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
    }
    zip.finish().expect("Failed to finish archive");
}

/// A small package with a manifest, resources and one code container.
pub fn write_sample_apk(path: &Path) {
    write_apk(
        path,
        &[
            ("AndroidManifest.xml", b"<manifest/>", CompressionMethod::Deflated),
            ("classes.dex", b"dex\n035\0original", CompressionMethod::Deflated),
            ("res/", b"", CompressionMethod::Stored),
            ("res/layout/main.xml", b"<LinearLayout/>", CompressionMethod::Deflated),
            ("res/raw/clip.ogg", b"OggS old", CompressionMethod::Stored),
            ("resources.arsc", b"arsc old", CompressionMethod::Stored),
        ],
    );
}

/// File entries of an archive: name -> (content, compression).
pub fn read_apk(path: &Path) -> BTreeMap<String, (Vec<u8>, CompressionMethod)> {
    let mut zip = ZipArchive::new(File::open(path).expect("Failed to open archive"))
        .expect("Not a zip archive");
    let mut out = BTreeMap::new();
    for i in 0..zip.len() {
        let mut file = zip.by_index(i).unwrap();
        if file.is_dir() {
            continue;
        }
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        out.insert(file.name().to_string(), (data, file.compression()));
    }
    out
}
