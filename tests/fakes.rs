//! Run configurations and fake collaborators for pipeline tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use apkpatch::config::{Deploy, RunConfig, Target};
use apkpatch::tools::{Aligner, InstallOutcome, Installer, Signer, Toolchain};
use apkpatch::workspace::{StageDir, Workspace};

use crate::helpers::TestEnv;

impl TestEnv {
    pub fn stage_path(&self, dir: StageDir) -> PathBuf {
        Workspace::existing(&self.work_root, false).path(dir)
    }

    /// Run configuration for a package whose base is `base.apk`.
    pub fn run_config(
        &self,
        target: Target,
        deploy: Option<Deploy>,
        low_storage: bool,
        clean: bool,
    ) -> RunConfig {
        RunConfig::builder(&self.out_dir, &self.work_root)
            .target(target)
            .deploy(deploy)
            .low_storage(low_storage)
            .clean(clean)
            .build("base.apk")
            .expect("Failed to build run config")
    }

    /// Write a manifest into `inputs/` and return its path.
    pub fn write_manifest(&self, manifest: &serde_json::Value) -> PathBuf {
        let path = self.inputs.join("patch.json");
        fs::write(&path, serde_json::to_string_pretty(manifest).unwrap())
            .expect("Failed to write manifest");
        path
    }
}

/// Number of regular files directly in `dir` (0 if it does not exist).
pub fn file_count(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|rd| rd.filter_map(|e| e.ok()).filter(|e| e.path().is_file()).count())
        .unwrap_or(0)
}

// =============================================================================
// Fake collaborators
// =============================================================================

/// Aligner and signer that copy their input and remember every call.
#[derive(Default)]
pub struct CopyTool {
    pub calls: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl CopyTool {
    fn copy(&self, input: &Path, output: &Path) -> Result<()> {
        fs::copy(input, output)?;
        self.calls
            .lock()
            .unwrap()
            .push((input.to_path_buf(), output.to_path_buf()));
        Ok(())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Aligner for CopyTool {
    fn align(&self, input: &Path, output: &Path) -> Result<()> {
        self.copy(input, output)
    }
}

impl Signer for CopyTool {
    fn sign(&self, input: &Path, output: &Path) -> Result<()> {
        self.copy(input, output)
    }
}

/// Aligner that always fails.
pub struct BrokenAligner;

impl Aligner for BrokenAligner {
    fn align(&self, input: &Path, _output: &Path) -> Result<()> {
        anyhow::bail!("zipalign: cannot read {}", input.display())
    }
}

/// Aligner that turns the directory it reads from into a plain file once it
/// has aligned, so a later removal of that directory fails.
pub struct DirBlockingAligner;

impl Aligner for DirBlockingAligner {
    fn align(&self, input: &Path, output: &Path) -> Result<()> {
        fs::copy(input, output)?;
        let dir = input.parent().expect("input has a parent directory");
        fs::remove_dir_all(dir)?;
        fs::write(dir, b"not a directory")?;
        Ok(())
    }
}

/// What the installer saw during one call.
#[derive(Debug, Clone)]
pub struct InstallCall {
    pub base: PathBuf,
    pub splits: Vec<PathBuf>,
    /// Stage directories present under the work root at install time.
    pub stage_dirs_present: Vec<StageDir>,
}

/// Installer that answers with a fixed outcome and records each call.
pub struct RecordingInstaller {
    outcome: InstallOutcome,
    work_root: PathBuf,
    pub calls: Mutex<Vec<InstallCall>>,
}

impl RecordingInstaller {
    pub fn new(outcome: InstallOutcome, work_root: &Path) -> Self {
        Self {
            outcome,
            work_root: work_root.to_path_buf(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<InstallCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Installer for RecordingInstaller {
    fn install(&self, base: &Path, splits: &[PathBuf]) -> Result<InstallOutcome> {
        let ws = Workspace::existing(&self.work_root, false);
        let present = StageDir::ALL
            .into_iter()
            .filter(|d| ws.path(*d).exists())
            .collect();
        self.calls.lock().unwrap().push(InstallCall {
            base: base.to_path_buf(),
            splits: splits.to_vec(),
            stage_dirs_present: present,
        });
        Ok(self.outcome.clone())
    }

    fn uninstall(&self, _package: &str) -> Result<InstallOutcome> {
        Ok(self.outcome.clone())
    }
}

/// Toolchain over fakes. The same `CopyTool` aligns and signs.
pub fn toolchain(
    tool: &Arc<CopyTool>,
    sign: bool,
    installer: Option<Arc<RecordingInstaller>>,
) -> Toolchain {
    Toolchain {
        aligner: tool.clone(),
        signer: if sign {
            Some(tool.clone() as Arc<dyn Signer>)
        } else {
            None
        },
        installer: installer.map(|i| i as Arc<dyn Installer>),
    }
}
