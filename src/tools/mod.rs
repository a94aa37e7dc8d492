//! External collaborators of the assembly pipeline.
//!
//! The pipeline only sees these traits. The default implementations shell
//! out to the Android SDK tools; tests substitute in-process fakes.

mod align;
mod device;
mod sign;

pub use align::Zipalign;
pub use device::{AdbInstaller, RootMounter};
pub use sign::ApkSigner;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Produces a copy of an archive whose entry data offsets are aligned.
pub trait Aligner: Send + Sync {
    fn align(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Signs packages with one identity shared by every variant of a run.
pub trait Signer: Send + Sync {
    fn sign(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Outcome of a device operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Accepted,
    Rejected { reason: String },
}

impl InstallOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, InstallOutcome::Accepted)
    }
}

/// Puts a package family on a device in one operation.
pub trait Installer: Send + Sync {
    fn install(&self, base: &Path, splits: &[PathBuf]) -> Result<InstallOutcome>;
    fn uninstall(&self, package: &str) -> Result<InstallOutcome>;
}

/// The collaborators one run works with.
#[derive(Clone)]
pub struct Toolchain {
    pub aligner: Arc<dyn Aligner>,
    /// `None` under mount mode: nothing gets signed.
    pub signer: Option<Arc<dyn Signer>>,
    /// `None` when the run does not deploy.
    pub installer: Option<Arc<dyn Installer>>,
}
