use anyhow::Result;
use std::path::{Path, PathBuf};

use super::Aligner;
use crate::process::Cmd;

/// Word alignment for compressed entries.
const ALIGNMENT: &str = "4";

/// `zipalign` from the SDK build-tools.
///
/// Runs with `-p` so uncompressed shared libraries are additionally aligned
/// to a page boundary and can be mapped directly from the package.
pub struct Zipalign {
    program: PathBuf,
}

impl Zipalign {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

impl Aligner for Zipalign {
    fn align(&self, input: &Path, output: &Path) -> Result<()> {
        Cmd::new(&self.program)
            .args(["-p", "-f", ALIGNMENT])
            .arg_path(input)
            .arg_path(output)
            .error_msg(format!("zipalign failed for {}", input.display()))
            .run()?;
        Ok(())
    }
}
