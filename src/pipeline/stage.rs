//! Per-variant stage tracking.

use anyhow::{bail, Result};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::variant::{Variant, VariantKind};

/// Where a variant is in the assembly sequence.
///
/// `Patched -> Aligned -> Signed -> Output -> Installed -> Cleaned`. Signed
/// is skipped exactly when the run mounts instead of installing; Installed
/// and Cleaned are optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Patched,
    Aligned,
    Signed,
    Output,
    Installed,
    Cleaned,
}

impl Stage {
    /// Whether `self -> next` is a legal transition.
    pub fn can_advance(self, next: Stage, mount: bool) -> bool {
        use Stage::*;
        match (self, next) {
            (Patched, Aligned)
            | (Signed, Output)
            | (Output, Installed)
            | (Output, Cleaned)
            | (Installed, Cleaned) => true,
            (Aligned, Signed) => !mount,
            (Aligned, Output) => mount,
            _ => false,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Patched => "patched",
            Stage::Aligned => "aligned",
            Stage::Signed => "signed",
            Stage::Output => "output",
            Stage::Installed => "installed",
            Stage::Cleaned => "cleaned",
        };
        f.write_str(s)
    }
}

/// One variant moving through the pipeline.
///
/// `file` is the artifact the last completed stage produced; ownership of
/// that file passes to whichever stage consumes it next.
#[derive(Debug, Clone)]
pub struct VariantRun {
    pub kind: VariantKind,
    pub name: String,
    pub patch_errors: Vec<String>,
    file: PathBuf,
    stage: Stage,
    checksum: Option<String>,
}

impl VariantRun {
    /// A variant whose patched archive has been written.
    pub fn patched(variant: &Variant, file: PathBuf) -> Self {
        Self {
            kind: variant.kind,
            name: variant.file_name().to_string(),
            patch_errors: variant.patch_errors.clone(),
            file,
            stage: Stage::Patched,
            checksum: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub(crate) fn set_checksum(&mut self, checksum: String) {
        self.checksum = Some(checksum);
    }

    /// Move to `next`, optionally handing over a new artifact.
    pub fn advance(&mut self, next: Stage, file: Option<PathBuf>, mount: bool) -> Result<()> {
        if !self.stage.can_advance(next, mount) {
            bail!(
                "{}: illegal stage transition {} -> {}{}",
                self.name,
                self.stage,
                next,
                if mount { " (mount mode)" } else { "" }
            );
        }
        self.stage = next;
        if let Some(file) = file {
            self.file = file;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> VariantRun {
        VariantRun {
            kind: VariantKind::Base,
            name: "base.apk".to_string(),
            patch_errors: Vec::new(),
            file: PathBuf::from("/w/cli/patched/base.apk"),
            stage: Stage::Patched,
            checksum: None,
        }
    }

    #[test]
    fn test_install_sequence() {
        let mut r = run();
        r.advance(Stage::Aligned, Some("/w/cli/aligned/base.apk".into()), false).unwrap();
        r.advance(Stage::Signed, Some("/w/cli/signed/base.apk".into()), false).unwrap();
        r.advance(Stage::Output, Some("/out/base.apk".into()), false).unwrap();
        r.advance(Stage::Installed, None, false).unwrap();
        r.advance(Stage::Cleaned, None, false).unwrap();
        assert_eq!(r.stage(), Stage::Cleaned);
        assert_eq!(r.file(), Path::new("/out/base.apk"));
    }

    #[test]
    fn test_signing_cannot_be_skipped_when_installing() {
        let mut r = run();
        r.advance(Stage::Aligned, None, false).unwrap();
        assert!(r.advance(Stage::Output, None, false).is_err());
        assert_eq!(r.stage(), Stage::Aligned);
    }

    #[test]
    fn test_mount_skips_signing() {
        let mut r = run();
        r.advance(Stage::Aligned, None, true).unwrap();
        assert!(r.advance(Stage::Signed, None, true).is_err());
        r.advance(Stage::Output, None, true).unwrap();
    }

    #[test]
    fn test_no_backward_transitions() {
        assert!(!Stage::Output.can_advance(Stage::Aligned, false));
        assert!(!Stage::Cleaned.can_advance(Stage::Installed, false));
        assert!(!Stage::Patched.can_advance(Stage::Patched, false));
        assert!(!Stage::Patched.can_advance(Stage::Signed, false));
    }
}
