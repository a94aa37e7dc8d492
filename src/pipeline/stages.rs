//! Individual stage operations.
//!
//! Each takes its input artifact and the directory to write into, and returns
//! the produced file. Directory lifecycle stays with the caller.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::archive::Archive;
use crate::common::copy_file_with_dirs;
use crate::tools::{Aligner, Signer};
use crate::variant::Variant;

fn target(dir: &Path, input: &Path) -> Result<PathBuf> {
    let name = input
        .file_name()
        .with_context(|| format!("Not a file path: {}", input.display()))?;
    Ok(dir.join(name))
}

/// Copy the original variant into `dir` and graft the patch output into it.
pub fn patch(variant: &Variant, dir: &Path) -> Result<PathBuf> {
    let dest = target(dir, &variant.file)?;
    copy_file_with_dirs(&variant.file, &dest)?;

    let code: Vec<(String, Vec<u8>)> = if variant.kind.is_base() {
        variant
            .code_containers
            .iter()
            .map(|c| Ok((c.name.clone(), c.read()?)))
            .collect::<Result<_>>()?
    } else {
        Vec::new()
    };

    Archive::edit(&dest, |archive| {
        if let Some(resources) = &variant.resources {
            archive.import_tree(resources)?;
            archive.mark_stored(&variant.do_not_compress)?;
        }
        for (name, bytes) in code {
            archive.write_entry(&name, bytes)?;
        }
        Ok(())
    })
    .with_context(|| format!("Failed to write patched archive {}", dest.display()))?;

    debug!(variant = %variant.file_name(), "patched");
    Ok(dest)
}

pub fn align(aligner: &dyn Aligner, input: &Path, dir: &Path) -> Result<PathBuf> {
    let dest = target(dir, input)?;
    aligner.align(input, &dest)?;
    Ok(dest)
}

pub fn sign(signer: &dyn Signer, input: &Path, dir: &Path) -> Result<PathBuf> {
    let dest = target(dir, input)?;
    signer.sign(input, &dest)?;
    Ok(dest)
}

/// Copy a final artifact into the output directory, replacing any earlier one.
pub fn output(input: &Path, output_dir: &Path) -> Result<PathBuf> {
    let dest = target(output_dir, input)?;
    copy_file_with_dirs(input, &dest)?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_output_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let signed = temp.path().join("signed/base.apk");
        fs::create_dir_all(signed.parent().unwrap()).unwrap();
        fs::write(&signed, b"signed bytes").unwrap();
        let out_dir = temp.path().join("out");

        let first = output(&signed, &out_dir).unwrap();
        let first_bytes = fs::read(&first).unwrap();
        let second = output(&signed, &out_dir).unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read(&second).unwrap(), first_bytes);
        assert_eq!(fs::read_dir(&out_dir).unwrap().count(), 1);
    }
}
