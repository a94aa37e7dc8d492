//! Assembly pipeline.
//!
//! Drives every variant of a run through
//! `Patched -> Aligned -> Signed -> Output -> Installed -> Cleaned`:
//! 1. Patched: copy each original into `patched/` and graft the patch output
//! 2. Aligned: external aligner into `aligned/`
//! 3. Signed: external signer into `signed/` (skipped when mounting)
//! 4. Output: copy into the output directory
//! 5. Installed: one device operation for the whole family (optional)
//! 6. Cleaned: drop the work root, and the outputs if they were deployed
//!
//! Align and sign run per variant on the blocking pool. Each stage joins all
//! its variants before its input directory is released, so low-storage mode
//! never deletes a file another variant is still reading.

mod stage;
pub mod stages;

pub use stage::{Stage, VariantRun};

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::common::{resolve_path, sha256_file};
use crate::config::RunConfig;
use crate::timing::Timer;
use crate::tools::{InstallOutcome, Toolchain};
use crate::variant::PatchOutput;
use crate::workspace::{StageDir, Workspace};

/// What a run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub package_name: String,
    /// Base first.
    pub variants: Vec<VariantRun>,
    /// `None` when the run did not deploy.
    pub install: Option<InstallOutcome>,
}

impl RunReport {
    /// No patch failures and, if deployed, the device accepted the package.
    pub fn success(&self) -> bool {
        self.failures().is_empty()
    }

    /// Human-readable reasons the run counts as failed.
    pub fn failures(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .variants
            .iter()
            .flat_map(|v| v.patch_errors.iter().map(move |e| format!("{}: {}", v.name, e)))
            .collect();
        if let Some(InstallOutcome::Rejected { reason }) = &self.install {
            out.push(format!("install rejected: {}", reason));
        }
        out
    }
}

/// Run the whole pipeline for one patch output.
///
/// The work root is wiped first; if that fails nothing else happens.
pub fn run(config: &RunConfig, output: &PatchOutput, tools: &Toolchain) -> Result<RunReport> {
    check_work_root(config, output)?;

    let workspace = Workspace::reset(&config.work_root, config.low_storage)?;
    let mount = config.is_mount();

    // Patched
    let t = Timer::start("patch");
    let patched_dir = workspace.stage_dir(StageDir::Patched)?;
    let mut runs = Vec::with_capacity(output.variants.len());
    for variant in &output.variants {
        info!(variant = %variant.file_name(), kind = %variant.kind, "writing patched archive");
        let file = stages::patch(variant, &patched_dir)?;
        for err in &variant.patch_errors {
            warn!(variant = %variant.file_name(), "patch failed: {}", err);
        }
        runs.push(VariantRun::patched(variant, file));
    }
    t.finish();

    let rt = tokio::runtime::Runtime::new().context("Failed to start worker runtime")?;

    // Aligned
    let t = Timer::start("align");
    let aligned_dir = workspace.stage_dir(StageDir::Aligned)?;
    let aligner = Arc::clone(&tools.aligner);
    let aligned = rt.block_on(fan_out(files(&runs), move |input| {
        stages::align(aligner.as_ref(), input, &aligned_dir)
    }))?;
    for (run, file) in runs.iter_mut().zip(aligned) {
        run.advance(Stage::Aligned, Some(file), mount)?;
    }
    release(&workspace, StageDir::Patched);
    t.finish();

    // Signed
    if mount {
        info!("mount mode: skipping signing");
    } else {
        let t = Timer::start("sign");
        let signer = tools
            .signer
            .clone()
            .context("No signer configured for an install-target run")?;
        let signed_dir = workspace.stage_dir(StageDir::Signed)?;
        let signed = rt.block_on(fan_out(files(&runs), move |input| {
            stages::sign(signer.as_ref(), input, &signed_dir)
        }))?;
        for (run, file) in runs.iter_mut().zip(signed) {
            run.advance(Stage::Signed, Some(file), mount)?;
        }
        release(&workspace, StageDir::Aligned);
        t.finish();
    }

    // Output
    let t = Timer::start("output");
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("Failed to create output directory {}", config.output_dir.display())
    })?;
    for run in runs.iter_mut() {
        let file = stages::output(run.file(), &config.output_dir)?;
        run.set_checksum(sha256_file(&file)?);
        run.advance(Stage::Output, Some(file), mount)?;
    }
    release(&workspace, if mount { StageDir::Aligned } else { StageDir::Signed });
    t.finish();

    // Installed
    let install = match &config.deploy {
        None => None,
        Some(_) => {
            let installer = tools
                .installer
                .as_ref()
                .context("Deploy requested but no installer configured")?;
            let (base, splits) = runs.split_first().context("Run has no variants")?;
            let split_files: Vec<PathBuf> = splits.iter().map(|r| r.file().to_path_buf()).collect();

            let t = Timer::start("install");
            let outcome = installer.install(base.file(), &split_files)?;
            t.finish();

            match &outcome {
                InstallOutcome::Accepted => {
                    info!(package = %output.package_name, "deployed");
                    for run in runs.iter_mut() {
                        run.advance(Stage::Installed, None, mount)?;
                    }
                }
                InstallOutcome::Rejected { reason } => {
                    warn!(package = %output.package_name, "device rejected the package: {}", reason);
                }
            }
            Some(outcome)
        }
    };

    // Cleaned
    if config.clean {
        let deployed = install.as_ref().is_some_and(InstallOutcome::is_accepted);
        finish_clean(&workspace, &runs, deployed);
        for run in runs.iter_mut() {
            run.advance(Stage::Cleaned, None, mount)?;
        }
    }

    Ok(RunReport {
        package_name: output.package_name.clone(),
        variants: runs,
        install,
    })
}

/// Refuse to start if the work root wipe would take anything the run needs
/// or produces with it.
fn check_work_root(config: &RunConfig, output: &PatchOutput) -> Result<()> {
    let root = resolve_path(&config.work_root)?;

    let mut guarded: Vec<(&str, &Path)> = output.inputs().map(|p| ("Input", p)).collect();
    guarded.push(("Output directory", config.output_dir.as_path()));
    if !config.is_mount() {
        guarded.push(("Keystore", config.signing.keystore.as_path()));
    }
    guarded.push(("Current directory", Path::new(".")));

    for (what, path) in guarded {
        let resolved = resolve_path(path)?;
        if resolved.starts_with(&root) {
            bail!(
                "{} {} lives inside the work root {}, which is deleted at the start of every run",
                what,
                resolved.display(),
                root.display()
            );
        }
    }
    Ok(())
}

fn files(runs: &[VariantRun]) -> Vec<PathBuf> {
    runs.iter().map(|r| r.file().to_path_buf()).collect()
}

/// Run `job` for every file on the blocking pool; results keep input order.
///
/// Every job is awaited before the first error is returned, so no worker is
/// still writing when the caller moves on.
async fn fan_out<F>(inputs: Vec<PathBuf>, job: F) -> Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> Result<PathBuf> + Send + Sync + 'static,
{
    let job = Arc::new(job);
    let handles: Vec<_> = inputs
        .into_iter()
        .map(|input| {
            let job = Arc::clone(&job);
            tokio::task::spawn_blocking(move || job(&input))
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.context("Stage worker panicked").and_then(|r| r));
    }
    results.into_iter().collect()
}

/// Low-storage release of a consumed stage directory. Never fatal.
fn release(workspace: &Workspace, dir: StageDir) {
    if let Err(e) = workspace.delete(dir, false) {
        warn!("{:#}", e);
    }
}

/// End-of-run cleanup. Never fatal: every artifact already exists.
fn finish_clean(workspace: &Workspace, runs: &[VariantRun], deployed: bool) {
    match workspace.delete_root() {
        Ok(_) => info!(root = %workspace.root().display(), "removed work directory"),
        Err(e) => warn!("{:#}", e),
    }

    if deployed {
        for run in runs {
            if let Err(e) = fs::remove_file(run.file()) {
                warn!(file = %run.file().display(), "failed to remove deployed output: {}", e);
            }
        }
    }
}
