//! Preflight checks for an assembly run.
//!
//! Validates host tools and the run environment before any file is touched.
//! Run with `apkpatch preflight` to check everything is ready.

mod environment;
mod host_tools;
mod types;

use anyhow::{bail, Result};

use apkpatch::config::{Config, Deploy};

pub use types::PreflightReport;

/// What the planned run needs from the host.
#[derive(Debug, Clone, Default)]
pub struct Requirements {
    /// Install target: packages are signed.
    pub sign: bool,
    /// Packages are pushed to a device.
    pub deploy: Option<Deploy>,
}

/// Run all preflight checks.
pub fn run_preflight(config: &Config, needs: &Requirements) -> PreflightReport {
    let mut checks = Vec::new();

    println!("Running preflight checks...\n");

    // =======================================================================
    // Host Tools
    // =======================================================================
    println!("Checking host tools...");
    checks.extend(host_tools::check_host_tools(config, needs));

    // =======================================================================
    // Run Environment
    // =======================================================================
    println!("Checking run environment...");
    checks.extend(environment::check_work_dir(&config.work_dir));
    checks.push(environment::check_device(config, needs.deploy.as_ref()));

    println!();

    PreflightReport { checks }
}

/// Run preflight and bail if any checks fail.
pub fn run_preflight_or_fail(config: &Config, needs: &Requirements) -> Result<()> {
    let report = run_preflight(config, needs);
    report.print();

    if !report.all_passed() {
        bail!(
            "Preflight failed: {} check(s) failed. Fix the issues above before assembling.",
            report.fail_count()
        );
    }

    println!("All preflight checks passed!\n");
    Ok(())
}
