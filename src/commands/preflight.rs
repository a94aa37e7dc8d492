//! Preflight command - runs preflight checks.

use anyhow::Result;

use crate::preflight::{self, Requirements};
use apkpatch::config::Config;

/// Execute the preflight command.
pub fn cmd_preflight(config: &Config, needs: &Requirements, strict: bool) -> Result<()> {
    if strict {
        preflight::run_preflight_or_fail(config, needs)?;
    } else {
        let report = preflight::run_preflight(config, needs);
        report.print();
        if !report.all_passed() {
            println!("Some checks failed. Use --strict to fail with a non-zero exit code.");
        }
    }
    Ok(())
}
