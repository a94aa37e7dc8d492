//! Uninstall command - removes a deployed package from a device.

use anyhow::{bail, Result};

use apkpatch::config::{Config, Deploy, Target};
use apkpatch::tools::{AdbInstaller, InstallOutcome, Installer, RootMounter};

/// Execute the uninstall command.
pub fn cmd_uninstall(package: &str, device: Deploy, target: Target, config: &Config) -> Result<()> {
    let adb = config.tool("adb")?;
    let serial = device.serial().map(str::to_string);

    let installer: Box<dyn Installer> = match target {
        Target::Install => Box::new(AdbInstaller::new(adb, serial)),
        Target::Mount => Box::new(RootMounter::new(adb, serial, package)),
    };

    match installer.uninstall(package)? {
        InstallOutcome::Accepted => {
            match target {
                Target::Install => println!("Uninstalled {}", package),
                Target::Mount => println!("Unmounted {}", package),
            }
            Ok(())
        }
        InstallOutcome::Rejected { reason } => bail!("Failed to remove {}: {}", package, reason),
    }
}
