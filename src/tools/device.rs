//! Device deployment over adb.
//!
//! Two strategies, picked by run configuration:
//! - [`AdbInstaller`]: regular user-level `install-multiple` of signed files.
//! - [`RootMounter`]: bind-mounts the aligned files over the paths of the
//!   already installed package (needs root on the device).

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{InstallOutcome, Installer};
use crate::process::Cmd;

/// Device-side directory holding mounted packages.
const MOUNT_ROOT: &str = "/data/adb/apkpatch";

/// Device-side staging directory for pushes.
const STAGING_DIR: &str = "/data/local/tmp";

#[derive(Debug, Clone)]
struct Adb {
    program: PathBuf,
    serial: Option<String>,
}

impl Adb {
    fn cmd(&self) -> Cmd {
        let cmd = Cmd::new(&self.program);
        match &self.serial {
            Some(serial) => cmd.arg("-s").arg(serial),
            None => cmd,
        }
    }

    fn su(&self, script: &str) -> Result<crate::process::CommandResult> {
        self.cmd()
            .args(["shell", "su", "-c"])
            .arg(format!("'{}'", script))
            .allow_fail()
            .run()
    }
}

// =============================================================================
// User-level install
// =============================================================================

/// Installs the signed package family with `adb install-multiple`.
pub struct AdbInstaller {
    adb: Adb,
}

impl AdbInstaller {
    pub fn new(program: PathBuf, serial: Option<String>) -> Self {
        Self {
            adb: Adb { program, serial },
        }
    }
}

impl Installer for AdbInstaller {
    fn install(&self, base: &Path, splits: &[PathBuf]) -> Result<InstallOutcome> {
        let mut cmd = self.adb.cmd();
        cmd = if splits.is_empty() {
            cmd.arg("install")
        } else {
            cmd.arg("install-multiple")
        };
        cmd = cmd.arg("-r").arg_path(base);
        for split in splits {
            cmd = cmd.arg_path(split);
        }

        info!(base = %base.display(), splits = splits.len(), "installing");
        let result = cmd.allow_fail().run()?;
        Ok(parse_pm_outcome(&result.stdout, &result.stderr))
    }

    fn uninstall(&self, package: &str) -> Result<InstallOutcome> {
        let result = self.adb.cmd().arg("uninstall").arg(package).allow_fail().run()?;
        Ok(parse_pm_outcome(&result.stdout, &result.stderr))
    }
}

/// Interpret the `Success` / `Failure [...]` protocol of the package manager.
fn parse_pm_outcome(stdout: &str, stderr: &str) -> InstallOutcome {
    if stdout.lines().any(|l| l.trim() == "Success") {
        return InstallOutcome::Accepted;
    }
    let reason = stdout
        .lines()
        .chain(stderr.lines())
        .map(str::trim)
        .find(|l| l.starts_with("Failure") || l.contains("INSTALL_") || l.contains("DELETE_"))
        .or_else(|| stderr.lines().map(str::trim).find(|l| !l.is_empty()))
        .unwrap_or("no response from package manager");
    InstallOutcome::Rejected {
        reason: reason.to_string(),
    }
}

// =============================================================================
// Root mount
// =============================================================================

/// Mounts the aligned package family over the installed application.
pub struct RootMounter {
    adb: Adb,
    package: String,
}

impl RootMounter {
    pub fn new(program: PathBuf, serial: Option<String>, package: impl Into<String>) -> Self {
        Self {
            adb: Adb { program, serial },
            package: package.into(),
        }
    }

    fn installed_paths(&self, package: &str) -> Result<Vec<String>> {
        let result = self
            .adb
            .cmd()
            .args(["shell", "pm", "path"])
            .arg(package)
            .allow_fail()
            .run()?;
        Ok(parse_pm_path(&result.stdout))
    }
}

impl Installer for RootMounter {
    fn install(&self, base: &Path, splits: &[PathBuf]) -> Result<InstallOutcome> {
        let package = shell_word(&self.package)?;
        let mut files = Vec::with_capacity(splits.len() + 1);
        let family = std::iter::once((base, true)).chain(splits.iter().map(|s| (s.as_path(), false)));
        for (local, is_base) in family {
            let name = local.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            files.push((local, shell_word(name)?, is_base));
        }

        let installed = self.installed_paths(package)?;
        if installed.is_empty() {
            return Ok(InstallOutcome::Rejected {
                reason: format!(
                    "{} is not installed; install the original package before mounting",
                    self.package
                ),
            });
        }

        let mut script = vec![format!("mkdir -p {}/{}", MOUNT_ROOT, package)];
        for (local, name, is_base) in files {
            let Some(target) = mount_target(&installed, name, is_base) else {
                return Ok(InstallOutcome::Rejected {
                    reason: format!("no installed file of {} matches {}", self.package, name),
                });
            };

            let target = shell_word(target)?;
            let staged = format!("{}/{}", STAGING_DIR, name);
            let dest = format!("{}/{}/{}", MOUNT_ROOT, package, name);
            self.adb
                .cmd()
                .arg("push")
                .arg_path(local)
                .arg(&staged)
                .error_msg(format!("Failed to push {}", local.display()))
                .run()?;

            script.push(format!("mv {} {}", staged, dest));
            script.push(format!("chmod 644 {}", dest));
            script.push(format!("chcon u:object_r:apk_data_file:s0 {}", dest));
            script.push(format!("mount -o bind {} {}", dest, target));
            debug!(file = %name, target = %target, "mount planned");
        }
        script.push(format!("am force-stop {}", package));

        info!(package = %self.package, files = splits.len() + 1, "mounting");
        let result = self.adb.su(&script.join(" && "))?;
        if result.success() {
            Ok(InstallOutcome::Accepted)
        } else {
            Ok(InstallOutcome::Rejected {
                reason: non_empty(result.stderr_trimmed(), "mount script failed"),
            })
        }
    }

    fn uninstall(&self, package: &str) -> Result<InstallOutcome> {
        let package = shell_word(package)?;
        let installed = self.installed_paths(package)?;
        let mut script = Vec::with_capacity(installed.len() + 1);
        for path in &installed {
            script.push(format!("(umount -l {} 2>/dev/null; true)", shell_word(path)?));
        }
        script.push(format!("rm -rf {}/{}", MOUNT_ROOT, package));

        let result = self.adb.su(&script.join(" && "))?;
        if result.success() {
            Ok(InstallOutcome::Accepted)
        } else {
            Ok(InstallOutcome::Rejected {
                reason: non_empty(result.stderr_trimmed(), "unmount script failed"),
            })
        }
    }
}

/// Paths from `pm path` output (`package:/data/app/.../base.apk` per line).
fn parse_pm_path(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|l| l.trim().strip_prefix("package:"))
        .map(str::to_string)
        .collect()
}

/// Installed path a local file is mounted over.
///
/// The base always maps to the installed `base.apk`; splits match by name.
fn mount_target<'a>(installed: &'a [String], name: &str, is_base: bool) -> Option<&'a str> {
    let wanted = if is_base { "base.apk" } else { name };
    installed
        .iter()
        .find(|p| p.rsplit('/').next() == Some(wanted))
        .map(String::as_str)
}

/// Accept `word` for the root shell script only if it needs no quoting.
///
/// Package names, file names and installed paths are plain words in
/// practice; anything else is refused rather than escaped.
fn shell_word(word: &str) -> Result<&str> {
    let plain = |c: char| c.is_ascii_alphanumeric() || "._-/~=+".contains(c);
    if word.is_empty() || !word.chars().all(plain) {
        bail!("Refusing to pass {:?} to the device shell", word);
    }
    Ok(word)
}

fn non_empty(s: &str, fallback: &str) -> String {
    if s.is_empty() {
        fallback.to_string()
    } else {
        s.to_string()
    }
}
