//! Run environment checks (work directory, device).

use std::fs;
use std::path::Path;

use apkpatch::config::{Config, Deploy};
use apkpatch::process::Cmd;

use super::types::CheckResult;

/// Check the work directory can be created and written.
pub fn check_work_dir(work_dir: &Path) -> Vec<CheckResult> {
    let mut results = Vec::new();
    let name = "work directory";

    if work_dir.exists() {
        results.push(CheckResult::warn(
            name,
            format!("{} exists and will be wiped by the next run", work_dir.display()),
        ));
    }

    // Test-write next to the work root so a check never leaves it behind.
    let parent = work_dir.parent().unwrap_or(work_dir);
    let marker = parent.join(".apkpatch-preflight");
    match fs::create_dir_all(parent).and_then(|_| fs::write(&marker, b"apkpatch")) {
        Ok(()) => {
            let _ = fs::remove_file(&marker);
            results.push(CheckResult::pass_with(
                "work directory writable",
                parent.display().to_string(),
            ));
        }
        Err(e) => results.push(CheckResult::fail(
            "work directory writable",
            format!("Cannot write to {}: {}", parent.display(), e),
        )),
    }

    results
}

/// Check a device answers when the run deploys.
pub fn check_device(config: &Config, deploy: Option<&Deploy>) -> CheckResult {
    let name = "device";
    let Some(deploy) = deploy else {
        return CheckResult::skip(name, "not deploying");
    };
    let Ok(adb) = config.tool("adb") else {
        return CheckResult::skip(name, "adb not available");
    };

    let mut cmd = Cmd::new(&adb);
    if let Some(serial) = deploy.serial() {
        cmd = cmd.arg("-s").arg(serial);
    }
    match cmd.arg("get-state").allow_fail().run() {
        Ok(result) if result.success() && result.stdout_trimmed() == "device" => {
            CheckResult::pass_with(name, deploy.serial().unwrap_or("default device"))
        }
        Ok(result) => CheckResult::fail(
            name,
            format!("not ready: {}", result.stderr_trimmed()),
        ),
        Err(e) => CheckResult::fail(name, format!("{:#}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preflight::types::CheckStatus;
    use tempfile::TempDir;

    #[test]
    fn test_fresh_work_dir() {
        let temp = TempDir::new().unwrap();
        let results = check_work_dir(&temp.path().join("apkpatch-temp-files"));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, CheckStatus::Pass);
        assert!(!temp.path().join(".apkpatch-preflight").exists());
    }

    #[test]
    fn test_existing_work_dir_warns() {
        let temp = TempDir::new().unwrap();
        let work = temp.path().join("work");
        fs::create_dir(&work).unwrap();
        let results = check_work_dir(&work);
        assert_eq!(results[0].status, CheckStatus::Warn);
    }

    #[test]
    fn test_device_skipped_without_deploy() {
        let config = Config::load(Path::new("/nonexistent"));
        assert_eq!(check_device(&config, None).status, CheckStatus::Skip);
    }
}
