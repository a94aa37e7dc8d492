//! Host tool availability checks.

use apkpatch::config::Config;

use super::types::CheckResult;
use super::Requirements;

/// Check the external collaborators a run with `needs` would invoke.
pub fn check_host_tools(config: &Config, needs: &Requirements) -> Vec<CheckResult> {
    let tools = [
        ("zipalign", true, "Android SDK build-tools; aligns every package"),
        ("apksigner", needs.sign, "Android SDK build-tools; signs packages for install"),
        ("keytool", needs.sign, "Java runtime; creates the signing key"),
        ("adb", needs.deploy.is_some(), "Android SDK platform-tools; talks to the device"),
    ];

    tools
        .into_iter()
        .map(|(tool, needed, purpose)| check_tool(config, tool, needed, purpose))
        .collect()
}

fn check_tool(config: &Config, tool: &str, needed: bool, purpose: &str) -> CheckResult {
    match config.tool(tool) {
        Ok(path) if path.is_file() => CheckResult::pass_with(tool, path.display().to_string()),
        Ok(path) if needed => {
            CheckResult::fail(tool, format!("{} does not exist ({})", path.display(), purpose))
        }
        Ok(path) => CheckResult::skip(tool, format!("{} does not exist; not needed", path.display())),
        Err(_) if needed => CheckResult::fail(tool, format!("Not found. {}", purpose)),
        Err(_) => CheckResult::skip(tool, "not found; not needed for this run"),
    }
}
