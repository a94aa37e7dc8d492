//! External command execution.
//!
//! Every collaborator tool (zipalign, apksigner, keytool, adb) runs through
//! [`Cmd`], so failures always carry the tool's stderr.

use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use tracing::debug;

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, or -1 if terminated by signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }
}

/// Builder for configuring command execution.
pub struct Cmd {
    program: PathBuf,
    args: Vec<OsString>,
    /// Arguments hidden from logs and error messages (passwords).
    redact: Vec<usize>,
    allow_fail: bool,
    error_prefix: Option<String>,
}

impl Cmd {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            redact: Vec::new(),
            allow_fail: false,
            error_prefix: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().into());
        }
        self
    }

    /// Add a path argument without lossy conversion.
    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.as_os_str().to_os_string());
        self
    }

    /// Add an argument that must never be logged.
    pub fn arg_secret(mut self, arg: impl AsRef<str>) -> Self {
        self.redact.push(self.args.len());
        self.args.push(arg.as_ref().into());
        self
    }

    /// Allow non-zero exit codes without failing.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    pub fn error_msg(mut self, msg: impl AsRef<str>) -> Self {
        self.error_prefix = Some(msg.as_ref().to_string());
        self
    }

    /// Command line as it may be shown to a user.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        for (i, arg) in self.args.iter().enumerate() {
            if self.redact.contains(&i) {
                parts.push("****".to_string());
            } else {
                parts.push(arg.to_string_lossy().into_owned());
            }
        }
        parts.join(" ")
    }

    /// Run the command and capture output.
    pub fn run(self) -> Result<CommandResult> {
        let shown = self.display();
        debug!(command = %shown, "running");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        let output = cmd.output().with_context(|| {
            format!(
                "Failed to execute '{}'. Is it installed?",
                self.program.display()
            )
        })?;

        let result = CommandResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !self.allow_fail && !result.success() {
            let prefix = self
                .error_prefix
                .unwrap_or_else(|| format!("'{}' failed", shown));

            let stderr = result.stderr_trimmed();
            if stderr.is_empty() {
                bail!("{} (exit code {})", prefix, result.code());
            } else {
                bail!("{} (exit code {}):\n{}", prefix, result.code(), stderr);
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_success() {
        let result = Cmd::new("echo").arg("hello").run().unwrap();
        assert!(result.success());
        assert_eq!(result.stdout_trimmed(), "hello");
    }

    #[test]
    fn test_run_failure_includes_stderr() {
        let err = Cmd::new("ls").arg("/nonexistent_path_12345").run().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("No such file") || msg.contains("cannot access"));
    }

    #[test]
    fn test_allow_fail() {
        let result = Cmd::new("false").allow_fail().run().unwrap();
        assert!(!result.success());
        assert_eq!(result.code(), 1);
    }

    #[test]
    fn test_custom_error_message() {
        let err = Cmd::new("false").error_msg("zipalign failed").run().unwrap_err();
        assert!(err.to_string().contains("zipalign failed"));
    }

    #[test]
    fn test_secret_args_are_redacted() {
        let cmd = Cmd::new("apksigner").arg("--ks-pass").arg_secret("pass:hunter22");
        assert_eq!(cmd.display(), "apksigner --ks-pass ****");
    }

    #[test]
    fn test_failure_message_never_leaks_secret() {
        let err = Cmd::new("false").arg_secret("pass:hunter22").run().unwrap_err();
        assert!(!err.to_string().contains("hunter22"));
    }
}
