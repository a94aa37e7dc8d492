//! Configuration management for apkpatch.
//!
//! Two layers:
//! - [`Config`]: host-level settings read from a `.env` file and the process
//!   environment (environment wins). Tool locations and defaults live here.
//! - [`RunConfig`]: the immutable, validated set of choices for one assembly
//!   run. Built once, then passed by reference into every pipeline stage.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::common::resolve_path;

/// Default common name for a generated signing key.
pub const DEFAULT_SIGNER_NAME: &str = "apkpatch";

/// Default keystore password (PKCS12 requires at least six characters).
pub const DEFAULT_KEYSTORE_PASSWORD: &str = "apkpatch";

/// Default work root, relative to the current directory.
pub const DEFAULT_WORK_DIR: &str = "apkpatch-temp-files";

/// Host configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Explicit `zipalign` binary (APKPATCH_ZIPALIGN)
    pub zipalign: Option<PathBuf>,
    /// Explicit `apksigner` binary (APKPATCH_APKSIGNER)
    pub apksigner: Option<PathBuf>,
    /// Explicit `keytool` binary (APKPATCH_KEYTOOL)
    pub keytool: Option<PathBuf>,
    /// Explicit `adb` binary (APKPATCH_ADB)
    pub adb: Option<PathBuf>,
    /// Work root for intermediate files (APKPATCH_WORK_DIR)
    pub work_dir: PathBuf,
    /// Keystore password when none is given on the command line
    pub keystore_password: String,
    /// Common name for the signing certificate
    pub signer_name: String,
}

impl Config {
    /// Load configuration from `<base_dir>/.env` and the environment.
    pub fn load(base_dir: &Path) -> Self {
        let mut env_vars = HashMap::new();

        let env_path = base_dir.join(".env");
        if let Ok(iter) = dotenvy::from_path_iter(&env_path) {
            for (key, value) in iter.flatten() {
                env_vars.insert(key, value);
            }
        }

        // Environment variables override .env file
        for (key, value) in std::env::vars() {
            env_vars.insert(key, value);
        }

        Self::from_vars(base_dir, &env_vars)
    }

    pub fn from_vars(base_dir: &Path, vars: &HashMap<String, String>) -> Self {
        let tool = |key: &str| {
            vars.get(key)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };

        let work_dir = vars
            .get("APKPATCH_WORK_DIR")
            .map(|s| {
                let path = PathBuf::from(s);
                if path.is_absolute() {
                    path
                } else {
                    base_dir.join(path)
                }
            })
            .unwrap_or_else(|| base_dir.join(DEFAULT_WORK_DIR));

        let keystore_password = vars
            .get("APKPATCH_KEYSTORE_PASSWORD")
            .cloned()
            .unwrap_or_else(|| DEFAULT_KEYSTORE_PASSWORD.to_string());

        let signer_name = vars
            .get("APKPATCH_SIGNER_NAME")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SIGNER_NAME.to_string());

        Self {
            zipalign: tool("APKPATCH_ZIPALIGN"),
            apksigner: tool("APKPATCH_APKSIGNER"),
            keytool: tool("APKPATCH_KEYTOOL"),
            adb: tool("APKPATCH_ADB"),
            work_dir,
            keystore_password,
            signer_name,
        }
    }

    /// Locate a host tool: explicit override first, then `PATH`.
    pub fn tool(&self, name: &str) -> Result<PathBuf> {
        let explicit = match name {
            "zipalign" => self.zipalign.as_ref(),
            "apksigner" => self.apksigner.as_ref(),
            "keytool" => self.keytool.as_ref(),
            "adb" => self.adb.as_ref(),
            _ => None,
        };
        if let Some(path) = explicit {
            return Ok(path.clone());
        }
        which::which(name).with_context(|| {
            format!(
                "'{}' not found in PATH. Install the Android SDK build-tools/platform-tools \
                 or set APKPATCH_{} to its location.",
                name,
                name.to_uppercase()
            )
        })
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        let show = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(from PATH)".to_string())
        };
        println!("Configuration:");
        println!("  APKPATCH_ZIPALIGN: {}", show(&self.zipalign));
        println!("  APKPATCH_APKSIGNER: {}", show(&self.apksigner));
        println!("  APKPATCH_KEYTOOL: {}", show(&self.keytool));
        println!("  APKPATCH_ADB: {}", show(&self.adb));
        println!("  APKPATCH_WORK_DIR: {}", self.work_dir.display());
        println!("  APKPATCH_SIGNER_NAME: {}", self.signer_name);
    }
}

// =============================================================================
// Run configuration
// =============================================================================

/// What the assembled package is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Signed, installable package.
    Install,
    /// Unsigned, aligned package bind-mounted over the installed app (root).
    Mount,
}

/// Which device receives the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deploy {
    /// The only attached device.
    AnyDevice,
    /// A specific device serial.
    Serial(String),
}

impl Deploy {
    pub fn serial(&self) -> Option<&str> {
        match self {
            Deploy::AnyDevice => None,
            Deploy::Serial(s) => Some(s),
        }
    }
}

/// Key material shared by every variant of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningIdentity {
    /// Certificate common name; also used as the key alias.
    pub common_name: String,
    pub password: String,
    pub keystore: PathBuf,
}

/// Resolved choices for one assembly run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub target: Target,
    pub deploy: Option<Deploy>,
    pub low_storage: bool,
    pub clean: bool,
    pub output_dir: PathBuf,
    pub work_root: PathBuf,
    pub signing: SigningIdentity,
}

impl RunConfig {
    pub fn builder(output_dir: impl Into<PathBuf>, work_root: impl Into<PathBuf>) -> RunConfigBuilder {
        RunConfigBuilder {
            output_dir: output_dir.into(),
            work_root: work_root.into(),
            target: Target::Install,
            deploy: None,
            low_storage: false,
            clean: false,
            keystore: None,
            common_name: DEFAULT_SIGNER_NAME.to_string(),
            password: DEFAULT_KEYSTORE_PASSWORD.to_string(),
        }
    }

    pub fn is_mount(&self) -> bool {
        self.target == Target::Mount
    }
}

/// Builder for [`RunConfig`].
#[derive(Debug, Clone)]
pub struct RunConfigBuilder {
    output_dir: PathBuf,
    work_root: PathBuf,
    target: Target,
    deploy: Option<Deploy>,
    low_storage: bool,
    clean: bool,
    keystore: Option<PathBuf>,
    common_name: String,
    password: String,
}

impl RunConfigBuilder {
    pub fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn deploy(mut self, deploy: Option<Deploy>) -> Self {
        self.deploy = deploy;
        self
    }

    pub fn low_storage(mut self, enabled: bool) -> Self {
        self.low_storage = enabled;
        self
    }

    pub fn clean(mut self, enabled: bool) -> Self {
        self.clean = enabled;
        self
    }

    /// Explicit keystore. Without one, a keystore next to the outputs is used.
    pub fn keystore(mut self, keystore: Option<PathBuf>) -> Self {
        self.keystore = keystore;
        self
    }

    pub fn common_name(mut self, name: impl Into<String>) -> Self {
        self.common_name = name.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Validate and resolve everything.
    ///
    /// `base_file_name` is the file name of the run's base variant; it names
    /// the derived keystore `<output_dir>/<base stem>.keystore`.
    pub fn build(self, base_file_name: &str) -> Result<RunConfig> {
        if self.common_name.trim().is_empty() {
            bail!("Signer common name must not be empty");
        }

        // Everything below compares locations, so compare resolved paths.
        let work_root = resolve_path(&self.work_root)?;
        let output_dir = resolve_path(&self.output_dir)?;

        let cwd = resolve_path(Path::new("."))?;
        if cwd.starts_with(&work_root) {
            bail!(
                "Work root {} contains the current directory, and it is deleted at the start of every run",
                work_root.display()
            );
        }
        if output_dir.starts_with(&work_root) {
            bail!(
                "Output directory {} is inside the work root {}, which is deleted at the start of every run",
                output_dir.display(),
                work_root.display()
            );
        }

        let keystore = match self.keystore {
            Some(path) => resolve_path(&path)?,
            None => {
                let stem = Path::new(base_file_name)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .filter(|s| !s.is_empty())
                    .with_context(|| format!("Invalid base file name '{}'", base_file_name))?;
                output_dir.join(format!("{}.keystore", stem))
            }
        };
        if keystore.starts_with(&work_root) {
            bail!(
                "Keystore {} is inside the work root {}, which is deleted at the start of every run",
                keystore.display(),
                work_root.display()
            );
        }

        Ok(RunConfig {
            target: self.target,
            deploy: self.deploy,
            low_storage: self.low_storage,
            clean: self.clean,
            output_dir,
            work_root,
            signing: SigningIdentity {
                common_name: self.common_name,
                password: self.password,
                keystore,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_env() {
        let base = Path::new("/work");
        let config = Config::from_vars(base, &HashMap::new());

        assert_eq!(config.work_dir, base.join(DEFAULT_WORK_DIR));
        assert_eq!(config.keystore_password, DEFAULT_KEYSTORE_PASSWORD);
        assert_eq!(config.signer_name, DEFAULT_SIGNER_NAME);
        assert!(config.zipalign.is_none());
    }

    #[test]
    fn test_relative_work_dir_is_anchored() {
        let mut vars = HashMap::new();
        vars.insert("APKPATCH_WORK_DIR".to_string(), "tmp/apk".to_string());
        vars.insert("APKPATCH_ADB".to_string(), "/opt/sdk/adb".to_string());
        let config = Config::from_vars(Path::new("/work"), &vars);

        assert_eq!(config.work_dir, PathBuf::from("/work/tmp/apk"));
        assert_eq!(config.tool("adb").unwrap(), PathBuf::from("/opt/sdk/adb"));
    }

    #[test]
    #[serial]
    fn test_env_overrides_dotenv() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".env"),
            "APKPATCH_SIGNER_NAME=from-file\nAPKPATCH_KEYSTORE_PASSWORD=filepass\n",
        )
        .unwrap();
        std::env::set_var("APKPATCH_SIGNER_NAME", "from-env");

        let config = Config::load(temp.path());
        std::env::remove_var("APKPATCH_SIGNER_NAME");

        assert_eq!(config.signer_name, "from-env");
        assert_eq!(config.keystore_password, "filepass");
    }

    #[test]
    fn test_derived_keystore_uses_base_stem() {
        let config = RunConfig::builder("/out", "/tmp/work").build("base.apk").unwrap();
        assert_eq!(config.signing.keystore, PathBuf::from("/out/base.keystore"));
        assert_eq!(config.target, Target::Install);
    }

    #[test]
    fn test_explicit_keystore_wins() {
        let config = RunConfig::builder("/out", "/tmp/work")
            .keystore(Some(PathBuf::from("/keys/release.keystore")))
            .build("base.apk")
            .unwrap();
        assert_eq!(config.signing.keystore, PathBuf::from("/keys/release.keystore"));
    }

    #[test]
    fn test_output_inside_work_root_rejected() {
        let err = RunConfig::builder("/tmp/work/out", "/tmp/work")
            .build("base.apk")
            .unwrap_err();
        assert!(err.to_string().contains("inside the work root"));
    }

    #[test]
    fn test_relative_output_inside_work_root_rejected() {
        let cwd = std::env::current_dir().unwrap();
        let err = RunConfig::builder("work/out", cwd.join("work"))
            .build("base.apk")
            .unwrap_err();
        assert!(err.to_string().contains("inside the work root"));
    }

    #[test]
    fn test_dotted_output_inside_work_root_rejected() {
        let temp = TempDir::new().unwrap();
        let work = temp.path().join("work");
        let out = temp.path().join("elsewhere/../work/out");
        assert!(RunConfig::builder(out, &work).build("base.apk").is_err());
    }

    #[test]
    fn test_keystore_inside_work_root_rejected() {
        let temp = TempDir::new().unwrap();
        let work = temp.path().join("work");
        let err = RunConfig::builder(temp.path().join("out"), &work)
            .keystore(Some(work.join("keys/release.keystore")))
            .build("base.apk")
            .unwrap_err();
        assert!(err.to_string().contains("Keystore"));
    }

    #[test]
    fn test_work_root_containing_cwd_rejected() {
        let cwd = std::env::current_dir().unwrap();
        let temp = TempDir::new().unwrap();
        for root in [cwd.clone(), PathBuf::from("."), cwd.parent().unwrap().to_path_buf()] {
            let result = RunConfig::builder(temp.path().join("out"), root).build("base.apk");
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_paths_are_resolved() {
        let temp = TempDir::new().unwrap();
        let config = RunConfig::builder(temp.path().join("out"), temp.path().join("work"))
            .build("base.apk")
            .unwrap();
        assert!(config.output_dir.is_absolute());
        assert!(config.work_root.is_absolute());
        assert!(config.signing.keystore.is_absolute());
    }
}
