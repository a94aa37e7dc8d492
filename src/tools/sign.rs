use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use super::Signer;
use crate::config::SigningIdentity;
use crate::process::Cmd;

/// Validity of a generated key, in days.
const KEY_VALIDITY_DAYS: &str = "10000";

/// `apksigner` with a PKCS12 keystore.
pub struct ApkSigner {
    apksigner: PathBuf,
    identity: SigningIdentity,
}

impl ApkSigner {
    /// Prepare a signer for one run.
    ///
    /// A missing keystore is generated here with `keytool`, once, before any
    /// variant is signed; every variant then shares the same key.
    pub fn prepare(apksigner: PathBuf, keytool: &Path, identity: SigningIdentity) -> Result<Self> {
        if !identity.keystore.exists() {
            generate_keystore(keytool, &identity)?;
        }
        Ok(Self {
            apksigner,
            identity,
        })
    }
}

impl Signer for ApkSigner {
    fn sign(&self, input: &Path, output: &Path) -> Result<()> {
        let pass = format!("pass:{}", self.identity.password);
        Cmd::new(&self.apksigner)
            .arg("sign")
            .arg("--ks")
            .arg_path(&self.identity.keystore)
            .arg("--ks-key-alias")
            .arg(&self.identity.common_name)
            .arg("--ks-pass")
            .arg_secret(&pass)
            .arg("--key-pass")
            .arg_secret(&pass)
            .arg("--out")
            .arg_path(output)
            .arg_path(input)
            .error_msg(format!("apksigner failed for {}", input.display()))
            .run()?;
        Ok(())
    }
}

fn generate_keystore(keytool: &Path, identity: &SigningIdentity) -> Result<()> {
    if let Some(parent) = identity.keystore.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    info!(keystore = %identity.keystore.display(), "generating signing key");
    Cmd::new(keytool)
        .arg("-genkeypair")
        .arg("-keystore")
        .arg_path(&identity.keystore)
        .args(["-storetype", "PKCS12", "-keyalg", "RSA", "-keysize", "2048"])
        .args(["-validity", KEY_VALIDITY_DAYS])
        .arg("-alias")
        .arg(&identity.common_name)
        .arg("-dname")
        .arg(format!("CN={}", identity.common_name))
        .arg("-storepass")
        .arg_secret(&identity.password)
        .arg("-keypass")
        .arg_secret(&identity.password)
        .arg("-noprompt")
        .error_msg("keytool failed to generate the signing key")
        .run()?;
    Ok(())
}
