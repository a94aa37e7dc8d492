//! Package variants and the patch output manifest.
//!
//! The patch engine runs before assembly and describes what it produced in a
//! JSON manifest: one record per physical package file, with the replacement
//! resource tree, generated code containers (base only) and the entries that
//! must stay stored.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::common::resolve_path;

/// Kind of physical package file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    Base,
    SplitLibrary,
    SplitAsset,
    SplitLanguage,
}

impl VariantKind {
    pub fn is_base(self) -> bool {
        self == VariantKind::Base
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VariantKind::Base => "base",
            VariantKind::SplitLibrary => "split (library)",
            VariantKind::SplitAsset => "split (asset)",
            VariantKind::SplitLanguage => "split (language)",
        };
        f.write_str(s)
    }
}

/// A generated code container (e.g. `classes2.dex`).
#[derive(Debug, Clone)]
pub struct CodeContainer {
    /// Archive entry name.
    pub name: String,
    pub source: PathBuf,
}

impl CodeContainer {
    pub fn read(&self) -> Result<Vec<u8>> {
        fs::read(&self.source)
            .with_context(|| format!("Failed to read code container {}", self.source.display()))
    }
}

/// One physical package file of the run.
#[derive(Debug, Clone)]
pub struct Variant {
    pub kind: VariantKind,
    pub file: PathBuf,
    pub resources: Option<PathBuf>,
    pub do_not_compress: Vec<String>,
    pub code_containers: Vec<CodeContainer>,
    /// Patches the engine failed to apply to this variant.
    pub patch_errors: Vec<String>,
}

impl Variant {
    /// File name shared by every stage directory and the output directory.
    pub fn file_name(&self) -> &str {
        self.file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// Everything the patch engine produced for one application.
#[derive(Debug, Clone)]
pub struct PatchOutput {
    pub package_name: String,
    /// Base first, splits after in manifest order.
    pub variants: Vec<Variant>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    package_name: String,
    variants: Vec<RawVariant>,
}

#[derive(Debug, Deserialize)]
struct RawVariant {
    kind: VariantKind,
    file: PathBuf,
    #[serde(default)]
    resources: Option<PathBuf>,
    #[serde(default)]
    do_not_compress: Vec<String>,
    #[serde(default)]
    code_containers: Vec<PathBuf>,
    #[serde(default)]
    patch_errors: Vec<String>,
}

impl PatchOutput {
    /// Load and validate a manifest. Relative paths resolve against its directory.
    pub fn load(manifest: &Path) -> Result<Self> {
        let content = fs::read_to_string(manifest)
            .with_context(|| format!("Failed to read patch manifest {}", manifest.display()))?;
        // Anchor relative entries to an absolute directory so every later
        // location check sees resolved paths.
        let base_dir = resolve_path(manifest.parent().unwrap_or_else(|| Path::new(".")))?;
        Self::parse(&content, &base_dir)
            .with_context(|| format!("Invalid patch manifest {}", manifest.display()))
    }

    pub fn parse(content: &str, base_dir: &Path) -> Result<Self> {
        let raw: RawManifest = serde_json::from_str(content)?;
        let anchor = |p: PathBuf| if p.is_absolute() { p } else { base_dir.join(p) };

        if raw.package_name.trim().is_empty() {
            bail!("package_name is empty");
        }

        let mut variants = Vec::with_capacity(raw.variants.len());
        for v in raw.variants {
            let file = anchor(v.file);
            if !file.is_file() {
                bail!("Variant file not found: {}", file.display());
            }
            if !v.kind.is_base() && !v.code_containers.is_empty() {
                bail!(
                    "Only the base variant may carry code containers ({} has {})",
                    file.display(),
                    v.code_containers.len()
                );
            }

            let resources = v.resources.map(&anchor);
            if let Some(dir) = &resources {
                if !dir.is_dir() {
                    bail!("Resource directory not found: {}", dir.display());
                }
            }

            let mut code_containers = Vec::with_capacity(v.code_containers.len());
            for source in v.code_containers {
                let source = anchor(source);
                let name = source
                    .file_name()
                    .and_then(|n| n.to_str())
                    .with_context(|| format!("Invalid code container path {}", source.display()))?
                    .to_string();
                if !source.is_file() {
                    bail!("Code container not found: {}", source.display());
                }
                code_containers.push(CodeContainer { name, source });
            }

            variants.push(Variant {
                kind: v.kind,
                file,
                resources,
                do_not_compress: v.do_not_compress,
                code_containers,
                patch_errors: v.patch_errors,
            });
        }

        let bases = variants.iter().filter(|v| v.kind.is_base()).count();
        if bases != 1 {
            bail!("Expected exactly one base variant, found {}", bases);
        }

        let mut names = HashSet::new();
        for v in &variants {
            if v.file_name().is_empty() || !names.insert(v.file_name().to_string()) {
                bail!("Duplicate or invalid variant file name: {}", v.file.display());
            }
        }

        // Stable: base first, splits keep their manifest order.
        variants.sort_by_key(|v| !v.kind.is_base());

        Ok(Self {
            package_name: raw.package_name,
            variants,
        })
    }

    pub fn base(&self) -> &Variant {
        &self.variants[0]
    }

    /// Every input path the run reads from.
    pub fn inputs(&self) -> impl Iterator<Item = &Path> {
        self.variants.iter().flat_map(|v| {
            std::iter::once(v.file.as_path())
                .chain(v.resources.as_deref())
                .chain(v.code_containers.iter().map(|c| c.source.as_path()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_parse_orders_base_first_and_anchors_paths() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "split_config.en.apk");
        touch(temp.path(), "base.apk");
        touch(temp.path(), "classes2.dex");
        fs::create_dir(temp.path().join("res-out")).unwrap();

        let output = PatchOutput::parse(
            r#"{
                "package_name": "com.example.app",
                "variants": [
                    { "kind": "split_language", "file": "split_config.en.apk" },
                    {
                        "kind": "base",
                        "file": "base.apk",
                        "resources": "res-out",
                        "do_not_compress": ["resources.arsc"],
                        "code_containers": ["classes2.dex"]
                    }
                ]
            }"#,
            temp.path(),
        )
        .unwrap();

        assert_eq!(output.base().kind, VariantKind::Base);
        assert_eq!(output.base().file, temp.path().join("base.apk"));
        assert_eq!(output.base().code_containers[0].name, "classes2.dex");
        assert_eq!(output.variants.len(), 2);
        assert_eq!(output.variants[1].kind, VariantKind::SplitLanguage);
        assert_eq!(output.inputs().count(), 4);
    }

    #[test]
    fn test_requires_exactly_one_base() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a.apk");
        touch(temp.path(), "b.apk");

        let err = PatchOutput::parse(
            r#"{ "package_name": "p", "variants": [
                { "kind": "base", "file": "a.apk" },
                { "kind": "base", "file": "b.apk" } ] }"#,
            temp.path(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("exactly one base"));

        let err = PatchOutput::parse(
            r#"{ "package_name": "p", "variants": [ { "kind": "split_asset", "file": "a.apk" } ] }"#,
            temp.path(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("found 0"));
    }

    #[test]
    fn test_code_containers_only_on_base() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "base.apk");
        touch(temp.path(), "split.apk");
        touch(temp.path(), "classes.dex");

        let err = PatchOutput::parse(
            r#"{ "package_name": "p", "variants": [
                { "kind": "base", "file": "base.apk" },
                { "kind": "split_library", "file": "split.apk", "code_containers": ["classes.dex"] } ] }"#,
            temp.path(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Only the base"));
    }

    #[test]
    fn test_missing_variant_file() {
        let temp = TempDir::new().unwrap();
        let err = PatchOutput::parse(
            r#"{ "package_name": "p", "variants": [ { "kind": "base", "file": "gone.apk" } ] }"#,
            temp.path(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_duplicate_file_names_rejected() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("other")).unwrap();
        touch(temp.path(), "base.apk");
        touch(&temp.path().join("other"), "base.apk");

        let err = PatchOutput::parse(
            r#"{ "package_name": "p", "variants": [
                { "kind": "base", "file": "base.apk" },
                { "kind": "split_asset", "file": "other/base.apk" } ] }"#,
            temp.path(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }
}
