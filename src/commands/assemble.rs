//! Assemble command - turns a patch output into deployable packages.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use apkpatch::config::{Config, Deploy, RunConfig, Target};
use apkpatch::pipeline::{self, RunReport};
use apkpatch::tools::{AdbInstaller, ApkSigner, Installer, RootMounter, Signer, Toolchain, Zipalign};
use apkpatch::variant::PatchOutput;

/// Options of one `assemble` invocation.
pub struct AssembleArgs {
    pub manifest: PathBuf,
    pub output_dir: PathBuf,
    pub work_dir: Option<PathBuf>,
    pub keystore: Option<PathBuf>,
    pub keystore_password: Option<String>,
    pub signer_name: Option<String>,
    pub deploy: Option<Deploy>,
    pub target: Target,
    pub low_storage: bool,
    pub clean: bool,
}

/// Execute the assemble command.
pub fn cmd_assemble(args: AssembleArgs, config: &Config) -> Result<()> {
    println!("=== Assembling {} ===\n", args.manifest.display());
    let start = Instant::now();

    let output = PatchOutput::load(&args.manifest)?;
    let work_root = args.work_dir.unwrap_or_else(|| config.work_dir.clone());
    let run = RunConfig::builder(&args.output_dir, work_root)
        .target(args.target)
        .deploy(args.deploy)
        .low_storage(args.low_storage)
        .clean(args.clean)
        .keystore(args.keystore)
        .common_name(args.signer_name.unwrap_or_else(|| config.signer_name.clone()))
        .password(args.keystore_password.unwrap_or_else(|| config.keystore_password.clone()))
        .build(output.base().file_name())?;

    let tools = toolchain(&run, &output, config)?;

    println!("Package: {}", output.package_name);
    for variant in &output.variants {
        println!("  {} ({})", variant.file_name(), variant.kind);
    }
    println!();

    let report = pipeline::run(&run, &output, &tools)?;
    print_summary(&report, &run, start);

    let failures = report.failures();
    if !failures.is_empty() {
        bail!(
            "Assembly finished with {} failure(s):\n  {}",
            failures.len(),
            failures.join("\n  ")
        );
    }
    Ok(())
}

/// Resolve the collaborators this run needs, and only those.
fn toolchain(run: &RunConfig, output: &PatchOutput, config: &Config) -> Result<Toolchain> {
    let aligner = Arc::new(Zipalign::new(config.tool("zipalign")?));

    let signer: Option<Arc<dyn Signer>> = match run.target {
        Target::Mount => None,
        Target::Install => {
            let apksigner = config.tool("apksigner")?;
            let keytool = config.tool("keytool")?;
            let signer = ApkSigner::prepare(apksigner, &keytool, run.signing.clone())
                .context("Failed to prepare signing key")?;
            Some(Arc::new(signer))
        }
    };

    let installer: Option<Arc<dyn Installer>> = match &run.deploy {
        None => None,
        Some(device) => {
            let adb = config.tool("adb")?;
            let serial = device.serial().map(str::to_string);
            let installer: Arc<dyn Installer> = match run.target {
                Target::Install => Arc::new(AdbInstaller::new(adb, serial)),
                Target::Mount => Arc::new(RootMounter::new(adb, serial, &output.package_name)),
            };
            Some(installer)
        }
    };

    Ok(Toolchain {
        aligner,
        signer,
        installer,
    })
}

fn print_summary(report: &RunReport, run: &RunConfig, start: Instant) {
    let total = start.elapsed().as_secs_f64();
    if total >= 60.0 {
        println!("\n=== Assembly Complete ({:.1}m) ===", total / 60.0);
    } else {
        println!("\n=== Assembly Complete ({:.1}s) ===", total);
    }

    for v in &report.variants {
        println!("  {} [{}]", v.name, v.stage());
        if let Some(sum) = v.checksum() {
            println!("    sha256: {}", sum);
        }
    }

    match &report.install {
        None => {}
        Some(outcome) if outcome.is_accepted() => {
            println!("\nDeployed {} to device.", report.package_name)
        }
        Some(_) => println!("\n[WARN] Device rejected {}.", report.package_name),
    }

    if run.clean {
        println!("\nWork directory removed.");
    } else {
        println!("\nOutput: {}", run.output_dir.display());
    }
}
