//! apkpatch - repackages patched Android applications.
//!
//! Takes the output of a patch run (original base and split packages plus
//! recompiled resources and code containers) and produces:
//! - Aligned, signed packages ready for `adb install-multiple`
//! - Or aligned, unsigned packages bind-mounted over a rooted device's app

mod commands;
mod preflight;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use apkpatch::config::{Config, Deploy, Target};
use apkpatch::workspace::StageDir;
use commands::assemble::AssembleArgs;

#[derive(Parser)]
#[command(name = "apkpatch")]
#[command(about = "Assemble, sign and deploy patched Android packages")]
#[command(
    after_help = "QUICK START:\n  apkpatch preflight             Check host tools\n  apkpatch assemble patch.json   Build signed packages into ./out\n  apkpatch assemble patch.json --deploy   ...and install them\n  apkpatch clean                 Remove the work directory"
)]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble the packages described by a patch manifest
    Assemble {
        /// Patch manifest (JSON)
        manifest: PathBuf,

        /// Output directory for final packages
        #[arg(short, long, default_value = "out")]
        out: PathBuf,

        /// Work directory for intermediate files (wiped at start)
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Keystore to sign with (default: <out>/<base>.keystore, created if missing)
        #[arg(long)]
        keystore: Option<PathBuf>,

        /// Keystore and key password
        #[arg(long)]
        keystore_password: Option<String>,

        /// Common name of a generated signing certificate
        #[arg(long)]
        signer: Option<String>,

        /// Install on a device after assembly (optional serial)
        #[arg(long, value_name = "SERIAL", num_args = 0..=1, default_missing_value = "")]
        deploy: Option<String>,

        /// Skip signing and bind-mount over the installed app (needs root)
        #[arg(long)]
        mount: bool,

        /// Delete each stage directory as soon as the next stage is done
        #[arg(long)]
        low_storage: bool,

        /// Remove the work directory (and deployed outputs) when done
        #[arg(long)]
        clean: bool,
    },

    /// Remove a package from a device
    Uninstall {
        /// Package name (e.g. com.example.app)
        package: String,

        /// Device serial
        #[arg(long)]
        device: Option<String>,

        /// Undo a mount instead of uninstalling
        #[arg(long)]
        mount: bool,
    },

    /// Run preflight checks (verify host tools before assembly)
    Preflight {
        /// Also check deployment (optional serial)
        #[arg(long, value_name = "SERIAL", num_args = 0..=1, default_missing_value = "")]
        deploy: Option<String>,

        /// Check for a mount run (no signing tools needed)
        #[arg(long)]
        mount: bool,

        /// Fail if any checks fail (exit code 1)
        #[arg(long)]
        strict: bool,
    },

    /// Clean intermediate files (default: the whole work directory)
    Clean {
        #[command(subcommand)]
        what: Option<CleanTarget>,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },
}

#[derive(Subcommand)]
enum CleanTarget {
    /// Patched archives only
    Patched,
    /// Aligned archives only
    Aligned,
    /// Signed archives only
    Signed,
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show current configuration
    Config,
    /// Show work directory contents
    Workspace,
}

fn deploy_arg(value: Option<String>) -> Option<Deploy> {
    value.map(|serial| {
        if serial.is_empty() {
            Deploy::AnyDevice
        } else {
            Deploy::Serial(serial)
        }
    })
}

fn target_arg(mount: bool) -> Target {
    if mount {
        Target::Mount
    } else {
        Target::Install
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let base_dir = std::env::current_dir()?;
    let config = Config::load(&base_dir);

    match cli.command {
        Commands::Assemble {
            manifest,
            out,
            work_dir,
            keystore,
            keystore_password,
            signer,
            deploy,
            mount,
            low_storage,
            clean,
        } => {
            let args = AssembleArgs {
                manifest,
                output_dir: out,
                work_dir,
                keystore,
                keystore_password,
                signer_name: signer,
                deploy: deploy_arg(deploy),
                target: target_arg(mount),
                low_storage,
                clean,
            };
            commands::cmd_assemble(args, &config)?;
        }

        Commands::Uninstall {
            package,
            device,
            mount,
        } => {
            let device = device.map(Deploy::Serial).unwrap_or(Deploy::AnyDevice);
            commands::cmd_uninstall(&package, device, target_arg(mount), &config)?;
        }

        Commands::Preflight {
            deploy,
            mount,
            strict,
        } => {
            let needs = preflight::Requirements {
                sign: !mount,
                deploy: deploy_arg(deploy),
            };
            commands::cmd_preflight(&config, &needs, strict)?;
        }

        Commands::Clean { what } => {
            let clean_target = match what {
                None => commands::clean::CleanTarget::All,
                Some(CleanTarget::Patched) => commands::clean::CleanTarget::Stage(StageDir::Patched),
                Some(CleanTarget::Aligned) => commands::clean::CleanTarget::Stage(StageDir::Aligned),
                Some(CleanTarget::Signed) => commands::clean::CleanTarget::Stage(StageDir::Signed),
            };
            commands::cmd_clean(clean_target, &config)?;
        }

        Commands::Show { what } => {
            let show_target = match what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Workspace => commands::show::ShowTarget::Workspace,
            };
            commands::cmd_show(show_target, &config)?;
        }
    }

    Ok(())
}
