//! Clean command - removes intermediate files.

use anyhow::Result;

use apkpatch::config::Config;
use apkpatch::workspace::{StageDir, Workspace};

/// Clean target for the clean command.
pub enum CleanTarget {
    /// The whole work directory (default)
    All,
    /// One stage directory
    Stage(StageDir),
}

/// Execute the clean command.
pub fn cmd_clean(target: CleanTarget, config: &Config) -> Result<()> {
    let ws = Workspace::existing(&config.work_dir, false);
    match target {
        CleanTarget::All => {
            if ws.delete_root()? {
                println!("Removed {}", ws.root().display());
            } else {
                println!("Nothing to clean.");
            }
        }
        CleanTarget::Stage(dir) => {
            if ws.delete(dir, true)? {
                println!("Removed {}", ws.path(dir).display());
            } else {
                println!("No {} directory to clean.", dir);
            }
        }
    }
    Ok(())
}
