//! Show command - displays information.

use anyhow::Result;

use apkpatch::config::Config;
use apkpatch::workspace::{StageDir, Workspace};

/// What to show.
pub enum ShowTarget {
    /// Resolved configuration
    Config,
    /// Contents of the work directory stages
    Workspace,
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Config => config.print(),
        ShowTarget::Workspace => {
            let ws = Workspace::existing(&config.work_dir, false);
            println!("Work directory: {}", ws.root().display());
            for dir in StageDir::ALL {
                let path = ws.path(dir);
                if !path.is_dir() {
                    println!("  {:<8} (absent)", dir.name());
                    continue;
                }
                let mut names: Vec<String> = std::fs::read_dir(&path)?
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect();
                names.sort();
                println!("  {:<8} {} file(s)", dir.name(), names.len());
                for name in names {
                    println!("    {}", name);
                }
            }
        }
    }
    Ok(())
}
