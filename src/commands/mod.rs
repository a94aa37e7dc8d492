//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `assemble` - Run the assembly pipeline over a patch output
//! - `uninstall` - Remove a deployed package from a device
//! - `clean` - Remove the work directory
//! - `show` - Display configuration
//! - `preflight` - Check host tools

pub mod assemble;
pub mod clean;
mod preflight;
pub mod show;
mod uninstall;

pub use assemble::cmd_assemble;
pub use clean::cmd_clean;
pub use preflight::cmd_preflight;
pub use show::cmd_show;
pub use uninstall::cmd_uninstall;
