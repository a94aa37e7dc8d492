//! Shared file and path helpers.

pub mod checksum;
pub mod files;

pub use checksum::sha256_file;
pub use files::{copy_file_with_dirs, resolve_path};
