//! apkpatch library exports.
//!
//! The binary is a thin command layer over these modules; integration tests
//! drive them directly with in-process collaborators.

pub mod archive;
pub mod common;
pub mod config;
pub mod pipeline;
pub mod process;
pub mod timing;
pub mod tools;
pub mod variant;
pub mod workspace;
