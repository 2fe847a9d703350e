//! # portals
//!
//! Command-line front end for `portals-core`. It reads the YAML configuration,
//! connects every portal to its S3-compatible endpoint and runs the ingestion
//! pipeline, plus a few maintenance commands.

pub mod cli;
pub mod daemon;
pub mod load_config;
pub mod storage;

pub use cli::{run, Cli, Commands};
