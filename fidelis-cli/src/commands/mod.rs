//! Subcommand implementations.

pub mod inspect;
pub mod metadata;
pub mod verify_toc;

use std::path::Path;

use anyhow::{Context, Result};

/// Read an input file, with the path in the error.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))
}
