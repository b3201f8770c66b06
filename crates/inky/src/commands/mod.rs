/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Command implementations for the Inky CLI
//!
//! Each command module handles the CLI interface and delegates to
//! inky-engine or inky-compiler for the actual work.

pub mod cache;
pub mod compile;
pub mod render;
pub mod tokens;

use anyhow::{Context, Result};
use inky_engine::{EngineOptions, FileSystemLoader};
use std::fs;
use std::path::{Path, PathBuf};

/// Build a loader over the given search paths, or the current directory.
pub fn loader(paths: &[PathBuf]) -> Result<FileSystemLoader> {
    if paths.is_empty() {
        return FileSystemLoader::with_paths(["."]).context("Failed to use the current directory");
    }
    FileSystemLoader::with_paths(paths).context("Invalid template search path")
}

/// Read engine options from a JSON file, or use the defaults.
pub fn options(config: Option<&Path>) -> Result<EngineOptions> {
    let Some(path) = config else {
        return Ok(EngineOptions::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    EngineOptions::from_json(&text)
        .with_context(|| format!("Invalid config file {}", path.display()))
}
