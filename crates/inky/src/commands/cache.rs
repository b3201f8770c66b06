/*
 * cache.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Cache maintenance commands.

use std::path::Path;

use anyhow::{Context, Result};
use inky_compiler::Cache;
use tracing::info;

pub fn clear(cache_dir: &Path) -> Result<()> {
    let mut cache = Cache::with_directory(cache_dir);
    cache
        .clear()
        .with_context(|| format!("Failed to clear cache at {}", cache_dir.display()))?;
    info!(cache_dir = %cache_dir.display(), "cache cleared");
    println!("Cleared {}", cache_dir.display());
    Ok(())
}
