/*
 * compile.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compile command: print a template's artifact.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use inky_engine::Engine;

pub fn execute(name: &str, paths: &[PathBuf], config: Option<&Path>) -> Result<()> {
    let options = super::options(config)?;
    let mut engine = Engine::with_options(super::loader(paths)?, options);
    let template = engine
        .load(name)
        .with_context(|| format!("Failed to compile {}", name))?;
    let json = serde_json::to_string_pretty(template.artifact())?;
    println!("{}", json);
    Ok(())
}
