/*
 * tokens.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tokens command: dump the lexer output for a file, one token per line.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use inky_compiler::Lexer;

pub fn execute(file: &Path, open: &str, close: &str) -> Result<()> {
    let source = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let name = file.display().to_string();
    for token in Lexer::with_delimiters(open, close).tokenize(&source, &name) {
        let (line, column) = token.position();
        println!(
            "{}:{} {} {:?}",
            line,
            column,
            token.kind().label(),
            token.value()
        );
    }
    Ok(())
}
