/*
 * render.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Render command implementation
 */

//! Render command implementation.
//!
//! Variables come from an optional JSON data file, then from `-V KEY=VALUE`
//! flags, later bindings winning. Command-line flags override the options
//! read from `--config`.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use inky_engine::{Engine, RenderError, TemplateContext, TemplateValue, render_report};
use tracing::{debug, info};

/// Arguments for the render command
#[derive(Debug)]
pub struct RenderArgs {
    pub name: String,
    pub paths: Vec<PathBuf>,
    pub data: Option<PathBuf>,
    pub vars: Vec<String>,
    pub cache_dir: Option<PathBuf>,
    pub strict: bool,
    pub config: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

/// Execute the render command
pub fn execute(args: RenderArgs) -> Result<()> {
    let mut options = super::options(args.config.as_deref())?;
    if args.strict {
        options.strict_variables = true;
    }
    if args.cache_dir.is_some() {
        options.cache_dir = args.cache_dir.clone();
    }
    debug!(?options, "engine options");

    let mut engine = Engine::with_options(super::loader(&args.paths)?, options);
    let context = build_context(&args)?;

    let rendered = match engine.render(&args.name, context) {
        Ok(rendered) => rendered,
        Err(err) => anyhow::bail!("{}", describe(&engine, &err)),
    };

    match &args.output {
        Some(path) => {
            fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(template = %args.name, output = %path.display(), "rendered");
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

fn build_context(args: &RenderArgs) -> Result<TemplateContext> {
    let mut context = match &args.data {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read data file {}", path.display()))?;
            let value: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("Invalid JSON in data file {}", path.display()))?;
            TemplateContext::from_json(value).with_context(|| {
                format!("Data file {} must contain a JSON object", path.display())
            })?
        }
        None => TemplateContext::new(),
    };

    for var in &args.vars {
        let (key, value) = parse_var(var)?;
        context.insert(key, value);
    }
    Ok(context)
}

/// Parse `KEY=VALUE`. VALUE is JSON when it parses as JSON, else a string.
fn parse_var(var: &str) -> Result<(String, TemplateValue)> {
    let (key, raw) = var
        .split_once('=')
        .with_context(|| format!("Invalid variable \"{}\", expected KEY=VALUE", var))?;
    let value = serde_json::from_str::<serde_json::Value>(raw)
        .map(TemplateValue::from)
        .unwrap_or_else(|_| TemplateValue::from(raw));
    Ok((key.trim().to_string(), value))
}

/// Annotate the error with its template source when one is available.
fn describe(engine: &Engine, err: &RenderError) -> String {
    err.template()
        .and_then(|name| {
            let source = engine.loader().source(name).ok()?;
            Some(render_report(name, &source, err))
        })
        .unwrap_or_else(|| err.to_string())
}
