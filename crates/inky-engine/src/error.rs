/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template loading and rendering.

use inky_compiler::{CompileError, EscapeError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`TemplateLoader`](crate::loader::TemplateLoader).
#[derive(Debug, Error)]
pub enum LoaderError {
    /// No search path holds the template.
    #[error("Template not found: {name}{}", searched_in(.paths))]
    NotFound { name: String, paths: Vec<PathBuf> },

    /// The template exists but could not be read.
    #[error("Template \"{name}\" is not readable")]
    NotReadable {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A search path is not a directory.
    #[error("Path \"{}\" is not a directory", .path.display())]
    InvalidPath { path: PathBuf },
}

fn searched_in(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return String::new();
    }
    let joined: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    format!(" (searched in: {})", joined.join(", "))
}

/// Errors that can occur while rendering a template.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// Only raised when strict variables are enabled.
    #[error("Undefined variable \"{name}\" in template \"{template}\"")]
    UndefinedVariable {
        name: String,
        template: String,
        line: usize,
    },

    #[error("Undefined filter \"{name}\" in template \"{template}\"")]
    UndefinedFilter { name: String, template: String },

    #[error(transparent)]
    Escape(#[from] EscapeError),

    #[error("Invalid expression \"{expression}\" in template \"{template}\": {message}")]
    InvalidExpression {
        expression: String,
        template: String,
        message: String,
    },

    #[error("Block \"{name}\" does not exist in template \"{template}\"")]
    BlockNotFound { name: String, template: String },

    /// An include or extends chain leads back to a template already being rendered.
    #[error("Circular reference detected: {}", .chain.join(" -> "))]
    CircularReference { chain: Vec<String> },

    #[error("Loop in template \"{template}\" exceeded {limit} iterations")]
    LoopLimitExceeded { template: String, limit: usize },

    /// Persistent cache I/O failure.
    #[error("Cache error: {0}")]
    Cache(#[from] std::io::Error),
}

impl RenderError {
    /// Name of the template the error is located in, if any.
    pub fn template(&self) -> Option<&str> {
        match self {
            RenderError::Compile(e) => Some(e.template()),
            RenderError::UndefinedVariable { template, .. }
            | RenderError::UndefinedFilter { template, .. }
            | RenderError::InvalidExpression { template, .. }
            | RenderError::BlockNotFound { template, .. }
            | RenderError::LoopLimitExceeded { template, .. } => Some(template),
            _ => None,
        }
    }
}

/// Result type for loader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;
