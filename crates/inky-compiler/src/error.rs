/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template compilation and output escaping.
//!
//! Lexing and code generation never fail. The only fatal compile-time error
//! is a structural mismatch found by the parser.

use thiserror::Error;

/// Errors that can occur while compiling a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The parser met a token it cannot build a node from.
    #[error("Syntax error in \"{template}\" at line {line}: {message}")]
    Syntax {
        message: String,
        template: String,
        /// 1-based line of the offending token.
        line: usize,
        /// 1-based column of the offending token.
        column: usize,
    },
}

impl CompileError {
    /// Build a syntax error for the given template position.
    pub fn syntax(
        message: impl Into<String>,
        template: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        CompileError::Syntax {
            message: message.into(),
            template: template.into(),
            line,
            column,
        }
    }

    /// Name of the template the error was raised for.
    pub fn template(&self) -> &str {
        match self {
            CompileError::Syntax { template, .. } => template,
        }
    }

    /// `(line, column)` of the error.
    pub fn position(&self) -> (usize, usize) {
        match self {
            CompileError::Syntax { line, column, .. } => (*line, *column),
        }
    }
}

/// Errors raised by the [`Escaper`](crate::escaper::Escaper).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscapeError {
    /// No strategy is registered under this name.
    #[error("Unknown escaping strategy \"{name}\"")]
    UnknownStrategy { name: String },
}

/// Result type for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
