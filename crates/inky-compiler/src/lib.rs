/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template compilation pipeline for Inky.
//!
//! Source text flows through four stages:
//!
//! - [`Lexer`]: scans for the open/close delimiter pair (default `{{ }}`) and
//!   produces a [`Token`] stream terminated by EOF. Never fails.
//! - [`Parser`]: builds a flat AST under a [`Root`] node. Fails only on a
//!   token it has no builder for.
//! - [`Compiler`]: runs registered [`NodeVisitor`]s, then generates an
//!   [`Artifact`], a flat list of [`Instruction`]s. Directives expand through
//!   a per-compiler registry; escaping is opt-in through an [`Escaper`].
//! - [`Cache`]: stores artifact text in memory and, optionally, in a
//!   hash-sharded directory.
//!
//! Tag syntax inside the delimiters:
//!
//! - `{{ name }}` escaped output
//! - `{{ !name }}` raw output
//! - `{{ # text }}` comment
//! - `{{ @name args }}` directive
//! - `{{ {% name }}` block
//!
//! # Example
//!
//! ```ignore
//! use inky_compiler::{Compiler, Escaper};
//! use std::sync::Arc;
//!
//! let mut compiler = Compiler::new();
//! compiler.set_escaper(Arc::new(Escaper::new()));
//! let artifact = compiler.compile("Hello {{ name }}!", "greeting")?;
//! println!("{}", artifact.to_text());
//! ```

pub mod artifact;
pub mod ast;
pub mod cache;
pub mod compiler;
pub mod error;
pub mod escaper;
pub mod lexer;
pub mod parser;
pub mod token;

// Re-export main types at crate root
pub use artifact::{ARTIFACT_FORMAT, Artifact, ControlOp, Instruction};
pub use ast::{Block, Comment, Directive, Node, NodeVisitor, Raw, Root, Text, Variable};
pub use cache::{Cache, CacheEntry};
pub use compiler::{Compiler, DirectiveHandler};
pub use error::{CompileError, CompileResult, EscapeError};
pub use escaper::Escaper;
pub use lexer::{Delimiters, Lexer};
pub use parser::Parser;
pub use token::{Token, TokenKind};
