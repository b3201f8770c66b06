/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Rendering engine for Inky templates.
//!
//! This crate turns the artifacts produced by `inky-compiler` into output:
//!
//! - [`TemplateLoader`]s find template sources ([`FileSystemLoader`],
//!   [`MemoryLoader`]).
//! - [`TemplateValue`] and [`TemplateContext`] model the bound variables.
//! - Echo and control expressions use a small language of paths, literals
//!   and filters (see [`expr`]). There are no operators.
//! - Artifacts are lowered into a structured [`Program`] and run by the
//!   [`Executor`], which handles loops, blocks, includes and inheritance.
//! - [`Extension`]s contribute filters, globals and directives;
//!   [`CoreExtension`] is always registered.
//!
//! # Example
//!
//! ```ignore
//! use inky_engine::{Engine, MemoryLoader, TemplateContext};
//!
//! let loader = MemoryLoader::with_templates([
//!     ("base", "<h1>{{ @block title }}Untitled{{ @endblock }}</h1>"),
//!     ("page", "{{ @extends \"base\" }}{{ @block title }}{{ name | upper }}{{ @endblock }}"),
//! ]);
//! let mut engine = Engine::new(loader);
//!
//! let mut ctx = TemplateContext::new();
//! ctx.insert("name", "home");
//! assert_eq!(engine.render("page", ctx)?, "<h1>HOME</h1>");
//! ```

pub mod engine;
pub mod error;
pub mod executor;
pub mod expr;
pub mod extension;
pub mod loader;
pub mod program;
pub mod report;
pub mod value;

// Re-export main types at crate root
pub use engine::{Engine, EngineOptions, Template};
pub use error::{LoaderError, LoaderResult, RenderError, RenderResult};
pub use executor::{Executor, ExecutorOptions};
pub use extension::{CoreExtension, Extension, Filter};
pub use loader::{FileSystemLoader, MemoryLoader, TemplateLoader};
pub use program::{Program, Stmt, lower};
pub use report::render_report;
pub use value::{PathSegment, TemplateContext, TemplateValue};
