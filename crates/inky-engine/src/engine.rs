/*
 * engine.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The rendering engine.
//!
//! [`Engine`] owns one of each collaborator: a loader, a compiler, the
//! artifact cache, an escaper, and the filter and global tables filled by
//! extensions. Rendering a template loads it together with every template it
//! includes or extends, then hands the lowered programs to an
//! [`Executor`](crate::executor::Executor).

use crate::error::RenderResult;
use crate::executor::{Executor, ExecutorOptions};
use crate::extension::{CoreExtension, Extension, Filter};
use crate::loader::TemplateLoader;
use crate::program::{Program, lower};
use crate::value::{TemplateContext, TemplateValue};
use hashlink::LinkedHashMap;
use inky_compiler::{Artifact, Cache, Compiler, ControlOp, Delimiters, Escaper, Instruction, Lexer};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineOptions {
    /// Raise an error when an echoed variable is undefined.
    pub strict_variables: bool,
    /// Recompile cached artifacts whose template changed since caching.
    pub auto_reload: bool,
    /// Directory for the persistent artifact cache. Memory-only when unset.
    pub cache_dir: Option<PathBuf>,
    pub max_loop_iterations: usize,
    /// Escaping strategy used by `{{ expr }}`.
    pub default_strategy: String,
    pub delimiters: Delimiters,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            strict_variables: false,
            auto_reload: true,
            cache_dir: None,
            max_loop_iterations: 10_000,
            default_strategy: "html".to_string(),
            delimiters: Delimiters::default(),
        }
    }
}

impl EngineOptions {
    /// Parse options from a JSON document. Missing keys keep their defaults.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// A loaded template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    artifact: Artifact,
    program: Program,
}

impl Template {
    pub fn name(&self) -> &str {
        &self.artifact.name
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Blocks declared in this template, in declaration order.
    pub fn block_names(&self) -> Vec<&str> {
        self.artifact.block_names()
    }

    pub fn has_block(&self, name: &str) -> bool {
        self.program.block(name).is_some()
    }

    /// The template named by `@extends`, if any.
    pub fn parent(&self) -> Option<&str> {
        self.program.parent.as_deref()
    }
}

/// The template engine.
pub struct Engine {
    loader: Box<dyn TemplateLoader>,
    compiler: Compiler,
    cache: Cache,
    escaper: Arc<Escaper>,
    filters: LinkedHashMap<String, Filter>,
    globals: LinkedHashMap<String, TemplateValue>,
    extensions: LinkedHashMap<String, Box<dyn Extension>>,
    options: EngineOptions,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("compiler", &self.compiler)
            .field("cache", &self.cache)
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .field("globals", &self.globals)
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine with default options and the core extension.
    pub fn new(loader: impl TemplateLoader + 'static) -> Self {
        Self::with_options(loader, EngineOptions::default())
    }

    pub fn with_options(loader: impl TemplateLoader + 'static, options: EngineOptions) -> Self {
        let mut escaper = Escaper::new();
        escaper.set_default_strategy(options.default_strategy.clone());
        let escaper = Arc::new(escaper);

        let lexer = Lexer::with_delimiters(
            options.delimiters.open.clone(),
            options.delimiters.close.clone(),
        );
        let mut compiler = Compiler::with_lexer(lexer);
        compiler.set_escaper(Arc::clone(&escaper));
        register_engine_directives(&mut compiler);

        let mut engine = Self {
            loader: Box::new(loader),
            compiler,
            cache: Cache::new(options.cache_dir.clone()),
            escaper,
            filters: LinkedHashMap::new(),
            globals: LinkedHashMap::new(),
            extensions: LinkedHashMap::new(),
            options,
        };
        engine.add_extension(CoreExtension);
        engine
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn loader(&self) -> &dyn TemplateLoader {
        self.loader.as_ref()
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    /// Mutable access to the compiler, e.g. to register directives or visitors.
    ///
    /// Artifacts already in the cache are not recompiled when the compiler
    /// changes; clear the cache if that matters.
    pub fn compiler_mut(&mut self) -> &mut Compiler {
        &mut self.compiler
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut Cache {
        &mut self.cache
    }

    pub fn escaper(&self) -> &Escaper {
        &self.escaper
    }

    /// Whether the loader can find the template.
    pub fn exists(&self, name: &str) -> bool {
        self.loader.exists(name)
    }

    /// Add a global variable, visible to every render unless shadowed.
    pub fn add_global(&mut self, name: impl Into<String>, value: impl Into<TemplateValue>) -> &mut Self {
        self.globals.insert(name.into(), value.into());
        self
    }

    pub fn globals(&self) -> &LinkedHashMap<String, TemplateValue> {
        &self.globals
    }

    /// Register an extension's filters, globals and directives.
    ///
    /// Later registrations replace earlier entries with the same name.
    pub fn add_extension(&mut self, extension: impl Extension + 'static) -> &mut Self {
        let name = extension.name().to_string();
        tracing::debug!(extension = %name, "registering extension");

        for (filter, f) in extension.filters() {
            self.filters.replace(filter, f);
        }
        for (global, value) in extension.globals() {
            self.globals.replace(global, value);
        }
        for (directive, handler) in extension.directives() {
            self.compiler.add_directive_handler(directive, handler);
        }
        self.extensions.replace(name, Box::new(extension));
        self
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.contains_key(name)
    }

    /// Register a single filter outside of any extension.
    pub fn add_filter<F>(&mut self, name: impl Into<String>, filter: F) -> &mut Self
    where
        F: Fn(&TemplateValue, &[TemplateValue]) -> TemplateValue + Send + Sync + 'static,
    {
        self.filters.replace(name.into(), Arc::new(filter));
        self
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Registered filter names, in registration order.
    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.keys().map(String::as_str).collect()
    }

    /// Load a template, compiling it unless a usable artifact is cached.
    pub fn load(&mut self, name: &str) -> RenderResult<Template> {
        let artifact = self.artifact(name)?;
        let program = lower(&artifact);
        Ok(Template { artifact, program })
    }

    /// Render a template. `context` bindings shadow globals.
    pub fn render(&mut self, name: &str, context: TemplateContext) -> RenderResult<String> {
        let programs = self.load_tree(name)?;
        let context = context.over(self.global_context());
        tracing::debug!(template = %name, templates = programs.len(), "rendering");
        self.executor(&programs).render(name, &context)
    }

    /// Render one block of a template, resolving overrides along its
    /// `extends` chain.
    pub fn render_block(
        &mut self,
        name: &str,
        block: &str,
        context: TemplateContext,
    ) -> RenderResult<String> {
        let programs = self.load_tree(name)?;
        let context = context.over(self.global_context());
        self.executor(&programs).render_block(name, block, &context)
    }

    fn executor<'a>(&'a self, programs: &'a HashMap<String, Program>) -> Executor<'a> {
        Executor::new(
            programs,
            &self.filters,
            &self.escaper,
            ExecutorOptions {
                strict_variables: self.options.strict_variables,
                max_loop_iterations: self.options.max_loop_iterations,
            },
        )
    }

    fn global_context(&self) -> TemplateContext {
        self.globals
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Load `name` and every template reachable through include/extends.
    fn load_tree(&mut self, name: &str) -> RenderResult<HashMap<String, Program>> {
        let mut programs = HashMap::new();
        let mut pending = vec![name.to_string()];
        while let Some(next) = pending.pop() {
            if programs.contains_key(&next) {
                continue;
            }
            let program = lower(&self.artifact(&next)?);
            pending.extend(
                program
                    .dependencies()
                    .filter(|dep| !programs.contains_key(*dep))
                    .map(str::to_string),
            );
            programs.insert(next, program);
        }
        Ok(programs)
    }

    fn artifact(&mut self, name: &str) -> RenderResult<Artifact> {
        let key = self.loader.cache_key(name)?;

        if let Some(text) = self.cache.get(&key)? {
            if self.is_cache_usable(name, &key)? {
                match Artifact::from_text(&text) {
                    Ok(artifact) if artifact.is_current() => {
                        tracing::trace!(template = %name, key = %key, "artifact cache hit");
                        return Ok(artifact);
                    }
                    Ok(artifact) => {
                        tracing::debug!(template = %name, format = artifact.format, "cached artifact has an old format");
                    }
                    Err(e) => {
                        tracing::warn!(template = %name, key = %key, error = %e, "discarding unreadable cached artifact");
                    }
                }
            } else {
                tracing::debug!(template = %name, "template changed since it was cached");
            }
        }

        let source = self.loader.source(name)?;
        let artifact = self.compiler.compile(&source, name)?;
        self.cache.set(&key, artifact.to_text())?;
        Ok(artifact)
    }

    fn is_cache_usable(&self, name: &str, key: &str) -> RenderResult<bool> {
        if !self.options.auto_reload {
            return Ok(true);
        }
        match self.cache.timestamp(key) {
            Some(time) => Ok(self.loader.is_fresh(name, time)?),
            None => Ok(false),
        }
    }
}

/// `include`, `extends`, `block` and `endblock`.
fn register_engine_directives(compiler: &mut Compiler) {
    compiler
        .add_directive("include", |args, _| {
            vec![Instruction::Control(ControlOp::Include {
                template: template_argument(args),
            })]
        })
        .add_directive("extends", |args, _| {
            vec![Instruction::Control(ControlOp::Extends {
                template: template_argument(args),
            })]
        })
        .add_directive("block", |args, _| {
            vec![Instruction::BlockOpen {
                name: template_argument(args),
            }]
        })
        .add_directive("endblock", |_, _| vec![Instruction::BlockClose]);
}

/// Strip one pair of parentheses, then one pair of matching quotes.
///
/// `("base.inky")`, `"base.inky"` and `base.inky` all yield `base.inky`.
fn template_argument(args: &str) -> String {
    let mut arg = args.trim();
    if let Some(inner) = arg.strip_prefix('(').and_then(|a| a.strip_suffix(')')) {
        arg = inner.trim();
    }
    for quote in ['"', '\''] {
        if let Some(inner) = arg.strip_prefix(quote).and_then(|a| a.strip_suffix(quote)) {
            return inner.to_string();
        }
    }
    arg.to_string()
}
