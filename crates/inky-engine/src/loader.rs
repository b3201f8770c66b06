/*
 * loader.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template source loading.
//!
//! A loader maps template names to source text, to the identity key used by
//! the artifact cache, and to a freshness check against a cache timestamp.

use crate::error::{LoaderError, LoaderResult};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Trait for loading template sources.
pub trait TemplateLoader {
    /// Source text of the named template.
    fn source(&self, name: &str) -> LoaderResult<String>;

    /// Identity key for the artifact cache, typically the resolved path.
    fn cache_key(&self, name: &str) -> LoaderResult<String>;

    /// Whether the template has not changed since `time`.
    fn is_fresh(&self, name: &str, time: SystemTime) -> LoaderResult<bool>;

    fn exists(&self, name: &str) -> bool;
}

/// Loader that reads templates from a list of directories.
///
/// Names are resolved in order:
/// - an absolute path to an existing file is used as-is,
/// - otherwise each search path is tried in registration order.
#[derive(Debug, Clone, Default)]
pub struct FileSystemLoader {
    paths: Vec<PathBuf>,
}

impl FileSystemLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loader over several search paths.
    pub fn with_paths<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> LoaderResult<Self> {
        let mut loader = Self::new();
        for path in paths {
            loader.add_path(path)?;
        }
        Ok(loader)
    }

    /// Add a search path. It must be an existing directory.
    pub fn add_path(&mut self, path: impl AsRef<Path>) -> LoaderResult<&mut Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(LoaderError::InvalidPath {
                path: path.to_path_buf(),
            });
        }
        let canonical = path
            .canonicalize()
            .map_err(|_| LoaderError::InvalidPath {
                path: path.to_path_buf(),
            })?;
        self.paths.push(canonical);
        Ok(self)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Resolve a template name to a file.
    pub fn resolve(&self, name: &str) -> LoaderResult<PathBuf> {
        let direct = Path::new(name);
        if direct.is_absolute() && direct.is_file() {
            return Ok(direct.to_path_buf());
        }

        self.paths
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| LoaderError::NotFound {
                name: name.to_string(),
                paths: self.paths.clone(),
            })
    }
}

impl TemplateLoader for FileSystemLoader {
    fn source(&self, name: &str) -> LoaderResult<String> {
        let path = self.resolve(name)?;
        fs::read_to_string(&path).map_err(|source| LoaderError::NotReadable {
            name: name.to_string(),
            source,
        })
    }

    fn cache_key(&self, name: &str) -> LoaderResult<String> {
        Ok(self.resolve(name)?.to_string_lossy().into_owned())
    }

    fn is_fresh(&self, name: &str, time: SystemTime) -> LoaderResult<bool> {
        let path = self.resolve(name)?;
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|source| LoaderError::NotReadable {
                name: name.to_string(),
                source,
            })?;
        Ok(modified <= time)
    }

    fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }
}

/// Loader that serves templates from memory.
///
/// Useful for testing and for templates bundled into an application.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    templates: HashMap<String, (String, SystemTime)>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a template, stamped with the current time.
    pub fn add(&mut self, name: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.add_at(name, source, SystemTime::now())
    }

    /// Add or replace a template with an explicit modification time.
    pub fn add_at(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
        modified: SystemTime,
    ) -> &mut Self {
        self.templates.insert(name.into(), (source.into(), modified));
        self
    }

    /// Create a loader with the given templates.
    pub fn with_templates(
        templates: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        let mut loader = Self::new();
        for (name, source) in templates {
            loader.add(name, source);
        }
        loader
    }

    fn entry(&self, name: &str) -> LoaderResult<&(String, SystemTime)> {
        self.templates
            .get(name)
            .ok_or_else(|| LoaderError::NotFound {
                name: name.to_string(),
                paths: Vec::new(),
            })
    }
}

impl TemplateLoader for MemoryLoader {
    fn source(&self, name: &str) -> LoaderResult<String> {
        self.entry(name).map(|(source, _)| source.clone())
    }

    fn cache_key(&self, name: &str) -> LoaderResult<String> {
        self.entry(name)?;
        Ok(format!("memory:{}", name))
    }

    fn is_fresh(&self, name: &str, time: SystemTime) -> LoaderResult<bool> {
        self.entry(name).map(|(_, modified)| *modified <= time)
    }

    fn exists(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }
}
