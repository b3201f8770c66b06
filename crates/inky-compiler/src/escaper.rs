/*
 * escaper.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Named output-sanitization strategies.
//!
//! The [`Compiler`](crate::compiler::Compiler) only records which strategy
//! applies to an echo; the execution backend calls [`Escaper::escape`] when
//! the value is known.

use crate::error::EscapeError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// An escaping function.
pub type EscapeFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Table of escaping strategies plus a default strategy name.
#[derive(Clone)]
pub struct Escaper {
    default_strategy: String,
    strategies: HashMap<String, EscapeFn>,
}

impl fmt::Debug for Escaper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.strategies.keys().collect();
        names.sort();
        f.debug_struct("Escaper")
            .field("default_strategy", &self.default_strategy)
            .field("strategies", &names)
            .finish()
    }
}

impl Default for Escaper {
    fn default() -> Self {
        Self::new()
    }
}

impl Escaper {
    /// Create an escaper with the `html`, `attr`, `js`, `css` and `url` strategies.
    pub fn new() -> Self {
        let mut escaper = Self {
            default_strategy: "html".to_string(),
            strategies: HashMap::new(),
        };
        escaper
            .add_strategy("html", escape_html)
            .add_strategy("attr", escape_html)
            .add_strategy("js", escape_js)
            .add_strategy("css", escape_css)
            .add_strategy("url", escape_url);
        escaper
    }

    /// Escape `value` with the named strategy.
    pub fn escape(&self, value: &str, strategy: &str) -> Result<String, EscapeError> {
        let escape = self
            .strategies
            .get(strategy)
            .ok_or_else(|| EscapeError::UnknownStrategy {
                name: strategy.to_string(),
            })?;
        Ok(escape(value))
    }

    /// Register a strategy. An existing strategy with the same name is replaced.
    pub fn add_strategy<F>(&mut self, name: impl Into<String>, escape: F) -> &mut Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.strategies.insert(name.into(), Arc::new(escape));
        self
    }

    pub fn has_strategy(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    pub fn set_default_strategy(&mut self, name: impl Into<String>) -> &mut Self {
        self.default_strategy = name.into();
        self
    }

    pub fn default_strategy(&self) -> &str {
        &self.default_strategy
    }

    /// Registered strategy names, sorted.
    pub fn strategy_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Entity-encode `& < > " '`.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Encode as a JSON string literal safe to embed in a `<script>` element.
pub fn escape_js(value: &str) -> String {
    let encoded = serde_json::Value::String(value.to_string()).to_string();
    let inner = &encoded[1..encoded.len() - 1];

    let mut out = String::with_capacity(encoded.len() + 8);
    out.push('"');
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('"') => out.push_str("\\u0022"),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            '<' => out.push_str("\\u003C"),
            '>' => out.push_str("\\u003E"),
            '&' => out.push_str("\\u0026"),
            '\'' => out.push_str("\\u0027"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Backslash-escape every character outside `[A-Za-z0-9_-]`.
pub fn escape_css(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 2);
    for c in value.chars() {
        if !(c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// RFC 3986 percent-encoding; only unreserved characters pass through.
pub fn escape_url(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
