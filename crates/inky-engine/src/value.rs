/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template value and context types.
//!
//! Variables passed to a render are converted into [`TemplateValue`]s, usually
//! from JSON. Maps keep insertion order so that iteration and `json` output
//! are stable.

use hashlink::LinkedHashMap;
use std::cmp::Ordering;
use std::collections::HashMap;

/// A value that can be used in template evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TemplateValue {
    /// A null/missing value.
    #[default]
    Null,

    Bool(bool),

    Int(i64),

    Float(f64),

    String(String),

    /// A list of values.
    List(Vec<TemplateValue>),

    /// A map of string keys to values, in insertion order.
    Map(LinkedHashMap<String, TemplateValue>),
}

/// One step of a variable path: `user.name` or `items[0]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl TemplateValue {
    /// Check if this value is "truthy" for conditional evaluation.
    ///
    /// Falsy values: null, `false`, `0`, `0.0`, `""`, `"0"`, empty lists and
    /// empty maps. Everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            TemplateValue::Null => false,
            TemplateValue::Bool(b) => *b,
            TemplateValue::Int(n) => *n != 0,
            TemplateValue::Float(f) => *f != 0.0,
            TemplateValue::String(s) => !s.is_empty() && s != "0",
            TemplateValue::List(items) => !items.is_empty(),
            TemplateValue::Map(m) => !m.is_empty(),
        }
    }

    /// Look up one path segment.
    ///
    /// Maps answer keys; lists answer indices, and numeric keys are accepted
    /// as indices (`items.0`).
    pub fn get(&self, segment: &PathSegment) -> Option<&TemplateValue> {
        match (self, segment) {
            (TemplateValue::Map(m), PathSegment::Key(key)) => m.get(key),
            (TemplateValue::Map(m), PathSegment::Index(i)) => m.get(&i.to_string()),
            (TemplateValue::List(items), PathSegment::Index(i)) => items.get(*i),
            (TemplateValue::List(items), PathSegment::Key(key)) => {
                key.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            _ => None,
        }
    }

    /// Get a nested value by path.
    pub fn get_path(&self, path: &[PathSegment]) -> Option<&TemplateValue> {
        match path.split_first() {
            None => Some(self),
            Some((first, rest)) => self.get(first).and_then(|v| v.get_path(rest)),
        }
    }

    /// Render this value as a string for output.
    ///
    /// - Null: ""
    /// - Bool: "true" or "false"
    /// - Numbers: decimal form
    /// - List, Map: compact JSON
    pub fn render(&self) -> String {
        match self {
            TemplateValue::Null => String::new(),
            TemplateValue::Bool(b) => b.to_string(),
            TemplateValue::Int(n) => n.to_string(),
            TemplateValue::Float(f) => f.to_string(),
            TemplateValue::String(s) => s.clone(),
            TemplateValue::List(_) | TemplateValue::Map(_) => self.to_json().to_string(),
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TemplateValue::Int(n) => Some(*n as f64),
            TemplateValue::Float(f) => Some(*f),
            TemplateValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            TemplateValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Number of items in a list or map, or characters in the rendered value.
    pub fn len(&self) -> usize {
        match self {
            TemplateValue::Null => 0,
            TemplateValue::List(items) => items.len(),
            TemplateValue::Map(m) => m.len(),
            other => other.render().chars().count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            TemplateValue::Null => Value::Null,
            TemplateValue::Bool(b) => Value::Bool(*b),
            TemplateValue::Int(n) => Value::from(*n),
            TemplateValue::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number)
            }
            TemplateValue::String(s) => Value::String(s.clone()),
            TemplateValue::List(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            TemplateValue::Map(m) => Value::Object(
                m.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Ordering used by the `sort` filter.
    ///
    /// Two numeric values compare numerically; anything else compares by its
    /// rendered string.
    pub fn compare(&self, other: &TemplateValue) -> Ordering {
        let numeric = |v: &TemplateValue| match v {
            TemplateValue::Int(_) | TemplateValue::Float(_) => v.as_f64(),
            _ => None,
        };
        match (numeric(self), numeric(other)) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => self.render().cmp(&other.render()),
        }
    }
}

impl From<serde_json::Value> for TemplateValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => TemplateValue::Null,
            Value::Bool(b) => TemplateValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => TemplateValue::Int(i),
                None => TemplateValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => TemplateValue::String(s),
            Value::Array(items) => TemplateValue::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => TemplateValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, TemplateValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for TemplateValue {
    fn from(s: &str) -> Self {
        TemplateValue::String(s.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(s: String) -> Self {
        TemplateValue::String(s)
    }
}

impl From<bool> for TemplateValue {
    fn from(b: bool) -> Self {
        TemplateValue::Bool(b)
    }
}

impl From<i64> for TemplateValue {
    fn from(n: i64) -> Self {
        TemplateValue::Int(n)
    }
}

impl From<f64> for TemplateValue {
    fn from(f: f64) -> Self {
        TemplateValue::Float(f)
    }
}

impl<T: Into<TemplateValue>> From<Vec<T>> for TemplateValue {
    fn from(items: Vec<T>) -> Self {
        TemplateValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// A context for template evaluation containing variable bindings.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Variable bindings at this level.
    variables: HashMap<String, TemplateValue>,

    /// Parent context for nested scopes (e.g., inside loops).
    parent: Option<Box<TemplateContext>>,
}

impl TemplateContext {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from the top-level keys of a JSON object.
    ///
    /// Returns `None` for any other JSON value.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Object(map) => {
                let mut ctx = Self::new();
                for (key, value) in map {
                    ctx.insert(key, TemplateValue::from(value));
                }
                Some(ctx)
            }
            _ => None,
        }
    }

    /// Insert a variable into the context.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<TemplateValue>) {
        self.variables.insert(key.into(), value.into());
    }

    /// Get a variable from the context, checking parent scopes.
    pub fn get(&self, key: &str) -> Option<&TemplateValue> {
        self.variables
            .get(key)
            .or_else(|| self.parent.as_ref().and_then(|p| p.get(key)))
    }

    /// Get a variable by path. The first segment names the variable.
    pub fn get_path(&self, path: &[PathSegment]) -> Option<&TemplateValue> {
        let (first, rest) = path.split_first()?;
        let root = match first {
            PathSegment::Key(key) => self.get(key)?,
            PathSegment::Index(i) => self.get(&i.to_string())?,
        };
        root.get_path(rest)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Create a child context for a nested scope.
    ///
    /// The child context inherits access to parent variables.
    pub fn child(&self) -> TemplateContext {
        TemplateContext {
            variables: HashMap::new(),
            parent: Some(Box::new(self.clone())),
        }
    }

    /// Layer `self` over `base`: bindings in `self` win.
    pub fn over(self, base: TemplateContext) -> TemplateContext {
        let mut merged = base;
        for (key, value) in self.flatten() {
            merged.variables.insert(key, value);
        }
        merged
    }

    /// All visible bindings, innermost scope winning.
    fn flatten(self) -> HashMap<String, TemplateValue> {
        let mut out = match self.parent {
            Some(parent) => parent.flatten(),
            None => HashMap::new(),
        };
        out.extend(self.variables);
        out
    }
}

impl<K: Into<String>, V: Into<TemplateValue>> FromIterator<(K, V)> for TemplateContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = TemplateContext::new();
        for (key, value) in iter {
            ctx.insert(key, value);
        }
        ctx
    }
}
