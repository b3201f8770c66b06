/*
 * artifact.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled template artifacts.
//!
//! Code generation does not splice text into a host language. It produces a
//! flat list of [`Instruction`]s that an execution backend interprets or
//! lowers further. Control directives are emitted as open/close markers;
//! pairing them up is left to the backend.

use serde::{Deserialize, Serialize};

/// Version of the artifact layout. Bumped whenever [`Instruction`] changes shape.
pub const ARTIFACT_FORMAT: u32 = 1;

/// A single code generation instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Instruction {
    /// Emit literal text.
    Literal { text: String },

    /// Evaluate an expression and emit it.
    ///
    /// With `strategy` set, the output is passed through that escaping
    /// strategy; with `None` it is emitted raw.
    Echo {
        expression: String,
        strategy: Option<String>,
        line: usize,
    },

    /// Comment marker. Emits nothing.
    Comment { text: String },

    /// Marker left behind by a directive with no registered handler.
    UnknownDirective { name: String, line: usize },

    /// Start of a named, lazily invokable output unit.
    BlockOpen { name: String },

    /// End of the innermost open block.
    BlockClose,

    /// Control construct produced by a directive handler.
    Control(ControlOp),
}

/// Control constructs understood by execution backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "control", rename_all = "snake_case")]
pub enum ControlOp {
    If { condition: String },
    ElseIf { condition: String },
    Else,
    EndIf,
    Foreach { expression: String },
    EndForeach,
    For { expression: String },
    EndFor,
    While { condition: String },
    EndWhile,
    /// Render another template in place.
    Include { template: String },
    /// Render a parent template, overriding its blocks.
    Extends { template: String },
}

impl Instruction {
    pub fn literal(text: impl Into<String>) -> Self {
        Instruction::Literal { text: text.into() }
    }

    pub fn escaped_echo(expression: impl Into<String>, strategy: impl Into<String>, line: usize) -> Self {
        Instruction::Echo {
            expression: expression.into(),
            strategy: Some(strategy.into()),
            line,
        }
    }

    pub fn raw_echo(expression: impl Into<String>, line: usize) -> Self {
        Instruction::Echo {
            expression: expression.into(),
            strategy: None,
            line,
        }
    }

    /// Whether the instruction neither emits output nor drives control flow.
    pub fn is_inert(&self) -> bool {
        matches!(
            self,
            Instruction::Comment { .. } | Instruction::UnknownDirective { .. }
        )
    }
}

/// The compiled, executable representation of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Layout version, see [`ARTIFACT_FORMAT`].
    pub format: u32,
    /// Template name the artifact was compiled from.
    pub name: String,
    pub instructions: Vec<Instruction>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, instructions: Vec<Instruction>) -> Self {
        Self {
            format: ARTIFACT_FORMAT,
            name: name.into(),
            instructions,
        }
    }

    /// Whether the artifact was produced by the current layout version.
    pub fn is_current(&self) -> bool {
        self.format == ARTIFACT_FORMAT
    }

    /// Serialize to the text form stored in the artifact cache.
    pub fn to_text(&self) -> String {
        // Only strings and integers are serialized, so this cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse the text form produced by [`Artifact::to_text`].
    pub fn from_text(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Names of the blocks declared in this artifact, in declaration order.
    pub fn block_names(&self) -> Vec<&str> {
        self.instructions
            .iter()
            .filter_map(|i| match i {
                Instruction::BlockOpen { name } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Templates referenced through `include` or `extends`.
    pub fn dependencies(&self) -> Vec<&str> {
        self.instructions
            .iter()
            .filter_map(|i| match i {
                Instruction::Control(ControlOp::Include { template })
                | Instruction::Control(ControlOp::Extends { template }) => Some(template.as_str()),
                _ => None,
            })
            .collect()
    }
}
