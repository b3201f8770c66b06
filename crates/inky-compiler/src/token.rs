/*
 * token.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Token model produced by the [`Lexer`](crate::lexer::Lexer).

use std::fmt;

/// Classification of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Plain text between tags.
    Text,
    /// Variable output: `{{ name }}`.
    Var,
    /// Block start: `{{ {% name }}`.
    BlockStart,
    /// Block end: `{{ %} }}`.
    BlockEnd,
    /// Comment: `{{ # note }}`.
    Comment,
    /// Unescaped output: `{{ !html }}`.
    Raw,
    /// Directive: `{{ @if cond }}`.
    Directive,
    /// End of input. Always the last token of a stream.
    Eof,
}

impl TokenKind {
    /// Human-readable label, used in parser error messages.
    pub fn label(self) -> &'static str {
        match self {
            TokenKind::Text => "Text",
            TokenKind::Var => "Variable",
            TokenKind::BlockStart => "Block Start",
            TokenKind::BlockEnd => "Block End",
            TokenKind::Comment => "Comment",
            TokenKind::Raw => "Raw Output",
            TokenKind::Directive => "Directive",
            TokenKind::Eof => "End of File",
        }
    }

    /// Whether tokens of this kind produce output or logic.
    pub fn is_executable(self) -> bool {
        match self {
            TokenKind::Var
            | TokenKind::BlockStart
            | TokenKind::BlockEnd
            | TokenKind::Raw
            | TokenKind::Directive => true,
            TokenKind::Text | TokenKind::Comment | TokenKind::Eof => false,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single token with its source position.
///
/// Tokens are immutable once produced. `line` and `column` are 1-based;
/// columns count characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    kind: TokenKind,
    value: String,
    line: usize,
    column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind,
            value: value.into(),
            line,
            column,
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Raw token text. For tags this is the trimmed content between the delimiters.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// `(line, column)` of the token start.
    pub fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(\"{}\") at line {}, column {}",
            self.kind.label(),
            self.value,
            self.line,
            self.column
        )
    }
}
