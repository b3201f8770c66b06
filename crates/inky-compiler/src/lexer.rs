/*
 * lexer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Delimiter-based template tokenizer.
//!
//! The lexer scans for an open/close delimiter pair (default `{{` / `}}`)
//! and classifies the trimmed content of each tag by its leading character:
//!
//! | Prefix      | Token                      |
//! |-------------|----------------------------|
//! | `#`         | [`TokenKind::Comment`]     |
//! | `@`         | [`TokenKind::Directive`]   |
//! | `{%`        | [`TokenKind::BlockStart`]  |
//! | `%}`        | [`TokenKind::BlockEnd`]    |
//! | `!`         | [`TokenKind::Raw`]         |
//! | (otherwise) | [`TokenKind::Var`]         |
//!
//! Tokenizing never fails. A tag without a close delimiter is emitted as
//! [`TokenKind::Text`] together with the rest of the input. Delimiters do not
//! nest: the first close delimiter after an open delimiter ends the tag.

use crate::token::{Token, TokenKind};
use serde::Deserialize;

/// Open/close delimiter pair bounding a template tag.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Delimiters {
    pub open: String,
    pub close: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            open: "{{".to_string(),
            close: "}}".to_string(),
        }
    }
}

/// Running 1-based line/column position.
#[derive(Debug, Clone, Copy)]
struct Position {
    line: usize,
    column: usize,
}

impl Position {
    fn start() -> Self {
        Self { line: 1, column: 1 }
    }

    fn advance(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}

/// Template tokenizer.
#[derive(Debug, Clone, Default)]
pub struct Lexer {
    delimiters: Delimiters,
}

impl Lexer {
    /// Create a lexer using the default `{{` / `}}` delimiters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a lexer with custom delimiters.
    pub fn with_delimiters(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            delimiters: Delimiters {
                open: open.into(),
                close: close.into(),
            },
        }
    }

    /// Replace the delimiter pair.
    ///
    /// An empty open delimiter disables tag scanning; an empty close delimiter
    /// makes every tag unclosed.
    pub fn set_delimiters(&mut self, open: impl Into<String>, close: impl Into<String>) -> &mut Self {
        self.delimiters = Delimiters {
            open: open.into(),
            close: close.into(),
        };
        self
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    pub fn open_delimiter(&self) -> &str {
        &self.delimiters.open
    }

    pub fn close_delimiter(&self) -> &str {
        &self.delimiters.close
    }

    /// Split `source` into tokens.
    ///
    /// The result is never empty and always ends with exactly one
    /// [`TokenKind::Eof`] token. `name` is only used for diagnostics.
    pub fn tokenize(&self, source: &str, name: &str) -> Vec<Token> {
        let open = self.delimiters.open.as_str();
        let close = self.delimiters.close.as_str();

        let mut tokens = Vec::new();
        let mut position = Position::start();
        let mut offset = 0;

        while offset < source.len() {
            let rest = &source[offset..];
            let open_at = if open.is_empty() { None } else { rest.find(open) };

            let Some(open_rel) = open_at else {
                tokens.push(Token::new(
                    TokenKind::Text,
                    rest,
                    position.line,
                    position.column,
                ));
                position.advance(rest);
                break;
            };

            if open_rel > 0 {
                let text = &rest[..open_rel];
                tokens.push(Token::new(
                    TokenKind::Text,
                    text,
                    position.line,
                    position.column,
                ));
                position.advance(text);
            }

            let tag_start = offset + open_rel;
            let content_start = tag_start + open.len();
            let close_at = if close.is_empty() {
                None
            } else {
                source[content_start..].find(close)
            };

            let Some(close_rel) = close_at else {
                // Unclosed tag: keep the remainder verbatim.
                let text = &source[tag_start..];
                tokens.push(Token::new(
                    TokenKind::Text,
                    text,
                    position.line,
                    position.column,
                ));
                position.advance(text);
                break;
            };

            let content_end = content_start + close_rel;
            let content = source[content_start..content_end].trim();
            tokens.push(Token::new(
                classify(content),
                content,
                position.line,
                position.column,
            ));

            let tag_end = content_end + close.len();
            position.advance(&source[tag_start..tag_end]);
            offset = tag_end;
        }

        tokens.push(Token::new(
            TokenKind::Eof,
            "",
            position.line,
            position.column,
        ));

        tracing::trace!(template = %name, tokens = tokens.len(), "tokenized template");
        tokens
    }
}

/// Classify trimmed tag content by its leading characters.
fn classify(content: &str) -> TokenKind {
    if content.starts_with('#') {
        TokenKind::Comment
    } else if content.starts_with('@') {
        TokenKind::Directive
    } else if content.starts_with("{%") {
        TokenKind::BlockStart
    } else if content.starts_with("%}") {
        TokenKind::BlockEnd
    } else if content.starts_with('!') {
        TokenKind::Raw
    } else {
        TokenKind::Var
    }
}
