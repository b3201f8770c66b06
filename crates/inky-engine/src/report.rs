/*
 * report.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Source-annotated error reports.

use crate::error::RenderError;
use ariadne::{Config, Label, Report, ReportKind, Source};
use inky_compiler::CompileError;
use std::ops::Range;

/// Render `error` against the source of template `name`.
///
/// Syntax errors and undefined variables raised in `name` are shown as an
/// annotated excerpt without colour. Anything else renders as its message.
pub fn render_report(name: &str, source: &str, error: &RenderError) -> String {
    if error.template() != Some(name) {
        return error.to_string();
    }
    let Some((span, label)) = locate(source, error) else {
        return error.to_string();
    };

    let id = name.to_string();
    let report = Report::build(ReportKind::Error, id.clone(), span.start)
        .with_config(Config::default().with_color(false))
        .with_message(error.to_string())
        .with_label(Label::new((id.clone(), span)).with_message(label))
        .finish();

    let mut output = Vec::new();
    match report.write((id, Source::from(source)), &mut output) {
        Ok(()) => String::from_utf8_lossy(&output).into_owned(),
        Err(_) => error.to_string(),
    }
}

/// Character span and label text for a located error.
fn locate(source: &str, error: &RenderError) -> Option<(Range<usize>, String)> {
    match error {
        RenderError::Compile(CompileError::Syntax {
            message,
            line,
            column,
            ..
        }) => {
            let (start, text) = line_at(source, *line)?;
            let offset = start + column.saturating_sub(1).min(text.chars().count());
            Some((offset..offset + 1, message.clone()))
        }
        RenderError::UndefinedVariable { name, line, .. } => {
            let (start, text) = line_at(source, *line)?;
            let root = name.split(['.', '[']).next().unwrap_or(name);
            let span = match text.find(root) {
                Some(byte) => {
                    let column = text[..byte].chars().count();
                    start + column..start + column + root.chars().count()
                }
                None => start..start + text.chars().count(),
            };
            Some((span, format!("\"{}\" is not defined", name)))
        }
        _ => None,
    }
}

/// Character offset of the start of 1-based `line`, and its text.
fn line_at(source: &str, line: usize) -> Option<(usize, &str)> {
    let mut offset = 0;
    for (index, text) in source.split('\n').enumerate() {
        if index + 1 == line {
            return Some((offset, text));
        }
        offset += text.chars().count() + 1;
    }
    None
}
