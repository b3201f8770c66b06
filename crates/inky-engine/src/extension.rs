/*
 * extension.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Engine extensions: filters, globals and directives.

use crate::value::TemplateValue;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use hashlink::LinkedHashMap;
use inky_compiler::DirectiveHandler;
use inky_compiler::escaper::escape_url;
use std::ops::Range;
use std::sync::Arc;

/// A filter: `value | name(arguments...)`.
pub type Filter = Arc<dyn Fn(&TemplateValue, &[TemplateValue]) -> TemplateValue + Send + Sync>;

/// A bundle of filters, globals and directives registered on an engine.
pub trait Extension {
    /// Unique name. Registering a second extension with the same name
    /// replaces the first.
    fn name(&self) -> &str;

    fn filters(&self) -> Vec<(String, Filter)> {
        Vec::new()
    }

    fn globals(&self) -> Vec<(String, TemplateValue)> {
        Vec::new()
    }

    fn directives(&self) -> Vec<(String, DirectiveHandler)> {
        Vec::new()
    }
}

/// Version reported by the `_version` global.
pub const VERSION: &str = "1.0.0";

/// Standard filters plus the `_version` and `_charset` globals.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreExtension;

fn filter<F>(name: &str, f: F) -> (String, Filter)
where
    F: Fn(&TemplateValue, &[TemplateValue]) -> TemplateValue + Send + Sync + 'static,
{
    (name.to_string(), Arc::new(f))
}

/// Apply `f` to the rendered string form of the value.
fn string_filter(name: &str, f: fn(&str) -> String) -> (String, Filter) {
    filter(name, move |value, _| TemplateValue::String(f(&value.render())))
}

impl Extension for CoreExtension {
    fn name(&self) -> &str {
        "core"
    }

    fn filters(&self) -> Vec<(String, Filter)> {
        vec![
            // String filters
            string_filter("upper", str::to_uppercase),
            string_filter("lower", str::to_lowercase),
            string_filter("capitalize", capitalize),
            string_filter("title", title_case),
            string_filter("trim", |s| s.trim().to_string()),
            string_filter("url_encode", url_encode),
            filter("length", |value, _| TemplateValue::Int(value.len() as i64)),
            filter("reverse", |value, _| match value {
                TemplateValue::List(items) => {
                    TemplateValue::List(items.iter().rev().cloned().collect())
                }
                other => TemplateValue::String(other.render().chars().rev().collect()),
            }),
            filter("replace", |value, args| {
                let pairs: Vec<(String, String)> = match args {
                    [TemplateValue::Map(map)] => {
                        map.iter().map(|(k, v)| (k.clone(), v.render())).collect()
                    }
                    _ => args
                        .chunks_exact(2)
                        .map(|pair| (pair[0].render(), pair[1].render()))
                        .collect(),
                };
                if pairs.is_empty() {
                    return value.clone();
                }
                let replaced = pairs
                    .iter()
                    .filter(|(from, _)| !from.is_empty())
                    .fold(value.render(), |acc, (from, to)| acc.replace(from.as_str(), to));
                TemplateValue::String(replaced)
            }),
            filter("slice", |value, args| {
                let start = int_arg(args, 0).unwrap_or(0);
                let length = int_arg(args, 1);
                match value {
                    TemplateValue::List(items) => {
                        TemplateValue::List(items[slice_range(items.len(), start, length)].to_vec())
                    }
                    TemplateValue::Map(map) => {
                        let range = slice_range(map.len(), start, length);
                        TemplateValue::Map(
                            map.iter()
                                .skip(range.start)
                                .take(range.len())
                                .map(|(k, v)| (k.clone(), v.clone()))
                                .collect(),
                        )
                    }
                    other => {
                        let chars: Vec<char> = other.render().chars().collect();
                        let range = slice_range(chars.len(), start, length);
                        TemplateValue::String(chars[range].iter().collect())
                    }
                }
            }),
            // Collection filters
            filter("first", |value, _| match value {
                TemplateValue::List(items) => items.first().cloned().unwrap_or_default(),
                TemplateValue::Map(map) => map.front().map(|(_, v)| v.clone()).unwrap_or_default(),
                _ => TemplateValue::Null,
            }),
            filter("last", |value, _| match value {
                TemplateValue::List(items) => items.last().cloned().unwrap_or_default(),
                TemplateValue::Map(map) => map.back().map(|(_, v)| v.clone()).unwrap_or_default(),
                _ => TemplateValue::Null,
            }),
            filter("join", |value, args| {
                let glue = args.first().map(TemplateValue::render).unwrap_or_default();
                match value {
                    TemplateValue::List(items) => TemplateValue::String(
                        items
                            .iter()
                            .map(TemplateValue::render)
                            .collect::<Vec<_>>()
                            .join(&glue),
                    ),
                    TemplateValue::Map(map) => TemplateValue::String(
                        map.values()
                            .map(TemplateValue::render)
                            .collect::<Vec<_>>()
                            .join(&glue),
                    ),
                    other => other.clone(),
                }
            }),
            filter("sort", |value, _| match value {
                TemplateValue::List(items) => {
                    let mut sorted = items.clone();
                    sorted.sort_by(|a, b| a.compare(b));
                    TemplateValue::List(sorted)
                }
                other => other.clone(),
            }),
            filter("keys", |value, _| match value {
                TemplateValue::Map(map) => TemplateValue::List(
                    map.keys().map(|k| TemplateValue::String(k.clone())).collect(),
                ),
                TemplateValue::List(items) => {
                    TemplateValue::List((0..items.len() as i64).map(TemplateValue::Int).collect())
                }
                _ => TemplateValue::List(Vec::new()),
            }),
            filter("values", |value, _| match value {
                TemplateValue::Map(map) => TemplateValue::List(map.values().cloned().collect()),
                TemplateValue::List(items) => TemplateValue::List(items.clone()),
                _ => TemplateValue::List(Vec::new()),
            }),
            filter("default", |value, args| {
                if value.is_truthy() {
                    value.clone()
                } else {
                    args.first()
                        .cloned()
                        .unwrap_or_else(|| TemplateValue::String(String::new()))
                }
            }),
            // Encoding filters
            filter("json", |value, _| TemplateValue::String(value.to_json().to_string())),
            string_filter("base64", |s| STANDARD.encode(s)),
            // HTML filters
            string_filter("nl2br", nl2br),
            string_filter("strip_tags", strip_tags),
            // Number filters
            filter("abs", |value, _| match value {
                TemplateValue::Int(n) => TemplateValue::Int(n.saturating_abs()),
                other => other
                    .as_f64()
                    .map_or(TemplateValue::Null, |f| TemplateValue::Float(f.abs())),
            }),
            filter("round", |value, args| {
                let precision = args.first().and_then(TemplateValue::as_f64).unwrap_or(0.0) as i32;
                match value {
                    TemplateValue::Int(n) if precision >= 0 => TemplateValue::Int(*n),
                    other => other.as_f64().map_or(TemplateValue::Null, |f| {
                        let factor = 10f64.powi(precision);
                        TemplateValue::Float((f * factor).round() / factor)
                    }),
                }
            }),
            filter("number_format", |value, args| {
                let decimals = int_arg(args, 0).unwrap_or(0).clamp(0, 20) as usize;
                value.as_f64().map_or(TemplateValue::Null, |f| {
                    TemplateValue::String(number_format(f, decimals))
                })
            }),
            // Date filters
            filter("date", |value, args| {
                let format = args
                    .first()
                    .map_or_else(|| DEFAULT_DATE_FORMAT.to_string(), TemplateValue::render);
                timestamp(value).map_or(TemplateValue::Null, |at| {
                    TemplateValue::String(at.format(&strftime_pattern(&format)).to_string())
                })
            }),
        ]
    }

    fn globals(&self) -> Vec<(String, TemplateValue)> {
        vec![
            ("_version".to_string(), TemplateValue::from(VERSION)),
            ("_charset".to_string(), TemplateValue::from("UTF-8")),
        ]
    }
}

/// Uppercase the first character, lowercase the rest.
fn capitalize(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Capitalize every whitespace-separated word, keeping the separators.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.to_lowercase().chars() {
        if at_word_start && !c.is_whitespace() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = c.is_whitespace();
    }
    out
}

/// Form encoding: like percent-encoding, but spaces become `+`.
fn url_encode(s: &str) -> String {
    s.split(' ')
        .map(|part| escape_url(part).replace('~', "%7E"))
        .collect::<Vec<_>>()
        .join("+")
}

/// Format used by `date` when no format argument is given.
pub const DEFAULT_DATE_FORMAT: &str = "Y-m-d H:i:s";

/// Integer view of the argument at `index`.
fn int_arg(args: &[TemplateValue], index: usize) -> Option<i64> {
    args.get(index)
        .and_then(TemplateValue::as_f64)
        .map(|f| f as i64)
}

/// Resolve `start`/`length` against a sequence of `len` items.
///
/// A negative start counts from the end. A negative length stops that many
/// items before the end. Out-of-range bounds are clamped.
fn slice_range(len: usize, start: i64, length: Option<i64>) -> Range<usize> {
    let len = len as i64;
    let from = if start < 0 {
        (len + start).max(0)
    } else {
        start.min(len)
    };
    let to = match length {
        None => len,
        Some(n) if n < 0 => (len + n).max(from),
        Some(n) => from.saturating_add(n).min(len),
    };
    from as usize..to as usize
}

/// Fixed decimals with `,` grouping the thousands.
fn number_format(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (whole, fraction) = match fixed.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::with_capacity(fixed.len() + whole.len() / 3 + 1);
    if value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

/// Interpret a value as a UTC instant.
///
/// Numbers are Unix timestamps in seconds. Strings may be numeric, RFC 3339,
/// `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or a bare `YYYY-MM-DD`.
fn timestamp(value: &TemplateValue) -> Option<DateTime<Utc>> {
    if let Some(seconds) = value.as_f64() {
        return DateTime::from_timestamp(seconds.floor() as i64, 0);
    }
    let TemplateValue::String(text) = value else {
        return None;
    };
    let text = text.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(at) = NaiveDateTime::parse_from_str(text, pattern) {
            return Some(at.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
}

/// Translate a `date` format (`Y-m-d H:i:s` style) into a strftime pattern.
///
/// Unknown letters are copied through. A backslash makes the next
/// character literal.
fn strftime_pattern(format: &str) -> String {
    let mut out = String::with_capacity(format.len() * 2);
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        let spec = match c {
            'd' => "%d",
            'j' => "%-d",
            'D' => "%a",
            'l' => "%A",
            'N' => "%u",
            'w' => "%w",
            'm' => "%m",
            'n' => "%-m",
            'M' => "%b",
            'F' => "%B",
            'Y' => "%Y",
            'y' => "%y",
            'H' => "%H",
            'G' => "%-H",
            'h' => "%I",
            'g' => "%-I",
            'i' => "%M",
            's' => "%S",
            'A' => "%p",
            'a' => "%P",
            'U' => "%s",
            'O' => "%z",
            'P' => "%:z",
            'c' => "%Y-%m-%dT%H:%M:%S%:z",
            '%' => "%%",
            '\\' => match chars.next() {
                Some('%') => "%%",
                Some(next) => {
                    out.push(next);
                    continue;
                }
                None => continue,
            },
            other => {
                out.push(other);
                continue;
            }
        };
        out.push_str(spec);
    }
    out
}

/// Insert `<br />` before every line break.
fn nl2br(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' if chars.peek() == Some(&'\n') => {
                chars.next();
                out.push_str("<br />\r\n");
            }
            '\r' | '\n' => {
                out.push_str("<br />");
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out
}

/// Drop HTML tags and comments, keeping the text between them.
///
/// A `<` followed by whitespace or the end of input is kept as text.
/// Quoted attribute values may contain `>`.
fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '<' || chars.peek().is_none_or(|next| next.is_whitespace()) {
            out.push(c);
            continue;
        }
        let mut quote: Option<char> = None;
        for inner in chars.by_ref() {
            match (quote, inner) {
                (None, '"' | '\'') => quote = Some(inner),
                (Some(open), _) if inner == open => quote = None,
                (None, '>') => break,
                _ => {}
            }
        }
    }
    out
}

/// Collect an extension's filters into a lookup table.
pub fn filter_table(extension: &dyn Extension) -> LinkedHashMap<String, Filter> {
    extension.filters().into_iter().collect()
}
