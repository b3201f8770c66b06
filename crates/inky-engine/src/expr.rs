/*
 * expr.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Expression mini-language used by echoes and control directives.
//!
//! ```text
//! expression := ("!" | "not")* primary ("|" filter)*
//! primary    := "(" expression ")" | operand
//! operand    := literal | path
//! path       := ["$"] ident ("." (ident | digits) | "[" (digits | string) "]")*
//! filter     := ident ["(" [operand ("," operand)*] ")"]
//! literal    := string | number | "true" | "false" | "null"
//! ```
//!
//! There are no operators and no precedence: a condition is truthy or not.

use crate::value::{PathSegment, TemplateValue};

/// Parse failure with a short description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprError {
    pub message: String,
}

impl ExprError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

type ExprResult<T> = Result<T, ExprError>;

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// Number of leading negations is folded into a single flag.
    pub negated: bool,
    pub primary: Primary,
    pub filters: Vec<FilterCall>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primary {
    Operand(Operand),
    Group(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(TemplateValue),
    Path(Vec<PathSegment>),
}

/// `| name(arg, ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub arguments: Vec<Operand>,
}

/// `@foreach source as [key =>] item`
#[derive(Debug, Clone, PartialEq)]
pub struct ForeachSpec {
    pub source: Expr,
    pub key: Option<String>,
    pub item: String,
}

/// `@for var in ...`
#[derive(Debug, Clone, PartialEq)]
pub struct ForSpec {
    pub variable: String,
    pub iterable: ForIterable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForIterable {
    /// Inclusive integer range `a..b`.
    Range(Operand, Operand),
    Source(Expr),
}

impl Operand {
    /// Dotted rendering of a path operand, used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Operand::Literal(value) => value.render(),
            Operand::Path(segments) => describe_path(segments),
        }
    }
}

impl Expr {
    /// The root path the expression reads, if its primary is a path.
    pub fn root_path(&self) -> Option<&[PathSegment]> {
        match &self.primary {
            Primary::Operand(Operand::Path(segments)) => Some(segments),
            Primary::Operand(Operand::Literal(_)) => None,
            Primary::Group(inner) => inner.root_path(),
        }
    }
}

pub fn describe_path(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        match segment {
            PathSegment::Key(key) => {
                if i > 0 {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathSegment::Index(index) => out.push_str(&format!("[{}]", index)),
        }
    }
    out
}

/// Parse a full expression.
pub fn parse_expression(text: &str) -> ExprResult<Expr> {
    let mut cursor = Cursor::new(text);
    let expr = cursor.expression()?;
    cursor.skip_ws();
    if !cursor.at_end() {
        return Err(ExprError::new(format!(
            "unexpected \"{}\"",
            cursor.rest()
        )));
    }
    Ok(expr)
}

/// Parse `source as item` or `source as key => item`.
///
/// A single pair of wrapping parentheses is accepted: `($items as $item)`.
pub fn parse_foreach(text: &str) -> ExprResult<ForeachSpec> {
    let text = strip_parens(text.trim());
    let (source, binding) = text
        .rsplit_once(" as ")
        .ok_or_else(|| ExprError::new("expected \"<source> as <item>\""))?;
    let source = parse_expression(source)?;
    let (key, item) = match binding.split_once("=>") {
        Some((key, item)) => (Some(variable_name(key)?), variable_name(item)?),
        None => (None, variable_name(binding)?),
    };
    Ok(ForeachSpec { source, key, item })
}

/// Parse `var in a..b` or `var in source`.
pub fn parse_for(text: &str) -> ExprResult<ForSpec> {
    let text = strip_parens(text.trim());
    let (variable, rest) = text
        .split_once(" in ")
        .ok_or_else(|| ExprError::new("expected \"<var> in <range or source>\""))?;
    let variable = variable_name(variable)?;

    if let Some((start, end)) = rest.split_once("..") {
        let start = Cursor::new(start).single_operand()?;
        let end = Cursor::new(end).single_operand()?;
        return Ok(ForSpec {
            variable,
            iterable: ForIterable::Range(start, end),
        });
    }
    Ok(ForSpec {
        variable,
        iterable: ForIterable::Source(parse_expression(rest)?),
    })
}

/// `$name` or `name`, a plain identifier.
fn variable_name(text: &str) -> ExprResult<String> {
    let name = text.trim().trim_start_matches('$');
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    if valid {
        Ok(name.to_string())
    } else {
        Err(ExprError::new(format!("invalid variable name \"{}\"", text.trim())))
    }
}

/// Remove one pair of parentheses wrapping the whole text.
fn strip_parens(text: &str) -> &str {
    match text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        Some(inner) => inner.trim(),
        None => text,
    }
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> ExprResult<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(ExprError::new(format!("expected \"{}\"", expected)))
        }
    }

    /// Consume `word` if it is followed by whitespace.
    fn eat_keyword(&mut self, word: &str) -> bool {
        self.skip_ws();
        let rest = self.rest();
        let followed_by_ws = rest
            .strip_prefix(word)
            .and_then(|after| after.chars().next())
            .is_some_and(char::is_whitespace);
        if followed_by_ws {
            self.pos += word.len();
        }
        followed_by_ws
    }

    fn expression(&mut self) -> ExprResult<Expr> {
        let mut negated = false;
        loop {
            if self.eat('!') || self.eat_keyword("not") {
                negated = !negated;
            } else {
                break;
            }
        }

        let primary = if self.eat('(') {
            let inner = self.expression()?;
            self.expect(')')?;
            Primary::Group(Box::new(inner))
        } else {
            Primary::Operand(self.operand()?)
        };

        let mut filters = Vec::new();
        while self.eat('|') {
            filters.push(self.filter()?);
        }

        Ok(Expr {
            negated,
            primary,
            filters,
        })
    }

    fn single_operand(&mut self) -> ExprResult<Operand> {
        let operand = self.operand()?;
        self.skip_ws();
        if self.at_end() {
            Ok(operand)
        } else {
            Err(ExprError::new(format!("unexpected \"{}\"", self.rest())))
        }
    }

    fn filter(&mut self) -> ExprResult<FilterCall> {
        self.skip_ws();
        let name = self.identifier()?;
        let mut arguments = Vec::new();
        if self.eat('(') && !self.eat(')') {
            loop {
                arguments.push(self.operand()?);
                if self.eat(')') {
                    break;
                }
                self.expect(',')?;
            }
        }
        Ok(FilterCall { name, arguments })
    }

    fn operand(&mut self) -> ExprResult<Operand> {
        self.skip_ws();
        match self.peek() {
            Some('"' | '\'') => self.string().map(|s| Operand::Literal(TemplateValue::String(s))),
            Some(c) if c.is_ascii_digit() || c == '-' => self.number().map(Operand::Literal),
            Some(c) if c.is_alphabetic() || c == '_' || c == '$' => self.path(),
            Some(c) => Err(ExprError::new(format!("unexpected \"{}\"", c))),
            None => Err(ExprError::new("expected an operand")),
        }
    }

    fn identifier(&mut self) -> ExprResult<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.bump();
        }
        if self.pos == start {
            return Err(ExprError::new("expected an identifier"));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn digits(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn path(&mut self) -> ExprResult<Operand> {
        let sigil = self.peek() == Some('$');
        if sigil {
            self.bump();
        }
        let head = self.identifier()?;
        let mut segments = vec![PathSegment::Key(head)];

        loop {
            match self.peek() {
                Some('.') => {
                    self.bump();
                    if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        let index = self.digits();
                        segments.push(PathSegment::Key(index.to_string()));
                    } else {
                        segments.push(PathSegment::Key(self.identifier()?));
                    }
                }
                Some('[') => {
                    self.bump();
                    self.skip_ws();
                    let segment = match self.peek() {
                        Some('"' | '\'') => PathSegment::Key(self.string()?),
                        Some(c) if c.is_ascii_digit() => {
                            let digits = self.digits();
                            let index = digits
                                .parse()
                                .map_err(|_| ExprError::new(format!("index out of range: {}", digits)))?;
                            PathSegment::Index(index)
                        }
                        _ => return Err(ExprError::new("expected an index or quoted key")),
                    };
                    self.expect(']')?;
                    segments.push(segment);
                }
                _ => break,
            }
        }

        if !sigil && segments.len() == 1 {
            if let PathSegment::Key(word) = &segments[0] {
                match word.as_str() {
                    "true" => return Ok(Operand::Literal(TemplateValue::Bool(true))),
                    "false" => return Ok(Operand::Literal(TemplateValue::Bool(false))),
                    "null" => return Ok(Operand::Literal(TemplateValue::Null)),
                    _ => {}
                }
            }
        }
        Ok(Operand::Path(segments))
    }

    fn string(&mut self) -> ExprResult<String> {
        let quote = self.bump().ok_or_else(|| ExprError::new("expected a string"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => break,
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => break,
            }
        }
        Err(ExprError::new("unterminated string"))
    }

    fn number(&mut self) -> ExprResult<TemplateValue> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        self.digits();
        // A single dot followed by a digit is a fraction; `1..5` is a range.
        let is_fraction = {
            let rest = self.rest();
            rest.starts_with('.') && rest[1..].starts_with(|c: char| c.is_ascii_digit())
        };
        if is_fraction {
            self.bump();
            self.digits();
        }
        let text = &self.src[start..self.pos];
        if is_fraction {
            text.parse::<f64>()
                .map(TemplateValue::Float)
                .map_err(|_| ExprError::new(format!("invalid number \"{}\"", text)))
        } else {
            text.parse::<i64>()
                .map(TemplateValue::Int)
                .map_err(|_| ExprError::new(format!("invalid number \"{}\"", text)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn path(parts: &[&str]) -> Operand {
        Operand::Path(parts.iter().map(|p| PathSegment::Key(p.to_string())).collect())
    }

    fn plain(operand: Operand) -> Expr {
        Expr {
            negated: false,
            primary: Primary::Operand(operand),
            filters: vec![],
        }
    }

    #[test]
    fn test_simple_path() {
        assert_eq!(parse_expression("user.name").unwrap(), plain(path(&["user", "name"])));
        assert_eq!(parse_expression(" $user ").unwrap(), plain(path(&["user"])));
    }

    #[test]
    fn test_indices() {
        assert_eq!(
            parse_expression("items[0].title").unwrap(),
            plain(Operand::Path(vec![
                PathSegment::Key("items".to_string()),
                PathSegment::Index(0),
                PathSegment::Key("title".to_string()),
            ]))
        );
        assert_eq!(
            parse_expression("row['first name']").unwrap(),
            plain(Operand::Path(vec![
                PathSegment::Key("row".to_string()),
                PathSegment::Key("first name".to_string()),
            ]))
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            parse_expression("'it\\'s'").unwrap(),
            plain(Operand::Literal(TemplateValue::from("it's")))
        );
        assert_eq!(
            parse_expression("-12").unwrap(),
            plain(Operand::Literal(TemplateValue::Int(-12)))
        );
        assert_eq!(
            parse_expression("3.25").unwrap(),
            plain(Operand::Literal(TemplateValue::Float(3.25)))
        );
        assert_eq!(
            parse_expression("null").unwrap(),
            plain(Operand::Literal(TemplateValue::Null))
        );
        // With a sigil the word is a variable.
        assert_eq!(parse_expression("$true").unwrap(), plain(path(&["true"])));
    }

    #[test]
    fn test_filters_and_negation() {
        let expr = parse_expression("not (items | length)").unwrap();
        assert!(expr.negated);
        let Primary::Group(inner) = &expr.primary else {
            panic!("expected group");
        };
        assert_eq!(inner.filters[0].name, "length");

        let expr = parse_expression("!!name | default('anon') | join(', ')").unwrap();
        assert!(!expr.negated);
        assert_eq!(
            expr.filters,
            vec![
                FilterCall {
                    name: "default".to_string(),
                    arguments: vec![Operand::Literal(TemplateValue::from("anon"))],
                },
                FilterCall {
                    name: "join".to_string(),
                    arguments: vec![Operand::Literal(TemplateValue::from(", "))],
                },
            ]
        );
        assert_eq!(expr.root_path(), Some(&[PathSegment::Key("name".to_string())][..]));
    }

    #[test]
    fn test_nothing_is_a_variable_named_not() {
        assert_eq!(parse_expression("nothing").unwrap(), plain(path(&["nothing"])));
    }

    #[test]
    fn test_malformed() {
        for text in ["", "a +", "'open", "a |", "items[x]", "(a", "a b"] {
            assert!(parse_expression(text).is_err(), "accepted {:?}", text);
        }
    }

    #[test]
    fn test_foreach() {
        let spec = parse_foreach("$items as $item").unwrap();
        assert_eq!(spec.source, plain(path(&["items"])));
        assert_eq!(spec.key, None);
        assert_eq!(spec.item, "item");

        let spec = parse_foreach("(users as id => user)").unwrap();
        assert_eq!(spec.key.as_deref(), Some("id"));
        assert_eq!(spec.item, "user");

        assert!(parse_foreach("items").is_err());
        assert!(parse_foreach("items as 1x").is_err());
    }

    #[test]
    fn test_for() {
        let spec = parse_for("i in 1..3").unwrap();
        assert_eq!(spec.variable, "i");
        assert_eq!(
            spec.iterable,
            ForIterable::Range(
                Operand::Literal(TemplateValue::Int(1)),
                Operand::Literal(TemplateValue::Int(3))
            )
        );

        let spec = parse_for("n in 0..count").unwrap();
        assert_eq!(
            spec.iterable,
            ForIterable::Range(Operand::Literal(TemplateValue::Int(0)), path(&["count"]))
        );

        let spec = parse_for("x in list | reverse").unwrap();
        assert!(matches!(spec.iterable, ForIterable::Source(_)));
    }

    #[test]
    fn test_describe_path() {
        let expr = parse_expression("a.b[2].c").unwrap();
        assert_eq!(describe_path(expr.root_path().unwrap()), "a.b[2].c");
    }
}
