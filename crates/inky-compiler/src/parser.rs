/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Single-pass template parser.
//!
//! The grammar is flat: every non-EOF token becomes one direct child of the
//! root. Directive pairs such as `@if`/`@endif` are not matched here; pairing,
//! if any, happens in the execution backend.

use crate::ast::{Block, Comment, Directive, Node, Raw, Root, Text, Variable};
use crate::error::{CompileError, CompileResult};
use crate::token::{Token, TokenKind};

/// Cursor-based parser over a token stream.
///
/// The cursor only moves forward.
#[derive(Debug)]
pub struct Parser {
    template: String,
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    /// Create a parser. `template` is reported in syntax errors.
    ///
    /// Until a stream is set the parser holds a lone EOF token.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            tokens: vec![Token::new(TokenKind::Eof, "", 1, 1)],
            position: 0,
        }
    }

    /// Parse a token stream into a root node.
    pub fn parse(&mut self, tokens: Vec<Token>) -> CompileResult<Root> {
        self.set_token_stream(tokens);
        self.parse_root()
    }

    /// Replace the token stream and reset the cursor.
    ///
    /// A stream without a trailing EOF token gets one appended.
    pub fn set_token_stream(&mut self, mut tokens: Vec<Token>) -> &mut Self {
        if !tokens.last().is_some_and(|t| t.is(TokenKind::Eof)) {
            let (line, column) = tokens.last().map_or((1, 1), Token::position);
            tokens.push(Token::new(TokenKind::Eof, "", line, column));
        }
        self.tokens = tokens;
        self.position = 0;
        self
    }

    /// The token under the cursor. Past the end this is the final EOF token.
    pub fn current_token(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.position.min(last)]
    }

    /// Advance the cursor and return the new current token.
    pub fn next_token(&mut self) -> &Token {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        self.current_token()
    }

    /// Whether the current token has the given kind.
    pub fn test(&self, kind: TokenKind) -> bool {
        self.current_token().is(kind)
    }

    /// Consume the current token if it has the given kind.
    pub fn expect(&mut self, kind: TokenKind) -> CompileResult<Token> {
        let token = self.current_token().clone();
        if !token.is(kind) {
            return Err(CompileError::syntax(
                format!("Expected {}, got {}", kind.label(), token.kind().label()),
                self.template.clone(),
                token.line(),
                token.column(),
            ));
        }
        self.next_token();
        Ok(token)
    }

    fn parse_root(&mut self) -> CompileResult<Root> {
        let mut children = Vec::new();
        while !self.test(TokenKind::Eof) {
            children.push(self.parse_node()?);
        }
        Ok(Root::new(children))
    }

    fn parse_node(&mut self) -> CompileResult<Node> {
        match self.current_token().kind() {
            TokenKind::Text => self.parse_text(),
            TokenKind::Var => self.parse_variable(),
            TokenKind::Directive => self.parse_directive(),
            TokenKind::Comment => self.parse_comment(),
            TokenKind::Raw => self.parse_raw(),
            TokenKind::BlockStart => self.parse_block(),
            // No builder for the remaining kinds; the text builder reports them.
            TokenKind::BlockEnd | TokenKind::Eof => self.parse_text(),
        }
    }

    fn parse_text(&mut self) -> CompileResult<Node> {
        let token = self.expect(TokenKind::Text)?;
        Ok(Node::Text(Text {
            text: token.value().to_string(),
            line: token.line(),
        }))
    }

    fn parse_variable(&mut self) -> CompileResult<Node> {
        let token = self.expect(TokenKind::Var)?;
        Ok(Node::Variable(Variable {
            expression: token.value().to_string(),
            line: token.line(),
        }))
    }

    fn parse_directive(&mut self) -> CompileResult<Node> {
        let token = self.expect(TokenKind::Directive)?;
        let (name, arguments) = split_directive(token.value());
        Ok(Node::Directive(Directive {
            name: name.to_string(),
            arguments: arguments.to_string(),
            line: token.line(),
        }))
    }

    fn parse_comment(&mut self) -> CompileResult<Node> {
        let token = self.expect(TokenKind::Comment)?;
        Ok(Node::Comment(Comment {
            text: token.value().to_string(),
            line: token.line(),
        }))
    }

    fn parse_raw(&mut self) -> CompileResult<Node> {
        let token = self.expect(TokenKind::Raw)?;
        let expression = token.value().trim_start_matches('!').trim_start();
        Ok(Node::Raw(Raw {
            expression: expression.to_string(),
            line: token.line(),
        }))
    }

    fn parse_block(&mut self) -> CompileResult<Node> {
        let token = self.expect(TokenKind::BlockStart)?;
        Ok(Node::Block(Block {
            name: block_name(token.value()).to_string(),
            line: token.line(),
            children: Vec::new(),
        }))
    }
}

/// Split `@name arguments` at the first whitespace run.
fn split_directive(value: &str) -> (&str, &str) {
    let content = value.trim_start_matches('@');
    match content.find(char::is_whitespace) {
        Some(at) => (&content[..at], content[at..].trim()),
        None => (content, ""),
    }
}

/// Strip the `{%` marker (and an optional closing `%}`) from block tag content.
fn block_name(value: &str) -> &str {
    let name = value.strip_prefix("{%").unwrap_or(value);
    let name = name.strip_suffix("%}").unwrap_or(name);
    name.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> CompileResult<Root> {
        let tokens = Lexer::new().tokenize(source, "test");
        Parser::new("test").parse(tokens)
    }

    #[test]
    fn test_fresh_parser_sits_on_eof() {
        let mut parser = Parser::new("t");
        assert!(parser.test(TokenKind::Eof));
        assert_eq!(parser.current_token().position(), (1, 1));
        assert!(parser.next_token().is(TokenKind::Eof));
        assert!(parser.expect(TokenKind::Text).is_err());
        assert!(parser.expect(TokenKind::Eof).is_ok());
    }

    #[test]
    fn test_plain_text() {
        let root = parse("Hello World").unwrap();
        assert_eq!(
            root.children,
            vec![Node::Text(Text {
                text: "Hello World".to_string(),
                line: 1
            })]
        );
    }

    #[test]
    fn test_empty_source() {
        assert!(parse("").unwrap().children.is_empty());
    }

    #[test]
    fn test_variable() {
        let root = parse("{{ name }}").unwrap();
        assert_eq!(
            root.children,
            vec![Node::Variable(Variable {
                expression: "name".to_string(),
                line: 1
            })]
        );
    }

    #[test]
    fn test_directive_split() {
        let root = parse("{{ @foreach  items as item }}{{ @endforeach }}").unwrap();
        assert_eq!(
            root.children,
            vec![
                Node::Directive(Directive {
                    name: "foreach".to_string(),
                    arguments: "items as item".to_string(),
                    line: 1
                }),
                Node::Directive(Directive {
                    name: "endforeach".to_string(),
                    arguments: String::new(),
                    line: 1
                }),
            ]
        );
    }

    #[test]
    fn test_raw_strips_bang() {
        let root = parse("{{ ! body }}").unwrap();
        assert_eq!(
            root.children,
            vec![Node::Raw(Raw {
                expression: "body".to_string(),
                line: 1
            })]
        );
    }

    #[test]
    fn test_comment_and_block() {
        let root = parse("{{ # todo }}\n{{ {% sidebar %} }}").unwrap();
        assert_eq!(root.children.len(), 3);
        assert_eq!(
            root.children[0],
            Node::Comment(Comment {
                text: "# todo".to_string(),
                line: 1
            })
        );
        assert_eq!(
            root.children[2],
            Node::Block(Block {
                name: "sidebar".to_string(),
                line: 2,
                children: vec![]
            })
        );
    }

    #[test]
    fn test_pairs_are_not_validated() {
        let root = parse("{{ @endif }}{{ @if a }}{{ @foreach x as y }}").unwrap();
        assert_eq!(root.children.len(), 3);
    }

    #[test]
    fn test_block_end_is_syntax_error() {
        let err = parse("ok\n{{ %} }}").unwrap_err();
        assert_eq!(
            err,
            CompileError::Syntax {
                message: "Expected Text, got Block End".to_string(),
                template: "test".to_string(),
                line: 2,
                column: 1,
            }
        );
    }

    #[test]
    fn test_child_count_matches_token_count() {
        for source in [
            "",
            "text",
            "a {{ b }} c",
            "{{ @if x }}{{ y }}{{ @endif }}",
            "{{ # c }}{{ !r }}{{ {% blk }}tail",
            "{{ unclosed",
        ] {
            let tokens = Lexer::new().tokenize(source, "t");
            let non_eof = tokens.len() - 1;
            let root = Parser::new("t").parse(tokens).unwrap();
            assert_eq!(root.children.len(), non_eof, "source: {:?}", source);
        }
    }

    #[test]
    fn test_expect_and_cursor() {
        let tokens = Lexer::new().tokenize("a{{ b }}", "t");
        let mut parser = Parser::new("t");
        parser.set_token_stream(tokens);
        assert!(parser.test(TokenKind::Text));
        assert!(parser.expect(TokenKind::Var).is_err());
        assert_eq!(parser.expect(TokenKind::Text).unwrap().value(), "a");
        assert_eq!(parser.current_token().value(), "b");
        parser.next_token();
        assert!(parser.test(TokenKind::Eof));
        // Past the end the cursor stays on EOF.
        parser.next_token();
        parser.next_token();
        assert!(parser.test(TokenKind::Eof));
    }

    #[test]
    fn test_missing_eof_is_appended() {
        let mut parser = Parser::new("t");
        let root = parser
            .parse(vec![Token::new(TokenKind::Text, "x", 1, 1)])
            .unwrap();
        assert_eq!(root.children.len(), 1);
    }
}
