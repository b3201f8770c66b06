/*
 * compiler.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template compiler: tokenize, parse, rewrite, generate.
//!
//! The compiler owns the directive registry and the optional escaper. Both are
//! plain configuration on the instance; there is no global registry.

use crate::artifact::{Artifact, ControlOp, Instruction};
use crate::ast::{Node, NodeVisitor};
use crate::error::CompileResult;
use crate::escaper::Escaper;
use crate::lexer::Lexer;
use crate::parser::Parser;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Code generation hook for a directive.
///
/// Receives the directive's argument text and the compiler, and returns the
/// instructions that replace the directive.
pub type DirectiveHandler = Arc<dyn Fn(&str, &Compiler) -> Vec<Instruction> + Send + Sync>;

/// Strategy used when no escaper is configured.
const FALLBACK_STRATEGY: &str = "html";

/// Template compiler.
pub struct Compiler {
    lexer: Lexer,
    directives: HashMap<String, DirectiveHandler>,
    escaper: Option<Arc<Escaper>>,
    visitors: Vec<Box<dyn NodeVisitor + Send>>,
}

impl fmt::Debug for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("lexer", &self.lexer)
            .field("directives", &self.directive_names())
            .field("escaper", &self.escaper)
            .field("visitors", &self.visitors.len())
            .finish()
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// Create a compiler with the default lexer and the built-in directives.
    pub fn new() -> Self {
        Self::with_lexer(Lexer::new())
    }

    /// Create a compiler with a custom lexer and the built-in directives.
    pub fn with_lexer(lexer: Lexer) -> Self {
        let mut compiler = Self {
            lexer,
            directives: HashMap::new(),
            escaper: None,
            visitors: Vec::new(),
        };
        compiler.register_default_directives();
        compiler
    }

    pub fn lexer(&self) -> &Lexer {
        &self.lexer
    }

    pub fn lexer_mut(&mut self) -> &mut Lexer {
        &mut self.lexer
    }

    /// Compile template source into an artifact.
    ///
    /// Fails only when the parser meets a token it cannot build a node from.
    pub fn compile(&mut self, source: &str, name: &str) -> CompileResult<Artifact> {
        let tokens = self.lexer.tokenize(source, name);
        let root = Parser::new(name).parse(tokens)?;
        let root = self.apply_visitors(Node::Root(root));
        let instructions = root.compile(self);

        tracing::debug!(
            template = %name,
            instructions = instructions.len(),
            "compiled template"
        );
        Ok(Artifact::new(name, instructions))
    }

    /// Parse template source without generating code.
    pub fn parse(&self, source: &str, name: &str) -> CompileResult<Node> {
        let tokens = self.lexer.tokenize(source, name);
        Ok(Node::Root(Parser::new(name).parse(tokens)?))
    }

    /// Register a directive. A later registration for the same name wins.
    pub fn add_directive<F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&str, &Compiler) -> Vec<Instruction> + Send + Sync + 'static,
    {
        self.directives.insert(name.into(), Arc::new(handler));
        self
    }

    /// Register an already shared handler.
    pub fn add_directive_handler(&mut self, name: impl Into<String>, handler: DirectiveHandler) -> &mut Self {
        self.directives.insert(name.into(), handler);
        self
    }

    pub fn has_directive(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }

    pub fn directive(&self, name: &str) -> Option<&DirectiveHandler> {
        self.directives.get(name)
    }

    pub fn remove_directive(&mut self, name: &str) -> &mut Self {
        self.directives.remove(name);
        self
    }

    /// Registered directive names, sorted.
    pub fn directive_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.directives.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Expand a directive through its handler.
    ///
    /// An unregistered name yields an inert [`Instruction::UnknownDirective`].
    pub fn compile_directive(&self, name: &str, arguments: &str, line: usize) -> Vec<Instruction> {
        match self.directives.get(name) {
            Some(handler) => handler(arguments, self),
            None => {
                tracing::debug!(directive = %name, line, "unknown directive");
                vec![Instruction::UnknownDirective {
                    name: name.to_string(),
                    line,
                }]
            }
        }
    }

    pub fn set_escaper(&mut self, escaper: Arc<Escaper>) -> &mut Self {
        self.escaper = Some(escaper);
        self
    }

    pub fn clear_escaper(&mut self) -> &mut Self {
        self.escaper = None;
        self
    }

    pub fn escaper(&self) -> Option<&Arc<Escaper>> {
        self.escaper.as_ref()
    }

    /// Strategy applied to `{{ expression }}` output.
    pub fn default_strategy(&self) -> &str {
        self.escaper
            .as_deref()
            .map_or(FALLBACK_STRATEGY, Escaper::default_strategy)
    }

    /// Wrap an expression in an escaped echo.
    ///
    /// Without an escaper the expression is echoed unescaped.
    pub fn escape(&self, expression: &str, strategy: &str, line: usize) -> Instruction {
        match &self.escaper {
            Some(_) => Instruction::escaped_echo(expression, strategy, line),
            None => Instruction::raw_echo(expression, line),
        }
    }

    /// Register an AST visitor. Visitors run before code generation.
    pub fn add_visitor<V>(&mut self, visitor: V) -> &mut Self
    where
        V: NodeVisitor + Send + 'static,
    {
        self.visitors.push(Box::new(visitor));
        // Highest priority first; equal priorities keep registration order.
        self.visitors
            .sort_by_key(|v| std::cmp::Reverse(v.priority()));
        self
    }

    fn apply_visitors(&mut self, mut root: Node) -> Node {
        for visitor in &mut self.visitors {
            root = root.accept(visitor.as_mut());
        }
        root
    }

    fn register_default_directives(&mut self) {
        self.add_directive("if", |args, _| {
            vec![Instruction::Control(ControlOp::If {
                condition: args.to_string(),
            })]
        });
        self.add_directive("elseif", |args, _| {
            vec![Instruction::Control(ControlOp::ElseIf {
                condition: args.to_string(),
            })]
        });
        self.add_directive("else", |_, _| vec![Instruction::Control(ControlOp::Else)]);
        self.add_directive("endif", |_, _| vec![Instruction::Control(ControlOp::EndIf)]);
        self.add_directive("foreach", |args, _| {
            vec![Instruction::Control(ControlOp::Foreach {
                expression: args.to_string(),
            })]
        });
        self.add_directive("endforeach", |_, _| {
            vec![Instruction::Control(ControlOp::EndForeach)]
        });
        self.add_directive("for", |args, _| {
            vec![Instruction::Control(ControlOp::For {
                expression: args.to_string(),
            })]
        });
        self.add_directive("endfor", |_, _| vec![Instruction::Control(ControlOp::EndFor)]);
        self.add_directive("while", |args, _| {
            vec![Instruction::Control(ControlOp::While {
                condition: args.to_string(),
            })]
        });
        self.add_directive("endwhile", |_, _| {
            vec![Instruction::Control(ControlOp::EndWhile)]
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Block, Text, Variable};
    use pretty_assertions::assert_eq;

    fn escaping_compiler() -> Compiler {
        let mut compiler = Compiler::new();
        compiler.set_escaper(Arc::new(Escaper::new()));
        compiler
    }

    #[test]
    fn test_text_only() {
        let artifact = Compiler::new().compile("Hello World", "t").unwrap();
        assert_eq!(artifact.name, "t");
        assert_eq!(artifact.instructions, vec![Instruction::literal("Hello World")]);
    }

    #[test]
    fn test_variable_is_escape_wrapped() {
        let artifact = escaping_compiler().compile("{{ name }}", "t").unwrap();
        assert_eq!(
            artifact.instructions,
            vec![Instruction::escaped_echo("name", "html", 1)]
        );
    }

    #[test]
    fn test_variable_without_escaper_is_raw() {
        let artifact = Compiler::new().compile("{{ name }}", "t").unwrap();
        assert_eq!(artifact.instructions, vec![Instruction::raw_echo("name", 1)]);
    }

    #[test]
    fn test_clear_escaper_restores_raw_echo() {
        let mut compiler = escaping_compiler();
        compiler.clear_escaper();
        assert!(compiler.escaper().is_none());
        let artifact = compiler.compile("{{ name }}", "t").unwrap();
        assert_eq!(artifact.instructions, vec![Instruction::raw_echo("name", 1)]);
    }

    #[test]
    fn test_lexer_mut_changes_delimiters() {
        let mut compiler = Compiler::new();
        compiler.lexer_mut().set_delimiters("[[", "]]");
        assert_eq!(compiler.lexer().open_delimiter(), "[[");
        let artifact = compiler.compile("a[[ x ]]{{ y }}", "t").unwrap();
        assert_eq!(
            artifact.instructions,
            vec![
                Instruction::literal("a"),
                Instruction::raw_echo("x", 1),
                Instruction::literal("{{ y }}"),
            ]
        );
    }

    #[test]
    fn test_default_strategy_follows_escaper() {
        let mut escaper = Escaper::new();
        escaper.set_default_strategy("js");
        let mut compiler = Compiler::new();
        assert_eq!(compiler.default_strategy(), "html");
        compiler.set_escaper(Arc::new(escaper));
        let artifact = compiler.compile("{{ data }}", "t").unwrap();
        assert_eq!(
            artifact.instructions,
            vec![Instruction::escaped_echo("data", "js", 1)]
        );
    }

    #[test]
    fn test_raw_and_comment() {
        let artifact = escaping_compiler()
            .compile("{{ !html }}{{ # note }}", "t")
            .unwrap();
        assert_eq!(
            artifact.instructions,
            vec![
                Instruction::raw_echo("html", 1),
                Instruction::Comment {
                    text: "# note".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_if_directive_order() {
        let artifact = Compiler::new()
            .compile("{{ @if cond }}X{{ @endif }}", "t")
            .unwrap();
        assert_eq!(
            artifact.instructions,
            vec![
                Instruction::Control(ControlOp::If {
                    condition: "cond".to_string()
                }),
                Instruction::literal("X"),
                Instruction::Control(ControlOp::EndIf),
            ]
        );
    }

    #[test]
    fn test_unknown_directive_is_inert_marker() {
        let artifact = Compiler::new().compile("a{{ @frobnicate 1 }}b", "t").unwrap();
        assert_eq!(
            artifact.instructions,
            vec![
                Instruction::literal("a"),
                Instruction::UnknownDirective {
                    name: "frobnicate".to_string(),
                    line: 1
                },
                Instruction::literal("b"),
            ]
        );
    }

    #[test]
    fn test_custom_directive_last_registration_wins() {
        let mut compiler = Compiler::new();
        compiler.add_directive("hello", |args, _| vec![Instruction::literal(format!("one {}", args))]);
        compiler.add_directive("hello", |args, _| vec![Instruction::literal(format!("two {}", args))]);
        let artifact = compiler.compile("{{ @hello world }}", "t").unwrap();
        assert_eq!(artifact.instructions, vec![Instruction::literal("two world")]);
    }

    #[test]
    fn test_directive_can_use_compiler() {
        let mut compiler = escaping_compiler();
        compiler.add_directive("shout", |args, c| {
            vec![c.escape(&format!("{} | upper", args), "html", 0)]
        });
        let artifact = compiler.compile("{{ @shout title }}", "t").unwrap();
        assert_eq!(
            artifact.instructions,
            vec![Instruction::escaped_echo("title | upper", "html", 0)]
        );
    }

    #[test]
    fn test_directive_registry() {
        let mut compiler = Compiler::new();
        assert_eq!(
            compiler.directive_names(),
            vec![
                "else", "elseif", "endfor", "endforeach", "endif", "endwhile", "for", "foreach",
                "if", "while"
            ]
        );
        assert!(compiler.has_directive("while"));
        compiler.remove_directive("while");
        assert!(!compiler.has_directive("while"));
        assert!(compiler.directive("while").is_none());
    }

    #[test]
    fn test_compile_is_deterministic() {
        let source = "Hi {{ name }}{{ @foreach items as i }}{{ i }}{{ @endforeach }}";
        let mut compiler = escaping_compiler();
        let first = compiler.compile(source, "page").unwrap().to_text();
        let second = compiler.compile(source, "page").unwrap().to_text();
        assert_eq!(first, second);
    }

    #[test]
    fn test_syntax_error_propagates() {
        let err = Compiler::new().compile("{{ %} }}", "broken").unwrap_err();
        assert_eq!(err.template(), "broken");
    }

    /// Replaces every variable node with literal text.
    struct Redact {
        label: &'static str,
        priority: i32,
    }

    impl NodeVisitor for Redact {
        fn leave_node(&mut self, node: Node) -> Node {
            match node {
                Node::Variable(Variable { line, .. }) => Node::Text(Text {
                    text: self.label.to_string(),
                    line,
                }),
                other => other,
            }
        }

        fn priority(&self) -> i32 {
            self.priority
        }
    }

    /// Fills every block body with fixed text.
    struct FillBlocks;

    impl NodeVisitor for FillBlocks {
        fn leave_node(&mut self, node: Node) -> Node {
            match node {
                Node::Block(Block { name, line, .. }) => Node::Block(Block {
                    name,
                    line,
                    children: vec![Node::Text(Text {
                        text: "body".to_string(),
                        line,
                    })],
                }),
                other => other,
            }
        }
    }

    #[test]
    fn test_empty_block_compiles_to_open_close() {
        let artifact = Compiler::new().compile("a{{ {% main %} }}b", "t").unwrap();
        assert_eq!(
            artifact.instructions,
            vec![
                Instruction::literal("a"),
                Instruction::BlockOpen {
                    name: "main".to_string()
                },
                Instruction::BlockClose,
                Instruction::literal("b"),
            ]
        );
    }

    #[test]
    fn test_filled_block_wraps_children() {
        let mut compiler = Compiler::new();
        compiler.add_visitor(FillBlocks);
        let artifact = compiler.compile("a{{ {% main %} }}b", "t").unwrap();
        assert_eq!(
            artifact.instructions,
            vec![
                Instruction::literal("a"),
                Instruction::BlockOpen {
                    name: "main".to_string()
                },
                Instruction::literal("body"),
                Instruction::BlockClose,
                Instruction::literal("b"),
            ]
        );
    }

    #[test]
    fn test_visitors_run_by_priority() {
        let mut compiler = Compiler::new();
        compiler.add_visitor(Redact {
            label: "low",
            priority: 0,
        });
        compiler.add_visitor(Redact {
            label: "high",
            priority: 10,
        });
        let artifact = compiler.compile("{{ secret }}", "t").unwrap();
        assert_eq!(artifact.instructions, vec![Instruction::literal("high")]);
    }
}
