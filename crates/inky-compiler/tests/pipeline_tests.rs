/*
 * pipeline_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * End-to-end tests for tokenize -> parse -> compile -> cache.
 */

use inky_compiler::{
    Artifact, Cache, Compiler, ControlOp, Escaper, Instruction, Lexer, Node, Parser, Text,
    TokenKind, Variable, cache::hash_key,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn kinds_and_values(source: &str) -> Vec<(TokenKind, String)> {
    Lexer::new()
        .tokenize(source, "test")
        .iter()
        .map(|t| (t.kind(), t.value().to_string()))
        .collect()
}

#[test]
fn test_plain_text_pipeline() {
    assert_eq!(
        kinds_and_values("Hello World"),
        vec![
            (TokenKind::Text, "Hello World".to_string()),
            (TokenKind::Eof, String::new()),
        ]
    );

    let tokens = Lexer::new().tokenize("Hello World", "test");
    let root = Parser::new("test").parse(tokens).unwrap();
    assert_eq!(
        root.children,
        vec![Node::Text(Text {
            text: "Hello World".to_string(),
            line: 1
        })]
    );
}

#[test]
fn test_variable_pipeline() {
    let tokens = kinds_and_values("{{ name }}");
    assert!(tokens.contains(&(TokenKind::Var, "name".to_string())));

    let mut compiler = Compiler::new();
    compiler.set_escaper(Arc::new(Escaper::new()));
    let root = compiler.parse("{{ name }}", "test").unwrap();
    assert_eq!(
        root.children(),
        &[Node::Variable(Variable {
            expression: "name".to_string(),
            line: 1
        })]
    );

    let artifact = compiler.compile("{{ name }}", "test").unwrap();
    assert!(artifact.instructions.contains(&Instruction::Echo {
        expression: "name".to_string(),
        strategy: Some("html".to_string()),
        line: 1,
    }));
}

#[test]
fn test_control_directive_pipeline() {
    let artifact = Compiler::new()
        .compile("{{ @if cond }}X{{ @endif }}", "test")
        .unwrap();
    let open = artifact
        .instructions
        .iter()
        .position(|i| {
            *i == Instruction::Control(ControlOp::If {
                condition: "cond".to_string(),
            })
        })
        .unwrap();
    let literal = artifact
        .instructions
        .iter()
        .position(|i| *i == Instruction::literal("X"))
        .unwrap();
    let close = artifact
        .instructions
        .iter()
        .position(|i| *i == Instruction::Control(ControlOp::EndIf))
        .unwrap();
    assert!(open < literal && literal < close);
}

#[test]
fn test_unclosed_delimiter_pipeline() {
    assert_eq!(
        kinds_and_values("{{ name"),
        vec![
            (TokenKind::Text, "{{ name".to_string()),
            (TokenKind::Eof, String::new()),
        ]
    );
    let artifact = Compiler::new().compile("{{ name", "test").unwrap();
    assert_eq!(artifact.instructions, vec![Instruction::literal("{{ name")]);
}

#[test]
fn test_cache_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let mut cache = Cache::with_directory(dir.path());
    cache.set("k1", "v1").unwrap();

    let hash = hash_key("k1");
    let shard = dir.path().join(&hash[..2]);
    let files: Vec<_> = std::fs::read_dir(&shard).unwrap().collect();
    assert_eq!(files.len(), 1);

    let mut fresh = Cache::with_directory(dir.path());
    assert_eq!(fresh.get("k1").unwrap(), Some("v1".to_string()));
}

#[test]
fn test_artifact_survives_cache() {
    let dir = tempfile::tempdir().unwrap();
    let mut compiler = Compiler::new();
    compiler.set_escaper(Arc::new(Escaper::new()));
    let source = "<h1>{{ title }}</h1>\n{{ @foreach items as item }}<li>{{ !item }}</li>{{ @endforeach }}";
    let artifact = compiler.compile(source, "list.inky").unwrap();

    Cache::with_directory(dir.path())
        .set("/templates/list.inky", artifact.to_text())
        .unwrap();

    let text = Cache::with_directory(dir.path())
        .get("/templates/list.inky")
        .unwrap()
        .unwrap();
    assert_eq!(Artifact::from_text(&text).unwrap(), artifact);
}

#[test]
fn test_custom_delimiters() {
    let mut compiler = Compiler::with_lexer(Lexer::with_delimiters("<%", "%>"));
    let artifact = compiler.compile("a <% b %> {{ c }}", "test").unwrap();
    assert_eq!(
        artifact.instructions,
        vec![
            Instruction::literal("a "),
            Instruction::raw_echo("b", 1),
            Instruction::literal(" {{ c }}"),
        ]
    );
}

#[test]
fn test_mismatched_pairs_compile() {
    let artifact = Compiler::new()
        .compile("{{ @endforeach }}{{ @if a }}{{ @else }}", "test")
        .unwrap();
    assert_eq!(
        artifact.instructions,
        vec![
            Instruction::Control(ControlOp::EndForeach),
            Instruction::Control(ControlOp::If {
                condition: "a".to_string()
            }),
            Instruction::Control(ControlOp::Else),
        ]
    );
}

#[test]
fn test_syntax_error_message() {
    let err = Compiler::new()
        .compile("line one\n{{ %} }}", "page.inky")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Syntax error in \"page.inky\" at line 2: Expected Text, got Block End"
    );
}
