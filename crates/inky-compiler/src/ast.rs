/*
 * ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template AST types.
//!
//! The tree is owned top-down: every node owns its children and nothing else
//! refers to them. Visitors rewrite the tree by consuming a node and returning
//! its replacement.

use crate::artifact::Instruction;
use crate::compiler::Compiler;

/// A node in the template AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Document root. Holds every top-level node.
    Root(Root),

    /// Literal text.
    Text(Text),

    /// Escaped output: `{{ expression }}`
    Variable(Variable),

    /// Unescaped output: `{{ !expression }}`
    Raw(Raw),

    /// Comment (not rendered): `{{ # text }}`
    Comment(Comment),

    /// Directive: `{{ @name arguments }}`
    Directive(Directive),

    /// Named block: `{{ {% name }}`
    Block(Block),
}

/// Document root.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Root {
    pub children: Vec<Node>,
}

/// Literal text node.
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub text: String,
    pub line: usize,
}

/// Escaped output node.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// The bound expression, e.g. `user.name`.
    pub expression: String,
    pub line: usize,
}

/// Unescaped output node.
#[derive(Debug, Clone, PartialEq)]
pub struct Raw {
    /// The bound expression with the leading `!` removed.
    pub expression: String,
    pub line: usize,
}

/// Comment node.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    /// Comment text including the leading `#`.
    pub text: String,
    pub line: usize,
}

/// Directive node.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    /// Directive name without the `@` prefix.
    pub name: String,
    /// Everything after the first whitespace run following the name.
    pub arguments: String,
    pub line: usize,
}

/// Named block node.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: String,
    pub line: usize,
    /// Block body. Empty after parsing; visitors may fill it.
    pub children: Vec<Node>,
}

impl Root {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }
}

impl From<Root> for Node {
    fn from(root: Root) -> Self {
        Node::Root(root)
    }
}

impl Node {
    /// Short kind tag: `root`, `text`, `var`, `raw`, `comment`, `directive` or `block`.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Root(_) => "root",
            Node::Text(_) => "text",
            Node::Variable(_) => "var",
            Node::Raw(_) => "raw",
            Node::Comment(_) => "comment",
            Node::Directive(_) => "directive",
            Node::Block(_) => "block",
        }
    }

    /// 1-based source line. The root reports line 1.
    pub fn line(&self) -> usize {
        match self {
            Node::Root(_) => 1,
            Node::Text(n) => n.line,
            Node::Variable(n) => n.line,
            Node::Raw(n) => n.line,
            Node::Comment(n) => n.line,
            Node::Directive(n) => n.line,
            Node::Block(n) => n.line,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Root(root) => &root.children,
            Node::Block(block) => &block.children,
            _ => &[],
        }
    }

    /// Mutable access to the child list of container nodes.
    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Root(root) => Some(&mut root.children),
            Node::Block(block) => Some(&mut block.children),
            _ => None,
        }
    }

    /// Generate the instructions for this node and its children.
    pub fn compile(&self, compiler: &Compiler) -> Vec<Instruction> {
        match self {
            Node::Root(root) => compile_children(&root.children, compiler),

            Node::Text(Text { text, .. }) => vec![Instruction::literal(text.clone())],

            Node::Variable(Variable { expression, line }) => {
                vec![compiler.escape(expression, compiler.default_strategy(), *line)]
            }

            Node::Raw(Raw { expression, line }) => {
                vec![Instruction::raw_echo(expression.clone(), *line)]
            }

            Node::Comment(Comment { text, .. }) => {
                vec![Instruction::Comment { text: text.clone() }]
            }

            Node::Directive(Directive {
                name,
                arguments,
                line,
            }) => compiler.compile_directive(name, arguments, *line),

            Node::Block(Block { name, children, .. }) => {
                let mut out = vec![Instruction::BlockOpen { name: name.clone() }];
                out.extend(compile_children(children, compiler));
                out.push(Instruction::BlockClose);
                out
            }
        }
    }

    /// Run a visitor over this subtree.
    ///
    /// Calls `enter_node`, then visits every child of the node it returned,
    /// replacing each child with the visitor's result, then calls
    /// `leave_node` on the result.
    pub fn accept<V: NodeVisitor + ?Sized>(self, visitor: &mut V) -> Node {
        let mut node = visitor.enter_node(self);
        if let Some(children) = node.children_mut() {
            let visited = std::mem::take(children)
                .into_iter()
                .map(|child| child.accept(visitor))
                .collect();
            *children = visited;
        }
        visitor.leave_node(node)
    }

    /// Number of nodes in this subtree, including this one.
    pub fn count(&self) -> usize {
        1 + self.children().iter().map(Node::count).sum::<usize>()
    }
}

fn compile_children(children: &[Node], compiler: &Compiler) -> Vec<Instruction> {
    children
        .iter()
        .flat_map(|child| child.compile(compiler))
        .collect()
}

/// Tree-rewriting visitor.
///
/// Both hooks receive ownership of a node and return the node that takes its
/// place. The defaults return the node unchanged.
pub trait NodeVisitor {
    /// Called before the node's children are visited.
    fn enter_node(&mut self, node: Node) -> Node {
        node
    }

    /// Called after the node's children are visited.
    fn leave_node(&mut self, node: Node) -> Node {
        node
    }

    /// Visitors with a higher priority run first.
    fn priority(&self) -> i32 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Node {
        Node::Text(Text {
            text: s.to_string(),
            line: 1,
        })
    }

    fn var(s: &str) -> Node {
        Node::Variable(Variable {
            expression: s.to_string(),
            line: 1,
        })
    }

    /// Uppercases every text node.
    struct Shout;

    impl NodeVisitor for Shout {
        fn leave_node(&mut self, node: Node) -> Node {
            match node {
                Node::Text(t) => Node::Text(Text {
                    text: t.text.to_uppercase(),
                    line: t.line,
                }),
                other => other,
            }
        }
    }

    /// Records enter/leave order.
    #[derive(Default)]
    struct Trace {
        events: Vec<String>,
    }

    impl NodeVisitor for Trace {
        fn enter_node(&mut self, node: Node) -> Node {
            self.events.push(format!("enter {}", node.kind()));
            node
        }

        fn leave_node(&mut self, node: Node) -> Node {
            self.events.push(format!("leave {}", node.kind()));
            node
        }
    }

    #[test]
    fn test_kind_and_line() {
        assert_eq!(Node::Root(Root::default()).kind(), "root");
        assert_eq!(Node::Root(Root::default()).line(), 1);
        let directive = Node::Directive(Directive {
            name: "if".to_string(),
            arguments: "x".to_string(),
            line: 4,
        });
        assert_eq!(directive.kind(), "directive");
        assert_eq!(directive.line(), 4);
        assert!(directive.children().is_empty());
    }

    #[test]
    fn test_visitor_replaces_children() {
        let root = Node::Root(Root::new(vec![text("a"), var("x"), text("b")]));
        let rewritten = root.accept(&mut Shout);
        assert_eq!(
            rewritten,
            Node::Root(Root::new(vec![text("A"), var("x"), text("B")]))
        );
    }

    #[test]
    fn test_visitor_order() {
        let block = Node::Block(Block {
            name: "main".to_string(),
            line: 1,
            children: vec![text("x")],
        });
        let root = Node::Root(Root::new(vec![block]));
        let mut trace = Trace::default();
        root.accept(&mut trace);
        assert_eq!(
            trace.events,
            vec![
                "enter root",
                "enter block",
                "enter text",
                "leave text",
                "leave block",
                "leave root",
            ]
        );
    }

    #[test]
    fn test_visitor_sees_replacement_children() {
        /// Replaces a block's body on entry; the new body is what gets visited.
        struct FillBlock;

        impl NodeVisitor for FillBlock {
            fn enter_node(&mut self, node: Node) -> Node {
                match node {
                    Node::Block(mut b) => {
                        b.children = vec![text("filled")];
                        Node::Block(b)
                    }
                    other => other,
                }
            }
        }

        let block = Node::Block(Block {
            name: "b".to_string(),
            line: 1,
            children: vec![],
        });
        let out = block.accept(&mut FillBlock).accept(&mut Shout);
        assert_eq!(out.children(), &[text("FILLED")]);
    }

    #[test]
    fn test_count() {
        let block = Node::Block(Block {
            name: "b".to_string(),
            line: 1,
            children: vec![text("x"), text("y")],
        });
        let root = Node::Root(Root::new(vec![block, var("z")]));
        assert_eq!(root.count(), 5);
    }
}
