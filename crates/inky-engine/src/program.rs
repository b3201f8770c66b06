/*
 * program.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Lowering of flat artifacts into structured programs.
//!
//! Artifacts carry control constructs as separate open and close markers.
//! Lowering pairs them with a stack and is permissive about it:
//!
//! - a closer with no matching opener is dropped,
//! - a closer closes its nearest matching opener, closing anything opened
//!   after it on the way,
//! - `elseif`/`else` outside an `if` are dropped,
//! - constructs still open at the end of input are closed there.

use hashlink::LinkedHashMap;
use inky_compiler::{Artifact, ControlOp, Instruction};

/// A structured statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Text(String),
    Echo {
        expression: String,
        strategy: Option<String>,
        line: usize,
    },
    If {
        /// `(condition, body)` for the `if` and every `elseif`.
        branches: Vec<(String, Vec<Stmt>)>,
        otherwise: Option<Vec<Stmt>>,
    },
    Foreach {
        expression: String,
        body: Vec<Stmt>,
    },
    For {
        expression: String,
        body: Vec<Stmt>,
    },
    While {
        condition: String,
        body: Vec<Stmt>,
    },
    Block {
        name: String,
        body: Vec<Stmt>,
    },
    Include {
        template: String,
    },
}

/// An executable template.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub name: String,
    pub body: Vec<Stmt>,
    /// Every block defined in the template, nested ones included. A later
    /// definition of the same name replaces an earlier one.
    pub blocks: LinkedHashMap<String, Vec<Stmt>>,
    /// Template named by the first `extends`.
    pub parent: Option<String>,
    /// Templates named by `include`, in order of appearance.
    pub includes: Vec<String>,
}

impl Program {
    pub fn block(&self, name: &str) -> Option<&[Stmt]> {
        self.blocks.get(name).map(Vec::as_slice)
    }

    pub fn block_names(&self) -> Vec<&str> {
        self.blocks.keys().map(String::as_str).collect()
    }

    /// Templates this one needs at render time.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.parent
            .iter()
            .chain(self.includes.iter())
            .map(String::as_str)
    }
}

#[derive(Debug)]
enum FrameKind {
    Root,
    If {
        branches: Vec<(String, Vec<Stmt>)>,
        condition: String,
        in_else: bool,
    },
    Foreach(String),
    For(String),
    While(String),
    Block(String),
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    body: Vec<Stmt>,
}

/// Which opener a closer pairs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closes {
    If,
    Foreach,
    For,
    While,
    Block,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            body: Vec::new(),
        }
    }

    fn closed_by(&self) -> Option<Closes> {
        match self.kind {
            FrameKind::Root => None,
            FrameKind::If { .. } => Some(Closes::If),
            FrameKind::Foreach(_) => Some(Closes::Foreach),
            FrameKind::For(_) => Some(Closes::For),
            FrameKind::While(_) => Some(Closes::While),
            FrameKind::Block(_) => Some(Closes::Block),
        }
    }
}

struct Lowering {
    stack: Vec<Frame>,
    blocks: LinkedHashMap<String, Vec<Stmt>>,
    parent: Option<String>,
    includes: Vec<String>,
}

/// Lower an artifact into a program.
pub fn lower(artifact: &Artifact) -> Program {
    let mut lowering = Lowering {
        stack: vec![Frame::new(FrameKind::Root)],
        blocks: LinkedHashMap::new(),
        parent: None,
        includes: Vec::new(),
    };

    for instruction in &artifact.instructions {
        lowering.instruction(instruction);
    }

    while lowering.stack.len() > 1 {
        lowering.close_top();
    }
    let body = lowering
        .stack
        .pop()
        .map(|frame| frame.body)
        .unwrap_or_default();

    Program {
        name: artifact.name.clone(),
        body,
        blocks: lowering.blocks,
        parent: lowering.parent,
        includes: lowering.includes,
    }
}

impl Lowering {
    fn push(&mut self, stmt: Stmt) {
        if let Some(frame) = self.stack.last_mut() {
            frame.body.push(stmt);
        }
    }

    fn open(&mut self, kind: FrameKind) {
        self.stack.push(Frame::new(kind));
    }

    fn instruction(&mut self, instruction: &Instruction) {
        match instruction {
            Instruction::Literal { text } => self.push(Stmt::Text(text.clone())),
            Instruction::Echo {
                expression,
                strategy,
                line,
            } => self.push(Stmt::Echo {
                expression: expression.clone(),
                strategy: strategy.clone(),
                line: *line,
            }),
            Instruction::Comment { .. } => {}
            Instruction::UnknownDirective { name, line } => {
                tracing::debug!(directive = %name, line, "dropping unknown directive");
            }
            Instruction::BlockOpen { name } => self.open(FrameKind::Block(name.clone())),
            Instruction::BlockClose => self.close(Closes::Block),
            Instruction::Control(op) => self.control(op),
        }
    }

    fn control(&mut self, op: &ControlOp) {
        match op {
            ControlOp::If { condition } => self.open(FrameKind::If {
                branches: Vec::new(),
                condition: condition.clone(),
                in_else: false,
            }),
            ControlOp::ElseIf { condition } => self.next_branch(Some(condition)),
            ControlOp::Else => self.next_branch(None),
            ControlOp::EndIf => self.close(Closes::If),
            ControlOp::Foreach { expression } => self.open(FrameKind::Foreach(expression.clone())),
            ControlOp::EndForeach => self.close(Closes::Foreach),
            ControlOp::For { expression } => self.open(FrameKind::For(expression.clone())),
            ControlOp::EndFor => self.close(Closes::For),
            ControlOp::While { condition } => self.open(FrameKind::While(condition.clone())),
            ControlOp::EndWhile => self.close(Closes::While),
            ControlOp::Include { template } => {
                self.includes.push(template.clone());
                self.push(Stmt::Include {
                    template: template.clone(),
                });
            }
            ControlOp::Extends { template } => {
                if self.parent.is_none() {
                    self.parent = Some(template.clone());
                }
            }
        }
    }

    /// Start an `elseif` (with a condition) or `else` branch of the open `if`.
    fn next_branch(&mut self, condition: Option<&String>) {
        let Some(frame) = self.stack.last_mut() else {
            return;
        };
        let FrameKind::If {
            branches,
            condition: current,
            in_else,
        } = &mut frame.kind
        else {
            tracing::debug!("dropping branch marker outside of an if");
            return;
        };
        if *in_else {
            // Branch markers after `else` are ignored.
            return;
        }
        let body = std::mem::take(&mut frame.body);
        branches.push((std::mem::take(current), body));
        match condition {
            Some(condition) => *current = condition.clone(),
            None => *in_else = true,
        }
    }

    fn close(&mut self, closes: Closes) {
        let Some(depth) = self
            .stack
            .iter()
            .rposition(|frame| frame.closed_by() == Some(closes))
        else {
            tracing::debug!(?closes, "dropping unmatched closer");
            return;
        };
        while self.stack.len() > depth {
            self.close_top();
        }
    }

    /// Pop the innermost frame and attach it to its parent.
    fn close_top(&mut self) {
        let Some(Frame { kind, body }) = self.stack.pop() else {
            return;
        };
        let stmt = match kind {
            FrameKind::Root => {
                // The root frame is never closed through here.
                self.stack.push(Frame {
                    kind: FrameKind::Root,
                    body,
                });
                return;
            }
            FrameKind::If {
                mut branches,
                condition,
                in_else,
            } => {
                let otherwise = if in_else {
                    Some(body)
                } else {
                    branches.push((condition, body));
                    None
                };
                Stmt::If {
                    branches,
                    otherwise,
                }
            }
            FrameKind::Foreach(expression) => Stmt::Foreach { expression, body },
            FrameKind::For(expression) => Stmt::For { expression, body },
            FrameKind::While(condition) => Stmt::While { condition, body },
            FrameKind::Block(name) => {
                self.blocks.insert(name.clone(), body.clone());
                Stmt::Block { name, body }
            }
        };
        self.push(stmt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn control(op: ControlOp) -> Instruction {
        Instruction::Control(op)
    }

    fn text(s: &str) -> Stmt {
        Stmt::Text(s.to_string())
    }

    fn lower_all(instructions: Vec<Instruction>) -> Program {
        lower(&Artifact::new("t", instructions))
    }

    #[test]
    fn test_if_elseif_else() {
        let program = lower_all(vec![
            control(ControlOp::If {
                condition: "a".to_string(),
            }),
            Instruction::literal("A"),
            control(ControlOp::ElseIf {
                condition: "b".to_string(),
            }),
            Instruction::literal("B"),
            control(ControlOp::Else),
            Instruction::literal("C"),
            control(ControlOp::EndIf),
        ]);
        assert_eq!(
            program.body,
            vec![Stmt::If {
                branches: vec![
                    ("a".to_string(), vec![text("A")]),
                    ("b".to_string(), vec![text("B")]),
                ],
                otherwise: Some(vec![text("C")]),
            }]
        );
    }

    #[test]
    fn test_stray_closers_are_dropped() {
        let program = lower_all(vec![
            control(ControlOp::EndForeach),
            Instruction::literal("x"),
            control(ControlOp::EndIf),
            control(ControlOp::Else),
            Instruction::BlockClose,
        ]);
        assert_eq!(program.body, vec![text("x")]);
    }

    #[test]
    fn test_unclosed_constructs_close_at_end() {
        let program = lower_all(vec![
            control(ControlOp::Foreach {
                expression: "items as i".to_string(),
            }),
            control(ControlOp::If {
                condition: "i".to_string(),
            }),
            Instruction::literal("y"),
        ]);
        assert_eq!(
            program.body,
            vec![Stmt::Foreach {
                expression: "items as i".to_string(),
                body: vec![Stmt::If {
                    branches: vec![("i".to_string(), vec![text("y")])],
                    otherwise: None,
                }],
            }]
        );
    }

    #[test]
    fn test_outer_closer_closes_inner() {
        let program = lower_all(vec![
            control(ControlOp::If {
                condition: "a".to_string(),
            }),
            control(ControlOp::While {
                condition: "b".to_string(),
            }),
            Instruction::literal("z"),
            control(ControlOp::EndIf),
            Instruction::literal("after"),
        ]);
        assert_eq!(
            program.body,
            vec![
                Stmt::If {
                    branches: vec![(
                        "a".to_string(),
                        vec![Stmt::While {
                            condition: "b".to_string(),
                            body: vec![text("z")],
                        }]
                    )],
                    otherwise: None,
                },
                text("after"),
            ]
        );
    }

    #[test]
    fn test_blocks_and_dependencies() {
        let program = lower_all(vec![
            control(ControlOp::Extends {
                template: "base".to_string(),
            }),
            Instruction::BlockOpen {
                name: "title".to_string(),
            },
            Instruction::literal("Home"),
            Instruction::BlockClose,
            control(ControlOp::Include {
                template: "nav".to_string(),
            }),
            control(ControlOp::Extends {
                template: "ignored".to_string(),
            }),
            Instruction::Comment {
                text: "# c".to_string(),
            },
        ]);
        assert_eq!(program.parent.as_deref(), Some("base"));
        assert_eq!(program.block("title"), Some(&[text("Home")][..]));
        assert_eq!(program.block_names(), vec!["title"]);
        assert_eq!(program.dependencies().collect::<Vec<_>>(), vec!["base", "nav"]);
        assert_eq!(
            program.body,
            vec![
                Stmt::Block {
                    name: "title".to_string(),
                    body: vec![text("Home")],
                },
                Stmt::Include {
                    template: "nav".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_else_after_else_is_ignored() {
        let program = lower_all(vec![
            control(ControlOp::If {
                condition: "a".to_string(),
            }),
            control(ControlOp::Else),
            Instruction::literal("1"),
            control(ControlOp::ElseIf {
                condition: "b".to_string(),
            }),
            Instruction::literal("2"),
        ]);
        assert_eq!(
            program.body,
            vec![Stmt::If {
                branches: vec![("a".to_string(), vec![])],
                otherwise: Some(vec![text("1"), text("2")]),
            }]
        );
    }
}
