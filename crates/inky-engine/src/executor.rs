/*
 * executor.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Program execution.
//!
//! An [`Executor`] renders one template (and whatever it includes or extends)
//! against a [`TemplateContext`]. Every program it may need is loaded up
//! front; execution itself does no I/O.

use crate::error::{LoaderError, RenderError, RenderResult};
use crate::expr::{
    Expr, ExprError, ForIterable, Operand, Primary, describe_path, parse_expression, parse_for,
    parse_foreach,
};
use crate::extension::Filter;
use crate::program::{Program, Stmt};
use crate::value::{TemplateContext, TemplateValue};
use hashlink::LinkedHashMap;
use inky_compiler::Escaper;
use std::collections::HashMap;

/// Block bodies in effect: block name to (defining template, body).
type Overrides<'a> = HashMap<&'a str, (&'a str, &'a [Stmt])>;

/// How to treat a path that resolves to nothing.
#[derive(Debug, Clone, Copy)]
enum Undefined {
    /// Evaluate to null.
    Empty,
    /// Raise [`RenderError::UndefinedVariable`] when strict mode is on.
    Strict { line: usize },
}

/// Execution settings.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorOptions {
    pub strict_variables: bool,
    pub max_loop_iterations: usize,
}

/// Renders preloaded programs.
pub struct Executor<'a> {
    programs: &'a HashMap<String, Program>,
    filters: &'a LinkedHashMap<String, Filter>,
    escaper: &'a Escaper,
    options: ExecutorOptions,
    /// Templates currently being rendered, outermost first.
    chain: Vec<String>,
}

impl<'a> Executor<'a> {
    pub fn new(
        programs: &'a HashMap<String, Program>,
        filters: &'a LinkedHashMap<String, Filter>,
        escaper: &'a Escaper,
        options: ExecutorOptions,
    ) -> Self {
        Self {
            programs,
            filters,
            escaper,
            options,
            chain: Vec::new(),
        }
    }

    /// Render a template.
    pub fn render(&mut self, name: &str, ctx: &TemplateContext) -> RenderResult<String> {
        let mut out = String::new();
        self.render_template(name, ctx, &Overrides::new(), &mut out)?;
        Ok(out)
    }

    /// Render a single block of a template.
    ///
    /// The block is looked up along the `extends` chain; the most derived
    /// definition wins, and blocks nested inside it resolve the same way.
    pub fn render_block(
        &mut self,
        name: &str,
        block: &str,
        ctx: &TemplateContext,
    ) -> RenderResult<String> {
        let mut overrides = Overrides::new();
        let mut visited: Vec<String> = Vec::new();
        let mut program = self.program(name)?;
        loop {
            if visited.contains(&program.name) {
                visited.push(program.name.clone());
                return Err(RenderError::CircularReference { chain: visited });
            }
            visited.push(program.name.clone());
            for (block_name, body) in &program.blocks {
                overrides
                    .entry(block_name.as_str())
                    .or_insert((program.name.as_str(), body.as_slice()));
            }
            match &program.parent {
                Some(parent) => program = self.program(parent)?,
                None => break,
            }
        }

        let (template, body) =
            overrides
                .get(block)
                .copied()
                .ok_or_else(|| RenderError::BlockNotFound {
                    name: block.to_string(),
                    template: name.to_string(),
                })?;
        let mut out = String::new();
        self.execute(body, template, ctx, &overrides, &mut out)?;
        Ok(out)
    }

    fn program(&self, name: &str) -> RenderResult<&'a Program> {
        self.programs.get(name).ok_or_else(|| {
            RenderError::Loader(LoaderError::NotFound {
                name: name.to_string(),
                paths: Vec::new(),
            })
        })
    }

    fn render_template(
        &mut self,
        name: &str,
        ctx: &TemplateContext,
        overrides: &Overrides<'a>,
        out: &mut String,
    ) -> RenderResult<()> {
        if self.chain.iter().any(|n| n == name) {
            let mut chain = self.chain.clone();
            chain.push(name.to_string());
            return Err(RenderError::CircularReference { chain });
        }
        let program = self.program(name)?;

        self.chain.push(name.to_string());
        let result = match &program.parent {
            Some(parent) => {
                // Output outside blocks is discarded; only the blocks reach the parent.
                let mut merged = overrides.clone();
                for (block, body) in &program.blocks {
                    merged
                        .entry(block.as_str())
                        .or_insert((program.name.as_str(), body.as_slice()));
                }
                self.render_template(parent, ctx, &merged, out)
            }
            None => self.execute(&program.body, &program.name, ctx, overrides, out),
        };
        self.chain.pop();
        result
    }

    fn execute(
        &mut self,
        stmts: &'a [Stmt],
        template: &'a str,
        ctx: &TemplateContext,
        overrides: &Overrides<'a>,
        out: &mut String,
    ) -> RenderResult<()> {
        for stmt in stmts {
            self.statement(stmt, template, ctx, overrides, out)?;
        }
        Ok(())
    }

    fn statement(
        &mut self,
        stmt: &'a Stmt,
        template: &'a str,
        ctx: &TemplateContext,
        overrides: &Overrides<'a>,
        out: &mut String,
    ) -> RenderResult<()> {
        match stmt {
            Stmt::Text(text) => out.push_str(text),

            Stmt::Echo {
                expression,
                strategy,
                line,
            } => {
                let expr = parse(expression, template)?;
                let value = self.evaluate(&expr, ctx, template, Undefined::Strict { line: *line })?;
                let rendered = value.render();
                match strategy {
                    Some(strategy) => out.push_str(&self.escaper.escape(&rendered, strategy)?),
                    None => out.push_str(&rendered),
                }
            }

            Stmt::If {
                branches,
                otherwise,
            } => {
                for (condition, body) in branches {
                    if self.condition(condition, ctx, template)? {
                        return self.execute(body, template, ctx, overrides, out);
                    }
                }
                if let Some(body) = otherwise {
                    self.execute(body, template, ctx, overrides, out)?;
                }
            }

            Stmt::Foreach { expression, body } => {
                let spec = parse_foreach(expression).map_err(|e| invalid(expression, template, e))?;
                let source = self.evaluate(&spec.source, ctx, template, Undefined::Empty)?;
                let items = iteration_items(source);
                let length = items.len();
                for (index, (key, item)) in items.into_iter().enumerate() {
                    let mut scope = ctx.child();
                    if let Some(key_name) = &spec.key {
                        scope.insert(key_name.clone(), key);
                    }
                    scope.insert(spec.item.clone(), item);
                    scope.insert("loop", loop_variable(index, length));
                    self.execute(body, template, &scope, overrides, out)?;
                }
            }

            Stmt::For { expression, body } => {
                let spec = parse_for(expression).map_err(|e| invalid(expression, template, e))?;
                let items: Vec<TemplateValue> = match &spec.iterable {
                    ForIterable::Range(start, end) => {
                        let start = self.range_bound(start, ctx, expression, template)?;
                        let end = self.range_bound(end, ctx, expression, template)?;
                        let count = start.abs_diff(end).saturating_add(1);
                        if count > self.options.max_loop_iterations as u64 {
                            return Err(self.loop_limit(template));
                        }
                        if start <= end {
                            (start..=end).map(TemplateValue::Int).collect()
                        } else {
                            (end..=start).rev().map(TemplateValue::Int).collect()
                        }
                    }
                    ForIterable::Source(source) => {
                        let source = self.evaluate(source, ctx, template, Undefined::Empty)?;
                        iteration_items(source).into_iter().map(|(_, v)| v).collect()
                    }
                };
                let length = items.len();
                for (index, item) in items.into_iter().enumerate() {
                    let mut scope = ctx.child();
                    scope.insert(spec.variable.clone(), item);
                    scope.insert("loop", loop_variable(index, length));
                    self.execute(body, template, &scope, overrides, out)?;
                }
            }

            Stmt::While { condition, body } => {
                let mut iterations = 0;
                while self.condition(condition, ctx, template)? {
                    if iterations == self.options.max_loop_iterations {
                        return Err(self.loop_limit(template));
                    }
                    iterations += 1;
                    self.execute(body, template, ctx, overrides, out)?;
                }
            }

            Stmt::Block { name, body } => {
                let (defined_in, body) = overrides
                    .get(name.as_str())
                    .copied()
                    .unwrap_or((template, body.as_slice()));
                self.execute(body, defined_in, ctx, overrides, out)?;
            }

            Stmt::Include { template: included } => {
                tracing::trace!(template = %template, include = %included, "include");
                self.render_template(included, ctx, &Overrides::new(), out)?;
            }
        }
        Ok(())
    }

    /// Conditions never raise undefined-variable errors.
    fn condition(&self, text: &str, ctx: &TemplateContext, template: &str) -> RenderResult<bool> {
        let expr = parse(text, template)?;
        Ok(self
            .evaluate(&expr, ctx, template, Undefined::Empty)?
            .is_truthy())
    }

    fn evaluate(
        &self,
        expr: &Expr,
        ctx: &TemplateContext,
        template: &str,
        undefined: Undefined,
    ) -> RenderResult<TemplateValue> {
        let mut value = match &expr.primary {
            Primary::Group(inner) => self.evaluate(inner, ctx, template, undefined)?,
            Primary::Operand(operand) => self.operand(operand, ctx, template, undefined)?,
        };

        for call in &expr.filters {
            let filter = self
                .filters
                .get(&call.name)
                .ok_or_else(|| RenderError::UndefinedFilter {
                    name: call.name.clone(),
                    template: template.to_string(),
                })?;
            let arguments = call
                .arguments
                .iter()
                .map(|arg| self.operand(arg, ctx, template, Undefined::Empty))
                .collect::<RenderResult<Vec<_>>>()?;
            value = filter(&value, &arguments);
        }

        if expr.negated {
            value = TemplateValue::Bool(!value.is_truthy());
        }
        Ok(value)
    }

    fn operand(
        &self,
        operand: &Operand,
        ctx: &TemplateContext,
        template: &str,
        undefined: Undefined,
    ) -> RenderResult<TemplateValue> {
        let segments = match operand {
            Operand::Literal(value) => return Ok(value.clone()),
            Operand::Path(segments) => segments,
        };
        if let Some(value) = ctx.get_path(segments) {
            return Ok(value.clone());
        }
        match undefined {
            Undefined::Strict { line } if self.options.strict_variables => {
                Err(RenderError::UndefinedVariable {
                    name: describe_path(segments),
                    template: template.to_string(),
                    line,
                })
            }
            _ => Ok(TemplateValue::Null),
        }
    }

    fn range_bound(
        &self,
        operand: &Operand,
        ctx: &TemplateContext,
        expression: &str,
        template: &str,
    ) -> RenderResult<i64> {
        let value = self.operand(operand, ctx, template, Undefined::Empty)?;
        value.as_f64().map(|f| f as i64).ok_or_else(|| RenderError::InvalidExpression {
            expression: expression.to_string(),
            template: template.to_string(),
            message: format!("range bound \"{}\" is not a number", operand.describe()),
        })
    }

    fn loop_limit(&self, template: &str) -> RenderError {
        RenderError::LoopLimitExceeded {
            template: template.to_string(),
            limit: self.options.max_loop_iterations,
        }
    }
}

fn parse(text: &str, template: &str) -> RenderResult<Expr> {
    parse_expression(text).map_err(|e| invalid(text, template, e))
}

fn invalid(expression: &str, template: &str, error: ExprError) -> RenderError {
    RenderError::InvalidExpression {
        expression: expression.to_string(),
        template: template.to_string(),
        message: error.message,
    }
}

/// `(key, item)` pairs a loop walks over. Scalars and null yield nothing.
fn iteration_items(source: TemplateValue) -> Vec<(TemplateValue, TemplateValue)> {
    match source {
        TemplateValue::List(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| (TemplateValue::Int(i as i64), item))
            .collect(),
        TemplateValue::Map(map) => map
            .into_iter()
            .map(|(key, item)| (TemplateValue::String(key), item))
            .collect(),
        _ => Vec::new(),
    }
}

/// The `loop` variable bound inside loop bodies.
fn loop_variable(index: usize, length: usize) -> TemplateValue {
    let mut map = LinkedHashMap::new();
    map.insert("index".to_string(), TemplateValue::Int(index as i64 + 1));
    map.insert("index0".to_string(), TemplateValue::Int(index as i64));
    map.insert("first".to_string(), TemplateValue::Bool(index == 0));
    map.insert("last".to_string(), TemplateValue::Bool(index + 1 == length));
    map.insert("length".to_string(), TemplateValue::Int(length as i64));
    TemplateValue::Map(map)
}
