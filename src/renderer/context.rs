//! Execution state for one template render

use std::collections::HashMap;

use serde_json::Value;

use crate::error::ViewError;
use crate::parser::{Expr, Node};
use crate::template::{LayoutScope, TemplateTable};

use super::eval::{evaluate, write_value, EvalError, Lookup};
use super::pool::BufferPool;

/// Caller-supplied variable bindings
pub type ViewData = HashMap<String, Value>;

/// Deepest allowed chain of nested `include` tags
pub const MAX_INCLUDE_DEPTH: usize = 32;

/// Everything a node needs while executing
///
/// The layout scope is absent for plain renders, in which case the
/// composition tags do nothing (and `section` shows its fallback).
pub struct ExecContext<'a> {
    data: &'a ViewData,
    globals: &'a ViewData,
    locals: Vec<HashMap<String, Value>>,
    scope: Option<&'a mut dyn LayoutScope>,
    templates: &'a TemplateTable,
    pool: &'a BufferPool,
    include_depth: usize,
}

impl<'a> ExecContext<'a> {
    pub fn new(
        data: &'a ViewData,
        globals: &'a ViewData,
        templates: &'a TemplateTable,
        pool: &'a BufferPool,
    ) -> Self {
        Self {
            data,
            globals,
            locals: Vec::new(),
            scope: None,
            templates,
            pool,
            include_depth: 0,
        }
    }

    pub fn with_scope(mut self, scope: &'a mut dyn LayoutScope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        evaluate(expr, self)
    }

    pub fn scope(&self) -> Option<&(dyn LayoutScope + 'a)> {
        self.scope.as_deref()
    }

    pub fn scope_mut(&mut self) -> Option<&mut (dyn LayoutScope + 'a)> {
        self.scope.as_deref_mut()
    }

    pub fn pool(&self) -> &'a BufferPool {
        self.pool
    }

    /// Open a frame of loop variables
    pub fn push_locals(&mut self) {
        self.locals.push(HashMap::new());
    }

    pub fn pop_locals(&mut self) {
        self.locals.pop();
    }

    /// Bind a variable in the innermost frame
    pub fn set_local(&mut self, name: &str, value: Value) {
        if self.locals.is_empty() {
            self.push_locals();
        }
        if let Some(frame) = self.locals.last_mut() {
            frame.insert(name.to_string(), value);
        }
    }

    /// Render another template of the same table into `out`
    pub fn include(&mut self, name: &str, out: &mut String) -> Result<(), ViewError> {
        let templates = self.templates;
        let template = templates
            .get(name)
            .ok_or_else(|| ViewError::not_found(name))?;
        if self.include_depth >= MAX_INCLUDE_DEPTH {
            return Err(EvalError::IncludeDepth {
                name: name.to_string(),
                limit: MAX_INCLUDE_DEPTH,
            }
            .into());
        }

        self.include_depth += 1;
        let result = render_nodes(&template.nodes, self, out);
        self.include_depth -= 1;
        result
    }
}

impl Lookup for ExecContext<'_> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.locals
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .or_else(|| self.data.get(name))
            .or_else(|| self.globals.get(name))
    }
}

/// Execute nodes in order, appending their output
pub fn render_nodes(
    nodes: &[Node],
    ctx: &mut ExecContext<'_>,
    out: &mut String,
) -> Result<(), ViewError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Output(expr) => write_value(out, &ctx.eval(expr)?),
            Node::Tag(tag) => tag.execute(ctx, out)?,
        }
    }
    Ok(())
}
