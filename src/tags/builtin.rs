//! Control tags: `if`, `for` and `include`

use serde_json::Value;

use crate::error::{ParseError, ViewError};
use crate::parser::{DocParser, Expr, Node, TagArgs, Token};
use crate::renderer::{render_nodes, truthy, type_name, EvalError, ExecContext};

use super::{TagNode, TagParser};

/// `{% if %} ... {% elif %} ... {% else %} ... {% endif %}`
pub struct IfTag;

#[derive(Debug)]
pub struct IfNode {
    pub branches: Vec<(Expr, Vec<Node>)>,
    pub otherwise: Option<Vec<Node>>,
}

impl TagParser for IfTag {
    fn name(&self) -> &'static str {
        "if"
    }

    fn parse(
        &self,
        doc: &mut DocParser<'_>,
        mut args: TagArgs,
    ) -> Result<Box<dyn TagNode>, ParseError> {
        let mut condition = args.expression()?;
        let mut branches = Vec::new();
        let mut otherwise = None;

        loop {
            let (body, mut end) = doc.wrap_until(&args, &["elif", "else", "endif"])?;
            branches.push((condition, body));
            match end.name.as_str() {
                "elif" => condition = end.args.expression()?,
                "else" => {
                    end.args.finish()?;
                    let (body, end) = doc.wrap_until(&args, &["endif"])?;
                    end.args.finish()?;
                    otherwise = Some(body);
                    break;
                }
                _ => {
                    end.args.finish()?;
                    break;
                }
            }
        }

        Ok(Box::new(IfNode {
            branches,
            otherwise,
        }))
    }
}

impl TagNode for IfNode {
    fn execute(&self, ctx: &mut ExecContext<'_>, out: &mut String) -> Result<(), ViewError> {
        for (condition, body) in &self.branches {
            if truthy(&ctx.eval(condition)?) {
                return render_nodes(body, ctx, out);
            }
        }
        match &self.otherwise {
            Some(body) => render_nodes(body, ctx, out),
            None => Ok(()),
        }
    }
}

/// `{% for [key,] value in expr %} ... {% else %} ... {% endfor %}`
pub struct ForTag;

#[derive(Debug)]
pub struct ForNode {
    /// Index or key name in the two-name form
    pub key: Option<String>,
    pub value: String,
    pub iterable: Expr,
    pub body: Vec<Node>,
    /// Rendered when the sequence is empty
    pub empty: Option<Vec<Node>>,
}

impl TagParser for ForTag {
    fn name(&self) -> &'static str {
        "for"
    }

    fn parse(
        &self,
        doc: &mut DocParser<'_>,
        mut args: TagArgs,
    ) -> Result<Box<dyn TagNode>, ParseError> {
        let first = args.identifier()?;
        let (key, value) = if args.eat(&Token::Comma) {
            (Some(first), args.identifier()?)
        } else {
            (None, first)
        };
        args.keyword(Token::In, "in")?;
        let iterable = args.expression()?;

        let (body, end) = doc.wrap_until(&args, &["else", "endfor"])?;
        end.args.finish()?;
        let empty = if end.name == "else" {
            let (body, end) = doc.wrap_until(&args, &["endfor"])?;
            end.args.finish()?;
            Some(body)
        } else {
            None
        };

        Ok(Box::new(ForNode {
            key,
            value,
            iterable,
            body,
            empty,
        }))
    }
}

impl ForNode {
    /// Loop items as (key, value) pairs
    fn items(&self, iterable: Value) -> Result<Vec<(Value, Value)>, EvalError> {
        match iterable {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => Ok(items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (Value::from(i), item))
                .collect()),
            Value::Object(map) => Ok(map
                .into_iter()
                .map(|(k, v)| {
                    let key = Value::String(k);
                    // The one-name form binds the key
                    let value = if self.key.is_some() { v } else { key.clone() };
                    (key, value)
                })
                .collect()),
            other => Err(EvalError::NotIterable {
                type_name: type_name(&other),
            }),
        }
    }

    fn run(
        &self,
        items: Vec<(Value, Value)>,
        ctx: &mut ExecContext<'_>,
        out: &mut String,
    ) -> Result<(), ViewError> {
        for (key, value) in items {
            if let Some(key_name) = &self.key {
                ctx.set_local(key_name, key);
            }
            ctx.set_local(&self.value, value);
            render_nodes(&self.body, ctx, out)?;
        }
        Ok(())
    }
}

impl TagNode for ForNode {
    fn execute(&self, ctx: &mut ExecContext<'_>, out: &mut String) -> Result<(), ViewError> {
        let items = self.items(ctx.eval(&self.iterable)?)?;
        if items.is_empty() {
            return match &self.empty {
                Some(body) => render_nodes(body, ctx, out),
                None => Ok(()),
            };
        }

        ctx.push_locals();
        let result = self.run(items, ctx, out);
        ctx.pop_locals();
        result
    }
}

/// `{% include "name" %}`
pub struct IncludeTag;

/// Renders another template of the same store into the current output
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeNode {
    pub name: String,
}

impl TagParser for IncludeTag {
    fn name(&self) -> &'static str {
        "include"
    }

    fn parse(
        &self,
        _doc: &mut DocParser<'_>,
        mut args: TagArgs,
    ) -> Result<Box<dyn TagNode>, ParseError> {
        let name = args.string()?;
        args.finish()?;
        Ok(Box::new(IncludeNode { name }))
    }
}

impl TagNode for IncludeNode {
    fn execute(&self, ctx: &mut ExecContext<'_>, out: &mut String) -> Result<(), ViewError> {
        ctx.include(&self.name, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_template, WhitespaceOptions};
    use crate::tags::TagRegistry;

    fn parse(source: &str) -> Result<Vec<Node>, ParseError> {
        parse_template(source, &TagRegistry::default(), WhitespaceOptions::default())
    }

    #[test]
    fn test_parse_if_chain() {
        let nodes = parse("{% if a %}1{% elif b %}2{% else %}3{% endif %}").expect("Should parse");
        let debug = format!("{:?}", nodes[0]);
        assert!(debug.starts_with("Tag(IfNode { branches: ["));
        assert!(debug.contains(r#"otherwise: Some([Text("3")])"#));
    }

    #[test]
    fn test_endif_rejects_arguments() {
        let err = parse("{% if a %}1{% endif a %}").unwrap_err();
        assert_eq!(err.to_string(), "invalid 'endif' tag: surplus arguments");
    }

    #[test]
    fn test_if_requires_condition() {
        let err = parse("{% if %}1{% endif %}").unwrap_err();
        assert_eq!(err.to_string(), "invalid 'if' tag: requires an expression");
    }

    #[test]
    fn test_parse_for_two_names() {
        let nodes = parse("{% for i, item in items %}{{ item }}{% endfor %}").expect("Should parse");
        let debug = format!("{:?}", nodes[0]);
        assert!(debug.contains(r#"key: Some("i")"#));
        assert!(debug.contains(r#"value: "item""#));
    }

    #[test]
    fn test_for_requires_in() {
        let err = parse("{% for item items %}{% endfor %}").unwrap_err();
        assert_eq!(err.to_string(), "invalid 'for' tag: expected 'in'");
    }

    #[test]
    fn test_include_requires_string() {
        let err = parse("{% include partial %}").unwrap_err();
        assert_eq!(err.to_string(), "invalid 'include' tag: requires a string literal");
    }
}
