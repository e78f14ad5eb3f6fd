use tracing::debug;

use crate::error::{ParseError, ViewError};
use crate::parser::{DocParser, Expr, Node, TagArgs};
use crate::renderer::{as_priority, render_nodes, ExecContext};

use super::{check_end_name, TagNode, TagParser};

/// `{% block name [priority] %} ... {% endblock [name] %}`
pub struct BlockTag;

/// Renders its body and contributes it to the named block
#[derive(Debug)]
pub struct BlockNode {
    pub name: String,
    pub priority: Option<Expr>,
    pub body: Vec<Node>,
}

impl TagParser for BlockTag {
    fn name(&self) -> &'static str {
        "block"
    }

    fn parse(
        &self,
        doc: &mut DocParser<'_>,
        mut args: TagArgs,
    ) -> Result<Box<dyn TagNode>, ParseError> {
        let name = args.identifier()?;
        let priority = if args.is_empty() {
            None
        } else {
            Some(args.expression()?)
        };

        let (body, end) = doc.wrap_until(&args, &["endblock"])?;
        check_end_name("block", &name, &end)?;

        Ok(Box::new(BlockNode {
            name,
            priority,
            body,
        }))
    }
}

impl BlockNode {
    /// Evaluate the priority, falling back to 0 on any failure
    fn score(&self, ctx: &ExecContext<'_>) -> i64 {
        let Some(expr) = &self.priority else {
            return 0;
        };
        match ctx.eval(expr) {
            Ok(value) => as_priority(&value).unwrap_or_else(|| {
                debug!(block = %self.name, %value, "block priority is not a number, using 0");
                0
            }),
            Err(err) => {
                debug!(block = %self.name, error = %err, "block priority failed, using 0");
                0
            }
        }
    }
}

impl TagNode for BlockNode {
    fn execute(&self, ctx: &mut ExecContext<'_>, _out: &mut String) -> Result<(), ViewError> {
        // Outside a layout render there is nowhere to contribute to
        if ctx.scope().is_none() {
            return Ok(());
        }

        let content = {
            let mut buffer = ctx.pool().acquire();
            render_nodes(&self.body, ctx, &mut buffer)?;
            buffer.as_str().to_owned()
        };

        // Evaluated after the body, matching execution order of side effects
        let score = self.score(ctx);
        if let Some(scope) = ctx.scope_mut() {
            scope.append_block(&self.name, content, score);
        }
        Ok(())
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

    fn block(nodes: &[Node]) -> String {
        match &nodes[0] {
            Node::Tag(tag) => format!("{:?}", tag),
            other => panic!("Expected tag, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_block_without_priority() {
        let nodes = parse("{% block head %}<meta>{% endblock %}").expect("Should parse");
        let debug = block(&nodes);
        assert!(debug.contains(r#"name: "head""#));
        assert!(debug.contains("priority: None"));
        assert!(debug.contains(r#"Text("<meta>")"#));
    }

    #[test]
    fn test_parse_block_with_priority_expression() {
        let nodes = parse("{% block head weight + 1 %}x{% endblock head %}").expect("Should parse");
        assert!(block(&nodes).contains("priority: Some(Binary(Add"));
    }

    #[test]
    fn test_block_requires_name() {
        let err = parse("{% block %}x{% endblock %}").unwrap_err();
        assert_eq!(err.to_string(), "invalid 'block' tag: requires an identifier");
    }

    #[test]
    fn test_endblock_name_mismatch() {
        let err = parse("{% block head %}x{% endblock foot %}").unwrap_err();
        match err {
            ParseError::TagSyntax { tag, detail, .. } => {
                assert_eq!(tag, "block");
                assert_eq!(
                    detail,
                    "name for 'endblock' must equal 'block' tag's name ('head' != 'foot')"
                );
            }
            other => panic!("Expected TagSyntax, got {:?}", other),
        }
    }

    #[test]
    fn test_endblock_surplus_arguments() {
        let err = parse("{% block head %}x{% endblock head foot %}").unwrap_err();
        assert!(err
            .to_string()
            .contains("either no or only one argument (identifier) allowed for 'endblock'"));
    }

    #[test]
    fn test_nested_blocks_parse() {
        let nodes = parse("{% block a %}{% block b %}x{% endblock b %}{% endblock a %}")
            .expect("Should parse");
        assert_eq!(nodes.len(), 1);
    }
}
