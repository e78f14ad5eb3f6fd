use crate::error::{ParseError, ViewError};
use crate::parser::{DocParser, TagArgs};
use crate::renderer::ExecContext;

use super::{TagNode, TagParser};

/// Reserved layout name that turns layout wrapping off
pub const NO_LAYOUT: &str = "none";

/// `{% layout "name" %}`
pub struct LayoutTag;

/// Declares the layout that wraps the current render
///
/// Produces no output. The last declaration executed wins.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub name: String,
}

impl TagParser for LayoutTag {
    fn name(&self) -> &'static str {
        "layout"
    }

    fn parse(
        &self,
        _doc: &mut DocParser<'_>,
        mut args: TagArgs,
    ) -> Result<Box<dyn TagNode>, ParseError> {
        if args.is_empty() {
            return Err(args.error("requires a layout name"));
        }
        let name = args.string()?;
        args.finish()?;
        Ok(Box::new(LayoutNode { name }))
    }
}

impl TagNode for LayoutNode {
    fn execute(&self, ctx: &mut ExecContext<'_>, _out: &mut String) -> Result<(), ViewError> {
        if let Some(scope) = ctx.scope_mut() {
            if self.name == NO_LAYOUT {
                scope.disable_layout();
            } else {
                scope.set_layout(&self.name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_template, Node, WhitespaceOptions};
    use crate::tags::TagRegistry;

    fn parse(source: &str) -> Result<Vec<Node>, ParseError> {
        parse_template(source, &TagRegistry::default(), WhitespaceOptions::default())
    }

    #[test]
    fn test_parse_layout_name() {
        let nodes = parse(r#"{% layout "layout/main" %}"#).expect("Should parse");
        assert_eq!(nodes.len(), 1);
        assert_eq!(
            format!("{:?}", nodes[0]),
            r#"Tag(LayoutNode { name: "layout/main" })"#
        );
    }

    #[test]
    fn test_layout_requires_argument() {
        let err = parse("{% layout %}").unwrap_err();
        assert_eq!(err.to_string(), "invalid 'layout' tag: requires a layout name");
    }

    #[test]
    fn test_layout_rejects_identifier() {
        let err = parse("{% layout main %}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid 'layout' tag: requires a string literal"
        );
    }

    #[test]
    fn test_layout_rejects_surplus_arguments() {
        let err = parse(r#"{% layout "a" "b" %}"#).unwrap_err();
        assert_eq!(err.to_string(), "invalid 'layout' tag: surplus arguments");
    }
}
