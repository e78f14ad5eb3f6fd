use crate::error::{ParseError, ViewError};
use crate::parser::{DocParser, Node, TagArgs};
use crate::renderer::{render_nodes, ExecContext};

use super::{check_end_name, TagNode, TagParser};

/// `{% section name %} fallback {% endsection [name] %}`
pub struct SectionTag;

/// Emits the sorted fragments of a block, or its fallback when there are none
#[derive(Debug)]
pub struct SectionNode {
    pub name: String,
    pub fallback: Vec<Node>,
}

impl TagParser for SectionTag {
    fn name(&self) -> &'static str {
        "section"
    }

    fn parse(
        &self,
        doc: &mut DocParser<'_>,
        mut args: TagArgs,
    ) -> Result<Box<dyn TagNode>, ParseError> {
        let name = args.identifier()?;
        args.finish()?;

        let (fallback, end) = doc.wrap_until(&args, &["endsection"])?;
        check_end_name("section", &name, &end)?;

        Ok(Box::new(SectionNode { name, fallback }))
    }
}

impl TagNode for SectionNode {
    fn execute(&self, ctx: &mut ExecContext<'_>, out: &mut String) -> Result<(), ViewError> {
        if let Some(scope) = ctx.scope() {
            let fragments = scope.block_fragments(&self.name);
            if !fragments.is_empty() {
                for fragment in fragments {
                    out.push_str(&fragment.content);
                    out.push('\n');
                }
                return Ok(());
            }
        }
        render_nodes(&self.fallback, ctx, out)
    }
}
