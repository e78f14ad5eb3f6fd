//! Tag extensions
//!
//! Each `{% name ... %}` directive is a parser/executor pair: a [`TagParser`]
//! registered under its name turns the tag's arguments (and body, for paired
//! tags) into a [`TagNode`], which runs against an [`ExecContext`] at render
//! time.
//!
//! The composition tags `layout`, `block` and `section` talk to the render's
//! [`LayoutScope`](crate::template::LayoutScope); `if`, `for` and `include`
//! are the built-in control tags.

mod block;
mod builtin;
mod layout;
mod section;

use std::collections::HashMap;
use std::fmt;

use crate::error::{ParseError, ViewError};
use crate::parser::{DocParser, EndTag, TagArgs, Token};
use crate::renderer::ExecContext;

pub use block::{BlockNode, BlockTag};
pub use builtin::{ForNode, ForTag, IfNode, IfTag, IncludeNode, IncludeTag};
pub use layout::{LayoutNode, LayoutTag};
pub use section::{SectionNode, SectionTag};

/// Compiles one tag occurrence into an executable node
pub trait TagParser: Send + Sync {
    /// Tag name as written after `{%`
    fn name(&self) -> &'static str;

    fn parse(&self, doc: &mut DocParser<'_>, args: TagArgs)
        -> Result<Box<dyn TagNode>, ParseError>;
}

/// A compiled tag, executed once per render of its template
pub trait TagNode: fmt::Debug + Send + Sync {
    fn execute(&self, ctx: &mut ExecContext<'_>, out: &mut String) -> Result<(), ViewError>;
}

/// Tag parsers by name
pub struct TagRegistry {
    parsers: HashMap<&'static str, Box<dyn TagParser>>,
}

impl Default for TagRegistry {
    /// All built-in and composition tags
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.insert(Box::new(LayoutTag));
        registry.insert(Box::new(BlockTag));
        registry.insert(Box::new(SectionTag));
        registry.insert(Box::new(IfTag));
        registry.insert(Box::new(ForTag));
        registry.insert(Box::new(IncludeTag));
        registry
    }
}

impl TagRegistry {
    /// A registry with no tags at all
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Add a tag; names are fixed once registered
    pub fn register(&mut self, parser: Box<dyn TagParser>) -> Result<(), ViewError> {
        if self.parsers.contains_key(parser.name()) {
            return Err(ViewError::DuplicateTag {
                tag: parser.name().to_string(),
            });
        }
        self.insert(parser);
        Ok(())
    }

    fn insert(&mut self, parser: Box<dyn TagParser>) {
        self.parsers.insert(parser.name(), parser);
    }

    pub fn get(&self, name: &str) -> Option<&dyn TagParser> {
        self.parsers.get(name).map(|p| p.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parsers.contains_key(name)
    }

    /// Registered tag names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.parsers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagRegistry")
            .field("tags", &self.names())
            .finish()
    }
}

/// Validate the optional name on a closing tag such as `{% endblock name %}`
pub(crate) fn check_end_name(opener: &str, name: &str, end: &EndTag) -> Result<(), ParseError> {
    if end.args.is_empty() {
        return Ok(());
    }
    match (end.args.count(), end.args.peek()) {
        (1, Some(Token::Ident(closing))) if closing == name => Ok(()),
        (1, Some(Token::Ident(closing))) => Err(ParseError::tag_syntax(
            opener,
            format!(
                "name for '{}' must equal '{}' tag's name ('{}' != '{}')",
                end.name, opener, name, closing
            ),
            end.args.span(),
        )),
        _ => Err(ParseError::tag_syntax(
            opener,
            format!(
                "either no or only one argument (identifier) allowed for '{}'",
                end.name
            ),
            end.args.span(),
        )),
    }
}
