//! Template store and layout composition
//!
//! A [`TemplateStore`] compiles every template of a [`TemplateSource`] into
//! a table keyed by logical name. A [`Composer`] renders a page from that
//! table, then renders the layouts it declares, threading each step's output
//! into the next as `__content__`:
//!
//! ```text
//! {# pages/home.html #}
//! {% layout "layout/main" %}
//! {% block head 10 %}<title>Home</title>{% endblock %}
//! <p>Welcome</p>
//!
//! {# layout/main.html #}
//! <head>{% section head %}<title>Untitled</title>{% endsection %}</head>
//! <body>{{ __content__ }}</body>
//! ```

mod registry;
mod resolver;
mod scope;
mod source;

pub use registry::{TemplateStore, TemplateTable};
pub use resolver::{Composer, LayoutChain, CONTENT_KEY};
pub use scope::{BlockAggregator, BlockFragment, Composition, LayoutScope, RenderScope};
pub use source::{FileSystemSource, MemorySource, SourceError, TemplateSource};

use crate::error::ParseError;
use crate::parser::{parse_template, Node, WhitespaceOptions};
use crate::tags::TagRegistry;

/// One compiled template, immutable once built
#[derive(Debug)]
pub struct Template {
    /// Logical name: relative path without extension
    pub name: String,
    pub nodes: Vec<Node>,
}

impl Template {
    pub fn compile(
        name: &str,
        source: &str,
        registry: &TagRegistry,
        whitespace: WhitespaceOptions,
    ) -> Result<Self, ParseError> {
        Ok(Self {
            name: name.to_string(),
            nodes: parse_template(source, registry, whitespace)?,
        })
    }
}

/// Logical name of a source path, or `None` if it is not a template
///
/// The path must end in `extension` and be longer than it.
pub fn logical_name(path: &str, extension: &str) -> Option<String> {
    let path = path.replace('\\', "/");
    if path.len() <= extension.len() || !path.ends_with(extension) {
        return None;
    }
    Some(path[..path.len() - extension.len()].to_string())
}
