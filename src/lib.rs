//! Page Composer - layout and block composition for server-side templates
//!
//! Templates declare the layout that wraps them and contribute prioritized
//! fragments to named blocks; layouts consume those blocks through sections.
//! A [`Composer`] resolves the whole chain for one render.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use page_composer::{Composer, MemorySource, TemplateStore, ViewData};
//!
//! let source = MemorySource::with_files([
//!     ("home.html", r#"{% layout "layout/main" %}
//! {% block title %}Home{% endblock %}
//! <p>Hello, {{ name }}</p>"#),
//!     ("layout/main.html", r#"<title>{% section title %}Untitled{% endsection %}</title>
//! {{ __content__ }}"#),
//! ]);
//! let composer = Composer::new(Arc::new(TemplateStore::new(source)));
//!
//! let mut data = ViewData::new();
//! data.insert("name".to_string(), "world".into());
//!
//! let page = composer.render_string("home", data).unwrap();
//! assert_eq!(page, "<title>Home\n</title>\n<p>Hello, world</p>");
//! ```

pub mod config;
pub mod error;
pub mod parser;
pub mod renderer;
pub mod tags;
pub mod template;

pub use config::{ComposerConfig, ConfigError};
pub use error::{ParseError, ViewError};
pub use renderer::{EvalError, ViewData};
pub use tags::{TagNode, TagParser, TagRegistry};
pub use template::{
    BlockAggregator, BlockFragment, Composer, FileSystemSource, LayoutChain, LayoutScope,
    MemorySource, SourceError, Template, TemplateSource, TemplateStore, CONTENT_KEY,
};

/// Render `name` through its layouts using templates under `config.root`
///
/// Builds a fresh store on every call; long-running callers should keep a
/// [`Composer`] instead.
pub fn render_with_config(
    name: &str,
    data: ViewData,
    config: &ComposerConfig,
) -> Result<Vec<u8>, ViewError> {
    Composer::from_config(config).render(name, data)
}
