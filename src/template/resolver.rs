//! Layout resolution: render a page, then each layout it declares

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::config::{ComposerConfig, DEFAULT_LAYOUT};
use crate::error::ViewError;
use crate::renderer::ViewData;

use super::registry::{TemplateStore, TemplateTable};
use super::scope::{LayoutScope, RenderScope};

/// Binding that carries the previous step's output into a layout
pub const CONTENT_KEY: &str = "__content__";

/// Layout names visited in one render, in order
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LayoutChain {
    visited: Vec<String>,
}

impl LayoutChain {
    /// Record a hop to `name`; a name seen before is a cycle
    pub fn enter(&mut self, name: &str) -> Result<(), ViewError> {
        if self.visited.iter().any(|seen| seen == name) {
            return Err(ViewError::LayoutCycle {
                name: name.to_string(),
            });
        }
        self.visited.push(name.to_string());
        Ok(())
    }

    pub fn names(&self) -> &[String] {
        &self.visited
    }
}

/// Renders pages through their layout chains
#[derive(Clone)]
pub struct Composer {
    store: Arc<TemplateStore>,
    default_layout: Option<String>,
}

impl Composer {
    pub fn new(store: Arc<TemplateStore>) -> Self {
        Self {
            store,
            default_layout: Some(DEFAULT_LAYOUT.to_string()),
        }
    }

    /// A composer over the configured template directory
    pub fn from_config(config: &ComposerConfig) -> Self {
        Self {
            store: Arc::new(TemplateStore::from_config(config)),
            default_layout: config.default_layout.clone(),
        }
    }

    /// Layout used when a page declares none; an empty name disables it
    pub fn with_default_layout(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.default_layout = if name.is_empty() { None } else { Some(name) };
        self
    }

    pub fn without_default_layout(mut self) -> Self {
        self.default_layout = None;
        self
    }

    pub fn store(&self) -> &Arc<TemplateStore> {
        &self.store
    }

    pub fn default_layout(&self) -> Option<&str> {
        self.default_layout.as_deref()
    }

    /// Render `name` and every layout it chains into
    ///
    /// Each step's output is trimmed. Layout declarations are read only
    /// after a step finishes, and a layout only chains further if it
    /// declares a layout of its own.
    pub fn render(&self, name: &str, data: ViewData) -> Result<Vec<u8>, ViewError> {
        self.render_string(name, data).map(String::into_bytes)
    }

    pub fn render_string(&self, name: &str, data: ViewData) -> Result<String, ViewError> {
        self.store.with_table(|table| {
            let mut scope = RenderScope::new(data);
            let mut chain = LayoutChain::default();
            let mut output = self.step(table, name, &mut scope)?;

            while !scope.composition.layout_disabled() {
                let layout = match scope
                    .composition
                    .take_pending_layout()
                    .or_else(|| self.default_layout.clone())
                {
                    Some(layout) => layout,
                    None => break,
                };
                chain.enter(&layout)?;
                debug!(template = name, layout = %layout, chain = ?chain.names(), "applying layout");

                scope
                    .data
                    .insert(CONTENT_KEY.to_string(), Value::String(output));
                scope.composition.disable_layout();
                output = self.step(table, &layout, &mut scope)?;
            }

            Ok(output)
        })
    }

    fn step(
        &self,
        table: &TemplateTable,
        name: &str,
        scope: &mut RenderScope,
    ) -> Result<String, ViewError> {
        let RenderScope { data, composition } = scope;
        let layout_scope: &mut dyn LayoutScope = composition;
        let output = self.store.execute(table, name, data, Some(layout_scope))?;
        Ok(output.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::MemorySource;
    use pretty_assertions::assert_eq;

    fn composer(files: &[(&str, &str)]) -> Composer {
        let source = MemorySource::with_files(files.iter().copied());
        Composer::new(Arc::new(TemplateStore::new(source)))
    }

    #[test]
    fn test_chain_rejects_repeat() {
        let mut chain = LayoutChain::default();
        chain.enter("a").unwrap();
        chain.enter("b").unwrap();
        let err = chain.enter("a").unwrap_err();
        assert!(matches!(err, ViewError::LayoutCycle { ref name } if name == "a"));
        assert_eq!(chain.names(), ["a", "b"]);
    }

    #[test]
    fn test_default_layout_wraps_content() {
        let composer = composer(&[
            ("index.html", "  hello  "),
            ("layout/main.html", "<main>{{ __content__ }}</main>\n"),
        ]);
        let output = composer.render_string("index", ViewData::new()).unwrap();
        assert_eq!(output, "<main>hello</main>");
    }

    #[test]
    fn test_no_default_layout_renders_alone() {
        let composer = composer(&[("index.html", "hello\n")]).without_default_layout();
        assert_eq!(
            composer.render_string("index", ViewData::new()).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_missing_default_layout_is_not_found() {
        let composer = composer(&[("index.html", "hello")]);
        let err = composer.render_string("index", ViewData::new()).unwrap_err();
        assert!(matches!(err, ViewError::NotFound { ref name } if name == "layout/main"));
    }

    #[test]
    fn test_layout_stops_unless_it_declares_another() {
        let composer = composer(&[
            ("index.html", "{% layout \"layout/inner\" %}page"),
            ("layout/inner.html", "[{{ __content__ }}]"),
            ("layout/main.html", "never"),
        ]);
        assert_eq!(
            composer.render_string("index", ViewData::new()).unwrap(),
            "[page]"
        );
    }
}
