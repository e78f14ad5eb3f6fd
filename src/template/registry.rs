//! Template store: compiles a source tree and renders by name

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tracing::{debug, info};

use crate::config::ComposerConfig;
use crate::error::ViewError;
use crate::parser::WhitespaceOptions;
use crate::renderer::{render_nodes, BufferPool, ExecContext, ViewData};
use crate::tags::TagRegistry;

use super::scope::LayoutScope;
use super::source::{FileSystemSource, TemplateSource};
use super::{logical_name, Template};

/// Compiled templates by logical name
pub type TemplateTable = HashMap<String, Arc<Template>>;

/// Loads, compiles and renders the templates of one source
///
/// The table sits behind a read/write lock: renders share it, a load
/// holds it exclusively and replaces it wholesale.
pub struct TemplateStore {
    source: Box<dyn TemplateSource>,
    extension: String,
    reload: bool,
    debug: bool,
    whitespace: WhitespaceOptions,
    registry: TagRegistry,
    table: RwLock<Option<TemplateTable>>,
    globals: RwLock<ViewData>,
    pool: BufferPool,
}

impl TemplateStore {
    /// A store over `source` with default settings
    pub fn new(source: impl TemplateSource + 'static) -> Self {
        Self::with_config(source, &ComposerConfig::default())
    }

    /// A store over the configured root directory
    pub fn from_config(config: &ComposerConfig) -> Self {
        Self::with_config(FileSystemSource::new(&config.root), config)
    }

    pub fn with_config(source: impl TemplateSource + 'static, config: &ComposerConfig) -> Self {
        Self {
            source: Box::new(source),
            extension: config.extension.clone(),
            reload: config.reload,
            debug: config.debug,
            whitespace: config.whitespace,
            registry: TagRegistry::default(),
            table: RwLock::new(None),
            globals: RwLock::new(ViewData::new()),
            pool: BufferPool::new(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_whitespace(mut self, whitespace: WhitespaceOptions) -> Self {
        self.whitespace = whitespace;
        self
    }

    /// Replace the tag set used to compile templates
    pub fn with_registry(mut self, registry: TagRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn reload_enabled(&self) -> bool {
        self.reload
    }

    /// Compile every template and swap in the new table
    ///
    /// All or nothing: on the first failure the previous table stays.
    pub fn load(&self) -> Result<(), ViewError> {
        let mut table = self.write_table();
        *table = Some(self.compile_all()?);
        Ok(())
    }

    fn compile_all(&self) -> Result<TemplateTable, ViewError> {
        let mut table = TemplateTable::new();

        for path in self.source.list()? {
            let Some(name) = logical_name(&path, &self.extension) else {
                continue;
            };
            let text = self.source.read(&path)?;
            let template = Template::compile(&name, &text, &self.registry, self.whitespace)
                .map_err(|cause| ViewError::Compile {
                    path: path.clone(),
                    cause,
                })?;
            if self.debug {
                info!(name = %name, path = %path, "parsed template");
            }
            table.insert(name, Arc::new(template));
        }

        debug!(count = table.len(), "loaded templates");
        Ok(table)
    }

    /// Load if reloading on every render or if never loaded
    fn ensure_loaded(&self) -> Result<(), ViewError> {
        if self.reload {
            return self.load();
        }
        let loaded = self.read_table().is_some();
        if !loaded {
            let mut table = self.write_table();
            if table.is_none() {
                *table = Some(self.compile_all()?);
            }
        }
        Ok(())
    }

    /// Run `f` against the current table, holding the read lock throughout
    pub fn with_table<R>(
        &self,
        f: impl FnOnce(&TemplateTable) -> Result<R, ViewError>,
    ) -> Result<R, ViewError> {
        self.ensure_loaded()?;
        let guard = self.read_table();
        let empty = TemplateTable::new();
        f(guard.as_ref().unwrap_or(&empty))
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<Template>, ViewError> {
        self.with_table(|table| {
            table
                .get(name)
                .cloned()
                .ok_or_else(|| ViewError::not_found(name))
        })
    }

    /// Logical names of all templates, sorted
    pub fn names(&self) -> Result<Vec<String>, ViewError> {
        self.with_table(|table| {
            let mut names: Vec<String> = table.keys().cloned().collect();
            names.sort();
            Ok(names)
        })
    }

    /// Make `value` visible to every render; view data shadows it
    pub fn add_global(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.globals
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value.into());
    }

    /// Render one template on its own, without layouts
    pub fn render_bytes(&self, name: &str, data: &ViewData) -> Result<Vec<u8>, ViewError> {
        self.with_table(|table| self.execute(table, name, data, None))
            .map(String::into_bytes)
    }

    /// Execute a template from `table` against `data`
    pub fn execute(
        &self,
        table: &TemplateTable,
        name: &str,
        data: &ViewData,
        scope: Option<&mut dyn LayoutScope>,
    ) -> Result<String, ViewError> {
        let template = table.get(name).ok_or_else(|| ViewError::not_found(name))?;
        let globals = self.globals.read().unwrap_or_else(PoisonError::into_inner);

        let mut ctx = ExecContext::new(data, &globals, table, &self.pool);
        if let Some(scope) = scope {
            ctx = ctx.with_scope(scope);
        }

        let mut out = String::new();
        render_nodes(&template.nodes, &mut ctx, &mut out)?;
        Ok(out)
    }

    fn read_table(&self) -> RwLockReadGuard<'_, Option<TemplateTable>> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_table(&self) -> RwLockWriteGuard<'_, Option<TemplateTable>> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::MemorySource;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn render(store: &TemplateStore, name: &str) -> Result<String, ViewError> {
        let bytes = store.render_bytes(name, &ViewData::new())?;
        Ok(String::from_utf8(bytes).expect("Should be UTF-8"))
    }

    #[test]
    fn test_load_filters_by_extension() {
        let source = MemorySource::with_files([
            ("index.html", "home"),
            ("layout/main.html", "main"),
            ("README.md", "not a template"),
            (".html", "too short"),
        ]);
        let store = TemplateStore::new(source);
        store.load().expect("Should load");
        assert_eq!(store.names().unwrap(), vec!["index", "layout/main"]);
    }

    #[test]
    fn test_lookup_unknown_name() {
        let store = TemplateStore::new(MemorySource::with_files([("index.html", "home")]));
        let err = store.lookup("missing").unwrap_err();
        assert!(matches!(err, ViewError::NotFound { ref name } if name == "missing"));
    }

    #[test]
    fn test_render_bytes_loads_lazily() {
        let store = TemplateStore::new(MemorySource::with_files([("index.html", "home")]));
        assert_eq!(render(&store, "index").unwrap(), "home");
    }

    #[test]
    fn test_compile_error_names_path() {
        let store = TemplateStore::new(MemorySource::with_files([
            ("good.html", "fine"),
            ("pages/bad.html", "{% block %}{% endblock %}"),
        ]));
        let err = store.load().unwrap_err();
        match err {
            ViewError::Compile { path, cause } => {
                assert_eq!(path, "pages/bad.html");
                assert!(cause.to_string().contains("requires an identifier"));
            }
            other => panic!("Expected Compile, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_load_keeps_previous_table() {
        let source = MemorySource::with_files([("index.html", "v1")]);
        let store = TemplateStore::new(source.clone());
        store.load().expect("Should load");

        source.insert("index.html", "v2");
        source.insert("broken.html", "{{ unclosed");
        assert!(store.load().is_err());

        assert_eq!(render(&store, "index").unwrap(), "v1");
        assert!(store.lookup("broken").is_err());
    }

    #[test]
    fn test_globals_are_shadowed_by_data() {
        let store = TemplateStore::new(MemorySource::with_files([(
            "index.html",
            "{{ site }}/{{ title }}",
        )]));
        store.add_global("site", "example.org");
        store.add_global("title", "global");

        let data: ViewData = [("title".to_string(), json!("page"))].into_iter().collect();
        let bytes = store.render_bytes("index", &data).expect("Should render");
        assert_eq!(String::from_utf8(bytes).unwrap(), "example.org/page");
    }

    #[test]
    fn test_render_error_propagates() {
        let store = TemplateStore::new(MemorySource::with_files([("index.html", "{{ 1 / 0 }}")]));
        let err = render(&store, "index").unwrap_err();
        assert!(matches!(err, ViewError::Render(_)));
    }

    #[test]
    fn test_custom_extension() {
        let store = TemplateStore::new(MemorySource::with_files([
            ("index.tpl", "tpl"),
            ("index.html", "html"),
        ]))
        .with_extension(".tpl");
        assert_eq!(render(&store, "index").unwrap(), "tpl");
    }
}
