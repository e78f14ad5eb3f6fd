//! Read-only providers of template source files

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Failures while listing or reading template sources
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read template root {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no such source file: {path}")]
    Missing { path: String },
}

/// A tree of template files addressed by slash-separated relative paths
pub trait TemplateSource: Send + Sync {
    /// Every file path in the tree, sorted
    fn list(&self) -> Result<Vec<String>, SourceError>;

    fn read(&self, path: &str) -> Result<String, SourceError>;
}

/// Templates under a directory on disk
#[derive(Debug, Clone)]
pub struct FileSystemSource {
    root: PathBuf,
}

impl FileSystemSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TemplateSource for FileSystemSource {
    fn list(&self) -> Result<Vec<String>, SourceError> {
        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();

        let mut paths = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|source| SourceError::Walk {
                root: self.root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                paths.push(normalize(&relative.to_string_lossy()));
            }
        }

        debug!(root = %self.root.display(), count = paths.len(), "listed template files");
        Ok(paths)
    }

    fn read(&self, path: &str) -> Result<String, SourceError> {
        let full = self.root.join(path);
        fs::read_to_string(&full).map_err(|source| SourceError::Io { path: full, source })
    }
}

/// Templates held in memory
///
/// Clones share the same files, so a clone handed to a store can still be
/// edited afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files(
        files: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        let source = Self::new();
        for (path, contents) in files {
            source.insert(path, contents);
        }
        source
    }

    /// Add or replace a file
    pub fn insert(&self, path: impl Into<String>, contents: impl Into<String>) -> &Self {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize(&path.into()), contents.into());
        self
    }

    pub fn remove(&self, path: &str) -> Option<String> {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&normalize(path))
    }
}

impl TemplateSource for MemorySource {
    fn list(&self) -> Result<Vec<String>, SourceError> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        Ok(files.keys().cloned().collect())
    }

    fn read(&self, path: &str) -> Result<String, SourceError> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        files.get(&normalize(path)).cloned().ok_or_else(|| SourceError::Missing {
            path: path.to_string(),
        })
    }
}

/// Forward slashes, no leading `./` or `/`
fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut trimmed = path.as_str();
    loop {
        if let Some(rest) = trimmed.strip_prefix("./") {
            trimmed = rest;
        } else if let Some(rest) = trimmed.strip_prefix('/') {
            trimmed = rest;
        } else {
            break;
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("layout\\main.html"), "layout/main.html");
        assert_eq!(normalize("./pages/index.html"), "pages/index.html");
        assert_eq!(normalize("/index.html"), "index.html");
    }

    #[test]
    fn test_memory_source_sorted_and_shared() {
        let source = MemorySource::with_files([("b.html", "B"), ("a.html", "A")]);
        let clone = source.clone();
        clone.insert("c.html", "C");

        assert_eq!(source.list().unwrap(), vec!["a.html", "b.html", "c.html"]);
        assert_eq!(source.read("c.html").unwrap(), "C");
    }

    #[test]
    fn test_memory_source_normalizes_every_path() {
        let source = MemorySource::with_files([("pages\\a.html", "A"), ("b.html", "B")]);
        assert_eq!(source.read("./pages/a.html").unwrap(), "A");

        assert_eq!(source.remove("pages\\a.html").as_deref(), Some("A"));
        assert_eq!(source.remove("./b.html").as_deref(), Some("B"));
        assert!(source.list().unwrap().is_empty());
    }

    #[test]
    fn test_memory_source_missing_file() {
        let source = MemorySource::new();
        assert!(matches!(
            source.read("nope.html"),
            Err(SourceError::Missing { .. })
        ));
    }

    #[test]
    fn test_file_system_source_walks_tree() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        fs::create_dir_all(dir.path().join("layout")).unwrap();
        fs::write(dir.path().join("layout/main.html"), "main").unwrap();
        fs::write(dir.path().join("index.html"), "index").unwrap();

        let source = FileSystemSource::new(dir.path());
        assert_eq!(source.list().unwrap(), vec!["index.html", "layout/main.html"]);
        assert_eq!(source.read("layout/main.html").unwrap(), "main");
    }

    #[test]
    fn test_file_system_source_missing_root() {
        let source = FileSystemSource::new("/definitely/not/a/template/root");
        assert!(matches!(source.list(), Err(SourceError::Walk { .. })));
    }
}
