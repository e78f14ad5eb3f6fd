//! Composer configuration, loaded from TOML or built in code
//!
//! ```toml
//! root = "templates"
//! extension = ".html"
//! default_layout = "layout/main"
//! reload = true
//! debug = false
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::parser::WhitespaceOptions;

/// Errors that can occur when loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

pub const DEFAULT_EXTENSION: &str = ".html";
pub const DEFAULT_LAYOUT: &str = "layout/main";

/// Settings for the template store and the layout resolution loop
#[derive(Debug, Clone, PartialEq)]
pub struct ComposerConfig {
    /// Directory holding the template tree
    pub root: PathBuf,
    /// Only files ending in this are templates
    pub extension: String,
    /// Layout applied when a render declares none; `None` disables it
    pub default_layout: Option<String>,
    /// Recompile every template before each render
    pub reload: bool,
    /// Log each template as it is compiled
    pub debug: bool,
    pub whitespace: WhitespaceOptions,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("templates"),
            extension: DEFAULT_EXTENSION.to_string(),
            default_layout: Some(DEFAULT_LAYOUT.to_string()),
            reload: false,
            debug: false,
            whitespace: WhitespaceOptions::default(),
        }
    }
}

/// TOML structure for deserializing configuration
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    root: Option<PathBuf>,
    extension: Option<String>,
    default_layout: Option<String>,
    reload: Option<bool>,
    debug: Option<bool>,
    trim_blocks: Option<bool>,
    lstrip_blocks: Option<bool>,
}

impl ComposerConfig {
    /// Load configuration from a TOML file
    ///
    /// A relative `root` is taken relative to the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_str(&content)?;
        if config.root.is_relative() {
            if let Some(dir) = path.parent() {
                config.root = dir.join(&config.root);
            }
        }
        Ok(config)
    }

    /// Load configuration from a TOML string; missing keys keep their defaults
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let parsed: TomlConfig = toml::from_str(content)?;
        let defaults = Self::default();

        Ok(ComposerConfig {
            root: parsed.root.unwrap_or(defaults.root),
            extension: parsed.extension.unwrap_or(defaults.extension),
            default_layout: match parsed.default_layout {
                Some(name) => layout_name(name),
                None => defaults.default_layout,
            },
            reload: parsed.reload.unwrap_or(defaults.reload),
            debug: parsed.debug.unwrap_or(defaults.debug),
            whitespace: WhitespaceOptions {
                trim_blocks: parsed
                    .trim_blocks
                    .unwrap_or(defaults.whitespace.trim_blocks),
                lstrip_blocks: parsed
                    .lstrip_blocks
                    .unwrap_or(defaults.whitespace.lstrip_blocks),
            },
        })
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Set the default layout; an empty name disables it
    pub fn with_default_layout(mut self, name: impl Into<String>) -> Self {
        self.default_layout = layout_name(name.into());
        self
    }

    pub fn without_default_layout(mut self) -> Self {
        self.default_layout = None;
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
}

fn layout_name(name: String) -> Option<String> {
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
