//! Curator configuration, persisted as TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable configuration.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::classes::RebuildOptions;
use crate::mapping::MapperOptions;
use crate::store::{PagingOptions, Vocabulary};

/// Errors from loading or saving configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(curator::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}")]
    #[diagnostic(
        code(curator::config::parse),
        help("Check the TOML syntax in the config file: {message}")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(curator::config::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratorConfig {
    /// Directory holding the database file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Predicate of direct class membership.
    #[serde(default = "default_type_uri")]
    pub type_uri: String,
    /// Predicate of the class hierarchy.
    #[serde(default = "default_subclass_uri")]
    pub subclass_uri: String,
    /// Tag marking predicate nodes.
    #[serde(default = "default_predicate_tag")]
    pub predicate_tag: String,
    #[serde(default = "default_max_mapping_depth")]
    pub max_mapping_depth: usize,
    #[serde(default = "default_rebuild_batch_size")]
    pub rebuild_batch_size: usize,
    #[serde(default = "default_progress_step")]
    pub progress_step: usize,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_type_uri() -> String {
    "rdf:type".into()
}
fn default_subclass_uri() -> String {
    "rdfs:subClassOf".into()
}
fn default_predicate_tag() -> String {
    "property".into()
}
fn default_max_mapping_depth() -> usize {
    32
}
fn default_rebuild_batch_size() -> usize {
    64
}
fn default_progress_step() -> usize {
    100
}
fn default_page_size() -> usize {
    20
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            type_uri: default_type_uri(),
            subclass_uri: default_subclass_uri(),
            predicate_tag: default_predicate_tag(),
            max_mapping_depth: default_max_mapping_depth(),
            rebuild_batch_size: default_rebuild_batch_size(),
            progress_step: default_progress_step(),
            default_page_size: default_page_size(),
        }
    }
}

impl CuratorConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    /// Load from `path` when given, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn parse(content: &str, path: &Path) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save as TOML.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn vocabulary(&self) -> Vocabulary {
        Vocabulary {
            type_uri: self.type_uri.clone(),
            subclass_uri: self.subclass_uri.clone(),
            predicate_tag: self.predicate_tag.clone(),
        }
    }

    pub fn mapper_options(&self) -> MapperOptions {
        MapperOptions {
            max_depth: self.max_mapping_depth,
        }
    }

    pub fn rebuild_options(&self) -> RebuildOptions {
        RebuildOptions {
            batch_size: self.rebuild_batch_size,
            progress_step: self.progress_step,
        }
    }

    /// First page with the configured size.
    pub fn paging(&self, page_number: usize) -> PagingOptions {
        PagingOptions::new(page_number, self.default_page_size)
    }
}
