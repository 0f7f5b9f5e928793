//! Optional project configuration.
//!
//! Read from `<project_root>/config/config.{toml,yaml,json}` with
//! `PLCVAULT__SECTION__KEY` environment overrides. A missing file is not an
//! error; it yields [`Settings::default`].

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{ImportConfig, Result};

/// Marker file that pins the project root explicitly.
pub const PROJECT_MARKER: &str = ".plcvault-project";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub schemas:  SchemaSettings,
  pub database: DatabaseSettings,
  pub import:   ImportDefaults,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchemaSettings {
  /// Absolute, or relative to the project root.
  pub schema_root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
  /// Working database file, relative to the project root when not absolute.
  pub path:        Option<PathBuf>,
  pub max_backups: usize,
}

impl Default for DatabaseSettings {
  fn default() -> Self { Self { path: None, max_backups: 5 } }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImportDefaults {
  pub chunk_size_elements:      usize,
  pub large_file_mb_threshold:  u64,
  pub abort_on_schema_mismatch: bool,
  pub skip_indexing:            bool,
}

impl Default for ImportDefaults {
  fn default() -> Self {
    let base = ImportConfig::default();
    Self {
      chunk_size_elements:      base.chunk_size_elements,
      large_file_mb_threshold:  base.large_file_mb_threshold,
      abort_on_schema_mismatch: base.abort_on_schema_mismatch,
      skip_indexing:            base.skip_indexing,
    }
  }
}

impl Settings {
  /// Load settings for the project rooted at `project_root`.
  pub fn load(project_root: &Path) -> Result<Self> {
    let base = project_root.join("config").join("config");
    Self::load_from(&base.to_string_lossy())
  }

  /// Load settings from an explicit file. The extension selects the format;
  /// without one every supported extension is tried.
  pub fn load_from(file: &str) -> Result<Self> {
    let settings = ::config::Config::builder()
      .add_source(::config::File::with_name(file).required(false))
      .add_source(
        ::config::Environment::with_prefix("PLCVAULT")
          .prefix_separator("__")
          .separator("__"),
      )
      .build()?;
    Ok(settings.try_deserialize()?)
  }

  /// Absolute schema root honoring `schemas.schema_root`.
  pub fn schema_root(&self, project_root: &Path) -> PathBuf {
    match &self.schemas.schema_root {
      Some(root) if root.is_absolute() => root.clone(),
      Some(root) => project_root.join(root),
      None => project_root.join("schemas").join("json_schemas"),
    }
  }

  /// Working database path, if configured.
  pub fn database_path(&self, project_root: &Path) -> Option<PathBuf> {
    self.database.path.as_ref().map(|p| {
      if p.is_absolute() { p.clone() } else { project_root.join(p) }
    })
  }

  /// Build the per-call import configuration from these settings.
  pub fn import_config(&self, project_root: &Path) -> ImportConfig {
    ImportConfig {
      chunk_size_elements: self.import.chunk_size_elements,
      large_file_mb_threshold: self.import.large_file_mb_threshold,
      abort_on_schema_mismatch: self.import.abort_on_schema_mismatch,
      skip_indexing: self.import.skip_indexing,
      schema_root: self.schema_root(project_root),
      ..ImportConfig::default()
    }
  }
}

/// Walk upward from `start` to the project root.
///
/// Prefers a directory holding [`PROJECT_MARKER`], then one holding a
/// `schemas` directory. Falls back to `start`.
pub fn find_project_root(start: &Path) -> PathBuf {
  for dir in start.ancestors() {
    if dir.join(PROJECT_MARKER).exists() {
      return dir.to_path_buf();
    }
  }
  for dir in start.ancestors() {
    if dir.join("schemas").is_dir() {
      return dir.to_path_buf();
    }
  }
  start.to_path_buf()
}
