//! Error type for `plcvault-schema`.

use std::path::PathBuf;

use plcvault_core::Vendor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Every missing bundle file is listed, one per line.
  #[error(
    "schema not found for vendor '{vendor}'. Missing files:\n{}",
    .missing.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join("\n")
  )]
  MissingFiles { vendor: Vendor, missing: Vec<PathBuf> },

  #[error("failed to read schema file {}: {source}", .path.display())]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse schema file {}: {source}", .path.display())]
  Json {
    path:   PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("schema bundle for vendor '{vendor}' is itself invalid: {reason}")]
  InvalidSchema { vendor: Vendor, reason: String },

  #[error("schema validation failed: {}", .0.join("; "))]
  Validation(Vec<String>),

  #[error("failed to build validation projection: {0}")]
  Projection(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
