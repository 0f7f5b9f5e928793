//! Error types for `plcvault-core`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(
    "unrecognized PLC vendor format (root element `{0}`); register a schema \
     for this vendor"
  )]
  UnrecognizedVendor(String),

  #[error("unknown vendor identifier: {0:?}")]
  UnknownVendorId(String),

  #[error("file must be a .L5X or .XML export: {}", .0.display())]
  UnsupportedExtension(PathBuf),

  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
