//! Error type for `plcvault-store-sqlite`.

use std::path::PathBuf;

use plcvault_core::Vendor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] plcvault_core::Error),

  #[error("xml error: {0}")]
  Xml(#[from] plcvault_l5x::Error),

  #[error("schema error: {0}")]
  Schema(#[from] plcvault_schema::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// The import transaction failed and every write in it was rolled back.
  #[error("import transaction rolled back: {0}")]
  Transaction(#[source] tokio_rusqlite::Error),

  #[error("cannot read {}: {source}", path.display())]
  ReadFile {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("cannot create directory {}: {source}", path.display())]
  CreateDir {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(
    "registered {vendor} schema hash {registered} differs from current bundle \
     hash {current}; re-register the schema or disable the mismatch abort"
  )]
  SchemaDrift {
    vendor:     Vendor,
    registered: String,
    current:    String,
  },

  #[error("import cancelled")]
  Cancelled,

  #[error("a database is already open: {}", .0.display())]
  AlreadyOpen(PathBuf),

  #[error("no database is open")]
  NotOpen,

  #[error("path has no usable file name: {}", .0.display())]
  InvalidPath(PathBuf),

  /// The file was renamed since it was first bound.
  #[error(
    "database file was renamed: registered as {registered:?}, opened as \
     {actual:?}"
  )]
  FilenameMismatch { registered: String, actual: String },

  #[error("backup ordinals exhausted for {}", .0.display())]
  BackupOrdinalsExhausted(PathBuf),

  #[error("cannot list backups in {}: {source}", path.display())]
  ListBackups {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

/// Coarse classification a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Bad path, extension, malformed XML or unknown vendor.
  Input,
  /// Schema bundle missing or invalid, projection rejected, or drift.
  Validation,
  /// Database write failure; nothing was persisted.
  Transaction,
  /// Open, close, binding or backup problems.
  Lifecycle,
  Cancelled,
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::Core(plcvault_core::Error::Config(_)) => ErrorKind::Lifecycle,
      Error::Core(_) | Error::Xml(_) | Error::ReadFile { .. } => ErrorKind::Input,
      Error::Schema(_) | Error::SchemaDrift { .. } => ErrorKind::Validation,
      Error::Transaction(_) => ErrorKind::Transaction,
      Error::Cancelled => ErrorKind::Cancelled,
      Error::Database(_)
      | Error::CreateDir { .. }
      | Error::AlreadyOpen(_)
      | Error::NotOpen
      | Error::InvalidPath(_)
      | Error::FilenameMismatch { .. }
      | Error::BackupOrdinalsExhausted(_)
      | Error::ListBackups { .. }
      | Error::DateParse(_) => ErrorKind::Lifecycle,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
