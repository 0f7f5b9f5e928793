//! SQLite backend for plcvault.
//!
//! Owns the working database file: the [`DatabaseManager`] lifecycle
//! (filename binding, flush, rolling backups), the versioned import
//! pipeline in [`import_module`], and the read-only [`HierarchyReader`].
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. An import's writes run inside
//! a single `call` closure, which is what makes them one atomic unit.

mod backup;
mod encode;
mod hierarchy;
mod import;
mod lifecycle;
mod schema;
mod store;

pub mod error;

pub use backup::{BackupArtifact, backup_file_name, list_backups};
pub use error::{Error, ErrorKind, Result};
pub use hierarchy::{HierarchyReader, TAG_DISPLAY_LIMIT, TableCounts};
pub use import::import_module;
pub use lifecycle::{CloseOutcome, DatabaseManager, DEFAULT_MAX_BACKUPS};

#[cfg(test)]
mod tests;
