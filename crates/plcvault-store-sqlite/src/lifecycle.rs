//! The working database file's lifecycle.
//!
//! ```text
//!   Closed ──open──► Open ──close_with_backup──► Closed
//!     │                │
//!     └─ filename      └─ flush ─► rolling backup ─► retention ─► close
//!        mismatch ─► Closed (error)
//! ```
//!
//! `close` skips the backup steps, for callers that only read.
//!
//! A file is bound to its base filename on first open. Reopening it under any
//! other name is refused, so backups can never be confused with the working
//! file.

use std::path::{Path, PathBuf};

use rusqlite::{OptionalExtension, params};
use tokio_rusqlite::Connection;

use crate::{
  Error, Result,
  backup::create_rolling_backup,
  schema::{CONNECTION_PRAGMAS, METADATA, REGISTERED_FILENAME_KEY, SCHEMA},
};

/// Backups kept beside the working file unless configured otherwise.
pub const DEFAULT_MAX_BACKUPS: usize = 5;

/// What a close did. Close never fails; problems become the warning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseOutcome {
  pub backup_path: Option<PathBuf>,
  /// Every step's failure, joined with `"; "`.
  pub warning:     Option<String>,
}

struct OpenDatabase {
  path: PathBuf,
  conn: Connection,
}

pub struct DatabaseManager {
  state:       Option<OpenDatabase>,
  max_backups: usize,
}

impl Default for DatabaseManager {
  fn default() -> Self { Self::new() }
}

impl DatabaseManager {
  pub fn new() -> Self { Self { state: None, max_backups: DEFAULT_MAX_BACKUPS } }

  /// Keep at most `max_backups` backups; never fewer than one.
  pub fn with_max_backups(max_backups: usize) -> Self {
    Self { state: None, max_backups: max_backups.max(1) }
  }

  pub fn is_open(&self) -> bool { self.state.is_some() }

  pub fn path(&self) -> Option<&Path> { self.state.as_ref().map(|s| s.path.as_path()) }

  /// The live connection, shared with the import engine.
  pub fn connection(&self) -> Result<&Connection> {
    self.state.as_ref().map(|s| &s.conn).ok_or(Error::NotOpen)
  }

  /// Open (or create) the working file and bind or check its filename.
  pub async fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
    if let Some(open) = &self.state {
      return Err(Error::AlreadyOpen(open.path.clone()));
    }

    let path = path.as_ref().to_path_buf();
    let file_name = base_name(&path)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent).map_err(|source| Error::CreateDir {
        path: parent.to_path_buf(),
        source,
      })?;
    }

    let conn = Connection::open(&path).await?;
    if let Err(e) = initialize(&conn, file_name).await {
      if let Err(close) = conn.close().await {
        tracing::warn!(error = %close, "failed to close rejected database");
      }
      return Err(e);
    }

    tracing::info!(path = %path.display(), "database opened");
    self.state = Some(OpenDatabase { path, conn });
    Ok(())
  }

  /// True iff a database is open and its recorded filename equals the
  /// current base name. Never fails.
  pub async fn validate_filename_integrity(&self) -> bool {
    let Some(open) = &self.state else {
      return false;
    };
    let Ok(expected) = base_name(&open.path) else {
      return false;
    };
    match open.conn.call(|conn| Ok(registered_filename(conn)?)).await {
      Ok(registered) => registered.as_deref() == Some(expected.as_str()),
      Err(e) => {
        tracing::warn!(error = %e, "filename integrity check failed");
        false
      }
    }
  }

  /// Flush, back up, prune and close. A no-op when nothing is open.
  ///
  /// The connection is closed whether or not the earlier steps succeed.
  pub async fn close_with_backup(&mut self) -> CloseOutcome { self.shut_down(true).await }

  /// Flush and close without writing a backup.
  pub async fn close(&mut self) -> CloseOutcome { self.shut_down(false).await }

  async fn shut_down(&mut self, with_backup: bool) -> CloseOutcome {
    let Some(open) = self.state.take() else {
      return CloseOutcome::default();
    };
    let mut warnings = Vec::new();

    if let Err(e) = flush(&open.conn).await {
      tracing::error!(error = %e, "flushing pending operations failed");
      warnings.push(format!("flush failed: {e}"));
    }

    let backup_path = if with_backup {
      match create_rolling_backup(&open.conn, &open.path, self.max_backups).await {
        Ok(path) => Some(path),
        Err(e) => {
          tracing::error!(error = %e, "backup failed");
          warnings.push(format!("backup failed: {e}"));
          None
        }
      }
    } else {
      None
    };

    if let Err(e) = open.conn.close().await {
      tracing::error!(error = %e, "closing database failed");
      warnings.push(format!("close failed: {e}"));
    }
    tracing::info!(path = %open.path.display(), "database closed");

    CloseOutcome {
      backup_path,
      warning: (!warnings.is_empty()).then(|| warnings.join("; ")),
    }
  }
}

fn base_name(path: &Path) -> Result<String> {
  path
    .file_name()
    .and_then(|n| n.to_str())
    .map(str::to_owned)
    .ok_or_else(|| Error::InvalidPath(path.to_path_buf()))
}

fn registered_filename(conn: &rusqlite::Connection) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT value FROM app_metadata WHERE key = ?1",
      params![REGISTERED_FILENAME_KEY],
      |r| r.get(0),
    )
    .optional()
}

/// Pragmas, metadata table and filename binding; core tables only once the
/// binding holds.
async fn initialize(conn: &Connection, file_name: String) -> Result<()> {
  let actual = file_name.clone();
  let registered: Option<String> = conn
    .call(move |conn| {
      conn.execute_batch(CONNECTION_PRAGMAS)?;
      conn.execute_batch(METADATA)?;
      let registered = registered_filename(conn)?;
      if registered.is_none() {
        conn.execute(
          "INSERT INTO app_metadata (key, value) VALUES (?1, ?2)",
          params![REGISTERED_FILENAME_KEY, file_name],
        )?;
      }
      Ok(registered)
    })
    .await?;

  if let Some(registered) = registered {
    if registered != actual {
      tracing::error!(%registered, %actual, "database filename does not match its binding");
      return Err(Error::FilenameMismatch { registered, actual });
    }
  }

  conn
    .call(|conn| {
      conn.execute_batch(SCHEMA)?;
      Ok(())
    })
    .await?;
  Ok(())
}

/// Commit anything pending and fold the WAL back into the main file.
async fn flush(conn: &Connection) -> Result<()> {
  conn
    .call(|conn| {
      if !conn.is_autocommit() {
        conn.execute_batch("COMMIT;")?;
      }
      conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
      Ok(())
    })
    .await?;
  Ok(())
}
