//! Rolling backup artifacts beside the working file.
//!
//! A backup of `<dir>/<stem><ext>` is `<dir>/<stem>_bakNNN<ext>` with a
//! three-digit ordinal in `001..=999`. The next ordinal is always one past the
//! highest present; gaps left by retention are never reused.

use std::path::{Path, PathBuf};

use rusqlite::DatabaseName;

use crate::{Error, Result};

pub const MAX_ORDINAL: u16 = 999;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BackupArtifact {
  pub ordinal: u16,
  pub path:    PathBuf,
}

struct NameParts {
  stem: String,
  ext:  String,
}

fn name_parts(working: &Path) -> Result<NameParts> {
  let stem = working
    .file_stem()
    .and_then(|s| s.to_str())
    .ok_or_else(|| Error::InvalidPath(working.to_path_buf()))?;
  let ext = working
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| format!(".{e}"))
    .unwrap_or_default();
  Ok(NameParts { stem: stem.to_owned(), ext })
}

fn backup_dir(working: &Path) -> &Path {
  match working.parent() {
    Some(p) if !p.as_os_str().is_empty() => p,
    _ => Path::new("."),
  }
}

/// `<stem>_bakNNN<ext>` for the given working file and ordinal.
pub fn backup_file_name(working: &Path, ordinal: u16) -> Result<String> {
  let NameParts { stem, ext } = name_parts(working)?;
  Ok(format!("{stem}_bak{ordinal:03}{ext}"))
}

/// Ordinal encoded in `file_name`, if it is a backup of `stem`/`ext`.
///
/// Matching ignores ASCII case.
fn parse_ordinal(file_name: &str, stem: &str, ext: &str) -> Option<u16> {
  let name = file_name.to_ascii_lowercase();
  let prefix = format!("{}_bak", stem.to_ascii_lowercase());
  let rest = name.strip_prefix(&prefix)?;
  let digits = rest.strip_suffix(&ext.to_ascii_lowercase())?;
  if digits.len() != 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  digits.parse().ok().filter(|n| (1..=MAX_ORDINAL).contains(n))
}

/// Existing backups of `working`, sorted by ordinal.
pub fn list_backups(working: &Path) -> Result<Vec<BackupArtifact>> {
  let NameParts { stem, ext } = name_parts(working)?;
  let dir = backup_dir(working);
  let entries = std::fs::read_dir(dir).map_err(|source| Error::ListBackups {
    path: dir.to_path_buf(),
    source,
  })?;

  let mut found: Vec<BackupArtifact> = entries
    .filter_map(|entry| entry.ok())
    .filter_map(|entry| {
      let name = entry.file_name();
      let ordinal = parse_ordinal(name.to_str()?, &stem, &ext)?;
      Some(BackupArtifact { ordinal, path: entry.path() })
    })
    .collect();
  found.sort();
  Ok(found)
}

pub fn next_ordinal(working: &Path, existing: &[BackupArtifact]) -> Result<u16> {
  let next = existing.iter().map(|b| b.ordinal).max().unwrap_or(0) + 1;
  if next > MAX_ORDINAL {
    return Err(Error::BackupOrdinalsExhausted(working.to_path_buf()));
  }
  Ok(next)
}

/// Delete the lowest ordinals until at most `keep` remain.
///
/// Deletion failures are logged and skipped. Returns the deleted paths.
pub fn prune(mut backups: Vec<BackupArtifact>, keep: usize) -> Vec<PathBuf> {
  backups.sort();
  let excess = backups.len().saturating_sub(keep);
  let mut removed = Vec::new();
  for old in backups.into_iter().take(excess) {
    match std::fs::remove_file(&old.path) {
      Ok(()) => {
        tracing::info!(path = %old.path.display(), "removed old backup");
        removed.push(old.path);
      }
      Err(e) => {
        tracing::warn!(path = %old.path.display(), error = %e, "failed to remove old backup");
      }
    }
  }
  removed
}

/// Snapshot the live database to the next ordinal, then apply retention.
pub async fn create_rolling_backup(
  conn: &tokio_rusqlite::Connection,
  working: &Path,
  keep: usize,
) -> Result<PathBuf> {
  let mut existing = list_backups(working)?;
  let ordinal = next_ordinal(working, &existing)?;
  let dst = backup_dir(working).join(backup_file_name(working, ordinal)?);

  let target = dst.clone();
  conn
    .call(move |conn| {
      conn.backup(DatabaseName::Main, &target, None)?;
      Ok(())
    })
    .await?;
  tracing::info!(path = %dst.display(), ordinal, "database backup written");

  existing.push(BackupArtifact { ordinal, path: dst.clone() });
  prune(existing, keep);
  Ok(dst)
}
