//! Promote a rolling backup back to the working database.
//!
//! ```text
//!   plant_bak003.sqlite ──► plant.sqlite        (promoted)
//!   plant.sqlite        ──► plant_dep.sqlite    (deprecation snapshot,
//!                           or plant_dep_<YYYYmmddTHHMMSS>.sqlite if taken)
//! ```
//!
//! When a database is open, the chosen backup is first moved to
//! `<stem>_restoring<ext>` so the closing backup's retention pass cannot
//! prune it.
//!
//! If the promoted file cannot be opened or fails the filename check, the
//! renames are undone: the working file goes back to its backup name (or
//! `<stem>_bak999<ext>` if that is now taken) and the snapshot back to the
//! working name.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use plcvault_store_sqlite::DatabaseManager;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restored {
  pub working:    PathBuf,
  /// Where the previous working file was moved, if there was one.
  pub deprecated: Option<PathBuf>,
}

/// `(stem, ext)` of a `<stem>_bakNNN<ext>` file name.
pub fn split_backup_name(file_name: &str) -> Option<(&str, &str)> {
  let (base, ext) = match file_name.rfind('.') {
    Some(dot) if dot > 0 => file_name.split_at(dot),
    _ => (file_name, ""),
  };
  let split = base.len().checked_sub(3)?;
  let (stem, digits) = (base.get(..split)?, base.get(split..)?);
  if !digits.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  let stem = stem.strip_suffix("_bak")?;
  if stem.is_empty() { None } else { Some((stem, ext)) }
}

pub async fn restore_backup(db: &mut DatabaseManager, backup: &Path) -> Result<Restored> {
  let name = backup
    .file_name()
    .and_then(|n| n.to_str())
    .with_context(|| format!("{} has no file name", backup.display()))?;
  let (stem, ext) = split_backup_name(name)
    .ok_or_else(|| anyhow!("{name:?} is not a backup; expected <name>_bakNNN<.ext>"))?;
  if !backup.is_file() {
    bail!("backup {} does not exist", backup.display());
  }

  let dir = backup.parent().unwrap_or_else(|| Path::new("."));
  let working = dir.join(format!("{stem}{ext}"));

  // Closing prunes old backups, which may include the one being restored.
  let source = if db.is_open() {
    let staged = dir.join(format!("{stem}_restoring{ext}"));
    if staged.exists() {
      bail!("{} is in the way; move it before restoring", staged.display());
    }
    std::fs::rename(backup, &staged)
      .with_context(|| format!("could not stage {}", backup.display()))?;
    let outcome = db.close_with_backup().await;
    if let Some(warning) = outcome.warning {
      tracing::warn!(%warning, "current database closed with warnings");
    }
    staged
  } else {
    backup.to_path_buf()
  };

  let deprecated = if working.exists() {
    let mut dep = dir.join(format!("{stem}_dep{ext}"));
    if dep.exists() {
      let stamp = chrono::Local::now().format("%Y%m%dT%H%M%S");
      dep = dir.join(format!("{stem}_dep_{stamp}{ext}"));
    }
    if let Err(e) = std::fs::rename(&working, &dep) {
      unstage(&source, backup, stem, ext);
      return Err(e).with_context(|| {
        format!("could not keep {} as a deprecation snapshot", working.display())
      });
    }
    tracing::info!(from = %working.display(), to = %dep.display(), "previous working file kept");
    Some(dep)
  } else {
    None
  };

  if let Err(e) = std::fs::rename(&source, &working) {
    put_back(deprecated.as_deref(), &working);
    unstage(&source, backup, stem, ext);
    return Err(e).with_context(|| format!("could not promote {}", backup.display()));
  }

  let failure = match db.open(&working).await {
    Ok(()) => {
      if db.validate_filename_integrity().await {
        None
      } else {
        Some(anyhow!("filename integrity mismatch on restored database"))
      }
    }
    Err(e) => Some(anyhow::Error::new(e).context("failed to open restored database")),
  };

  if let Some(err) = failure {
    roll_back(db, backup, &working, stem, ext, deprecated.as_deref()).await;
    return Err(err.context("restore aborted and rolled back"));
  }

  tracing::info!(backup = %backup.display(), working = %working.display(), "backup restored");
  Ok(Restored { working, deprecated })
}

async fn roll_back(
  db: &mut DatabaseManager,
  backup: &Path,
  working: &Path,
  stem: &str,
  ext: &str,
  deprecated: Option<&Path>,
) {
  if db.is_open() {
    db.close_with_backup().await;
  }
  let revert = backup_slot(backup, stem, ext);
  if let Err(e) = std::fs::rename(working, &revert) {
    tracing::warn!(error = %e, path = %working.display(), "could not move restored file back");
  }
  put_back(deprecated, working);
}

/// The backup's own name, or `<stem>_bak999<ext>` once a newer close took it.
fn backup_slot(backup: &Path, stem: &str, ext: &str) -> PathBuf {
  if backup.exists() {
    backup.with_file_name(format!("{stem}_bak999{ext}"))
  } else {
    backup.to_path_buf()
  }
}

fn unstage(source: &Path, backup: &Path, stem: &str, ext: &str) {
  if source == backup {
    return;
  }
  let slot = backup_slot(backup, stem, ext);
  if let Err(e) = std::fs::rename(source, &slot) {
    tracing::warn!(error = %e, path = %source.display(), "could not return staged backup");
  }
}

fn put_back(deprecated: Option<&Path>, working: &Path) {
  let Some(dep) = deprecated else {
    return;
  };
  if working.exists() {
    return;
  }
  if let Err(e) = std::fs::rename(dep, working) {
    tracing::warn!(error = %e, path = %dep.display(), "could not restore deprecation snapshot");
  }
}
