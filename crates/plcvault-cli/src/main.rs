//! `plcvault`: import PLC project exports into a versioned SQLite store.
//!
//! # Usage
//!
//! ```text
//! plcvault import exports/Line4.L5X --facility-id 2
//! plcvault tree Line4
//! plcvault history Line4 --vendor rockwell
//! plcvault restore db/plcvault_bak004.sqlite
//! ```
//!
//! Settings come from `<project root>/config/config.{toml,yaml,json}` (or
//! `--config`) and `PLCVAULT__*` environment variables; flags override both.

mod progress;
mod render;
mod restore;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use plcvault_core::{
  ImportConfig, ImportSummary, NoProgress, ProgressSink, Settings, Vendor,
  find_project_root,
};
use plcvault_store_sqlite::{
  DatabaseManager, HierarchyReader, TAG_DISPLAY_LIMIT, import_module,
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::progress::{TracingProgress, cancel_on_ctrl_c};

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "plcvault", version, about = "Versioned store for PLC project exports")]
struct Cli {
  /// Settings file; defaults to `<project root>/config/config`.
  #[arg(short, long, value_name = "FILE", global = true)]
  config: Option<PathBuf>,

  /// Project root; discovered from the current directory when omitted.
  #[arg(long, value_name = "DIR", global = true)]
  project_root: Option<PathBuf>,

  /// Working database file.
  #[arg(long, value_name = "FILE", global = true, env = "PLCVAULT_DB")]
  db: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Import one .L5X/.XML export.
  Import {
    file: PathBuf,

    /// Detect and validate only; write nothing.
    #[arg(long)]
    validate_only: bool,

    #[arg(long)]
    facility_id: Option<i64>,

    #[arg(long)]
    unit_id: Option<i64>,

    /// Accept a changed schema bundle and register it.
    #[arg(long)]
    allow_schema_drift: bool,

    #[arg(long)]
    skip_indexing: bool,

    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,
  },
  /// Report whether the database is still bound to its filename.
  Check,
  /// Write a rolling backup now.
  Backup,
  /// Promote a `<name>_bakNNN` backup to the working database.
  Restore { backup: PathBuf },
  /// Show imported controllers, or one controller's latest snapshot.
  Tree {
    controller: Option<String>,

    #[arg(long)]
    json: bool,
  },
  /// Show a controller's module version and deltas.
  History {
    controller: String,

    #[arg(long, default_value = "rockwell")]
    vendor: Vendor,

    #[arg(long)]
    json: bool,
  },
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let root = match &cli.project_root {
    Some(root) => root.clone(),
    None => {
      let cwd = std::env::current_dir().context("cannot read current directory")?;
      find_project_root(&cwd)
    }
  };
  let settings = match &cli.config {
    Some(file) => Settings::load_from(&file.to_string_lossy()),
    None => Settings::load(&root),
  }
  .context("failed to load settings")?;

  let db_path = cli
    .db
    .clone()
    .or_else(|| settings.database_path(&root))
    .unwrap_or_else(|| root.join("db").join("plcvault.sqlite"));
  let mut db = DatabaseManager::with_max_backups(settings.database.max_backups);

  match cli.command {
    Command::Import {
      file,
      validate_only,
      facility_id,
      unit_id,
      allow_schema_drift,
      skip_indexing,
      json,
    } => {
      let mut config = settings.import_config(&root);
      config.validate_only = validate_only;
      config.facility_id = facility_id;
      config.unit_id = unit_id;
      config.abort_on_schema_mismatch &= !allow_schema_drift;
      config.skip_indexing |= skip_indexing;

      let sink: Arc<dyn ProgressSink> =
        if json { Arc::new(NoProgress) } else { Arc::new(TracingProgress) };
      let result = import(&mut db, &db_path, &file, &config, sink).await;

      let summary = result.with_context(|| format!("import of {} failed", file.display()))?;
      if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
      } else {
        println!("{}", render::summary(&summary));
      }
    }

    Command::Check => {
      open(&mut db, &db_path).await?;
      let intact = db.validate_filename_integrity().await;
      close(&mut db).await;
      if !intact {
        bail!("{} is not bound to its current filename", db_path.display());
      }
      println!("{}: filename binding intact", db_path.display());
    }

    Command::Backup => {
      open(&mut db, &db_path).await?;
      let outcome = db.close_with_backup().await;
      if let Some(path) = &outcome.backup_path {
        println!("backup written to {}", path.display());
      }
      if let Some(warning) = outcome.warning {
        bail!("backup finished with warnings: {warning}");
      }
    }

    Command::Restore { backup } => {
      let restored = restore::restore_backup(&mut db, &backup).await?;
      close(&mut db).await;
      println!("restored {} as {}", backup.display(), restored.working.display());
      if let Some(dep) = restored.deprecated {
        println!("previous working database kept as {}", dep.display());
      }
    }

    Command::Tree { controller, json } => {
      let reader = reader(&db_path).await?;
      match controller {
        None => {
          let rows = reader.controllers().await?;
          if json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
          } else {
            print!("{}", render::listing(&rows));
          }
        }
        Some(name) => {
          let Some(tree) = reader.controller_tree(&name).await? else {
            bail!("controller {name:?} has not been imported");
          };
          if json {
            println!("{}", serde_json::to_string_pretty(&tree)?);
          } else {
            print!("{}", render::tree(&tree, TAG_DISPLAY_LIMIT));
          }
        }
      }
    }

    Command::History { controller, vendor, json } => {
      let reader = reader(&db_path).await?;
      let Some(history) = reader.module_history(&controller, vendor).await? else {
        bail!("no {vendor} module named {controller:?}");
      };
      if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
      } else {
        print!("{}", render::history(&history));
      }
    }
  }

  Ok(())
}

/// Run one import. A validate-only run opens an existing database for the
/// drift check and never creates a database or a backup.
async fn import(
  db: &mut DatabaseManager,
  db_path: &Path,
  file: &Path,
  config: &ImportConfig,
  sink: Arc<dyn ProgressSink>,
) -> Result<ImportSummary> {
  if !config.validate_only || db_path.exists() {
    open(db, db_path).await?;
  }
  let cancel = cancel_on_ctrl_c();
  let result = import_module(db, file, config, sink, &*cancel).await;
  if config.validate_only {
    let outcome = db.close().await;
    if let Some(warning) = outcome.warning {
      tracing::warn!(%warning, "database closed with warnings");
    }
  } else {
    close(db).await;
  }
  Ok(result?)
}

async fn open(db: &mut DatabaseManager, path: &Path) -> Result<()> {
  db.open(path)
    .await
    .with_context(|| format!("failed to open database at {}", path.display()))
}

async fn close(db: &mut DatabaseManager) {
  let outcome = db.close_with_backup().await;
  if let Some(warning) = outcome.warning {
    tracing::warn!(%warning, "database closed with warnings");
  }
}

async fn reader(path: &Path) -> Result<HierarchyReader> {
  if !path.exists() {
    bail!("no database at {}", path.display());
  }
  HierarchyReader::open(path)
    .await
    .with_context(|| format!("failed to open {} read-only", path.display()))
}
