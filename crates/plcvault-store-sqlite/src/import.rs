//! The import pipeline.
//!
//! ```text
//!   path ─► extension gate ─► read (lossy UTF-8) ─► parse ─► vendor
//!        ─► schema bundle + header validation ─► registry drift check
//!        ─► canonical form + hash ─► decompose
//!        ─► one transaction: register │ dedup │ import │ controller
//!                            │ module upsert │ programs │ tags │ AOIs
//!        ─► secondary indexes (outside the transaction)
//! ```
//!
//! Cancellation is observed before the transaction only; once writing starts
//! the import either commits or rolls back as a whole.

use std::{path::Path, sync::Arc, time::Instant};

use plcvault_core::{
  CancelProbe, Error as CoreError, ImportConfig, ImportPhase, ImportSummary,
  ProgressSink, ensure_supported_extension,
};
use plcvault_l5x::{content_hash, decompose, parse};
use plcvault_schema::SchemaBundle;
use tokio_rusqlite::Connection;

use crate::{
  DatabaseManager, Error, Result,
  schema::SECONDARY_INDEXES,
  store::{self, ImportPlan, SchemaRegistration, TxOutcome},
};

const MIB: u64 = 1024 * 1024;

/// Import one controller export into the open database.
pub async fn import_module(
  db: &DatabaseManager,
  file_path: &Path,
  config: &ImportConfig,
  progress: Arc<dyn ProgressSink>,
  cancel: &dyn CancelProbe,
) -> Result<ImportSummary> {
  let started = Instant::now();
  ensure_supported_extension(file_path)?;
  // A validate-only run may go ahead without a database; it then skips the
  // registry drift check.
  let conn = match db.connection() {
    Ok(conn) => Some(conn),
    Err(Error::NotOpen) if config.validate_only => None,
    Err(e) => return Err(e),
  };
  let filename = file_path
    .file_name()
    .and_then(|n| n.to_str())
    .map(str::to_owned)
    .ok_or_else(|| Error::InvalidPath(file_path.to_path_buf()))?;

  progress.report(ImportPhase::Read);
  let bytes = tokio::fs::read(file_path).await.map_err(|source| Error::ReadFile {
    path: file_path.to_path_buf(),
    source,
  })?;
  let size = bytes.len() as u64;
  if size > config.large_file_mb_threshold.saturating_mul(MIB) {
    tracing::info!(
      file = %filename,
      size_mib = size / MIB,
      threshold_mib = config.large_file_mb_threshold,
      "large import"
    );
  }
  let text = String::from_utf8_lossy(&bytes);
  ensure_not_cancelled(cancel)?;

  let doc = parse(&text)?;
  let vendor = doc
    .vendor()
    .ok_or_else(|| CoreError::UnrecognizedVendor(doc.root.name.clone()))?;
  tracing::debug!(file = %filename, %vendor, "vendor detected");

  progress.report(ImportPhase::Validate);
  let header = doc.header();
  let bundle = SchemaBundle::load(&config.schema_root, vendor)?;
  bundle.validate(&header)?;
  let registration = match conn {
    Some(conn) => check_registry(conn, &bundle, config.abort_on_schema_mismatch).await?,
    None => None,
  };
  ensure_not_cancelled(cancel)?;

  if config.validate_only {
    let controller = header.controller_name.unwrap_or_else(|| "Unknown".to_owned());
    tracing::info!(file = %filename, %vendor, %controller, "validation passed");
    return Ok(ImportSummary {
      duration_ms: elapsed_ms(started),
      ..ImportSummary::empty(controller, None)
    });
  }

  let conn = conn.ok_or(Error::NotOpen)?;

  progress.report(ImportPhase::Canonicalize);
  let canonical = doc.canonical();
  let hash = content_hash(&canonical);
  let parts = decompose(&doc)?;
  let controller_name = parts.controller.name.clone();
  ensure_not_cancelled(cancel)?;

  let plan = ImportPlan {
    filename: filename.clone(),
    vendor,
    canonical,
    hash,
    parts,
    facility_id: config.facility_id,
    unit_id: config.unit_id,
    registration,
    chunk_size: config.chunk_size_elements,
  };
  let sink = Arc::clone(&progress);
  let outcome = conn
    .call(move |conn| Ok(store::write_import(conn, plan, sink.as_ref())?))
    .await
    .map_err(Error::Transaction)?;

  let summary = match outcome {
    TxOutcome::Existing { import_id } => {
      tracing::info!(file = %filename, import_id, "already imported; nothing written");
      ImportSummary {
        duration_ms: elapsed_ms(started),
        ..ImportSummary::empty(controller_name, Some(import_id))
      }
    }
    TxOutcome::Committed { import_id, module, programs, routines, tags, aois } => {
      if !config.skip_indexing {
        build_secondary_indexes(conn).await;
      }
      let summary = ImportSummary {
        controller_name,
        program_count: programs,
        routine_count: routines,
        tag_count: tags,
        aoi_count: aois,
        import_id: Some(import_id),
        duration_ms: elapsed_ms(started),
      };
      tracing::info!(
        file = %filename,
        import_id,
        controller = %summary.controller_name,
        module_id = module.module_id(),
        version = module.version(),
        programs,
        routines,
        tags,
        aois,
        duration_ms = summary.duration_ms,
        "import committed"
      );
      summary
    }
  };
  Ok(summary)
}

fn ensure_not_cancelled(cancel: &dyn CancelProbe) -> Result<()> {
  if cancel.is_cancelled() {
    tracing::info!("import cancelled before writing");
    return Err(Error::Cancelled);
  }
  Ok(())
}

fn elapsed_ms(started: Instant) -> u64 {
  u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Compare the bundle against the newest registered hash for its vendor.
///
/// Returns the registration to write inside the import transaction, if any.
async fn check_registry(
  conn: &Connection,
  bundle: &SchemaBundle,
  abort_on_mismatch: bool,
) -> Result<Option<SchemaRegistration>> {
  let vendor = bundle.vendor;
  let registered = conn
    .call(move |conn| Ok(store::latest_schema_hash(conn, vendor)?))
    .await?;

  let registration = SchemaRegistration {
    vendor,
    version: bundle.version.clone(),
    schema_path: bundle.registry_path(),
    hash: bundle.hash.clone(),
  };

  match registered {
    None => Ok(Some(registration)),
    Some(hash) if hash == bundle.hash => Ok(None),
    Some(hash) if abort_on_mismatch => Err(Error::SchemaDrift {
      vendor,
      registered: hash,
      current: bundle.hash.clone(),
    }),
    Some(hash) => {
      tracing::warn!(
        %vendor,
        registered = %hash,
        current = %bundle.hash,
        "schema drift tolerated; registering current bundle"
      );
      Ok(Some(registration))
    }
  }
}

async fn build_secondary_indexes(conn: &Connection) {
  let result = conn
    .call(|conn| {
      conn.execute_batch(SECONDARY_INDEXES)?;
      Ok(())
    })
    .await;
  if let Err(e) = result {
    tracing::warn!(error = %e, "secondary index build failed");
  }
}
