//! Synchronous statements run on the database thread.
//!
//! [`write_import`] is the whole import transaction. It is called from a
//! single `tokio_rusqlite` closure: every insert and update below either
//! commits together or is rolled back when the transaction is dropped.

use chrono::Utc;
use plcvault_core::{ImportPhase, ProgressSink, Vendor};
use plcvault_l5x::Decomposed;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};

use crate::encode::{RawRegistryEntry, encode_dt};

/// Summary text recorded on every module delta.
pub const DELTA_SUMMARY: &str = "Controller hash changed";

// ─── Inputs and outcomes ─────────────────────────────────────────────────────

/// A schema bundle about to be (re-)registered for a vendor.
#[derive(Debug, Clone)]
pub struct SchemaRegistration {
  pub vendor:      Vendor,
  pub version:     String,
  pub schema_path: String,
  pub hash:        String,
}

/// Everything the transaction needs, owned so it can cross to the db thread.
pub struct ImportPlan {
  pub filename:     String,
  pub vendor:       Vendor,
  pub canonical:    String,
  pub hash:         String,
  pub parts:        Decomposed,
  pub facility_id:  Option<i64>,
  pub unit_id:      Option<i64>,
  pub registration: Option<SchemaRegistration>,
  pub chunk_size:   usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleChange {
  Created { module_id: i64 },
  Bumped { module_id: i64, version: i64 },
  Unchanged { module_id: i64, version: i64 },
}

impl ModuleChange {
  pub fn module_id(self) -> i64 {
    match self {
      ModuleChange::Created { module_id }
      | ModuleChange::Bumped { module_id, .. }
      | ModuleChange::Unchanged { module_id, .. } => module_id,
    }
  }

  pub fn version(self) -> i64 {
    match self {
      ModuleChange::Created { .. } => 1,
      ModuleChange::Bumped { version, .. } | ModuleChange::Unchanged { version, .. } => version,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
  /// `(filename, vendor, hash)` was already imported; at most a schema
  /// registration was written.
  Existing { import_id: i64 },
  Committed {
    import_id: i64,
    module:    ModuleChange,
    programs:  usize,
    routines:  usize,
    tags:      usize,
    aois:      usize,
  },
}

// ─── Import transaction ──────────────────────────────────────────────────────

pub fn write_import(
  conn: &mut Connection,
  plan: ImportPlan,
  progress: &dyn ProgressSink,
) -> rusqlite::Result<TxOutcome> {
  progress.report(ImportPhase::TransactionBegin);
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  if let Some(registration) = &plan.registration {
    register_schema(&tx, registration)?;
  }

  if let Some(import_id) = find_import(&tx, &plan.filename, plan.vendor, &plan.hash)? {
    progress.report(ImportPhase::Commit);
    tx.commit()?;
    return Ok(TxOutcome::Existing { import_id });
  }

  let now = encode_dt(Utc::now());
  let parts = &plan.parts;

  tx.execute(
    "INSERT INTO plc_imports (filename, vendor, version, xml_blob, hash, imported_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![
      plan.filename,
      plan.vendor.as_str(),
      parts.declared_version,
      plan.canonical,
      plan.hash,
      now
    ],
  )?;
  let import_id = tx.last_insert_rowid();

  progress.report(ImportPhase::ParseController);
  tx.execute(
    "INSERT INTO plc_controllers
       (name, vendor, version, description, hash, import_id, facility_id, unit_id, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    params![
      parts.controller.name,
      plan.vendor.as_str(),
      parts.declared_version,
      parts.controller.description,
      plan.hash,
      import_id,
      plan.facility_id,
      plan.unit_id,
      now
    ],
  )?;
  let controller_id = tx.last_insert_rowid();

  progress.report(ImportPhase::UpsertModule);
  let module = upsert_module(&tx, &parts.controller.name, plan.vendor, import_id, &plan.hash, &now)?;

  let mut rows = RowCounter::new(plan.chunk_size);

  progress.report(ImportPhase::ParsePrograms);
  let mut routines = 0;
  for program in &parts.programs {
    tx.execute(
      "INSERT INTO plc_programs (controller_id, name, description) VALUES (?1, ?2, ?3)",
      params![controller_id, program.name, program.description],
    )?;
    let program_id = tx.last_insert_rowid();
    rows.bump("programs");

    for routine in &program.routines {
      tx.execute(
        "INSERT INTO plc_routines (program_id, name, routine_type, logic_xml)
         VALUES (?1, ?2, ?3, ?4)",
        params![program_id, routine.name, routine.routine_type, routine.logic_xml],
      )?;
      routines += 1;
      rows.bump("routines");
    }
  }

  progress.report(ImportPhase::ParseTags);
  for tag in &parts.tags {
    tx.execute(
      "INSERT INTO plc_tags (controller_id, name, data_type, scope, initial_value)
       VALUES (?1, ?2, ?3, ?4, ?5)",
      params![controller_id, tag.name, tag.data_type, tag.scope, tag.initial_value],
    )?;
    rows.bump("tags");
  }

  progress.report(ImportPhase::ParseAois);
  for aoi in &parts.aois {
    tx.execute(
      "INSERT INTO plc_aois (controller_id, name, definition_xml) VALUES (?1, ?2, ?3)",
      params![controller_id, aoi.name, aoi.definition_xml],
    )?;
    rows.bump("aois");
  }

  progress.report(ImportPhase::Commit);
  tx.commit()?;

  Ok(TxOutcome::Committed {
    import_id,
    module,
    programs: parts.programs.len(),
    routines,
    tags: parts.tags.len(),
    aois: parts.aois.len(),
  })
}

/// Emits a debug line every `chunk` inserted rows.
struct RowCounter {
  chunk: usize,
  total: usize,
}

impl RowCounter {
  fn new(chunk: usize) -> Self { Self { chunk: chunk.max(1), total: 0 } }

  fn bump(&mut self, table: &str) {
    self.total += 1;
    if self.total % self.chunk == 0 {
      tracing::debug!(rows = self.total, table, "import rows written");
    }
  }
}

pub fn find_import(
  conn: &Connection,
  filename: &str,
  vendor: Vendor,
  hash: &str,
) -> rusqlite::Result<Option<i64>> {
  conn
    .query_row(
      "SELECT id FROM plc_imports WHERE filename = ?1 AND vendor = ?2 AND hash = ?3",
      params![filename, vendor.as_str(), hash],
      |r| r.get(0),
    )
    .optional()
}

/// Create the module at version 1, or bump it when the content hash moved.
///
/// The prior hash is the hash of the import the module last pointed at.
fn upsert_module(
  tx: &Transaction<'_>,
  controller_name: &str,
  vendor: Vendor,
  import_id: i64,
  new_hash: &str,
  now: &str,
) -> rusqlite::Result<ModuleChange> {
  let existing: Option<(i64, i64)> = tx
    .query_row(
      "SELECT id, current_version FROM plc_modules
       WHERE controller_name = ?1 AND vendor = ?2",
      params![controller_name, vendor.as_str()],
      |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .optional()?;

  let Some((module_id, version)) = existing else {
    tx.execute(
      "INSERT INTO plc_modules (controller_name, vendor, current_version, last_import_id)
       VALUES (?1, ?2, 1, ?3)",
      params![controller_name, vendor.as_str(), import_id],
    )?;
    return Ok(ModuleChange::Created { module_id: tx.last_insert_rowid() });
  };

  let old_hash: String = tx
    .query_row(
      "SELECT i.hash FROM plc_imports i
       JOIN plc_modules m ON m.last_import_id = i.id
       WHERE m.id = ?1",
      params![module_id],
      |r| r.get(0),
    )
    .optional()?
    .unwrap_or_default();

  if old_hash == new_hash {
    tx.execute(
      "UPDATE plc_modules SET last_import_id = ?1 WHERE id = ?2",
      params![import_id, module_id],
    )?;
    return Ok(ModuleChange::Unchanged { module_id, version });
  }

  tx.execute(
    "INSERT INTO plc_module_deltas (module_id, old_hash, new_hash, change_summary, recorded_at)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    params![module_id, old_hash, new_hash, DELTA_SUMMARY, now],
  )?;
  let version = version + 1;
  tx.execute(
    "UPDATE plc_modules SET current_version = ?1, last_import_id = ?2 WHERE id = ?3",
    params![version, import_id, module_id],
  )?;
  Ok(ModuleChange::Bumped { module_id, version })
}

// ─── Schema registry ─────────────────────────────────────────────────────────

/// Hash of the newest registry row for `vendor`.
pub fn latest_schema_hash(conn: &Connection, vendor: Vendor) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT hash FROM schema_registry WHERE vendor = ?1 ORDER BY id DESC LIMIT 1",
      params![vendor.as_str()],
      |r| r.get(0),
    )
    .optional()
}

fn register_schema(tx: &Transaction<'_>, reg: &SchemaRegistration) -> rusqlite::Result<()> {
  tx.execute(
    "INSERT INTO schema_registry (vendor, version, schema_path, hash, registered_at)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    params![
      reg.vendor.as_str(),
      reg.version,
      reg.schema_path,
      reg.hash,
      encode_dt(Utc::now())
    ],
  )?;
  Ok(())
}

pub fn registry_entries(
  conn: &Connection,
  vendor: Vendor,
) -> rusqlite::Result<Vec<RawRegistryEntry>> {
  let mut stmt = conn.prepare(
    "SELECT id, vendor, version, schema_path, hash, registered_at
     FROM schema_registry WHERE vendor = ?1 ORDER BY id",
  )?;
  stmt
    .query_map(params![vendor.as_str()], |row| {
      Ok(RawRegistryEntry {
        entry_id:      row.get(0)?,
        vendor:        row.get(1)?,
        version:       row.get(2)?,
        schema_path:   row.get(3)?,
        hash:          row.get(4)?,
        registered_at: row.get(5)?,
      })
    })?
    .collect()
}
