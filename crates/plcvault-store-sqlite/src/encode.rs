//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings; vendors are their lowercase identifiers.
//! Row closures only copy columns into `Raw*` structs so that decoding errors
//! surface as [`Error`] outside the database thread.

use chrono::{DateTime, Utc};
use plcvault_core::{
  Vendor,
  record::{ControllerListing, ModuleDelta, ModuleRecord, SchemaRegistryEntry},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Vendor ──────────────────────────────────────────────────────────────────

pub fn decode_vendor(s: &str) -> Result<Vendor> { Ok(s.parse::<Vendor>()?) }

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// A `plc_modules` row.
pub struct RawModule {
  pub module_id:       i64,
  pub controller_name: String,
  pub vendor:          String,
  pub current_version: i64,
  pub last_import_id:  i64,
}

impl RawModule {
  pub fn into_record(self) -> Result<ModuleRecord> {
    Ok(ModuleRecord {
      module_id:       self.module_id,
      controller_name: self.controller_name,
      vendor:          decode_vendor(&self.vendor)?,
      current_version: self.current_version,
      last_import_id:  self.last_import_id,
    })
  }
}

/// A `plc_module_deltas` row.
pub struct RawDelta {
  pub delta_id:       i64,
  pub module_id:      i64,
  pub old_hash:       String,
  pub new_hash:       String,
  pub change_summary: Option<String>,
  pub recorded_at:    String,
}

impl RawDelta {
  pub fn into_delta(self) -> Result<ModuleDelta> {
    Ok(ModuleDelta {
      delta_id:       self.delta_id,
      module_id:      self.module_id,
      old_hash:       self.old_hash,
      new_hash:       self.new_hash,
      change_summary: self.change_summary,
      recorded_at:    decode_dt(&self.recorded_at)?,
    })
  }
}

/// A `schema_registry` row.
pub struct RawRegistryEntry {
  pub entry_id:      i64,
  pub vendor:        String,
  pub version:       String,
  pub schema_path:   String,
  pub hash:          String,
  pub registered_at: String,
}

impl RawRegistryEntry {
  pub fn into_entry(self) -> Result<SchemaRegistryEntry> {
    Ok(SchemaRegistryEntry {
      entry_id:      self.entry_id,
      vendor:        decode_vendor(&self.vendor)?,
      version:       self.version,
      schema_path:   self.schema_path,
      hash:          self.hash,
      registered_at: decode_dt(&self.registered_at)?,
    })
  }
}

/// Newest `plc_controllers` row for one (name, vendor), with its snapshot count.
pub struct RawListing {
  pub name:        String,
  pub vendor:      String,
  pub snapshot_id: i64,
  pub import_id:   i64,
  pub snapshots:   i64,
}

impl RawListing {
  pub fn into_listing(self) -> Result<ControllerListing> {
    Ok(ControllerListing {
      name:        self.name,
      vendor:      decode_vendor(&self.vendor)?,
      snapshot_id: self.snapshot_id,
      import_id:   self.import_id,
      snapshots:   self.snapshots,
    })
  }
}
