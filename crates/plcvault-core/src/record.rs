//! Read models for persisted imports, modules and controller hierarchies.
//!
//! These are produced by the storage backend's read paths. Writes go through
//! the import engine only; nothing here is ever mutated in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Vendor;

// ─── Versioning ──────────────────────────────────────────────────────────────

/// The versioned identity of a controller across repeated imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
  pub module_id:       i64,
  pub controller_name: String,
  pub vendor:          Vendor,
  pub current_version: i64,
  pub last_import_id:  i64,
}

/// A recorded transition between two content hashes of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDelta {
  pub delta_id:       i64,
  pub module_id:      i64,
  pub old_hash:       String,
  pub new_hash:       String,
  pub change_summary: Option<String>,
  pub recorded_at:    DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleHistory {
  pub module: ModuleRecord,
  pub deltas: Vec<ModuleDelta>,
}

/// An accepted schema bundle; the newest row per vendor is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRegistryEntry {
  pub entry_id:      i64,
  pub vendor:        Vendor,
  pub version:       String,
  pub schema_path:   String,
  pub hash:          String,
  pub registered_at: DateTime<Utc>,
}

// ─── Hierarchy ───────────────────────────────────────────────────────────────

/// One controller name known to the store, with its newest snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerListing {
  pub name:          String,
  pub vendor:        Vendor,
  pub snapshot_id:   i64,
  pub import_id:     i64,
  pub snapshots:     i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramNode {
  pub name:     String,
  pub routines: Vec<String>,
}

/// The newest snapshot of a controller, arranged for tree rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerTree {
  pub name:        String,
  pub vendor:      Vendor,
  pub snapshot_id: i64,
  pub import_id:   i64,
  pub version:     Option<String>,
  pub facility_id: Option<i64>,
  pub unit_id:     Option<i64>,
  pub programs:    Vec<ProgramNode>,
  pub aois:        Vec<String>,
  pub tags:        Vec<String>,
}
