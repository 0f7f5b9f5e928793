//! The import contract between the engine and its caller.
//!
//! The caller supplies an [`ImportConfig`], a [`ProgressSink`] and a
//! [`CancelProbe`]; the engine returns an [`ImportSummary`].

use std::{
  path::{Path, PathBuf},
  sync::atomic::{AtomicBool, Ordering},
};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// File extensions accepted for import, compared case-insensitively.
pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["l5x", "xml"];

/// Reject paths whose extension is not an accepted export format.
pub fn ensure_supported_extension(path: &Path) -> Result<()> {
  let accepted = path
    .extension()
    .and_then(|e| e.to_str())
    .is_some_and(|e| ACCEPTED_EXTENSIONS.iter().any(|a| e.eq_ignore_ascii_case(a)));
  if accepted { Ok(()) } else { Err(Error::UnsupportedExtension(path.to_path_buf())) }
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// Per-call import configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
  /// Rows inserted between debug progress log lines.
  pub chunk_size_elements:      usize,
  /// Files larger than this (MiB) are logged as large imports.
  pub large_file_mb_threshold:  u64,
  /// Fail when the registered schema hash for the vendor has drifted.
  pub abort_on_schema_mismatch: bool,
  /// Skip rebuilding secondary lookup indexes after a committed import.
  pub skip_indexing:            bool,
  /// Detect and validate only; never write.
  pub validate_only:            bool,
  pub facility_id:              Option<i64>,
  pub unit_id:                  Option<i64>,
  /// Directory holding `base/` and the per-vendor schema folders.
  pub schema_root:              PathBuf,
}

impl Default for ImportConfig {
  fn default() -> Self {
    Self {
      chunk_size_elements:      5000,
      large_file_mb_threshold:  25,
      abort_on_schema_mismatch: true,
      skip_indexing:            false,
      validate_only:            false,
      facility_id:              None,
      unit_id:                  None,
      schema_root:              PathBuf::from("schemas/json_schemas"),
    }
  }
}

// ─── Result ──────────────────────────────────────────────────────────────────

/// What one import call did.
///
/// `import_id` is `None` only for validate-only runs. An idempotent re-import
/// carries the prior import's id and zero counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
  pub controller_name: String,
  pub program_count:   usize,
  pub routine_count:   usize,
  pub tag_count:       usize,
  pub aoi_count:       usize,
  pub import_id:       Option<i64>,
  pub duration_ms:     u64,
}

impl ImportSummary {
  /// A summary with no rows written.
  pub fn empty(controller_name: impl Into<String>, import_id: Option<i64>) -> Self {
    Self {
      controller_name: controller_name.into(),
      program_count: 0,
      routine_count: 0,
      tag_count: 0,
      aoi_count: 0,
      import_id,
      duration_ms: 0,
    }
  }
}

// ─── Progress ────────────────────────────────────────────────────────────────

/// The fixed, ordered phases of an import. Percentages never decrease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImportPhase {
  Read,
  Validate,
  Canonicalize,
  TransactionBegin,
  ParseController,
  UpsertModule,
  ParsePrograms,
  ParseTags,
  ParseAois,
  Commit,
}

impl ImportPhase {
  pub const ALL: [ImportPhase; 10] = [
    ImportPhase::Read,
    ImportPhase::Validate,
    ImportPhase::Canonicalize,
    ImportPhase::TransactionBegin,
    ImportPhase::ParseController,
    ImportPhase::UpsertModule,
    ImportPhase::ParsePrograms,
    ImportPhase::ParseTags,
    ImportPhase::ParseAois,
    ImportPhase::Commit,
  ];

  pub fn label(self) -> &'static str {
    match self {
      ImportPhase::Read => "Reading file",
      ImportPhase::Validate => "Validating schema",
      ImportPhase::Canonicalize => "Canonicalizing",
      ImportPhase::TransactionBegin => "Beginning transaction",
      ImportPhase::ParseController => "Parsing controller",
      ImportPhase::UpsertModule => "Upserting module",
      ImportPhase::ParsePrograms => "Parsing programs & routines",
      ImportPhase::ParseTags => "Parsing controller tags",
      ImportPhase::ParseAois => "Parsing AOIs",
      ImportPhase::Commit => "Committing",
    }
  }

  pub fn percent(self) -> u8 {
    match self {
      ImportPhase::Read => 5,
      ImportPhase::Validate => 15,
      ImportPhase::Canonicalize => 25,
      ImportPhase::TransactionBegin => 30,
      ImportPhase::ParseController => 40,
      ImportPhase::UpsertModule => 50,
      ImportPhase::ParsePrograms => 65,
      ImportPhase::ParseTags => 78,
      ImportPhase::ParseAois => 86,
      ImportPhase::Commit => 97,
    }
  }
}

/// Receives phase transitions. Called synchronously between phases, possibly
/// from the database worker thread.
pub trait ProgressSink: Send + Sync {
  fn report(&self, phase: ImportPhase);
}

impl<F> ProgressSink for F
where
  F: Fn(ImportPhase) + Send + Sync,
{
  fn report(&self, phase: ImportPhase) { self(phase) }
}

/// A sink that discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
  fn report(&self, _phase: ImportPhase) {}
}

// ─── Cancellation ────────────────────────────────────────────────────────────

/// Polled before the write phase begins; never consulted mid-transaction.
pub trait CancelProbe: Send + Sync {
  fn is_cancelled(&self) -> bool;
}

impl CancelProbe for AtomicBool {
  fn is_cancelled(&self) -> bool { self.load(Ordering::SeqCst) }
}

impl<F> CancelProbe for F
where
  F: Fn() -> bool + Send + Sync,
{
  fn is_cancelled(&self) -> bool { self() }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancelProbe for NeverCancel {
  fn is_cancelled(&self) -> bool { false }
}
