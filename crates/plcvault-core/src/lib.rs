//! Core types and contracts for the plcvault PLC export store.
//!
//! This crate is deliberately free of XML and database dependencies. The
//! codec (`plcvault-l5x`), schema (`plcvault-schema`) and storage
//! (`plcvault-store-sqlite`) crates all depend on it.

pub mod error;
pub mod import;
pub mod record;
pub mod settings;
pub mod vendor;

pub use error::{Error, Result};
pub use import::{
  ACCEPTED_EXTENSIONS, CancelProbe, ImportConfig, ImportPhase, ImportSummary,
  NeverCancel, NoProgress, ProgressSink, ensure_supported_extension,
};
pub use settings::{Settings, find_project_root};
pub use vendor::Vendor;
