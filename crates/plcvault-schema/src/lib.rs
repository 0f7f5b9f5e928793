//! Vendor schema bundles for plcvault.
//!
//! A bundle is a base JSON Schema plus one vendor-specific schema, merged as
//! `{"allOf": [base, vendor]}`. Only a small header projection of each
//! document is validated against it, so validation cost does not grow with
//! the size of the controller logic. The bundle hash feeds the schema
//! registry kept by the storage backend.

mod bundle;
pub mod error;

pub use bundle::{BASE_SCHEMA_FILE, SchemaBundle, schema_hash};
pub use error::{Error, Result};
