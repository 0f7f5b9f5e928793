//! Loading, validating and hashing a vendor schema bundle.

use std::path::{Path, PathBuf};

use plcvault_core::Vendor;
use serde::Serialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Path of the base schema, relative to the schema root.
pub const BASE_SCHEMA_FILE: &str = "base/plc_module_import_schema_base.json";

/// Version label recorded when the vendor schema declares none.
const DEFAULT_VERSION: &str = "1.0";

#[derive(Debug, Clone)]
pub struct SchemaBundle {
  pub vendor:      Vendor,
  pub base_path:   PathBuf,
  pub vendor_path: PathBuf,
  /// `{"allOf": [base, vendor]}`.
  pub merged:      Value,
  /// The vendor schema's top-level `version`, or `1.0`.
  pub version:     String,
  /// Hex SHA-256 of the merged schema with object keys sorted.
  pub hash:        String,
}

impl SchemaBundle {
  /// Resolve and load the bundle for `vendor` under `schema_root`.
  ///
  /// Fails fast, naming every missing file, before reading anything.
  pub fn load(schema_root: &Path, vendor: Vendor) -> Result<Self> {
    tracing::info!(schema_root = %schema_root.display(), %vendor, "using schema root");

    let base_path = schema_root.join(BASE_SCHEMA_FILE);
    let vendor_path = schema_root.join(vendor.schema_file());

    let missing: Vec<PathBuf> = [&base_path, &vendor_path]
      .into_iter()
      .filter(|p| !p.is_file())
      .cloned()
      .collect();
    if !missing.is_empty() {
      return Err(Error::MissingFiles { vendor, missing });
    }

    let base = read_json(&base_path)?;
    let vendor_schema = read_json(&vendor_path)?;

    let version = vendor_schema
      .get("version")
      .and_then(Value::as_str)
      .unwrap_or(DEFAULT_VERSION)
      .to_owned();
    let merged = json!({ "allOf": [base, vendor_schema] });
    let hash = schema_hash(&merged);

    Ok(Self { vendor, base_path, vendor_path, merged, version, hash })
  }

  /// Validate `projection` against the merged schema.
  ///
  /// A schema that does not itself compile is reported separately from a
  /// projection that fails it.
  pub fn validate<T: Serialize>(&self, projection: &T) -> Result<()> {
    let validator =
      jsonschema::validator_for(&self.merged).map_err(|e| Error::InvalidSchema {
        vendor: self.vendor,
        reason: e.to_string(),
      })?;

    let instance = serde_json::to_value(projection)?;
    let errors: Vec<String> = validator
      .iter_errors(&instance)
      .map(|e| format!("{e}"))
      .collect();

    if errors.is_empty() { Ok(()) } else { Err(Error::Validation(errors)) }
  }

  /// The location recorded in the schema registry.
  pub fn registry_path(&self) -> String { self.vendor_path.display().to_string() }
}

/// Hash a JSON value independently of object key order.
///
/// `serde_json` objects are sorted maps, so compact output is already
/// canonical.
pub fn schema_hash(value: &Value) -> String {
  hex::encode(Sha256::digest(value.to_string().as_bytes()))
}

fn read_json(path: &Path) -> Result<Value> {
  let raw = std::fs::read_to_string(path).map_err(|source| Error::Io {
    path: path.to_path_buf(),
    source,
  })?;
  serde_json::from_str(&raw).map_err(|source| Error::Json {
    path: path.to_path_buf(),
    source,
  })
}
