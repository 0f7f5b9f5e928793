//! Supported PLC vendor export formats.
//!
//! A vendor is identified solely by the local name of the document's root
//! element. Each vendor owns one schema file inside the schema bundle.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
  Rockwell,
  Siemens,
  Schneider,
}

impl Vendor {
  pub const ALL: [Vendor; 3] = [Vendor::Rockwell, Vendor::Siemens, Vendor::Schneider];

  /// Map a root element's local name onto a vendor.
  ///
  /// A `{namespace}` prefix (Clark notation) or `prefix:` qualifier is
  /// stripped before the lookup.
  pub fn detect(root_tag: &str) -> Option<Vendor> {
    let tag = match root_tag.rsplit_once('}') {
      Some((_, local)) => local,
      None => root_tag,
    };
    let tag = match tag.rsplit_once(':') {
      Some((_, local)) => local,
      None => tag,
    };
    match tag {
      "RSLogix5000Content" => Some(Vendor::Rockwell),
      "SiemensProject" => Some(Vendor::Siemens),
      "UnityProject" => Some(Vendor::Schneider),
      _ => None,
    }
  }

  /// Stable identifier persisted in the `vendor` columns.
  pub fn as_str(self) -> &'static str {
    match self {
      Vendor::Rockwell => "rockwell",
      Vendor::Siemens => "siemens",
      Vendor::Schneider => "schneider",
    }
  }

  /// The root element local name that marks this vendor's exports.
  pub fn root_tag(self) -> &'static str {
    match self {
      Vendor::Rockwell => "RSLogix5000Content",
      Vendor::Siemens => "SiemensProject",
      Vendor::Schneider => "UnityProject",
    }
  }

  /// Path of the vendor schema, relative to the schema root.
  pub fn schema_file(self) -> &'static str {
    match self {
      Vendor::Rockwell => "rockwell/plc_module_import_schema_l5x.json",
      Vendor::Siemens => "siemens/plc_module_import_schema_tia.json",
      Vendor::Schneider => "schneider/plc_module_import_schema_unity.json",
    }
  }
}

impl fmt::Display for Vendor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Vendor {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Vendor::ALL
      .into_iter()
      .find(|v| v.as_str().eq_ignore_ascii_case(s))
      .ok_or_else(|| Error::UnknownVendorId(s.to_owned()))
  }
}
