//! Error types for the plcvault-l5x codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid XML document: {0}")]
  Xml(#[from] quick_xml::Error),

  #[error("invalid XML document: no root element")]
  NoRootElement,

  #[error("invalid XML document: more than one root element")]
  MultipleRoots,

  #[error("invalid XML document: text outside the root element")]
  TextOutsideRoot,

  #[error("invalid XML document: element <{0}> is never closed")]
  Unclosed(String),

  #[error("failed to serialize <{element}>: {reason}")]
  Serialize { element: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
