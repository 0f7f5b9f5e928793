//! PLC export codec for plcvault.
//!
//! Parses a vendor XML export into a small element tree, produces the
//! canonical form and content hash used for deduplication, and decomposes
//! the tree into controller, program, routine, tag and add-on instruction
//! records. Pure synchronous; no database dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use plcvault_l5x::{content_hash, decompose, parse};
//!
//! let text = r#"<RSLogix5000Content><Controller Name="C1"/></RSLogix5000Content>"#;
//! let doc = parse(text).unwrap();
//! let hash = content_hash(&doc.canonical());
//! let parts = decompose(&doc).unwrap();
//! println!("{} -> {hash}", parts.controller.name);
//! ```

mod canonical;
mod decompose;
pub mod error;
mod tree;

pub use canonical::{canonicalize, content_hash};
pub use decompose::{
  AoiInfo, ControllerInfo, Decomposed, Header, ProgramInfo, RoutineInfo,
  TagInfo, decompose,
};
pub use error::{Error, Result};
pub use tree::{Document, Element, Node, parse};
