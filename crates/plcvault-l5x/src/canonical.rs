//! Canonical form and content hash.
//!
//! The canonical form serializes each element as its qualified name,
//! attributes sorted by name, trimmed non-empty text segments and children in
//! order. Attribute order and incidental whitespace therefore never reach the
//! hash. Comments and the XML declaration are not part of the form.

use quick_xml::escape::escape;
use sha2::{Digest, Sha256};

use crate::tree::{Element, Node, parse};

/// Canonicalize a whole document.
///
/// Best-effort: text that does not parse is returned unchanged, so hashing
/// stays deterministic for byte-identical input.
pub fn canonicalize(xml_text: &str) -> String {
  match parse(xml_text) {
    Ok(doc) => canonical_element(&doc.root),
    Err(_) => xml_text.to_owned(),
  }
}

/// Hex-encoded SHA-256 of `canonical`.
pub fn content_hash(canonical: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(canonical.as_bytes());
  hex::encode(hasher.finalize())
}

pub(crate) fn canonical_element(el: &Element) -> String {
  let mut out = String::new();
  write_canonical(&mut out, el);
  out
}

fn write_canonical(out: &mut String, el: &Element) {
  let mut attrs: Vec<&(String, String)> = el.attributes.iter().collect();
  attrs.sort_by(|a, b| a.0.cmp(&b.0));

  out.push('<');
  out.push_str(&el.name);
  for (k, v) in attrs {
    out.push(' ');
    out.push_str(k);
    out.push_str("=\"");
    out.push_str(&escape(v.as_str()));
    out.push('"');
  }
  out.push('>');

  for child in &el.children {
    match child {
      Node::Text(t) => {
        let t = t.trim();
        if !t.is_empty() {
          out.push_str(&escape(t));
        }
      }
      Node::Element(c) => write_canonical(out, c),
    }
  }

  out.push_str("</");
  out.push_str(&el.name);
  out.push('>');
}
