//! Plain-text rendering of hierarchy and history views.

use std::fmt::Write as _;

use plcvault_core::{
  ImportSummary,
  record::{ControllerListing, ControllerTree, ModuleHistory},
};

pub fn summary(s: &ImportSummary) -> String {
  let id = s
    .import_id
    .map_or_else(|| "none (validate only)".to_owned(), |id| id.to_string());
  format!(
    "controller {}: {} programs, {} routines, {} tags, {} AOIs (import {id}, {} ms)",
    s.controller_name, s.program_count, s.routine_count, s.tag_count, s.aoi_count, s.duration_ms,
  )
}

pub fn listing(rows: &[ControllerListing]) -> String {
  if rows.is_empty() {
    return "no controllers imported\n".to_owned();
  }
  let mut out = String::new();
  for row in rows {
    let _ = writeln!(
      out,
      "PLC {} [{}]  latest import {}, {} snapshot(s)",
      row.name, row.vendor, row.import_id, row.snapshots
    );
  }
  out
}

pub fn tree(t: &ControllerTree, tag_limit: usize) -> String {
  let mut out = String::new();
  let version = t.version.as_deref().filter(|v| !v.is_empty()).unwrap_or("-");
  let _ = writeln!(out, "PLC {} [{}] version {version}, import {}", t.name, t.vendor, t.import_id);

  let _ = writeln!(out, "├─ Programs");
  for p in &t.programs {
    let _ = writeln!(out, "│  ├─ {}", p.name);
    for r in &p.routines {
      let _ = writeln!(out, "│  │  └─ {r}");
    }
  }
  let _ = writeln!(out, "├─ AOIs");
  for a in &t.aois {
    let _ = writeln!(out, "│  └─ {a}");
  }
  let _ = writeln!(out, "└─ Tags");
  for tag in &t.tags {
    let _ = writeln!(out, "   └─ {tag}");
  }
  if t.tags.len() >= tag_limit {
    let _ = writeln!(out, "   (first {tag_limit} tags shown)");
  }
  out
}

pub fn history(h: &ModuleHistory) -> String {
  let mut out = String::new();
  let m = &h.module;
  let _ = writeln!(
    out,
    "{} [{}] version {}, last import {}",
    m.controller_name, m.vendor, m.current_version, m.last_import_id
  );
  for d in &h.deltas {
    let _ = writeln!(
      out,
      "  {}  {} -> {}  {}",
      d.recorded_at.format("%Y-%m-%d %H:%M:%S"),
      short(&d.old_hash),
      short(&d.new_hash),
      d.change_summary.as_deref().unwrap_or(""),
    );
  }
  out
}

fn short(hash: &str) -> &str { hash.get(..12).unwrap_or(hash) }
