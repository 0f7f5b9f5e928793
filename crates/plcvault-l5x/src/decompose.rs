//! Structural decomposition of a parsed export.
//!
//! Pipeline:
//!   Document
//!     └─ header()      → Header      (root + first Controller attributes)
//!     └─ decompose()   → Decomposed
//!          ├─ Controller          first `Controller` in document order
//!          ├─ Programs/Program    each with its Routines/Routine subtrees
//!          ├─ Controller/Tags/Tag controller-scoped tags
//!          └─ AddOnInstructionDefinitions/AddOnInstructionDefinition
//!
//! Routine logic and AOI definitions are kept as opaque serialized XML.

use serde::Serialize;

use crate::{
  error::Result,
  tree::{Document, Element},
};

/// Scope recorded for tags declared directly under the controller.
pub const CONTROLLER_SCOPE: &str = "Controller";

// ─── Header projection ───────────────────────────────────────────────────────

/// The minimal projection of a document that schema validation sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
  pub root_tag:        String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub schema_revision: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub controller_name: Option<String>,
}

impl Document {
  pub fn header(&self) -> Header {
    Header {
      root_tag:        self.root.local_name().to_owned(),
      schema_revision: self.root.attr("SchemaRevision").map(str::to_owned),
      controller_name: self
        .root
        .find_descendant("Controller")
        .and_then(|c| c.attr("Name"))
        .map(str::to_owned),
    }
  }
}

// ─── Decomposed records ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerInfo {
  pub name:        String,
  pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineInfo {
  pub name:         String,
  pub routine_type: Option<String>,
  pub logic_xml:    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramInfo {
  pub name:        String,
  pub description: Option<String>,
  pub routines:    Vec<RoutineInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInfo {
  pub name:          String,
  pub data_type:     Option<String>,
  pub scope:         String,
  pub initial_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AoiInfo {
  pub name:           String,
  pub definition_xml: String,
}

/// Everything one import writes below the controller snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decomposed {
  /// Root `SchemaRevision` attribute; empty when absent.
  pub declared_version: String,
  pub controller:       ControllerInfo,
  pub programs:         Vec<ProgramInfo>,
  pub tags:             Vec<TagInfo>,
  pub aois:             Vec<AoiInfo>,
}

impl Decomposed {
  pub fn routine_count(&self) -> usize {
    self.programs.iter().map(|p| p.routines.len()).sum()
  }
}

// ─── Walk ────────────────────────────────────────────────────────────────────

pub fn decompose(doc: &Document) -> Result<Decomposed> {
  let root = &doc.root;
  let controller_el = root.find_descendant("Controller");

  let controller = ControllerInfo {
    name:        controller_el
      .and_then(|c| c.attr("Name"))
      .unwrap_or("Unknown")
      .to_owned(),
    description: controller_el.and_then(description),
  };

  let mut programs = Vec::new();
  for container in containers(root, "Programs") {
    for prog in container.children_named("Program") {
      programs.push(program(prog)?);
    }
  }

  let mut tags = Vec::new();
  for ctrl in containers(root, "Controller") {
    for tag_list in ctrl.children_named("Tags") {
      tags.extend(tag_list.children_named("Tag").map(tag));
    }
  }

  let mut aois = Vec::new();
  for container in containers(root, "AddOnInstructionDefinitions") {
    for def in container.children_named("AddOnInstructionDefinition") {
      aois.push(AoiInfo {
        name:           name_or(def, "AOI"),
        definition_xml: def.to_xml()?,
      });
    }
  }

  Ok(Decomposed {
    declared_version: root.attr("SchemaRevision").unwrap_or_default().to_owned(),
    controller,
    programs,
    tags,
    aois,
  })
}

/// Every descendant of `root` with the given local name, document order.
fn containers<'a>(root: &'a Element, local: &'a str) -> impl Iterator<Item = &'a Element> {
  root.descendants().into_iter().filter(move |e| e.local_name() == local)
}

fn program(prog: &Element) -> Result<ProgramInfo> {
  let mut routines = Vec::new();
  for list in prog.children_named("Routines") {
    for r in list.children_named("Routine") {
      routines.push(RoutineInfo {
        name:         name_or(r, "Routine"),
        routine_type: r.attr("Type").map(str::to_owned),
        logic_xml:    r.to_xml()?,
      });
    }
  }
  Ok(ProgramInfo {
    name: name_or(prog, "Program"),
    description: description(prog),
    routines,
  })
}

fn tag(el: &Element) -> TagInfo {
  TagInfo {
    name:          name_or(el, "Tag"),
    data_type:     el.attr("DataType").map(str::to_owned),
    scope:         CONTROLLER_SCOPE.to_owned(),
    initial_value: initial_value(el),
  }
}

/// `Data/Value` text, else the decorated `Data/DataValue@Value`.
fn initial_value(tag: &Element) -> Option<String> {
  let data: Vec<&Element> = tag.children_named("Data").collect();
  let plain = data
    .iter()
    .find_map(|d| d.child("Value"))
    .map(Element::text)
    .filter(|t| !t.is_empty());
  plain.or_else(|| {
    data
      .iter()
      .find_map(|d| d.child("DataValue"))
      .and_then(|v| v.attr("Value"))
      .map(str::to_owned)
  })
}

fn description(el: &Element) -> Option<String> {
  if let Some(d) = el.attr("Description") {
    return Some(d.to_owned());
  }
  el.child("Description")
    .map(|d| d.text().trim().to_owned())
    .filter(|d| !d.is_empty())
}

fn name_or(el: &Element, fallback: &str) -> String {
  el.attr("Name").unwrap_or(fallback).to_owned()
}
