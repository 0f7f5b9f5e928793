//! Read-only views over persisted controller snapshots.
//!
//! [`HierarchyReader`] opens its own read-only connection so tree rendering
//! never contends with, or mutates through, the working connection.

use std::path::Path;

use plcvault_core::{
  Vendor,
  record::{ControllerListing, ControllerTree, ModuleHistory, ProgramNode, SchemaRegistryEntry},
};
use rusqlite::{OpenFlags, OptionalExtension, params};
use serde::Serialize;
use tokio_rusqlite::Connection;

use crate::{
  Result,
  encode::{RawDelta, RawListing, RawModule, decode_vendor},
  store,
};

/// Tags listed per controller tree; the rest are counted, not listed.
pub const TAG_DISPLAY_LIMIT: usize = 5000;

/// Row counts across the hierarchy tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
  pub imports:     i64,
  pub modules:     i64,
  pub deltas:      i64,
  pub controllers: i64,
  pub programs:    i64,
  pub routines:    i64,
  pub tags:        i64,
  pub aois:        i64,
}

struct RawTreeHead {
  snapshot_id: i64,
  vendor:      String,
  import_id:   i64,
  version:     Option<String>,
  facility_id: Option<i64>,
  unit_id:     Option<i64>,
}

struct RawTree {
  head:     RawTreeHead,
  programs: Vec<ProgramNode>,
  aois:     Vec<String>,
  tags:     Vec<String>,
}

#[derive(Clone)]
pub struct HierarchyReader {
  conn: Connection,
}

impl HierarchyReader {
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = Connection::open_with_flags(
      path,
      OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI,
    )
    .await?;
    Ok(Self { conn })
  }

  /// Every (name, vendor) with its newest snapshot, ordered by name.
  pub async fn controllers(&self) -> Result<Vec<ControllerListing>> {
    let raws: Vec<RawListing> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT c.name, c.vendor, c.id, c.import_id, g.snapshots
           FROM plc_controllers c
           JOIN (SELECT MAX(id) AS latest, COUNT(*) AS snapshots
                 FROM plc_controllers GROUP BY name, vendor) g
             ON g.latest = c.id
           ORDER BY c.name, c.vendor",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawListing {
              name:        row.get(0)?,
              vendor:      row.get(1)?,
              snapshot_id: row.get(2)?,
              import_id:   row.get(3)?,
              snapshots:   row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawListing::into_listing).collect()
  }

  /// The newest snapshot of `name`, or `None` if it was never imported.
  ///
  /// Programs, routines, AOIs and tags are sorted by name; tags are capped at
  /// [`TAG_DISPLAY_LIMIT`].
  pub async fn controller_tree(&self, name: &str) -> Result<Option<ControllerTree>> {
    let name_owned = name.to_owned();
    let raw: Option<RawTree> = self
      .conn
      .call(move |conn| {
        let head = conn
          .query_row(
            "SELECT id, vendor, import_id, version, facility_id, unit_id
             FROM plc_controllers WHERE name = ?1 ORDER BY id DESC LIMIT 1",
            params![name_owned],
            |row| {
              Ok(RawTreeHead {
                snapshot_id: row.get(0)?,
                vendor:      row.get(1)?,
                import_id:   row.get(2)?,
                version:     row.get(3)?,
                facility_id: row.get(4)?,
                unit_id:     row.get(5)?,
              })
            },
          )
          .optional()?;
        let Some(head) = head else {
          return Ok(None);
        };

        let programs: Vec<(i64, String)> = conn
          .prepare("SELECT id, name FROM plc_programs WHERE controller_id = ?1 ORDER BY name")?
          .query_map(params![head.snapshot_id], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<_>>()?;

        let mut routine_stmt =
          conn.prepare("SELECT name FROM plc_routines WHERE program_id = ?1 ORDER BY name")?;
        let mut nodes = Vec::with_capacity(programs.len());
        for (program_id, program_name) in programs {
          let routines = routine_stmt
            .query_map(params![program_id], |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
          nodes.push(ProgramNode { name: program_name, routines });
        }

        let aois = conn
          .prepare("SELECT name FROM plc_aois WHERE controller_id = ?1 ORDER BY name")?
          .query_map(params![head.snapshot_id], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;

        let tags = conn
          .prepare("SELECT name FROM plc_tags WHERE controller_id = ?1 ORDER BY name LIMIT ?2")?
          .query_map(params![head.snapshot_id, TAG_DISPLAY_LIMIT as i64], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(Some(RawTree { head, programs: nodes, aois, tags }))
      })
      .await?;

    let Some(RawTree { head, programs, aois, tags }) = raw else {
      return Ok(None);
    };
    Ok(Some(ControllerTree {
      name: name.to_owned(),
      vendor: decode_vendor(&head.vendor)?,
      snapshot_id: head.snapshot_id,
      import_id: head.import_id,
      version: head.version,
      facility_id: head.facility_id,
      unit_id: head.unit_id,
      programs,
      aois,
      tags,
    }))
  }

  /// The module record for (name, vendor) and its deltas, oldest first.
  pub async fn module_history(&self, name: &str, vendor: Vendor) -> Result<Option<ModuleHistory>> {
    let name_owned = name.to_owned();
    let raw: Option<(RawModule, Vec<RawDelta>)> = self
      .conn
      .call(move |conn| {
        let module = conn
          .query_row(
            "SELECT id, controller_name, vendor, current_version, last_import_id
             FROM plc_modules WHERE controller_name = ?1 AND vendor = ?2",
            params![name_owned, vendor.as_str()],
            |row| {
              Ok(RawModule {
                module_id:       row.get(0)?,
                controller_name: row.get(1)?,
                vendor:          row.get(2)?,
                current_version: row.get(3)?,
                last_import_id:  row.get(4)?,
              })
            },
          )
          .optional()?;
        let Some(module) = module else {
          return Ok(None);
        };

        let deltas = conn
          .prepare(
            "SELECT id, module_id, old_hash, new_hash, change_summary, recorded_at
             FROM plc_module_deltas WHERE module_id = ?1 ORDER BY id",
          )?
          .query_map(params![module.module_id], |row| {
            Ok(RawDelta {
              delta_id:       row.get(0)?,
              module_id:      row.get(1)?,
              old_hash:       row.get(2)?,
              new_hash:       row.get(3)?,
              change_summary: row.get(4)?,
              recorded_at:    row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some((module, deltas)))
      })
      .await?;

    let Some((module, deltas)) = raw else {
      return Ok(None);
    };
    Ok(Some(ModuleHistory {
      module: module.into_record()?,
      deltas: deltas.into_iter().map(RawDelta::into_delta).collect::<Result<_>>()?,
    }))
  }

  /// Registered schema bundles for `vendor`, oldest first.
  pub async fn schema_registry(&self, vendor: Vendor) -> Result<Vec<SchemaRegistryEntry>> {
    let raws = self
      .conn
      .call(move |conn| Ok(store::registry_entries(conn, vendor)?))
      .await?;
    raws.into_iter().map(|r| r.into_entry()).collect()
  }

  pub async fn table_counts(&self) -> Result<TableCounts> {
    let counts = self
      .conn
      .call(|conn| {
        let count = |table: &str| -> rusqlite::Result<i64> {
          conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
        };
        Ok(TableCounts {
          imports:     count("plc_imports")?,
          modules:     count("plc_modules")?,
          deltas:      count("plc_module_deltas")?,
          controllers: count("plc_controllers")?,
          programs:    count("plc_programs")?,
          routines:    count("plc_routines")?,
          tags:        count("plc_tags")?,
          aois:        count("plc_aois")?,
        })
      })
      .await?;
    Ok(counts)
  }
}
