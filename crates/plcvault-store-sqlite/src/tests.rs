//! Integration tests for the import pipeline and database lifecycle against
//! on-disk databases in temporary directories.

use std::{
  path::{Path, PathBuf},
  sync::{Arc, Mutex, atomic::AtomicBool},
};

use plcvault_core::{
  ImportConfig, ImportPhase, NeverCancel, NoProgress, ProgressSink, Vendor,
};
use tempfile::TempDir;

use crate::{
  CloseOutcome, DatabaseManager, Error, ErrorKind, HierarchyReader,
  TAG_DISPLAY_LIMIT, TableCounts, import_module, list_backups,
};

const BASE_SCHEMA: &str = r#"{
  "type": "object",
  "required": ["root_tag"],
  "properties": {
    "root_tag": {"type": "string"},
    "schema_revision": {"type": "string"},
    "controller_name": {"type": "string"}
  }
}"#;

const LINE4: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<RSLogix5000Content SchemaRevision="1.0" SoftwareRevision="32.00">
  <Controller Name="Line4" ProcessorType="1756-L83E" Description="Packaging">
    <AddOnInstructionDefinitions>
      <AddOnInstructionDefinition Name="Valve"/>
    </AddOnInstructionDefinitions>
    <Tags>
      <Tag Name="Start" DataType="BOOL"><Data><Value>0</Value></Data></Tag>
      <Tag Name="Speed" DataType="DINT"/>
    </Tags>
    <Programs>
      <Program Name="MainProgram">
        <Routines>
          <Routine Name="MainRoutine" Type="RLL"/>
          <Routine Name="Faults" Type="ST"/>
        </Routines>
      </Program>
      <Program Name="Idle">
        <Routines><Routine Name="Wait" Type="RLL"/></Routines>
      </Program>
    </Programs>
  </Controller>
</RSLogix5000Content>"#;

struct Fixture {
  temp:   TempDir,
  db:     DatabaseManager,
  config: ImportConfig,
}

impl Fixture {
  fn db_path(&self) -> PathBuf { self.temp.path().join("plant.sqlite") }

  fn schema_root(&self) -> PathBuf { self.temp.path().join("schemas") }

  fn export(&self, name: &str, body: &str) -> PathBuf {
    let path = self.temp.path().join(name);
    std::fs::write(&path, body).expect("export should write");
    path
  }

  async fn import(&self, path: &Path) -> crate::Result<plcvault_core::ImportSummary> {
    import_module(&self.db, path, &self.config, Arc::new(NoProgress), &NeverCancel).await
  }

  async fn reader(&self) -> HierarchyReader {
    HierarchyReader::open(self.db_path()).await.expect("reader should open")
  }
}

fn write(root: &Path, rel: &str, body: &str) {
  let path = root.join(rel);
  std::fs::create_dir_all(path.parent().unwrap()).unwrap();
  std::fs::write(path, body).unwrap();
}

fn write_bundle(schema_root: &Path) {
  write(schema_root, plcvault_schema::BASE_SCHEMA_FILE, BASE_SCHEMA);
  for vendor in Vendor::ALL {
    let body = format!(
      r#"{{"version": "1.0", "properties": {{"root_tag": {{"const": "{}"}}}}}}"#,
      vendor.root_tag()
    );
    write(schema_root, vendor.schema_file(), &body);
  }
}

async fn fixture() -> Fixture {
  let temp = TempDir::new().expect("tempdir should create");
  let mut db = DatabaseManager::new();
  db.open(temp.path().join("plant.sqlite")).await.expect("database should open");
  let config = ImportConfig {
    schema_root: temp.path().join("schemas"),
    ..ImportConfig::default()
  };
  let f = Fixture { temp, db, config };
  write_bundle(&f.schema_root());
  f
}

// ─── Import ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn import_writes_hierarchy_and_summary() {
  let f = fixture().await;
  let path = f.export("line4.L5X", LINE4);

  let summary = f.import(&path).await.unwrap();
  assert_eq!(summary.controller_name, "Line4");
  assert_eq!(summary.program_count, 2);
  assert_eq!(summary.routine_count, 3);
  assert_eq!(summary.tag_count, 2);
  assert_eq!(summary.aoi_count, 1);
  assert_eq!(summary.import_id, Some(1));

  let counts = f.reader().await.table_counts().await.unwrap();
  assert_eq!(counts.imports, 1);
  assert_eq!(counts.controllers, 1);
  assert_eq!(counts.modules, 1);
  assert_eq!(counts.deltas, 0);
  assert_eq!(counts.routines, 3);
}

#[tokio::test]
async fn minimal_controller_is_imported_once() {
  let f = fixture().await;
  let path = f.export(
    "ctrl.l5x",
    r#"<RSLogix5000Content><Controller Name="C1"/></RSLogix5000Content>"#,
  );

  let first = f.import(&path).await.unwrap();
  assert_eq!(first, plcvault_core::ImportSummary {
    duration_ms: first.duration_ms,
    ..plcvault_core::ImportSummary::empty("C1", Some(1))
  });

  let second = f.import(&path).await.unwrap();
  assert_eq!(second.controller_name, "C1");
  assert_eq!(second.import_id, Some(1));
  assert_eq!(f.reader().await.table_counts().await.unwrap().imports, 1);
}

#[tokio::test]
async fn reimport_returns_prior_id_and_writes_nothing() {
  let f = fixture().await;
  let path = f.export("line4.L5X", LINE4);
  f.import(&path).await.unwrap();
  let before = f.reader().await.table_counts().await.unwrap();

  let again = f.import(&path).await.unwrap();
  assert_eq!(again.import_id, Some(1));
  assert_eq!(again.program_count, 0);
  assert_eq!(again.tag_count, 0);
  assert_eq!(f.reader().await.table_counts().await.unwrap(), before);
}

#[tokio::test]
async fn attribute_order_and_whitespace_do_not_create_new_imports() {
  let f = fixture().await;
  let path = f.export("line4.L5X", LINE4);
  f.import(&path).await.unwrap();

  let reordered = LINE4
    .replace(
      r#"Name="Line4" ProcessorType="1756-L83E" Description="Packaging""#,
      r#"Description="Packaging"   Name="Line4" ProcessorType="1756-L83E""#,
    )
    .replace("\n    <Tags>", "\n\n        <Tags>");
  std::fs::write(&path, reordered).unwrap();

  let again = f.import(&path).await.unwrap();
  assert_eq!(again.import_id, Some(1));
}

#[tokio::test]
async fn changed_content_bumps_module_version() {
  let f = fixture().await;
  let path = f.export("line4.L5X", LINE4);
  f.import(&path).await.unwrap();

  std::fs::write(&path, LINE4.replace("<Value>0</Value>", "<Value>1</Value>")).unwrap();
  let second = f.import(&path).await.unwrap();
  assert_eq!(second.import_id, Some(2));

  let reader = f.reader().await;
  let history = reader.module_history("Line4", Vendor::Rockwell).await.unwrap().unwrap();
  assert_eq!(history.module.current_version, 2);
  assert_eq!(history.module.last_import_id, 2);
  assert_eq!(history.deltas.len(), 1);
  let delta = &history.deltas[0];
  assert_ne!(delta.old_hash, delta.new_hash);
  assert_eq!(delta.change_summary.as_deref(), Some("Controller hash changed"));

  // Every import keeps its own snapshot.
  assert_eq!(reader.table_counts().await.unwrap().controllers, 2);
}

#[tokio::test]
async fn reverted_content_under_new_name_is_a_new_version() {
  let f = fixture().await;
  let a = f.export("line4_a.L5X", LINE4);
  let b = f.export("line4_b.L5X", &LINE4.replace("Speed", "Velocity"));
  let a_again = f.export("line4_c.L5X", LINE4);

  f.import(&a).await.unwrap();
  f.import(&b).await.unwrap();
  f.import(&a_again).await.unwrap();

  let history = f
    .reader()
    .await
    .module_history("Line4", Vendor::Rockwell)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(history.module.current_version, 3);
  assert_eq!(history.deltas.len(), 2);
  assert_eq!(history.deltas[0].old_hash, history.deltas[1].new_hash);
}

#[tokio::test]
async fn identical_content_under_new_name_keeps_version() {
  let f = fixture().await;
  f.import(&f.export("first.L5X", LINE4)).await.unwrap();
  let second = f.import(&f.export("second.xml", LINE4)).await.unwrap();
  assert_eq!(second.import_id, Some(2));

  let history = f
    .reader()
    .await
    .module_history("Line4", Vendor::Rockwell)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(history.module.current_version, 1);
  assert_eq!(history.module.last_import_id, 2);
  assert!(history.deltas.is_empty());
}

#[tokio::test]
async fn failed_write_rolls_back_every_row() {
  let f = fixture().await;
  let dup = LINE4.replace(r#"<Program Name="Idle">"#, r#"<Program Name="MainProgram">"#);
  let path = f.export("dup.L5X", &dup);

  let err = f.import(&path).await.unwrap_err();
  assert!(matches!(err, Error::Transaction(_)), "{err}");
  assert_eq!(err.kind(), ErrorKind::Transaction);

  let reader = f.reader().await;
  assert_eq!(reader.table_counts().await.unwrap(), TableCounts::default());
  assert!(reader.schema_registry(Vendor::Rockwell).await.unwrap().is_empty());

  // The store is still usable afterwards.
  f.import(&f.export("line4.L5X", LINE4)).await.unwrap();
  assert_eq!(reader.table_counts().await.unwrap().imports, 1);
}

#[tokio::test]
async fn validate_only_writes_nothing() {
  let mut f = fixture().await;
  f.config.validate_only = true;
  let summary = f.import(&f.export("line4.L5X", LINE4)).await.unwrap();

  assert_eq!(summary.controller_name, "Line4");
  assert_eq!(summary.import_id, None);
  assert_eq!(summary.program_count, 0);

  let reader = f.reader().await;
  assert_eq!(reader.table_counts().await.unwrap(), TableCounts::default());
  assert!(reader.schema_registry(Vendor::Rockwell).await.unwrap().is_empty());
}

#[tokio::test]
async fn cancellation_before_write_persists_nothing() {
  let f = fixture().await;
  let cancelled = AtomicBool::new(true);
  let err = import_module(
    &f.db,
    &f.export("line4.L5X", LINE4),
    &f.config,
    Arc::new(NoProgress),
    &cancelled,
  )
  .await
  .unwrap_err();

  assert!(matches!(err, Error::Cancelled));
  assert_eq!(err.kind(), ErrorKind::Cancelled);
  assert_eq!(f.reader().await.table_counts().await.unwrap(), TableCounts::default());
}

#[tokio::test]
async fn progress_reports_every_phase_in_order() {
  let f = fixture().await;
  let seen = Arc::new(Mutex::new(Vec::new()));
  let sink_seen = Arc::clone(&seen);
  let sink: Arc<dyn ProgressSink> =
    Arc::new(move |phase: ImportPhase| sink_seen.lock().unwrap().push(phase));

  import_module(&f.db, &f.export("line4.L5X", LINE4), &f.config, sink, &NeverCancel)
    .await
    .unwrap();

  assert_eq!(*seen.lock().unwrap(), ImportPhase::ALL.to_vec());
}

#[tokio::test]
async fn first_import_registers_the_bundle() {
  let f = fixture().await;
  f.import(&f.export("line4.L5X", LINE4)).await.unwrap();
  f.import(&f.export("line4_copy.L5X", LINE4)).await.unwrap();

  let entries = f.reader().await.schema_registry(Vendor::Rockwell).await.unwrap();
  assert_eq!(entries.len(), 1);
  assert_eq!(entries[0].version, "1.0");
  assert_eq!(entries[0].hash.len(), 64);
  assert!(entries[0].schema_path.ends_with("plc_module_import_schema_l5x.json"));
}

#[tokio::test]
async fn schema_drift_aborts_by_default() {
  let f = fixture().await;
  f.import(&f.export("line4.L5X", LINE4)).await.unwrap();

  write(
    &f.schema_root(),
    Vendor::Rockwell.schema_file(),
    r#"{"version": "1.1", "properties": {"root_tag": {"const": "RSLogix5000Content"}}}"#,
  );
  let err = f
    .import(&f.export("line4_v2.L5X", &LINE4.replace("Speed", "Velocity")))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SchemaDrift { vendor: Vendor::Rockwell, .. }), "{err}");
  assert_eq!(err.kind(), ErrorKind::Validation);
  assert_eq!(f.reader().await.table_counts().await.unwrap().imports, 1);
}

#[tokio::test]
async fn schema_drift_is_tolerated_when_configured() {
  let mut f = fixture().await;
  f.import(&f.export("line4.L5X", LINE4)).await.unwrap();

  write(
    &f.schema_root(),
    Vendor::Rockwell.schema_file(),
    r#"{"version": "1.1", "properties": {"root_tag": {"const": "RSLogix5000Content"}}}"#,
  );
  f.config.abort_on_schema_mismatch = false;
  let summary = f
    .import(&f.export("line4_v2.L5X", &LINE4.replace("Speed", "Velocity")))
    .await
    .unwrap();
  assert_eq!(summary.import_id, Some(2));

  let entries = f.reader().await.schema_registry(Vendor::Rockwell).await.unwrap();
  let versions: Vec<_> = entries.iter().map(|e| e.version.as_str()).collect();
  assert_eq!(versions, ["1.0", "1.1"]);
}

#[tokio::test]
async fn tolerated_drift_is_registered_even_for_a_repeat_import() {
  let mut f = fixture().await;
  let file = f.export("line4.L5X", LINE4);
  f.import(&file).await.unwrap();

  write(
    &f.schema_root(),
    Vendor::Rockwell.schema_file(),
    r#"{"version": "1.1", "properties": {"root_tag": {"const": "RSLogix5000Content"}}}"#,
  );
  f.config.abort_on_schema_mismatch = false;

  let seen = Arc::new(Mutex::new(Vec::new()));
  let sink_seen = Arc::clone(&seen);
  let sink: Arc<dyn ProgressSink> =
    Arc::new(move |phase: ImportPhase| sink_seen.lock().unwrap().push(phase));
  let summary = import_module(&f.db, &file, &f.config, sink, &NeverCancel).await.unwrap();
  assert_eq!(summary.import_id, Some(1));
  assert_eq!(summary.program_count, 0);

  let phases = seen.lock().unwrap().clone();
  assert_eq!(phases.first(), Some(&ImportPhase::Read));
  assert_eq!(phases.last(), Some(&ImportPhase::Commit));

  let entries = f.reader().await.schema_registry(Vendor::Rockwell).await.unwrap();
  let versions: Vec<_> = entries.iter().map(|e| e.version.as_str()).collect();
  assert_eq!(versions, ["1.0", "1.1"]);

  // The new bundle is now the registered one; the next run sees no drift.
  f.config.abort_on_schema_mismatch = true;
  assert_eq!(f.import(&file).await.unwrap().import_id, Some(1));
}

#[tokio::test]
async fn shipped_schema_bundle_accepts_a_rockwell_export() {
  let mut f = fixture().await;
  f.config.schema_root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../schemas/json_schemas");

  let summary = f.import(&f.export("line4.L5X", LINE4)).await.unwrap();
  assert_eq!(summary.import_id, Some(1));

  let entries = f.reader().await.schema_registry(Vendor::Rockwell).await.unwrap();
  assert_eq!(entries.len(), 1);
  assert!(entries[0].schema_path.ends_with("plc_module_import_schema_l5x.json"));
}

#[tokio::test]
async fn rejects_bad_inputs_without_writing() {
  let f = fixture().await;

  let err = f.import(&f.export("notes.txt", LINE4)).await.unwrap_err();
  assert!(matches!(err, Error::Core(plcvault_core::Error::UnsupportedExtension(_))));
  assert_eq!(err.kind(), ErrorKind::Input);

  let err = f.import(&f.export("omron.xml", "<OmronProject/>")).await.unwrap_err();
  assert!(matches!(err, Error::Core(plcvault_core::Error::UnrecognizedVendor(_))), "{err}");
  assert!(err.to_string().contains("register a schema"));

  let err = f
    .import(&f.export("broken.L5X", "<RSLogix5000Content><Controller>"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Xml(_)), "{err}");
  assert_eq!(err.kind(), ErrorKind::Input);

  let err = f.import(&f.temp.path().join("missing.L5X")).await.unwrap_err();
  assert!(matches!(err, Error::ReadFile { .. }));

  assert_eq!(f.reader().await.table_counts().await.unwrap(), TableCounts::default());
}

#[tokio::test]
async fn missing_bundle_and_failed_header_are_validation_errors() {
  let f = fixture().await;
  std::fs::remove_file(f.schema_root().join(Vendor::Siemens.schema_file())).unwrap();
  let err = f
    .import(&f.export("tia.xml", "<SiemensProject><Controller Name=\"S1\"/></SiemensProject>"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Schema(plcvault_schema::Error::MissingFiles { .. })), "{err}");
  assert_eq!(err.kind(), ErrorKind::Validation);

  write(
    &f.schema_root(),
    Vendor::Schneider.schema_file(),
    r#"{"required": ["controller_name"]}"#,
  );
  let err = f.import(&f.export("unity.xml", "<UnityProject/>")).await.unwrap_err();
  assert!(matches!(err, Error::Schema(plcvault_schema::Error::Validation(_))), "{err}");
}

#[tokio::test]
async fn lossy_decoding_accepts_invalid_utf8() {
  let f = fixture().await;
  let path = f.temp.path().join("latin1.L5X");
  let mut bytes = br#"<RSLogix5000Content><Controller Name="C1" Description=""#.to_vec();
  bytes.push(0xE9);
  bytes.extend_from_slice(br#""/></RSLogix5000Content>"#);
  std::fs::write(&path, bytes).unwrap();

  let summary = f.import(&path).await.unwrap();
  assert_eq!(summary.controller_name, "C1");
}

#[tokio::test]
async fn import_requires_an_open_database() {
  let f = fixture().await;
  let closed = DatabaseManager::new();
  let err = import_module(
    &closed,
    &f.export("line4.L5X", LINE4),
    &f.config,
    Arc::new(NoProgress),
    &NeverCancel,
  )
  .await
  .unwrap_err();
  assert!(matches!(err, Error::NotOpen));
}

#[tokio::test]
async fn validate_only_needs_no_database() {
  let f = fixture().await;
  let closed = DatabaseManager::new();
  let config = ImportConfig { validate_only: true, ..f.config.clone() };
  let summary = import_module(
    &closed,
    &f.export("line4.L5X", LINE4),
    &config,
    Arc::new(NoProgress),
    &NeverCancel,
  )
  .await
  .unwrap();
  assert_eq!(summary.controller_name, "Line4");
  assert_eq!(summary.import_id, None);
}

// ─── Hierarchy ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn tree_shows_latest_snapshot_sorted() {
  let mut f = fixture().await;
  f.config.facility_id = Some(7);
  f.import(&f.export("line4.L5X", LINE4)).await.unwrap();
  f.import(&f.export("line4_b.L5X", &LINE4.replace("Speed", "Alarm"))).await.unwrap();

  let reader = f.reader().await;
  let listing = reader.controllers().await.unwrap();
  assert_eq!(listing.len(), 1);
  assert_eq!(listing[0].name, "Line4");
  assert_eq!(listing[0].snapshots, 2);
  assert_eq!(listing[0].import_id, 2);

  let tree = reader.controller_tree("Line4").await.unwrap().unwrap();
  assert_eq!(tree.vendor, Vendor::Rockwell);
  assert_eq!(tree.import_id, 2);
  assert_eq!(tree.facility_id, Some(7));
  assert_eq!(tree.version.as_deref(), Some("1.0"));
  assert_eq!(tree.tags, ["Alarm", "Start"]);
  assert_eq!(tree.aois, ["Valve"]);
  let programs: Vec<_> = tree.programs.iter().map(|p| p.name.as_str()).collect();
  assert_eq!(programs, ["Idle", "MainProgram"]);
  assert_eq!(tree.programs[1].routines, ["Faults", "MainRoutine"]);

  assert!(reader.controller_tree("Nope").await.unwrap().is_none());
  assert!(reader.module_history("Line4", Vendor::Siemens).await.unwrap().is_none());
}

#[tokio::test]
async fn tree_caps_listed_tags() {
  let f = fixture().await;
  let tags: String = (0..TAG_DISPLAY_LIMIT + 3)
    .map(|i| format!(r#"<Tag Name="T{i:05}" DataType="BOOL"/>"#))
    .collect();
  let body = format!(
    r#"<RSLogix5000Content><Controller Name="Big"><Tags>{tags}</Tags></Controller></RSLogix5000Content>"#
  );
  let summary = f.import(&f.export("big.L5X", &body)).await.unwrap();
  assert_eq!(summary.tag_count, TAG_DISPLAY_LIMIT + 3);

  let tree = f.reader().await.controller_tree("Big").await.unwrap().unwrap();
  assert_eq!(tree.tags.len(), TAG_DISPLAY_LIMIT);
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn open_binds_the_filename() {
  let mut f = fixture().await;
  assert!(f.db.validate_filename_integrity().await);
  assert_eq!(f.db.path(), Some(f.db_path().as_path()));

  let err = f.db.open(f.db_path()).await.unwrap_err();
  assert!(matches!(err, Error::AlreadyOpen(_)));

  f.db.close_with_backup().await;
  assert!(!f.db.validate_filename_integrity().await);

  f.db.open(f.db_path()).await.unwrap();
  assert!(f.db.validate_filename_integrity().await);
}

#[tokio::test]
async fn renamed_file_is_refused() {
  let mut f = fixture().await;
  f.db.close_with_backup().await;

  let renamed = f.temp.path().join("renamed.sqlite");
  std::fs::rename(f.db_path(), &renamed).unwrap();

  let err = f.db.open(&renamed).await.unwrap_err();
  let Error::FilenameMismatch { registered, actual } = &err else {
    panic!("expected FilenameMismatch, got {err}");
  };
  assert_eq!(registered, "plant.sqlite");
  assert_eq!(actual, "renamed.sqlite");
  assert_eq!(err.kind(), ErrorKind::Lifecycle);
  assert!(!f.db.is_open());

  std::fs::rename(&renamed, f.db_path()).unwrap();
  f.db.open(f.db_path()).await.unwrap();
  assert!(f.db.validate_filename_integrity().await);
}

#[tokio::test]
async fn backups_cannot_be_opened_as_working_files() {
  let mut f = fixture().await;
  let outcome = f.db.close_with_backup().await;
  let backup = outcome.backup_path.unwrap();
  assert!(backup.ends_with("plant_bak001.sqlite"));

  let err = f.db.open(&backup).await.unwrap_err();
  assert!(matches!(err, Error::FilenameMismatch { .. }));
}

#[tokio::test]
async fn six_closes_keep_the_five_newest_backups() {
  let mut f = fixture().await;
  for round in 0..6 {
    if round > 0 {
      f.db.open(f.db_path()).await.unwrap();
    }
    let outcome = f.db.close_with_backup().await;
    assert_eq!(outcome.warning, None);
    assert!(outcome.backup_path.is_some());
    assert!(!f.db.is_open());
  }

  let ordinals: Vec<u16> = list_backups(&f.db_path()).unwrap().iter().map(|b| b.ordinal).collect();
  assert_eq!(ordinals, [2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn retention_honors_configured_maximum_and_ordinal_gaps() {
  let temp = TempDir::new().expect("tempdir should create");
  let path = temp.path().join("site.db");
  std::fs::create_dir_all(temp.path()).unwrap();
  std::fs::write(temp.path().join("site_bak007.db"), b"").unwrap();

  let mut db = DatabaseManager::with_max_backups(2);
  for _ in 0..3 {
    db.open(&path).await.unwrap();
    db.close_with_backup().await;
  }

  let ordinals: Vec<u16> = list_backups(&path).unwrap().iter().map(|b| b.ordinal).collect();
  assert_eq!(ordinals, [9, 10]);
}

#[tokio::test]
async fn exhausted_ordinals_become_a_warning_and_still_close() {
  let mut f = fixture().await;
  std::fs::write(f.temp.path().join("plant_bak999.sqlite"), b"").unwrap();

  let outcome = f.db.close_with_backup().await;
  assert_eq!(outcome.backup_path, None);
  assert!(outcome.warning.unwrap().contains("backup failed"));
  assert!(!f.db.is_open());
}

#[tokio::test]
async fn undeletable_old_backup_does_not_fail_the_close() {
  let temp = TempDir::new().expect("tempdir should create");
  let path = temp.path().join("site.db");
  // A directory under a backup name cannot be removed with remove_file.
  std::fs::create_dir_all(temp.path().join("site_bak001.db").join("keep")).unwrap();

  let mut db = DatabaseManager::with_max_backups(1);
  db.open(&path).await.unwrap();
  let outcome = db.close_with_backup().await;

  assert_eq!(outcome.warning, None);
  assert_eq!(outcome.backup_path, Some(temp.path().join("site_bak002.db")));
  assert!(temp.path().join("site_bak001.db").is_dir());
  assert!(!db.is_open());
}

#[tokio::test]
async fn failed_flush_becomes_a_warning_and_still_closes() {
  let mut f = fixture().await;
  // Leave a transaction whose COMMIT fails on a deferred foreign key.
  f.db
    .connection()
    .unwrap()
    .call(|conn| {
      conn.execute_batch(
        "BEGIN;
         PRAGMA defer_foreign_keys = ON;
         INSERT INTO plc_programs (controller_id, name) VALUES (999, 'Orphan');",
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let outcome = f.db.close_with_backup().await;
  let warning = outcome.warning.unwrap();
  assert!(warning.starts_with("flush failed"), "{warning}");
  assert!(!f.db.is_open());

  f.db.open(f.db_path()).await.unwrap();
  let programs: i64 = f
    .db
    .connection()
    .unwrap()
    .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM plc_programs", [], |r| r.get(0))?))
    .await
    .unwrap();
  assert_eq!(programs, 0);
}

#[tokio::test]
async fn plain_close_writes_no_backup() {
  let mut f = fixture().await;
  f.import(&f.export("line4.L5X", LINE4)).await.unwrap();

  let outcome = f.db.close().await;
  assert_eq!(outcome, CloseOutcome::default());
  assert!(!f.db.is_open());
  assert!(list_backups(&f.db_path()).unwrap().is_empty());

  f.db.open(f.db_path()).await.unwrap();
  let counts = f.reader().await.table_counts().await.unwrap();
  assert_ne!(counts, TableCounts::default());
}

#[tokio::test]
async fn close_without_open_is_a_no_op() {
  let mut db = DatabaseManager::new();
  let outcome = db.close_with_backup().await;
  assert_eq!(outcome, CloseOutcome::default());
  assert!(!db.validate_filename_integrity().await);
}

#[tokio::test]
async fn backup_holds_committed_imports() {
  let mut f = fixture().await;
  f.import(&f.export("line4.L5X", LINE4)).await.unwrap();
  let backup = f.db.close_with_backup().await.backup_path.unwrap();

  let conn = rusqlite::Connection::open(&backup).unwrap();
  let imports: i64 = conn.query_row("SELECT COUNT(*) FROM plc_imports", [], |r| r.get(0)).unwrap();
  let bound: String = conn
    .query_row("SELECT value FROM app_metadata WHERE key = 'registered_filename'", [], |r| {
      r.get(0)
    })
    .unwrap();
  assert_eq!(imports, 1);
  assert_eq!(bound, "plant.sqlite");
}

#[tokio::test]
async fn open_creates_missing_parent_directories() {
  let temp = TempDir::new().expect("tempdir should create");
  let path = temp.path().join("nested").join("deeper").join("plant.sqlite");
  let mut db = DatabaseManager::new();
  db.open(&path).await.unwrap();
  assert!(path.exists());
  db.close_with_backup().await;
}
