use annals_core::repo::writer_lock::lock_path_for;
use annals_core::{
    load_batch, write_backup, CandidateAssociation, ConfigError, CoreConfig, DatasetRepository,
    Entity, JsonDocumentRepository, Normalizer, ReconcileService, RepoError, StoreError,
    WriterLock,
};
use serde_json::{json, Value};
use std::path::Path;

fn write_json(path: &Path, value: &Value) {
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn seed(dir: &Path) -> JsonDocumentRepository {
    let entities = dir.join("characters.json");
    let events = dir.join("events.json");
    write_json(
        &entities,
        &json!([{
            "id": "char-001",
            "name": "Phan Đình Phùng",
            "birthYear": 1847,
            "deathYear": 1895,
            "achievements": ["Khởi nghĩa Hương Khê"],
            "journey": [{"year": 1885, "location": "Hà Tĩnh"}]
        }]),
    );
    write_json(
        &events,
        &json!([{
            "id": "event-030",
            "name": "Khởi nghĩa Hương Khê",
            "date": {"year": 1885, "month": 7},
            "description": "Phong trào Cần Vương",
            "relatedCharacters": []
        }]),
    );
    JsonDocumentRepository::new(entities, events)
}

#[test]
fn save_round_trips_unknown_fields_and_utf8() {
    let dir = tempfile::tempdir().unwrap();
    let repo = seed(dir.path());
    let mut dataset = repo.load(Normalizer::default()).unwrap();

    let report = ReconcileService::default().reconcile(
        &mut dataset,
        &[CandidateAssociation::new("Cao Thắng", Some("event-030"))],
    );
    assert_eq!(report.summary.created, 1);
    repo.save(&dataset).unwrap();

    let raw = std::fs::read_to_string(repo.entities_path()).unwrap();
    assert!(raw.contains("Khởi nghĩa Hương Khê"));
    assert!(raw.contains("\"Cao Thắng\""));
    assert!(raw.ends_with("]\n"));
    assert!(raw.starts_with("[\n  {\n"));

    let entities: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(entities[0]["journey"][0]["location"], "Hà Tĩnh");
    assert_eq!(entities[1]["relatedEvents"], json!(["event-030"]));

    let events: Value =
        serde_json::from_str(&std::fs::read_to_string(repo.events_path()).unwrap()).unwrap();
    assert_eq!(events[0]["description"], "Phong trào Cần Vương");
    assert_eq!(events[0]["date"]["month"], 7);
    assert_eq!(events[0]["relatedCharacters"], json!(["char-002"]));

    let reloaded = repo.load(Normalizer::default()).unwrap();
    assert_eq!(reloaded.entities.all(), dataset.entities.all());
}

#[test]
fn save_leaves_no_temp_files_behind() {
    let dir = tempfile::tempdir().unwrap();
    let repo = seed(dir.path());
    let dataset = repo.load(Normalizer::default()).unwrap();
    repo.save(&dataset).unwrap();

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["characters.json", "events.json"]);
}

#[test]
fn malformed_document_aborts_the_load() {
    let dir = tempfile::tempdir().unwrap();
    let repo = seed(dir.path());
    std::fs::write(repo.events_path(), "[{\"id\": ").unwrap();

    let err = repo.load(Normalizer::default()).unwrap_err();
    match err {
        RepoError::Parse { path, .. } => assert!(path.ends_with("events.json")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn duplicate_ids_are_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let repo = seed(dir.path());
    write_json(
        repo.entities_path(),
        &json!([
            {"id": "char-001", "name": "Phan Đình Phùng"},
            {"id": "char-001", "name": "Cao Thắng"}
        ]),
    );

    let err = repo.load(Normalizer::default()).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Store(StoreError::DuplicateId(ref id)) if id == "char-001"
    ));
}

#[test]
fn writer_lock_is_exclusive_and_released_on_drop() {
    let dir = tempfile::tempdir().unwrap();
    let repo = seed(dir.path());

    let lock = WriterLock::acquire(repo.entities_path()).unwrap();
    assert!(lock.path().exists());
    let err = WriterLock::acquire(repo.entities_path()).unwrap_err();
    assert!(matches!(err, RepoError::Locked(_)));

    drop(lock);
    assert!(!lock_path_for(repo.entities_path()).exists());
    WriterLock::acquire(repo.entities_path()).unwrap();
}

#[test]
fn backup_document_holds_removed_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("removed_characters_backup.json");
    let mut entity = Entity::new("char-009", "Lê Lợi");
    entity.birth_year = Some(1385);

    write_backup(&path, &[entity.clone()]).unwrap();

    let restored: Vec<Entity> =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(restored, vec![entity]);
}

#[test]
fn batch_document_loads_records_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("batch.json");
    write_json(
        &path,
        &json!([
            {"name": "Hoàng Hoa Thám", "eventId": "event-040"},
            {"name": "Đề Nắm", "relatedEvents": ["event-040", "event-041"], "role": "Thủ lĩnh"}
        ]),
    );

    let records = load_batch(&path).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].related_events, vec!["event-040", "event-041"]);
    assert_eq!(records[1].attributes.role.as_deref(), Some("Thủ lĩnh"));
}

#[test]
fn config_file_is_loaded_and_missing_file_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("annals.toml");
    std::fs::write(
        &path,
        "id_prefix = \"person\"\nid_width = 4\n\n[audit]\nscope_start = 1858\nscope_end = 1945\n",
    )
    .unwrap();

    let config = CoreConfig::load(&path).unwrap();
    assert_eq!(config.allocator().unwrap().next(["person-0009"]).unwrap(), "person-0010");
    assert_eq!(config.audit_scope().unwrap().unwrap().end, 1945);

    let err = CoreConfig::load(&dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}
