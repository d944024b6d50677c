use annals_core::normalize::mojibake::simulate_mojibake;
use annals_core::{
    expand_batch, BatchRecord, CandidateAssociation, CandidateAttributes, CoreConfig, Dataset,
    ItemOutcome, Normalizer, ReconcileService,
};
use serde_json::{json, Value};

fn dataset(entities: Value, events: Value) -> Dataset {
    Dataset::from_records(
        Normalizer::default(),
        serde_json::from_value(entities).unwrap(),
        serde_json::from_value(events).unwrap(),
    )
    .unwrap()
}

fn fixture() -> Dataset {
    dataset(
        json!([
            {"id": "char-001", "name": "Trương Định", "birthYear": 1820, "deathYear": 1864},
            {"id": "char-002", "name": "Nguyễn Tri Phương", "relatedEvents": ["event-001"]}
        ]),
        json!([
            {"id": "event-001", "name": "Đà Nẵng", "date": {"year": 1858}, "relatedCharacters": ["char-002"]},
            {"id": "event-003", "name": "Hỏa thuyền Espérance", "date": {"year": 1861}},
            {"id": "event-048", "name": "Kiên Giang", "date": {"year": 1868}}
        ]),
    )
}

fn candidate(name: &str, event_id: &str) -> CandidateAssociation {
    CandidateAssociation::new(name, Some(event_id))
}

fn assert_symmetric(dataset: &Dataset) {
    for entity in dataset.entities.all() {
        for event_id in &entity.related_events {
            let event = dataset.events.get(event_id).unwrap();
            assert!(event.references(&entity.id), "{} -> {event_id}", entity.id);
        }
    }
    for event in dataset.events.all() {
        for entity_id in &event.related_characters {
            let entity = dataset.entities.get(entity_id).unwrap();
            assert!(entity.is_linked_to(&event.id), "{} -> {entity_id}", event.id);
        }
    }
}

#[test]
fn same_person_across_two_events_becomes_one_entity() {
    let mut data = fixture();
    let batch = vec![
        candidate("Nguyễn Trung Trực", "event-003"),
        candidate("nguyễn trung trực", "event-048"),
    ];

    let report = ReconcileService::default().reconcile(&mut data, &batch);

    assert_eq!(
        report.items[0].outcome,
        ItemOutcome::Created {
            id: "char-003".into(),
            placeholder: true
        }
    );
    assert_eq!(
        report.items[1].outcome,
        ItemOutcome::Reused {
            id: "char-003".into()
        }
    );
    assert_eq!(data.entities.len(), 3);
    let entity = data.entities.get("char-003").unwrap();
    assert_eq!(entity.related_events, vec!["event-003", "event-048"]);
    assert_eq!(
        data.events.get("event-003").unwrap().related_characters,
        vec!["char-003"]
    );
    assert_symmetric(&data);
}

#[test]
fn rerunning_a_batch_changes_nothing() {
    let mut data = fixture();
    let batch = vec![
        candidate("Nguyễn Trung Trực", "event-003"),
        candidate("Trương Định", "event-003"),
    ];
    let service = ReconcileService::default();
    service.reconcile(&mut data, &batch);
    let entities_after_first = data.entities.all().to_vec();
    let events_after_first = data.events.all().to_vec();

    let second = service.reconcile(&mut data, &batch);

    assert_eq!(second.summary.created, 0);
    assert_eq!(second.summary.skipped, 2);
    assert!(!second.has_changes());
    assert_eq!(data.entities.all(), entities_after_first.as_slice());
    assert_eq!(data.events.all(), events_after_first.as_slice());
}

#[test]
fn missing_event_fails_one_item_without_rolling_back_others() {
    let mut data = fixture();
    let batch = vec![
        candidate("Võ Duy Dương", "event-003"),
        candidate("Trương Định", "event-003"),
        candidate("Doãn Uẩn", "event-999"),
        candidate("Phan Tòng", "event-048"),
        candidate("Võ Duy Dương", "event-048"),
    ];

    let report = ReconcileService::default().reconcile(&mut data, &batch);

    assert!(matches!(report.items[0].outcome, ItemOutcome::Created { .. }));
    assert!(matches!(report.items[1].outcome, ItemOutcome::Reused { .. }));
    assert_eq!(
        report.items[2].outcome,
        ItemOutcome::EventNotFound {
            event_id: "event-999".into()
        }
    );
    assert!(matches!(report.items[3].outcome, ItemOutcome::Created { .. }));
    assert!(matches!(report.items[4].outcome, ItemOutcome::Reused { .. }));
    assert_eq!(report.summary.created, 2);
    assert_eq!(report.summary.reused, 2);
    assert_eq!(report.summary.failed, 1);
    assert!(data.entities.find_by_name("Doãn Uẩn").is_none());
    assert_symmetric(&data);
}

#[test]
fn blank_name_is_reported_as_failed() {
    let mut data = fixture();
    let report =
        ReconcileService::default().reconcile(&mut data, &[candidate("   ", "event-003")]);
    assert!(matches!(report.items[0].outcome, ItemOutcome::Failed { .. }));
    assert_eq!(data.entities.len(), 2);
    assert!(data.events.get("event-003").unwrap().related_characters.is_empty());
}

#[test]
fn ids_follow_the_highest_existing_suffix() {
    let mut data = dataset(
        json!([
            {"id": "char-001", "name": "Lê Đình Lý"},
            {"id": "char-007", "name": "Phạm Văn Nghị"},
            {"id": "char-x1", "name": "Trần Hoằng"}
        ]),
        json!([{"id": "event-001", "date": {"year": 1858}}]),
    );
    let batch = vec![
        candidate("Nguyễn Duy", "event-001"),
        candidate("Phạm Thế Hiển", "event-001"),
    ];

    let report = ReconcileService::default().reconcile(&mut data, &batch);

    let ids: Vec<_> = report
        .items
        .iter()
        .filter_map(|item| item.outcome.entity_id())
        .collect();
    assert_eq!(ids, vec!["char-008", "char-009"]);
}

#[test]
fn variant_spellings_resolve_to_the_stored_entity() {
    let mut data = fixture();
    let corrupted = simulate_mojibake("Nguyễn Tri Phương");
    let batch = vec![
        candidate(&corrupted, "event-003"),
        candidate("  nguyễn   tri PHƯƠNG ", "event-048"),
        candidate("Tướng Nguyễn Tri Phương", "event-001"),
    ];

    let report = ReconcileService::default().reconcile(&mut data, &batch);

    assert_eq!(report.summary.created, 0);
    assert_eq!(
        report.items[0].outcome,
        ItemOutcome::Reused {
            id: "char-002".into()
        }
    );
    assert_eq!(
        report.items[2].outcome,
        ItemOutcome::SkippedDuplicate {
            id: "char-002".into()
        }
    );
    assert_eq!(
        data.entities.get("char-002").unwrap().related_events,
        vec!["event-001", "event-003", "event-048"]
    );
}

#[test]
fn differently_titled_names_do_not_merge() {
    let mut data = dataset(
        json!([{"id": "char-001", "name": "Thủy sư Đô đốc François Page"}]),
        json!([{"id": "event-001", "date": {"year": 1858}}]),
    );
    let service = ReconcileService::default();

    let untitled = service.reconcile(&mut data, &[candidate("François Page", "event-001")]);
    assert_eq!(
        untitled.items[0].outcome,
        ItemOutcome::Reused {
            id: "char-001".into()
        }
    );

    let retitled = service.reconcile(&mut data, &[candidate("Đại tá François Page", "event-001")]);
    assert!(matches!(
        retitled.items[0].outcome,
        ItemOutcome::Created { .. }
    ));

    // Two entities now share the bare form, so the untitled name is ambiguous.
    assert!(data.entities.find_by_name("François Page").is_none());
}

#[test]
fn configured_alias_joins_variant_names() {
    let config = CoreConfig::from_toml_str(
        r#"
        [aliases]
        "Rigault de Genouilly" = "Charles Rigault de Genouilly"
        "#,
    )
    .unwrap();
    let mut data = Dataset::from_records(
        config.normalizer(),
        serde_json::from_value(json!([
            {"id": "char-001", "name": "Charles Rigault de Genouilly"}
        ]))
        .unwrap(),
        serde_json::from_value(json!([{"id": "event-002", "date": {"year": 1859}}])).unwrap(),
    )
    .unwrap();
    let service = ReconcileService::from_config(&config).unwrap();

    let report = service.reconcile(&mut data, &[candidate("Rigault de Genouilly", "event-002")]);

    assert_eq!(
        report.items[0].outcome,
        ItemOutcome::Reused {
            id: "char-001".into()
        }
    );
}

#[test]
fn created_entities_get_defaults_and_repaired_names() {
    let mut data = fixture();
    let corrupted = simulate_mojibake("Nguyễn Trung Trực");
    let report = ReconcileService::default().reconcile(&mut data, &[candidate(&corrupted, "event-003")]);

    assert_eq!(report.summary.placeholders, 1);
    let entity = data.entities.get("char-003").unwrap();
    assert_eq!(entity.name, "Nguyễn Trung Trực");
    assert_eq!(entity.role.as_deref(), Some("unspecified historical figure"));
    assert_eq!(entity.biography.as_deref(), Some("No biography recorded."));
    assert_eq!(
        entity.avatar.as_deref(),
        Some("/images/characters/nguyễn-trung-trực.jpg")
    );
    assert_eq!(entity.extra["achievements"], json!([]));
    assert_eq!(entity.extra["journey"], json!([]));
}

#[test]
fn supplied_attributes_are_used_and_lifespan_conflicts_flagged() {
    let mut data = fixture();
    let attributes = CandidateAttributes {
        birth_year: Some(1900),
        role: Some("Lãnh binh".into()),
        biography: Some("Chỉ huy nghĩa quân.".into()),
        ..CandidateAttributes::default()
    };
    let batch = vec![candidate("Nguyễn Hữu Huân", "event-003").with_attributes(attributes)];

    let report = ReconcileService::default().reconcile(&mut data, &batch);

    assert_eq!(
        report.items[0].outcome,
        ItemOutcome::Created {
            id: "char-003".into(),
            placeholder: false
        }
    );
    assert!(report.items[0].lifespan_conflict);
    assert_eq!(report.summary.lifespan_conflicts, 1);
    assert!(data.entities.get("char-003").unwrap().is_linked_to("event-003"));
}

#[test]
fn invalid_candidate_lifespan_fails_the_item() {
    let mut data = fixture();
    let attributes = CandidateAttributes {
        birth_year: Some(1870),
        death_year: Some(1850),
        ..CandidateAttributes::default()
    };
    let batch = vec![candidate("Phan Thanh Giản", "event-003").with_attributes(attributes)];

    let report = ReconcileService::default().reconcile(&mut data, &batch);

    assert!(matches!(report.items[0].outcome, ItemOutcome::Failed { .. }));
    assert_eq!(data.entities.len(), 2);
    assert!(data.events.get("event-003").unwrap().related_characters.is_empty());
}

#[test]
fn dry_run_leaves_dataset_untouched() {
    let data = fixture();
    let before = data.entities.all().to_vec();
    let report = ReconcileService::default().dry_run(&data, &[candidate("Lâm Duy Hiệp", "event-003")]);

    assert!(report.dry_run);
    assert_eq!(report.summary.created, 1);
    assert_eq!(data.entities.all(), before.as_slice());
    assert!(data.events.get("event-003").unwrap().related_characters.is_empty());
}

#[test]
fn batch_documents_expand_related_events_and_keep_extra_fields() {
    let records: Vec<BatchRecord> = serde_json::from_value(json!([
        {
            "name": "Nguyễn Trung Trực",
            "relatedEvents": ["event-003", "event-048"],
            "birthYear": 1838,
            "deathYear": 1868,
            "achievements": ["Đốt tàu Espérance"]
        },
        {"name": "Trương Định", "eventId": "event-003"}
    ]))
    .unwrap();
    let batch = expand_batch(records);
    assert_eq!(batch.len(), 3);

    let mut data = fixture();
    let report = ReconcileService::default().reconcile(&mut data, &batch);

    assert_eq!(report.summary.created, 1);
    assert_eq!(report.summary.reused, 2);
    let created = data.entities.find_by_name("Nguyễn Trung Trực").unwrap();
    assert_eq!(created.birth_year, Some(1838));
    assert_eq!(created.extra["achievements"], json!(["Đốt tàu Espérance"]));
    assert_eq!(created.extra["journey"], json!([]));
    assert_eq!(
        data.events.get("event-003").unwrap().related_characters,
        vec!["char-003", "char-001"]
    );
    assert_symmetric(&data);
}

#[test]
fn report_serializes_outcomes_as_tagged_entries() {
    let mut data = fixture();
    let report = ReconcileService::default().reconcile(&mut data, &[candidate("Trương Định", "event-404")]);
    let rendered = serde_json::to_value(&report).unwrap();
    assert_eq!(rendered["items"][0]["outcome"]["kind"], "event_not_found");
    assert_eq!(rendered["items"][0]["outcome"]["event_id"], "event-404");
    assert_eq!(rendered["items"][0]["event_id"], "event-404");
    assert_eq!(rendered["summary"]["failed"], 1);
}
