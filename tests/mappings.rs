//! Mapping interchange and shared (DAG) mappings, end to end.

use std::sync::Arc;

use kg_curator::import;
use kg_curator::mapping::interchange::{self, MappingDocument, MappingDocumentSet};
use kg_curator::mapping::{
    GraphSource, MappingFilter, MappingOutput, MappingSourceType, NodeTemplate, SourceItem,
    SourcePart, TripleTemplate,
};
use kg_curator::store::{GraphStore, PagingOptions, TripleFilter};
use kg_curator::sync::GraphUpdater;

fn pin_document(id: Option<u64>, name: &str, pin: &str, output: MappingOutput) -> MappingDocument {
    MappingDocument {
        id,
        name: name.into(),
        source_type: MappingSourceType::Pin,
        filter: MappingFilter {
            pin_name: Some(pin.into()),
            ..Default::default()
        },
        output,
        ..Default::default()
    }
}

/// Birth and death events sharing one date mapping.
fn life_events() -> MappingDocumentSet {
    let date = pin_document(
        Some(100),
        "date",
        "date",
        MappingOutput {
            nodes: vec![NodeTemplate::with_uid("ts", "x:timespans/ts##", "{pin-value}")],
            triples: vec![TripleTemplate::to_object("crm:P4_has_time-span", "").reversed()],
            ..Default::default()
        },
    );
    let event = |name: &str, class: &str, ordinal: i32| MappingDocument {
        ordinal,
        description: Some(format!("{name} of a person")),
        children: vec![date.clone()],
        ..pin_document(
            None,
            name,
            name,
            MappingOutput {
                nodes: vec![NodeTemplate::with_uid("event", "x:events/{pin-name}", "{pin-value}")],
                triples: vec![TripleTemplate::to_object("rdf:type", class)],
                ..Default::default()
            },
        )
    };
    MappingDocumentSet {
        mappings: vec![event("birth", "crm:E67_Birth", 1), event("death", "crm:E69_Death", 2)],
    }
}

fn without_ids(docs: &mut [MappingDocument]) {
    for doc in docs {
        doc.id = None;
        without_ids(&mut doc.children);
    }
}

fn dante() -> GraphSource {
    GraphSource::new(SourceItem {
        id: "item-dante".into(),
        title: "Dante Alighieri".into(),
        facet_id: "person".into(),
        ..Default::default()
    })
    .with_part(
        SourcePart::new("part-events", "events")
            .with_pin("birth@e1", "born")
            .with_pin("date@e1", "1265")
            .with_pin("death@e2", "died")
            .with_pin("date@e2", "1321"),
    )
}

#[test]
fn export_import_round_trip_through_a_file() {
    let updater = GraphUpdater::new(Arc::new(GraphStore::in_memory().unwrap()));
    let report = updater.import_mappings(&life_events()).unwrap();
    assert_eq!((report.created, report.linked), (3, 1));

    let exported = MappingDocumentSet::export(updater.store()).unwrap();
    assert_eq!(exported.document_count(), 4);

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("mappings.json");
    std::fs::write(&path, serde_json::to_string_pretty(&exported).unwrap()).unwrap();

    let read: MappingDocumentSet = import::read_json(&path).unwrap();
    let target = GraphUpdater::new(Arc::new(GraphStore::in_memory().unwrap()));
    let report = target.import_mappings(&read).unwrap();
    assert_eq!(report.created, 3);
    assert_eq!(report.linked, 1);
    assert_eq!(target.store().get_all_mappings().unwrap().len(), 3);

    let mut before = exported;
    let mut after = MappingDocumentSet::export(target.store()).unwrap();
    without_ids(&mut before.mappings);
    without_ids(&mut after.mappings);
    assert_eq!(before, after);
    assert_eq!(
        interchange::names_by_depth(&after).get(&1),
        Some(&vec!["date".to_string(), "date".to_string()])
    );
}

#[test]
fn shared_mapping_runs_under_each_parent() {
    let updater = GraphUpdater::new(Arc::new(GraphStore::in_memory().unwrap()));
    updater.import_mappings(&life_events()).unwrap();
    updater.update(&dante()).unwrap();

    let store = updater.store();
    let has_time_span = store.lookup_id("crm:P4_has_time-span").unwrap().unwrap();
    let filter = TripleFilter {
        paging: PagingOptions::all(),
        predicate_ids: vec![has_time_span],
        ..Default::default()
    };
    let links = store.get_triples(&filter).unwrap();
    assert_eq!(links.total, 2);

    let birth = store.get_node_by_uid("x:events/birth").unwrap().unwrap();
    let death = store.get_node_by_uid("x:events/death").unwrap().unwrap();
    let span_of = |event: u64| {
        links
            .items
            .iter()
            .find(|t| t.subject_id == event)
            .and_then(|t| t.object_id)
            .unwrap()
    };
    let birth_span = store.get_node(span_of(birth.id)).unwrap().unwrap();
    let death_span = store.get_node(span_of(death.id)).unwrap().unwrap();
    // One UID per date pin, though both come from the same template.
    assert_ne!(birth_span.uid, death_span.uid);
    assert_eq!(birth_span.label, "1265");
    assert_eq!(death_span.label, "1321");
}

#[test]
fn deleting_one_parent_keeps_the_shared_child() {
    let updater = GraphUpdater::new(Arc::new(GraphStore::in_memory().unwrap()));
    updater.import_mappings(&life_events()).unwrap();
    let store = updater.store();
    let birth = store
        .get_root_mappings()
        .unwrap()
        .into_iter()
        .find(|m| m.name == "birth")
        .unwrap();

    assert!(updater.delete_mapping(birth.id).unwrap());
    let names: Vec<String> = store
        .get_all_mappings()
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"date".to_string()));

    // Deleting the last parent takes the child with it.
    let death = store.get_root_mappings().unwrap().remove(0);
    assert!(updater.delete_mapping(death.id).unwrap());
    assert!(store.get_all_mappings().unwrap().is_empty());
    assert!(!updater.delete_mapping(death.id).unwrap());
}

#[test]
fn cyclic_link_is_skipped() {
    let mut event = pin_document(
        Some(1),
        "event",
        "event",
        MappingOutput {
            nodes: vec![NodeTemplate::with_uid("event", "x:events/{pin-eid}", "{pin-value}")],
            ..Default::default()
        },
    );
    // The child repeats its parent's id: the parent becomes its own child.
    event.children = vec![pin_document(Some(1), "event", "event", MappingOutput::default())];
    let set = MappingDocumentSet {
        mappings: vec![event],
    };

    let updater = GraphUpdater::new(Arc::new(GraphStore::in_memory().unwrap()));
    let report = updater.import_mappings(&set).unwrap();
    assert_eq!((report.created, report.linked), (1, 1));

    let exported = MappingDocumentSet::export(updater.store()).unwrap();
    assert_eq!(exported.document_count(), 1);

    let source = GraphSource::new(SourceItem {
        id: "item-1".into(),
        ..Default::default()
    })
    .with_part(SourcePart::new("part-1", "events").with_pin("event@ev1", "sent"));
    let report = updater.update(&source).unwrap();
    assert_eq!(report.applied.added_nodes, 1);
    assert!(updater.store().get_node_by_uid("x:events/ev1").unwrap().is_some());
}
