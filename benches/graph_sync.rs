//! Benchmarks for record mapping and fragment reconciliation.

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use kg_curator::mapping::interchange::{MappingDocument, MappingDocumentSet};
use kg_curator::mapping::{
    GraphSource, MappingFilter, MappingOutput, MappingSourceType, NodeTemplate, SourceItem,
    SourcePart, TripleTemplate,
};
use kg_curator::store::GraphStore;
use kg_curator::sync::{GraphSetDiffer, GraphUpdater};

const EVENTS: usize = 50;

fn updater() -> GraphUpdater {
    let place = MappingDocument {
        name: "event place".into(),
        source_type: MappingSourceType::Pin,
        filter: MappingFilter {
            pin_name: Some("event-place".into()),
            ..Default::default()
        },
        output: MappingOutput {
            nodes: vec![NodeTemplate::prefixed("place", "x:places/", "{pin-value}")],
            triples: vec![
                TripleTemplate::to_object("rdf:type", "crm:E53_Place"),
                TripleTemplate::to_object("crm:P7_took_place_at", "").reversed(),
            ],
            ..Default::default()
        },
        ..Default::default()
    };
    let event = MappingDocument {
        name: "event".into(),
        source_type: MappingSourceType::Pin,
        filter: MappingFilter {
            pin_name: Some("event-type".into()),
            ..Default::default()
        },
        output: MappingOutput {
            nodes: vec![NodeTemplate::with_uid("event", "x:events/{pin-eid}", "{pin-value}")],
            triples: vec![TripleTemplate::to_object("rdf:type", "crm:E7_activity")],
            ..Default::default()
        },
        children: vec![place],
        ..Default::default()
    };
    let updater = GraphUpdater::new(Arc::new(GraphStore::in_memory().unwrap()));
    updater
        .import_mappings(&MappingDocumentSet {
            mappings: vec![event],
        })
        .unwrap();
    updater
}

fn record() -> GraphSource {
    let mut part = SourcePart::new("part-1", "events");
    for i in 0..EVENTS {
        part = part
            .with_pin(format!("event-type@ev{i}"), "sent")
            .with_pin(format!("event-place@ev{i}"), format!("Place {i}"));
    }
    GraphSource::new(SourceItem {
        id: "item-1".into(),
        title: "Register".into(),
        ..Default::default()
    })
    .with_part(part)
}

fn bench_map(c: &mut Criterion) {
    let updater = updater();
    let source = record();
    c.bench_function("map_50_events", |bench| {
        bench.iter(|| black_box(updater.preview(&source).unwrap()))
    });
}

fn bench_diff(c: &mut Criterion) {
    let updater = updater();
    let source = record();
    updater.update(&source).unwrap();
    let new = updater.preview(&source).unwrap().scoped("part-1");
    let old = updater.store().get_graph_set("part-1").unwrap();
    let differ = GraphSetDiffer::new("property");

    c.bench_function("diff_50_events", |bench| {
        bench.iter(|| black_box(differ.diff(&new, &old)))
    });
}

fn bench_noop_update(c: &mut Criterion) {
    let updater = updater();
    let source = record();
    updater.update(&source).unwrap();

    c.bench_function("noop_update_50_events", |bench| {
        bench.iter(|| black_box(updater.update(&source).unwrap()))
    });
}

criterion_group!(benches, bench_map, bench_diff, bench_noop_update);
criterion_main!(benches);
