//! End-to-end synchronization of one source record.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::MappingResult;
use crate::graph::GraphSet;
use crate::mapping::interchange::{self, ImportReport, MappingDocumentSet};
use crate::mapping::{GraphSource, MapperOptions, MappingCache, NodeMapper};
use crate::registry::require_non_empty;
use crate::store::{GraphSetDeletion, GraphStore};

use super::diff::{AppliedDiff, GraphSetDiffer};
use super::metadata::{MetadataSupplier, collect_metadata};

/// Outcome of [`GraphUpdater::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub source_id: String,
    /// Scopes diffed, the no-SID scope first as `""`.
    pub scopes: Vec<String>,
    #[serde(flatten)]
    pub applied: AppliedDiff,
}

impl fmt::Display for UpdateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = &self.applied;
        write!(
            f,
            "{}: nodes +{} ~{} -{} (kept {}), triples +{} ~{} -{}",
            self.source_id,
            a.added_nodes,
            a.updated_nodes,
            a.deleted_nodes,
            a.protected_nodes,
            a.added_triples,
            a.updated_triples,
            a.deleted_triples,
        )
    }
}

/// Runs mapper, differ and store together.
///
/// Owns the mapping cache; mapping edits made through the updater clear it.
pub struct GraphUpdater {
    store: Arc<GraphStore>,
    cache: MappingCache,
    suppliers: Vec<Box<dyn MetadataSupplier>>,
    differ: GraphSetDiffer,
    options: MapperOptions,
}

impl GraphUpdater {
    pub fn new(store: Arc<GraphStore>) -> Self {
        let differ = GraphSetDiffer::new(store.vocabulary().predicate_tag.clone());
        Self {
            cache: MappingCache::new(Arc::clone(&store)),
            store,
            suppliers: Vec::new(),
            differ,
            options: MapperOptions::default(),
        }
    }

    pub fn with_options(mut self, options: MapperOptions) -> Self {
        self.options = options;
        self
    }

    /// Register a metadata supplier; suppliers run in registration order.
    pub fn with_supplier(mut self, supplier: impl MetadataSupplier + 'static) -> Self {
        self.suppliers.push(Box::new(supplier));
        self
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn cache(&self) -> &MappingCache {
        &self.cache
    }

    fn mapper(&self) -> NodeMapper<'_> {
        NodeMapper::new(&self.cache, self.options)
            .with_predicate_tag(self.store.vocabulary().predicate_tag.clone())
    }

    /// Map a record without storing anything.
    ///
    /// UIDs are minted in a transaction that is rolled back, so suffixes of
    /// new UIDs may differ from what [`update`](Self::update) assigns.
    pub fn preview(&self, source: &GraphSource) -> MappingResult<GraphSet> {
        let metadata = collect_metadata(&self.suppliers, source)?;
        let mut txn = self.store.begin()?;
        let set = self.mapper().map(source, &metadata, &mut txn)?;
        txn.rollback()?;
        Ok(set)
    }

    /// Map `source` and reconcile every scope it owns, in one transaction.
    ///
    /// Scopes run in order: the no-SID scope (never deleting, never
    /// overwriting existing nodes), the item, then each part. A part that
    /// produced nothing still has its stale fragment removed.
    pub fn update(&self, source: &GraphSource) -> MappingResult<UpdateReport> {
        require_non_empty("item.id", &source.item.id)?;
        let span = tracing::info_span!("update", item = %source.item.id);
        let _enter = span.enter();

        let metadata = collect_metadata(&self.suppliers, source)?;
        let mut txn = self.store.begin()?;
        let set = self.mapper().map(source, &metadata, &mut txn)?;

        let mut report = UpdateReport {
            source_id: source.item.id.clone(),
            ..Default::default()
        };
        let mut scopes = vec![String::new()];
        for id in source.record_ids() {
            if !scopes.iter().any(|s| s == id) {
                scopes.push(id.to_string());
            }
        }

        for scope in &scopes {
            let new = set.scoped(scope);
            let old = if scope.is_empty() {
                GraphSet::new()
            } else {
                txn.get_graph_set(scope)?
            };
            let diff = self.differ.diff(&new, &old);
            if diff.is_empty() {
                continue;
            }
            let applied = txn.apply_diff(&diff, scope.is_empty())?;
            tracing::debug!(
                scope = %scope,
                added_nodes = applied.added_nodes,
                added_triples = applied.added_triples,
                deleted_triples = applied.deleted_triples,
                "applied scope"
            );
            report.applied.merge(applied);
        }
        report.scopes = scopes;

        txn.commit()?;
        tracing::info!(
            touched = report.applied.touched.len(),
            noop = report.applied.is_noop(),
            "record synchronized"
        );
        Ok(report)
    }

    /// Remove everything stored for a source record.
    pub fn delete_graph_set(&self, source_id: &str) -> MappingResult<GraphSetDeletion> {
        Ok(self.store.delete_graph_set(source_id)?)
    }

    pub fn import_mappings(&self, set: &MappingDocumentSet) -> MappingResult<ImportReport> {
        let report = self
            .store
            .write(|txn| interchange::import_mappings(txn, set))?;
        self.cache.clear();
        Ok(report)
    }

    pub fn delete_mapping(&self, id: u64) -> MappingResult<bool> {
        let deleted = self.store.write(|txn| txn.delete_mapping(id))?;
        self.cache.clear();
        Ok(deleted)
    }
}

impl fmt::Debug for GraphUpdater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphUpdater")
            .field("cache", &self.cache)
            .field("suppliers", &self.suppliers.len())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::interchange::MappingDocument;
    use crate::mapping::{MappingOutput, NodeTemplate, SourceItem, SourcePart, TripleTemplate};
    use crate::mapping::{MappingFilter, MappingSourceType};
    use crate::store::NodeFilter;
    use crate::sync::metadata::StaticMetadata;

    fn updater() -> GraphUpdater {
        let store = Arc::new(GraphStore::in_memory().unwrap());
        let updater = GraphUpdater::new(store).with_supplier(StaticMetadata::new().with("ns", "x"));
        let set = MappingDocumentSet {
            mappings: vec![MappingDocument {
                name: "person".into(),
                source_type: MappingSourceType::Pin,
                filter: MappingFilter {
                    pin_name: Some("person".into()),
                    ..Default::default()
                },
                output: MappingOutput {
                    nodes: vec![NodeTemplate::prefixed("p", "{ns}:persons/", "")],
                    triples: vec![TripleTemplate::to_object("rdf:type", "crm:E21_Person")],
                    ..Default::default()
                },
                ..Default::default()
            }],
        };
        updater.import_mappings(&set).unwrap();
        updater
    }

    fn source(people: &[(&str, &str)]) -> GraphSource {
        let mut part = SourcePart::new("part-1", "persons");
        for (eid, name) in people {
            part = part.with_pin(format!("person@{eid}"), *name);
        }
        GraphSource::new(SourceItem {
            id: "item-1".into(),
            title: "Letter".into(),
            ..Default::default()
        })
        .with_part(part)
    }

    #[test]
    fn second_update_is_a_noop() {
        let updater = updater();
        let first = updater.update(&source(&[("p1", "Guido")])).unwrap();
        assert_eq!(first.applied.added_triples, 1);
        assert_eq!(first.scopes, vec!["", "item-1", "part-1"]);

        let second = updater.update(&source(&[("p1", "Guido")])).unwrap();
        assert!(second.applied.is_noop(), "{second}");
    }

    #[test]
    fn removed_pin_removes_its_fragment() {
        let updater = updater();
        updater.update(&source(&[("p1", "Guido"), ("p2", "Cino")])).unwrap();
        let report = updater.update(&source(&[("p1", "Guido")])).unwrap();
        assert_eq!(report.applied.deleted_triples, 1);
        assert_eq!(report.applied.deleted_nodes, 1);

        let store = updater.store();
        assert!(store.get_node_by_uid("x:persons/cino").unwrap().is_none());
        assert!(store.get_node_by_uid("x:persons/guido").unwrap().is_some());
        // The class stays: it carries no SID.
        assert!(store.get_node_by_uid("crm:E21_Person").unwrap().is_some());
    }

    #[test]
    fn delete_graph_set_keeps_shared_vocabulary() {
        let updater = updater();
        updater.update(&source(&[("p1", "Guido")])).unwrap();
        let deletion = updater.delete_graph_set("part-1").unwrap();
        assert_eq!(deletion.deleted_triples.len(), 1);
        assert_eq!(deletion.deleted_nodes.len(), 1);

        let remaining = updater.store().get_nodes(&NodeFilter::default()).unwrap();
        assert!(remaining.items.iter().all(|n| n.sid.is_none()));
    }
}
