//! Write transactions over the graph store.
//!
//! A [`GraphTxn`] wraps one redb write transaction. Mutations that can change
//! class membership queue the affected node ids; the queue is drained by
//! [`GraphTxn::commit`] right before the redb commit, so closures are always
//! refreshed in the same transaction as the triples they derive from.

use std::collections::BTreeSet;

use redb::{MultimapTableDefinition, ReadableMultimapTable, ReadableTable, WriteTransaction};

use crate::error::{GraphError, GraphResult};
use crate::graph::classes::{self, ClassPredicates};
use crate::graph::{
    GraphSet, Node, NodeClassEntry, Property, Triple, normalize_key, numeric_projection,
};
use crate::mapping::NodeMapping;
use crate::registry::require_non_empty;

use super::GraphStore;
use super::tables::*;

/// What [`GraphTxn::delete_graph_set`] removed and kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphSetDeletion {
    pub deleted_triples: Vec<u64>,
    pub deleted_nodes: Vec<u64>,
    /// Scoped nodes spared by the referential guard.
    pub kept_nodes: Vec<u64>,
}

/// One write transaction.
///
/// Dropping it without calling [`commit`](Self::commit) discards every change.
pub struct GraphTxn<'s> {
    pub(crate) store: &'s GraphStore,
    pub(crate) txn: WriteTransaction,
    /// URIs interned by this transaction, published to the cache on commit.
    pub(crate) new_uris: Vec<(u64, String)>,
    refresh: BTreeSet<u64>,
    class_predicates: Option<ClassPredicates>,
}

impl<'s> GraphTxn<'s> {
    pub(crate) fn new(store: &'s GraphStore, txn: WriteTransaction) -> Self {
        Self {
            store,
            txn,
            new_uris: Vec::new(),
            refresh: BTreeSet::new(),
            class_predicates: None,
        }
    }

    pub fn store(&self) -> &'s GraphStore {
        self.store
    }

    /// Refresh queued closures, commit, then publish new URIs.
    pub fn commit(mut self) -> GraphResult<()> {
        self.flush_class_refresh()?;
        let GraphTxn {
            store,
            txn,
            new_uris,
            ..
        } = self;
        txn.commit()?;
        for (id, uri) in new_uris {
            store.uri_cache().insert(id, &uri);
        }
        Ok(())
    }

    /// Discard every change made in this transaction.
    pub fn rollback(self) -> GraphResult<()> {
        self.txn.abort()?;
        Ok(())
    }

    /// Allocate the next id from a named counter.
    pub(crate) fn next_id(&mut self, counter: &str) -> GraphResult<u64> {
        let mut table = self.txn.open_table(COUNTERS)?;
        let next = table.get(counter)?.map(|g| g.value()).unwrap_or(0) + 1;
        table.insert(counter, next)?;
        Ok(next)
    }

    fn set_sid_index(
        &self,
        index: MultimapTableDefinition<'static, &'static str, u64>,
        sid: Option<&str>,
        id: u64,
        present: bool,
    ) -> GraphResult<()> {
        let Some(sid) = sid.filter(|s| !s.is_empty()) else {
            return Ok(());
        };
        let key = normalize_key(sid);
        let mut table = self.txn.open_multimap_table(index)?;
        if present {
            table.insert(key.as_str(), id)?;
        } else {
            table.remove(key.as_str(), id)?;
        }
        Ok(())
    }

    fn ids_in(
        &self,
        index: MultimapTableDefinition<'static, u64, u64>,
        key: u64,
    ) -> GraphResult<Vec<u64>> {
        let table = self.txn.open_multimap_table(index)?;
        Ok(multimap_ids(&table, key)?)
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    pub fn get_node(&self, id: u64) -> GraphResult<Option<Node>> {
        let table = self.txn.open_table(NODES)?;
        Ok(get_record(&table, id)?)
    }

    pub fn get_node_by_uid(&self, uid: &str) -> GraphResult<Option<Node>> {
        match self.lookup_id(uid)? {
            Some(id) => self.get_node(id),
            None => Ok(None),
        }
    }

    fn put_node(&self, node: &Node) -> GraphResult<()> {
        let bytes = encode(node)?;
        let mut table = self.txn.open_table(NODES)?;
        table.insert(node.id, bytes.as_slice())?;
        Ok(())
    }

    /// Insert or update a node, interning its UID.
    ///
    /// On return `node.id` is set. With `no_update_if_exists` an existing
    /// node is left untouched and copied back into `node`. Returns whether
    /// anything was written.
    pub fn upsert_node(&mut self, node: &mut Node, no_update_if_exists: bool) -> GraphResult<bool> {
        require_non_empty("uid", &node.uid)?;
        let id = self.intern_uri(&node.uid)?;
        node.id = id;
        if node.label.trim().is_empty() {
            node.label = node.uid.clone();
        }

        if let Some(existing) = self.get_node(id)? {
            if no_update_if_exists || !node.differs_from(&existing) {
                *node = existing;
                return Ok(false);
            }
            self.set_sid_index(NODES_BY_SID, existing.sid.as_deref(), id, false)?;
            node.uid = existing.uid;
        }

        self.put_node(node)?;
        self.set_sid_index(NODES_BY_SID, node.sid.as_deref(), id, true)?;
        tracing::trace!(id, uid = %node.uid, "upserted node");
        Ok(true)
    }

    /// Delete a node together with every triple using it, its property row
    /// and its class entries. Returns `false` if there was no such node.
    pub fn delete_node(&mut self, id: u64) -> GraphResult<bool> {
        let Some(node) = self.get_node(id)? else {
            return Ok(false);
        };

        let mut triple_ids = BTreeSet::new();
        triple_ids.extend(self.ids_in(TRIPLES_BY_SUBJECT, id)?);
        triple_ids.extend(self.ids_in(TRIPLES_BY_PREDICATE, id)?);
        triple_ids.extend(self.ids_in(TRIPLES_BY_OBJECT, id)?);
        for triple_id in triple_ids {
            self.delete_triple(triple_id)?;
        }
        self.delete_property(id)?;

        // Members reached through this class lose it on refresh.
        for member in self.class_members(id)? {
            self.refresh.insert(member);
        }
        self.replace_node_classes(id, &[])?;
        self.refresh.remove(&id);

        self.set_sid_index(NODES_BY_SID, node.sid.as_deref(), id, false)?;
        let mut table = self.txn.open_table(NODES)?;
        table.remove(id)?;
        tracing::trace!(id, uid = %node.uid, "deleted node");
        Ok(true)
    }

    /// Whether a node belongs to the shared vocabulary: a class, or tagged
    /// as a predicate.
    pub(crate) fn is_vocabulary(&self, node: &Node) -> bool {
        node.is_class || node.has_tag(&self.store.vocabulary().predicate_tag)
    }

    /// Whether any stored triple outside `excluding` uses the node.
    pub(crate) fn is_referenced(&self, node_id: u64, excluding: &BTreeSet<u64>) -> GraphResult<bool> {
        for index in [TRIPLES_BY_SUBJECT, TRIPLES_BY_PREDICATE, TRIPLES_BY_OBJECT] {
            if self
                .ids_in(index, node_id)?
                .iter()
                .any(|id| !excluding.contains(id))
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    pub fn get_property(&self, id: u64) -> GraphResult<Option<Property>> {
        let table = self.txn.open_table(PROPERTIES)?;
        Ok(get_record(&table, id)?)
    }

    /// Insert or update a property, creating its predicate node if missing.
    pub fn upsert_property(&mut self, property: &mut Property) -> GraphResult<bool> {
        require_non_empty("uid", &property.uid)?;
        let id = self.intern_uri(&property.uid)?;
        property.id = id;

        if self.get_node(id)?.is_none() {
            let tag = self.store.vocabulary().predicate_tag.clone();
            let mut node = Node::new(property.uid.clone()).with_tag(tag);
            self.upsert_node(&mut node, true)?;
        }
        if self.get_property(id)?.as_ref() == Some(property) {
            return Ok(false);
        }

        let bytes = encode(property)?;
        let mut table = self.txn.open_table(PROPERTIES)?;
        table.insert(id, bytes.as_slice())?;
        Ok(true)
    }

    pub fn delete_property(&mut self, id: u64) -> GraphResult<bool> {
        let mut table = self.txn.open_table(PROPERTIES)?;
        let removed = table.remove(id)?.is_some();
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Triples
    // -----------------------------------------------------------------------

    pub fn get_triple(&self, id: u64) -> GraphResult<Option<Triple>> {
        let table = self.txn.open_table(TRIPLES)?;
        Ok(get_record(&table, id)?)
    }

    fn require_interned(&self, id: u64) -> GraphResult<()> {
        if self.lookup_uri(id)?.is_none() {
            return Err(GraphError::NodeNotFound { id });
        }
        Ok(())
    }

    fn index_triple(&self, triple: &Triple, present: bool) -> GraphResult<()> {
        let mut entries = vec![
            (TRIPLES_BY_SUBJECT, triple.subject_id),
            (TRIPLES_BY_PREDICATE, triple.predicate_id),
        ];
        if let Some(object) = triple.object_id {
            entries.push((TRIPLES_BY_OBJECT, object));
        }
        for (index, key) in entries {
            let mut table = self.txn.open_multimap_table(index)?;
            if present {
                table.insert(key, triple.id)?;
            } else {
                table.remove(key, triple.id)?;
            }
        }
        self.set_sid_index(TRIPLES_BY_SID, triple.sid.as_deref(), triple.id, present)
    }

    fn put_triple(&self, triple: &Triple) -> GraphResult<()> {
        let bytes = encode(triple)?;
        let mut table = self.txn.open_table(TRIPLES)?;
        table.insert(triple.id, bytes.as_slice())?;
        Ok(())
    }

    /// Find a stored triple, other than `triple`'s own row, that is the same
    /// fact as `triple`.
    fn find_same_fact(&self, triple: &Triple) -> GraphResult<Option<u64>> {
        for id in self.ids_in(TRIPLES_BY_SUBJECT, triple.subject_id)? {
            if id == triple.id {
                continue;
            }
            if let Some(stored) = self.get_triple(id)?
                && stored.same_fact(triple)
            {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// Insert or update a triple.
    ///
    /// A triple that duplicates a stored fact gets the stored id. When it
    /// carries the id of another row, that row is deleted so the fact is
    /// never stored twice. Otherwise a triple with an id updates that row in
    /// place. Returns whether anything was written.
    pub fn upsert_triple(&mut self, triple: &mut Triple) -> GraphResult<bool> {
        triple.validate()?;
        self.require_interned(triple.subject_id)?;
        self.require_interned(triple.predicate_id)?;
        if let Some(object) = triple.object_id {
            self.require_interned(object)?;
        }
        if triple.literal_number.is_none()
            && let Some(ref literal) = triple.object_literal
        {
            triple.literal_number = numeric_projection(literal, triple.literal_type.as_deref());
        }

        if let Some(id) = self.find_same_fact(triple)? {
            let stale = std::mem::replace(&mut triple.id, id);
            return if stale != 0 {
                self.delete_triple(stale)
            } else {
                Ok(false)
            };
        }

        if triple.id != 0 {
            match self.get_triple(triple.id)? {
                Some(stored) if stored == *triple => return Ok(false),
                Some(stored) => {
                    self.index_triple(&stored, false)?;
                    self.enqueue_affected(&stored)?;
                    self.put_triple(triple)?;
                    self.index_triple(triple, true)?;
                    self.enqueue_affected(triple)?;
                    return Ok(true);
                }
                None => triple.id = 0,
            }
        }

        triple.id = self.next_id(COUNTER_TRIPLE)?;
        self.put_triple(triple)?;
        self.index_triple(triple, true)?;
        self.enqueue_affected(triple)?;
        Ok(true)
    }

    /// Delete a triple; a missing id is a no-op returning `false`.
    ///
    /// A node object is queued for class refresh.
    pub fn delete_triple(&mut self, id: u64) -> GraphResult<bool> {
        let Some(triple) = self.get_triple(id)? else {
            return Ok(false);
        };
        self.index_triple(&triple, false)?;
        {
            let mut table = self.txn.open_table(TRIPLES)?;
            table.remove(id)?;
        }
        self.enqueue_affected(&triple)?;
        if let Some(object) = triple.object_id {
            self.refresh.insert(object);
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Class closure bookkeeping
    // -----------------------------------------------------------------------

    /// The "is-a" and "is-subclass-of" predicate ids, created on first use.
    pub fn class_predicates(&mut self) -> GraphResult<ClassPredicates> {
        if let Some(predicates) = self.class_predicates {
            return Ok(predicates);
        }
        let predicates = ClassPredicates::resolve(self)?;
        self.class_predicates = Some(predicates);
        Ok(predicates)
    }

    /// Queue the nodes whose closure depends on `triple`.
    fn enqueue_affected(&mut self, triple: &Triple) -> GraphResult<()> {
        let vocabulary = self.store.vocabulary();
        let type_id = self.lookup_id(&vocabulary.type_uri)?;
        let subclass_id = self.lookup_id(&vocabulary.subclass_uri)?;
        if Some(triple.predicate_id) == type_id {
            self.refresh.insert(triple.subject_id);
        } else if Some(triple.predicate_id) == subclass_id {
            self.refresh.insert(triple.subject_id);
            let members = self.class_members(triple.subject_id)?;
            self.refresh.extend(members);
        }
        Ok(())
    }

    pub(crate) fn enqueue_refresh(&mut self, node_id: u64) {
        self.refresh.insert(node_id);
    }

    /// Node ids waiting for a closure refresh.
    pub fn pending_refresh(&self) -> impl Iterator<Item = u64> + '_ {
        self.refresh.iter().copied()
    }

    fn flush_class_refresh(&mut self) -> GraphResult<()> {
        if self.refresh.is_empty() {
            return Ok(());
        }
        tracing::debug!(nodes = self.refresh.len(), "refreshing class closures");
        while let Some(node_id) = self.refresh.pop_first() {
            classes::refresh_classes(self, node_id)?;
        }
        Ok(())
    }

    pub(crate) fn node_classes(&self, node_id: u64) -> GraphResult<Vec<NodeClassEntry>> {
        let table = self.txn.open_multimap_table(NODE_CLASSES)?;
        let mut out = Vec::new();
        for value in table.get(node_id)? {
            let (class_id, level) = value?.value();
            out.push(NodeClassEntry {
                node_id,
                class_id,
                level,
            });
        }
        out.sort_by_key(|e| (e.level, e.class_id));
        Ok(out)
    }

    /// Replace the stored closure of a node.
    pub(crate) fn replace_node_classes(
        &mut self,
        node_id: u64,
        entries: &[NodeClassEntry],
    ) -> GraphResult<()> {
        let old = self.node_classes(node_id)?;
        {
            let mut members = self.txn.open_multimap_table(CLASS_MEMBERS)?;
            for entry in &old {
                members.remove(entry.class_id, node_id)?;
            }
            for entry in entries {
                members.insert(entry.class_id, node_id)?;
            }
        }
        let mut classes = self.txn.open_multimap_table(NODE_CLASSES)?;
        classes.remove_all(node_id)?;
        for entry in entries {
            classes.insert(node_id, (entry.class_id, entry.level))?;
        }
        Ok(())
    }

    /// Nodes whose closure currently contains `class_id`.
    pub(crate) fn class_members(&self, class_id: u64) -> GraphResult<Vec<u64>> {
        self.ids_in(CLASS_MEMBERS, class_id)
    }

    /// Object nodes of `subject --predicate--> ?`.
    pub(crate) fn objects_of(&self, subject_id: u64, predicate_id: u64) -> GraphResult<Vec<u64>> {
        let mut out = Vec::new();
        for id in self.ids_in(TRIPLES_BY_SUBJECT, subject_id)? {
            if let Some(triple) = self.get_triple(id)?
                && triple.predicate_id == predicate_id
                && let Some(object) = triple.object_id
            {
                out.push(object);
            }
        }
        out.sort_unstable();
        out.dedup();
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Graph sets
    // -----------------------------------------------------------------------

    /// The stored fragment of `source_id`, as seen by this transaction.
    pub fn get_graph_set(&self, source_id: &str) -> GraphResult<GraphSet> {
        Ok(super::read_graph_set(
            &self.txn.open_table(NODES)?,
            &self.txn.open_multimap_table(NODES_BY_SID)?,
            &self.txn.open_table(TRIPLES)?,
            &self.txn.open_multimap_table(TRIPLES_BY_SID)?,
            &self.txn.open_table(URIS)?,
            source_id,
        )?)
    }

    /// Delete the fragment of `source_id`: its triples, then its nodes
    /// unless they are vocabulary or still referenced.
    pub fn delete_graph_set(&mut self, source_id: &str) -> GraphResult<GraphSetDeletion> {
        require_non_empty("source_id", source_id)?;
        let set = self.get_graph_set(source_id)?;
        let mut report = GraphSetDeletion::default();

        for triple in &set.triples {
            if self.delete_triple(triple.triple.id)? {
                report.deleted_triples.push(triple.triple.id);
            }
        }
        let none = BTreeSet::new();
        for node in &set.nodes {
            if self.is_vocabulary(node) || self.is_referenced(node.id, &none)? {
                report.kept_nodes.push(node.id);
            } else if self.delete_node(node.id)? {
                report.deleted_nodes.push(node.id);
            }
        }
        tracing::debug!(
            source_id,
            triples = report.deleted_triples.len(),
            nodes = report.deleted_nodes.len(),
            kept = report.kept_nodes.len(),
            "deleted graph set"
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Mappings
    // -----------------------------------------------------------------------

    pub fn get_mapping(&self, id: u64) -> GraphResult<Option<NodeMapping>> {
        let table = self.txn.open_table(MAPPINGS)?;
        Ok(get_record(&table, id)?)
    }

    /// Store a mapping, allocating its id when 0, and link it under its
    /// parent. Returns the id.
    pub fn put_mapping(&mut self, mapping: &mut NodeMapping) -> GraphResult<u64> {
        require_non_empty("name", &mapping.name)?;
        if mapping.id == 0 {
            mapping.id = self.next_id(COUNTER_MAPPING)?;
        }
        let bytes = encode(mapping)?;
        {
            let mut table = self.txn.open_table(MAPPINGS)?;
            table.insert(mapping.id, bytes.as_slice())?;
        }
        if let Some(parent) = mapping.parent_id {
            self.link_mapping(parent, mapping.id)?;
        }
        Ok(mapping.id)
    }

    /// Make `child_id` a child of `parent_id` (idempotent).
    pub fn link_mapping(&mut self, parent_id: u64, child_id: u64) -> GraphResult<()> {
        let mut table = self.txn.open_multimap_table(MAPPING_CHILDREN)?;
        table.insert(parent_id, child_id)?;
        Ok(())
    }

    pub fn unlink_mapping(&mut self, parent_id: u64, child_id: u64) -> GraphResult<bool> {
        let mut table = self.txn.open_multimap_table(MAPPING_CHILDREN)?;
        Ok(table.remove(parent_id, child_id)?)
    }

    pub fn mapping_children(&self, parent_id: u64) -> GraphResult<Vec<u64>> {
        self.ids_in(MAPPING_CHILDREN, parent_id)
    }

    /// Mappings without a parent, by ordinal then id.
    pub fn mapping_roots(&self) -> GraphResult<Vec<NodeMapping>> {
        let table = self.txn.open_table(MAPPINGS)?;
        let mut roots: Vec<NodeMapping> = all_records::<_, NodeMapping>(&table)?
            .into_iter()
            .filter(|m| m.parent_id.is_none())
            .collect();
        roots.sort_by_key(|m| (m.ordinal, m.id));
        Ok(roots)
    }

    /// Parent ids linking to `child_id`.
    fn mapping_parents(&self, child_id: u64) -> GraphResult<Vec<u64>> {
        let table = self.txn.open_multimap_table(MAPPING_CHILDREN)?;
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (parent, children) = entry?;
            for child in children {
                if child?.value() == child_id {
                    out.push(parent.value());
                    break;
                }
            }
        }
        Ok(out)
    }

    /// Delete a mapping and every descendant left without a parent.
    pub fn delete_mapping(&mut self, id: u64) -> GraphResult<bool> {
        if self.get_mapping(id)?.is_none() {
            return Ok(false);
        }
        for parent in self.mapping_parents(id)? {
            self.unlink_mapping(parent, id)?;
        }
        let children = self.mapping_children(id)?;
        {
            let mut links = self.txn.open_multimap_table(MAPPING_CHILDREN)?;
            links.remove_all(id)?;
            let mut table = self.txn.open_table(MAPPINGS)?;
            table.remove(id)?;
        }
        for child in children {
            let parents = self.mapping_parents(child)?;
            let Some(&adoptive) = parents.first() else {
                self.delete_mapping(child)?;
                continue;
            };
            // A shared child stays reachable; repoint its primary parent.
            if let Some(mut mapping) = self.get_mapping(child)?
                && mapping.parent_id == Some(id)
            {
                mapping.parent_id = Some(adoptive);
                self.put_mapping(&mut mapping)?;
            }
        }
        Ok(true)
    }
}

impl std::fmt::Debug for GraphTxn<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphTxn")
            .field("new_uris", &self.new_uris.len())
            .field("pending_refresh", &self.refresh.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeSourceType;

    fn store() -> GraphStore {
        GraphStore::in_memory().unwrap()
    }

    #[test]
    fn upsert_node_is_idempotent() {
        let store = store();
        let mut txn = store.begin().unwrap();
        let mut node = Node::new("x:works/dante").with_label("Dante");
        assert!(txn.upsert_node(&mut node, false).unwrap());
        let id = node.id;
        let mut again = Node::new("X:Works/Dante").with_label("Dante");
        assert!(!txn.upsert_node(&mut again, false).unwrap());
        assert_eq!(again.id, id);
        txn.commit().unwrap();
        assert_eq!(store.get_node(id).unwrap().unwrap().label, "Dante");
    }

    #[test]
    fn no_update_if_exists_keeps_curated_node() {
        let store = store();
        let mut txn = store.begin().unwrap();
        let mut curated = Node::new("crm:E53_Place").with_label("Place").as_class();
        txn.upsert_node(&mut curated, false).unwrap();
        let mut implicit = Node::new("crm:E53_Place").with_source_type(NodeSourceType::Implicit);
        assert!(!txn.upsert_node(&mut implicit, true).unwrap());
        assert!(implicit.is_class);
        assert_eq!(implicit.label, "Place");
    }

    #[test]
    fn duplicate_triple_returns_existing_id() {
        let store = store();
        let mut txn = store.begin().unwrap();
        let mut s = Node::new("x:a");
        let mut p = Node::new("x:p");
        txn.upsert_node(&mut s, false).unwrap();
        txn.upsert_node(&mut p, false).unwrap();

        let mut t1 = Triple::with_literal(s.id, p.id, "1250", Some("xsd:float".into()), None)
            .with_tag("Note");
        assert!(txn.upsert_triple(&mut t1).unwrap());
        assert_eq!(t1.literal_number, Some(1250.0));

        let mut t2 = Triple::with_literal(s.id, p.id, "1250", Some("xsd:float".into()), None)
            .with_tag("note");
        assert!(!txn.upsert_triple(&mut t2).unwrap());
        assert_eq!(t1.id, t2.id);
    }

    #[test]
    fn update_into_a_stored_fact_keeps_one_row() {
        let store = store();
        let mut txn = store.begin().unwrap();
        let mut a = Node::new("x:a");
        let mut b = Node::new("x:b");
        let mut c = Node::new("x:c");
        let mut p = Node::new("x:p");
        for n in [&mut a, &mut b, &mut c, &mut p] {
            txn.upsert_node(n, false).unwrap();
        }
        let mut to_b = Triple::with_object(a.id, p.id, b.id);
        let mut to_c = Triple::with_object(a.id, p.id, c.id);
        txn.upsert_triple(&mut to_b).unwrap();
        txn.upsert_triple(&mut to_c).unwrap();
        let stale = to_c.id;

        to_c.object_id = Some(b.id);
        assert!(txn.upsert_triple(&mut to_c).unwrap());
        assert_eq!(to_c.id, to_b.id);
        assert!(txn.get_triple(stale).unwrap().is_none());
        assert_eq!(txn.ids_in(TRIPLES_BY_SUBJECT, a.id).unwrap(), vec![to_b.id]);

        // Updating a row with its own content is still a no-op.
        assert!(!txn.upsert_triple(&mut to_b).unwrap());
    }

    #[test]
    fn triple_with_unknown_node_is_rejected() {
        let store = store();
        let mut txn = store.begin().unwrap();
        let mut t = Triple::with_object(41, 42, 43);
        assert!(matches!(
            txn.upsert_triple(&mut t),
            Err(GraphError::NodeNotFound { id: 41 })
        ));
    }

    #[test]
    fn delete_node_cascades_to_triples() {
        let store = store();
        let (a, b, triple_id) = {
            let mut txn = store.begin().unwrap();
            let mut a = Node::new("x:a");
            let mut b = Node::new("x:b");
            let mut p = Node::new("x:p");
            for n in [&mut a, &mut b, &mut p] {
                txn.upsert_node(n, false).unwrap();
            }
            let mut t = Triple::with_object(a.id, p.id, b.id);
            txn.upsert_triple(&mut t).unwrap();
            txn.commit().unwrap();
            (a.id, b.id, t.id)
        };

        store.delete_node(b).unwrap();
        assert!(store.get_triple(triple_id).unwrap().is_none());
        assert!(store.get_node(a).unwrap().is_some());
        assert!(!store.delete_node(b).unwrap());
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let store = store();
        {
            let mut txn = store.begin().unwrap();
            let mut node = Node::new("x:transient");
            txn.upsert_node(&mut node, false).unwrap();
        }
        assert!(store.get_node_by_uid("x:transient").unwrap().is_none());
        assert!(store.lookup_id("x:transient").unwrap().is_none());
    }

    #[test]
    fn delete_graph_set_spares_vocabulary() {
        let store = store();
        let mut txn = store.begin().unwrap();
        let mut event = Node::new("x:events/ev1")
            .with_sid("ccc")
            .with_source_type(NodeSourceType::Pin);
        let mut class = Node::new("x:classes/local").with_sid("ccc/class").as_class();
        let mut p = Node::new("x:p").with_tag("property");
        for n in [&mut event, &mut class, &mut p] {
            txn.upsert_node(n, false).unwrap();
        }
        let mut t = Triple::with_object(event.id, p.id, class.id).with_sid("ccc");
        txn.upsert_triple(&mut t).unwrap();

        let report = txn.delete_graph_set("ccc").unwrap();
        assert_eq!(report.deleted_triples, vec![t.id]);
        assert_eq!(report.deleted_nodes, vec![event.id]);
        assert_eq!(report.kept_nodes, vec![class.id]);
        txn.commit().unwrap();
        assert!(store.get_node(class.id).unwrap().is_some());
    }

    #[test]
    fn deleting_mapping_removes_orphaned_children() {
        let store = store();
        let mut txn = store.begin().unwrap();
        let mut root = NodeMapping::named("events");
        txn.put_mapping(&mut root).unwrap();
        let mut child = NodeMapping::named("places");
        child.parent_id = Some(root.id);
        txn.put_mapping(&mut child).unwrap();
        assert_eq!(txn.mapping_children(root.id).unwrap(), vec![child.id]);

        assert!(txn.delete_mapping(root.id).unwrap());
        assert!(txn.get_mapping(child.id).unwrap().is_none());
    }
}
