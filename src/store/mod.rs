//! Graph store backed by redb.
//!
//! [`GraphStore`] owns the database and serves reads from MVCC snapshots, so
//! readers never block a running synchronization. All writes go through a
//! [`GraphTxn`]: one redb write transaction that is either committed as a
//! whole or rolled back when dropped.
//!
//! redb admits a single writer at a time, which serializes URI interning and
//! UID minting across concurrent callers without any extra locking.

pub mod query;
pub(crate) mod tables;
pub mod txn;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadTransaction, ReadableMultimapTable, ReadableTable};

use crate::error::{GraphError, GraphResult, StoreError};
use crate::graph::{
    GraphSet, Node, NodeClassEntry, Property, Triple, UidTriple, normalize_key, sid_in_scope,
};
use crate::mapping::NodeMapping;
use crate::registry::UriCache;

pub use query::{
    DataPage, LinkedNodeFilter, LinkedRole, NodeFilter, PagingOptions, PropertyFilter,
    TripleFilter,
};
pub use txn::{GraphSetDeletion, GraphTxn};

use tables::*;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// File name of the database inside the data directory.
pub const DATABASE_FILE: &str = "kg-curator.redb";

/// URIs and tags with a fixed meaning to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    /// The "is-a" predicate.
    pub type_uri: String,
    /// The "is-subclass-of" predicate.
    pub subclass_uri: String,
    /// Tag marking a node as a predicate.
    pub predicate_tag: String,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            type_uri: "rdf:type".into(),
            subclass_uri: "rdfs:subClassOf".into(),
            predicate_tag: "property".into(),
        }
    }
}

/// Row counts, for `info`-style reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub uris: usize,
    pub nodes: usize,
    pub properties: usize,
    pub triples: usize,
    pub mappings: usize,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "kg-curator store")?;
        writeln!(f, "  uris:        {}", self.uris)?;
        writeln!(f, "  nodes:       {}", self.nodes)?;
        writeln!(f, "  properties:  {}", self.properties)?;
        writeln!(f, "  triples:     {}", self.triples)?;
        writeln!(f, "  mappings:    {}", self.mappings)?;
        Ok(())
    }
}

/// Transactional graph store.
pub struct GraphStore {
    db: Arc<Database>,
    uris: UriCache,
    vocabulary: Vocabulary,
}

impl GraphStore {
    /// Open or create a store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join(DATABASE_FILE);
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;
        tracing::debug!(path = %db_path.display(), "opened graph store");
        Self::from_database(db)
    }

    /// Create a store that lives only in memory.
    pub fn in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::from_database(db)
    }

    fn from_database(db: Database) -> StoreResult<Self> {
        // Create every table up front so read snapshots never miss one.
        let txn = db.begin_write()?;
        {
            txn.open_table(URIS)?;
            txn.open_table(URI_IDS)?;
            txn.open_table(UIDS)?;
            txn.open_multimap_table(UIDS_BY_KEY)?;
            txn.open_table(NODES)?;
            txn.open_multimap_table(NODES_BY_SID)?;
            txn.open_table(PROPERTIES)?;
            txn.open_table(TRIPLES)?;
            txn.open_multimap_table(TRIPLES_BY_SUBJECT)?;
            txn.open_multimap_table(TRIPLES_BY_PREDICATE)?;
            txn.open_multimap_table(TRIPLES_BY_OBJECT)?;
            txn.open_multimap_table(TRIPLES_BY_SID)?;
            txn.open_multimap_table(NODE_CLASSES)?;
            txn.open_multimap_table(CLASS_MEMBERS)?;
            txn.open_table(MAPPINGS)?;
            txn.open_multimap_table(MAPPING_CHILDREN)?;
            txn.open_table(COUNTERS)?;
        }
        txn.commit()?;
        Ok(Self {
            db: Arc::new(db),
            uris: UriCache::new(),
            vocabulary: Vocabulary::default(),
        })
    }

    /// Replace the well-known vocabulary.
    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub(crate) fn uri_cache(&self) -> &UriCache {
        &self.uris
    }

    /// Begin a write transaction.
    ///
    /// Blocks while another write transaction is open.
    pub fn begin(&self) -> StoreResult<GraphTxn<'_>> {
        let txn = self.db.begin_write()?;
        Ok(GraphTxn::new(self, txn))
    }

    /// Run `f` inside one write transaction, committing on success.
    ///
    /// Any error rolls the whole transaction back.
    pub fn write<T, E>(&self, f: impl FnOnce(&mut GraphTxn<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<GraphError>,
    {
        let mut txn = self.begin().map_err(GraphError::from)?;
        let out = f(&mut txn)?;
        txn.commit()?;
        Ok(out)
    }

    fn snapshot(&self) -> StoreResult<ReadTransaction> {
        Ok(self.db.begin_read()?)
    }

    // -----------------------------------------------------------------------
    // Identifier registry (read side)
    // -----------------------------------------------------------------------

    /// Look up a URI by id.
    pub fn lookup_uri(&self, id: u64) -> StoreResult<Option<String>> {
        if let Some(uri) = self.uris.uri(id) {
            return Ok(Some(uri));
        }
        let snap = self.snapshot()?;
        let table = snap.open_table(URIS)?;
        let uri = uri_text(&table, id)?;
        if let Some(ref uri) = uri {
            self.uris.insert(id, uri);
        }
        Ok(uri)
    }

    /// Look up a URI's id (case-insensitive).
    pub fn lookup_id(&self, uri: &str) -> StoreResult<Option<u64>> {
        if let Some(id) = self.uris.id(uri) {
            return Ok(Some(id));
        }
        let snap = self.snapshot()?;
        let table = snap.open_table(URI_IDS)?;
        let id = uri_id(&table, uri)?;
        if let Some(id) = id {
            self.uris.insert(id, uri);
        }
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    pub fn get_node(&self, id: u64) -> StoreResult<Option<Node>> {
        let snap = self.snapshot()?;
        get_record(&snap.open_table(NODES)?, id)
    }

    pub fn get_node_by_uid(&self, uid: &str) -> StoreResult<Option<Node>> {
        match self.lookup_id(uid)? {
            Some(id) => self.get_node(id),
            None => Ok(None),
        }
    }

    /// Filtered, paged node retrieval, ordered by label then id.
    pub fn get_nodes(&self, filter: &NodeFilter) -> StoreResult<DataPage<Node>> {
        let snap = self.snapshot()?;
        let nodes = snap.open_table(NODES)?;

        let mut candidates: Option<BTreeSet<u64>> = None;
        if !filter.class_ids.is_empty() {
            let members = snap.open_multimap_table(CLASS_MEMBERS)?;
            let mut ids = BTreeSet::new();
            for &class_id in &filter.class_ids {
                ids.extend(multimap_ids(&members, class_id)?);
            }
            candidates = Some(ids);
        }
        if let Some(linked) = filter.linked {
            let ids = linked_node_ids(&snap, &linked)?;
            candidates = Some(intersect(candidates, ids));
        }
        if let Some(ref sid) = filter.sid {
            let by_sid = snap.open_multimap_table(NODES_BY_SID)?;
            let ids = ids_by_key(&by_sid, sid, filter.sid_prefix)?;
            candidates = Some(intersect(candidates, ids.into_iter().collect()));
        }

        let mut matches: Vec<Node> = match candidates {
            Some(ids) => {
                let mut out = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(node) = get_record::<_, Node>(&nodes, id)? {
                        out.push(node);
                    }
                }
                out
            }
            None => all_records(&nodes)?,
        };
        matches.retain(|n| filter.matches(n));
        matches.sort_by_cached_key(|n| (normalize_key(&n.label), n.id));
        Ok(DataPage::from_matches(filter.paging, matches))
    }

    /// Ids of all nodes, optionally skipping classes, in id order.
    pub fn node_ids(&self, include_classes: bool) -> StoreResult<Vec<u64>> {
        let snap = self.snapshot()?;
        let nodes = snap.open_table(NODES)?;
        let mut out = Vec::new();
        for entry in nodes.iter()? {
            let (id, value) = entry?;
            if include_classes {
                out.push(id.value());
                continue;
            }
            let node: Node = decode(value.value())?;
            if !node.is_class {
                out.push(node.id);
            }
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    pub fn get_property(&self, id: u64) -> StoreResult<Option<Property>> {
        let snap = self.snapshot()?;
        get_record(&snap.open_table(PROPERTIES)?, id)
    }

    pub fn get_property_by_uid(&self, uid: &str) -> StoreResult<Option<Property>> {
        match self.lookup_id(uid)? {
            Some(id) => self.get_property(id),
            None => Ok(None),
        }
    }

    pub fn get_properties(&self, filter: &PropertyFilter) -> StoreResult<DataPage<Property>> {
        let snap = self.snapshot()?;
        let mut matches: Vec<Property> = all_records(&snap.open_table(PROPERTIES)?)?;
        matches.retain(|p| filter.matches(p));
        Ok(DataPage::from_matches(filter.paging, matches))
    }

    // -----------------------------------------------------------------------
    // Triples
    // -----------------------------------------------------------------------

    pub fn get_triple(&self, id: u64) -> StoreResult<Option<Triple>> {
        let snap = self.snapshot()?;
        get_record(&snap.open_table(TRIPLES)?, id)
    }

    /// Filtered, paged triple retrieval, ordered by id.
    pub fn get_triples(&self, filter: &TripleFilter) -> StoreResult<DataPage<Triple>> {
        let snap = self.snapshot()?;
        let triples = snap.open_table(TRIPLES)?;

        let candidates: Option<Vec<u64>> = if let Some(subject) = filter.subject_id {
            Some(multimap_ids(&snap.open_multimap_table(TRIPLES_BY_SUBJECT)?, subject)?)
        } else if let Some(object) = filter.object_id {
            Some(multimap_ids(&snap.open_multimap_table(TRIPLES_BY_OBJECT)?, object)?)
        } else if let [predicate] = filter.predicate_ids.as_slice() {
            Some(multimap_ids(&snap.open_multimap_table(TRIPLES_BY_PREDICATE)?, *predicate)?)
        } else if let Some(ref sid) = filter.sid {
            Some(ids_by_key(
                &snap.open_multimap_table(TRIPLES_BY_SID)?,
                sid,
                filter.sid_prefix,
            )?)
        } else {
            None
        };

        let mut matches: Vec<Triple> = match candidates {
            Some(mut ids) => {
                ids.sort_unstable();
                ids.dedup();
                let mut out = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(triple) = get_record::<_, Triple>(&triples, id)? {
                        out.push(triple);
                    }
                }
                out
            }
            None => all_records(&triples)?,
        };
        matches.retain(|t| filter.matches(t));
        Ok(DataPage::from_matches(filter.paging, matches))
    }

    // -----------------------------------------------------------------------
    // Classes
    // -----------------------------------------------------------------------

    /// The materialized class entries of a node, ordered by level then class.
    pub fn get_node_classes(&self, node_id: u64) -> StoreResult<Vec<NodeClassEntry>> {
        let snap = self.snapshot()?;
        let table = snap.open_multimap_table(NODE_CLASSES)?;
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

    // -----------------------------------------------------------------------
    // Graph sets
    // -----------------------------------------------------------------------

    /// All nodes and triples whose SID starts with `source_id`.
    pub fn get_graph_set(&self, source_id: &str) -> StoreResult<GraphSet> {
        let snap = self.snapshot()?;
        read_graph_set(
            &snap.open_table(NODES)?,
            &snap.open_multimap_table(NODES_BY_SID)?,
            &snap.open_table(TRIPLES)?,
            &snap.open_multimap_table(TRIPLES_BY_SID)?,
            &snap.open_table(URIS)?,
            source_id,
        )
    }

    // -----------------------------------------------------------------------
    // Mappings
    // -----------------------------------------------------------------------

    pub fn get_mapping(&self, id: u64) -> StoreResult<Option<NodeMapping>> {
        let snap = self.snapshot()?;
        get_record(&snap.open_table(MAPPINGS)?, id)
    }

    /// Child mappings of `parent_id`, ordered by ordinal then id.
    pub fn get_mapping_children(&self, parent_id: u64) -> StoreResult<Vec<NodeMapping>> {
        let snap = self.snapshot()?;
        let mappings = snap.open_table(MAPPINGS)?;
        let ids = multimap_ids(&snap.open_multimap_table(MAPPING_CHILDREN)?, parent_id)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(m) = get_record::<_, NodeMapping>(&mappings, id)? {
                out.push(m);
            }
        }
        out.sort_by_key(|m| (m.ordinal, m.id));
        Ok(out)
    }

    /// Mappings without a parent, ordered by ordinal then id.
    pub fn get_root_mappings(&self) -> StoreResult<Vec<NodeMapping>> {
        let mut roots: Vec<NodeMapping> = self
            .get_all_mappings()?
            .into_iter()
            .filter(|m| m.parent_id.is_none())
            .collect();
        roots.sort_by_key(|m| (m.ordinal, m.id));
        Ok(roots)
    }

    /// Every stored mapping, in id order.
    pub fn get_all_mappings(&self) -> StoreResult<Vec<NodeMapping>> {
        let snap = self.snapshot()?;
        all_records(&snap.open_table(MAPPINGS)?)
    }

    // -----------------------------------------------------------------------
    // Statistics
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> StoreResult<StoreStats> {
        let snap = self.snapshot()?;
        Ok(StoreStats {
            uris: count(&snap.open_table(URIS)?)?,
            nodes: count(&snap.open_table(NODES)?)?,
            properties: count(&snap.open_table(PROPERTIES)?)?,
            triples: count(&snap.open_table(TRIPLES)?)?,
            mappings: count(&snap.open_table(MAPPINGS)?)?,
        })
    }

    // -----------------------------------------------------------------------
    // Single-operation writes
    // -----------------------------------------------------------------------

    /// Intern a URI in its own transaction.
    pub fn intern_uri(&self, uri: &str) -> GraphResult<u64> {
        self.write(|txn| txn.intern_uri(uri))
    }

    /// Build a UID in its own transaction.
    pub fn build_uid(&self, unsuffixed: &str, sid: &str) -> GraphResult<String> {
        self.write(|txn| txn.build_uid(unsuffixed, sid))
    }

    pub fn upsert_node(&self, node: &mut Node, no_update_if_exists: bool) -> GraphResult<bool> {
        self.write(|txn| txn.upsert_node(node, no_update_if_exists))
    }

    pub fn upsert_property(&self, property: &mut Property) -> GraphResult<bool> {
        self.write(|txn| txn.upsert_property(property))
    }

    pub fn upsert_triple(&self, triple: &mut Triple) -> GraphResult<bool> {
        self.write(|txn| txn.upsert_triple(triple))
    }

    pub fn delete_node(&self, id: u64) -> GraphResult<bool> {
        self.write(|txn| txn.delete_node(id))
    }

    pub fn delete_property(&self, id: u64) -> GraphResult<bool> {
        self.write(|txn| txn.delete_property(id))
    }

    pub fn delete_triple(&self, id: u64) -> GraphResult<bool> {
        self.write(|txn| txn.delete_triple(id))
    }

    /// Remove the fragment of a deleted source record.
    pub fn delete_graph_set(&self, source_id: &str) -> GraphResult<GraphSetDeletion> {
        self.write(|txn| txn.delete_graph_set(source_id))
    }
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("vocabulary", &self.vocabulary)
            .field("cached_uris", &self.uris.len())
            .finish()
    }
}

fn intersect(current: Option<BTreeSet<u64>>, ids: BTreeSet<u64>) -> BTreeSet<u64> {
    match current {
        Some(current) => current.intersection(&ids).copied().collect(),
        None => ids,
    }
}

fn count<K, V>(table: &impl ReadableTable<K, V>) -> StoreResult<usize>
where
    K: redb::Key + 'static,
    V: redb::Value + 'static,
{
    let mut n = 0;
    for entry in table.iter()? {
        entry?;
        n += 1;
    }
    Ok(n)
}

/// Nodes linked to `linked.node_id` through `linked.predicate_id`.
fn linked_node_ids(snap: &ReadTransaction, linked: &LinkedNodeFilter) -> StoreResult<BTreeSet<u64>> {
    let triples = snap.open_table(TRIPLES)?;
    let mut out = BTreeSet::new();
    let wants = |role: LinkedRole| linked.role.is_none_or(|r| r == role);

    if wants(LinkedRole::Subject) {
        // Filtered node is the subject: triples pointing at the linked node.
        let by_object = snap.open_multimap_table(TRIPLES_BY_OBJECT)?;
        for id in multimap_ids(&by_object, linked.node_id)? {
            if let Some(t) = get_record::<_, Triple>(&triples, id)?
                && t.predicate_id == linked.predicate_id
            {
                out.insert(t.subject_id);
            }
        }
    }
    if wants(LinkedRole::Object) {
        let by_subject = snap.open_multimap_table(TRIPLES_BY_SUBJECT)?;
        for id in multimap_ids(&by_subject, linked.node_id)? {
            if let Some(t) = get_record::<_, Triple>(&triples, id)?
                && t.predicate_id == linked.predicate_id
                && let Some(object) = t.object_id
            {
                out.insert(object);
            }
        }
    }
    Ok(out)
}

/// Load the fragment whose SIDs start with `source_id`, resolving UIDs.
pub(crate) fn read_graph_set<N, NS, T, TS, U>(
    nodes: &N,
    nodes_by_sid: &NS,
    triples: &T,
    triples_by_sid: &TS,
    uris: &U,
    source_id: &str,
) -> StoreResult<GraphSet>
where
    N: ReadableTable<u64, &'static [u8]>,
    NS: ReadableMultimapTable<&'static str, u64>,
    T: ReadableTable<u64, &'static [u8]>,
    TS: ReadableMultimapTable<&'static str, u64>,
    U: ReadableTable<u64, &'static str>,
{
    let mut set = GraphSet::new();
    if source_id.is_empty() {
        return Ok(set);
    }

    let mut node_ids = ids_by_key(nodes_by_sid, source_id, true)?;
    node_ids.sort_unstable();
    node_ids.dedup();
    let in_scope = |sid: Option<&str>| sid.is_some_and(|s| sid_in_scope(s, source_id));
    for id in node_ids {
        if let Some(node) = get_record::<_, Node>(nodes, id)?
            && in_scope(node.sid.as_deref())
        {
            set.nodes.push(node);
        }
    }

    let mut triple_ids = ids_by_key(triples_by_sid, source_id, true)?;
    triple_ids.sort_unstable();
    triple_ids.dedup();
    for id in triple_ids {
        let Some(triple) = get_record::<_, Triple>(triples, id)? else {
            continue;
        };
        if !in_scope(triple.sid.as_deref()) {
            continue;
        }
        let resolve = |id: u64| -> StoreResult<String> {
            Ok(uri_text(uris, id)?.unwrap_or_default())
        };
        let subject_uid = resolve(triple.subject_id)?;
        let predicate_uid = resolve(triple.predicate_id)?;
        let object_uid = match triple.object_id {
            Some(o) => Some(resolve(o)?),
            None => None,
        };
        set.triples.push(UidTriple {
            triple,
            subject_uid,
            predicate_uid,
            object_uid,
        });
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Dante and Guido are persons and persons are actors. Dante knows
    /// Guido; Cino knows Dante.
    struct Fixture {
        store: GraphStore,
        knows: u64,
        dante: u64,
        guido: u64,
        cino: u64,
        letter: u64,
        person: u64,
        agent: u64,
        document: u64,
    }

    fn fixture() -> Fixture {
        let store = GraphStore::in_memory().unwrap();
        let mut txn = store.begin().unwrap();
        let preds = txn.class_predicates().unwrap();
        let mut node = |uid: &str, label: &str, class: bool| {
            let mut n = Node::new(uid).with_label(label);
            if class {
                n = n.as_class();
            }
            txn.upsert_node(&mut n, false).unwrap();
            n.id
        };
        let dante = node("x:persons/dante", "Dante", false);
        let guido = node("x:persons/guido", "Guido", false);
        let cino = node("x:persons/cino", "Cino", false);
        let letter = node("x:letters/l1", "Letter", false);
        let person = node("crm:E21_Person", "Person", true);
        let agent = node("crm:E39_Actor", "Actor", true);
        let document = node("crm:E31_Document", "Document", true);
        let knows = node("x:knows", "knows", false);

        for (s, p, o) in [
            (dante, preds.type_id, person),
            (guido, preds.type_id, person),
            (letter, preds.type_id, document),
            (person, preds.subclass_id, agent),
            (dante, knows, guido),
            (cino, knows, dante),
        ] {
            txn.upsert_triple(&mut Triple::with_object(s, p, o)).unwrap();
        }
        txn.commit().unwrap();

        Fixture {
            store,
            knows,
            dante,
            guido,
            cino,
            letter,
            person,
            agent,
            document,
        }
    }

    fn ids(store: &GraphStore, filter: &NodeFilter) -> Vec<u64> {
        store
            .get_nodes(filter)
            .unwrap()
            .items
            .into_iter()
            .map(|n| n.id)
            .collect()
    }

    #[test]
    fn class_filter_reads_the_closure() {
        let f = fixture();
        let of = |class_ids: Vec<u64>| NodeFilter {
            paging: PagingOptions::all(),
            class_ids,
            ..Default::default()
        };

        assert_eq!(ids(&f.store, &of(vec![f.person])), vec![f.dante, f.guido]);
        // Actor is one subclass hop away.
        assert_eq!(ids(&f.store, &of(vec![f.agent])), vec![f.dante, f.guido]);
        assert_eq!(
            f.store
                .get_node_classes(f.dante)
                .unwrap()
                .iter()
                .map(|e| (e.class_id, e.level))
                .collect::<Vec<_>>(),
            vec![(f.person, 0), (f.agent, 1)]
        );
        assert_eq!(
            ids(&f.store, &of(vec![f.agent, f.document])),
            vec![f.dante, f.guido, f.letter]
        );

        let labelled = NodeFilter {
            label: Some("gui".into()),
            ..of(vec![f.agent])
        };
        assert_eq!(ids(&f.store, &labelled), vec![f.guido]);
    }

    #[test]
    fn linked_nodes_by_role() {
        let f = fixture();
        let linked = |role: Option<LinkedRole>| NodeFilter {
            paging: PagingOptions::all(),
            linked: Some(LinkedNodeFilter {
                predicate_id: f.knows,
                node_id: f.dante,
                role,
            }),
            ..Default::default()
        };

        // Who knows dante.
        assert_eq!(ids(&f.store, &linked(Some(LinkedRole::Subject))), vec![f.cino]);
        // Whom dante knows.
        assert_eq!(ids(&f.store, &linked(Some(LinkedRole::Object))), vec![f.guido]);
        assert_eq!(ids(&f.store, &linked(None)), vec![f.cino, f.guido]);

        // Combined with a class filter only classified nodes remain.
        let persons = NodeFilter {
            class_ids: vec![f.person],
            ..linked(None)
        };
        assert_eq!(ids(&f.store, &persons), vec![f.guido]);
    }
}
