//! JSON interchange of mapping trees.
//!
//! A document nests children under their parents. Each document may carry an
//! `id` local to the file; the same `id` under several parents denotes one
//! shared mapping, so a DAG survives a round trip.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::MappingResult;
use crate::graph::same_key;
use crate::mapping::cache::MappingArena;
use crate::mapping::{MappingFilter, MappingOutput, MappingSourceType, NodeMapping};
use crate::store::{GraphStore, GraphTxn};

/// Top-level interchange document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingDocumentSet {
    #[serde(default)]
    pub mappings: Vec<MappingDocument>,
}

/// One mapping with its nested children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    pub ordinal: i32,
    pub source_type: MappingSourceType,
    pub filter: MappingFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scalar_pattern: Option<String>,
    pub output: MappingOutput,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MappingDocument>,
}

/// Counts of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    /// Extra parent links added for shared mappings.
    pub linked: usize,
}

impl MappingDocument {
    fn from_mapping(mapping: &NodeMapping) -> Self {
        Self {
            id: Some(mapping.id),
            name: mapping.name.clone(),
            ordinal: mapping.ordinal,
            source_type: mapping.source_type,
            filter: mapping.filter.clone(),
            description: mapping.description.clone(),
            source: mapping.source.clone(),
            sid: mapping.sid.clone(),
            scalar_pattern: mapping.scalar_pattern.clone(),
            output: mapping.output.clone(),
            children: Vec::new(),
        }
    }

    fn to_mapping(&self, id: u64, parent_id: Option<u64>) -> NodeMapping {
        NodeMapping {
            id,
            parent_id,
            ordinal: self.ordinal,
            name: self.name.clone(),
            source_type: self.source_type,
            filter: self.filter.clone(),
            description: self.description.clone(),
            source: self.source.clone(),
            sid: self.sid.clone(),
            scalar_pattern: self.scalar_pattern.clone(),
            output: self.output.clone(),
        }
    }
}

impl MappingDocumentSet {
    /// Export every mapping held by `arena`, roots first.
    pub fn from_arena(arena: &MappingArena) -> Self {
        let mut roots: Vec<&NodeMapping> = arena.iter().filter(|m| m.parent_id.is_none()).collect();
        roots.sort_by_key(|m| (m.ordinal, m.id));
        let mut path = Vec::new();
        let mappings = roots
            .into_iter()
            .map(|m| export_tree(arena, m, &mut path))
            .collect();
        Self { mappings }
    }

    /// Export every stored mapping.
    pub fn export(store: &GraphStore) -> MappingResult<Self> {
        Ok(Self::from_arena(&MappingArena::from_store(store)?))
    }

    /// Number of documents, counting repeated shared ones each time.
    pub fn document_count(&self) -> usize {
        fn count(docs: &[MappingDocument]) -> usize {
            docs.iter().map(|d| 1 + count(&d.children)).sum()
        }
        count(&self.mappings)
    }
}

fn export_tree(arena: &MappingArena, mapping: &NodeMapping, path: &mut Vec<u64>) -> MappingDocument {
    let mut doc = MappingDocument::from_mapping(mapping);
    if path.contains(&mapping.id) {
        tracing::warn!(mapping = %mapping.name, "cyclic mapping link not exported");
        return doc;
    }
    path.push(mapping.id);
    let mut children: Vec<&NodeMapping> = arena
        .child_ids(mapping.id)
        .iter()
        .filter_map(|id| arena.get(*id))
        .collect();
    children.sort_by_key(|m| (m.ordinal, m.id));
    children.retain(|c| !path.contains(&c.id));
    doc.children = children
        .into_iter()
        .map(|c| export_tree(arena, c, path))
        .collect();
    path.pop();
    doc
}

/// Import a document set into the store.
///
/// Mappings are matched by name among the siblings at each level, so
/// importing the same file twice updates in place. A document `id` seen
/// earlier in the file links the already imported mapping instead.
pub fn import_mappings(txn: &mut GraphTxn<'_>, set: &MappingDocumentSet) -> MappingResult<ImportReport> {
    let mut report = ImportReport::default();
    let mut seen: HashMap<u64, u64> = HashMap::new();
    let roots = txn.mapping_roots()?;
    for doc in &set.mappings {
        import_document(txn, doc, None, &roots, &mut seen, &mut report)?;
    }
    tracing::info!(
        created = report.created,
        updated = report.updated,
        linked = report.linked,
        "imported mappings"
    );
    Ok(report)
}

fn import_document(
    txn: &mut GraphTxn<'_>,
    doc: &MappingDocument,
    parent: Option<u64>,
    siblings: &[NodeMapping],
    seen: &mut HashMap<u64, u64>,
    report: &mut ImportReport,
) -> MappingResult<u64> {
    if let Some(doc_id) = doc.id
        && let Some(&id) = seen.get(&doc_id)
    {
        if let Some(parent) = parent {
            txn.link_mapping(parent, id)?;
            report.linked += 1;
        }
        return Ok(id);
    }

    let mut mapping = match siblings.iter().find(|m| same_key(&m.name, &doc.name)) {
        Some(existing) => {
            report.updated += 1;
            doc.to_mapping(existing.id, existing.parent_id.or(parent))
        }
        None => {
            report.created += 1;
            doc.to_mapping(0, parent)
        }
    };
    let id = txn.put_mapping(&mut mapping)?;
    if let Some(parent) = parent {
        txn.link_mapping(parent, id)?;
    }
    if let Some(doc_id) = doc.id {
        seen.insert(doc_id, id);
    }

    let mut existing_children = Vec::new();
    for child_id in txn.mapping_children(id)? {
        if let Some(child) = txn.get_mapping(child_id)? {
            existing_children.push(child);
        }
    }
    for child in &doc.children {
        import_document(txn, child, Some(id), &existing_children, seen, report)?;
    }
    Ok(id)
}

/// Names of every mapping in a document set, grouped by nesting depth.
pub fn names_by_depth(set: &MappingDocumentSet) -> BTreeMap<usize, Vec<String>> {
    fn walk(docs: &[MappingDocument], depth: usize, out: &mut BTreeMap<usize, Vec<String>>) {
        for doc in docs {
            out.entry(depth).or_default().push(doc.name.clone());
            walk(&doc.children, depth + 1, out);
        }
    }
    let mut out = BTreeMap::new();
    walk(&set.mappings, 0, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{NodeTemplate, TripleTemplate};

    fn shared_set() -> MappingDocumentSet {
        let shared = MappingDocument {
            id: Some(10),
            name: "date".into(),
            source_type: MappingSourceType::Pin,
            output: MappingOutput {
                nodes: vec![NodeTemplate::with_uid("ts", "x:timespans/ts##", "{pin-value}")],
                ..Default::default()
            },
            ..Default::default()
        };
        let event = |name: &str, ordinal: i32| MappingDocument {
            id: None,
            name: name.into(),
            ordinal,
            source_type: MappingSourceType::Pin,
            output: MappingOutput {
                triples: vec![TripleTemplate::to_object("rdf:type", "crm:E7_activity")],
                ..Default::default()
            },
            children: vec![shared.clone()],
            ..Default::default()
        };
        MappingDocumentSet {
            mappings: vec![event("birth", 1), event("death", 2)],
        }
    }

    #[test]
    fn shared_documents_become_one_mapping() {
        let store = GraphStore::in_memory().unwrap();
        let mut txn = store.begin().unwrap();
        let report = import_mappings(&mut txn, &shared_set()).unwrap();
        txn.commit().unwrap();

        assert_eq!(report, ImportReport { created: 3, updated: 0, linked: 1 });
        let all = store.get_all_mappings().unwrap();
        assert_eq!(all.len(), 3);
        let date = all.iter().find(|m| m.name == "date").unwrap();
        for root in store.get_root_mappings().unwrap() {
            let children = store.get_mapping_children(root.id).unwrap();
            assert_eq!(children.len(), 1);
            assert_eq!(children[0].id, date.id);
        }
    }

    #[test]
    fn reimport_updates_by_name() {
        let store = GraphStore::in_memory().unwrap();
        let mut txn = store.begin().unwrap();
        import_mappings(&mut txn, &shared_set()).unwrap();
        txn.commit().unwrap();

        let mut changed = shared_set();
        changed.mappings[0].description = Some("births".into());
        let mut txn = store.begin().unwrap();
        let report = import_mappings(&mut txn, &changed).unwrap();
        txn.commit().unwrap();

        assert_eq!(report.created, 0);
        assert_eq!(store.get_all_mappings().unwrap().len(), 3);
        let birth = store
            .get_root_mappings()
            .unwrap()
            .into_iter()
            .find(|m| m.name == "birth")
            .unwrap();
        assert_eq!(birth.description.as_deref(), Some("births"));
    }

    #[test]
    fn export_repeats_shared_children() {
        let store = GraphStore::in_memory().unwrap();
        let mut txn = store.begin().unwrap();
        import_mappings(&mut txn, &shared_set()).unwrap();
        txn.commit().unwrap();

        let exported = MappingDocumentSet::export(&store).unwrap();
        assert_eq!(exported.document_count(), 4);
        let depths = names_by_depth(&exported);
        assert_eq!(depths[&0], vec!["birth", "death"]);
        assert_eq!(depths[&1], vec!["date", "date"]);
        assert_eq!(exported.mappings[0].children[0].id, exported.mappings[1].children[0].id);
    }
}
