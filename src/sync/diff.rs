//! Reconciliation of a freshly mapped fragment against the stored one.
//!
//! [`GraphSetDiffer::diff`] is pure: it partitions nodes by UID and triples
//! by diff identity. [`GraphTxn::apply_diff`] then writes the plan in a fixed
//! order: delete triples, delete nodes, insert nodes, insert triples, update
//! in place.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::GraphResult;
use crate::graph::{GraphSet, Node, NodeSourceType, UidTriple, same_key};
use crate::store::GraphTxn;

/// Mutation plan for one provenance scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphDiff {
    pub added_nodes: Vec<Node>,
    /// New field values carrying the stored id.
    pub updated_nodes: Vec<Node>,
    pub deleted_nodes: Vec<Node>,
    /// Missing from the new fragment but kept by the deletion guard.
    pub protected_nodes: Vec<Node>,
    pub added_triples: Vec<UidTriple>,
    pub updated_triples: Vec<UidTriple>,
    pub deleted_triples: Vec<UidTriple>,
}

impl GraphDiff {
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.updated_nodes.is_empty()
            && self.deleted_nodes.is_empty()
            && self.added_triples.is_empty()
            && self.updated_triples.is_empty()
            && self.deleted_triples.is_empty()
    }
}

/// Computes [`GraphDiff`]s.
#[derive(Debug, Clone)]
pub struct GraphSetDiffer {
    predicate_tag: String,
}

impl GraphSetDiffer {
    pub fn new(predicate_tag: impl Into<String>) -> Self {
        Self {
            predicate_tag: predicate_tag.into(),
        }
    }

    /// Diff `new` against `old`, the stored fragment of the same scope.
    ///
    /// Old nodes missing from `new` are deleted unless they are classes,
    /// carry the predicate tag, or are still used by a triple of `new`.
    pub fn diff(&self, new: &GraphSet, old: &GraphSet) -> GraphDiff {
        let mut diff = GraphDiff::default();

        for node in &new.nodes {
            match old.find_node(&node.uid) {
                None => diff.added_nodes.push(node.clone()),
                Some(stored) if node.differs_from(stored) => {
                    let mut updated = node.clone();
                    updated.id = stored.id;
                    updated.uid = stored.uid.clone();
                    diff.updated_nodes.push(updated);
                }
                Some(_) => {}
            }
        }
        for stored in &old.nodes {
            if new.find_node(&stored.uid).is_some() {
                continue;
            }
            if self.is_protected(stored, new) {
                diff.protected_nodes.push(stored.clone());
            } else {
                diff.deleted_nodes.push(stored.clone());
            }
        }

        for triple in &new.triples {
            match old.triples.iter().find(|t| t.same_uid_identity(triple)) {
                None => diff.added_triples.push(triple.clone()),
                Some(stored) if triple.triple.differs_from(&stored.triple) => {
                    let mut updated = triple.clone();
                    updated.triple.id = stored.triple.id;
                    updated.triple.subject_id = stored.triple.subject_id;
                    updated.triple.predicate_id = stored.triple.predicate_id;
                    updated.triple.object_id = stored.triple.object_id;
                    diff.updated_triples.push(updated);
                }
                Some(_) => {}
            }
        }
        for stored in &old.triples {
            if !new.triples.iter().any(|t| t.same_uid_identity(stored)) {
                diff.deleted_triples.push(stored.clone());
            }
        }
        diff
    }

    fn is_protected(&self, node: &Node, new: &GraphSet) -> bool {
        node.is_class
            || node.has_tag(&self.predicate_tag)
            || new.triples.iter().any(|t| {
                same_key(&t.subject_uid, &node.uid)
                    || same_key(&t.predicate_uid, &node.uid)
                    || t.object_uid.as_deref().is_some_and(|o| same_key(o, &node.uid))
            })
    }
}

/// What applying one or more diffs wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppliedDiff {
    pub added_nodes: usize,
    pub updated_nodes: usize,
    pub deleted_nodes: usize,
    pub protected_nodes: usize,
    pub added_triples: usize,
    pub updated_triples: usize,
    pub deleted_triples: usize,
    /// Nodes whose row or triples changed; queued for class refresh.
    pub touched: BTreeSet<u64>,
}

impl AppliedDiff {
    pub fn merge(&mut self, other: AppliedDiff) {
        self.added_nodes += other.added_nodes;
        self.updated_nodes += other.updated_nodes;
        self.deleted_nodes += other.deleted_nodes;
        self.protected_nodes += other.protected_nodes;
        self.added_triples += other.added_triples;
        self.updated_triples += other.updated_triples;
        self.deleted_triples += other.deleted_triples;
        self.touched.extend(other.touched);
    }

    /// Whether nothing was written.
    pub fn is_noop(&self) -> bool {
        self.added_nodes == 0
            && self.updated_nodes == 0
            && self.deleted_nodes == 0
            && self.added_triples == 0
            && self.updated_triples == 0
            && self.deleted_triples == 0
    }
}

impl GraphTxn<'_> {
    /// Write a diff. With `no_update_if_exists`, added nodes that already
    /// exist are left as stored.
    pub fn apply_diff(&mut self, diff: &GraphDiff, no_update_if_exists: bool) -> GraphResult<AppliedDiff> {
        let mut applied = AppliedDiff::default();

        for triple in &diff.deleted_triples {
            let t = &triple.triple;
            if self.delete_triple(t.id)? {
                applied.deleted_triples += 1;
                applied.touched.insert(t.subject_id);
                applied.touched.extend(t.object_id);
            }
        }

        let none = BTreeSet::new();
        for node in &diff.deleted_nodes {
            if self.is_referenced(node.id, &none)? {
                tracing::debug!(uid = %node.uid, "node still referenced, kept");
                applied.protected_nodes += 1;
            } else if self.delete_node(node.id)? {
                applied.deleted_nodes += 1;
                applied.touched.remove(&node.id);
            }
        }
        applied.protected_nodes += diff.protected_nodes.len();

        for node in &diff.added_nodes {
            let mut node = node.clone();
            if self.upsert_node(&mut node, no_update_if_exists)? {
                applied.added_nodes += 1;
                applied.touched.insert(node.id);
            }
        }

        for triple in &diff.added_triples {
            let mut t = self.resolve_triple(triple)?;
            if self.upsert_triple(&mut t)? {
                applied.added_triples += 1;
                applied.touched.insert(t.subject_id);
                applied.touched.extend(t.object_id);
            }
        }

        for node in &diff.updated_nodes {
            let mut node = node.clone();
            if self.upsert_node(&mut node, false)? {
                applied.updated_nodes += 1;
                applied.touched.insert(node.id);
            }
        }
        for triple in &diff.updated_triples {
            let mut t = triple.triple.clone();
            if self.upsert_triple(&mut t)? {
                applied.updated_triples += 1;
                applied.touched.insert(t.subject_id);
                applied.touched.extend(t.object_id);
            }
        }

        for id in &applied.touched {
            self.enqueue_refresh(*id);
        }
        Ok(applied)
    }

    /// Intern the UIDs of a mapped triple, creating implicit nodes for
    /// endpoints that have none yet.
    fn resolve_triple(&mut self, triple: &UidTriple) -> GraphResult<crate::graph::Triple> {
        let mut t = triple.triple.clone();
        t.id = 0;
        let predicate_tag = self.store().vocabulary().predicate_tag.clone();
        t.subject_id = self.ensure_node(&triple.subject_uid, None)?;
        t.predicate_id = self.ensure_node(&triple.predicate_uid, Some(&predicate_tag))?;
        t.object_id = match triple.object_uid.as_deref() {
            Some(uid) => Some(self.ensure_node(uid, None)?),
            None => None,
        };
        Ok(t)
    }

    /// Id of the node named `uid`, creating an implicit node (tagged with
    /// `tag`, if any) when there is none.
    pub(crate) fn ensure_node(&mut self, uid: &str, tag: Option<&str>) -> GraphResult<u64> {
        if let Some(id) = self.lookup_id(uid)?
            && self.get_node(id)?.is_some()
        {
            return Ok(id);
        }
        let mut node = Node::new(uid).with_source_type(NodeSourceType::Implicit);
        if let Some(tag) = tag {
            node = node.with_tag(tag);
        }
        self.upsert_node(&mut node, true)?;
        Ok(node.id)
    }
}
