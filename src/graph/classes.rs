//! Class materializer: the per-node transitive "is-a" closure.
//!
//! Level 0 holds the direct `rdf:type` objects of a node; every further
//! `rdfs:subClassOf` hop adds one level. A class reachable over several paths
//! keeps its minimal level, found breadth-first. Subclass cycles are
//! tolerated.
//!
//! Closures are refreshed incrementally inside the write transaction that
//! changed the underlying triples (see [`GraphTxn::commit`]), or rebuilt in
//! bulk by [`rebuild_all`], which commits in small batches so concurrent
//! synchronizations are not starved.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::error::GraphResult;
use crate::graph::{Node, NodeClassEntry, NodeSourceType};
use crate::store::{GraphStore, GraphTxn};

/// Ids of the two predicates the closure is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassPredicates {
    pub type_id: u64,
    pub subclass_id: u64,
}

impl ClassPredicates {
    /// Resolve both predicates, creating their nodes on first use.
    pub fn resolve(txn: &mut GraphTxn<'_>) -> GraphResult<Self> {
        let vocabulary = txn.store().vocabulary().clone();
        Ok(Self {
            type_id: ensure_predicate(txn, &vocabulary.type_uri, &vocabulary.predicate_tag)?,
            subclass_id: ensure_predicate(txn, &vocabulary.subclass_uri, &vocabulary.predicate_tag)?,
        })
    }
}

fn ensure_predicate(txn: &mut GraphTxn<'_>, uri: &str, tag: &str) -> GraphResult<u64> {
    let mut node = Node::new(uri)
        .with_tag(tag)
        .with_source_type(NodeSourceType::Implicit);
    txn.upsert_node(&mut node, true)?;
    Ok(node.id)
}

/// Compute the closure of one node from the triples visible to `txn`.
pub fn compute_classes(
    txn: &GraphTxn<'_>,
    predicates: ClassPredicates,
    node_id: u64,
) -> GraphResult<Vec<NodeClassEntry>> {
    let mut entries = Vec::new();
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();

    for class_id in txn.objects_of(node_id, predicates.type_id)? {
        if visited.insert(class_id) {
            queue.push_back((class_id, 0u32));
        }
    }
    while let Some((class_id, level)) = queue.pop_front() {
        entries.push(NodeClassEntry {
            node_id,
            class_id,
            level,
        });
        for parent in txn.objects_of(class_id, predicates.subclass_id)? {
            if visited.insert(parent) {
                queue.push_back((parent, level + 1));
            }
        }
    }
    entries.sort_by_key(|e| (e.level, e.class_id));
    Ok(entries)
}

/// Recompute and replace the closure of one node.
///
/// A node that no longer exists ends up with no entries. Returns the number
/// of entries stored.
pub fn refresh_classes(txn: &mut GraphTxn<'_>, node_id: u64) -> GraphResult<usize> {
    let predicates = txn.class_predicates()?;
    let entries = if txn.get_node(node_id)?.is_some() {
        compute_classes(txn, predicates, node_id)?
    } else {
        Vec::new()
    };
    txn.replace_node_classes(node_id, &entries)?;
    Ok(entries.len())
}

/// Receives progress of a bulk rebuild.
pub trait ProgressSink {
    fn report(&self, processed: usize, total: usize);
}

impl<F: Fn(usize, usize)> ProgressSink for F {
    fn report(&self, processed: usize, total: usize) {
        self(processed, total)
    }
}

/// A sink that drops every report.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _processed: usize, _total: usize) {}
}

/// Tuning of [`rebuild_all`].
#[derive(Debug, Clone, Copy)]
pub struct RebuildOptions {
    /// Nodes refreshed per write transaction.
    pub batch_size: usize,
    /// Report progress every this many nodes.
    pub progress_step: usize,
}

impl Default for RebuildOptions {
    fn default() -> Self {
        Self {
            batch_size: 64,
            progress_step: 100,
        }
    }
}

/// Outcome of [`rebuild_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub total: usize,
    pub processed: usize,
    pub cancelled: bool,
}

/// Rebuild the closure of every non-class node.
///
/// `cancel` is checked before each node; batches already committed stay
/// committed.
pub fn rebuild_all(
    store: &GraphStore,
    options: RebuildOptions,
    cancel: &AtomicBool,
    progress: &dyn ProgressSink,
) -> GraphResult<RebuildReport> {
    let node_ids = store.node_ids(false)?;
    let mut report = RebuildReport {
        total: node_ids.len(),
        ..Default::default()
    };
    tracing::info!(total = report.total, "rebuilding class closures");

    let step = options.progress_step.max(1);
    for batch in node_ids.chunks(options.batch_size.max(1)) {
        let mut txn = store.begin()?;
        for &node_id in batch {
            if cancel.load(Ordering::Relaxed) {
                txn.commit()?;
                report.cancelled = true;
                tracing::warn!(processed = report.processed, "class rebuild cancelled");
                return Ok(report);
            }
            refresh_classes(&mut txn, node_id)?;
            report.processed += 1;
            if report.processed % step == 0 {
                progress.report(report.processed, report.total);
            }
        }
        txn.commit()?;
    }

    progress.report(report.processed, report.total);
    tracing::info!(processed = report.processed, "class closures rebuilt");
    Ok(report)
}
