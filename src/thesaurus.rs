//! Thesaurus import: a flat list of dotted entries becomes a class tree.
//!
//! Entry `a.b` is a child of `a`. Each entry is stored as a class node
//! `<prefix><entry id>` labeled with the entry value, linked to its parent
//! class by the subclass-of predicate.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::GraphResult;
use crate::graph::{Node, NodeSourceType, Triple, normalize_key};
use crate::registry::require_non_empty;
use crate::store::GraphTxn;

/// Separator of hierarchical entry ids.
pub const LEVEL_SEPARATOR: char = '.';

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thesaurus {
    pub id: String,
    #[serde(default)]
    pub entries: Vec<ThesaurusEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThesaurusEntry {
    pub id: String,
    pub value: String,
}

impl ThesaurusEntry {
    /// Id of the parent entry, if the id has more than one level.
    pub fn parent_id(&self) -> Option<&str> {
        self.id.rsplit_once(LEVEL_SEPARATOR).map(|(parent, _)| parent)
    }
}

/// Counts of a thesaurus import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ThesaurusImport {
    pub classes: usize,
    pub links: usize,
    /// Entries whose parent is not in the thesaurus.
    pub orphans: usize,
}

/// Import a thesaurus as class nodes under `prefix`.
pub fn import_thesaurus(
    txn: &mut GraphTxn<'_>,
    thesaurus: &Thesaurus,
    prefix: &str,
) -> GraphResult<ThesaurusImport> {
    require_non_empty("thesaurus.id", &thesaurus.id)?;
    let mut report = ThesaurusImport::default();
    let known: BTreeSet<String> = thesaurus
        .entries
        .iter()
        .map(|e| normalize_key(&e.id))
        .collect();

    for entry in &thesaurus.entries {
        let mut node = Node::new(format!("{prefix}{}", entry.id))
            .with_label(entry.value.clone())
            .with_source_type(NodeSourceType::Thesaurus)
            .as_class();
        if txn.upsert_node(&mut node, false)? {
            report.classes += 1;
        }
    }

    let subclass_id = txn.class_predicates()?.subclass_id;
    for entry in &thesaurus.entries {
        let Some(parent) = entry.parent_id() else {
            continue;
        };
        if !known.contains(&normalize_key(parent)) {
            tracing::warn!(thesaurus = %thesaurus.id, entry = %entry.id, "parent entry missing");
            report.orphans += 1;
            continue;
        }
        let child_id = txn.intern_uri(&format!("{prefix}{}", entry.id))?;
        let parent_id = txn.intern_uri(&format!("{prefix}{parent}"))?;
        let mut link = Triple::with_object(child_id, subclass_id, parent_id);
        if txn.upsert_triple(&mut link)? {
            report.links += 1;
        }
    }

    tracing::info!(
        thesaurus = %thesaurus.id,
        classes = report.classes,
        links = report.links,
        "imported thesaurus"
    );
    Ok(report)
}
