//! Filters and paging for graph retrieval.
//!
//! Filters are plain data; [`NodeFilter::matches`] and friends evaluate the
//! record-local criteria, while index-backed criteria (class membership,
//! linked nodes, SID prefixes) are resolved by [`crate::store::GraphStore`]
//! before records are scanned.

use serde::{Deserialize, Serialize};

use crate::graph::{Node, NodeSourceType, Property, Triple, normalize_key, same_key};

/// Page selection: `page_number` is 1-based; `page_size` 0 returns everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingOptions {
    pub page_number: usize,
    pub page_size: usize,
}

impl Default for PagingOptions {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: 20,
        }
    }
}

impl PagingOptions {
    pub fn new(page_number: usize, page_size: usize) -> Self {
        Self {
            page_number: page_number.max(1),
            page_size,
        }
    }

    /// A single page holding every match.
    pub fn all() -> Self {
        Self::new(1, 0)
    }

    fn skip(&self) -> usize {
        self.page_number.saturating_sub(1) * self.page_size
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPage<T> {
    pub page_number: usize,
    pub page_size: usize,
    pub total: usize,
    pub items: Vec<T>,
}

impl<T> DataPage<T> {
    /// Cut a page out of the full, already ordered match list.
    pub fn from_matches(paging: PagingOptions, matches: Vec<T>) -> Self {
        let total = matches.len();
        let items = if paging.page_size == 0 {
            matches
        } else {
            matches
                .into_iter()
                .skip(paging.skip())
                .take(paging.page_size)
                .collect()
        };
        Self {
            page_number: paging.page_number.max(1),
            page_size: paging.page_size,
            total,
            items,
        }
    }

    /// Number of pages for the total count.
    pub fn page_count(&self) -> usize {
        if self.page_size == 0 {
            return usize::from(self.total > 0);
        }
        self.total.div_ceil(self.page_size)
    }
}

/// Tag criterion: `None` matches any tag, `Some("")` only untagged records,
/// anything else an equal tag (case-insensitive).
fn tag_matches(filter: Option<&str>, tag: Option<&str>) -> bool {
    match filter {
        None => true,
        Some("") => tag.is_none_or(str::is_empty),
        Some(wanted) => tag.is_some_and(|t| same_key(t, wanted)),
    }
}

/// SID criterion: exact (case-insensitive) or prefix match.
fn sid_matches(filter: Option<&str>, prefix: bool, sid: Option<&str>) -> bool {
    let Some(wanted) = filter else {
        return true;
    };
    let Some(sid) = sid else {
        return false;
    };
    if prefix {
        normalize_key(sid).starts_with(&normalize_key(wanted))
    } else {
        same_key(sid, wanted)
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    normalize_key(haystack).contains(&normalize_key(needle))
}

/// Role of the filtered node in a linked-node query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkedRole {
    /// The filtered node is the subject; the linked node is the object.
    Subject,
    /// The filtered node is the object; the linked node is the subject.
    Object,
}

/// "Nodes linked to `node_id` through `predicate_id`".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedNodeFilter {
    pub predicate_id: u64,
    pub node_id: u64,
    /// `None` accepts both directions.
    pub role: Option<LinkedRole>,
}

/// Node retrieval criteria.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeFilter {
    pub paging: PagingOptions,
    /// Substring of the UID.
    pub uid: Option<String>,
    /// Substring of the label.
    pub label: Option<String>,
    pub is_class: Option<bool>,
    pub tag: Option<String>,
    pub source_type: Option<NodeSourceType>,
    pub sid: Option<String>,
    pub sid_prefix: bool,
    /// Match nodes belonging (at any level) to any of these classes.
    pub class_ids: Vec<u64>,
    pub linked: Option<LinkedNodeFilter>,
}

impl NodeFilter {
    /// Evaluate the record-local criteria.
    pub fn matches(&self, node: &Node) -> bool {
        self.uid.as_deref().is_none_or(|u| contains_ci(&node.uid, u))
            && self.label.as_deref().is_none_or(|l| contains_ci(&node.label, l))
            && self.is_class.is_none_or(|c| node.is_class == c)
            && tag_matches(self.tag.as_deref(), node.tag.as_deref())
            && self.source_type.is_none_or(|st| node.source_type == st)
            && sid_matches(self.sid.as_deref(), self.sid_prefix, node.sid.as_deref())
    }
}

/// Triple retrieval criteria.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripleFilter {
    pub paging: PagingOptions,
    pub subject_id: Option<u64>,
    /// Accept any of these predicates (empty = any).
    pub predicate_ids: Vec<u64>,
    /// Reject these predicates.
    pub not_predicate_ids: Vec<u64>,
    pub object_id: Option<u64>,
    pub has_literal: Option<bool>,
    /// Substring of the literal (case-insensitive).
    pub literal: Option<String>,
    pub literal_type: Option<String>,
    pub literal_language: Option<String>,
    pub min_literal_number: Option<f64>,
    pub max_literal_number: Option<f64>,
    pub sid: Option<String>,
    pub sid_prefix: bool,
    pub tag: Option<String>,
}

impl TripleFilter {
    pub fn matches(&self, triple: &Triple) -> bool {
        self.subject_id.is_none_or(|s| triple.subject_id == s)
            && (self.predicate_ids.is_empty() || self.predicate_ids.contains(&triple.predicate_id))
            && !self.not_predicate_ids.contains(&triple.predicate_id)
            && self.object_id.is_none_or(|o| triple.object_id == Some(o))
            && self.has_literal.is_none_or(|l| triple.is_literal() == l)
            && self.literal.as_deref().is_none_or(|l| {
                triple
                    .object_literal
                    .as_deref()
                    .is_some_and(|v| contains_ci(v, l))
            })
            && self.literal_type.as_deref().is_none_or(|t| {
                triple.literal_type.as_deref().is_some_and(|v| same_key(v, t))
            })
            && self.literal_language.as_deref().is_none_or(|t| {
                triple
                    .literal_language
                    .as_deref()
                    .is_some_and(|v| same_key(v, t))
            })
            && self
                .min_literal_number
                .is_none_or(|min| triple.literal_number.is_some_and(|n| n >= min))
            && self
                .max_literal_number
                .is_none_or(|max| triple.literal_number.is_some_and(|n| n <= max))
            && sid_matches(self.sid.as_deref(), self.sid_prefix, triple.sid.as_deref())
            && tag_matches(self.tag.as_deref(), triple.tag.as_deref())
    }
}

/// Property retrieval criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub paging: PagingOptions,
    /// Substring of the predicate UID.
    pub uid: Option<String>,
    pub data_type: Option<String>,
    pub literal_editor: Option<String>,
}

impl PropertyFilter {
    pub fn matches(&self, property: &Property) -> bool {
        self.uid.as_deref().is_none_or(|u| contains_ci(&property.uid, u))
            && self.data_type.as_deref().is_none_or(|d| {
                property.data_type.as_deref().is_some_and(|v| same_key(v, d))
            })
            && self.literal_editor.as_deref().is_none_or(|e| {
                property
                    .literal_editor
                    .as_deref()
                    .is_some_and(|v| same_key(v, e))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_slices_matches() {
        let page = DataPage::from_matches(PagingOptions::new(2, 3), (1..=8).collect::<Vec<_>>());
        assert_eq!(page.total, 8);
        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.page_count(), 3);

        let all = DataPage::from_matches(PagingOptions::all(), vec![1, 2]);
        assert_eq!(all.items.len(), 2);
        assert_eq!(all.page_count(), 1);
    }

    #[test]
    fn empty_tag_means_untagged() {
        let untagged = Node::new("x:a");
        let tagged = Node::new("x:b").with_tag("property");

        let filter = NodeFilter {
            tag: Some(String::new()),
            ..Default::default()
        };
        assert!(filter.matches(&untagged));
        assert!(!filter.matches(&tagged));

        let any = NodeFilter::default();
        assert!(any.matches(&untagged));
        assert!(any.matches(&tagged));

        let property = NodeFilter {
            tag: Some("PROPERTY".into()),
            ..Default::default()
        };
        assert!(!property.matches(&untagged));
        assert!(property.matches(&tagged));
    }

    #[test]
    fn sid_prefix_and_exact() {
        let node = Node::new("x:a").with_sid("ABC/facet");
        let exact = NodeFilter {
            sid: Some("abc".into()),
            ..Default::default()
        };
        assert!(!exact.matches(&node));
        let prefix = NodeFilter {
            sid: Some("abc".into()),
            sid_prefix: true,
            ..Default::default()
        };
        assert!(prefix.matches(&node));
    }

    #[test]
    fn triple_literal_range() {
        let t = Triple::with_literal(1, 2, "1250", Some("xsd:float".into()), None);
        let filter = TripleFilter {
            min_literal_number: Some(1200.0),
            max_literal_number: Some(1300.0),
            ..Default::default()
        };
        assert!(filter.matches(&t));
        let filter = TripleFilter {
            min_literal_number: Some(1300.0),
            ..Default::default()
        };
        assert!(!filter.matches(&t));
    }
}
