//! Source records as seen by the mapper.
//!
//! Only the parts of a record the mapper reads are modeled: the item with its
//! title, facet, group and flags, and its parts with their data pins.

use serde::{Deserialize, Serialize};

/// Separator of pin scope suffixes (`event-place@ev1`).
pub const EID_SEPARATOR: char = '@';

/// A source record: an item with its parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSource {
    pub item: SourceItem,
    #[serde(default)]
    pub parts: Vec<SourcePart>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceItem {
    /// Record GUID.
    pub id: String,
    pub title: String,
    pub description: String,
    pub facet_id: String,
    /// Possibly composite (`a/b/c`) group id.
    pub group_id: Option<String>,
    pub flags: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcePart {
    /// Part GUID.
    pub id: String,
    pub type_id: String,
    pub role_id: Option<String>,
    pub pins: Vec<DataPin>,
}

/// A named scalar extracted from a part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPin {
    pub name: String,
    pub value: String,
}

impl GraphSource {
    pub fn new(item: SourceItem) -> Self {
        Self {
            item,
            parts: Vec::new(),
        }
    }

    pub fn with_part(mut self, part: SourcePart) -> Self {
        self.parts.push(part);
        self
    }

    /// Ids of every record in the source: the item, then its parts in order.
    pub fn record_ids(&self) -> Vec<&str> {
        std::iter::once(self.item.id.as_str())
            .chain(self.parts.iter().map(|p| p.id.as_str()))
            .collect()
    }
}

impl SourcePart {
    pub fn new(id: impl Into<String>, type_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_id: type_id.into(),
            ..Default::default()
        }
    }

    pub fn with_pin(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.pins.push(DataPin {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Number of pins carrying exactly this full name.
    pub fn pin_name_count(&self, full_name: &str) -> usize {
        self.pins.iter().filter(|p| p.name == full_name).count()
    }
}

impl DataPin {
    /// The name without scope suffixes.
    pub fn base_name(&self) -> &str {
        self.name
            .split_once(EID_SEPARATOR)
            .map_or(self.name.as_str(), |(base, _)| base)
    }

    /// The scope suffixes, outermost first.
    pub fn eids(&self) -> Vec<&str> {
        self.name.split(EID_SEPARATOR).skip(1).collect()
    }

    /// Whether this pin's scope chain starts with `other`'s.
    pub fn shares_scope_with(&self, other: &DataPin) -> bool {
        let mine = self.eids();
        let theirs = other.eids();
        mine.len() >= theirs.len() && mine.iter().zip(&theirs).all(|(a, b)| a == b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_scopes() {
        let pin = DataPin {
            name: "event-place@ev1@p2".into(),
            value: "Arezzo".into(),
        };
        assert_eq!(pin.base_name(), "event-place");
        assert_eq!(pin.eids(), vec!["ev1", "p2"]);

        let parent = DataPin {
            name: "event-type@ev1".into(),
            value: "sent".into(),
        };
        let other = DataPin {
            name: "event-type@ev2".into(),
            value: "received".into(),
        };
        assert!(pin.shares_scope_with(&parent));
        assert!(!pin.shares_scope_with(&other));
        assert!(!parent.shares_scope_with(&pin));
    }

    #[test]
    fn record_ids_list_item_then_parts() {
        let source = GraphSource::new(SourceItem {
            id: "item".into(),
            ..Default::default()
        })
        .with_part(SourcePart::new("p1", "events"))
        .with_part(SourcePart::new("p2", "dates"));
        assert_eq!(source.record_ids(), vec!["item", "p1", "p2"]);
    }
}
