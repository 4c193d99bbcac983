//! Node mappings: user-authored rules turning source records into graph
//! fragments.
//!
//! Mappings form a DAG: a mapping can be shared under several parents.
//! They are stored as flat records keyed by id with child adjacency kept
//! apart (see [`crate::store`]), and loaded into providers
//! ([`cache::MappingArena`], [`cache::MappingCache`]) that hand out compiled
//! mappings by id. The [`mapper::NodeMapper`] walks them with an explicit
//! path of applied mapping ids.

pub mod cache;
pub mod interchange;
pub mod mapper;
pub mod source;
pub mod template;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::NodeSourceType;

pub use cache::{CompiledMapping, MappingArena, MappingCache, MappingProvider};
pub use mapper::{MapperOptions, NodeMapper};
pub use source::{DataPin, GraphSource, SourceItem, SourcePart};

/// What a mapping is applied to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MappingSourceType {
    /// The item as a whole.
    #[default]
    Item,
    /// The item's facet.
    ItemFacet,
    /// The item's group, once per component when composite.
    ItemGroup,
    /// Each matching data pin of the item's parts.
    Pin,
}

impl MappingSourceType {
    /// Source type given to nodes produced by mappings of this type.
    pub fn node_source_type(self) -> NodeSourceType {
        match self {
            Self::Item => NodeSourceType::Item,
            Self::ItemFacet => NodeSourceType::ItemFacet,
            Self::ItemGroup => NodeSourceType::ItemGroup,
            Self::Pin => NodeSourceType::Pin,
        }
    }

    /// Template of the source value when a mapping declares none.
    pub fn default_source(self) -> &'static str {
        match self {
            Self::Item => "{title}",
            Self::ItemFacet => "{facet-id}",
            Self::ItemGroup => "{group-id}",
            Self::Pin => "{pin-value}",
        }
    }
}

impl std::fmt::Display for MappingSourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Item => "item",
            Self::ItemFacet => "item-facet",
            Self::ItemGroup => "item-group",
            Self::Pin => "pin",
        };
        f.write_str(s)
    }
}

/// Filters a mapping declares; unset filters always pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingFilter {
    /// Facet id, compared case-insensitively.
    pub facet: Option<String>,
    /// Regex over the item's group id.
    pub group: Option<String>,
    /// Bits that must all be set in the item's flags; 0 disables the filter.
    pub flags: u32,
    /// Regex over the item's title.
    pub title: Option<String>,
    pub part_type: Option<String>,
    pub part_role: Option<String>,
    /// Pin base name, without `@eid` suffixes.
    pub pin_name: Option<String>,
}

/// A node produced by a mapping application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeTemplate {
    /// Name other templates of the same mapping use as `?key`.
    pub key: String,
    /// Explicit UID template; takes precedence over `prefix`.
    pub uid: Option<String>,
    /// UID prefix template, completed with the slug of the label.
    pub prefix: Option<String>,
    /// Label template; empty means the source value.
    pub label: String,
    pub tag: Option<String>,
}

/// A triple produced by a mapping application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripleTemplate {
    /// Subject; empty means the node produced by this mapping.
    pub s: Option<String>,
    /// Predicate UID or macro.
    pub p: String,
    /// Object; empty (with no `ol`) means the parent's produced node.
    pub o: Option<String>,
    /// Literal object: `"value"^^type`, `"value"@lang`, or a bare value.
    pub ol: Option<String>,
    /// Swap subject and object.
    pub reversed: bool,
    pub tag: Option<String>,
}

/// What a mapping emits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingOutput {
    /// Extra variables, resolved per application and visible to descendants.
    pub metadata: BTreeMap<String, String>,
    /// The first template is the mapping's produced node.
    pub nodes: Vec<NodeTemplate>,
    pub triples: Vec<TripleTemplate>,
}

/// A mapping rule.
///
/// `parent_id` records the first parent; the full set of parents lives in
/// the child adjacency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMapping {
    pub id: u64,
    pub parent_id: Option<u64>,
    pub ordinal: i32,
    pub name: String,
    pub source_type: MappingSourceType,
    pub filter: MappingFilter,
    pub description: Option<String>,
    /// Source value template; see [`MappingSourceType::default_source`].
    pub source: Option<String>,
    /// SID discriminator template appended to the record GUID.
    pub sid: Option<String>,
    /// Regex the source value must match.
    pub scalar_pattern: Option<String>,
    pub output: MappingOutput,
}

impl NodeMapping {
    /// A blank item mapping with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_source_type(mut self, source_type: MappingSourceType) -> Self {
        self.source_type = source_type;
        self
    }

    pub fn with_filter(mut self, filter: MappingFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_node(mut self, node: NodeTemplate) -> Self {
        self.output.nodes.push(node);
        self
    }

    pub fn with_triple(mut self, triple: TripleTemplate) -> Self {
        self.output.triples.push(triple);
        self
    }
}

impl NodeTemplate {
    /// A template deriving its UID from `prefix` and the slugged label.
    pub fn prefixed(key: &str, prefix: &str, label: &str) -> Self {
        Self {
            key: key.into(),
            prefix: Some(prefix.into()),
            label: label.into(),
            ..Default::default()
        }
    }

    /// A template with an explicit UID.
    pub fn with_uid(key: &str, uid: &str, label: &str) -> Self {
        Self {
            key: key.into(),
            uid: Some(uid.into()),
            label: label.into(),
            ..Default::default()
        }
    }
}

impl TripleTemplate {
    /// `? --p--> o` with the default subject.
    pub fn to_object(p: &str, o: &str) -> Self {
        Self {
            p: p.into(),
            o: Some(o.into()),
            ..Default::default()
        }
    }

    /// `? --p--> literal` with the default subject.
    pub fn to_literal(p: &str, ol: &str) -> Self {
        Self {
            p: p.into(),
            ol: Some(ol.into()),
            ..Default::default()
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    pub fn from_subject(mut self, s: &str) -> Self {
        self.s = Some(s.into());
        self
    }
}
