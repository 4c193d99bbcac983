//! Graph data model: nodes, properties, triples and graph fragments.
//!
//! A [`Node`] shares its id with the URI interned for it (see
//! [`crate::registry`]). A [`Triple`] links a subject node through a predicate
//! node to either an object node or a literal. Derived nodes and triples carry
//! a *SID* (source identifier) whose leading segment is the GUID of the record
//! that produced them, so each record's fragment can be fetched, diffed and
//! retracted on its own.
//!
//! A [`GraphSet`] is the unit of work of one synchronization pass: the
//! fragment derived from a source record, expressed with UIDs so it can be
//! built before any id is assigned.

pub mod classes;

use serde::{Deserialize, Serialize};

/// Normalize a string for case-insensitive identity comparisons.
///
/// Uses Unicode default lower-casing, which does not depend on the process
/// locale. Every case-insensitive key in the store goes through here.
pub fn normalize_key(value: &str) -> String {
    value.to_lowercase()
}

/// Case-insensitive equality under [`normalize_key`].
pub fn same_key(a: &str, b: &str) -> bool {
    a == b || normalize_key(a) == normalize_key(b)
}

/// Case-insensitive equality for optional strings; `None` only equals `None`.
pub fn same_optional_key(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => same_key(a, b),
        _ => false,
    }
}

/// Whether `sid` falls under `scope`: it starts with `scope`
/// (case-insensitively) and the match ends at a `/`, `:` or `@`
/// discriminator or at the end of the SID, so `part-1` never matches
/// `part-10`.
pub fn sid_in_scope(sid: &str, scope: &str) -> bool {
    let sid = normalize_key(sid);
    let scope = normalize_key(scope);
    sid.strip_prefix(scope.as_str())
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', ':', '@']))
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Where a node came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeSourceType {
    /// Manually curated; never receives a SID.
    #[default]
    User,
    /// Derived from an item.
    Item,
    /// Derived from an item's facet.
    ItemFacet,
    /// Derived from an item's group (or one of its components).
    ItemGroup,
    /// Derived from a data pin of a part.
    Pin,
    /// Created only to satisfy a triple's subject, predicate or object.
    Implicit,
    /// Imported from a thesaurus as a class.
    Thesaurus,
}

impl std::fmt::Display for NodeSourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeSourceType::User => "user",
            NodeSourceType::Item => "item",
            NodeSourceType::ItemFacet => "item-facet",
            NodeSourceType::ItemGroup => "item-group",
            NodeSourceType::Pin => "pin",
            NodeSourceType::Implicit => "implicit",
            NodeSourceType::Thesaurus => "thesaurus",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for NodeSourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_key(s).as_str() {
            "user" => Ok(Self::User),
            "item" => Ok(Self::Item),
            "item-facet" | "facet" => Ok(Self::ItemFacet),
            "item-group" | "group" => Ok(Self::ItemGroup),
            "pin" => Ok(Self::Pin),
            "implicit" => Ok(Self::Implicit),
            "thesaurus" => Ok(Self::Thesaurus),
            other => Err(format!("unknown node source type: {other}")),
        }
    }
}

/// A graph vertex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Id shared with the interned URI; 0 until assigned.
    pub id: u64,
    /// The interned URI (UID) text.
    pub uid: String,
    /// Human-readable label.
    pub label: String,
    /// Whether this node is a class.
    pub is_class: bool,
    /// Optional tag, e.g. `property` for predicates.
    pub tag: Option<String>,
    pub source_type: NodeSourceType,
    /// Source identifier; `None` for user-authored and implicit nodes.
    pub sid: Option<String>,
}

impl Node {
    /// Create a user node with the label defaulting to the UID.
    pub fn new(uid: impl Into<String>) -> Self {
        let uid = uid.into();
        Self {
            id: 0,
            label: uid.clone(),
            uid,
            is_class: false,
            tag: None,
            source_type: NodeSourceType::User,
            sid: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_source_type(mut self, source_type: NodeSourceType) -> Self {
        self.source_type = source_type;
        self
    }

    pub fn as_class(mut self) -> Self {
        self.is_class = true;
        self
    }

    /// Whether the mutable fields of `other` differ from this node's.
    pub fn differs_from(&self, other: &Node) -> bool {
        self.label != other.label
            || self.is_class != other.is_class
            || !same_optional_key(self.tag.as_deref(), other.tag.as_deref())
            || self.source_type != other.source_type
            || !same_optional_key(self.sid.as_deref(), other.sid.as_deref())
    }

    /// Whether the node carries the given tag (case-insensitive).
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag.as_deref().is_some_and(|t| same_key(t, tag))
    }
}

/// Extension of a predicate node with literal metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    /// Same id as the predicate node.
    pub id: u64,
    /// The predicate's UID, denormalized for lookups.
    pub uid: String,
    pub data_type: Option<String>,
    pub literal_editor: Option<String>,
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Triples
// ---------------------------------------------------------------------------

/// XSD types whose literals get a numeric projection in `literal_number`.
const NUMERIC_LITERAL_TYPES: &[&str] = &[
    "xsd:float",
    "xsd:double",
    "xsd:decimal",
    "xsd:int",
    "xsd:integer",
    "xsd:long",
    "xsd:short",
    "xsd:byte",
    "xsd:nonnegativeinteger",
    "xsd:nonpositiveinteger",
    "xsd:negativeinteger",
    "xsd:positiveinteger",
    "xsd:unsignedlong",
    "xsd:unsignedint",
    "xsd:unsignedshort",
    "xsd:unsignedbyte",
];

/// A subject–predicate–object fact.
///
/// Exactly one of `object_id` and `object_literal` is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    /// 0 until stored.
    pub id: u64,
    pub subject_id: u64,
    pub predicate_id: u64,
    pub object_id: Option<u64>,
    pub object_literal: Option<String>,
    pub literal_type: Option<String>,
    pub literal_language: Option<String>,
    pub literal_number: Option<f64>,
    pub sid: Option<String>,
    pub tag: Option<String>,
}

impl Triple {
    /// Create a triple whose object is a node.
    pub fn with_object(subject_id: u64, predicate_id: u64, object_id: u64) -> Self {
        Self {
            subject_id,
            predicate_id,
            object_id: Some(object_id),
            ..Default::default()
        }
    }

    /// Create a triple whose object is a literal.
    ///
    /// `literal_number` is derived from the literal when its type is numeric.
    pub fn with_literal(
        subject_id: u64,
        predicate_id: u64,
        literal: impl Into<String>,
        literal_type: Option<String>,
        literal_language: Option<String>,
    ) -> Self {
        let literal = literal.into();
        let literal_number = numeric_projection(&literal, literal_type.as_deref());
        Self {
            subject_id,
            predicate_id,
            object_literal: Some(literal),
            literal_type,
            literal_language,
            literal_number,
            ..Default::default()
        }
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Whether the object is a literal.
    pub fn is_literal(&self) -> bool {
        self.object_literal.is_some()
    }

    /// Check that exactly one object form is set.
    pub fn validate(&self) -> Result<(), crate::error::GraphError> {
        let message = match (self.object_id, &self.object_literal) {
            (Some(_), Some(_)) => "both an object node and an object literal are set",
            (None, None) => "neither an object node nor an object literal is set",
            _ if self.subject_id == 0 => "subject id is missing",
            _ if self.predicate_id == 0 => "predicate id is missing",
            _ => return Ok(()),
        };
        Err(crate::error::GraphError::InvalidTriple {
            message: message.into(),
        })
    }

    /// Store-level value identity used for deduplication.
    ///
    /// Same subject, predicate, SID and tag (tag case-insensitive), and either
    /// the same object node or the same literal with equal type and language.
    pub fn same_fact(&self, other: &Triple) -> bool {
        self.subject_id == other.subject_id
            && self.predicate_id == other.predicate_id
            && same_optional_key(self.sid.as_deref(), other.sid.as_deref())
            && same_optional_key(self.tag.as_deref(), other.tag.as_deref())
            && match (self.object_id, other.object_id) {
                (Some(a), Some(b)) => a == b,
                (None, None) => {
                    self.object_literal == other.object_literal
                        && self.literal_type == other.literal_type
                        && self.literal_language == other.literal_language
                }
                _ => false,
            }
    }

    /// Identity used when diffing fragments: subject, predicate,
    /// object-or-literal and SID, literal and SID compared case-insensitively.
    pub fn same_diff_identity(&self, other: &Triple) -> bool {
        self.subject_id == other.subject_id
            && self.predicate_id == other.predicate_id
            && same_optional_key(self.sid.as_deref(), other.sid.as_deref())
            && match (self.object_id, other.object_id) {
                (Some(a), Some(b)) => a == b,
                (None, None) => same_optional_key(
                    self.object_literal.as_deref(),
                    other.object_literal.as_deref(),
                ),
                _ => false,
            }
    }

    /// Whether the non-identity fields differ.
    pub fn differs_from(&self, other: &Triple) -> bool {
        !same_optional_key(self.tag.as_deref(), other.tag.as_deref())
            || self.object_literal != other.object_literal
            || self.literal_type != other.literal_type
            || self.literal_language != other.literal_language
            || self.literal_number != other.literal_number
    }
}

/// Parse a literal into a number when its type is a numeric XSD type.
pub fn numeric_projection(literal: &str, literal_type: Option<&str>) -> Option<f64> {
    let ty = normalize_key(literal_type?);
    if !NUMERIC_LITERAL_TYPES.contains(&ty.as_str()) {
        return None;
    }
    literal.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// A triple expressed with UIDs, as produced by the mapper.
///
/// The embedded [`Triple`]'s ids are filled in when the UIDs are interned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UidTriple {
    pub triple: Triple,
    pub subject_uid: String,
    pub predicate_uid: String,
    /// Set when the object is a node.
    pub object_uid: Option<String>,
}

impl UidTriple {
    /// [`Triple::same_diff_identity`] over UIDs, for triples not yet interned.
    pub fn same_uid_identity(&self, other: &UidTriple) -> bool {
        same_key(&self.subject_uid, &other.subject_uid)
            && same_key(&self.predicate_uid, &other.predicate_uid)
            && same_optional_key(self.object_uid.as_deref(), other.object_uid.as_deref())
            && same_optional_key(
                self.triple.object_literal.as_deref(),
                other.triple.object_literal.as_deref(),
            )
            && same_optional_key(self.triple.sid.as_deref(), other.triple.sid.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Registry and closure rows
// ---------------------------------------------------------------------------

/// An interned URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UriEntry {
    pub id: u64,
    pub uri: String,
}

/// A UID minted by the UID builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UidEntry {
    pub id: u64,
    pub sid: String,
    pub unsuffixed: String,
    pub has_suffix: bool,
}

impl UidEntry {
    /// The full UID: the unsuffixed value plus `#<id>` when suffixed.
    pub fn uid(&self) -> String {
        if self.has_suffix {
            format!("{}#{}", self.unsuffixed, self.id)
        } else {
            self.unsuffixed.clone()
        }
    }
}

/// Materialized "is-a" membership of a node in a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeClassEntry {
    pub node_id: u64,
    pub class_id: u64,
    /// 0 for direct `rdf:type` classes, +1 per subclass-of hop.
    pub level: u32,
}

// ---------------------------------------------------------------------------
// Graph set
// ---------------------------------------------------------------------------

/// A fragment of the graph: the unit of work of one synchronization pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSet {
    pub nodes: Vec<Node>,
    pub triples: Vec<UidTriple>,
}

impl GraphSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node unless one with the same UID is already present.
    ///
    /// Returns whether the node was added.
    pub fn add_node(&mut self, node: Node) -> bool {
        if self.find_node(&node.uid).is_some() {
            return false;
        }
        self.nodes.push(node);
        true
    }

    /// Add a triple unless an identical one is already present.
    pub fn add_triple(&mut self, triple: UidTriple) -> bool {
        if self.triples.iter().any(|t| t.same_uid_identity(&triple)) {
            return false;
        }
        self.triples.push(triple);
        true
    }

    /// Find a node by UID (case-insensitive).
    pub fn find_node(&self, uid: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| same_key(&n.uid, uid))
    }

    /// Merge another fragment into this one.
    pub fn merge(&mut self, other: GraphSet) {
        for node in other.nodes {
            self.add_node(node);
        }
        for triple in other.triples {
            self.add_triple(triple);
        }
    }

    /// Extract the sub-fragment belonging to one provenance scope.
    ///
    /// An empty `scope` selects nodes and triples without a SID.
    pub fn scoped(&self, scope: &str) -> GraphSet {
        let in_scope = |sid: Option<&str>| match sid {
            None | Some("") => scope.is_empty(),
            Some(sid) => !scope.is_empty() && sid_in_scope(sid, scope),
        };
        GraphSet {
            nodes: self
                .nodes
                .iter()
                .filter(|n| in_scope(n.sid.as_deref()))
                .cloned()
                .collect(),
            triples: self
                .triples
                .iter()
                .filter(|t| in_scope(t.triple.sid.as_deref()))
                .cloned()
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.triples.is_empty()
    }
}
