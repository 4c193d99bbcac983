//! Bulk import of bootstrap data: nodes, properties and triples by UID.

use std::path::Path;

use miette::Diagnostic;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::GraphError;
use crate::graph::{Node, NodeSourceType, Property, Triple};
use crate::mapping::template::parse_literal;
use crate::store::GraphTxn;

#[derive(Debug, Error, Diagnostic)]
pub enum ImportError {
    #[error("failed to read {path}")]
    #[diagnostic(
        code(curator::import::io),
        help("Ensure the file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {message}")]
    #[diagnostic(
        code(curator::import::json),
        help("The file must hold a single JSON document of the expected shape.")
    )]
    Json { path: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),
}

pub type ImportResult<T> = std::result::Result<T, ImportError>;

/// Read and parse a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> ImportResult<T> {
    let content = std::fs::read_to_string(path).map_err(|e| ImportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| ImportError::Json {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeRecord {
    pub uid: String,
    pub label: Option<String>,
    pub is_class: bool,
    pub tag: Option<String>,
    pub source_type: NodeSourceType,
    pub sid: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyRecord {
    pub uid: String,
    pub data_type: Option<String>,
    pub literal_editor: Option<String>,
    pub description: Option<String>,
}

/// A triple by UIDs; exactly one of `o` and `ol` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripleRecord {
    pub s: String,
    pub p: String,
    pub o: Option<String>,
    /// `"value"^^type`, `"value"@lang`, or a bare value.
    pub ol: Option<String>,
    pub sid: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphImport {
    pub nodes: Vec<NodeRecord>,
    pub properties: Vec<PropertyRecord>,
    pub triples: Vec<TripleRecord>,
}

/// Rows written by an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounts {
    pub nodes: usize,
    pub properties: usize,
    pub triples: usize,
}

/// Import nodes, then properties, then triples. Triple endpoints without a
/// node get an implicit one.
pub fn import_graph(txn: &mut GraphTxn<'_>, data: &GraphImport) -> ImportResult<ImportCounts> {
    let mut counts = ImportCounts::default();

    for record in &data.nodes {
        let mut node = Node::new(record.uid.clone()).with_source_type(record.source_type);
        if let Some(label) = &record.label {
            node.label = label.clone();
        }
        node.is_class = record.is_class;
        node.tag = record.tag.clone();
        node.sid = record.sid.clone();
        if txn.upsert_node(&mut node, false)? {
            counts.nodes += 1;
        }
    }

    for record in &data.properties {
        let mut property = Property {
            id: 0,
            uid: record.uid.clone(),
            data_type: record.data_type.clone(),
            literal_editor: record.literal_editor.clone(),
            description: record.description.clone(),
        };
        if txn.upsert_property(&mut property)? {
            counts.properties += 1;
        }
    }

    let predicate_tag = txn.store().vocabulary().predicate_tag.clone();
    for record in &data.triples {
        let subject = txn.ensure_node(&record.s, None)?;
        let predicate = txn.ensure_node(&record.p, Some(&predicate_tag))?;
        let mut triple = match (&record.o, &record.ol) {
            (Some(o), None) => Triple::with_object(subject, predicate, txn.ensure_node(o, None)?),
            (None, Some(ol)) => {
                let literal = parse_literal(ol);
                Triple::with_literal(subject, predicate, literal.value, literal.literal_type, literal.language)
            }
            _ => {
                return Err(GraphError::InvalidTriple {
                    message: format!("{} {}: exactly one of `o` and `ol` must be set", record.s, record.p),
                }
                .into());
            }
        };
        triple.sid = record.sid.clone();
        triple.tag = record.tag.clone();
        if txn.upsert_triple(&mut triple)? {
            counts.triples += 1;
        }
    }

    tracing::info!(
        nodes = counts.nodes,
        properties = counts.properties,
        triples = counts.triples,
        "imported graph data"
    );
    Ok(counts)
}
