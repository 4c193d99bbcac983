//! Rich diagnostic error types for kg-curator.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so callers know exactly
//! what went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for kg-curator.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum CuratorError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Import(#[from] crate::import::ImportError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] crate::config::ConfigError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(curator::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(curator::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             The enclosing transaction was rolled back; no partial graph state was written. \
             If the problem persists, try running against a fresh data directory."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(curator::store::serde),
        help(
            "Failed to serialize or deserialize a stored record. \
             This usually means the stored data format has changed between versions."
        )
    )]
    Serialization { message: String },
}

impl From<redb::DatabaseError> for StoreError {
    fn from(e: redb::DatabaseError) -> Self {
        Self::Redb {
            message: format!("database error: {e}"),
        }
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Redb {
            message: format!("transaction failed: {e}"),
        }
    }
}

impl From<redb::TableError> for StoreError {
    fn from(e: redb::TableError) -> Self {
        Self::Redb {
            message: format!("open_table failed: {e}"),
        }
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(e: redb::StorageError) -> Self {
        Self::Redb {
            message: format!("storage error: {e}"),
        }
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(e: redb::CommitError) -> Self {
        Self::Redb {
            message: format!("commit failed: {e}"),
        }
    }
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("missing required argument: {name}")]
    #[diagnostic(
        code(curator::graph::missing_argument),
        help("The call was rejected before touching the store. Provide a non-empty `{name}`.")
    )]
    MissingArgument { name: String },

    #[error("invalid triple: {message}")]
    #[diagnostic(
        code(curator::graph::invalid_triple),
        help(
            "A triple needs a subject and a predicate, and exactly one of \
             an object node or an object literal."
        )
    )]
    InvalidTriple { message: String },

    #[error("node not found: {id}")]
    #[diagnostic(
        code(curator::graph::node_not_found),
        help("The node id is not interned. Upsert the node (or intern its URI) first.")
    )]
    NodeNotFound { id: u64 },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

/// Result type for graph-level operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

impl From<redb::TableError> for GraphError {
    fn from(e: redb::TableError) -> Self {
        Self::Store(e.into())
    }
}

impl From<redb::StorageError> for GraphError {
    fn from(e: redb::StorageError) -> Self {
        Self::Store(e.into())
    }
}

impl From<redb::TransactionError> for GraphError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Store(e.into())
    }
}

impl From<redb::CommitError> for GraphError {
    fn from(e: redb::CommitError) -> Self {
        Self::Store(e.into())
    }
}

// ---------------------------------------------------------------------------
// Mapping errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum MappingError {
    #[error("invalid {field} pattern in mapping '{mapping}': {message}")]
    #[diagnostic(
        code(curator::mapping::invalid_pattern),
        help("Filters and scalar patterns are regular expressions (Rust `regex` syntax).")
    )]
    InvalidPattern {
        mapping: String,
        field: String,
        message: String,
    },

    #[error("unknown variable '{name}' in mapping '{mapping}'")]
    #[diagnostic(
        code(curator::mapping::unknown_variable),
        help(
            "Placeholders look like {{title}} or {{group-id:2}}, macros like $parent or \
             $ancestor:2. Check the variable name, or supply it via metadata."
        )
    )]
    UnknownVariable { mapping: String, name: String },

    #[error("unresolved macro '{name}' in mapping '{mapping}'")]
    #[diagnostic(
        code(curator::mapping::unresolved_macro),
        help(
            "The macro refers to a node that was not produced in this session, e.g. \
             $ancestor:3 on a mapping nested only two levels deep, or $facet with no \
             facet mapping applied."
        )
    )]
    UnresolvedMacro { mapping: String, name: String },

    #[error("invalid triple template in mapping '{mapping}': {message}")]
    #[diagnostic(
        code(curator::mapping::invalid_triple),
        help("A triple template needs a predicate; `reversed` cannot be combined with a literal object.")
    )]
    InvalidTriple { mapping: String, message: String },

    #[error("mapping depth exceeded maximum of {max_depth}")]
    #[diagnostic(
        code(curator::mapping::depth_exceeded),
        help(
            "The mapping tree is nested deeper than `max_mapping_depth`. \
             Raise the limit in the configuration or flatten the tree."
        )
    )]
    DepthExceeded { max_depth: usize },

    #[error("mapping not found: {id}")]
    #[diagnostic(
        code(curator::mapping::not_found),
        help("The mapping id is referenced as a child but is not stored.")
    )]
    NotFound { id: u64 },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),
}

/// Result type for mapping operations.
pub type MappingResult<T> = std::result::Result<T, MappingError>;

/// Convenience alias for functions returning kg-curator results.
pub type CuratorResult<T> = std::result::Result<T, CuratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_converts_to_curator_error() {
        let err = StoreError::Redb {
            message: "boom".into(),
        };
        let top: CuratorError = err.into();
        assert!(matches!(top, CuratorError::Store(StoreError::Redb { .. })));
    }

    #[test]
    fn mapping_error_wraps_graph_error() {
        let graph = GraphError::MissingArgument { name: "uri".into() };
        let mapping: MappingError = graph.into();
        assert!(matches!(
            mapping,
            MappingError::Graph(GraphError::MissingArgument { .. })
        ));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = MappingError::UnknownVariable {
            mapping: "event place".into(),
            name: "pin-eidd".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("pin-eidd"));
        assert!(msg.contains("event place"));
    }
}
