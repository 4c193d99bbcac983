// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # kg-curator
//!
//! Provenance-scoped knowledge graph curation. Source records are turned
//! into graph fragments by user-authored mapping rules, reconciled against
//! what was stored for the same record, and written transactionally while
//! a materialized "is-a" closure is kept in sync.
//!
//! ## Architecture
//!
//! - **Identifier registry** (`registry`): URI interning and UID suffixing
//! - **Graph store** (`store`): nodes, properties and triples in redb, with
//!   query filters and provenance-scoped graph sets
//! - **Class materializer** (`graph::classes`): minimal-level transitive closure
//! - **Mapping engine** (`mapping`): filterable, template-driven rules in a DAG
//! - **Sync** (`sync`): fragment differ and the record updater
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use kg_curator::mapping::{GraphSource, SourceItem};
//! use kg_curator::store::GraphStore;
//! use kg_curator::sync::GraphUpdater;
//!
//! let store = Arc::new(GraphStore::open("data".as_ref()).unwrap());
//! let updater = GraphUpdater::new(store);
//! let record = GraphSource::new(SourceItem {
//!     id: "item-1".into(),
//!     title: "Letter to Guido".into(),
//!     ..Default::default()
//! });
//! let report = updater.update(&record).unwrap();
//! println!("{report}");
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod import;
pub mod mapping;
pub mod registry;
pub mod store;
pub mod sync;
pub mod thesaurus;
