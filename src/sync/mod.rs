//! Synchronization of source records into the graph.
//!
//! [`GraphUpdater::update`] maps a record, diffs each provenance scope it
//! owns against the stored fragment, and applies the result in one write
//! transaction; class closures of touched nodes are refreshed on commit.

pub mod diff;
pub mod metadata;
pub mod updater;

pub use diff::{AppliedDiff, GraphDiff, GraphSetDiffer};
pub use metadata::{MetadataSupplier, StaticMetadata};
pub use updater::{GraphUpdater, UpdateReport};
