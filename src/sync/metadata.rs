//! Metadata suppliers: ambient key/value context for a mapping run.

use std::collections::BTreeMap;

use crate::error::MappingResult;
use crate::mapping::GraphSource;

/// Supplies variables visible to every mapping applied to a record, such as
/// an external short code for the item.
pub trait MetadataSupplier: Send + Sync {
    fn supply(&self, source: &GraphSource) -> MappingResult<BTreeMap<String, String>>;
}

impl<F> MetadataSupplier for F
where
    F: Fn(&GraphSource) -> MappingResult<BTreeMap<String, String>> + Send + Sync,
{
    fn supply(&self, source: &GraphSource) -> MappingResult<BTreeMap<String, String>> {
        self(source)
    }
}

/// The same values for every record.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    values: BTreeMap<String, String>,
}

impl StaticMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl MetadataSupplier for StaticMetadata {
    fn supply(&self, _source: &GraphSource) -> MappingResult<BTreeMap<String, String>> {
        Ok(self.values.clone())
    }
}

/// Run suppliers in order; later keys win.
pub fn collect_metadata(
    suppliers: &[Box<dyn MetadataSupplier>],
    source: &GraphSource,
) -> MappingResult<BTreeMap<String, String>> {
    let mut metadata = BTreeMap::new();
    for supplier in suppliers {
        metadata.extend(supplier.supply(source)?);
    }
    Ok(metadata)
}
