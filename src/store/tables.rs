//! redb table layout and record codecs.
//!
//! Records are bincode-encoded under `u64` ids. Secondary indexes are
//! multimap tables; string keys in indexes are normalized with
//! [`normalize_key`] so case-insensitive lookups and SID prefix scans are
//! plain range reads.
//!
//! The helpers here are generic over redb's readable table traits so the
//! same code serves read snapshots and write transactions.

use redb::{MultimapTableDefinition, ReadableMultimapTable, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::graph::normalize_key;
use crate::store::StoreResult;

/// Interned URIs: id → URI text as first interned.
pub(crate) const URIS: TableDefinition<u64, &str> = TableDefinition::new("uris");
/// Interned URIs: normalized URI → id.
pub(crate) const URI_IDS: TableDefinition<&str, u64> = TableDefinition::new("uri_ids");

/// UID builder entries: id → [`crate::graph::UidEntry`].
pub(crate) const UIDS: TableDefinition<u64, &[u8]> = TableDefinition::new("uids");
/// Normalized unsuffixed UID → entry ids.
pub(crate) const UIDS_BY_KEY: MultimapTableDefinition<&str, u64> =
    MultimapTableDefinition::new("uids_by_key");

/// Nodes: id → [`crate::graph::Node`].
pub(crate) const NODES: TableDefinition<u64, &[u8]> = TableDefinition::new("nodes");
/// Normalized SID → node ids.
pub(crate) const NODES_BY_SID: MultimapTableDefinition<&str, u64> =
    MultimapTableDefinition::new("nodes_by_sid");

/// Properties: id → [`crate::graph::Property`].
pub(crate) const PROPERTIES: TableDefinition<u64, &[u8]> = TableDefinition::new("properties");

/// Triples: id → [`crate::graph::Triple`].
pub(crate) const TRIPLES: TableDefinition<u64, &[u8]> = TableDefinition::new("triples");
pub(crate) const TRIPLES_BY_SUBJECT: MultimapTableDefinition<u64, u64> =
    MultimapTableDefinition::new("triples_by_subject");
pub(crate) const TRIPLES_BY_PREDICATE: MultimapTableDefinition<u64, u64> =
    MultimapTableDefinition::new("triples_by_predicate");
pub(crate) const TRIPLES_BY_OBJECT: MultimapTableDefinition<u64, u64> =
    MultimapTableDefinition::new("triples_by_object");
/// Normalized SID → triple ids.
pub(crate) const TRIPLES_BY_SID: MultimapTableDefinition<&str, u64> =
    MultimapTableDefinition::new("triples_by_sid");

/// Materialized closure: node id → (class id, level).
pub(crate) const NODE_CLASSES: MultimapTableDefinition<u64, (u64, u32)> =
    MultimapTableDefinition::new("node_classes");
/// Reverse closure: class id → member node ids.
pub(crate) const CLASS_MEMBERS: MultimapTableDefinition<u64, u64> =
    MultimapTableDefinition::new("class_members");

/// Mappings: id → [`crate::mapping::NodeMapping`].
pub(crate) const MAPPINGS: TableDefinition<u64, &[u8]> = TableDefinition::new("mappings");
/// Parent mapping id → child mapping ids.
pub(crate) const MAPPING_CHILDREN: MultimapTableDefinition<u64, u64> =
    MultimapTableDefinition::new("mapping_children");

/// Id counters, one per entity kind.
pub(crate) const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

pub(crate) const COUNTER_URI: &str = "uri";
pub(crate) const COUNTER_UID: &str = "uid";
pub(crate) const COUNTER_TRIPLE: &str = "triple";
pub(crate) const COUNTER_MAPPING: &str = "mapping";

pub(crate) fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    Ok(bincode::deserialize(bytes)?)
}

/// Read and decode one record by id.
pub(crate) fn get_record<T, R>(table: &T, id: u64) -> StoreResult<Option<R>>
where
    T: ReadableTable<u64, &'static [u8]>,
    R: DeserializeOwned,
{
    match table.get(id)? {
        Some(guard) => Ok(Some(decode(guard.value())?)),
        None => Ok(None),
    }
}

/// Read and decode every record of a table, in id order.
pub(crate) fn all_records<T, R>(table: &T) -> StoreResult<Vec<R>>
where
    T: ReadableTable<u64, &'static [u8]>,
    R: DeserializeOwned,
{
    let mut out = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        out.push(decode(value.value())?);
    }
    Ok(out)
}

/// Collect the values stored under one key of an id → ids multimap.
pub(crate) fn multimap_ids<T>(table: &T, key: u64) -> StoreResult<Vec<u64>>
where
    T: ReadableMultimapTable<u64, u64>,
{
    let mut out = Vec::new();
    for value in table.get(key)? {
        out.push(value?.value());
    }
    Ok(out)
}

/// Collect ids indexed under a normalized string key, either exactly or by
/// prefix.
pub(crate) fn ids_by_key<T>(table: &T, key: &str, prefix: bool) -> StoreResult<Vec<u64>>
where
    T: ReadableMultimapTable<&'static str, u64>,
{
    let key = normalize_key(key);
    let mut out = Vec::new();
    if !prefix {
        for value in table.get(key.as_str())? {
            out.push(value?.value());
        }
        return Ok(out);
    }
    for entry in table.range(key.as_str()..)? {
        let (k, values) = entry?;
        if !k.value().starts_with(key.as_str()) {
            break;
        }
        for value in values {
            out.push(value?.value());
        }
    }
    Ok(out)
}

/// Look up a URI's id by its normalized form.
pub(crate) fn uri_id<T>(table: &T, uri: &str) -> StoreResult<Option<u64>>
where
    T: ReadableTable<&'static str, u64>,
{
    let key = normalize_key(uri);
    Ok(table.get(key.as_str())?.map(|g| g.value()))
}

/// Look up a URI by id.
pub(crate) fn uri_text<T>(table: &T, id: u64) -> StoreResult<Option<String>>
where
    T: ReadableTable<u64, &'static str>,
{
    Ok(table.get(id)?.map(|g| g.value().to_string()))
}
