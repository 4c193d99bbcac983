//! Identifier registry: URI interning and UID minting.
//!
//! URIs are interned to stable `u64` ids, case-insensitively and
//! append-only. The id of a URI is also the id of the node it names.
//!
//! UIDs are built from an *unsuffixed* value and the SID requesting it. A
//! value ending in [`UNIQUE_MARKER`] asks for a UID unique to that SID: the
//! first request for a value gets it bare, later requests from other SIDs
//! get `value#<n>`. Requests without the marker share whatever UID the value
//! already has.
//!
//! Committed URIs are mirrored in a [`UriCache`] made of two `DashMap`s for
//! lock-free lookups. The cache is only fed after a successful commit, so
//! ids from aborted transactions never leak into it.

use dashmap::DashMap;

use crate::error::{GraphError, GraphResult};
use crate::graph::{UidEntry, normalize_key, same_key};
use crate::store::GraphTxn;
use crate::store::tables::{
    COUNTER_UID, COUNTER_URI, UIDS, UIDS_BY_KEY, URI_IDS, URIS, decode, encode, uri_id, uri_text,
};

/// Suffix asking [`GraphTxn::build_uid`] for a SID-unique UID.
pub const UNIQUE_MARKER: &str = "##";

/// Reject empty or whitespace-only arguments before touching the store.
pub(crate) fn require_non_empty(name: &str, value: &str) -> GraphResult<()> {
    if value.trim().is_empty() {
        return Err(GraphError::MissingArgument { name: name.into() });
    }
    Ok(())
}

/// Bidirectional cache of committed URIs.
pub struct UriCache {
    /// Forward map: id → URI text as first interned.
    id_to_uri: DashMap<u64, String>,
    /// Reverse map: normalized URI → id.
    uri_to_id: DashMap<String, u64>,
}

impl UriCache {
    pub fn new() -> Self {
        Self {
            id_to_uri: DashMap::new(),
            uri_to_id: DashMap::new(),
        }
    }

    pub fn insert(&self, id: u64, uri: &str) {
        self.uri_to_id.insert(normalize_key(uri), id);
        self.id_to_uri.entry(id).or_insert_with(|| uri.to_string());
    }

    pub fn uri(&self, id: u64) -> Option<String> {
        self.id_to_uri.get(&id).map(|r| r.value().clone())
    }

    /// Look up an id by URI (case-insensitive).
    pub fn id(&self, uri: &str) -> Option<u64> {
        self.uri_to_id.get(&normalize_key(uri)).map(|r| *r.value())
    }

    pub fn len(&self) -> usize {
        self.id_to_uri.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_uri.is_empty()
    }

    pub fn clear(&self) {
        self.id_to_uri.clear();
        self.uri_to_id.clear();
    }
}

impl Default for UriCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Mints UIDs for the mapper.
pub trait UidBuilder {
    /// Build a UID for `unsuffixed` requested by `sid`.
    fn build_uid(&mut self, unsuffixed: &str, sid: &str) -> GraphResult<String>;
}

impl UidBuilder for GraphTxn<'_> {
    fn build_uid(&mut self, unsuffixed: &str, sid: &str) -> GraphResult<String> {
        GraphTxn::build_uid(self, unsuffixed, sid)
    }
}

impl GraphTxn<'_> {
    /// Intern a URI, returning its id. Idempotent and case-insensitive.
    pub fn intern_uri(&mut self, uri: &str) -> GraphResult<u64> {
        require_non_empty("uri", uri)?;
        if let Some(id) = self.lookup_id(uri)? {
            return Ok(id);
        }

        let id = self.next_id(COUNTER_URI)?;
        let key = normalize_key(uri);
        {
            let mut uris = self.txn.open_table(URIS)?;
            uris.insert(id, uri)?;
            let mut ids = self.txn.open_table(URI_IDS)?;
            ids.insert(key.as_str(), id)?;
        }
        self.new_uris.push((id, uri.to_string()));
        tracing::trace!(id, uri, "interned uri");
        Ok(id)
    }

    /// Look up a URI by id, including URIs interned by this transaction.
    pub fn lookup_uri(&self, id: u64) -> GraphResult<Option<String>> {
        if let Some(uri) = self.store.uri_cache().uri(id) {
            return Ok(Some(uri));
        }
        let table = self.txn.open_table(URIS)?;
        Ok(uri_text(&table, id)?)
    }

    /// Look up a URI's id, including URIs interned by this transaction.
    pub fn lookup_id(&self, uri: &str) -> GraphResult<Option<u64>> {
        if let Some(id) = self.store.uri_cache().id(uri) {
            return Ok(Some(id));
        }
        let table = self.txn.open_table(URI_IDS)?;
        Ok(uri_id(&table, uri)?)
    }

    fn uid_entries(&self, key: &str) -> GraphResult<Vec<UidEntry>> {
        let index = self.txn.open_multimap_table(UIDS_BY_KEY)?;
        let table = self.txn.open_table(UIDS)?;
        let mut entries = Vec::new();
        for id in redb::ReadableMultimapTable::get(&index, key)? {
            let id = id?.value();
            if let Some(bytes) = redb::ReadableTable::get(&table, id)? {
                entries.push(decode::<UidEntry>(bytes.value())?);
            }
        }
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    fn insert_uid_entry(&mut self, unsuffixed: &str, sid: &str, has_suffix: bool) -> GraphResult<UidEntry> {
        let entry = UidEntry {
            id: self.next_id(COUNTER_UID)?,
            sid: sid.to_string(),
            unsuffixed: unsuffixed.to_string(),
            has_suffix,
        };
        let bytes = encode(&entry)?;
        let key = normalize_key(unsuffixed);
        let mut table = self.txn.open_table(UIDS)?;
        table.insert(entry.id, bytes.as_slice())?;
        let mut index = self.txn.open_multimap_table(UIDS_BY_KEY)?;
        index.insert(key.as_str(), entry.id)?;
        Ok(entry)
    }

    /// Build a UID for `unsuffixed` on behalf of `sid`.
    ///
    /// Without [`UNIQUE_MARKER`] the value is registered on first use and
    /// shared afterwards. With it, each SID gets its own UID: the first
    /// registrant keeps the bare value, others get `value#<entry id>`, and a
    /// SID asking again gets its earlier UID back.
    pub fn build_uid(&mut self, unsuffixed: &str, sid: &str) -> GraphResult<String> {
        require_non_empty("unsuffixed", unsuffixed)?;
        let (base, unique) = match unsuffixed.strip_suffix(UNIQUE_MARKER) {
            Some(base) => (base, true),
            None => (unsuffixed, false),
        };
        require_non_empty("unsuffixed", base)?;

        let entries = self.uid_entries(&normalize_key(base))?;
        let Some(first) = entries.first() else {
            return Ok(self.insert_uid_entry(base, sid, false)?.uid());
        };
        if !unique {
            return Ok(first.uid());
        }
        if let Some(own) = entries.iter().find(|e| same_key(&e.sid, sid)) {
            return Ok(own.uid());
        }
        let entry = self.insert_uid_entry(base, sid, true)?;
        tracing::debug!(uid = %entry.uid(), sid, "minted suffixed uid");
        Ok(entry.uid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::GraphStore;
    use std::collections::HashSet;

    #[test]
    fn uri_interning_ignores_case() {
        let store = GraphStore::in_memory().unwrap();
        let mut txn = store.begin().unwrap();
        let a = txn.intern_uri("crm:E53_Place").unwrap();
        let b = txn.intern_uri("CRM:e53_place").unwrap();
        assert_eq!(a, b);
        assert_eq!(txn.lookup_uri(a).unwrap().as_deref(), Some("crm:E53_Place"));
        txn.commit().unwrap();

        assert_eq!(store.lookup_id("crm:e53_PLACE").unwrap(), Some(a));
        assert_eq!(store.intern_uri("crm:E53_Place").unwrap(), a);
    }

    #[test]
    fn empty_uri_is_rejected() {
        let store = GraphStore::in_memory().unwrap();
        let mut txn = store.begin().unwrap();
        assert!(matches!(
            txn.intern_uri("  "),
            Err(GraphError::MissingArgument { .. })
        ));
    }

    #[test]
    fn cache_is_fed_only_on_commit() {
        let store = GraphStore::in_memory().unwrap();
        {
            let mut txn = store.begin().unwrap();
            txn.intern_uri("x:aborted").unwrap();
            txn.rollback().unwrap();
        }
        assert!(store.uri_cache().is_empty());

        let mut txn = store.begin().unwrap();
        let id = txn.intern_uri("x:kept").unwrap();
        txn.commit().unwrap();
        assert_eq!(store.uri_cache().id("X:KEPT"), Some(id));
    }

    #[test]
    fn unique_uids_are_suffixed_per_sid() {
        let store = GraphStore::in_memory().unwrap();
        let mut txn = store.begin().unwrap();
        assert_eq!(txn.build_uid("ts##", "sid-a").unwrap(), "ts");
        assert_eq!(txn.build_uid("ts##", "sid-b").unwrap(), "ts#2");
        // The same SID gets its UID back.
        assert_eq!(txn.build_uid("ts##", "sid-b").unwrap(), "ts#2");
        assert_eq!(txn.build_uid("TS##", "SID-A").unwrap(), "ts");
    }

    #[test]
    fn concurrent_interning_converges() {
        let store = std::sync::Arc::new(GraphStore::in_memory().unwrap());
        let results: Vec<(u64, String, String)> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let store = std::sync::Arc::clone(&store);
                    s.spawn(move || {
                        let uri = if i % 2 == 0 { "crm:E53_Place" } else { "CRM:e53_place" };
                        let id = store.intern_uri(uri).unwrap();
                        let sid = format!("part-{i}/event-date@ev1");
                        let unique = store.build_uid("x:timespans/ts##", &sid).unwrap();
                        let shared = store.build_uid("x:places/arezzo", &sid).unwrap();
                        (id, unique, shared)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let ids: HashSet<u64> = results.iter().map(|(id, _, _)| *id).collect();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.lookup_id("crm:e53_place").unwrap(), ids.iter().next().copied());

        let uniques: HashSet<&str> = results.iter().map(|(_, u, _)| u.as_str()).collect();
        assert_eq!(uniques.len(), 8);
        assert_eq!(uniques.iter().filter(|u| !u.contains('#')).count(), 1);
        assert!(results.iter().all(|(_, _, shared)| shared == "x:places/arezzo"));

        // Asking again from one SID returns its earlier UID.
        let (_, first, _) = &results[3];
        assert_eq!(&store.build_uid("x:timespans/ts##", "part-3/event-date@ev1").unwrap(), first);
    }

    #[test]
    fn shared_uids_reuse_first_entry() {
        let store = GraphStore::in_memory().unwrap();
        let mut txn = store.begin().unwrap();
        assert_eq!(txn.build_uid("x:places/arezzo", "s1").unwrap(), "x:places/arezzo");
        assert_eq!(txn.build_uid("x:places/arezzo", "s2").unwrap(), "x:places/arezzo");
        assert!(matches!(
            txn.build_uid("##", "s1"),
            Err(GraphError::MissingArgument { .. })
        ));
    }
}
