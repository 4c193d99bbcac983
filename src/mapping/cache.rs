//! Mapping providers and the compiled-mapping cache.
//!
//! The mapper never sees stored records directly: it asks a
//! [`MappingProvider`] for the roots and for the children of a mapping id,
//! and gets [`CompiledMapping`]s with their regexes built once.
//!
//! [`MappingArena`] holds a whole mapping DAG in memory. [`MappingCache`]
//! reads through to the store and keeps what it loaded, keyed by mapping
//! id, until explicitly invalidated.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use regex::Regex;

use crate::error::{MappingError, MappingResult};
use crate::graph::same_key;
use crate::mapping::source::{DataPin, SourceItem, SourcePart};
use crate::mapping::NodeMapping;
use crate::store::GraphStore;

/// A mapping with its patterns compiled.
#[derive(Debug)]
pub struct CompiledMapping {
    mapping: NodeMapping,
    group: Option<Regex>,
    title: Option<Regex>,
    scalar: Option<Regex>,
}

fn compile_pattern(
    mapping: &NodeMapping,
    field: &str,
    pattern: Option<&str>,
) -> MappingResult<Option<Regex>> {
    let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    Regex::new(pattern)
        .map(Some)
        .map_err(|e| MappingError::InvalidPattern {
            mapping: mapping.name.clone(),
            field: field.into(),
            message: e.to_string(),
        })
}

impl CompiledMapping {
    pub fn compile(mapping: NodeMapping) -> MappingResult<Self> {
        let group = compile_pattern(&mapping, "group", mapping.filter.group.as_deref())?;
        let title = compile_pattern(&mapping, "title", mapping.filter.title.as_deref())?;
        let scalar = compile_pattern(&mapping, "scalar", mapping.scalar_pattern.as_deref())?;
        Ok(Self {
            mapping,
            group,
            title,
            scalar,
        })
    }

    pub fn mapping(&self) -> &NodeMapping {
        &self.mapping
    }

    pub fn id(&self) -> u64 {
        self.mapping.id
    }

    pub fn name(&self) -> &str {
        &self.mapping.name
    }

    /// Whether every declared filter accepts the context.
    pub fn matches(&self, item: &SourceItem, part: Option<&SourcePart>, pin: Option<&DataPin>) -> bool {
        let filter = &self.mapping.filter;
        if let Some(ref facet) = filter.facet
            && !same_key(facet, &item.facet_id)
        {
            return false;
        }
        if let Some(ref re) = self.group
            && !item.group_id.as_deref().is_some_and(|g| re.is_match(g))
        {
            return false;
        }
        if filter.flags != 0 && item.flags & filter.flags != filter.flags {
            return false;
        }
        if let Some(ref re) = self.title
            && !re.is_match(&item.title)
        {
            return false;
        }
        if let Some(ref part_type) = filter.part_type
            && !part.is_some_and(|p| same_key(&p.type_id, part_type))
        {
            return false;
        }
        if let Some(ref role) = filter.part_role
            && !part
                .and_then(|p| p.role_id.as_deref())
                .is_some_and(|r| same_key(r, role))
        {
            return false;
        }
        if let Some(ref name) = filter.pin_name
            && !pin.is_some_and(|p| same_key(p.base_name(), name))
        {
            return false;
        }
        true
    }

    /// Whether the resolved source value passes the scalar pattern.
    pub fn accepts_value(&self, value: &str) -> bool {
        self.scalar.as_ref().is_none_or(|re| re.is_match(value))
    }
}

/// Source of mappings for the mapper.
pub trait MappingProvider {
    /// Mappings without a parent, ordered by ordinal then id.
    fn roots(&self) -> MappingResult<Vec<Arc<CompiledMapping>>>;
    /// Children of a mapping, ordered by ordinal then id.
    fn children(&self, parent_id: u64) -> MappingResult<Vec<Arc<CompiledMapping>>>;
}

fn ordered(mut mappings: Vec<Arc<CompiledMapping>>) -> Vec<Arc<CompiledMapping>> {
    mappings.sort_by_key(|m| (m.mapping.ordinal, m.mapping.id));
    mappings
}

/// An in-memory mapping DAG.
#[derive(Debug, Default)]
pub struct MappingArena {
    mappings: BTreeMap<u64, Arc<CompiledMapping>>,
    children: BTreeMap<u64, Vec<u64>>,
    last_id: u64,
}

impl MappingArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every stored mapping and link.
    pub fn from_store(store: &GraphStore) -> MappingResult<Self> {
        let mut arena = Self::new();
        let all = store.get_all_mappings()?;
        let ids: Vec<u64> = all.iter().map(|m| m.id).collect();
        for mapping in all {
            arena.insert(mapping)?;
        }
        for parent in ids {
            for child in store.get_mapping_children(parent)? {
                arena.link(parent, child.id);
            }
        }
        Ok(arena)
    }

    /// Add a mapping, assigning an id when it has none, and link it under
    /// its parent. Returns the id.
    pub fn insert(&mut self, mut mapping: NodeMapping) -> MappingResult<u64> {
        if mapping.id == 0 {
            mapping.id = self.last_id + 1;
        }
        self.last_id = self.last_id.max(mapping.id);
        let id = mapping.id;
        let parent = mapping.parent_id;
        self.mappings
            .insert(id, Arc::new(CompiledMapping::compile(mapping)?));
        if let Some(parent) = parent {
            self.link(parent, id);
        }
        Ok(id)
    }

    /// Add `child_id` under `parent_id`; shared children are linked once
    /// per parent.
    pub fn link(&mut self, parent_id: u64, child_id: u64) {
        let children = self.children.entry(parent_id).or_default();
        if !children.contains(&child_id) {
            children.push(child_id);
        }
    }

    pub fn get(&self, id: u64) -> Option<&NodeMapping> {
        self.mappings.get(&id).map(|m| m.mapping())
    }

    pub fn child_ids(&self, parent_id: u64) -> &[u64] {
        self.children.get(&parent_id).map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeMapping> {
        self.mappings.values().map(|m| m.mapping())
    }
}

impl MappingProvider for MappingArena {
    fn roots(&self) -> MappingResult<Vec<Arc<CompiledMapping>>> {
        Ok(ordered(
            self.mappings
                .values()
                .filter(|m| m.mapping.parent_id.is_none())
                .cloned()
                .collect(),
        ))
    }

    fn children(&self, parent_id: u64) -> MappingResult<Vec<Arc<CompiledMapping>>> {
        let mut out = Vec::new();
        for id in self.child_ids(parent_id) {
            let mapping = self
                .mappings
                .get(id)
                .ok_or(MappingError::NotFound { id: *id })?;
            out.push(Arc::clone(mapping));
        }
        Ok(ordered(out))
    }
}

/// Child-list key under which the root list is cached.
const ROOTS: u64 = 0;

/// Read-through cache of compiled mappings keyed by mapping id.
pub struct MappingCache {
    store: Arc<GraphStore>,
    compiled: DashMap<u64, Arc<CompiledMapping>>,
    children: DashMap<u64, Vec<u64>>,
}

impl MappingCache {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self {
            store,
            compiled: DashMap::new(),
            children: DashMap::new(),
        }
    }

    fn compiled(&self, mapping: NodeMapping) -> MappingResult<Arc<CompiledMapping>> {
        if let Some(hit) = self.compiled.get(&mapping.id).map(|r| Arc::clone(r.value())) {
            return Ok(hit);
        }
        let id = mapping.id;
        let compiled = Arc::new(CompiledMapping::compile(mapping)?);
        self.compiled.insert(id, Arc::clone(&compiled));
        Ok(compiled)
    }

    fn load(&self, id: u64) -> MappingResult<Arc<CompiledMapping>> {
        if let Some(hit) = self.compiled.get(&id).map(|r| Arc::clone(r.value())) {
            return Ok(hit);
        }
        let mapping = self
            .store
            .get_mapping(id)?
            .ok_or(MappingError::NotFound { id })?;
        self.compiled(mapping)
    }

    fn list(&self, key: u64) -> MappingResult<Vec<Arc<CompiledMapping>>> {
        if let Some(ids) = self.children.get(&key).map(|r| r.value().clone()) {
            return ids.into_iter().map(|id| self.load(id)).collect();
        }
        let mappings = if key == ROOTS {
            self.store.get_root_mappings()?
        } else {
            self.store.get_mapping_children(key)?
        };
        let ids: Vec<u64> = mappings.iter().map(|m| m.id).collect();
        let out = mappings
            .into_iter()
            .map(|m| self.compiled(m))
            .collect::<MappingResult<Vec<_>>>()?;
        self.children.insert(key, ids);
        Ok(out)
    }

    /// Drop a mapping and every cached list that mentions it.
    pub fn invalidate(&self, id: u64) {
        self.compiled.remove(&id);
        self.children.remove(&id);
        self.children.remove(&ROOTS);
        self.children.retain(|_, ids| !ids.contains(&id));
    }

    pub fn clear(&self) {
        self.compiled.clear();
        self.children.clear();
    }

    /// Number of compiled mappings held.
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

impl MappingProvider for MappingCache {
    fn roots(&self) -> MappingResult<Vec<Arc<CompiledMapping>>> {
        self.list(ROOTS)
    }

    fn children(&self, parent_id: u64) -> MappingResult<Vec<Arc<CompiledMapping>>> {
        self.list(parent_id)
    }
}

impl std::fmt::Debug for MappingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingCache")
            .field("compiled", &self.compiled.len())
            .field("lists", &self.children.len())
            .finish()
    }
}
