//! The node mapper: turns a source record into a graph fragment.
//!
//! Mappings are applied recursively from the roots. Each application
//! resolves its source value, builds its SID, produces its nodes and
//! triples, and then descends into its children with the mapping pushed on
//! an explicit path. `$parent` and `$ancestor:N` read the UIDs recorded on
//! that path; `$item`, `$facet` and `$group:N` read UIDs recorded for the
//! whole session.
//!
//! Pin mappings are applied once per matching pin. Under a pin application,
//! child pin mappings only see pins of the same part whose `@eid` scope chain
//! extends the parent pin's, i.e. pins describing the same entity.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{MappingError, MappingResult};
use crate::graph::{GraphSet, Node, NodeSourceType, Triple, UidTriple, same_key};
use crate::mapping::cache::{CompiledMapping, MappingProvider};
use crate::mapping::source::{DataPin, GraphSource, SourcePart};
use crate::mapping::template::{
    Lookup, TitleParts, VariableScope, expand, parse_literal, parse_title, resolve_value, slug,
};
use crate::mapping::{MappingSourceType, NodeMapping, TripleTemplate};
use crate::registry::UidBuilder;

/// Limits of a mapping run.
#[derive(Debug, Clone, Copy)]
pub struct MapperOptions {
    /// Deepest mapping path allowed.
    pub max_depth: usize,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self { max_depth: 32 }
    }
}

/// Applies the mappings of a provider to source records.
pub struct NodeMapper<'p> {
    provider: &'p dyn MappingProvider,
    options: MapperOptions,
    predicate_tag: Option<String>,
}

impl<'p> NodeMapper<'p> {
    pub fn new(provider: &'p dyn MappingProvider, options: MapperOptions) -> Self {
        Self {
            provider,
            options,
            predicate_tag: None,
        }
    }

    /// Tag given to implicit nodes used as a triple predicate.
    pub fn with_predicate_tag(mut self, tag: impl Into<String>) -> Self {
        self.predicate_tag = Some(tag.into());
        self
    }

    /// Map one record.
    ///
    /// `metadata` holds supplier values visible as variables; `uids` mints
    /// the UIDs of produced nodes. UIDs used by triples but produced by no
    /// mapping are added as implicit nodes.
    pub fn map(
        &self,
        source: &GraphSource,
        metadata: &BTreeMap<String, String>,
        uids: &mut dyn UidBuilder,
    ) -> MappingResult<GraphSet> {
        let mut session = Session {
            provider: self.provider,
            options: self.options,
            source,
            supplied: metadata,
            uids,
            title: parse_title(&source.item.title),
            set: GraphSet::new(),
            produced: Produced::default(),
            path: Vec::new(),
        };
        let roots = self.provider.roots()?;
        session.apply_all(&roots, Context::default())?;

        let mut set = session.set;
        let implicit = add_implicit_nodes(&mut set, self.predicate_tag.as_deref());
        tracing::debug!(
            item = %source.item.id,
            nodes = set.nodes.len(),
            triples = set.triples.len(),
            implicit,
            "mapped source record"
        );
        Ok(set)
    }
}

/// Where in the record an application happens.
#[derive(Debug, Clone, Copy, Default)]
struct Context<'a> {
    part: Option<&'a SourcePart>,
    pin: Option<&'a DataPin>,
    /// 1-based ordinal and value of the current group component.
    group: Option<(usize, &'a str)>,
}

/// UIDs recorded for the whole session.
#[derive(Debug, Default)]
struct Produced {
    item: Option<String>,
    facet: Option<String>,
    groups: Vec<Option<String>>,
}

#[derive(Debug)]
struct PathEntry {
    mapping_id: u64,
    uid: Option<String>,
    metadata: BTreeMap<String, String>,
}

struct Session<'a> {
    provider: &'a dyn MappingProvider,
    options: MapperOptions,
    source: &'a GraphSource,
    supplied: &'a BTreeMap<String, String>,
    uids: &'a mut dyn UidBuilder,
    title: TitleParts,
    set: GraphSet,
    produced: Produced,
    path: Vec<PathEntry>,
}

impl<'a> Session<'a> {
    fn scope<'s>(&'s self, ctx: Context<'s>, own: &'s BTreeMap<String, String>) -> Scope<'s> {
        Scope {
            source: self.source,
            ctx,
            title: &self.title,
            supplied: self.supplied,
            own,
            path: &self.path,
            produced: &self.produced,
        }
    }

    fn apply_all(&mut self, mappings: &[Arc<CompiledMapping>], ctx: Context<'a>) -> MappingResult<()> {
        for mapping in mappings {
            match mapping.mapping().source_type {
                MappingSourceType::Pin => {
                    for (part, pin) in self.candidate_pins(ctx) {
                        let pin_ctx = Context {
                            part: Some(part),
                            pin: Some(pin),
                            group: ctx.group,
                        };
                        self.apply(mapping, pin_ctx)?;
                    }
                }
                MappingSourceType::ItemGroup => {
                    let source: &'a GraphSource = self.source;
                    let components: Vec<&'a str> = source
                        .item
                        .group_id
                        .as_deref()
                        .map(|g| g.split('/').filter(|c| !c.is_empty()).collect())
                        .unwrap_or_default();
                    if components.len() > 1 {
                        for (i, component) in components.into_iter().enumerate() {
                            let group_ctx = Context {
                                group: Some((i + 1, component)),
                                ..ctx
                            };
                            self.apply(mapping, group_ctx)?;
                        }
                    } else {
                        self.apply(mapping, ctx)?;
                    }
                }
                MappingSourceType::Item | MappingSourceType::ItemFacet => {
                    self.apply(mapping, ctx)?;
                }
            }
        }
        Ok(())
    }

    /// Pins a pin mapping is tried against in `ctx`.
    fn candidate_pins(&self, ctx: Context<'a>) -> Vec<(&'a SourcePart, &'a DataPin)> {
        let source: &'a GraphSource = self.source;
        match (ctx.part, ctx.pin) {
            (Some(part), Some(parent)) => part
                .pins
                .iter()
                .filter(|p| !std::ptr::eq(*p, parent) && p.shares_scope_with(parent))
                .map(|p| (part, p))
                .collect(),
            (Some(part), None) => part.pins.iter().map(|p| (part, p)).collect(),
            (None, _) => source
                .parts
                .iter()
                .flat_map(|part| part.pins.iter().map(move |p| (part, p)))
                .collect(),
        }
    }

    fn apply(&mut self, compiled: &Arc<CompiledMapping>, ctx: Context<'a>) -> MappingResult<()> {
        let mapping = compiled.mapping();
        let name = mapping.name.as_str();
        if self.path.iter().any(|e| e.mapping_id == mapping.id) {
            tracing::warn!(mapping = name, id = mapping.id, "mapping already on path, skipped");
            return Ok(());
        }
        if self.path.len() >= self.options.max_depth {
            return Err(MappingError::DepthExceeded {
                max_depth: self.options.max_depth,
            });
        }
        if !compiled.matches(&self.source.item, ctx.part, ctx.pin) {
            return Ok(());
        }

        let none = BTreeMap::new();
        let value = {
            let scope = self.scope(ctx, &none);
            let template = mapping
                .source
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(mapping.source_type.default_source());
            expand(template, &scope, name)?
        };
        if value.trim().is_empty() || !compiled.accepts_value(&value) {
            tracing::trace!(mapping = name, "source value rejected");
            return Ok(());
        }

        let mut own = BTreeMap::new();
        {
            let scope = self.scope(ctx, &none);
            for (key, template) in &mapping.output.metadata {
                own.insert(key.clone(), expand(template, &scope, name)?);
            }
        }
        let sid = {
            let scope = self.scope(ctx, &own);
            build_sid(self.source, mapping, ctx, &scope)?
        };

        // Nodes; the first one is the produced node.
        let mut named: Vec<(String, String)> = Vec::new();
        for template in &mapping.output.nodes {
            let (label, unsuffixed) = {
                let scope = self.scope(ctx, &own);
                let label = expand(&template.label, &scope, name)?;
                let label = if label.trim().is_empty() {
                    value.clone()
                } else {
                    label
                };
                let unsuffixed = match template.uid.as_deref().filter(|u| !u.trim().is_empty()) {
                    Some(uid) => resolve_value(uid, &scope, name)?,
                    None => {
                        let prefix = match template.prefix.as_deref() {
                            Some(prefix) => expand(prefix, &scope, name)?,
                            None => String::new(),
                        };
                        format!("{prefix}{}", slug(&label))
                    }
                };
                (label, unsuffixed)
            };
            if unsuffixed.trim().is_empty() {
                tracing::warn!(mapping = name, key = %template.key, "node template produced no uid");
                continue;
            }
            let uid = self.uids.build_uid(&unsuffixed, &sid)?;
            let mut node = Node::new(uid.clone())
                .with_label(label)
                .with_sid(sid.clone())
                .with_source_type(mapping.source_type.node_source_type());
            if let Some(tag) = template.tag.as_deref().filter(|t| !t.is_empty()) {
                node = node.with_tag(tag);
            }
            self.set.add_node(node);
            named.push((template.key.clone(), uid));
        }

        let parent = self.path.last().and_then(|e| e.uid.clone());
        let current = match named.first() {
            Some((_, uid)) => Some(uid.clone()),
            None => parent.clone(),
        };
        if !named.is_empty() {
            self.record_produced(mapping.source_type, ctx, current.clone());
        }

        for template in &mapping.output.triples {
            let triple = {
                let scope = self.scope(ctx, &own);
                let refs = NodeRefs {
                    named: &named,
                    current: current.as_deref(),
                    parent: parent.as_deref(),
                };
                build_triple(template, &scope, name, &refs, &sid)?
            };
            if let Some(triple) = triple {
                self.set.add_triple(triple);
            }
        }

        let children = self.provider.children(mapping.id)?;
        if !children.is_empty() {
            self.path.push(PathEntry {
                mapping_id: mapping.id,
                uid: current,
                metadata: own,
            });
            let result = self.apply_all(&children, ctx);
            self.path.pop();
            result?;
        }
        Ok(())
    }

    fn record_produced(&mut self, source_type: MappingSourceType, ctx: Context<'_>, uid: Option<String>) {
        match source_type {
            MappingSourceType::Item => {
                if self.produced.item.is_none() {
                    self.produced.item = uid;
                }
            }
            MappingSourceType::ItemFacet => {
                if self.produced.facet.is_none() {
                    self.produced.facet = uid;
                }
            }
            MappingSourceType::ItemGroup => {
                let ordinal = ctx.group.map_or(1, |(n, _)| n);
                if self.produced.groups.len() < ordinal {
                    self.produced.groups.resize(ordinal, None);
                }
                self.produced.groups[ordinal - 1] = uid;
            }
            MappingSourceType::Pin => {}
        }
    }
}

/// SID of an application: the record GUID plus a discriminator.
fn build_sid(
    source: &GraphSource,
    mapping: &NodeMapping,
    ctx: Context<'_>,
    scope: &dyn VariableScope,
) -> MappingResult<String> {
    let guid = ctx.part.map_or(source.item.id.as_str(), |p| p.id.as_str());
    if let Some(template) = mapping.sid.as_deref().filter(|t| !t.trim().is_empty()) {
        return Ok(format!("{guid}{}", expand(template, scope, &mapping.name)?));
    }
    Ok(match mapping.source_type {
        MappingSourceType::Item => guid.to_string(),
        MappingSourceType::ItemFacet => format!("{guid}/facet"),
        MappingSourceType::ItemGroup => format!("{guid}/group"),
        MappingSourceType::Pin => {
            let mut sid = guid.to_string();
            let (Some(part), Some(pin)) = (ctx.part, ctx.pin) else {
                return Ok(sid);
            };
            if let Some(role) = part.role_id.as_deref().filter(|r| !r.is_empty()) {
                sid.push(':');
                sid.push_str(role);
            }
            sid.push('/');
            sid.push_str(&pin.name);
            if part.pin_name_count(&pin.name) > 1 {
                sid.push('/');
                sid.push_str(&pin.value);
            }
            sid
        }
    })
}

/// Nodes a triple template can refer to without a UID.
struct NodeRefs<'r> {
    named: &'r [(String, String)],
    current: Option<&'r str>,
    parent: Option<&'r str>,
}

fn invalid_triple(mapping: &str, message: &str) -> MappingError {
    MappingError::InvalidTriple {
        mapping: mapping.into(),
        message: message.into(),
    }
}

fn resolve_ref(
    value: &str,
    scope: &dyn VariableScope,
    mapping: &str,
    refs: &NodeRefs<'_>,
) -> MappingResult<String> {
    if let Some(key) = value.trim().strip_prefix('?') {
        return refs
            .named
            .iter()
            .find(|(k, _)| same_key(k, key))
            .map(|(_, uid)| uid.clone())
            .ok_or_else(|| invalid_triple(mapping, &format!("no node template named '{key}'")));
    }
    resolve_value(value, scope, mapping)
}

/// Build one triple; `None` when a reference resolved to nothing.
fn build_triple(
    template: &TripleTemplate,
    scope: &dyn VariableScope,
    mapping: &str,
    refs: &NodeRefs<'_>,
    sid: &str,
) -> MappingResult<Option<UidTriple>> {
    let literal = template.ol.as_deref().filter(|l| !l.trim().is_empty());
    if template.reversed && literal.is_some() {
        return Err(invalid_triple(mapping, "a reversed triple cannot have a literal object"));
    }
    let predicate = resolve_value(&template.p, scope, mapping)?;
    if predicate.trim().is_empty() {
        return Err(invalid_triple(mapping, "predicate is empty"));
    }

    let subject = match template.s.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(s) => resolve_ref(s, scope, mapping, refs)?,
        None => refs
            .current
            .map(str::to_string)
            .ok_or_else(|| MappingError::UnresolvedMacro {
                mapping: mapping.into(),
                name: "$parent".into(),
            })?,
    };

    let tag = template.tag.clone().filter(|t| !t.is_empty());

    if let Some(ol) = literal {
        let parsed = parse_literal(&expand(ol, scope, mapping)?);
        if subject.trim().is_empty() || parsed.value.is_empty() {
            return Ok(None);
        }
        let triple = Triple {
            sid: Some(sid.to_string()),
            tag,
            ..Triple::with_literal(0, 0, parsed.value, parsed.literal_type, parsed.language)
        };
        return Ok(Some(UidTriple {
            triple,
            subject_uid: subject,
            predicate_uid: predicate,
            object_uid: None,
        }));
    }

    let object = match template.o.as_deref().filter(|o| !o.trim().is_empty()) {
        Some(o) => resolve_ref(o, scope, mapping, refs)?,
        None => refs
            .parent
            .map(str::to_string)
            .ok_or_else(|| MappingError::UnresolvedMacro {
                mapping: mapping.into(),
                name: "$parent".into(),
            })?,
    };
    if subject.trim().is_empty() || object.trim().is_empty() {
        return Ok(None);
    }
    let triple = Triple {
        sid: Some(sid.to_string()),
        tag,
        ..Default::default()
    };
    let (subject, object) = if template.reversed {
        (object, subject)
    } else {
        (subject, object)
    };
    Ok(Some(UidTriple {
        triple,
        subject_uid: subject,
        predicate_uid: predicate,
        object_uid: Some(object),
    }))
}

/// Add an implicit node for every triple UID no node in the set carries.
/// Predicates get `predicate_tag`. Returns how many were added.
fn add_implicit_nodes(set: &mut GraphSet, predicate_tag: Option<&str>) -> usize {
    let mut missing: Vec<(String, bool)> = Vec::new();
    for t in &set.triples {
        let uids = [
            (Some(&t.subject_uid), false),
            (Some(&t.predicate_uid), true),
            (t.object_uid.as_ref(), false),
        ];
        for (uid, is_predicate) in uids {
            let Some(uid) = uid else { continue };
            if set.find_node(uid).is_some() {
                continue;
            }
            match missing.iter_mut().find(|(m, _)| same_key(m, uid)) {
                Some(entry) => entry.1 |= is_predicate,
                None => missing.push((uid.clone(), is_predicate)),
            }
        }
    }
    let added = missing.len();
    for (uid, is_predicate) in missing {
        let mut node = Node::new(uid).with_source_type(NodeSourceType::Implicit);
        if is_predicate && let Some(tag) = predicate_tag {
            node = node.with_tag(tag);
        }
        set.add_node(node);
    }
    added
}

/// Variables of one application.
struct Scope<'s> {
    source: &'s GraphSource,
    ctx: Context<'s>,
    title: &'s TitleParts,
    supplied: &'s BTreeMap<String, String>,
    own: &'s BTreeMap<String, String>,
    path: &'s [PathEntry],
    produced: &'s Produced,
}

/// Parse a 1-based ordinal argument.
fn ordinal(arg: Option<&str>, default: usize) -> Option<usize> {
    match arg {
        None => Some(default),
        Some(a) => a.trim().parse::<usize>().ok().filter(|n| *n > 0),
    }
}

fn found_or_unresolved(value: Option<&str>) -> Lookup {
    value.map_or(Lookup::Unresolved, |v| Lookup::Found(v.to_string()))
}

impl Scope<'_> {
    fn metadata(&self, name: &str) -> Option<&str> {
        self.own
            .get(name)
            .or_else(|| self.path.iter().rev().find_map(|e| e.metadata.get(name)))
            .or_else(|| self.supplied.get(name))
            .map(String::as_str)
    }

    fn group_id(&self, arg: Option<&str>) -> Lookup {
        let Some(group) = self.source.item.group_id.as_deref() else {
            return Lookup::Found(String::new());
        };
        match arg {
            None => Lookup::Found(self.ctx.group.map_or(group, |(_, c)| c).to_string()),
            Some(_) => {
                let component = ordinal(arg, 1)
                    .and_then(|n| group.split('/').filter(|c| !c.is_empty()).nth(n - 1));
                found_or_unresolved(component)
            }
        }
    }
}

impl VariableScope for Scope<'_> {
    fn variable(&self, name: &str, arg: Option<&str>) -> Lookup {
        let item = &self.source.item;
        let part = self.ctx.part;
        let pin = self.ctx.pin;
        match name {
            "title" => Lookup::Found(self.title.title.clone()),
            "title-uid" => Lookup::Found(self.title.uid.clone().unwrap_or_default()),
            "title-prefix" => Lookup::Found(self.title.prefix.clone().unwrap_or_default()),
            "facet-id" => Lookup::Found(item.facet_id.clone()),
            "group-id" => self.group_id(arg),
            "dsc" => Lookup::Found(item.description.clone()),
            "item-id" => Lookup::Found(item.id.clone()),
            "part-id" => found_or_unresolved(part.map(|p| p.id.as_str())),
            "part-type" => found_or_unresolved(part.map(|p| p.type_id.as_str())),
            "part-role" => match part {
                Some(p) => Lookup::Found(p.role_id.clone().unwrap_or_default()),
                None => Lookup::Unresolved,
            },
            "pin-name" => found_or_unresolved(pin.map(DataPin::base_name)),
            "pin-value" | "pin-uid" => found_or_unresolved(pin.map(|p| p.value.as_str())),
            "pin-eid" => {
                let eid = pin.and_then(|p| {
                    let eids = p.eids();
                    ordinal(arg, 1).and_then(|n| eids.get(n - 1).copied())
                });
                found_or_unresolved(eid)
            }
            _ => self
                .metadata(name)
                .map_or(Lookup::Unknown, |v| Lookup::Found(v.to_string())),
        }
    }

    fn uid_variable(&self, name: &str, arg: Option<&str>) -> Lookup {
        match name {
            "parent" => found_or_unresolved(self.path.last().and_then(|e| e.uid.as_deref())),
            "ancestor" => {
                let uid = ordinal(arg, 1)
                    .filter(|n| *n <= self.path.len())
                    .and_then(|n| self.path[self.path.len() - n].uid.as_deref());
                found_or_unresolved(uid)
            }
            "item" => found_or_unresolved(self.produced.item.as_deref()),
            "facet" => found_or_unresolved(self.produced.facet.as_deref()),
            "group" => {
                let current = self.ctx.group.map_or(1, |(n, _)| n);
                let uid = ordinal(arg, current)
                    .and_then(|n| self.produced.groups.get(n - 1))
                    .and_then(|uid| uid.as_deref());
                found_or_unresolved(uid)
            }
            _ => Lookup::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphResult;
    use crate::mapping::cache::MappingArena;
    use crate::mapping::source::SourceItem;
    use crate::mapping::{MappingFilter, NodeTemplate};

    /// Strips the unique marker without any registry.
    struct PlainUids;

    impl UidBuilder for PlainUids {
        fn build_uid(&mut self, unsuffixed: &str, _sid: &str) -> GraphResult<String> {
            Ok(unsuffixed.trim_end_matches("##").to_string())
        }
    }

    fn pin_mapping(name: &str, pin: &str) -> NodeMapping {
        NodeMapping::named(name)
            .with_source_type(MappingSourceType::Pin)
            .with_filter(MappingFilter {
                pin_name: Some(pin.into()),
                ..Default::default()
            })
    }

    fn event_arena() -> MappingArena {
        let mut arena = MappingArena::new();
        let event = arena
            .insert(
                pin_mapping("event", "event-type")
                    .with_node(NodeTemplate::with_uid("event", "x:events/{pin-eid}", "{pin-value}"))
                    .with_triple(TripleTemplate::to_object("rdf:type", "crm:E7_activity")),
            )
            .unwrap();
        let mut place = pin_mapping("event place", "event-place")
            .with_node(NodeTemplate::prefixed("place", "x:places/", "{pin-value}"))
            .with_triple(TripleTemplate::to_object("rdf:type", "crm:E53_Place"))
            .with_triple(TripleTemplate::to_object("crm:P7_took_place_at", "").reversed());
        place.parent_id = Some(event);
        arena.insert(place).unwrap();
        arena
    }

    fn event_source() -> GraphSource {
        GraphSource::new(SourceItem {
            id: "item-1".into(),
            title: "Letter".into(),
            facet_id: "letter".into(),
            ..Default::default()
        })
        .with_part(
            SourcePart::new("part-1", "events")
                .with_pin("event-type@ev1", "sent")
                .with_pin("event-place@ev1", "Arezzo")
                .with_pin("event-place@ev2", "Firenze"),
        )
    }

    fn has_triple(set: &GraphSet, s: &str, p: &str, o: &str) -> bool {
        set.triples.iter().any(|t| {
            t.subject_uid == s && t.predicate_uid == p && t.object_uid.as_deref() == Some(o)
        })
    }

    #[test]
    fn pin_children_follow_the_parent_entity() {
        let arena = event_arena();
        let mapper = NodeMapper::new(&arena, MapperOptions::default());
        let set = mapper
            .map(&event_source(), &BTreeMap::new(), &mut PlainUids)
            .unwrap();

        let event = set.find_node("x:events/ev1").unwrap();
        assert_eq!(event.label, "sent");
        assert_eq!(event.sid.as_deref(), Some("part-1/event-type@ev1"));
        assert_eq!(event.source_type, NodeSourceType::Pin);

        assert!(set.find_node("x:places/arezzo").is_some());
        // The ev2 place belongs to another entity.
        assert!(set.find_node("x:places/firenze").is_none());

        assert!(has_triple(&set, "x:events/ev1", "rdf:type", "crm:E7_activity"));
        assert!(has_triple(&set, "x:places/arezzo", "rdf:type", "crm:E53_Place"));
        assert!(has_triple(&set, "x:events/ev1", "crm:P7_took_place_at", "x:places/arezzo"));
        assert_eq!(set.triples.len(), 3);

        let implicit = set.find_node("crm:E53_Place").unwrap();
        assert_eq!(implicit.source_type, NodeSourceType::Implicit);
        assert!(implicit.sid.is_none());
    }

    #[test]
    fn implicit_predicates_are_tagged() {
        let arena = event_arena();
        let set = NodeMapper::new(&arena, MapperOptions::default())
            .with_predicate_tag("property")
            .map(&event_source(), &BTreeMap::new(), &mut PlainUids)
            .unwrap();

        for uid in ["rdf:type", "crm:P7_took_place_at"] {
            let predicate = set.find_node(uid).unwrap();
            assert!(predicate.has_tag("property"), "{uid}");
        }
        assert!(set.find_node("crm:E53_Place").unwrap().tag.is_none());
    }

    #[test]
    fn item_facet_and_group_uids_are_visible() {
        let mut arena = MappingArena::new();
        let work = arena
            .insert(
                NodeMapping::named("work")
                    .with_node(NodeTemplate::prefixed("work", "x:works/", "{title}")),
            )
            .unwrap();
        let mut group = NodeMapping::named("groups")
            .with_source_type(MappingSourceType::ItemGroup)
            .with_node(NodeTemplate::prefixed("group", "x:groups/", "{group-id}"))
            .with_triple(TripleTemplate::to_object("x:in_group", "").reversed());
        group.parent_id = Some(work);
        arena.insert(group).unwrap();
        arena
            .insert(
                NodeMapping::named("facet")
                    .with_source_type(MappingSourceType::ItemFacet)
                    .with_node(NodeTemplate::prefixed("facet", "x:facets/", "{facet-id}"))
                    .with_triple(TripleTemplate::to_object("x:describes", "$item"))
                    .with_triple(TripleTemplate::to_object("x:first_group", "$group:1")),
            )
            .unwrap();

        let source = GraphSource::new(SourceItem {
            id: "item-1".into(),
            title: "Vita Nova [#x:works/vn]".into(),
            facet_id: "work".into(),
            group_id: Some("lit/poetry".into()),
            ..Default::default()
        });
        let mapper = NodeMapper::new(&arena, MapperOptions::default());
        let set = mapper.map(&source, &BTreeMap::new(), &mut PlainUids).unwrap();

        let work = set.find_node("x:works/vita_nova").unwrap();
        assert_eq!(work.sid.as_deref(), Some("item-1"));
        assert!(set.find_node("x:groups/lit").is_some());
        assert!(set.find_node("x:groups/poetry").is_some());
        assert!(has_triple(&set, "x:works/vita_nova", "x:in_group", "x:groups/poetry"));
        assert!(has_triple(&set, "x:facets/work", "x:describes", "x:works/vita_nova"));
        assert!(has_triple(&set, "x:facets/work", "x:first_group", "x:groups/lit"));
    }

    #[test]
    fn literal_objects_and_metadata() {
        let mut arena = MappingArena::new();
        let mut mapping = pin_mapping("date", "date")
            .with_node(NodeTemplate::with_uid("ts", "x:timespans/{code}##", "{pin-value}"))
            .with_triple(TripleTemplate::to_literal(
                "crm:P82_at_some_time_within",
                "\"{pin-value}\"^^xsd:float",
            ));
        mapping.output.metadata.insert("code".into(), "{short-code}-{pin-eid}".into());
        arena.insert(mapping).unwrap();

        let source = GraphSource::new(SourceItem {
            id: "i".into(),
            ..Default::default()
        })
        .with_part(SourcePart::new("p", "dates").with_pin("date@d1", "1250"));
        let metadata = BTreeMap::from([("short-code".to_string(), "vn".to_string())]);
        let set = NodeMapper::new(&arena, MapperOptions::default())
            .map(&source, &metadata, &mut PlainUids)
            .unwrap();

        assert!(set.find_node("x:timespans/vn-d1").is_some());
        let literal = &set.triples[0].triple;
        assert_eq!(literal.object_literal.as_deref(), Some("1250"));
        assert_eq!(literal.literal_number, Some(1250.0));
    }

    #[test]
    fn cycles_are_skipped_and_depth_is_bounded() {
        let mut arena = MappingArena::new();
        let root = arena
            .insert(NodeMapping::named("root").with_node(NodeTemplate::with_uid("r", "x:r", "r")))
            .unwrap();
        let mut child = NodeMapping::named("child").with_node(NodeTemplate::with_uid("c", "x:c", "c"));
        child.parent_id = Some(root);
        let child = arena.insert(child).unwrap();
        arena.link(child, root);

        let source = GraphSource::new(SourceItem {
            id: "i".into(),
            title: "t".into(),
            ..Default::default()
        });
        let set = NodeMapper::new(&arena, MapperOptions::default())
            .map(&source, &BTreeMap::new(), &mut PlainUids)
            .unwrap();
        assert_eq!(set.nodes.len(), 2);

        let shallow = MapperOptions { max_depth: 1 };
        let err = NodeMapper::new(&arena, shallow)
            .map(&source, &BTreeMap::new(), &mut PlainUids)
            .unwrap_err();
        assert!(matches!(err, MappingError::DepthExceeded { max_depth: 1 }));
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let mut arena = MappingArena::new();
        arena
            .insert(NodeMapping::named("bad").with_node(NodeTemplate::with_uid("b", "x:{nope}", "b")))
            .unwrap();
        let source = GraphSource::new(SourceItem {
            id: "i".into(),
            title: "t".into(),
            ..Default::default()
        });
        let err = NodeMapper::new(&arena, MapperOptions::default())
            .map(&source, &BTreeMap::new(), &mut PlainUids)
            .unwrap_err();
        assert!(matches!(err, MappingError::UnknownVariable { ref name, .. } if name == "nope"));
    }
}
