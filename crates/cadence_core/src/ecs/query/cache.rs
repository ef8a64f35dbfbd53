//! Cached query results with incremental maintenance.
//!
//! Every distinct query shape gets one slot. A slot pays a full scan once,
//! when it is first requested; from then on the world reports each spawn,
//! despawn and composition change and only the affected slots re-evaluate the
//! one entity involved.

use super::{Query, QueryFilter, QueryItem};
use crate::ecs::{ComponentId, ComponentRegistry, Entity, RuntimeError, Signature};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Index of a cached result slot. Equal ids mean the same cached results.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct QueryId(u32);

impl QueryId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A query resolved against the component registry.
#[derive(Debug, Clone)]
struct Resolved {
    required: Vec<ComponentId>,
    excluded: Vec<ComponentId>,
}

impl Resolved {
    fn new(query: &Query, registry: &ComponentRegistry) -> Result<Self, RuntimeError> {
        let mut required = Vec::new();
        let mut excluded = Vec::new();

        for item in query.items() {
            match item {
                QueryItem::Entity => {}
                QueryItem::Component(key) => {
                    required.push(registry.id_of_raw(key.type_id(), key.name())?);
                }
                QueryItem::Maybe(key) => {
                    registry.id_of_raw(key.type_id(), key.name())?;
                }
            }
        }
        for filter in query.filters() {
            match filter {
                QueryFilter::With(key) => {
                    required.push(registry.id_of_raw(key.type_id(), key.name())?);
                }
                QueryFilter::Without(key) => {
                    excluded.push(registry.id_of_raw(key.type_id(), key.name())?);
                }
            }
        }

        required.sort_unstable();
        required.dedup();
        excluded.sort_unstable();
        excluded.dedup();
        Ok(Self { required, excluded })
    }

    #[inline]
    fn accepts(&self, signature: &Signature) -> bool {
        signature.contains_all(&self.required) && !signature.contains_any(&self.excluded)
    }

    fn touched(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.required.iter().chain(self.excluded.iter()).copied()
    }
}

/// One cached result set.
#[derive(Debug)]
pub struct CachedQuery {
    query: Query,
    resolved: Resolved,
    matches: BTreeSet<Entity>,
}

impl CachedQuery {
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Matching entities in creation order.
    pub fn matches(&self) -> &BTreeSet<Entity> {
        &self.matches
    }

    fn reevaluate(&mut self, entity: Entity, signature: &Signature) {
        if self.resolved.accepts(signature) {
            self.matches.insert(entity);
        } else {
            self.matches.remove(&entity);
        }
    }
}

/// All cached query results of a world.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: Vec<CachedQuery>,
    lookup: HashMap<Query, QueryId>,
    by_component: HashMap<ComponentId, Vec<QueryId>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the slot for `query`, creating and populating it on first use.
    pub fn resolve<'a>(
        &mut self,
        query: &Query,
        registry: &ComponentRegistry,
        entities: impl Iterator<Item = (Entity, &'a Signature)>,
    ) -> Result<QueryId, RuntimeError> {
        if let Some(&id) = self.lookup.get(query) {
            return Ok(id);
        }

        let resolved = Resolved::new(query, registry)?;
        let matches = entities
            .filter(|(_, signature)| resolved.accepts(signature))
            .map(|(entity, _)| entity)
            .collect::<BTreeSet<_>>();

        let id = QueryId(self.entries.len() as u32);
        for component in resolved.touched() {
            self.by_component.entry(component).or_default().push(id);
        }
        tracing::debug!(%query, %id, matches = matches.len(), "cached new query shape");

        self.entries.push(CachedQuery {
            query: query.clone(),
            resolved,
            matches,
        });
        self.lookup.insert(query.clone(), id);
        Ok(id)
    }

    pub fn get(&self, id: QueryId) -> Option<&CachedQuery> {
        self.entries.get(id.index())
    }

    /// Slot already cached for this shape, if any.
    pub fn find(&self, query: &Query) -> Option<QueryId> {
        self.lookup.get(query).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn on_spawn(&mut self, entity: Entity, signature: &Signature) {
        for entry in &mut self.entries {
            if entry.resolved.accepts(signature) {
                entry.matches.insert(entity);
            }
        }
    }

    pub(crate) fn on_despawn(&mut self, entity: Entity) {
        for entry in &mut self.entries {
            entry.matches.remove(&entity);
        }
    }

    /// Re-evaluate `entity` in every slot that mentions `changed`.
    pub(crate) fn on_change(&mut self, entity: Entity, signature: &Signature, changed: ComponentId) {
        let Some(ids) = self.by_component.get(&changed) else {
            return;
        };
        for id in ids {
            self.entries[id.index()].reevaluate(entity, signature);
        }
    }
}
