//! # Entity Registry
//!
//! Owns the authoritative id → entity map plus two secondary indices:
//!
//! ```text
//! entities: BTreeMap<EntityId, Arc<Entity>>     authoritative, ascending id
//! labels:   HashMap<label, EntityId>            at most one id per label
//! groups:   HashMap<group, Vec<Arc<Entity>>>    insertion order per group
//! ```
//!
//! The indices are caches over `entities`. Every mutation goes through
//! `Index::attach` or `Index::detach` under one write lock, so no index
//! entry ever points at an id that is gone.
//!
//! Lookups that miss return `None` or an empty `Vec`. Removing something
//! that is not there does nothing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::entity::{DataChange, Entity, EntityId, Tags};
use crate::error::{EngineError, EngineResult};
use crate::events::{EventDispatcher, ListenerId, Subscription};

/// Topic for entity-added notifications.
pub const ENTITY_ADDED: &str = "entity-added";

/// Topic for entity-removed notifications.
pub const ENTITY_REMOVED: &str = "entity-removed";

/// What happens when a label that is already bound is registered again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPolicy {
    /// The newest entity takes the label over.
    #[default]
    LastWriteWins,
    /// The registration fails with [`EngineError::DuplicateLabel`].
    Reject,
}

/// Tags applied when an entity is registered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Unique (by convention) name.
    pub label: Option<String>,
    /// Group tags.
    pub groups: Vec<String>,
}

impl AddOptions {
    /// No label, no groups.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Adds one group.
    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    /// Adds several groups.
    #[must_use]
    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }
}

/// Selects the entities to remove.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoveSelector {
    /// One entity by id.
    Id(EntityId),
    /// The entity currently holding this label.
    Label(String),
    /// Every entity in any of these groups.
    Groups(Vec<String>),
}

impl RemoveSelector {
    /// Selects by label.
    #[must_use]
    pub fn label(label: impl Into<String>) -> Self {
        Self::Label(label.into())
    }

    /// Selects the union of several groups.
    #[must_use]
    pub fn groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Groups(groups.into_iter().map(Into::into).collect())
    }
}

impl From<EntityId> for RemoveSelector {
    fn from(id: EntityId) -> Self {
        Self::Id(id)
    }
}

impl<D> From<&Entity<D>> for RemoveSelector {
    fn from(entity: &Entity<D>) -> Self {
        Self::Id(entity.id())
    }
}

impl<D> From<&Arc<Entity<D>>> for RemoveSelector {
    fn from(entity: &Arc<Entity<D>>) -> Self {
        Self::Id(entity.id())
    }
}

struct Index<D> {
    entities: BTreeMap<EntityId, Arc<Entity<D>>>,
    labels: HashMap<String, EntityId>,
    groups: HashMap<String, Vec<Arc<Entity<D>>>>,
}

impl<D> Index<D> {
    fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            labels: HashMap::new(),
            groups: HashMap::new(),
        }
    }

    /// Inserts `entity` into all three structures. Returns the id that
    /// previously held the label, if it was another entity.
    fn attach(&mut self, entity: &Arc<Entity<D>>, tags: &Tags) -> Option<EntityId> {
        let id = entity.id();
        self.entities.insert(id, Arc::clone(entity));

        let displaced = tags
            .label
            .as_ref()
            .and_then(|label| self.labels.insert(label.clone(), id))
            .filter(|previous| *previous != id);

        for group in &tags.groups {
            self.groups
                .entry(group.clone())
                .or_default()
                .push(Arc::clone(entity));
        }
        displaced
    }

    /// Removes `id` from all three structures.
    fn detach(&mut self, id: EntityId) -> Option<Arc<Entity<D>>> {
        let entity = self.entities.remove(&id)?;

        self.labels.retain(|_, holder| *holder != id);
        self.groups.retain(|_, members| {
            members.retain(|member| member.id() != id);
            !members.is_empty()
        });
        Some(entity)
    }

    fn resolve(&self, selector: &RemoveSelector) -> Vec<EntityId> {
        match selector {
            RemoveSelector::Id(id) => vec![*id],
            RemoveSelector::Label(label) => self.labels.get(label).copied().into_iter().collect(),
            RemoveSelector::Groups(groups) => {
                let mut ids: Vec<EntityId> = groups
                    .iter()
                    .filter_map(|group| self.groups.get(group))
                    .flat_map(|members| members.iter().map(|member| member.id()))
                    .collect();
                ids.sort_unstable();
                ids.dedup();
                ids
            }
        }
    }
}

/// The entity registry.
pub struct Entities<D> {
    index: RwLock<Index<D>>,
    label_policy: LabelPolicy,
    lifecycle: Arc<EventDispatcher<Arc<Entity<D>>>>,
    // Topic = entity id, subscribers = observers of every entity.
    observers: EventDispatcher<DataChange<D>>,
}

impl<D> Entities<D> {
    /// Creates an empty registry with last-write-wins labels.
    #[must_use]
    pub fn new() -> Self {
        Self::with_label_policy(LabelPolicy::default())
    }

    /// Creates an empty registry with the given label policy.
    #[must_use]
    pub fn with_label_policy(label_policy: LabelPolicy) -> Self {
        Self {
            index: RwLock::new(Index::new()),
            label_policy,
            lifecycle: Arc::new(EventDispatcher::new()),
            observers: EventDispatcher::new(),
        }
    }

    /// Returns the label policy.
    #[must_use]
    pub fn label_policy(&self) -> LabelPolicy {
        self.label_policy
    }

    /// Registers an entity.
    ///
    /// Index updates complete before "entity added" listeners run.
    ///
    /// # Errors
    ///
    /// [`EngineError::DuplicateLabel`] if the label is held by another
    /// entity and the registry uses [`LabelPolicy::Reject`].
    pub fn add(
        &self,
        entity: impl Into<Arc<Entity<D>>>,
        options: AddOptions,
    ) -> EngineResult<Arc<Entity<D>>> {
        let entity = entity.into();
        let id = entity.id();

        let mut groups = options.groups;
        let mut seen = HashSet::new();
        groups.retain(|group| seen.insert(group.clone()));
        let tags = Tags {
            label: options.label,
            groups,
        };

        let displaced = {
            let mut index = self.index.write();

            if let (LabelPolicy::Reject, Some(label)) = (self.label_policy, &tags.label) {
                if let Some(existing) = index.labels.get(label).copied().filter(|e| *e != id) {
                    return Err(EngineError::DuplicateLabel {
                        label: label.clone(),
                        existing,
                    });
                }
            }

            // Re-adding replaces the old tags instead of duplicating them.
            index.detach(id);
            let displaced = index.attach(&entity, &tags);
            displaced.and_then(|previous| index.entities.get(&previous).cloned())
        };

        if let Some(previous) = displaced {
            tracing::warn!(
                "label {:?} moved from {} to {}",
                tags.label,
                previous.id(),
                id
            );
            previous.set_tags(Tags {
                label: None,
                groups: previous.groups(),
            });
        }

        tracing::debug!(
            "added {} (label: {:?}, groups: {:?})",
            id,
            tags.label,
            tags.groups
        );
        entity.set_tags(tags);
        self.lifecycle.emit(ENTITY_ADDED, &entity);
        Ok(entity)
    }

    /// Removes every entity matched by `selector`.
    ///
    /// Returns the number of entities removed. Unknown ids, labels and
    /// groups are ignored.
    pub fn remove(&self, selector: impl Into<RemoveSelector>) -> usize {
        let selector = selector.into();

        let removed: Vec<Arc<Entity<D>>> = {
            let mut index = self.index.write();
            let ids = index.resolve(&selector);
            ids.into_iter().filter_map(|id| index.detach(id)).collect()
        };

        for entity in &removed {
            entity.clear_tags();
            self.observers.clear_topic(&observer_topic(entity.id()));
            tracing::debug!("removed {}", entity.id());
            self.lifecycle.emit(ENTITY_REMOVED, entity);
        }
        removed.len()
    }

    /// Looks up an entity by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<Arc<Entity<D>>> {
        self.index.read().entities.get(&id).cloned()
    }

    /// Looks up the entity currently holding `label`.
    #[must_use]
    pub fn get_by_label(&self, label: &str) -> Option<Arc<Entity<D>>> {
        let index = self.index.read();
        let id = index.labels.get(label)?;
        index.entities.get(id).cloned()
    }

    /// Returns the members of `group` in insertion order, or an empty `Vec`.
    #[must_use]
    pub fn get_by_group(&self, group: &str) -> Vec<Arc<Entity<D>>> {
        self.index
            .read()
            .groups
            .get(group)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.index.read().entities.contains_key(&id)
    }

    /// Number of registered entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.read().entities.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.read().entities.is_empty()
    }

    /// Snapshot of every entity, in ascending id order.
    #[must_use]
    pub fn values(&self) -> Vec<Arc<Entity<D>>> {
        self.index.read().entities.values().cloned().collect()
    }

    /// Snapshot of every registered id, ascending.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.index.read().entities.keys().copied().collect()
    }

    /// Names of every non-empty group, sorted.
    #[must_use]
    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.index.read().groups.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Registers a listener for entity additions.
    pub fn on_added<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Arc<Entity<D>>) + Send + Sync + 'static,
    {
        self.lifecycle.on(ENTITY_ADDED, listener)
    }

    /// Removes an addition listener.
    pub fn off_added(&self, id: ListenerId) -> bool {
        self.lifecycle.off(ENTITY_ADDED, id)
    }

    /// Registers a listener for entity removals.
    pub fn on_removed<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Arc<Entity<D>>) + Send + Sync + 'static,
    {
        self.lifecycle.on(ENTITY_REMOVED, listener)
    }

    /// Removes a removal listener.
    pub fn off_removed(&self, id: ListenerId) -> bool {
        self.lifecycle.off(ENTITY_REMOVED, id)
    }

    /// Registers a change observer for one entity. The observer is dropped
    /// when the entity is removed.
    ///
    /// Returns `None`, registering nothing, if `id` is not in the registry.
    pub fn observe<F>(&self, id: EntityId, observer: F) -> Option<ListenerId>
    where
        F: Fn(&DataChange<D>) + Send + Sync + 'static,
    {
        // Held until the observer is in place, so a concurrent `remove`
        // either sees it and clears it or runs before the check.
        let index = self.index.read();
        if !index.entities.contains_key(&id) {
            return None;
        }
        let listener = self.observers.on(observer_topic(id), observer);
        drop(index);
        Some(listener)
    }

    /// Removes a change observer.
    pub fn unobserve(&self, id: EntityId, observer: ListenerId) -> bool {
        self.observers.off(&observer_topic(id), observer)
    }

    /// Registers an observer for changes to any entity.
    pub fn observe_all<F>(&self, observer: F) -> ListenerId
    where
        F: Fn(&DataChange<D>) + Send + Sync + 'static,
    {
        self.observers.subscribe_all(observer)
    }

    /// Removes an observer registered with [`Entities::observe_all`].
    pub fn unobserve_all(&self, observer: ListenerId) -> bool {
        self.observers.unsubscribe_all(observer)
    }

    /// Number of observers watching `id` specifically.
    #[must_use]
    pub fn observer_count(&self, id: EntityId) -> usize {
        self.observers.listener_count(&observer_topic(id))
    }
}

impl<D: 'static> Entities<D> {
    /// Like [`Entities::on_added`], scoped to the returned guard.
    pub fn subscribe_added<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<Entity<D>>) + Send + Sync + 'static,
    {
        self.lifecycle.on_scoped(ENTITY_ADDED, listener)
    }

    /// Like [`Entities::on_removed`], scoped to the returned guard.
    pub fn subscribe_removed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<Entity<D>>) + Send + Sync + 'static,
    {
        self.lifecycle.on_scoped(ENTITY_REMOVED, listener)
    }
}

impl<D: PartialEq> Entities<D> {
    /// Replaces an entity's data.
    ///
    /// If the entity's comparison policy reports a change, observers receive
    /// `{previous, next}` first and the value is committed afterwards.
    /// Returns `false` when nothing changed or the id is unknown.
    pub fn set_data(&self, id: EntityId, next: impl Into<Arc<D>>) -> bool {
        let Some(entity) = self.get(id) else {
            return false;
        };
        let Some(change) = entity.diff(next) else {
            return false;
        };

        self.observers.emit(&observer_topic(id), &change);
        entity.commit(change.next);
        true
    }

    /// Derives new data from the current value and applies it like
    /// [`Entities::set_data`].
    pub fn modify(&self, id: EntityId, f: impl FnOnce(&D) -> D) -> bool {
        let Some(entity) = self.get(id) else {
            return false;
        };
        let next = entity.read(f);
        self.set_data(id, next)
    }
}

impl<D> Default for Entities<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for Entities<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let index = self.index.read();
        f.debug_struct("Entities")
            .field("entities", &index.entities.len())
            .field("labels", &index.labels.len())
            .field("groups", &index.groups.len())
            .field("label_policy", &self.label_policy)
            .finish()
    }
}

fn observer_topic(id: EntityId) -> String {
    id.raw().to_string()
}
