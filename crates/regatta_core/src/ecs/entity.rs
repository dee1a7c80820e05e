//! # Entity Cells
//!
//! An entity is a uniquely identified, mutable data cell:
//! - A process-unique id, fixed at construction
//! - A payload `D`, replaced wholesale on every update
//! - Label and group tags, written by the registry
//! - A comparison policy deciding whether a reassignment counts as a change

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{EngineError, EngineResult};

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique entity identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Allocates the next id. Ids are never reused within a process.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// How a data reassignment is compared against the current value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ComparisonPolicy {
    /// Unchanged only if the new value is the very same allocation.
    ReferenceEqual,
    /// Unchanged if the new value is structurally equal (`PartialEq`).
    #[default]
    DeepEqual,
}

/// A data change, delivered to observers before it is committed.
#[derive(Debug)]
pub struct DataChange<D> {
    /// The entity being changed.
    pub id: EntityId,
    /// Value before the change.
    pub previous: Arc<D>,
    /// Value after the change.
    pub next: Arc<D>,
}

impl<D> Clone for DataChange<D> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            previous: Arc::clone(&self.previous),
            next: Arc::clone(&self.next),
        }
    }
}

/// Registry-owned tags.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Tags {
    pub(crate) label: Option<String>,
    pub(crate) groups: Vec<String>,
}

/// A typed, mutable data cell.
pub struct Entity<D> {
    id: EntityId,
    policy: ComparisonPolicy,
    data: RwLock<Arc<D>>,
    tags: RwLock<Tags>,
    registered: AtomicBool,
}

impl<D> Entity<D> {
    /// Creates an entity with the default (deep) comparison policy.
    #[must_use]
    pub fn new(data: D) -> Self {
        Self::with_policy(data, ComparisonPolicy::default())
    }

    /// Creates an entity with an explicit comparison policy.
    #[must_use]
    pub fn with_policy(data: impl Into<Arc<D>>, policy: ComparisonPolicy) -> Self {
        Self {
            id: EntityId::next(),
            policy,
            data: RwLock::new(data.into()),
            tags: RwLock::new(Tags::default()),
            registered: AtomicBool::new(false),
        }
    }

    /// Returns the entity id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the comparison policy.
    #[inline]
    #[must_use]
    pub fn policy(&self) -> ComparisonPolicy {
        self.policy
    }

    /// Returns a snapshot of the current data.
    #[inline]
    #[must_use]
    pub fn data(&self) -> Arc<D> {
        Arc::clone(&self.data.read())
    }

    /// Reads the current data in place.
    pub fn read<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        f(&self.data.read())
    }

    /// Returns the label assigned by the registry, if any.
    #[must_use]
    pub fn label(&self) -> Option<String> {
        self.tags.read().label.clone()
    }

    /// Returns the groups assigned by the registry.
    #[must_use]
    pub fn groups(&self) -> Vec<String> {
        self.tags.read().groups.clone()
    }

    /// Returns `true` if the entity is tagged with `group`.
    #[must_use]
    pub fn in_group(&self, group: &str) -> bool {
        self.tags.read().groups.iter().any(|g| g == group)
    }

    /// Returns `true` while the entity is held by a registry.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    pub(crate) fn has_label(&self, label: &str) -> bool {
        self.tags.read().label.as_deref() == Some(label)
    }

    pub(crate) fn set_tags(&self, tags: Tags) {
        *self.tags.write() = tags;
        self.registered.store(true, Ordering::Release);
    }

    pub(crate) fn clear_tags(&self) {
        *self.tags.write() = Tags::default();
        self.registered.store(false, Ordering::Release);
    }

    /// Overwrites the data without comparing or notifying.
    pub(crate) fn commit(&self, next: Arc<D>) {
        *self.data.write() = next;
    }
}

impl<D: PartialEq> Entity<D> {
    /// Computes the change a reassignment would produce under this entity's
    /// policy, without committing it. `None` means "unchanged".
    #[must_use]
    pub fn diff(&self, next: impl Into<Arc<D>>) -> Option<DataChange<D>> {
        let next = next.into();
        let previous = self.data();

        let unchanged = match self.policy {
            ComparisonPolicy::ReferenceEqual => Arc::ptr_eq(&previous, &next),
            ComparisonPolicy::DeepEqual => Arc::ptr_eq(&previous, &next) || *previous == *next,
        };
        if unchanged {
            return None;
        }

        Some(DataChange {
            id: self.id,
            previous,
            next,
        })
    }

    /// Applies a reassignment to a standalone entity, without notifying
    /// anyone. Returns `Ok(None)` when the policy reports no change.
    ///
    /// # Errors
    ///
    /// [`EngineError::Registered`] if a registry holds the entity. Live
    /// entities change through [`crate::ecs::Entities::set_data`] so their
    /// observers are notified.
    pub fn replace(&self, next: impl Into<Arc<D>>) -> EngineResult<Option<DataChange<D>>> {
        if self.is_registered() {
            return Err(EngineError::Registered { id: self.id });
        }
        let Some(change) = self.diff(next) else {
            return Ok(None);
        };
        self.commit(Arc::clone(&change.next));
        Ok(Some(change))
    }
}

impl<D: fmt::Debug> fmt::Debug for Entity<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags = self.tags.read();
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("label", &tags.label)
            .field("groups", &tags.groups)
            .field("policy", &self.policy)
            .field("data", &*self.data.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_ids_are_unique() {
        let a = Entity::new(1u32);
        let b = Entity::new(1u32);
        assert_ne!(a.id(), b.id());
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_reference_policy_ignores_same_allocation() {
        let entity = Entity::<Vec<i32>>::with_policy(vec![1, 2], ComparisonPolicy::ReferenceEqual);
        assert!(entity.replace(entity.data()).unwrap().is_none());

        // Equal contents in a new allocation is a change under this policy.
        let change = entity.replace(vec![1i32, 2]).unwrap().unwrap();
        assert_eq!(*change.previous, vec![1, 2]);
        assert!(!Arc::ptr_eq(&change.previous, &entity.data()));
    }

    #[test]
    fn test_deep_policy_compares_structure() {
        let mut start = HashMap::new();
        start.insert("a", 1);
        start.insert("b", 2);
        let entity = Entity::new(start);

        let mut reordered = HashMap::new();
        reordered.insert("b", 2);
        reordered.insert("a", 1);
        assert!(entity.replace(reordered).unwrap().is_none());

        let mut changed = HashMap::new();
        changed.insert("a", 2);
        let change = entity.replace(changed).unwrap().unwrap();
        assert_eq!(change.previous.get("a"), Some(&1));
        assert_eq!(change.next.get("a"), Some(&2));
        assert_eq!(entity.read(|d| d.len()), 1);
    }

    #[test]
    fn test_standalone_entity_has_no_tags() {
        let entity = Entity::new(());
        assert!(entity.label().is_none());
        assert!(entity.groups().is_empty());
        assert!(!entity.in_group("boats"));
        assert!(!entity.is_registered());
    }
}
