//! # Frame-Synchronized Memoization
//!
//! Derives a render-side value from one field of one entity, recomputing it
//! only when the field actually changes, and only when the clock ticks.
//!
//! ```text
//! FrameAdvanced ─> select(entity.data) ─> compare(last, field)
//!                                           │ equal     -> keep cached value
//!                                           └ different -> factory(field)
//! ```
//!
//! ## Late Binding
//!
//! If the target entity does not exist yet, the memo holds the caller's
//! default and waits on the registry's "entity added" notification for an
//! entity matching the target's id or label. The first match binds the memo
//! and the waiting listener removes itself; later additions under the same
//! label are ignored.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::Frames;
use crate::ecs::{Entities, Entity, EntityId};
use crate::events::Subscription;

/// The entity a memo follows.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntityTarget {
    /// A specific entity.
    Id(EntityId),
    /// Whichever entity holds the label.
    Label(String),
}

impl EntityTarget {
    /// Targets a label.
    #[must_use]
    pub fn label(label: impl Into<String>) -> Self {
        Self::Label(label.into())
    }

    /// Returns `true` if `entity` is what this target names.
    #[must_use]
    pub fn matches<D>(&self, entity: &Entity<D>) -> bool {
        match self {
            Self::Id(id) => entity.id() == *id,
            Self::Label(label) => entity.has_label(label),
        }
    }

    /// Looks the target up in a registry.
    #[must_use]
    pub fn resolve<D>(&self, entities: &Entities<D>) -> Option<Arc<Entity<D>>> {
        match self {
            Self::Id(id) => entities.get(*id),
            Self::Label(label) => entities.get_by_label(label),
        }
    }
}

impl From<EntityId> for EntityTarget {
    fn from(id: EntityId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for EntityTarget {
    fn from(label: &str) -> Self {
        Self::Label(label.to_string())
    }
}

impl From<String> for EntityTarget {
    fn from(label: String) -> Self {
        Self::Label(label)
    }
}

impl fmt::Display for EntityTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Label(label) => write!(f, "label {label:?}"),
        }
    }
}

type Select<D, F> = Box<dyn Fn(&D) -> F + Send + Sync>;
type Factory<F, V> = Box<dyn Fn(&F) -> V + Send + Sync>;
type Compare<F> = Box<dyn Fn(&F, &F) -> bool + Send + Sync>;

struct Slot<V> {
    value: V,
    recomputes: u64,
    bound: bool,
}

struct Tracker<D, F, V> {
    entity: Option<Arc<Entity<D>>>,
    last_field: Option<F>,
    select: Select<D, F>,
    factory: Factory<F, V>,
    compare: Compare<F>,
    slot: Arc<Mutex<Slot<V>>>,
}

impl<D, F, V> Tracker<D, F, V> {
    fn bind(&mut self, entity: Arc<Entity<D>>) {
        self.entity = Some(entity);
        self.last_field = None;
        self.slot.lock().bound = true;
        self.refresh();
    }

    /// Re-reads the field and recomputes if it changed. Returns `true` if
    /// the value was recomputed.
    fn refresh(&mut self) -> bool {
        let Some(entity) = &self.entity else {
            return false;
        };
        let field = entity.read(|data| (self.select)(data));

        if let Some(last) = &self.last_field {
            if (self.compare)(last, &field) {
                return false;
            }
        }

        let value = (self.factory)(&field);
        self.last_field = Some(field);

        let mut slot = self.slot.lock();
        slot.value = value;
        slot.recomputes += 1;
        true
    }
}

/// Configuration of a [`FrameMemo`], finished with [`FrameMemoBuilder::build`].
pub struct FrameMemoBuilder<D, F, V> {
    target: EntityTarget,
    select: Select<D, F>,
    factory: Factory<F, V>,
    compare: Compare<F>,
    default: V,
}

impl<D, F, V> FrameMemoBuilder<D, F, V>
where
    D: Send + Sync + 'static,
    F: Send + 'static,
    V: Send + 'static,
{
    /// Replaces the default equality check. `compare(last, current)`
    /// returning `true` means "unchanged, keep the cached value".
    #[must_use]
    pub fn compare_with<C>(mut self, compare: C) -> Self
    where
        C: Fn(&F, &F) -> bool + Send + Sync + 'static,
    {
        self.compare = Box::new(compare);
        self
    }

    /// The entity this memo follows.
    #[must_use]
    pub fn target(&self) -> &EntityTarget {
        &self.target
    }

    /// Subscribes the memo to `frames` and binds it to its entity, now or as
    /// soon as it is registered in `entities`.
    pub fn build(self, entities: &Entities<D>, frames: &Frames) -> FrameMemo<V> {
        let slot = Arc::new(Mutex::new(Slot {
            value: self.default,
            recomputes: 0,
            bound: false,
        }));
        let tracker = Arc::new(Mutex::new(Tracker {
            entity: None,
            last_field: None,
            select: self.select,
            factory: self.factory,
            compare: self.compare,
            slot: Arc::clone(&slot),
        }));
        let waiting: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        if let Some(entity) = self.target.resolve(entities) {
            tracker.lock().bind(entity);
        } else {
            tracing::debug!("memo waiting for {}", self.target);
            let target = self.target.clone();
            let tracker = Arc::clone(&tracker);
            let waiting_slot = Arc::clone(&waiting);
            let listener = entities.subscribe_added(move |entity: &Arc<Entity<D>>| {
                if !target.matches(&**entity) {
                    return;
                }
                {
                    let mut tracker = tracker.lock();
                    if tracker.entity.is_some() {
                        return;
                    }
                    tracker.bind(Arc::clone(entity));
                }
                tracing::debug!("memo bound to {}", entity.id());
                drop(waiting_slot.lock().take());
            });
            *waiting.lock() = Some(listener);
        }

        let frame_tracker = Arc::clone(&tracker);
        let frame = frames.subscribe(move |_| {
            frame_tracker.lock().refresh();
        });

        FrameMemo {
            target: self.target,
            slot,
            waiting,
            _frame: frame,
        }
    }
}

fn deep_equal<F: PartialEq + 'static>() -> Compare<F> {
    Box::new(|last: &F, current: &F| last == current)
}

impl<D, F, V> FrameMemoBuilder<D, F, V>
where
    F: PartialEq + 'static,
{
    /// Starts a memo: `select` picks the field, `factory` derives the value,
    /// `default` is used until the entity exists. Fields are compared with
    /// `PartialEq` unless [`FrameMemoBuilder::compare_with`] overrides it.
    pub fn new<S, G>(target: impl Into<EntityTarget>, select: S, factory: G, default: V) -> Self
    where
        S: Fn(&D) -> F + Send + Sync + 'static,
        G: Fn(&F) -> V + Send + Sync + 'static,
    {
        Self {
            target: target.into(),
            select: Box::new(select),
            factory: Box::new(factory),
            compare: deep_equal(),
            default,
        }
    }
}

/// The field itself, refreshed on frame advances.
pub fn entity_value<D, F, S>(
    target: impl Into<EntityTarget>,
    select: S,
    default: F,
) -> FrameMemoBuilder<D, F, F>
where
    F: Clone + PartialEq + 'static,
    S: Fn(&D) -> F + Send + Sync + 'static,
{
    FrameMemoBuilder::new(target, select, F::clone, default)
}

/// The field passed through `process`, recomputed when `compare` reports a
/// change. `compare(last, current)` returns `true` for "unchanged".
pub fn entity_memoized_value<D, F, V, S, P, C>(
    target: impl Into<EntityTarget>,
    select: S,
    process: P,
    compare: C,
    default: V,
) -> FrameMemoBuilder<D, F, V>
where
    S: Fn(&D) -> F + Send + Sync + 'static,
    P: Fn(&F) -> V + Send + Sync + 'static,
    C: Fn(&F, &F) -> bool + Send + Sync + 'static,
{
    FrameMemoBuilder {
        target: target.into(),
        select: Box::new(select),
        factory: Box::new(process),
        compare: Box::new(compare),
        default,
    }
}

/// A value derived from an entity field, refreshed on frame advances.
///
/// Dropping the memo removes its frame and registry listeners.
pub struct FrameMemo<V> {
    target: EntityTarget,
    slot: Arc<Mutex<Slot<V>>>,
    waiting: Arc<Mutex<Option<Subscription>>>,
    _frame: Subscription,
}

impl<V> FrameMemo<V> {
    /// Reads the current value in place.
    pub fn with<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        f(&self.slot.lock().value)
    }

    /// Number of times the value has been derived.
    #[must_use]
    pub fn recompute_count(&self) -> u64 {
        self.slot.lock().recomputes
    }

    /// `true` once the memo has found its entity.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.slot.lock().bound
    }

    /// `true` while the memo still listens for its entity to be added.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.waiting.lock().is_some()
    }

    /// The entity this memo follows.
    #[must_use]
    pub fn target(&self) -> &EntityTarget {
        &self.target
    }
}

impl<V: Clone> FrameMemo<V> {
    /// Returns a copy of the current value.
    #[must_use]
    pub fn get(&self) -> V {
        self.slot.lock().value.clone()
    }
}

impl<V> Drop for FrameMemo<V> {
    fn drop(&mut self) {
        // The waiting listener holds its own guard; release it explicitly.
        drop(self.waiting.lock().take());
    }
}

impl<V: fmt::Debug> fmt::Debug for FrameMemo<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("FrameMemo")
            .field("target", &self.target)
            .field("value", &slot.value)
            .field("recomputes", &slot.recomputes)
            .field("bound", &slot.bound)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::AddOptions;

    #[derive(Clone, Debug, PartialEq)]
    struct Boat {
        x: i32,
        heading: f32,
    }

    fn boat(x: i32) -> Entity<Boat> {
        Entity::new(Boat { x, heading: 0.0 })
    }

    #[test]
    fn test_recompute_only_when_field_changes() {
        let entities = Entities::new();
        let frames = Frames::new();
        let e = entities.add(boat(0), AddOptions::new()).unwrap();

        let memo = FrameMemoBuilder::new(e.id(), |b: &Boat| b.x, |x: &i32| x * 10, -1)
            .build(&entities, &frames);
        assert_eq!(memo.get(), 0);
        let initial = memo.recompute_count();

        frames.update_frame(60.0, 16.0);
        assert_eq!(memo.recompute_count(), initial);

        // Other fields changing does not matter.
        entities.set_data(e.id(), Boat { x: 0, heading: 1.5 });
        frames.update_frame(60.0, 16.0);
        assert_eq!(memo.recompute_count(), initial);

        entities.set_data(e.id(), Boat { x: 1, heading: 1.5 });
        assert_eq!(memo.get(), 0, "only frame advances refresh the value");
        frames.update_frame(60.0, 16.0);
        assert_eq!(memo.recompute_count(), initial + 1);
        assert_eq!(memo.get(), 10);
    }

    #[test]
    fn test_late_bound_label_resolves_once() {
        let entities = Entities::new();
        let frames = Frames::new();

        let memo = entity_value("player", |b: &Boat| b.x, 99)
            .build(&entities, &frames);
        assert_eq!(memo.get(), 99);
        assert!(memo.is_waiting());
        assert!(!memo.is_bound());

        entities.add(boat(5), AddOptions::new().label("decoy")).unwrap();
        assert!(memo.is_waiting());

        entities.add(boat(7), AddOptions::new().label("player")).unwrap();
        frames.update_frame(60.0, 16.0);
        assert_eq!(memo.get(), 7);
        assert!(memo.is_bound());
        assert!(!memo.is_waiting());

        // A newer "player" does not re-trigger the added listener.
        entities.add(boat(42), AddOptions::new().label("player")).unwrap();
        frames.update_frame(60.0, 16.0);
        assert_eq!(memo.get(), 7);
    }

    #[test]
    fn test_custom_comparator_gates_recompute() {
        let entities = Entities::new();
        let frames = Frames::new();
        let e = entities
            .add(boat(0), AddOptions::new().label("buoy"))
            .unwrap();

        let memo = entity_memoized_value(
            "buoy",
            |b: &Boat| b.heading,
            |h: &f32| format!("{h:.1}"),
            |last: &f32, now: &f32| (last - now).abs() < 0.5,
            String::new(),
        )
        .build(&entities, &frames);
        assert_eq!(memo.get(), "0.0");

        entities.set_data(e.id(), Boat { x: 0, heading: 0.2 });
        frames.update_frame(60.0, 16.0);
        assert_eq!(memo.get(), "0.0");

        entities.set_data(e.id(), Boat { x: 0, heading: 0.9 });
        frames.update_frame(60.0, 16.0);
        assert_eq!(memo.get(), "0.9");
    }

    #[test]
    fn test_compare_with_override() {
        let entities = Entities::new();
        let frames = Frames::new();
        let e = entities.add(boat(3), AddOptions::new()).unwrap();

        // Never "equal": recomputes on every frame.
        let memo = entity_value(e.id(), |b: &Boat| b.x, 0)
            .compare_with(|_: &i32, _: &i32| false)
            .build(&entities, &frames);
        let before = memo.recompute_count();
        frames.update_frame(60.0, 16.0);
        frames.update_frame(60.0, 16.0);
        assert_eq!(memo.recompute_count(), before + 2);
    }

    #[test]
    fn test_drop_releases_listeners() {
        let entities: Entities<Boat> = Entities::new();
        let frames = Frames::new();

        let memo = entity_value("ghost", |b: &Boat| b.x, 0)
            .build(&entities, &frames);
        assert_eq!(frames.listener_count(), 1);
        drop(memo);
        assert_eq!(frames.listener_count(), 0);

        // The waiting listener is gone too: adding the label binds nothing.
        entities.add(boat(1), AddOptions::new().label("ghost")).unwrap();
    }
}
