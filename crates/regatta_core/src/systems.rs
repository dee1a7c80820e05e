//! # System Scheduler
//!
//! An ordered list of per-frame callbacks.
//!
//! ```text
//! Systems::update(entities, ctx)
//!   S1(entities, ctx) ─> S2(entities, ctx) ─> S3(entities, ctx)
//! ```
//!
//! Registration order is execution order. There are no priorities and no
//! deduplication. All systems share the same `ctx`, but `entities` is live:
//! a write by S1 is visible to S2 in the same tick.

use crate::context::FrameContext;
use crate::ecs::Entities;

/// A per-frame update callback.
pub trait System<D, E> {
    /// Runs one tick.
    fn update(&mut self, entities: &Entities<D>, ctx: &FrameContext<E>);

    /// Name used in tracing spans.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<D, E, F> System<D, E> for F
where
    F: FnMut(&Entities<D>, &FrameContext<E>),
{
    fn update(&mut self, entities: &Entities<D>, ctx: &FrameContext<E>) {
        self(entities, ctx);
    }
}

/// Wraps a system with a fixed display name.
pub struct Named<S> {
    name: String,
    system: S,
}

impl<S> Named<S> {
    /// Names `system`.
    pub fn new(name: impl Into<String>, system: S) -> Self {
        Self {
            name: name.into(),
            system,
        }
    }
}

impl<D, E, S: System<D, E>> System<D, E> for Named<S> {
    fn update(&mut self, entities: &Entities<D>, ctx: &FrameContext<E>) {
        self.system.update(entities, ctx);
    }

    fn name(&self) -> &str {
        &self.name
    }
}

type BoxedSystem<D, E> = Box<dyn System<D, E> + Send>;

/// The ordered system list.
pub struct Systems<D, E> {
    systems: Vec<BoxedSystem<D, E>>,
}

impl<D, E> Systems<D, E> {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
        }
    }

    /// Appends a system. Adding the same system twice runs it twice.
    pub fn add(&mut self, system: impl System<D, E> + Send + 'static) -> &mut Self {
        self.systems.push(Box::new(system));
        self
    }

    /// Appends a system under an explicit name.
    pub fn add_named<S>(&mut self, name: impl Into<String>, system: S) -> &mut Self
    where
        S: System<D, E> + Send + 'static,
    {
        self.add(Named::new(name, system))
    }

    /// Runs every system once, in registration order.
    ///
    /// Returns the number of systems run.
    pub fn update(&mut self, entities: &Entities<D>, ctx: &FrameContext<E>) -> usize {
        for system in &mut self.systems {
            let span = tracing::trace_span!("system", name = system.name());
            let _entered = span.enter();
            system.update(entities, ctx);
        }
        self.systems.len()
    }

    /// Names of the registered systems, in order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.systems.iter().map(|s| s.name().to_string()).collect()
    }

    /// Number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Returns `true` if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

impl<D, E> Default for Systems<D, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D, E> std::fmt::Debug for Systems<D, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Systems")
            .field("systems", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{AddOptions, Entity};
    use crate::events::EventDispatcher;
    use parking_lot::Mutex;
    use std::sync::Arc;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn context() -> FrameContext<()> {
        FrameContext::empty(Arc::new(EventDispatcher::new()))
    }

    fn tracer(log: &Log, name: &'static str) -> impl FnMut(&Entities<u32>, &FrameContext<()>) {
        let log = Arc::clone(log);
        move |_: &Entities<u32>, _: &FrameContext<()>| log.lock().push(name)
    }

    #[test]
    fn test_systems_run_in_registration_order() {
        let log: Log = Arc::default();
        let mut systems: Systems<u32, ()> = Systems::new();
        systems
            .add(tracer(&log, "S1"))
            .add(tracer(&log, "S2"))
            .add(tracer(&log, "S3"));

        let entities = Entities::new();
        assert_eq!(systems.update(&entities, &context()), 3);
        assert_eq!(*log.lock(), vec!["S1", "S2", "S3"]);
    }

    #[test]
    fn test_later_systems_see_earlier_writes() {
        let entities = Entities::new();
        let boat = entities.add(Entity::new(0u32), AddOptions::new().label("boat")).unwrap();

        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let id = boat.id();

        let mut systems: Systems<u32, ()> = Systems::new();
        systems.add(move |entities: &Entities<u32>, _: &FrameContext<()>| {
            entities.set_data(id, 10u32);
        });
        systems.add(move |entities: &Entities<u32>, _: &FrameContext<()>| {
            *sink.lock() = entities.get_by_label("boat").map(|e| *e.data());
        });

        systems.update(&entities, &context());
        assert_eq!(*seen.lock(), Some(10));
    }

    #[test]
    fn test_duplicate_registration_runs_twice() {
        struct Counter(Arc<Mutex<u32>>);
        impl System<u32, ()> for Counter {
            fn update(&mut self, _: &Entities<u32>, _: &FrameContext<()>) {
                *self.0.lock() += 1;
            }
            fn name(&self) -> &str {
                "counter"
            }
        }

        let count = Arc::new(Mutex::new(0));
        let mut systems: Systems<u32, ()> = Systems::new();
        systems.add(Counter(Arc::clone(&count)));
        systems.add(Counter(Arc::clone(&count)));
        systems.add_named("physics", |_: &Entities<u32>, _: &FrameContext<()>| {});

        systems.update(&Entities::new(), &context());
        assert_eq!(*count.lock(), 2);
        assert_eq!(systems.names(), vec!["counter", "counter", "physics"]);
    }
}
