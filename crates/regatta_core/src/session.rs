//! # Session
//!
//! The registry, event dispatcher and clock of one running game, bundled and
//! passed explicitly to whoever needs them.
//!
//! ```text
//! Session ─┬─ Arc<Entities<D>>        one registry per session
//!          ├─ Arc<EventDispatcher<E>> game events
//!          ├─ Arc<Frames>             frame clock
//!          └─ EngineConfig
//! ```
//!
//! Clones share everything, including the scope flag: once any clone calls
//! [`Session::close`], memo construction and [`Session::set_data`] fail with
//! [`EngineError::OutsideScope`] on all of them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::clock::Frames;
use crate::config::EngineConfig;
use crate::ecs::{Entities, EntityId};
use crate::error::{EngineError, EngineResult};
use crate::events::EventDispatcher;
use crate::memo::{FrameMemo, FrameMemoBuilder};

/// Shared state of one game.
pub struct Session<D, E> {
    entities: Arc<Entities<D>>,
    events: Arc<EventDispatcher<E>>,
    frames: Arc<Frames>,
    config: EngineConfig,
    active: Arc<AtomicBool>,
}

impl<D, E> Session<D, E> {
    /// Creates a session from a validated configuration.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        tracing::debug!(
            "session opened (fps {}, label policy {:?})",
            config.nominal_fps,
            config.label_policy
        );
        Ok(Self {
            entities: Arc::new(Entities::with_label_policy(config.label_policy)),
            events: Arc::new(EventDispatcher::new()),
            frames: Arc::new(Frames::with_noise_floor(config.noise_floor_ms)),
            config,
            active: Arc::new(AtomicBool::new(true)),
        })
    }

    /// The entity registry.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &Arc<Entities<D>> {
        &self.entities
    }

    /// The game event dispatcher.
    #[inline]
    #[must_use]
    pub fn events(&self) -> &Arc<EventDispatcher<E>> {
        &self.events
    }

    /// The frame clock.
    #[inline]
    #[must_use]
    pub fn frames(&self) -> &Arc<Frames> {
        &self.frames
    }

    /// The configuration the session was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ends the scope for this session and all its clones.
    pub fn close(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            tracing::debug!("session closed");
        }
    }

    /// `true` until [`Session::close`] is called.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Fails with [`EngineError::OutsideScope`] once the session is closed.
    ///
    /// # Errors
    ///
    /// See above.
    pub fn ensure_active(&self, operation: &'static str) -> EngineResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(EngineError::OutsideScope { operation })
        }
    }
}

impl<D, E> Session<D, E>
where
    D: Send + Sync + 'static,
{
    /// Builds a frame memo against this session's registry and clock.
    ///
    /// # Errors
    ///
    /// [`EngineError::OutsideScope`] if the session is closed.
    pub fn memo<F, V>(&self, builder: FrameMemoBuilder<D, F, V>) -> EngineResult<FrameMemo<V>>
    where
        F: Send + 'static,
        V: Send + 'static,
    {
        self.ensure_active("memo")?;
        Ok(builder.build(&self.entities, &self.frames))
    }
}

impl<D: PartialEq, E> Session<D, E> {
    /// [`Entities::set_data`] guarded by the session scope.
    ///
    /// # Errors
    ///
    /// [`EngineError::OutsideScope`] if the session is closed.
    pub fn set_data(&self, id: EntityId, next: impl Into<Arc<D>>) -> EngineResult<bool> {
        self.ensure_active("set_data")?;
        Ok(self.entities.set_data(id, next))
    }
}

impl<D, E> Clone for Session<D, E> {
    fn clone(&self) -> Self {
        Self {
            entities: Arc::clone(&self.entities),
            events: Arc::clone(&self.events),
            frames: Arc::clone(&self.frames),
            config: self.config.clone(),
            active: Arc::clone(&self.active),
        }
    }
}

impl<D, E> std::fmt::Debug for Session<D, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("entities", &self.entities)
            .field("frames", &self.frames)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{AddOptions, Entity, LabelPolicy};
    use crate::memo::entity_value;

    type TestSession = Session<i64, String>;

    #[test]
    fn test_session_wires_config() {
        let config = EngineConfig {
            noise_floor_ms: 4.0,
            label_policy: LabelPolicy::Reject,
            ..EngineConfig::default()
        };
        let session = TestSession::new(config).unwrap();
        assert_eq!(session.entities().label_policy(), LabelPolicy::Reject);
        assert!((session.frames().noise_floor_ms() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            nominal_fps: -1.0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            TestSession::new(config),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_closed_session_is_outside_scope() {
        let session = TestSession::new(EngineConfig::default()).unwrap();
        let e = session
            .entities()
            .add(Entity::new(1i64), AddOptions::new().label("score"))
            .unwrap();
        assert_eq!(session.set_data(e.id(), 2i64), Ok(true));

        let clone = session.clone();
        clone.close();
        assert!(!session.is_active());

        assert_eq!(
            session.set_data(e.id(), 3i64),
            Err(EngineError::OutsideScope {
                operation: "set_data"
            })
        );
        let memo = session.memo(entity_value("score", |v: &i64| *v, 0));
        assert!(matches!(
            memo,
            Err(EngineError::OutsideScope { operation: "memo" })
        ));
    }

    #[test]
    fn test_memo_through_session() {
        let session = TestSession::new(EngineConfig::default()).unwrap();
        let memo = session
            .memo(entity_value("score", |v: &i64| *v, -1))
            .unwrap();
        assert_eq!(memo.get(), -1);

        let e = session
            .entities()
            .add(Entity::new(10i64), AddOptions::new().label("score"))
            .unwrap();
        assert_eq!(memo.get(), 10);

        session.set_data(e.id(), 11i64).unwrap();
        session.frames().update_frame(60.0, 16.0);
        assert_eq!(memo.get(), 11);
    }
}
