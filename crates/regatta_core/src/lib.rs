//! # REGATTA Core
//!
//! A small entity-component-system kernel driven by a frame clock:
//! - Map-based entity registry with label and group indices
//! - Topic-based event dispatcher
//! - Frame clock and ordered system scheduler
//! - Frame-synchronized memoization for a retained-mode renderer
//!
//! ## Architecture Rules
//!
//! 1. **One registry per session** - state is passed explicitly via [`Session`]
//! 2. **Whole-value updates** - entity data is swapped, never patched
//! 3. **No lock held across callbacks** - listeners and systems may re-enter
//!
//! ## Example
//!
//! ```rust
//! use regatta_core::{entity_value, AddOptions, EngineConfig, Entity, Session};
//!
//! let session: Session<f32, ()> = Session::new(EngineConfig::default()).unwrap();
//! let hull = session
//!     .entities()
//!     .add(Entity::new(100.0_f32), AddOptions::new().label("hull"))
//!     .unwrap();
//!
//! let health = session.memo(entity_value("hull", |hp: &f32| *hp, 0.0)).unwrap();
//! session.set_data(hull.id(), 75.0_f32).unwrap();
//! session.frames().update_frame(60.0, 16.7);
//! assert!((health.get() - 75.0).abs() < f32::EPSILON);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod clock;
pub mod config;
pub mod context;
pub mod ecs;
pub mod error;
pub mod events;
pub mod memo;
pub mod session;
pub mod systems;

pub use clock::{FrameAdvanced, Frames, DEFAULT_NOISE_FLOOR_MS, FRAME_TOPIC};
pub use config::{EngineConfig, DEFAULT_NOMINAL_FPS, DEFAULT_TARGET_FRAME_MS};
pub use context::{
    Dispatch, FrameContext, FrameTime, LayoutMetrics, ScreenMetrics, Touch, TouchPhase,
};
pub use ecs::{
    AddOptions, ComparisonPolicy, DataChange, Entities, Entity, EntityId, LabelPolicy,
    RemoveSelector, ENTITY_ADDED, ENTITY_REMOVED,
};
pub use error::{EngineError, EngineResult};
pub use events::{EventDispatcher, Listener, ListenerId, Subscription};
pub use memo::{entity_memoized_value, entity_value, EntityTarget, FrameMemo, FrameMemoBuilder};
pub use session::Session;
pub use systems::{Named, System, Systems};
