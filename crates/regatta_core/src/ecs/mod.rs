//! # Entity Component System
//!
//! A small map-based ECS for tens to low hundreds of entities.
//!
//! ## Design Philosophy
//!
//! - One registry per session, owning every live entity
//! - Entity payloads are whole values, swapped on update, never patched
//! - Change observers are kept by the registry, keyed by entity id
//! - No archetypes, no query planning

mod entity;
mod registry;

pub use entity::{ComparisonPolicy, DataChange, Entity, EntityId};
pub use registry::{
    AddOptions, Entities, LabelPolicy, RemoveSelector, ENTITY_ADDED, ENTITY_REMOVED,
};
