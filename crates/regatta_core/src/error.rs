//! # Engine Error Types
//!
//! Everything that can go wrong inside the kernel.
//!
//! Lookups that miss (unknown id, label or group) are NOT errors. They
//! resolve to `None`, an empty `Vec`, `false` or `0`.

use thiserror::Error;

use crate::ecs::EntityId;

/// Errors raised by the kernel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A memo or mutation was requested through a session whose scope has
    /// already been closed. This is a programmer error.
    #[error("`{operation}` used outside an active session scope")]
    OutsideScope {
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// A label is already taken and the registry rejects duplicates.
    #[error("label `{label}` is already bound to {existing}")]
    DuplicateLabel {
        /// The contested label.
        label: String,
        /// The entity currently holding the label.
        existing: EntityId,
    },

    /// Direct mutation of an entity a registry holds. Registered entities
    /// change through the registry so observers are notified.
    #[error("{id} is registered; update it through its registry")]
    Registered {
        /// The registered entity.
        id: EntityId,
    },

    /// The game loop was ticked or unmounted while idle.
    #[error("game loop is not mounted")]
    LoopNotMounted,

    /// The game loop was mounted twice.
    #[error("game loop is already mounted")]
    AlreadyMounted,

    /// Invalid configuration file or value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    ConfigIo(String),
}

/// Result type for kernel operations.
pub type EngineResult<T> = Result<T, EngineError>;
