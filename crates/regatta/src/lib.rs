//! # REGATTA
//!
//! The game loop crate: drives the core kernel from a host's animation
//! frames.
//!
//! ```text
//!  FrameHost ──timestamps──> GameLoop ──FrameContext──> Systems
//!                               │                          │
//!                               │ update_frame             │ set_data / emit
//!                               v                          v
//!                             Frames ──FrameAdvanced──> FrameMemo (render side)
//! ```
//!
//! ## Modules
//!
//! - `game_loop`: Mount/tick/unmount state machine
//! - `host`: Animation frame sources (scripted and wall-clock)

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod game_loop;
pub mod host;

// Re-export the kernel
pub use regatta_core as core;

pub use game_loop::{GameLoop, LoopState, LoopStats};
pub use host::{FrameHost, ManualHost, WallClockHost};
