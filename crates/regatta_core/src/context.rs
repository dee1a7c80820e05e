//! # Frame Context
//!
//! The bundle every system receives once per tick. It is built by the game
//! loop at the start of a tick and shared, unchanged, by all systems of that
//! tick.

use std::fmt;
use std::sync::Arc;

use crate::events::EventDispatcher;

/// Timing triple for one tick, in milliseconds of host time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameTime {
    /// `current - previous`, after any configured clamp.
    pub delta: f64,
    /// Host timestamp of this tick.
    pub current: f64,
    /// Host timestamp of the previous tick (or of mounting).
    pub previous: f64,
}

/// Phase of a touch point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TouchPhase {
    /// Finger went down.
    Start,
    /// Finger moved.
    Move,
    /// Finger lifted.
    End,
    /// Quick tap.
    Press,
}

/// A touch sample fed in by the host's gesture layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Touch {
    /// Pointer identifier, stable while the finger is down.
    pub id: u64,
    /// Phase of the sample.
    pub phase: TouchPhase,
    /// Screen-space x.
    pub x: f32,
    /// Screen-space y.
    pub y: f32,
}

/// Physical screen metrics.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScreenMetrics {
    /// Width in logical pixels.
    pub width: f32,
    /// Height in logical pixels.
    pub height: f32,
    /// Device pixel ratio.
    pub scale: f32,
}

/// Metrics of the view hosting the game.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayoutMetrics {
    /// Left edge in screen space.
    pub x: f32,
    /// Top edge in screen space.
    pub y: f32,
    /// Width in logical pixels.
    pub width: f32,
    /// Height in logical pixels.
    pub height: f32,
}

/// Emits game events from inside a system.
pub struct Dispatch<E> {
    dispatcher: Arc<EventDispatcher<E>>,
}

impl<E> Dispatch<E> {
    /// Wraps a dispatcher.
    #[must_use]
    pub fn new(dispatcher: Arc<EventDispatcher<E>>) -> Self {
        Self { dispatcher }
    }

    /// Emits `payload` on `topic`. Returns the number of listeners reached.
    pub fn emit(&self, topic: &str, payload: &E) -> usize {
        self.dispatcher.emit(topic, payload)
    }

    /// Returns the underlying dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<EventDispatcher<E>> {
        &self.dispatcher
    }
}

impl<E> Clone for Dispatch<E> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

impl<E> fmt::Debug for Dispatch<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dispatch").field(&self.dispatcher).finish()
    }
}

/// Everything a system sees for one tick.
#[derive(Debug)]
pub struct FrameContext<E> {
    /// Events emitted since the previous tick, in emission order.
    pub events: Vec<E>,
    /// Handle for emitting new events.
    pub dispatch: Dispatch<E>,
    /// Timing of this tick.
    pub time: FrameTime,
    /// Touches collected since the previous tick.
    pub touches: Vec<Touch>,
    /// Screen metrics.
    pub screen: ScreenMetrics,
    /// Layout metrics.
    pub layout: LayoutMetrics,
    /// Clock frame at the start of the tick.
    pub frame: u64,
}

impl<E> FrameContext<E> {
    /// Context with no events, no touches and zeroed metrics.
    #[must_use]
    pub fn empty(dispatcher: Arc<EventDispatcher<E>>) -> Self {
        Self {
            events: Vec::new(),
            dispatch: Dispatch::new(dispatcher),
            time: FrameTime::default(),
            touches: Vec::new(),
            screen: ScreenMetrics::default(),
            layout: LayoutMetrics::default(),
            frame: 0,
        }
    }

    /// Delta of this tick in seconds.
    #[inline]
    #[must_use]
    pub fn delta_secs(&self) -> f64 {
        self.time.delta / 1000.0
    }
}
