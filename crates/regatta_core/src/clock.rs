//! # Frame Clock
//!
//! Integer frame counter advanced from elapsed wall time and a nominal fps.
//!
//! ```text
//! update_frame(60.0, 50.0)
//!   frames_passed = 60 * 0.050 = 3.0
//!   current_frame += 3
//!   emit FrameAdvanced { delta_ms: 50.0, .. }
//! ```
//!
//! Deltas under the noise floor (1ms by default) are dropped entirely: no
//! increment and no event. There is no upper bound, so a backgrounded app
//! produces one large jump; clamp before calling if that matters.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::{EventDispatcher, ListenerId, Subscription};

/// Topic used for frame-advanced notifications.
pub const FRAME_TOPIC: &str = "frame";

/// Default noise floor in milliseconds.
pub const DEFAULT_NOISE_FLOOR_MS: f64 = 1.0;

/// Payload of a frame-advanced notification.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameAdvanced {
    /// Raw delta passed to `update_frame`, in milliseconds.
    pub delta_ms: f64,
    /// Whole frames added by this update (may be zero).
    pub frames_advanced: u64,
    /// Frame counter after the update.
    pub frame: u64,
}

/// The frame clock.
pub struct Frames {
    current: Mutex<u64>,
    noise_floor_ms: f64,
    dispatcher: Arc<EventDispatcher<FrameAdvanced>>,
}

impl Frames {
    /// Creates a clock at frame zero with the default noise floor.
    #[must_use]
    pub fn new() -> Self {
        Self::with_noise_floor(DEFAULT_NOISE_FLOOR_MS)
    }

    /// Creates a clock that ignores deltas below `noise_floor_ms`.
    #[must_use]
    pub fn with_noise_floor(noise_floor_ms: f64) -> Self {
        Self {
            current: Mutex::new(0),
            noise_floor_ms,
            dispatcher: Arc::new(EventDispatcher::new()),
        }
    }

    /// Returns the current frame.
    #[inline]
    #[must_use]
    pub fn current_frame(&self) -> u64 {
        *self.current.lock()
    }

    /// Returns the configured noise floor.
    #[inline]
    #[must_use]
    pub fn noise_floor_ms(&self) -> f64 {
        self.noise_floor_ms
    }

    /// Advances the clock by `floor(fps * delta_ms / 1000)` frames and
    /// notifies frame listeners.
    ///
    /// Returns the emitted notification, or `None` when the delta was under
    /// the noise floor (or not a finite number).
    pub fn update_frame(&self, fps: f64, delta_ms: f64) -> Option<FrameAdvanced> {
        if !delta_ms.is_finite() || delta_ms < self.noise_floor_ms {
            return None;
        }

        let frames_passed = fps * (delta_ms / 1000.0);
        // Negative or NaN fps never moves the counter backwards.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let frames_advanced = if frames_passed.is_finite() && frames_passed > 0.0 {
            frames_passed.floor() as u64
        } else {
            0
        };

        let frame = {
            let mut current = self.current.lock();
            *current = current.saturating_add(frames_advanced);
            *current
        };

        let advanced = FrameAdvanced {
            delta_ms,
            frames_advanced,
            frame,
        };
        self.dispatcher.emit(FRAME_TOPIC, &advanced);
        Some(advanced)
    }

    /// Registers a frame listener.
    pub fn on_frame<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&FrameAdvanced) + Send + Sync + 'static,
    {
        self.dispatcher.on(FRAME_TOPIC, listener)
    }

    /// Removes a frame listener.
    pub fn off_frame(&self, id: ListenerId) -> bool {
        self.dispatcher.off(FRAME_TOPIC, id)
    }

    /// Registers a frame listener that lives as long as the returned guard.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&FrameAdvanced) + Send + Sync + 'static,
    {
        self.dispatcher.on_scoped(FRAME_TOPIC, listener)
    }

    /// Number of registered frame listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.dispatcher.listener_count(FRAME_TOPIC)
    }
}

impl Default for Frames {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Frames {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frames")
            .field("current_frame", &self.current_frame())
            .field("noise_floor_ms", &self.noise_floor_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_advances_whole_frames() {
        let frames = Frames::new();
        let advanced = frames.update_frame(60.0, 50.0).unwrap();
        assert_eq!(advanced.frames_advanced, 3);
        assert_eq!(frames.current_frame(), 3);

        // 0.6 frames rounds down to nothing, but still notifies.
        let advanced = frames.update_frame(60.0, 10.0).unwrap();
        assert_eq!(advanced.frames_advanced, 0);
        assert_eq!(frames.current_frame(), 3);
    }

    #[test]
    fn test_sub_millisecond_delta_is_ignored() {
        let frames = Frames::new();
        let fired = Arc::new(Mutex::new(0u32));
        let sink = Arc::clone(&fired);
        frames.on_frame(move |_| *sink.lock() += 1);

        assert!(frames.update_frame(60.0, 0.5).is_none());
        assert_eq!(frames.current_frame(), 0);
        assert_eq!(*fired.lock(), 0);

        frames.update_frame(60.0, 1.0);
        assert_eq!(*fired.lock(), 1);
    }

    #[test]
    fn test_frame_counter_is_monotonic() {
        let frames = Frames::new();
        let mut previous = frames.current_frame();
        for delta in [1.0, 16.6, 33.4, 2.5, 1000.0, 7.0, 250.0] {
            frames.update_frame(60.0, delta);
            let now = frames.current_frame();
            assert!(now >= previous);
            previous = now;
        }
        assert_eq!(previous, 60 + 15 + 2);
    }

    #[test]
    fn test_large_delta_jumps_in_one_update() {
        let frames = Frames::new();
        frames.update_frame(60.0, 10_000.0);
        assert_eq!(frames.current_frame(), 600);
    }

    #[test]
    fn test_event_carries_raw_delta() {
        let frames = Frames::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let sub = frames.subscribe(move |event| *sink.lock() = Some(*event));

        frames.update_frame(30.0, 100.0);
        let event = (*seen.lock()).unwrap();
        assert!((event.delta_ms - 100.0).abs() < f64::EPSILON);
        assert_eq!(event.frame, 3);

        drop(sub);
        assert_eq!(frames.listener_count(), 0);
    }
}
