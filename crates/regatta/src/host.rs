//! # Frame Hosts
//!
//! Stand-ins for the platform's animation-frame primitive. A host hands out
//! monotonically increasing timestamps in milliseconds, one per frame.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use regatta_core::EngineConfig;

/// Source of animation frame timestamps.
pub trait FrameHost {
    /// Timestamp (ms) of "now", used to mount the loop.
    fn now(&self) -> f64;

    /// Waits for and returns the next frame's timestamp, or `None` once the
    /// host stops producing frames.
    fn next_frame(&mut self) -> Option<f64>;
}

/// Scripted timestamps for headless runs and tests.
#[derive(Clone, Debug, Default)]
pub struct ManualHost {
    pending: VecDeque<f64>,
    now: f64,
}

impl ManualHost {
    /// A host whose clock reads `start` and has no frames queued.
    #[must_use]
    pub fn new(start: f64) -> Self {
        Self {
            pending: VecDeque::new(),
            now: start,
        }
    }

    /// `count` frames spaced `step_ms` apart, starting one step after `start`.
    #[must_use]
    pub fn steady(start: f64, step_ms: f64, count: usize) -> Self {
        let mut host = Self::new(start);
        let mut t = start;
        for _ in 0..count {
            t += step_ms;
            host.push(t);
        }
        host
    }

    /// Queues a frame timestamp.
    pub fn push(&mut self, timestamp: f64) -> &mut Self {
        self.pending.push_back(timestamp);
        self
    }

    /// Frames still queued.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl FrameHost for ManualHost {
    fn now(&self) -> f64 {
        self.now
    }

    fn next_frame(&mut self) -> Option<f64> {
        let next = self.pending.pop_front()?;
        self.now = next;
        Some(next)
    }
}

/// Real time, paced to a fixed frame budget by sleeping.
#[derive(Debug)]
pub struct WallClockHost {
    origin: Instant,
    last: Instant,
    budget: Duration,
}

impl WallClockHost {
    /// A host targeting `frame_ms` per frame.
    #[must_use]
    pub fn new(frame_ms: f64) -> Self {
        let origin = Instant::now();
        Self {
            origin,
            last: origin,
            budget: Duration::from_secs_f64(frame_ms.max(0.0) / 1000.0),
        }
    }

    /// A host paced to `config.target_frame_ms`.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.target_frame_ms)
    }

    /// The frame budget.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.budget
    }
}

impl FrameHost for WallClockHost {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn next_frame(&mut self) -> Option<f64> {
        let deadline = self.last + self.budget;
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        self.last = Instant::now();
        Some(self.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_host_steady() {
        let mut host = ManualHost::steady(100.0, 16.0, 3);
        assert!((host.now() - 100.0).abs() < f64::EPSILON);
        assert_eq!(host.remaining(), 3);

        assert_eq!(host.next_frame(), Some(116.0));
        assert_eq!(host.next_frame(), Some(132.0));
        assert_eq!(host.next_frame(), Some(148.0));
        assert_eq!(host.next_frame(), None);
        assert!((host.now() - 148.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_wall_clock_paces_frames() {
        let mut host = WallClockHost::new(5.0);
        let first = host.next_frame().unwrap();
        let second = host.next_frame().unwrap();
        assert!(second - first >= 4.0);
    }
}
