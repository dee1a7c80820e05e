//! # REGATTA Game Loop
//!
//! Runs every system once per host animation frame, then advances the clock.
//!
//! ```text
//!            mount(now)               on_animation_frame(now)
//!   Idle ─────────────> Scheduled ─────────────────────────> Ticking
//!    ^                    │  ^                                  │
//!    │      unmount()     │  └──────────────────────────────────┘
//!    └────────────────────┘
//!
//! Tick:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. delta = now - previous (clamped to max_delta_ms if configured)   │
//! │ 2. take the event buffer (events emitted since the last tick)       │
//! │ 3. build the FrameContext                                           │
//! │ 4. run every system in registration order                           │
//! │ 5. frames.update_frame(nominal_fps, delta)                          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events emitted while systems run land in the next tick's buffer. Frames
//! delivered after `unmount`, or after the session is closed, are dropped
//! without touching systems or the clock. A closed session cannot be mounted.

use std::sync::Arc;

use parking_lot::Mutex;
use regatta_core::{
    Dispatch, EngineError, EngineResult, FrameContext, FrameTime, LayoutMetrics, ListenerId,
    ScreenMetrics, Session, Systems, Touch,
};

use crate::host::FrameHost;

/// Driver state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoopState {
    /// Not mounted. Frames are ignored.
    Idle,
    /// Mounted and waiting for the next animation frame.
    Scheduled,
    /// Running systems.
    Ticking,
}

/// Counters for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LoopStats {
    /// Ticks run since construction.
    pub ticks: u64,
    /// Frames dropped because the loop was idle or its session closed.
    pub dropped_frames: u64,
    /// Delta of the last tick (ms), after clamping.
    pub last_delta_ms: f64,
    /// Systems run on the last tick.
    pub systems_run: usize,
    /// Events handed to systems since construction.
    pub events_delivered: u64,
}

/// The game loop driver.
///
/// Owns the system list and a handle on the session. Input from the host
/// (touches, screen and layout metrics) is queued here and handed to systems
/// on the next tick.
pub struct GameLoop<D, E> {
    session: Session<D, E>,
    systems: Systems<D, E>,
    state: LoopState,
    previous: f64,
    /// Filled by the all-events subscription while mounted.
    buffer: Arc<Mutex<Vec<E>>>,
    feed: Option<ListenerId>,
    touches: Vec<Touch>,
    screen: ScreenMetrics,
    layout: LayoutMetrics,
    stats: LoopStats,
}

impl<D, E> GameLoop<D, E>
where
    E: Clone + Send + 'static,
{
    /// Creates an unmounted loop.
    #[must_use]
    pub fn new(session: Session<D, E>, systems: Systems<D, E>) -> Self {
        Self {
            session,
            systems,
            state: LoopState::Idle,
            previous: 0.0,
            buffer: Arc::new(Mutex::new(Vec::new())),
            feed: None,
            touches: Vec::new(),
            screen: ScreenMetrics::default(),
            layout: LayoutMetrics::default(),
            stats: LoopStats::default(),
        }
    }

    /// Starts listening for game events and schedules the first frame.
    ///
    /// `now` is the host timestamp (ms) the first delta is measured from.
    ///
    /// # Errors
    ///
    /// [`EngineError::AlreadyMounted`] if the loop is already running,
    /// [`EngineError::OutsideScope`] if the session is closed.
    pub fn mount(&mut self, now: f64) -> EngineResult<()> {
        if self.state != LoopState::Idle {
            return Err(EngineError::AlreadyMounted);
        }
        self.session.ensure_active("mount")?;

        let buffer = Arc::clone(&self.buffer);
        self.feed = Some(
            self.session
                .events()
                .subscribe_all(move |event: &E| buffer.lock().push(event.clone())),
        );
        self.previous = now;
        self.state = LoopState::Scheduled;
        tracing::debug!("game loop mounted at {now:.1}ms");
        Ok(())
    }

    /// Stops listening for game events. Frames delivered afterwards are
    /// dropped.
    ///
    /// # Errors
    ///
    /// [`EngineError::LoopNotMounted`] if the loop is idle.
    pub fn unmount(&mut self) -> EngineResult<()> {
        if self.state == LoopState::Idle {
            return Err(EngineError::LoopNotMounted);
        }
        self.detach_feed();
        self.buffer.lock().clear();
        self.state = LoopState::Idle;
        tracing::debug!("game loop unmounted after {} ticks", self.stats.ticks);
        Ok(())
    }

    /// Host animation frame callback.
    ///
    /// Returns `true` if a tick ran and the host should request another
    /// frame, `false` if the loop is not mounted or its session is closed.
    pub fn on_animation_frame(&mut self, now: f64) -> bool {
        if self.state != LoopState::Scheduled {
            self.stats.dropped_frames += 1;
            tracing::debug!("dropping frame at {now:.1}ms, loop is {:?}", self.state);
            return false;
        }
        if !self.session.is_active() {
            self.stats.dropped_frames += 1;
            tracing::debug!("dropping frame at {now:.1}ms, session is closed");
            return false;
        }
        self.tick(now);
        true
    }

    /// Drives the loop from `host` until it stops producing frames or
    /// `max_ticks` ticks have run. Returns the number of ticks run.
    ///
    /// # Errors
    ///
    /// [`EngineError::LoopNotMounted`] if the loop is idle.
    pub fn run(&mut self, host: &mut impl FrameHost, max_ticks: Option<u64>) -> EngineResult<u64> {
        if self.state == LoopState::Idle {
            return Err(EngineError::LoopNotMounted);
        }

        let mut ran = 0;
        while max_ticks.map_or(true, |max| ran < max) {
            let Some(now) = host.next_frame() else {
                break;
            };
            if !self.on_animation_frame(now) {
                break;
            }
            ran += 1;
        }
        Ok(ran)
    }

    fn tick(&mut self, now: f64) {
        self.state = LoopState::Ticking;

        let config = self.session.config();
        let raw = (now - self.previous).max(0.0);
        let delta = config.clamp_delta(raw);
        if delta < raw {
            tracing::warn!("frame delta {raw:.1}ms clamped to {delta:.1}ms");
        }

        let events = std::mem::take(&mut *self.buffer.lock());
        let ctx = FrameContext {
            events,
            dispatch: Dispatch::new(Arc::clone(self.session.events())),
            time: FrameTime {
                delta,
                current: now,
                previous: self.previous,
            },
            touches: std::mem::take(&mut self.touches),
            screen: self.screen,
            layout: self.layout,
            frame: self.session.frames().current_frame(),
        };
        tracing::trace!(
            "tick {} delta {delta:.2}ms, {} events",
            self.stats.ticks,
            ctx.events.len()
        );

        let systems_run = self.systems.update(self.session.entities(), &ctx);
        self.session
            .frames()
            .update_frame(config.nominal_fps, delta);

        self.previous = now;
        self.stats.ticks += 1;
        self.stats.last_delta_ms = delta;
        self.stats.systems_run = systems_run;
        self.stats.events_delivered += ctx.events.len() as u64;
        self.state = LoopState::Scheduled;
    }
}

impl<D, E> GameLoop<D, E> {
    fn detach_feed(&mut self) {
        if let Some(feed) = self.feed.take() {
            self.session.events().unsubscribe_all(feed);
        }
    }

    /// Queues a touch for the next tick.
    pub fn queue_touch(&mut self, touch: Touch) {
        self.touches.push(touch);
    }

    /// Sets the screen metrics passed to systems.
    pub fn set_screen(&mut self, screen: ScreenMetrics) {
        self.screen = screen;
    }

    /// Sets the layout metrics passed to systems.
    pub fn set_layout(&mut self, layout: LayoutMetrics) {
        self.layout = layout;
    }

    /// Current driver state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// `true` between `mount` and `unmount`.
    #[inline]
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.state != LoopState::Idle
    }

    /// Events waiting for the next tick.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Diagnostic counters.
    #[must_use]
    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// The session this loop drives.
    #[must_use]
    pub fn session(&self) -> &Session<D, E> {
        &self.session
    }

    /// The system list, for adding systems between ticks.
    pub fn systems_mut(&mut self) -> &mut Systems<D, E> {
        &mut self.systems
    }
}

impl<D, E> Drop for GameLoop<D, E> {
    fn drop(&mut self) {
        self.detach_feed();
    }
}

impl<D, E> std::fmt::Debug for GameLoop<D, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameLoop")
            .field("state", &self.state)
            .field("systems", &self.systems)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
