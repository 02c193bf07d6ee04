use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use log::debug;

/// Requests a redraw from outside the frame loop. Safe to call from any
/// thread, any number of times.
pub type Invalidator = Arc<dyn Fn() + Send + Sync>;

/// Wraps a fallible redraw request. A failed request only means nobody is
/// listening any more, so it is logged and dropped.
pub fn invalidator<E, F>(request: F) -> Invalidator
where
    E: fmt::Debug,
    F: Fn() -> Result<(), E> + Send + Sync + 'static,
{
    Arc::new(move || {
        if let Err(e) = request() {
            debug!("Dropped redraw request: {:?}", e);
        }
    })
}

#[cfg(test)]
pub fn noop_invalidator() -> Invalidator {
    Arc::new(|| ())
}

pub const TARGET_FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameLoop {
    /// Redraw on every display refresh.
    Always,
    /// Redraw only when something invalidates the surface.
    Demand,
}

impl FrameLoop {
    /// The stricter of two policies. Any continuous consumer makes the whole
    /// surface continuous.
    pub fn merge(self, other: FrameLoop) -> FrameLoop {
        match (self, other) {
            (FrameLoop::Demand, FrameLoop::Demand) => FrameLoop::Demand,
            _ => FrameLoop::Always,
        }
    }
}

/// Measures frame deltas in seconds.
#[derive(Debug, Default)]
pub struct FrameClock {
    last_tick: Option<Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds since the previous tick; zero for the first one.
    pub fn tick(&mut self, now: Instant) -> f64 {
        let delta = match self.last_tick {
            Some(last) => now.saturating_duration_since(last).as_secs_f64(),
            None => 0.0,
        };
        self.last_tick = Some(now);
        delta
    }

    /// Forgets the previous tick so an idle period is not replayed as one
    /// giant delta.
    pub fn reset(&mut self) {
        self.last_tick = None;
    }
}

/// A viewport's registration for frame callbacks. Each viewport owns its own
/// subscription; there is no process wide registry.
#[derive(Debug, Default)]
pub struct FrameSubscription {
    active: bool,
    frames: u64,
}

impl FrameSubscription {
    pub fn subscribe(&mut self) {
        self.active = true;
        self.frames = 0;
    }

    pub fn unsubscribe(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns the delta to dispatch, or `None` when unsubscribed.
    pub fn dispatch(&mut self, delta: f64) -> Option<f64> {
        if !self.is_active() {
            return None;
        }
        self.frames += 1;
        Some(delta)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}
