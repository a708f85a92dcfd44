//! Frame timing.
//!
//! [`FrameClock`] measures the wall-clock time between frames and hands the
//! simulation a delta it can trust. Hosts that already track time themselves
//! can skip the clock and pass their own delta to
//! [`ParticleSimulation::step`](crate::ParticleSimulation::step), which runs it
//! through [`sanitize_delta`] as well.
//!
//! ```ignore
//! let mut clock = FrameClock::new();
//!
//! // once per frame:
//! let dt = clock.tick();
//! sim.step(dt);
//! ```

use std::time::{Duration, Instant};

/// Replace a degenerate frame delta with `fallback`.
///
/// Zero, negative and non-finite deltas happen when the host clock misbehaves
/// (first frame, suspended tab, clock jumps). Deltas above `max` usually mean
/// the app was stalled and integrating over the gap would fling particles off
/// the canvas.
pub fn sanitize_delta(dt: f32, fallback: f32, max: f32) -> f32 {
    if dt.is_finite() && dt > 0.0 && dt <= max {
        dt
    } else {
        fallback
    }
}

/// Per-frame delta source with pause, fixed-step and FPS tracking.
#[derive(Debug)]
pub struct FrameClock {
    last_frame: Option<Instant>,
    delta_secs: f32,
    elapsed_secs: f32,
    frame_count: u64,

    fps: f32,
    fps_frames: u64,
    fps_since: Instant,
    fps_interval: Duration,

    paused: bool,
    fixed_delta: Option<f32>,
    time_scale: f32,
    fallback: f32,
    max_delta: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_limits(0.016, 0.25)
    }

    /// Clock that substitutes `fallback` for deltas that are degenerate or
    /// larger than `max_delta`.
    pub fn with_limits(fallback: f32, max_delta: f32) -> Self {
        Self {
            last_frame: None,
            delta_secs: 0.0,
            elapsed_secs: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frames: 0,
            fps_since: Instant::now(),
            fps_interval: Duration::from_millis(500),
            paused: false,
            fixed_delta: None,
            time_scale: 1.0,
            fallback,
            max_delta,
        }
    }

    /// Advance one frame and return the sanitized delta in seconds.
    ///
    /// Returns 0.0 while paused. The first tick has no previous frame to
    /// measure against and yields the fallback delta.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let raw = match self.last_frame.replace(now) {
            Some(last) => now.duration_since(last).as_secs_f32(),
            None => 0.0,
        };

        if self.paused {
            self.delta_secs = 0.0;
            return 0.0;
        }

        let dt = sanitize_delta(self.fixed_delta.unwrap_or(raw), self.fallback, self.max_delta);
        self.delta_secs = dt * self.time_scale;
        self.elapsed_secs += self.delta_secs;
        self.frame_count += 1;

        let window = now.duration_since(self.fps_since);
        if window >= self.fps_interval {
            self.fps = (self.frame_count - self.fps_frames) as f32 / window.as_secs_f32();
            self.fps_frames = self.frame_count;
            self.fps_since = now;
        }

        self.delta_secs
    }

    /// Delta returned by the last [`tick`](Self::tick).
    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    /// Simulated seconds, excluding paused time.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed_secs
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Multiply every delta by `scale`. Negative values clamp to 0.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    /// Use a constant delta instead of wall-clock time. `None` restores real timing.
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.fixed_delta = delta;
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
