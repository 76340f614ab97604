//! Frame timing.

use std::time::{Duration, Instant};

/// High-resolution timer for measuring elapsed time.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
        }
    }

    /// Get the total elapsed time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get the time elapsed since the last call to `tick()`.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        delta
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts frames and reports a rate once per reporting interval.
#[derive(Debug)]
pub struct FrameRateCounter {
    interval: Duration,
    window_start: Instant,
    frames: u32,
}

impl FrameRateCounter {
    /// Creates a counter that reports once per second.
    pub fn new() -> Self {
        Self::with_interval(Duration::from_secs(1), Instant::now())
    }

    /// Creates a counter with an explicit interval and start time.
    pub fn with_interval(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            window_start: start,
            frames: 0,
        }
    }

    /// Records a frame finished at `now`.
    ///
    /// Returns the frames per second of the window that just closed, if at
    /// least one interval has passed since the window opened.
    pub fn frame_at(&mut self, now: Instant) -> Option<u32> {
        self.frames += 1;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.interval {
            return None;
        }

        let fps = (self.frames as f64 / elapsed.as_secs_f64()).round() as u32;
        self.frames = 0;
        self.window_start = now;
        Some(fps.max(1))
    }

    /// Records a frame finished now.
    pub fn frame(&mut self) -> Option<u32> {
        self.frame_at(Instant::now())
    }
}

impl Default for FrameRateCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Window title showing a frame rate.
pub fn fps_title(fps: u32) -> String {
    format!("Running at {} fps.", fps)
}
