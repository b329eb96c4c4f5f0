use std::time::{Duration, Instant};

/// Timing of one loop iteration.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Clamped time since the previous tick.
    pub dt: Duration,

    pub now: Instant,

    /// Zero-based index of this tick.
    pub frame_index: u64,
}

/// Produces [`FrameTime`] values, clamping the delta to `[dt_min, dt_max]`.
///
/// The upper clamp keeps a debugger pause or a stalled compositor from
/// showing up as one enormous frame in the statistics.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self {
            last: Instant::now(),
            frame_index: 0,
            dt_min,
            dt_max,
        }
    }

    /// Moves the baseline to now without counting a frame.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);
        self.last = now;

        let time = FrameTime {
            dt,
            now,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        time
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
