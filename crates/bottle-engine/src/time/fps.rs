use std::time::Duration;

/// Averages frame deltas over a fixed reporting window.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window: Duration,
    elapsed: Duration,
    frames: u32,
    last: Option<f64>,
}

impl FpsCounter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            elapsed: Duration::ZERO,
            frames: 0,
            last: None,
        }
    }

    /// Adds one frame. Returns the average rate each time a window completes.
    pub fn record(&mut self, dt: Duration) -> Option<f64> {
        self.elapsed += dt;
        self.frames += 1;
        if self.elapsed < self.window {
            return None;
        }

        let fps = f64::from(self.frames) / self.elapsed.as_secs_f64();
        self.elapsed = Duration::ZERO;
        self.frames = 0;
        self.last = Some(fps);
        Some(fps)
    }

    /// Most recent completed average.
    pub fn last(&self) -> Option<f64> {
        self.last
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
