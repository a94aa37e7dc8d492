//! Stage timing.

use std::time::{Duration, Instant};

use tracing::info;

/// Measures one pipeline stage and logs its duration on finish.
pub struct Timer {
    name: String,
    start: Instant,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();
        let secs = elapsed.as_secs_f64();
        if secs >= 60.0 {
            info!(stage = %self.name, "done in {:.1}m", secs / 60.0);
        } else {
            info!(stage = %self.name, "done in {:.1}s", secs);
        }
        elapsed
    }
}
