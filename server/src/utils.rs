use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

// Get current timestamp in milliseconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

pub fn distance(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt()
}

// Angle in radians of the vector pointing from (x1, y1) to (x2, y2)
pub fn heading(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    (y2 - y1).atan2(x2 - x1)
}

/// Server time of day, as a fraction of a full day in `[0, 1)`.
#[derive(Debug, Clone)]
pub struct DayClock {
    started: Instant,
    day_length: Duration,
    start_time: f64,
}

impl DayClock {
    /// 30 real minutes per day, starting in the morning.
    pub fn new() -> Self {
        Self::with_day_length(Duration::from_secs(30 * 60))
    }

    pub fn with_day_length(day_length: Duration) -> Self {
        Self {
            started: Instant::now(),
            day_length,
            start_time: 0.25,
        }
    }

    pub fn time_of_day(&self) -> f64 {
        self.time_after(self.started.elapsed())
    }

    pub fn time_after(&self, elapsed: Duration) -> f64 {
        (self.start_time + elapsed.as_secs_f64() / self.day_length.as_secs_f64()).fract()
    }
}

impl Default for DayClock {
    fn default() -> Self {
        Self::new()
    }
}
