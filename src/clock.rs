use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Monotonic tick clock.
///
/// The clock advances once per tick, so `delta_seconds` and `now` are stable
/// for the whole duration of a tick.
#[derive(Clone, Copy, Debug)]
pub struct Clock {
    now: Instant,
    delta: Duration,
}

impl Default for Clock {
    fn default() -> Self {
        Self {
            now: Instant::now(),
            delta: Duration::ZERO,
        }
    }
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock, updating the tick delta.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.delta = now - self.now;
        self.now = now;
    }

    /// Duration of the last tick in seconds.
    pub fn delta_seconds(&self) -> f64 {
        self.delta.as_secs_f64()
    }

    /// Monotonic time of the last tick.
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Wall-clock milliseconds since the Unix epoch, for timestamps that
    /// leave the process.
    pub fn millis_now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default()
    }
}
