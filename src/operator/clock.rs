use tokio::time::Instant;

/// Source of the enrichment timestamp. It must be monotonic; its origin is arbitrary.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now_nanos(&self) -> u64;
}

/// Nanoseconds since the clock was created, based on tokio's (pausable) monotonic clock
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> MonotonicClock {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_nanos(&self) -> u64 {
        // u64 nanoseconds cover several centuries of uptime
        self.origin.elapsed().as_nanos() as u64
    }
}
