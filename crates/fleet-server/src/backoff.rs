//! Exponential retry delay with jitter for the persistence loop.

use rand::Rng;
use std::time::{Duration, Instant};

const JITTER_RATIO: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
    retry_at: Instant,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.max(Duration::from_millis(1));
        Self {
            base,
            max: max.max(base),
            current: base,
            retry_at: Instant::now(),
        }
    }

    /// True once the delay from the last failure has elapsed.
    pub fn ready(&self) -> bool {
        Instant::now() >= self.retry_at
    }

    pub fn reset(&mut self) {
        self.current = self.base;
        self.retry_at = Instant::now();
    }

    /// Double the delay (capped at `max`) and return the jittered wait.
    pub fn fail(&mut self) -> Duration {
        self.current = self.current.saturating_mul(2).min(self.max);
        let wait = jittered(self.current);
        self.retry_at = Instant::now() + wait;
        wait
    }
}

fn jittered(delay: Duration) -> Duration {
    let factor = rand::rng().random_range(0.0..=JITTER_RATIO);
    delay + delay.mul_f64(factor)
}
