use std::sync::{Mutex, PoisonError};
use tokio::time::{Duration, Instant};

/// Token bucket: holds up to `capacity` calls and refills continuously.
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    bucket: Mutex<Bucket>,
}

struct Bucket {
    tokens: f64,
    updated: Instant,
}

impl RateLimiter {
    /// `capacity` is clamped to at least one call; a non-positive refill rate
    /// means the bucket never refills.
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            capacity,
            refill_per_sec: refill_per_sec.max(0.0),
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                updated: Instant::now(),
            }),
        }
    }

    /// Allows a burst of `calls` and sustains `calls` per minute.
    pub fn per_minute(calls: u32) -> Self {
        Self::new(calls, f64::from(calls) / 60.0)
    }

    /// Takes a token if one is available, otherwise returns how long until
    /// the next one is.
    fn take(&self) -> Result<(), Option<Duration>> {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.updated).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.updated = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Ok(());
        }

        if self.refill_per_sec <= 0.0 {
            return Err(None);
        }
        // A wait too long for `Duration` is treated as never refilling.
        Err(Duration::try_from_secs_f64((1.0 - bucket.tokens) / self.refill_per_sec).ok())
    }

    pub fn try_acquire(&self) -> bool {
        self.take().is_ok()
    }

    /// Waits until a call is allowed. Fails only when the bucket is empty and
    /// can never refill.
    pub async fn acquire(&self) -> anyhow::Result<()> {
        loop {
            match self.take() {
                Ok(()) => return Ok(()),
                Err(Some(wait)) => {
                    tracing::debug!(wait_ms = wait.as_millis() as u64, "Rate limited");
                    tokio::time::sleep(wait).await;
                }
                Err(None) => anyhow::bail!("Rate limit exhausted and refill is disabled"),
            }
        }
    }

    pub fn available(&self) -> f64 {
        let bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        let elapsed = Instant::now().duration_since(bucket.updated).as_secs_f64();
        (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity)
    }
}
