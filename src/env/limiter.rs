//! Write Limiter
//!
//! Byte-budget throttling for WAL writes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Grants write budget, blocking until it is available
pub trait WriteLimiter: Send + Sync {
    /// Block until `bytes` may be written
    fn request(&self, bytes: u64);
}

/// Token bucket refilled at a fixed bytes-per-second rate
///
/// Requests larger than the bucket go into debt; the caller sleeps off
/// the deficit outside the lock so other requesters are not serialized
/// behind one sleeper.
pub struct RateLimiter {
    bytes_per_sec: u64,
    bucket: Mutex<Bucket>,
    total_granted: AtomicU64,
}

struct Bucket {
    /// May go negative while a large request is being paid off
    available: i64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(bytes_per_sec: u64) -> Self {
        let rate = bytes_per_sec.max(1);
        Self {
            bytes_per_sec: rate,
            bucket: Mutex::new(Bucket {
                available: rate as i64,
                last_refill: Instant::now(),
            }),
            total_granted: AtomicU64::new(0),
        }
    }

    pub fn bytes_per_sec(&self) -> u64 {
        self.bytes_per_sec
    }

    /// Total bytes granted since creation
    pub fn total_granted(&self) -> u64 {
        self.total_granted.load(Ordering::Relaxed)
    }
}

impl WriteLimiter for RateLimiter {
    fn request(&self, bytes: u64) {
        let wait = {
            let mut bucket = self.bucket.lock();
            let now = Instant::now();
            let elapsed = now.duration_since(bucket.last_refill);
            let refill = (elapsed.as_secs_f64() * self.bytes_per_sec as f64) as i64;
            if refill > 0 {
                bucket.available = (bucket.available + refill).min(self.bytes_per_sec as i64);
                bucket.last_refill = now;
            }

            bucket.available -= bytes as i64;
            if bucket.available >= 0 {
                Duration::ZERO
            } else {
                let deficit = (-bucket.available) as f64;
                Duration::from_secs_f64(deficit / self.bytes_per_sec as f64)
            }
        };

        if !wait.is_zero() {
            tracing::trace!(bytes, wait_ms = wait.as_millis() as u64, "write limiter throttling");
            thread::sleep(wait);
        }
        self.total_granted.fetch_add(bytes, Ordering::Relaxed);
    }
}
