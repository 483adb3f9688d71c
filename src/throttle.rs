//! Rate gate between consecutive upstream page fetches.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep_until, Instant};

/// Decides how long to wait before the next upstream request.
#[async_trait]
pub trait Throttle: Send {
    /// Resolve once the next request may be sent.
    async fn ready(&mut self);
}

/// Keeps at least `interval` between consecutive `ready` calls.
/// The first call passes immediately.
pub struct FixedInterval {
    interval: Duration,
    last: Option<Instant>,
}

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }
}

#[async_trait]
impl Throttle for FixedInterval {
    async fn ready(&mut self) {
        if let Some(last) = self.last {
            sleep_until(last + self.interval).await;
        }
        self.last = Some(Instant::now());
    }
}
