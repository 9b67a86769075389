//! Fixed-interval request pacing
//!
//! The upstream budget is expressed as N requests per window; the harvester
//! spreads requests evenly instead of bursting, so a single interval is enough.

use super::error::ApiError;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

pub struct RateLimiter {
    last_request: Option<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_request: None,
            min_interval,
        }
    }

    /// Wait until the next request slot. The wait is a cancellation checkpoint.
    pub async fn acquire(&mut self, cancel: &CancellationToken) -> Result<(), ApiError> {
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                log::trace!("Rate limiting: waiting {}ms", wait_time.as_millis());
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                    _ = sleep(wait_time) => {}
                }
            }
        }

        self.last_request = Some(Instant::now());
        Ok(())
    }
}
