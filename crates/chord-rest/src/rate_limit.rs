//! Rate limit tracking
//!
//! One [`RateLimitTracker`] belongs to one [`RestClient`](crate::RestClient) and is shared by its
//! clones. It records the last reported `(limit, remaining, reset)` triple and is the only place a
//! REST call may wait before being issued.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, DATE};
use tracing::{debug, trace};

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";

/// Last known state of a rate-limit bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitBucket {
    pub limit: u32,
    pub remaining: u32,
    /// Local time at which the bucket refills
    pub reset_at: DateTime<Utc>,
}

impl Default for RateLimitBucket {
    fn default() -> Self {
        Self {
            limit: 1,
            remaining: 1,
            reset_at: DateTime::UNIX_EPOCH,
        }
    }
}

impl RateLimitBucket {
    /// Check whether a request issued at `now` would have to wait
    #[must_use]
    pub fn is_exhausted_at(&self, now: DateTime<Utc>) -> bool {
        self.remaining < 1 && now < self.reset_at
    }
}

/// Shared rate-limit state for one client
#[derive(Debug, Clone, Default)]
pub struct RateLimitTracker {
    bucket: Arc<Mutex<RateLimitBucket>>,
}

impl RateLimitTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker starting from a known bucket
    #[must_use]
    pub fn with_bucket(bucket: RateLimitBucket) -> Self {
        Self {
            bucket: Arc::new(Mutex::new(bucket)),
        }
    }

    /// Snapshot of the current bucket
    #[must_use]
    pub fn peek(&self) -> RateLimitBucket {
        *self.bucket.lock()
    }

    /// Wait until a request may be issued, then reserve it
    ///
    /// The reservation decrements `remaining` under the lock, so concurrent callers sharing the
    /// tracker cannot all pass on the same reported slot. Once `reset_at` has passed, callers go
    /// through without waiting until the next response reports fresh numbers.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                let now = Utc::now();

                if bucket.is_exhausted_at(now) {
                    bucket.reset_at - now
                } else {
                    bucket.remaining = bucket.remaining.saturating_sub(1);
                    return;
                }
            };

            debug!(wait_ms = wait.num_milliseconds(), "Rate limit bucket exhausted, waiting");
            if let Ok(wait) = wait.to_std() {
                tokio::time::sleep(wait).await;
            }
        }
    }

    /// Merge response headers into the bucket
    pub fn update(&self, headers: &HeaderMap) {
        self.update_at(headers, Utc::now());
    }

    /// Merge response headers into the bucket, using `now` as the local clock
    ///
    /// Each field is replaced only when its header is present and parses. The reported reset is
    /// shifted by how far the server's `Date` is ahead of `now`. A reset that falls outside the
    /// representable range is ignored.
    pub fn update_at(&self, headers: &HeaderMap, now: DateTime<Utc>) {
        let limit = header_value::<u32>(headers, LIMIT_HEADER);
        let remaining = header_value::<u32>(headers, REMAINING_HEADER);
        let reset = header_value::<f64>(headers, RESET_HEADER)
            .filter(|secs| secs.is_finite())
            .and_then(|secs| DateTime::from_timestamp_millis((secs * 1000.0).round() as i64));

        let reset_at =
            reset.and_then(|reported| reported.checked_add_signed(server_ahead(headers, now)));

        let mut bucket = self.bucket.lock();
        if let Some(limit) = limit {
            bucket.limit = limit;
        }
        if let Some(remaining) = remaining {
            bucket.remaining = remaining;
        }
        if let Some(reset_at) = reset_at {
            bucket.reset_at = reset_at;
        }

        trace!(
            limit = bucket.limit,
            remaining = bucket.remaining,
            reset_at = %bucket.reset_at,
            "Rate limit bucket updated"
        );
    }
}

/// Sleep until a wall-clock deadline
///
/// Returns immediately if the deadline has already passed.
pub(crate) async fn sleep_until(deadline: DateTime<Utc>) {
    if let Ok(wait) = (deadline - Utc::now()).to_std() {
        tokio::time::sleep(wait).await;
    }
}

fn header_value<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// How far the server clock is ahead of `now`, in whole seconds
fn server_ahead(headers: &HeaderMap, now: DateTime<Utc>) -> chrono::Duration {
    let server_time = headers
        .get(DATE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok());

    match server_time {
        Some(server_time) => {
            chrono::Duration::seconds(server_time.timestamp() - now.timestamp())
        }
        None => {
            debug!("No usable Date header, assuming zero clock skew");
            chrono::Duration::zero()
        }
    }
}
