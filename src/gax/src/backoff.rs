// Copyright 2026 The asc-rs Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Delays between retry attempts.
//!
//! Retries should not hammer a service that is already struggling. The
//! client waits between attempts, doubling the delay ceiling after each
//! failure and picking a random delay below that ceiling ("full jitter").
//! A `Retry-After` header from the service overrides shorter delays, see
//! [retry_loop][crate::retry_loop::retry_loop].

use std::time::Duration;

/// Computes the delay before the next attempt.
pub trait BackoffPolicy: Send + Sync + std::fmt::Debug {
    /// The delay after `attempt_count` failed attempts. Always called with
    /// `attempt_count >= 1`.
    fn on_failure(&self, attempt_count: u32) -> Duration;
}

/// Doubling backoff with full jitter.
///
/// The ceiling for attempt `n` is `initial * 2^(n-1)`, capped at `maximum`.
///
/// # Example
/// ```
/// # use asc_gax::backoff::{BackoffPolicy, ExponentialBackoff};
/// use std::time::Duration;
/// let backoff = ExponentialBackoff::new(Duration::from_millis(250), Duration::from_secs(8));
/// assert!(backoff.on_failure(3) <= Duration::from_secs(1));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExponentialBackoff {
    initial: Duration,
    maximum: Duration,
}

impl ExponentialBackoff {
    /// A zero `initial` delay is raised to one millisecond, and `maximum` is
    /// raised to `initial` if needed.
    pub fn new(initial: Duration, maximum: Duration) -> Self {
        let initial = initial.max(Duration::from_millis(1));
        Self {
            initial,
            maximum: maximum.max(initial),
        }
    }

    /// The largest delay for the given attempt, before jitter.
    pub fn ceiling(&self, attempt_count: u32) -> Duration {
        let doublings = attempt_count.saturating_sub(1).min(31);
        self.initial
            .checked_mul(1_u32 << doublings)
            .map_or(self.maximum, |d| d.min(self.maximum))
    }
}

impl Default for ExponentialBackoff {
    /// One second, doubling up to one minute.
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn on_failure(&self, attempt_count: u32) -> Duration {
        use rand::Rng;
        rand::rng().random_range(Duration::ZERO..=self.ceiling(attempt_count))
    }
}
