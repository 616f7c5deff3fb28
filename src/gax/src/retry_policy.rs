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


//! Decides which failed requests are worth another attempt.
//!
//! Idempotent requests (`GET`, `HEAD`, and requests marked as such) are
//! retried on transport errors, `429` and `5xx` responses. Other requests are
//! only retried when the service answers `429` with a `Retry-After` header,
//! as the first attempt may have had side effects.
//!
//! # Example
//! ```
//! # use asc_gax::retry_policy::*;
//! let policy = AppStoreConnectPolicy.with_attempt_limit(5);
//! ```

use crate::error::Error;

/// The outcome of [RetryPolicy::on_error].
#[derive(Debug)]
pub enum RetryResult {
    /// Try again after a backoff delay.
    Continue(Error),
    /// The error cannot be fixed by retrying.
    Permanent(Error),
    /// The error could be retried, but the policy ran out of attempts.
    Exhausted(Error),
}

impl RetryResult {
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }
}

/// Classifies the error of a failed attempt.
pub trait RetryPolicy: Send + Sync + std::fmt::Debug {
    /// `attempt_count` includes the attempt that just failed, so it is at
    /// least 1.
    fn on_error(&self, attempt_count: u32, idempotent: bool, error: Error) -> RetryResult;
}

/// Adds limits to a [RetryPolicy].
pub trait RetryPolicyExt: RetryPolicy + Sized {
    /// Stops after `maximum_attempts` attempts, counting the first one.
    fn with_attempt_limit(self, maximum_attempts: u32) -> LimitedAttemptCount<Self> {
        LimitedAttemptCount {
            inner: self,
            maximum_attempts,
        }
    }
}

impl<T: RetryPolicy> RetryPolicyExt for T {}

/// The retry rules for App Store Connect REST requests.
///
/// Failures to create the authorization header are retried when the
/// credentials flag them as retryable, whatever the method, since nothing was
/// sent. This policy has no attempt limit of its own.
#[derive(Clone, Copy, Debug, Default)]
pub struct AppStoreConnectPolicy;

impl RetryPolicy for AppStoreConnectPolicy {
    fn on_error(&self, _attempt_count: u32, idempotent: bool, error: Error) -> RetryResult {
        let retry = if error.is_transient_and_before_send() {
            true
        } else if error.is_rate_limited() {
            idempotent || error.retry_after().is_some()
        } else {
            idempotent && (error.is_transient() || error.is_server_error())
        };
        if retry {
            RetryResult::Continue(error)
        } else {
            RetryResult::Permanent(error)
        }
    }
}

/// Turns [RetryResult::Continue] into [RetryResult::Exhausted] once the
/// attempt limit is reached.
#[derive(Clone, Debug)]
pub struct LimitedAttemptCount<P> {
    inner: P,
    maximum_attempts: u32,
}

impl<P: RetryPolicy> RetryPolicy for LimitedAttemptCount<P> {
    fn on_error(&self, attempt_count: u32, idempotent: bool, error: Error) -> RetryResult {
        match self.inner.on_error(attempt_count, idempotent, error) {
            RetryResult::Continue(e) if attempt_count >= self.maximum_attempts => {
                RetryResult::Exhausted(e)
            }
            flow => flow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, HeaderValue};
    use test_case::test_case;

    fn http_error(code: u16) -> Error {
        Error::http(code, HeaderMap::new(), bytes::Bytes::new())
    }

    fn throttled_with_hint() -> Error {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("3"));
        Error::http(429, headers, bytes::Bytes::new())
    }

    #[test_case(true, true; "idempotent")]
    #[test_case(false, false; "not idempotent")]
    fn transient_errors(idempotent: bool, want: bool) {
        for error in [
            Error::io("connection reset"),
            Error::timeout("deadline"),
            http_error(500),
            http_error(502),
            http_error(503),
        ] {
            let got = AppStoreConnectPolicy.on_error(1, idempotent, error);
            assert_eq!(got.is_continue(), want, "{got:?}");
        }
    }

    #[test]
    fn rate_limited() {
        let p = AppStoreConnectPolicy;
        assert!(p.on_error(1, true, http_error(429)).is_continue());
        assert!(p.on_error(1, false, http_error(429)).is_permanent());
        assert!(p.on_error(1, true, throttled_with_hint()).is_continue());
        assert!(p.on_error(1, false, throttled_with_hint()).is_continue());
    }

    #[test_case(400)]
    #[test_case(401)]
    #[test_case(403)]
    #[test_case(404)]
    #[test_case(409)]
    #[test_case(422)]
    fn client_errors_are_permanent(code: u16) {
        let p = AppStoreConnectPolicy;
        assert!(p.on_error(1, true, http_error(code)).is_permanent());
        assert!(p.on_error(1, false, http_error(code)).is_permanent());
    }

    #[test]
    fn usage_errors_are_permanent() {
        let got = AppStoreConnectPolicy.on_error(1, true, Error::usage("bad"));
        assert!(got.is_permanent(), "{got:?}");
    }

    #[test]
    fn attempt_limit() {
        let p = AppStoreConnectPolicy.with_attempt_limit(3);
        assert!(p.on_error(1, true, http_error(503)).is_continue());
        assert!(p.on_error(2, true, http_error(503)).is_continue());
        assert!(p.on_error(3, true, http_error(503)).is_exhausted());
        // Permanent errors stay permanent past the limit.
        assert!(p.on_error(5, true, http_error(404)).is_permanent());
    }
}
