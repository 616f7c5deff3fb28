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


//! Runs a request until it succeeds or the retry policy gives up.

use crate::Result;
use crate::backoff::BackoffPolicy;
use crate::error::Error;
use crate::retry_policy::{RetryPolicy, RetryResult};
use std::time::Duration;

/// Calls `attempt` until it succeeds, or until `retry_policy` rejects the
/// error.
///
/// Between attempts it calls `on_retry` with the attempt count, the error and
/// the delay, then awaits `sleep(delay)`. The delay comes from
/// `backoff_policy`, raised to the error's `Retry-After` hint when there is
/// one. The last error is returned unchanged when the policy stops the loop.
pub async fn retry_loop<F, S, C, T>(
    mut attempt: F,
    sleep: S,
    idempotent: bool,
    retry_policy: &dyn RetryPolicy,
    backoff_policy: &dyn BackoffPolicy,
    mut on_retry: C,
) -> Result<T>
where
    F: AsyncFnMut() -> Result<T>,
    S: AsyncFn(Duration),
    C: FnMut(u32, &Error, Duration),
{
    let mut attempt_count = 0_u32;
    loop {
        attempt_count = attempt_count.saturating_add(1);
        let error = match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        let hint = error.retry_after();
        let error = match retry_policy.on_error(attempt_count, idempotent, error) {
            RetryResult::Continue(e) => e,
            RetryResult::Permanent(e) | RetryResult::Exhausted(e) => return Err(e),
        };
        let delay = backoff_policy.on_failure(attempt_count);
        let delay = hint.map_or(delay, |h| h.max(delay));
        on_retry(attempt_count, &error, delay);
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry_policy::{AppStoreConnectPolicy, RetryPolicyExt};
    use http::{HeaderMap, HeaderValue};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    #[derive(Debug)]
    struct Fixed(Duration);
    impl BackoffPolicy for Fixed {
        fn on_failure(&self, _attempt_count: u32) -> Duration {
            self.0
        }
    }

    fn status(code: u16) -> Error {
        Error::http(code, HeaderMap::new(), bytes::Bytes::from(format!("status={code}")))
    }

    fn throttled(retry_after: &'static str) -> Error {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static(retry_after));
        Error::http(429, headers, bytes::Bytes::new())
    }

    /// Runs the loop over a scripted sequence of outcomes, returning the
    /// result, the number of attempts and the requested sleeps.
    async fn run(
        script: Vec<Result<&'static str>>,
        idempotent: bool,
        backoff: Duration,
    ) -> (Result<&'static str>, usize, Vec<Duration>) {
        let mut script = VecDeque::from(script);
        let mut attempts = 0;
        let sleeps = RefCell::new(Vec::new());
        let policy = AppStoreConnectPolicy.with_attempt_limit(4);
        let result = retry_loop(
            async || {
                attempts += 1;
                script.pop_front().unwrap_or(Ok("script exhausted"))
            },
            async |d| sleeps.borrow_mut().push(d),
            idempotent,
            &policy,
            &Fixed(backoff),
            |_, _, _| {},
        )
        .await;
        (result, attempts, sleeps.into_inner())
    }

    #[tokio::test]
    async fn first_attempt_succeeds() {
        let (result, attempts, sleeps) = run(vec![Ok("ok")], true, Duration::from_secs(1)).await;
        assert!(matches!(result, Ok("ok")), "{result:?}");
        assert_eq!(attempts, 1);
        assert!(sleeps.is_empty(), "{sleeps:?}");
    }

    #[tokio::test]
    async fn server_errors_then_success() {
        let script = vec![Err(status(503)), Err(status(500)), Ok("ok")];
        let (result, attempts, sleeps) = run(script, true, Duration::from_millis(5)).await;
        assert!(matches!(result, Ok("ok")), "{result:?}");
        assert_eq!(attempts, 3);
        assert_eq!(sleeps, vec![Duration::from_millis(5); 2]);
    }

    #[tokio::test]
    async fn post_is_not_retried_on_server_error() {
        let script = vec![Err(status(503)), Ok("ok")];
        let (result, attempts, sleeps) = run(script, false, Duration::from_millis(5)).await;
        let err = result.unwrap_err();
        assert_eq!(err.http_status_code(), Some(503), "{err:?}");
        assert_eq!(attempts, 1);
        assert!(sleeps.is_empty(), "{sleeps:?}");
    }

    #[tokio::test]
    async fn retry_after_raises_the_delay() {
        let script = vec![Err(throttled("5")), Ok("ok")];
        let (result, _, sleeps) = run(script, false, Duration::from_millis(10)).await;
        assert!(matches!(result, Ok("ok")), "{result:?}");
        assert_eq!(sleeps, vec![Duration::from_secs(5)]);
    }

    #[tokio::test]
    async fn backoff_wins_over_shorter_retry_after() {
        let script = vec![Err(throttled("1")), Ok("ok")];
        let (_, _, sleeps) = run(script, true, Duration::from_secs(3)).await;
        assert_eq!(sleeps, vec![Duration::from_secs(3)]);
    }

    #[tokio::test]
    async fn exhausted_returns_last_error() {
        let script = (0..6).map(|i| Err(status(500 + i))).collect();
        let (result, attempts, sleeps) = run(script, true, Duration::ZERO).await;
        let err = result.unwrap_err();
        assert_eq!(err.http_status_code(), Some(503), "{err:?}");
        assert_eq!(err.http_payload().map(|p| p.to_vec()), Some(b"status=503".to_vec()));
        assert_eq!(attempts, 4);
        assert_eq!(sleeps.len(), 3);
    }

    #[tokio::test]
    async fn permanent_error_stops_immediately() {
        let script = vec![Err(status(503)), Err(status(404)), Ok("ok")];
        let (result, attempts, _) = run(script, true, Duration::ZERO).await;
        let err = result.unwrap_err();
        assert!(err.is_not_found(), "{err:?}");
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn on_retry_sees_each_failure() {
        let mut script = VecDeque::from([Err(status(502)), Err(throttled("2")), Ok(())]);
        let mut seen = Vec::new();
        let policy = AppStoreConnectPolicy.with_attempt_limit(3);
        retry_loop(
            async || script.pop_front().unwrap_or(Ok(())),
            async |_| {},
            true,
            &policy,
            &Fixed(Duration::from_millis(1)),
            |count, e, d| seen.push((count, e.http_status_code(), d)),
        )
        .await
        .expect("third attempt succeeds");
        assert_eq!(
            seen,
            vec![
                (1, Some(502), Duration::from_millis(1)),
                (2, Some(429), Duration::from_secs(2)),
            ]
        );
    }
}
