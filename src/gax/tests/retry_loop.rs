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


//! Verify the retry primitives compose from outside the crate.

#[cfg(test)]
mod tests {
    use asc_gax::Result;
    use asc_gax::backoff::ExponentialBackoff;
    use asc_gax::error::Error;
    use asc_gax::retry_loop::retry_loop;
    use asc_gax::retry_policy::*;
    use http::{HeaderMap, HeaderValue};
    use std::sync::Mutex;
    use std::time::Duration;

    fn http_error(status: u16, retry_after: Option<&'static str>) -> Error {
        let mut headers = HeaderMap::new();
        if let Some(v) = retry_after {
            headers.insert("retry-after", HeaderValue::from_static(v));
        }
        Error::http(status, headers, bytes::Bytes::from_static(b"{}"))
    }

    // Upload style policy: conflicts are worth another try, nothing else is.
    #[derive(Debug)]
    struct OnlyConflicts;
    impl RetryPolicy for OnlyConflicts {
        fn on_error(&self, _attempt_count: u32, _idempotent: bool, error: Error) -> RetryResult {
            if error.is_conflict() {
                RetryResult::Continue(error)
            } else {
                RetryResult::Permanent(error)
            }
        }
    }

    #[tokio::test]
    async fn custom_policy_with_limit() {
        let mut calls = 0;
        let policy = OnlyConflicts.with_attempt_limit(2);
        let got: Result<()> = retry_loop(
            async || {
                calls += 1;
                Err(http_error(409, None))
            },
            async |_| {},
            false,
            &policy,
            &ExponentialBackoff::default(),
            |_, _, _| {},
        )
        .await;
        let err = got.unwrap_err();
        assert!(err.is_conflict(), "{err:?}");
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() -> anyhow::Result<()> {
        let backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(4));
        let mut responses = vec![Ok("done"), Err(http_error(503, None)), Err(http_error(500, None))];
        let sleeps = Mutex::new(Vec::new());
        let policy = AppStoreConnectPolicy.with_attempt_limit(5);
        let got = retry_loop(
            async || responses.pop().unwrap_or(Ok("unexpected")),
            async |d| {
                sleeps.lock().expect("sleeps lock").push(d);
                tokio::time::sleep(d).await;
            },
            true,
            &policy,
            &backoff,
            |_, _, _| {},
        )
        .await?;
        assert_eq!(got, "done");
        let sleeps = sleeps.into_inner()?;
        assert_eq!(sleeps.len(), 2, "{sleeps:?}");
        assert!(sleeps[0] <= Duration::from_secs(1), "{sleeps:?}");
        assert!(sleeps[1] <= Duration::from_secs(2), "{sleeps:?}");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limits_honor_retry_after() -> anyhow::Result<()> {
        let backoff = ExponentialBackoff::new(Duration::from_millis(10), Duration::from_millis(20));
        let mut responses = vec![Ok(42), Err(http_error(429, Some("7")))];
        let start = tokio::time::Instant::now();
        let policy = AppStoreConnectPolicy.with_attempt_limit(3);
        let got = retry_loop(
            async || responses.pop().unwrap_or(Ok(0)),
            async |d| tokio::time::sleep(d).await,
            false,
            &policy,
            &backoff,
            |_, _, _| {},
        )
        .await?;
        assert_eq!(got, 42);
        assert_eq!(start.elapsed(), Duration::from_secs(7));
        Ok(())
    }

    #[tokio::test]
    async fn client_errors_are_permanent() {
        let mut calls = 0;
        let policy = AppStoreConnectPolicy.with_attempt_limit(3);
        let got: Result<()> = retry_loop(
            async || {
                calls += 1;
                Err(http_error(404, None))
            },
            async |_| {},
            true,
            &policy,
            &ExponentialBackoff::default(),
            |_, _, _| {},
        )
        .await;
        let err = got.unwrap_err();
        assert!(err.is_not_found(), "{err:?}");
        assert_eq!(calls, 1);
    }
}
