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

//! A cancellable polling loop.
//!
//! Long running workflows, such as waiting for a build to finish processing,
//! query the service periodically until the resource reaches a terminal
//! state. This module implements the loop, the application provides the
//! function that checks the state.

use crate::Result;
use crate::error::Error;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Calls `check` every `interval` until it returns a value.
///
/// The `check` function returns `Ok(Some(v))` when the workflow is done,
/// `Ok(None)` when the loop should continue, and `Err(e)` to stop the loop
/// with an error.
///
/// The loop stops with a [cancelled][Error::is_cancelled] error if `cancel` is
/// triggered before the first check or while sleeping between checks.
///
/// # Example
/// ```
/// # use asc_gax::polling::poll_until;
/// # use tokio_util::sync::CancellationToken;
/// # use std::time::Duration;
/// # tokio_test::block_on(async {
/// let cancel = CancellationToken::new();
/// let mut count = 0;
/// let got = poll_until(&cancel, Duration::from_millis(1), async || {
///     count += 1;
///     Ok((count == 3).then_some(count))
/// }).await?;
/// assert_eq!(got, 3);
/// # asc_gax::Result::<()>::Ok(()) });
/// ```
pub async fn poll_until<F, T>(
    cancel: &CancellationToken,
    interval: Duration,
    mut check: F,
) -> Result<T>
where
    F: AsyncFnMut() -> Result<Option<T>>,
{
    if interval.is_zero() {
        return Err(Error::usage("poll interval must be greater than zero"));
    }
    let mut attempt = 0_u32;
    loop {
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }
        attempt += 1;
        if let Some(v) = check().await? {
            return Ok(v);
        }
        tracing::debug!(attempt, ?interval, "polling again");
        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::cancelled()),
            _ = tokio::time::sleep(interval) => {},
        }
    }
}
