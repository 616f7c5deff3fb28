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

//! Waits for a build to finish processing.

use crate::client::Client;
use crate::diagnostics::Diagnostics;
use crate::model::{Build, Platform, ProcessingState};
use crate::query::BuildsQuery;
use gax::Result;
use gax::error::Error;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The default limit on the total wait.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// The default time between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Identifies the build to wait for.
#[derive(Clone, Debug, PartialEq)]
pub enum BuildSelector {
    Id(String),
    /// The most recently uploaded build of an app with the given number.
    Number {
        app_id: String,
        build_number: String,
        platform: Option<Platform>,
    },
}

/// Controls [Client::wait_for_build].
#[derive(Clone, Debug, PartialEq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Treat `INVALID` as a failure. By default an `INVALID` build ends the
    /// wait successfully.
    pub fail_on_invalid: bool,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            fail_on_invalid: false,
        }
    }
}

impl WaitOptions {
    pub fn with_timeout(mut self, v: Duration) -> Self {
        self.timeout = v;
        self
    }

    pub fn with_poll_interval(mut self, v: Duration) -> Self {
        self.poll_interval = v;
        self
    }

    pub fn with_fail_on_invalid(mut self, v: bool) -> Self {
        self.fail_on_invalid = v;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::usage("poll interval must be greater than 0"));
        }
        if self.timeout.is_zero() {
            return Err(Error::usage("timeout must be greater than 0"));
        }
        Ok(())
    }
}

impl Client {
    /// Finds the build a [BuildSelector] refers to.
    ///
    /// A selector by id is returned as-is, without a request.
    pub async fn resolve_build_for_wait(
        &self,
        cancel: &CancellationToken,
        selector: &BuildSelector,
    ) -> Result<Build> {
        let (app_id, build_number, platform) = match selector {
            BuildSelector::Id(id) => {
                let id = id.trim();
                if id.is_empty() {
                    return Err(Error::usage("build id is required"));
                }
                return Ok(Build {
                    id: id.to_string(),
                    kind: crate::model::BUILDS.to_string(),
                    ..Default::default()
                });
            }
            BuildSelector::Number {
                app_id,
                build_number,
                platform,
            } => (app_id.trim(), build_number.trim(), platform),
        };
        if app_id.is_empty() || build_number.is_empty() {
            return Err(Error::usage(
                "app id and build number are required when build id is not provided",
            ));
        }
        let mut query = BuildsQuery::latest(app_id)
            .with_build_number(build_number)
            .with_all_processing_states();
        if let Some(p) = platform {
            query = query.with_platform(*p);
        }
        let page = self.list_builds(cancel, &query).await?;
        page.data.into_iter().next().ok_or_else(|| {
            Error::build_not_found(format!(
                "no build found for app {app_id:?} with build number {build_number:?}"
            ))
        })
    }

    /// Resolves `selector` and polls the build until it reaches a terminal
    /// processing state, or the timeout in `options` expires.
    ///
    /// Each poll writes a progress line to the configured diagnostics sink.
    pub async fn wait_for_build(
        &self,
        cancel: &CancellationToken,
        selector: &BuildSelector,
        options: &WaitOptions,
    ) -> Result<Build> {
        options.validate()?;
        let diagnostics = self.config().diagnostics();
        let run = async {
            let build = self.resolve_build_for_wait(cancel, selector).await?;
            let build_id = build.id;
            wait_for_processing(
                cancel,
                &build_id,
                options,
                diagnostics.as_ref(),
                async || self.get_build(cancel, &build_id).await,
            )
            .await
        };
        match tokio::time::timeout(options.timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(format!(
                "timed out waiting for build after {}",
                humantime::format_duration(round_to_seconds(options.timeout))
            ))),
        }
    }
}

/// Polls `fetch` until the build reaches a terminal state.
///
/// * `VALID` returns the build.
/// * `FAILED` fails with a [processing failed][Error::is_processing_failed]
///   error.
/// * `INVALID` fails only if `options.fail_on_invalid` is set.
/// * Any other state, including an empty one, continues polling.
///
/// The timeout in `options` is not applied here.
pub async fn wait_for_processing<F>(
    cancel: &CancellationToken,
    build_id: &str,
    options: &WaitOptions,
    diagnostics: &dyn Diagnostics,
    mut fetch: F,
) -> Result<Build>
where
    F: AsyncFnMut() -> Result<Build>,
{
    let started = tokio::time::Instant::now();
    let fail_on_invalid = options.fail_on_invalid;
    gax::polling::poll_until(cancel, options.poll_interval, async || {
        let build = fetch().await?;
        let state = build.attributes.processing_state();
        let elapsed = round_to_seconds(started.elapsed());
        diagnostics.line(&format!(
            "Waiting for build {build_id}... ({state}, {} elapsed)",
            humantime::format_duration(elapsed)
        ));
        tracing::debug!(build_id, %state, ?elapsed, "polled build processing state");
        match state {
            ProcessingState::Valid => Ok(Some(build)),
            ProcessingState::Failed => Err(Error::processing_failed(build_id, state.as_str())),
            ProcessingState::Invalid if fail_on_invalid => {
                Err(Error::processing_failed(build_id, state.as_str()))
            }
            ProcessingState::Invalid => Ok(Some(build)),
            _ => Ok(None),
        }
    })
    .await
}

fn round_to_seconds(d: Duration) -> Duration {
    Duration::from_secs(d.as_secs_f64().round() as u64)
}
