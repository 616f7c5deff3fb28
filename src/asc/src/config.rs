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

//! Client configuration.

use crate::diagnostics::{Diagnostics, Stderr};
use gax::backoff::{BackoffPolicy, ExponentialBackoff};
use gax::error::Error;
use gax::retry_policy::{AppStoreConnectPolicy, RetryPolicy, RetryPolicyExt};
use std::sync::Arc;
use std::time::Duration;

/// The default App Store Connect endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.appstoreconnect.apple.com";

/// The default timeout for each REST request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The default timeout for each upload operation and for the commit.
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// The default limit on the size of response bodies.
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// The default number of attempts for retryable requests.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

pub(crate) const ENV_TIMEOUT: &str = "ASC_TIMEOUT";
pub(crate) const ENV_UPLOAD_TIMEOUT: &str = "ASC_UPLOAD_TIMEOUT";
pub(crate) const ENV_RETRY_LOG: &str = "ASC_RETRY_LOG";

/// Configures a [Client][crate::Client].
///
/// # Example
/// ```
/// # use asc_client::ClientConfig;
/// # use std::time::Duration;
/// let config = ClientConfig::new()
///     .set_timeout(Duration::from_secs(60))
///     .set_retry_log(true);
/// assert_eq!(config.timeout(), Duration::from_secs(60));
/// ```
#[derive(Clone, Debug)]
pub struct ClientConfig {
    endpoint: String,
    user_agent: String,
    timeout: Duration,
    upload_timeout: Duration,
    max_body_bytes: usize,
    retry_policy: Arc<dyn RetryPolicy>,
    backoff_policy: Arc<dyn BackoffPolicy>,
    diagnostics: Arc<dyn Diagnostics>,
    retry_log: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user_agent: format!("asc-client/{}", env!("CARGO_PKG_VERSION")),
            timeout: DEFAULT_TIMEOUT,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            retry_policy: Arc::new(AppStoreConnectPolicy.with_attempt_limit(DEFAULT_MAX_ATTEMPTS)),
            backoff_policy: Arc::new(ExponentialBackoff::default()),
            diagnostics: Arc::new(Stderr),
            retry_log: false,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with the defaults, overridden by the
    /// environment.
    ///
    /// Reads `ASC_TIMEOUT` and `ASC_UPLOAD_TIMEOUT` (durations such as `90s`
    /// or `10m`) and `ASC_RETRY_LOG` (`1`, `true`, `yes` or `on`). Unset or
    /// empty variables keep the defaults.
    pub fn from_env() -> gax::Result<Self> {
        let mut config = Self::default();
        if let Some(timeout) = env_duration(ENV_TIMEOUT)? {
            config.timeout = timeout;
        }
        if let Some(timeout) = env_duration(ENV_UPLOAD_TIMEOUT)? {
            config.upload_timeout = timeout;
        }
        if let Some(value) = env_value(ENV_RETRY_LOG) {
            config.retry_log = is_truthy(&value);
        }
        Ok(config)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn upload_timeout(&self) -> Duration {
        self.upload_timeout
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn retry_log(&self) -> bool {
        self.retry_log
    }

    pub(crate) fn retry_policy(&self) -> &dyn RetryPolicy {
        self.retry_policy.as_ref()
    }

    pub(crate) fn backoff_policy(&self) -> &dyn BackoffPolicy {
        self.backoff_policy.as_ref()
    }

    pub fn diagnostics(&self) -> Arc<dyn Diagnostics> {
        self.diagnostics.clone()
    }

    /// Sets the service endpoint, e.g. a local test server.
    pub fn set_endpoint<T: Into<String>>(mut self, v: T) -> Self {
        self.endpoint = v.into().trim_end_matches('/').to_string();
        self
    }

    pub fn set_user_agent<T: Into<String>>(mut self, v: T) -> Self {
        self.user_agent = v.into();
        self
    }

    /// Sets the timeout for each REST request attempt.
    pub fn set_timeout(mut self, v: Duration) -> Self {
        self.timeout = v;
        self
    }

    /// Sets the timeout for each upload operation and for the commit.
    pub fn set_upload_timeout(mut self, v: Duration) -> Self {
        self.upload_timeout = v;
        self
    }

    /// Sets the largest response body the client accepts.
    pub fn set_max_body_bytes(mut self, v: usize) -> Self {
        self.max_body_bytes = v;
        self
    }

    pub fn set_retry_policy<P: RetryPolicy + 'static>(mut self, v: P) -> Self {
        self.retry_policy = Arc::new(v);
        self
    }

    pub fn set_backoff_policy<B: BackoffPolicy + 'static>(mut self, v: B) -> Self {
        self.backoff_policy = Arc::new(v);
        self
    }

    pub fn set_diagnostics<D: Diagnostics + 'static>(mut self, v: D) -> Self {
        self.diagnostics = Arc::new(v);
        self
    }

    /// If enabled, each transport retry writes a line to the diagnostic sink.
    pub fn set_retry_log(mut self, v: bool) -> Self {
        self.retry_log = v;
        self
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_duration(name: &str) -> gax::Result<Option<Duration>> {
    let Some(value) = env_value(name) else {
        return Ok(None);
    };
    let duration = humantime::parse_duration(&value)
        .map_err(|e| Error::usage(format!("invalid {name} value {value:?}: {e}")))?;
    if duration.is_zero() {
        return Err(Error::usage(format!(
            "invalid {name} value {value:?}: must be greater than zero"
        )));
    }
    Ok(Some(duration))
}

/// Returns true for the usual spellings of an enabled flag.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Returns true for the usual spellings of a disabled flag.
pub fn is_falsy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
