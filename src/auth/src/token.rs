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


//! Signed bearer tokens and their cache.
//!
//! Signing is cheap but not free, and App Store Connect tokens live for
//! minutes. [TokenCache] keeps the last token and only asks the provider for
//! a new one when the cached token expires within [REFRESH_SKEW].

use crate::Result;
use std::time::Duration;
use tokio::sync::Mutex;
// tokio's clock can be paused and advanced in tests.
use tokio::time::Instant;

/// Tokens are replaced this long before they expire.
pub(crate) const REFRESH_SKEW: Duration = Duration::from_secs(60);

/// A signed JWT and the instant it stops being valid.
#[derive(Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) value: String,
    pub(crate) expires_at: Instant,
}

impl Token {
    fn is_fresh(&self, now: Instant) -> bool {
        now + REFRESH_SKEW < self.expires_at
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &"[censored]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[async_trait::async_trait]
pub(crate) trait TokenProvider: std::fmt::Debug + Send + Sync {
    async fn token(&self) -> Result<Token>;
}

/// Reuses the tokens of `inner` until they are about to expire.
///
/// Concurrent callers that find no fresh token wait on the same lock, so
/// only one of them signs. Failures are not cached: the next call tries
/// again.
#[derive(Debug)]
pub(crate) struct TokenCache<T> {
    inner: T,
    current: Mutex<Option<Token>>,
}

impl<T: TokenProvider> TokenCache<T> {
    pub(crate) fn new(inner: T) -> Self {
        Self {
            inner,
            current: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl<T: TokenProvider> TokenProvider for TokenCache<T> {
    async fn token(&self) -> Result<Token> {
        let mut current = self.current.lock().await;
        if let Some(token) = current.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.clone());
        }
        let token = self.inner.token().await?;
        *current = Some(token.clone());
        Ok(token)
    }
}
