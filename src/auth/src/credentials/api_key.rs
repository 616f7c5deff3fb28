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

//! [API key] credentials.
//!
//! App Store Connect API keys consist of a key id, an issuer id and a
//! PKCS#8 P-256 private key (the `.p8` file downloaded from App Store
//! Connect). The client never sends the private key. It signs short-lived
//! JSON Web Tokens with the key (ES256) and sends them as bearer tokens.
//!
//! Tokens are cached and reused until shortly before they expire.
//!
//! # Example
//! ```no_run
//! # use asc_auth::credentials::api_key::Builder;
//! # async fn sample() -> anyhow::Result<()> {
//! let credentials = Builder::new("ABC123DEFG", "69a6de70-03db-47e3-e053-5b8c7c11a4d1")
//!     .with_private_key_file("AuthKey_ABC123DEFG.p8")
//!     .build()?;
//! let headers = credentials.headers().await?;
//! println!("Headers: {headers:?}");
//! # Ok(()) }
//! ```
//!
//! [API key]: https://developer.apple.com/documentation/appstoreconnectapi/creating-api-keys-for-app-store-connect-api

use crate::Result;
use crate::build_errors::{BuildResult, Error as BuilderError};
use crate::credentials::dynamic::CredentialsProvider;
use crate::credentials::jws::{AUDIENCE, JwsClaims, JwsHeader};
use crate::credentials::Credentials;
use crate::errors::{CredentialsError, CredentialsErrorKind};
use crate::token::{Token, TokenCache, TokenProvider};
use http::header::{AUTHORIZATION, HeaderValue};
use http::HeaderMap;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::DecodePrivateKey;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::Instant;

/// The default lifetime of the tokens.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(10 * 60);

/// App Store Connect rejects tokens that live longer than this.
pub const MAX_LIFETIME: Duration = Duration::from_secs(20 * 60);

const ALGORITHM: &str = "ES256";

#[derive(Debug)]
enum KeySource {
    Pem(String),
    File(PathBuf),
}

/// A builder for constructing API key [Credentials].
#[derive(Debug)]
pub struct Builder {
    key_id: String,
    issuer_id: String,
    key: Option<KeySource>,
    lifetime: Duration,
    scopes: Option<Vec<String>>,
}

impl Builder {
    /// Creates a new builder for the given key id and issuer id.
    pub fn new<K: Into<String>, I: Into<String>>(key_id: K, issuer_id: I) -> Self {
        Self {
            key_id: key_id.into(),
            issuer_id: issuer_id.into(),
            key: None,
            lifetime: DEFAULT_LIFETIME,
            scopes: None,
        }
    }

    /// Uses the PEM-encoded PKCS#8 private key in `pem`.
    pub fn with_private_key_pem<S: Into<String>>(mut self, pem: S) -> Self {
        self.key = Some(KeySource::Pem(pem.into()));
        self
    }

    /// Loads the private key from a `.p8` file when [build][Builder::build]
    /// is called.
    pub fn with_private_key_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.key = Some(KeySource::File(path.into()));
        self
    }

    /// Sets the lifetime of each token. Must be greater than zero and at
    /// most 20 minutes.
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Restricts the tokens to the given scopes, e.g. `GET /v1/apps`.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    /// Returns a [Credentials] instance with the configured settings.
    ///
    /// # Errors
    ///
    /// Returns a [BuilderError] if the key id or issuer id are empty, if no
    /// key was configured, if the key file cannot be read, if the key is not
    /// a PKCS#8 P-256 private key, or if the lifetime is out of range.
    pub fn build(self) -> BuildResult<Credentials> {
        let provider = self.build_token_provider()?;
        Ok(Credentials {
            inner: Arc::new(ApiKeyCredentials {
                token_provider: TokenCache::new(provider),
            }),
        })
    }

    fn build_token_provider(self) -> BuildResult<ApiKeyTokenProvider> {
        if self.key_id.trim().is_empty() {
            return Err(BuilderError::missing_field("key_id"));
        }
        if self.issuer_id.trim().is_empty() {
            return Err(BuilderError::missing_field("issuer_id"));
        }
        if self.lifetime.is_zero() || self.lifetime > MAX_LIFETIME {
            return Err(BuilderError::invalid_lifetime(self.lifetime));
        }
        let pem = match self.key {
            None => return Err(BuilderError::missing_key()),
            Some(KeySource::Pem(pem)) => pem,
            Some(KeySource::File(path)) => {
                std::fs::read_to_string(&path).map_err(BuilderError::loading)?
            }
        };
        if pem.trim().is_empty() {
            return Err(BuilderError::missing_key());
        }
        let signing_key =
            SigningKey::from_pkcs8_pem(pem.trim()).map_err(BuilderError::invalid_key)?;
        Ok(ApiKeyTokenProvider {
            key_id: self.key_id,
            issuer_id: self.issuer_id,
            signing_key,
            lifetime: self.lifetime,
            scopes: self.scopes,
        })
    }
}

struct ApiKeyTokenProvider {
    key_id: String,
    issuer_id: String,
    signing_key: SigningKey,
    lifetime: Duration,
    scopes: Option<Vec<String>>,
}

impl std::fmt::Debug for ApiKeyTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyTokenProvider")
            .field("key_id", &self.key_id)
            .field("issuer_id", &self.issuer_id)
            .field("signing_key", &"[censored]")
            .field("lifetime", &self.lifetime)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl ApiKeyTokenProvider {
    fn sign(&self, now: OffsetDateTime) -> Result<String> {
        let header = JwsHeader {
            alg: ALGORITHM,
            kid: &self.key_id,
            typ: "JWT",
        };
        let claims = JwsClaims {
            iss: &self.issuer_id,
            iat: now,
            exp: now + self.lifetime,
            aud: AUDIENCE,
            scope: self.scopes.as_deref(),
        };
        let message = format!("{}.{}", header.encode()?, claims.encode()?);
        let signature: Signature = self
            .signing_key
            .try_sign(message.as_bytes())
            .map_err(|e| CredentialsError::new(CredentialsErrorKind::SignError, false, e))?;
        use base64::prelude::{BASE64_URL_SAFE_NO_PAD, Engine as _};
        let signature = BASE64_URL_SAFE_NO_PAD.encode(signature.to_bytes());
        Ok(format!("{message}.{signature}"))
    }
}

#[async_trait::async_trait]
impl TokenProvider for ApiKeyTokenProvider {
    async fn token(&self) -> Result<Token> {
        let expires_at = Instant::now() + self.lifetime;
        let value = self.sign(OffsetDateTime::now_utc())?;
        tracing::debug!(key_id = %self.key_id, "signed a new App Store Connect token");
        Ok(Token { value, expires_at })
    }
}

#[derive(Debug)]
struct ApiKeyCredentials<T>
where
    T: TokenProvider,
{
    token_provider: T,
}

#[async_trait::async_trait]
impl<T> CredentialsProvider for ApiKeyCredentials<T>
where
    T: TokenProvider,
{
    async fn headers(&self) -> Result<HeaderMap> {
        let token = self.token_provider.token().await?;
        build_headers(&token)
    }
}

fn build_headers(token: &Token) -> Result<HeaderMap> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.value))
        .map_err(|e| CredentialsError::new(CredentialsErrorKind::SignError, false, e))?;
    value.set_sensitive(true);
    Ok(HeaderMap::from_iter([(AUTHORIZATION, value)]))
}
