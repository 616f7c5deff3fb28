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

//! Apple ID web sign-in.
//!
//! Some App Store Connect operations, notably creating apps, are only
//! available to web sessions. A web session is a set of cookies obtained
//! through the same sign-in flow the browser uses:
//!
//! 1. Fetch the widget key from the web app configuration.
//! 2. Run an SRP-6a handshake against the identity service
//!    (`signin/init`, `signin/complete`), with a hashcash stamp.
//! 3. If the account requires it, complete the two-factor authentication
//!    with a code from a trusted device or phone.
//!
//! # Example
//! ```no_run
//! # use asc_iris::login::{LoginOutcome, WebAuth};
//! # async fn sample() -> anyhow::Result<()> {
//! let auth = WebAuth::new();
//! let session = match auth.login("dev@example.com", "password").await? {
//!     LoginOutcome::Authenticated(session) => session,
//!     LoginOutcome::TwoFactorRequired(mut session, _) => {
//!         session.submit_two_factor_code("123456").await?;
//!         session
//!     }
//! };
//! println!("signed in to provider {:?}", session.provider_id);
//! # Ok(()) }
//! ```

use crate::cookies::CookieJar;
use crate::errors::{Error, Result};
use crate::hashcash;
use crate::srp::{Handshake, derive_password, prepare_password};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::OnceCell;
use url::Url;

/// The timeout for each request of the web session.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const WIDGET_KEY: &str = "x-apple-widget-key";
const SESSION_ID: &str = "x-apple-id-session-id";
const SCNT: &str = "scnt";
const REQUESTED_WITH: &str = "x-requested-with";
const JSON_ACCEPT: &str = "application/json, text/javascript";
const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// The hosts used by the web session.
#[derive(Clone, Debug, PartialEq)]
pub struct Endpoints {
    auth_service: String,
    app_store: String,
    sign_in: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_service: "https://idmsa.apple.com/appleauth/auth".to_string(),
            app_store: "https://appstoreconnect.apple.com".to_string(),
            sign_in: "https://gsa.apple.com".to_string(),
        }
    }
}

impl Endpoints {
    /// The identity service, e.g. `https://idmsa.apple.com/appleauth/auth`.
    pub fn with_auth_service<T: Into<String>>(mut self, v: T) -> Self {
        self.auth_service = trim_slash(v.into());
        self
    }

    /// The web app, e.g. `https://appstoreconnect.apple.com`.
    pub fn with_app_store<T: Into<String>>(mut self, v: T) -> Self {
        self.app_store = trim_slash(v.into());
        self
    }

    pub fn with_sign_in<T: Into<String>>(mut self, v: T) -> Self {
        self.sign_in = trim_slash(v.into());
        self
    }

    pub fn app_store(&self) -> &str {
        &self.app_store
    }

    pub(crate) fn auth(&self, path: &str) -> String {
        format!("{}{path}", self.auth_service)
    }

    pub(crate) fn service_key_url(&self) -> String {
        format!(
            "{}/olympus/v1/app/config?hostname=itunesconnect.apple.com",
            self.app_store
        )
    }

    pub(crate) fn session_url(&self) -> String {
        format!("{}/olympus/v1/session", self.app_store)
    }

    pub(crate) fn iris(&self, path: &str) -> String {
        format!("{}/iris/v1{path}", self.app_store)
    }

    /// The roots whose cookies make up a persisted session.
    pub fn cookie_urls(&self) -> Vec<Url> {
        let mut urls: Vec<Url> = Vec::new();
        for base in [&self.app_store, &self.auth_service, &self.sign_in] {
            let Ok(mut url) = Url::parse(base) else {
                continue;
            };
            url.set_path("/");
            url.set_query(None);
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        urls
    }
}

fn trim_slash(v: String) -> String {
    v.trim_end_matches('/').to_string()
}

/// The result of [WebAuth::login].
#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated(Session),
    /// The password was accepted, the account requires a second factor.
    ///
    /// Continue with [Session::submit_two_factor_code].
    TwoFactorRequired(Session, TwoFactorRequired),
}

/// The continuation state for two-factor authentication.
///
/// Neither field appears in the `Display` or `Debug` output.
#[derive(Clone, PartialEq)]
pub struct TwoFactorRequired {
    pub session_id: String,
    pub scnt: String,
}

impl std::fmt::Display for TwoFactorRequired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("2FA required")
    }
}

impl std::fmt::Debug for TwoFactorRequired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoFactorRequired")
            .field("session_id", &"[censored]")
            .field("scnt", &"[censored]")
            .finish()
    }
}

/// Signs in to Apple ID web sessions.
///
/// The widget key is fetched once and shared by every login through the
/// same `WebAuth`.
#[derive(Debug, Default)]
pub struct WebAuth {
    endpoints: Arc<Endpoints>,
    service_key: OnceCell<String>,
}

impl WebAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoints(endpoints: Endpoints) -> Self {
        Self {
            endpoints: Arc::new(endpoints),
            service_key: OnceCell::new(),
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Signs in with an Apple ID and password.
    pub async fn login(&self, account: &str, password: &str) -> Result<LoginOutcome> {
        let account = account.trim();
        if account.is_empty() || password.is_empty() {
            return Err(Error::usage("account name and password are required"));
        }
        let mut session = Session::new(self.endpoints.clone(), Arc::new(CookieJar::new()), account)?;
        let service_key = self.service_key(&session.http).await?;
        session.service_key = Some(service_key.clone());

        match self.sign_in(&session, &service_key, account, password).await? {
            SignIn::Complete => {
                session.refresh_info().await?;
                tracing::info!(provider_id = ?session.provider_id, "signed in");
                Ok(LoginOutcome::Authenticated(session))
            }
            SignIn::TwoFactor(state) => {
                session.apple_id_session_id = Some(state.session_id.clone());
                session.scnt = Some(state.scnt.clone());
                session.user_email = Some(account.to_string());
                tracing::info!("sign-in requires two-factor authentication");
                Ok(LoginOutcome::TwoFactorRequired(session, state))
            }
        }
    }

    async fn service_key(&self, http: &reqwest::Client) -> Result<String> {
        let endpoints = &self.endpoints;
        self.service_key
            .get_or_try_init(|| async move {
                let response = http.get(endpoints.service_key_url()).send().await;
                let (status, _, body) = read(response).await?;
                if status != StatusCode::OK {
                    return Err(Error::status_error("auth service key request", status.as_u16(), &body));
                }
                #[derive(Deserialize)]
                #[serde(rename_all = "camelCase")]
                struct Config {
                    #[serde(default)]
                    auth_service_key: String,
                    #[serde(default)]
                    service_key: String,
                }
                let config = serde_json::from_slice::<Config>(&body)
                    .map_err(|e| Error::decode("auth service key", e))?;
                [config.auth_service_key, config.service_key]
                    .into_iter()
                    .map(|k| k.trim().to_string())
                    .find(|k| !k.is_empty())
                    .ok_or_else(|| Error::usage("auth service key is empty"))
            })
            .await
            .cloned()
    }

    async fn sign_in(
        &self,
        session: &Session,
        service_key: &str,
        account: &str,
        password: &str,
    ) -> Result<SignIn> {
        let handshake = Handshake::new();
        let init = self.sign_in_init(session, service_key, account, &handshake).await?;
        let salt = STANDARD
            .decode(init.salt.trim())
            .map_err(|_| Error::srp("invalid salt encoding"))?;
        let server_public = STANDARD
            .decode(init.b.trim())
            .map_err(|_| Error::srp("invalid server public value encoding"))?;
        let proofs = {
            let prepared = prepare_password(password, &init.protocol)?;
            let derived = derive_password(&prepared, &salt, init.iteration)?;
            handshake.proofs(account, &salt, &server_public, derived.as_slice())?
        };
        drop(handshake);

        let stamp = self.hashcash(session, service_key).await?;
        let response = session
            .http
            .post(self.endpoints.auth("/signin/complete"))
            .query(&[("isRememberMeEnabled", "false")])
            .headers(widget_headers(service_key)?)
            .header(hashcash::STAMP_HEADER, stamp)
            .json(&json!({
                "accountName": account,
                "rememberMe": false,
                "m1": proofs.m1,
                "m2": proofs.m2,
                "c": init.c,
            }))
            .send()
            .await;
        let (status, headers, body) = read(response).await?;
        match status {
            StatusCode::OK => Ok(SignIn::Complete),
            StatusCode::CONFLICT => Ok(SignIn::TwoFactor(TwoFactorRequired {
                session_id: header_string(&headers, SESSION_ID),
                scnt: header_string(&headers, SCNT),
            })),
            _ => Err(Error::status_error("signin complete", status.as_u16(), &body)),
        }
    }

    async fn sign_in_init(
        &self,
        session: &Session,
        service_key: &str,
        account: &str,
        handshake: &Handshake,
    ) -> Result<InitResponse> {
        let response = session
            .http
            .post(self.endpoints.auth("/signin/init"))
            .headers(widget_headers(service_key)?)
            .json(&json!({
                "accountName": account,
                "protocols": ["s2k", "s2k_fo"],
                "a": handshake.public_base64(),
            }))
            .send()
            .await;
        let (status, _, body) = read(response).await?;
        if status != StatusCode::OK {
            return Err(Error::status_error("signin init", status.as_u16(), &body));
        }
        serde_json::from_slice(&body).map_err(|e| Error::decode("signin init", e))
    }

    async fn hashcash(&self, session: &Session, service_key: &str) -> Result<String> {
        let response = session
            .http
            .get(self.endpoints.auth("/signin"))
            .query(&[("widgetKey", service_key)])
            .header(ACCEPT, HTML_ACCEPT)
            .send()
            .await;
        let (status, headers, body) = read(response).await?;
        if status != StatusCode::OK {
            return Err(Error::status_error("hashcash challenge", status.as_u16(), &body));
        }
        let now = OffsetDateTime::now_utc();
        tokio::task::spawn_blocking(move || hashcash::from_headers(&headers, now))
            .await
            .map_err(|e| Error::hashcash(format!("the stamp computation did not complete: {e}")))?
    }
}

enum SignIn {
    Complete,
    TwoFactor(TwoFactorRequired),
}

#[derive(Deserialize)]
struct InitResponse {
    iteration: u32,
    salt: String,
    protocol: String,
    b: String,
    c: String,
}

/// An Apple ID web session.
///
/// Requests sent through the session carry its cookies. The session may be
/// partial: after a [LoginOutcome::TwoFactorRequired] it only becomes usable
/// once [Session::submit_two_factor_code] succeeds.
pub struct Session {
    http: reqwest::Client,
    jar: Arc<CookieJar>,
    endpoints: Arc<Endpoints>,
    /// The Apple ID used to sign in, keys the session cache.
    pub account: String,
    pub provider_id: Option<i64>,
    pub team_id: Option<String>,
    pub provider_name: Option<String>,
    pub user_email: Option<String>,
    service_key: Option<String>,
    apple_id_session_id: Option<String>,
    scnt: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("account", &self.account)
            .field("provider_id", &self.provider_id)
            .field("team_id", &self.team_id)
            .field("provider_name", &self.provider_name)
            .field("user_email", &self.user_email)
            .field("endpoints", &self.endpoints)
            .field(
                "two_factor_pending",
                &(self.apple_id_session_id.is_some() && self.scnt.is_some()),
            )
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(endpoints: Arc<Endpoints>, jar: Arc<CookieJar>, account: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(Error::transport)?;
        Ok(Self {
            http,
            jar,
            endpoints,
            account: account.trim().to_string(),
            provider_id: None,
            team_id: None,
            provider_name: None,
            user_email: None,
            service_key: None,
            apple_id_session_id: None,
            scnt: None,
        })
    }

    pub fn cookie_jar(&self) -> &Arc<CookieJar> {
        &self.jar
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Completes a two-factor authentication with a six digit `code`.
    ///
    /// The code is first submitted as a trusted device code, even when the
    /// account lists no trusted devices. If that fails and the account has
    /// trusted phone numbers, it is submitted for the first phone number.
    pub async fn submit_two_factor_code(&mut self, code: &str) -> Result<()> {
        let code = code.trim();
        if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_code());
        }
        let headers = self.continuation_headers()?;
        let options = self.auth_options(&headers).await?;

        let device = self
            .verify(
                "trusted-device",
                "/verify/trusteddevice/securitycode",
                &headers,
                json!({"securityCode": {"code": code}}),
            )
            .await;
        if let Err(e) = device {
            let Some(phone) = options.trusted_phone_numbers.first() else {
                return Err(e);
            };
            tracing::debug!("trusted device code rejected, trying the phone number");
            let mode = Some(phone.push_mode.trim())
                .filter(|m| !m.is_empty())
                .unwrap_or("sms");
            self.verify(
                "phone",
                "/verify/phone/securitycode",
                &headers,
                json!({
                    "securityCode": {"code": code},
                    "phoneNumber": {"id": phone.id},
                    "mode": mode,
                }),
            )
            .await?;
        }
        self.finalize_two_factor(&headers).await
    }

    fn continuation_headers(&self) -> Result<HeaderMap> {
        let value = |v: &Option<String>| {
            v.as_deref()
                .filter(|v| !v.trim().is_empty())
                .and_then(|v| HeaderValue::from_str(v.trim()).ok())
        };
        let (Some(key), Some(id), Some(scnt)) = (
            value(&self.service_key),
            value(&self.apple_id_session_id),
            value(&self.scnt),
        ) else {
            return Err(Error::missing_continuation());
        };
        let mut headers = HeaderMap::new();
        headers.insert(WIDGET_KEY, key);
        headers.insert(SESSION_ID, id);
        headers.insert(SCNT, scnt);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn auth_options(&self, headers: &HeaderMap) -> Result<AuthOptions> {
        let response = self
            .http
            .get(self.endpoints.auth(""))
            .headers(headers.clone())
            .send()
            .await;
        let (status, _, body) = read(response).await?;
        if !status.is_success() {
            return Err(Error::status_error("auth options", status.as_u16(), &body));
        }
        serde_json::from_slice(&body).map_err(|e| Error::decode("auth options", e))
    }

    async fn verify(
        &self,
        method: &'static str,
        path: &str,
        headers: &HeaderMap,
        body: serde_json::Value,
    ) -> Result<()> {
        let response = self
            .http
            .post(self.endpoints.auth(path))
            .headers(headers.clone())
            .json(&body)
            .send()
            .await;
        let (status, _, body) = read(response).await?;
        if status.is_success() {
            return Ok(());
        }
        Err(Error::two_factor(method, status.as_u16(), &body))
    }

    async fn finalize_two_factor(&mut self, headers: &HeaderMap) -> Result<()> {
        let response = self
            .http
            .get(self.endpoints.auth("/2sv/trust"))
            .headers(headers.clone())
            .send()
            .await;
        let (status, _, body) = read(response).await?;
        if !status.is_success() {
            return Err(Error::status_error("2FA trust", status.as_u16(), &body));
        }
        self.refresh_info().await?;
        self.apple_id_session_id = None;
        self.scnt = None;
        tracing::info!(provider_id = ?self.provider_id, "two-factor authentication complete");
        Ok(())
    }

    /// Reads the provider and user of the session.
    ///
    /// Fails if the session is not authenticated.
    pub async fn refresh_info(&mut self) -> Result<()> {
        let response = self
            .http
            .get(self.endpoints.session_url())
            .header(ACCEPT, "application/json")
            .send()
            .await;
        let (status, _, body) = read(response).await?;
        if status != StatusCode::OK {
            return Err(Error::status_error("session info", status.as_u16(), &body));
        }
        let info = serde_json::from_slice::<SessionInfo>(&body)
            .map_err(|e| Error::decode("session info", e))?;
        self.provider_id = Some(info.provider.provider_id);
        self.team_id = Some(info.provider.provider_id.to_string());
        self.provider_name = Some(info.provider.name).filter(|n| !n.is_empty());
        self.user_email = Some(info.user.email_address).filter(|e| !e.is_empty());
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthOptions {
    #[serde(default)]
    trusted_phone_numbers: Vec<TrustedPhoneNumber>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrustedPhoneNumber {
    id: i64,
    #[serde(default)]
    push_mode: String,
}

#[derive(Debug, Deserialize)]
struct SessionInfo {
    provider: Provider,
    #[serde(default)]
    user: User,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Provider {
    provider_id: i64,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct User {
    #[serde(default)]
    email_address: String,
}

fn widget_headers(service_key: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        WIDGET_KEY,
        HeaderValue::from_str(service_key)
            .map_err(|_| Error::usage("the auth service key is not a valid header value"))?,
    );
    headers.insert(REQUESTED_WITH, HeaderValue::from_static("XMLHttpRequest"));
    headers.insert(ACCEPT, HeaderValue::from_static(JSON_ACCEPT));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

fn header_string(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .trim()
        .to_string()
}

pub(crate) async fn read(
    response: reqwest::Result<reqwest::Response>,
) -> Result<(StatusCode, HeaderMap, Bytes)> {
    let response = response.map_err(Error::transport)?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await.map_err(Error::transport)?;
    Ok((status, headers, body))
}
