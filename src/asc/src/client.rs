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

//! The HTTP transport.
//!
//! [Client::execute] performs one logical request: it assembles the URL,
//! attaches the credentials, retries according to the configured policies,
//! maps failures to [Error] values and decodes the response body.

use crate::config::ClientConfig;
use crate::envelope::Page;
use auth::credentials::Credentials;
use bytes::{Bytes, BytesMut};
use gax::Result;
use gax::error::Error;
use gax::retry_loop::retry_loop;
use http::header::{ACCEPT, USER_AGENT};
use http::{HeaderMap, Method, StatusCode};
use reqwest::Url;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Describes one REST operation.
///
/// The path is either relative to the configured endpoint (`/v1/builds`) or
/// an absolute URL, as returned in `links.next`, which is used verbatim.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    timeout: Option<Duration>,
    max_body_bytes: Option<usize>,
    idempotent: Option<bool>,
}

impl Request {
    pub fn new<P: Into<String>>(method: Method, path: P) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout: None,
            max_body_bytes: None,
            idempotent: None,
        }
    }

    pub fn get<P: Into<String>>(path: P) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post<P: Into<String>>(path: P) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch<P: Into<String>>(path: P) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete<P: Into<String>>(path: P) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Adds a query parameter.
    pub fn with_query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Adds a query parameter whose value is a comma separated list. Empty
    /// lists are skipped.
    pub fn with_query_list<K, I, V>(self, key: K, values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = V>,
        V: AsRef<str>,
    {
        let joined = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        if joined.is_empty() {
            return self;
        }
        self.with_query(key, joined)
    }

    /// Sets the JSON body.
    pub fn with_body<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body).map_err(Error::ser)?);
        Ok(self)
    }

    /// Overrides the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the response body ceiling.
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = Some(limit);
        self
    }

    /// Overrides the idempotency inferred from the method.
    pub fn with_idempotency(mut self, idempotent: bool) -> Self {
        self.idempotent = Some(idempotent);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// `GET` and `HEAD` are idempotent unless overridden.
    pub fn is_idempotent(&self) -> bool {
        self.idempotent
            .unwrap_or_else(|| matches!(self.method, Method::GET | Method::HEAD))
    }
}

/// A decoded response.
#[derive(Clone, Debug)]
pub struct Response<T> {
    status: StatusCode,
    headers: HeaderMap,
    body: T,
}

impl<T> Response<T> {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &T {
        &self.body
    }

    pub fn into_body(self) -> T {
        self.body
    }
}

/// A client for the App Store Connect REST API.
///
/// # Example
/// ```no_run
/// # use asc_client::{Client, ClientConfig, Request};
/// # use asc_client::envelope::Page;
/// # use tokio_util::sync::CancellationToken;
/// # async fn sample() -> anyhow::Result<()> {
/// let credentials = auth::credentials::api_key::Builder::new("KEY_ID", "ISSUER_ID")
///     .with_private_key_file("AuthKey_KEY_ID.p8")
///     .build()?;
/// let client = Client::new(ClientConfig::from_env()?, credentials)?;
/// let cancel = CancellationToken::new();
/// let apps: Page = client
///     .paginate_all(&cancel, Request::get("/v1/apps").with_query("limit", "200"))
///     .await?;
/// println!("{} apps", apps.data.len());
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    http: reqwest::Client,
    credentials: Credentials,
    config: Arc<ClientConfig>,
}

impl Client {
    pub fn new(config: ClientConfig, credentials: Credentials) -> Result<Self> {
        let http = reqwest::Client::builder().build().map_err(Error::io)?;
        Ok(Self {
            http,
            credentials,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Executes `request`, retrying as configured, and decodes the body.
    ///
    /// An empty body decodes as JSON `null`, so `()`, `Option<T>` and
    /// `serde_json::Value` accept `204 No Content` responses.
    pub async fn execute<O: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        request: Request,
    ) -> Result<Response<O>> {
        let url = self.resolve_url(&request.path)?;
        let idempotent = request.is_idempotent();
        let attempt_timeout = request.timeout.unwrap_or(self.config.timeout());
        let diagnostics = self.config.diagnostics();
        let retry_log = self.config.retry_log();

        let inner = async || self.attempt::<O>(&request, &url, attempt_timeout).await;
        let sleep = async |d| tokio::time::sleep(d).await;
        let on_retry = |attempt: u32, error: &Error, delay: Duration| {
            let delay = Duration::from_millis(delay.as_millis() as u64);
            tracing::debug!(method = %request.method, %url, attempt, ?delay, %error, "retrying request");
            if retry_log {
                diagnostics.line(&format!(
                    "retrying {} {url} after {} (attempt {attempt}): {error}",
                    request.method,
                    humantime::format_duration(delay)
                ));
            }
        };
        let call = retry_loop(
            inner,
            sleep,
            idempotent,
            self.config.retry_policy(),
            self.config.backoff_policy(),
            on_retry,
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::cancelled()),
            response = call => response,
        }
    }

    /// Executes `request`, then follows `links.next` until the chain ends.
    pub async fn paginate_all<A: DeserializeOwned + Default>(
        &self,
        cancel: &CancellationToken,
        request: Request,
    ) -> Result<Page<A>> {
        let first = self.execute::<Page<A>>(cancel, request).await?.into_body();
        crate::pagination::paginate_all(cancel, first, async |next: String| {
            self.fetch_page::<A>(cancel, next).await
        })
        .await
    }

    /// Executes `request`, then visits each page without retaining them.
    pub async fn paginate_each<A, V>(
        &self,
        cancel: &CancellationToken,
        request: Request,
        visit: V,
    ) -> Result<()>
    where
        A: DeserializeOwned + Default,
        V: FnMut(Page<A>) -> Result<()>,
    {
        let first = self.execute::<Page<A>>(cancel, request).await?.into_body();
        crate::pagination::paginate_each(
            cancel,
            first,
            async |next: String| self.fetch_page::<A>(cancel, next).await,
            visit,
        )
        .await
    }

    async fn fetch_page<A: DeserializeOwned + Default>(
        &self,
        cancel: &CancellationToken,
        next: String,
    ) -> Result<Page<A>> {
        Ok(self
            .execute::<Page<A>>(cancel, Request::get(next))
            .await?
            .into_body())
    }

    pub(crate) fn resolve_url(&self, path: &str) -> Result<Url> {
        let full = if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{path}", self.config.endpoint())
        } else {
            format!("{}/{path}", self.config.endpoint())
        };
        Url::parse(&full).map_err(|e| Error::usage(format!("invalid request URL {full:?}: {e}")))
    }

    async fn attempt<O: DeserializeOwned>(
        &self,
        request: &Request,
        url: &Url,
        timeout: Duration,
    ) -> Result<Response<O>> {
        let mut builder = self
            .http
            .request(request.method.clone(), url.clone())
            .timeout(timeout)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, self.config.user_agent());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let auth_headers = self
            .credentials
            .headers()
            .await
            .map_err(Error::authentication)?;
        builder = builder.headers(auth_headers);

        tracing::debug!(method = %request.method, %url, "sending request");
        let response = builder.send().await.map_err(map_send_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let limit = request
            .max_body_bytes
            .unwrap_or(self.config.max_body_bytes());
        let body = read_body(response, limit).await?;
        if !status.is_success() {
            return Err(Error::http(status.as_u16(), headers, body));
        }
        let body = decode::<O>(&body)?;
        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

pub(crate) fn map_send_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::timeout(e)
    } else {
        Error::io(e)
    }
}

async fn read_body(mut response: reqwest::Response, limit: usize) -> Result<Bytes> {
    if response.content_length().is_some_and(|n| n > limit as u64) {
        return Err(body_too_large(limit));
    }
    let mut buffer = BytesMut::new();
    while let Some(chunk) = response.chunk().await.map_err(map_send_error)? {
        if buffer.len() + chunk.len() > limit {
            return Err(body_too_large(limit));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}

fn body_too_large(limit: usize) -> Error {
    Error::deser(format!("response body exceeds the limit of {limit} bytes"))
}

fn decode<O: DeserializeOwned>(body: &[u8]) -> Result<O> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_slice(b"null").map_err(Error::deser);
    }
    serde_json::from_slice(body).map_err(Error::deser)
}
