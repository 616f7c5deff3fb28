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

//! Errors for the web session flow and the IRIS API.

use std::path::PathBuf;

/// A `Result` alias where the `Err` case is [Error].
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for web sign-in, two-factor authentication, the session
/// cache and IRIS requests.
///
/// Messages never include the account password, the session id or the
/// `scnt` token.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct Error(ErrorKind);

impl Error {
    /// The request could not be sent, or the response could not be read.
    pub fn is_transport(&self) -> bool {
        matches!(self.0, ErrorKind::Transport(_))
    }

    /// A sign-in endpoint returned an unexpected status.
    pub fn is_status(&self) -> bool {
        matches!(self.0, ErrorKind::Status { .. })
    }

    /// A response could not be decoded.
    pub fn is_decode(&self) -> bool {
        matches!(self.0, ErrorKind::Decode { .. })
    }

    /// The sign-in service offered a password protocol other than `s2k` or
    /// `s2k_fo`.
    pub fn is_unsupported_srp_protocol(&self) -> bool {
        matches!(self.0, ErrorKind::UnsupportedProtocol(_))
    }

    /// The SRP handshake parameters were invalid.
    pub fn is_srp(&self) -> bool {
        matches!(self.0, ErrorKind::Srp(_))
    }

    pub fn is_hashcash(&self) -> bool {
        matches!(self.0, ErrorKind::Hashcash(_))
    }

    /// The two-factor code is not exactly six digits.
    pub fn is_invalid_code(&self) -> bool {
        matches!(self.0, ErrorKind::InvalidCode)
    }

    /// The session cannot continue a two-factor authentication.
    pub fn is_missing_continuation(&self) -> bool {
        matches!(self.0, ErrorKind::MissingContinuation)
    }

    /// The two-factor code was rejected.
    pub fn is_two_factor_failed(&self) -> bool {
        matches!(self.0, ErrorKind::TwoFactor { .. })
    }

    /// An IRIS request returned an error status.
    pub fn is_api(&self) -> bool {
        matches!(self.0, ErrorKind::Api(_))
    }

    /// Reading or writing the session cache failed.
    pub fn is_cache(&self) -> bool {
        matches!(self.0, ErrorKind::Cache { .. } | ErrorKind::CacheFormat(_))
    }

    pub fn is_usage(&self) -> bool {
        matches!(self.0, ErrorKind::Usage(_))
    }

    /// The HTTP status code, if the error was caused by a response.
    pub fn status(&self) -> Option<u16> {
        match &self.0 {
            ErrorKind::Status { status, .. } | ErrorKind::TwoFactor { status, .. } => {
                Some(*status)
            }
            ErrorKind::Api(e) => Some(e.status),
            ErrorKind::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The service error codes reported by a rejected two-factor code.
    pub fn service_error_codes(&self) -> &[String] {
        match &self.0 {
            ErrorKind::TwoFactor { codes, .. } => codes,
            _ => &[],
        }
    }

    /// The IRIS API error, if this is one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match &self.0 {
            ErrorKind::Api(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn transport(source: reqwest::Error) -> Self {
        Self(ErrorKind::Transport(source))
    }

    pub(crate) fn status_error(operation: &'static str, status: u16, body: &[u8]) -> Self {
        Self(ErrorKind::Status {
            operation,
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        })
    }

    pub(crate) fn decode(operation: &'static str, source: serde_json::Error) -> Self {
        Self(ErrorKind::Decode { operation, source })
    }

    pub(crate) fn unsupported_protocol<T: Into<String>>(protocol: T) -> Self {
        Self(ErrorKind::UnsupportedProtocol(protocol.into()))
    }

    pub(crate) fn srp(message: &'static str) -> Self {
        Self(ErrorKind::Srp(message))
    }

    pub(crate) fn hashcash<T: Into<String>>(message: T) -> Self {
        Self(ErrorKind::Hashcash(message.into()))
    }

    pub(crate) fn invalid_code() -> Self {
        Self(ErrorKind::InvalidCode)
    }

    pub(crate) fn missing_continuation() -> Self {
        Self(ErrorKind::MissingContinuation)
    }

    pub(crate) fn two_factor(method: &'static str, status: u16, body: &[u8]) -> Self {
        Self(ErrorKind::TwoFactor {
            method,
            status,
            codes: service_error_codes(body),
            body: String::from_utf8_lossy(body).into_owned(),
        })
    }

    pub(crate) fn api(e: ApiError) -> Self {
        Self(ErrorKind::Api(e))
    }

    pub(crate) fn cache<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self(ErrorKind::Cache {
            path: path.into(),
            source,
        })
    }

    pub(crate) fn cache_format(source: serde_json::Error) -> Self {
        Self(ErrorKind::CacheFormat(source))
    }

    pub(crate) fn usage<T: Into<String>>(message: T) -> Self {
        Self(ErrorKind::Usage(message.into()))
    }
}

#[derive(thiserror::Error, Debug)]
enum ErrorKind {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("{operation} failed with status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("cannot decode the {operation} response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported SRP protocol {0:?}")]
    UnsupportedProtocol(String),
    #[error("invalid SRP parameters: {0}")]
    Srp(&'static str),
    #[error("hashcash: {0}")]
    Hashcash(String),
    #[error("2FA code must be exactly 6 digits")]
    InvalidCode,
    #[error("session is missing 2FA continuation state")]
    MissingContinuation,
    #[error("{method} 2FA failed (status {status}{})", format_codes(.codes))]
    TwoFactor {
        method: &'static str,
        status: u16,
        codes: Vec<String>,
        body: String,
    },
    #[error(transparent)]
    Api(ApiError),
    #[error("session cache {}: {source}", .path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode the session cache: {0}")]
    CacheFormat(#[source] serde_json::Error),
    #[error("{0}")]
    Usage(String),
}

fn format_codes(codes: &[String]) -> String {
    if codes.is_empty() {
        return String::new();
    }
    format!(", codes={}", codes.join(","))
}

/// Extracts the `serviceErrors[].code` values from an identity service
/// response body.
pub(crate) fn service_error_codes(body: &[u8]) -> Vec<String> {
    #[derive(serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Payload {
        #[serde(default)]
        service_errors: Vec<ServiceError>,
    }
    #[derive(serde::Deserialize)]
    struct ServiceError {
        #[serde(default)]
        code: String,
    }
    serde_json::from_slice::<Payload>(body)
        .map(|p| {
            p.service_errors
                .into_iter()
                .map(|e| e.code)
                .filter(|c| !c.trim().is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// A non-2xx response from an IRIS endpoint.
///
/// The raw body is kept, IRIS error bodies are often the only description of
/// the failure.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("API error (status {status}): {}", String::from_utf8_lossy(.body))]
pub struct ApiError {
    pub status: u16,
    pub body: bytes::Bytes,
    /// The `X-Apple-Request-Uuid` header.
    pub request_id: Option<String>,
    /// The `X-Apple-Jingle-Correlation-Key` header.
    pub correlation_key: Option<String>,
}

/// Returns true if `error` reports that the app name is already in use,
/// possibly by another account.
pub fn is_duplicate_app_name_error(error: &ApiError) -> bool {
    #[derive(serde::Deserialize)]
    struct Payload {
        errors: Vec<Item>,
    }
    #[derive(serde::Deserialize)]
    struct Item {
        #[serde(default)]
        code: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        title: String,
    }
    if error.body.is_empty() {
        return false;
    }
    let Ok(payload) = serde_json::from_slice::<Payload>(&error.body) else {
        let body = String::from_utf8_lossy(&error.body).to_lowercase();
        return body.contains("app name") && body.contains("already");
    };
    payload.errors.iter().any(|e| {
        let detail = e.detail.trim().to_lowercase();
        let title = e.title.trim().to_lowercase();
        // Observed: ENTITY_ERROR.ATTRIBUTE.INVALID.DUPLICATE.DIFFERENT_ACCOUNT
        (e.code.contains("DUPLICATE") && (detail.contains("app name") || title.contains("app name")))
            || detail.contains("app name you entered is already being used")
    })
}
