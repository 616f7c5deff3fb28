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

use super::{ApiErrorPayload, ConflictKind, CredentialsError};
use http::HeaderMap;
use std::error::Error as StdError;
use std::time::Duration;

type BoxError = Box<dyn StdError + Send + Sync>;

/// The header carrying the Apple request identifier.
pub const REQUEST_ID_HEADER: &str = "x-apple-request-uuid";
/// The header carrying the Apple correlation key.
pub const CORRELATION_KEY_HEADER: &str = "x-apple-jingle-correlation-key";

/// The core error returned by all client crates.
///
/// The client reports errors from multiple sources. For example, the service
/// may reject the request, the transport may be unable to reach the service,
/// the request may time out, the caller may have supplied conflicting
/// options, or a long running workflow (an upload, a build waiting for
/// processing) may fail.
///
/// Most applications will just return the error or log it. Applications that
/// need to interrogate the error can use the predicates, such as
/// [is_not_found][Error::is_not_found], or the machine-readable
/// [kind_name][Error::kind_name].
///
/// # Example
/// ```
/// use asc_gax::error::Error;
/// match example_function() {
///     Err(e) if e.is_not_found() => { println!("nothing to see here"); },
///     Err(e) if e.is_rate_limited() => { println!("slow down {e}"); },
///     Err(e) => { println!("some other error {e}"); },
///     Ok(_) => { println!("success, how boring"); },
/// }
///
/// fn example_function() -> Result<String, Error> {
///     // ... details omitted ...
///     # Err(Error::http(404, http::HeaderMap::new(), bytes::Bytes::from_static(b"NOT FOUND")))
/// }
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<BoxError>,
    context: Option<Context>,
}

impl Error {
    /// Creates an error representing an HTTP response with a non-2xx status.
    ///
    /// # Example
    /// ```
    /// use asc_gax::error::Error;
    /// let error = Error::http(429, http::HeaderMap::new(), bytes::Bytes::new());
    /// assert!(error.is_rate_limited());
    /// assert_eq!(error.http_status_code(), Some(429));
    /// ```
    pub fn http(status_code: u16, headers: HeaderMap, payload: bytes::Bytes) -> Self {
        let api = ApiErrorPayload::parse(&payload);
        let details = TransportDetails {
            status_code: Some(status_code),
            headers: Some(headers),
            payload: Some(payload),
            api,
        };
        Self::new(ErrorKind::Transport(Box::new(details)), None)
    }

    /// Creates an error representing a problem in the transport layer without
    /// a full HTTP response.
    ///
    /// Examples include a connection reset, a TLS handshake failure, or a
    /// broken connection while reading the response.
    pub fn io<T: Into<BoxError>>(source: T) -> Self {
        let details = TransportDetails::default();
        Self::new(ErrorKind::Transport(Box::new(details)), Some(source.into()))
    }

    /// Creates an error representing a timeout.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use asc_gax::error::Error;
    /// let error = Error::timeout("simulated timeout");
    /// assert!(error.is_timeout());
    /// assert!(error.is_transient());
    /// assert!(error.source().is_some());
    /// ```
    pub fn timeout<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Timeout, Some(source.into()))
    }

    /// Creates an error representing a deserialization problem.
    pub fn deser<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Deserialization, Some(source.into()))
    }

    /// Creates an error representing a serialization problem.
    pub fn ser<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Serialization, Some(source.into()))
    }

    /// Cannot create the authentication headers.
    pub fn authentication(source: CredentialsError) -> Self {
        Self::new(ErrorKind::Authentication, Some(source.into()))
    }

    /// Creates an error representing caller-side misuse.
    ///
    /// # Example
    /// ```
    /// use asc_gax::error::Error;
    /// let error = Error::usage("--concurrency must be at least 1");
    /// assert!(error.is_usage());
    /// assert_eq!(error.to_string(), "--concurrency must be at least 1");
    /// ```
    pub fn usage<T: Into<String>>(message: T) -> Self {
        Self::new(ErrorKind::Usage, Some(message.into().into()))
    }

    /// A build reached a failing processing state.
    pub fn processing_failed<I: Into<String>, S: Into<String>>(build_id: I, state: S) -> Self {
        let kind = ErrorKind::ProcessingFailed {
            build_id: build_id.into(),
            state: state.into(),
        };
        Self::new(kind, None)
    }

    /// No build matched the selector.
    pub fn build_not_found<T: Into<String>>(message: T) -> Self {
        Self::new(ErrorKind::BuildNotFound, Some(message.into().into()))
    }

    /// A locally computed checksum does not match the value expected by the
    /// service.
    pub fn checksum_mismatch<N, E, A>(name: N, expected: E, actual: A) -> Self
    where
        N: Into<String>,
        E: Into<String>,
        A: Into<String>,
    {
        let kind = ErrorKind::ChecksumMismatch {
            name: name.into(),
            expected: expected.into(),
            actual: actual.into(),
        };
        Self::new(kind, None)
    }

    /// The pagination driver observed the same `next` URL twice.
    pub fn repeated_pagination_url<T: Into<String>>(url: T) -> Self {
        Self::new(ErrorKind::RepeatedPaginationUrl(url.into()), None)
    }

    /// The operation was cancelled by the caller.
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, None)
    }

    /// Attaches the 1-based page index where the error was found.
    pub fn with_page(mut self, page: usize) -> Self {
        self.context = Some(Context::Page(page));
        self
    }

    /// Attaches the 0-based index of the failed upload operation.
    pub fn with_operation(mut self, index: usize) -> Self {
        self.context = Some(Context::Operation(index));
        self
    }

    fn new(kind: ErrorKind, source: Option<BoxError>) -> Self {
        Self {
            kind,
            source,
            context: None,
        }
    }

    /// The page index attached by the pagination driver, if any.
    pub fn page(&self) -> Option<usize> {
        match self.context {
            Some(Context::Page(p)) => Some(p),
            _ => None,
        }
    }

    /// The upload operation index attached by the upload engine, if any.
    pub fn operation(&self) -> Option<usize> {
        match self.context {
            Some(Context::Operation(i)) => Some(i),
            _ => None,
        }
    }

    /// The request was rejected because the credentials are missing, invalid,
    /// or do not grant access to the resource.
    ///
    /// This includes `401` and `403` responses, and failures to create the
    /// authentication headers.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.kind, ErrorKind::Authentication)
            || matches!(self.http_status_code(), Some(401 | 403))
    }

    /// Could not create the authentication headers before sending the request.
    pub fn is_authentication(&self) -> bool {
        matches!(self.kind, ErrorKind::Authentication)
    }

    /// The service returned `404 Not Found`.
    ///
    /// Several list operations translate this error into an empty response.
    pub fn is_not_found(&self) -> bool {
        self.http_status_code() == Some(404)
    }

    /// The service returned `409 Conflict`.
    pub fn is_conflict(&self) -> bool {
        self.http_status_code() == Some(409)
    }

    /// The service returned `429 Too Many Requests`.
    pub fn is_rate_limited(&self) -> bool {
        self.http_status_code() == Some(429)
    }

    /// The service returned a `5xx` status.
    pub fn is_server_error(&self) -> bool {
        matches!(self.http_status_code(), Some(500..=599))
    }

    /// The service returned a `4xx` status not covered by a more specific
    /// predicate.
    pub fn is_client_error(&self) -> bool {
        matches!(self.http_status_code(), Some(400..=499))
            && !(self.is_unauthorized()
                || self.is_not_found()
                || self.is_conflict()
                || self.is_rate_limited())
    }

    /// The request failed in the network, before a full response was
    /// received, or timed out.
    pub fn is_transient(&self) -> bool {
        self.is_io() || self.is_timeout()
    }

    /// A problem in the transport layer without a full HTTP response.
    pub fn is_io(&self) -> bool {
        matches!(&self.kind, ErrorKind::Transport(d) if d.status_code.is_none())
    }

    /// The request could not be completed before its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// The response could not be deserialized.
    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Deserialization)
    }

    /// The request could not be serialized.
    pub fn is_serialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Serialization)
    }

    /// The caller misused the API, for example, by setting conflicting
    /// options.
    pub fn is_usage(&self) -> bool {
        matches!(self.kind, ErrorKind::Usage)
    }

    /// A build reached the `FAILED` state, or the `INVALID` state when the
    /// caller treats it as a failure.
    pub fn is_processing_failed(&self) -> bool {
        matches!(self.kind, ErrorKind::ProcessingFailed { .. })
    }

    /// A locally computed checksum does not match the expected value.
    pub fn is_checksum_mismatch(&self) -> bool {
        matches!(self.kind, ErrorKind::ChecksumMismatch { .. })
    }

    /// No build matched the selector.
    pub fn is_build_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::BuildNotFound)
    }

    /// The server returned a pagination cursor that was already visited.
    pub fn is_repeated_pagination_url(&self) -> bool {
        matches!(self.kind, ErrorKind::RepeatedPaginationUrl(_))
    }

    /// The operation was cancelled by the caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// A machine-readable name for the error classification.
    ///
    /// # Example
    /// ```
    /// use asc_gax::error::Error;
    /// let error = Error::http(503, http::HeaderMap::new(), bytes::Bytes::new());
    /// assert_eq!(error.kind_name(), "server-error");
    /// ```
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ErrorKind::Transport(d) => match d.status_code {
                None => "transient",
                Some(401 | 403) => "unauthorized",
                Some(404) => "not-found",
                Some(409) => "conflict",
                Some(429) => "rate-limited",
                Some(500..=599) => "server-error",
                Some(_) => "client-error",
            },
            ErrorKind::Timeout => "transient",
            ErrorKind::Authentication => "unauthorized",
            ErrorKind::Usage => "usage",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Deserialization => "deserialization",
            ErrorKind::ProcessingFailed { .. } => "processing-failed",
            ErrorKind::ChecksumMismatch { .. } => "checksum-mismatch",
            ErrorKind::BuildNotFound => "build-not-found",
            ErrorKind::RepeatedPaginationUrl(_) => "repeated-pagination-url",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// The HTTP status code, if any, associated with this error.
    pub fn http_status_code(&self) -> Option<u16> {
        match &self.kind {
            ErrorKind::Transport(d) => d.status_code,
            _ => None,
        }
    }

    /// The headers, if any, associated with this error.
    pub fn http_headers(&self) -> Option<&HeaderMap> {
        match &self.kind {
            ErrorKind::Transport(d) => d.headers.as_ref(),
            _ => None,
        }
    }

    /// The payload, if any, associated with this error.
    pub fn http_payload(&self) -> Option<&bytes::Bytes> {
        match &self.kind {
            ErrorKind::Transport(d) => d.payload.as_ref(),
            _ => None,
        }
    }

    /// The App Store Connect error document, if the payload contained one.
    pub fn api_errors(&self) -> Option<&ApiErrorPayload> {
        match &self.kind {
            ErrorKind::Transport(d) => d.api.as_ref(),
            _ => None,
        }
    }

    /// The kind of conflict, only for `409 Conflict` errors.
    pub fn conflict_kind(&self) -> Option<ConflictKind> {
        if !self.is_conflict() {
            return None;
        }
        Some(
            self.api_errors()
                .map(ApiErrorPayload::conflict_kind)
                .unwrap_or(ConflictKind::Other(String::new())),
        )
    }

    /// The Apple request identifier, used by Apple support to find the
    /// request in their logs.
    pub fn request_id(&self) -> Option<&str> {
        self.header(REQUEST_ID_HEADER)
    }

    /// The Apple correlation key.
    pub fn correlation_key(&self) -> Option<&str> {
        self.header(CORRELATION_KEY_HEADER)
    }

    /// The delay requested by the service with a `Retry-After` header.
    ///
    /// The header may contain a number of seconds or an HTTP date. Dates in
    /// the past yield a zero delay.
    pub fn retry_after(&self) -> Option<Duration> {
        self.header(http::header::RETRY_AFTER.as_str())
            .and_then(parse_retry_after)
    }

    /// The build id and state of a processing failure.
    pub fn processing_state(&self) -> Option<(&str, &str)> {
        match &self.kind {
            ErrorKind::ProcessingFailed { build_id, state } => {
                Some((build_id.as_str(), state.as_str()))
            }
            _ => None,
        }
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.http_headers()
            .and_then(|h| h.get(name))
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// The error was generated before the request started and is transient.
    pub(crate) fn is_transient_and_before_send(&self) -> bool {
        if !matches!(&self.kind, ErrorKind::Authentication) {
            return false;
        }
        self.source
            .as_ref()
            .and_then(|e| e.downcast_ref::<CredentialsError>())
            .map(|e| e.is_retryable())
            .unwrap_or(false)
    }
}

pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let when = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let delta = when.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.context {
            Some(Context::Page(p)) => write!(f, "page {p}: ")?,
            Some(Context::Operation(i)) => write!(f, "upload operation {i}: ")?,
            None => {}
        }
        match (&self.kind, &self.source) {
            (ErrorKind::Usage, Some(e)) | (ErrorKind::BuildNotFound, Some(e)) => write!(f, "{e}"),
            (ErrorKind::Serialization, Some(e)) => write!(f, "cannot serialize the request {e}"),
            (ErrorKind::Deserialization, Some(e)) => {
                write!(f, "cannot deserialize the response {e}")
            }
            (ErrorKind::Authentication, Some(e)) => {
                write!(f, "cannot create the authentication headers {e}")
            }
            (ErrorKind::Timeout, Some(e)) => {
                write!(f, "the request exceeded the request deadline {e}")
            }
            (ErrorKind::Transport(details), source) => details.display(source.as_deref(), f),
            (ErrorKind::ProcessingFailed { build_id, state }, _) => {
                write!(f, "build {build_id} processing failed with state {state}")
            }
            (
                ErrorKind::ChecksumMismatch {
                    name,
                    expected,
                    actual,
                },
                _,
            ) => write!(
                f,
                "{name} checksum mismatch: expected {expected}, computed {actual}"
            ),
            (ErrorKind::RepeatedPaginationUrl(url), _) => {
                write!(f, "detected repeated pagination URL: {url}")
            }
            (ErrorKind::Cancelled, _) => write!(f, "the operation was cancelled"),
            (_, None) => unreachable!("no constructor allows this"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error))
    }
}

/// The type of error held by an [Error] instance.
#[derive(Debug)]
enum ErrorKind {
    Usage,
    Serialization,
    Deserialization,
    Authentication,
    Timeout,
    Cancelled,
    Transport(Box<TransportDetails>),
    ProcessingFailed {
        build_id: String,
        state: String,
    },
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    BuildNotFound,
    RepeatedPaginationUrl(String),
}

#[derive(Clone, Copy, Debug)]
enum Context {
    Page(usize),
    Operation(usize),
}

#[derive(Debug, Default)]
struct TransportDetails {
    status_code: Option<u16>,
    headers: Option<HeaderMap>,
    payload: Option<bytes::Bytes>,
    api: Option<ApiErrorPayload>,
}

impl TransportDetails {
    fn display(
        &self,
        source: Option<&(dyn StdError + Send + Sync)>,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let Some(code) = self.status_code else {
            return match source {
                Some(e) => write!(f, "the transport reports an error: {e}"),
                None => write!(f, "the transport reports an error"),
            };
        };
        write!(f, "the service reports an error with HTTP status {code}")?;
        match (&self.api, &self.payload) {
            (Some(api), _) => {
                let mut entries = api.errors.iter().map(ToString::to_string);
                if let Some(first) = entries.next() {
                    write!(f, ": {first}")?;
                }
                for e in entries {
                    write!(f, "; {e}")?;
                }
            }
            (None, Some(p)) if !p.is_empty() => {
                write!(f, ": {}", String::from_utf8_lossy(p).trim())?;
            }
            _ => {}
        }
        let header = |name: &str| {
            self.headers
                .as_ref()
                .and_then(|h| h.get(name))
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
        };
        match (header(REQUEST_ID_HEADER), header(CORRELATION_KEY_HEADER)) {
            (Some(r), Some(c)) => write!(f, " (request id: {r}, correlation key: {c})"),
            (Some(r), None) => write!(f, " (request id: {r})"),
            (None, Some(c)) => write!(f, " (correlation key: {c})"),
            (None, None) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CredentialsErrorKind;
    use http::HeaderValue;
    use std::error::Error as StdError;
    use test_case::test_case;

    static_assertions::assert_impl_all!(Error: Send, Sync);

    fn apple_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-123"));
        headers.insert(CORRELATION_KEY_HEADER, HeaderValue::from_static("corr-456"));
        headers
    }

    #[test_case(401, "unauthorized")]
    #[test_case(403, "unauthorized")]
    #[test_case(404, "not-found")]
    #[test_case(409, "conflict")]
    #[test_case(429, "rate-limited")]
    #[test_case(500, "server-error")]
    #[test_case(503, "server-error")]
    #[test_case(400, "client-error")]
    #[test_case(422, "client-error")]
    fn http_classification(code: u16, want: &str) {
        let error = Error::http(code, HeaderMap::new(), bytes::Bytes::new());
        assert_eq!(error.kind_name(), want, "{error:?}");
        assert_eq!(error.http_status_code(), Some(code));
        assert_eq!(error.is_unauthorized(), want == "unauthorized");
        assert_eq!(error.is_not_found(), want == "not-found");
        assert_eq!(error.is_conflict(), want == "conflict");
        assert_eq!(error.is_rate_limited(), want == "rate-limited");
        assert_eq!(error.is_server_error(), want == "server-error");
        assert_eq!(error.is_client_error(), want == "client-error");
        assert!(!error.is_transient(), "{error:?}");
    }

    #[test]
    fn transient() {
        let error = Error::io("connection reset by peer");
        assert!(error.is_transient(), "{error:?}");
        assert!(error.is_io(), "{error:?}");
        assert_eq!(error.kind_name(), "transient");
        assert!(error.source().is_some(), "{error:?}");
        assert!(error.to_string().contains("connection reset"), "{error}");

        let error = Error::timeout("deadline");
        assert!(error.is_transient(), "{error:?}");
        assert!(!error.is_io(), "{error:?}");
    }

    #[test]
    fn display_includes_identifiers() {
        let body = serde_json::json!({"errors": [{
            "status": "404",
            "code": "NOT_FOUND",
            "title": "The specified resource does not exist",
            "detail": "There is no resource of type 'builds' with id 'b1'"
        }]});
        let body = bytes::Bytes::from(serde_json::to_vec(&body).unwrap());
        let error = Error::http(404, apple_headers(), body);
        assert_eq!(error.request_id(), Some("req-123"));
        assert_eq!(error.correlation_key(), Some("corr-456"));
        let got = error.to_string();
        assert!(got.contains("404"), "{got}");
        assert!(got.contains("NOT_FOUND"), "{got}");
        assert!(got.contains("There is no resource"), "{got}");
        assert!(got.contains("request id: req-123"), "{got}");
        assert!(got.contains("correlation key: corr-456"), "{got}");
    }

    #[test]
    fn display_raw_payload() {
        let error = Error::http(400, HeaderMap::new(), bytes::Bytes::from_static(b"bad thing"));
        assert!(error.api_errors().is_none(), "{error:?}");
        assert!(error.to_string().ends_with(": bad thing"), "{error}");
    }

    #[test]
    fn conflict_kind() {
        let body = serde_json::json!({"errors": [{
            "code": "ENTITY_ERROR.ATTRIBUTE.INVALID.DUPLICATE",
            "detail": "The app name you entered is already being used."
        }]});
        let body = bytes::Bytes::from(serde_json::to_vec(&body).unwrap());
        let error = Error::http(409, HeaderMap::new(), body);
        assert_eq!(error.conflict_kind(), Some(ConflictKind::DuplicateAppName));

        let error = Error::http(409, HeaderMap::new(), bytes::Bytes::new());
        assert_eq!(error.conflict_kind(), Some(ConflictKind::Other(String::new())));

        let error = Error::http(404, HeaderMap::new(), bytes::Bytes::new());
        assert_eq!(error.conflict_kind(), None);
    }

    #[test]
    fn retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("7"));
        let error = Error::http(429, headers, bytes::Bytes::new());
        assert_eq!(error.retry_after(), Some(Duration::from_secs(7)));

        let error = Error::http(429, HeaderMap::new(), bytes::Bytes::new());
        assert_eq!(error.retry_after(), None);
    }

    #[test]
    fn retry_after_date() {
        let when = chrono::Utc::now() + chrono::TimeDelta::seconds(120);
        let value = when.to_rfc2822();
        let got = parse_retry_after(&value).unwrap();
        assert!(got <= Duration::from_secs(120), "{got:?}");
        assert!(got >= Duration::from_secs(110), "{got:?}");

        let got = parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(got, Some(Duration::ZERO));

        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn context_prefix() {
        let error = Error::deser("unexpected end of input").with_page(3);
        assert_eq!(error.page(), Some(3));
        assert!(error.to_string().starts_with("page 3: "), "{error}");

        let error = Error::http(500, HeaderMap::new(), bytes::Bytes::new()).with_operation(1);
        assert_eq!(error.operation(), Some(1));
        assert_eq!(error.page(), None);
        assert!(error.to_string().starts_with("upload operation 1: "), "{error}");
    }

    #[test]
    fn domain_errors() {
        let error = Error::processing_failed("b1", "FAILED");
        assert!(error.is_processing_failed(), "{error:?}");
        assert_eq!(error.kind_name(), "processing-failed");
        assert_eq!(error.processing_state(), Some(("b1", "FAILED")));

        let error = Error::checksum_mismatch("file", "aa", "bb");
        assert!(error.is_checksum_mismatch(), "{error:?}");
        assert_eq!(error.kind_name(), "checksum-mismatch");
        assert!(error.to_string().contains("expected aa"), "{error}");

        let error = Error::build_not_found("no build found");
        assert!(error.is_build_not_found(), "{error:?}");
        assert_eq!(error.to_string(), "no build found");

        let error = Error::repeated_pagination_url("/p?cursor=A");
        assert!(error.is_repeated_pagination_url(), "{error:?}");
        assert_eq!(error.kind_name(), "repeated-pagination-url");
        assert!(error.to_string().contains("/p?cursor=A"), "{error}");

        let error = Error::cancelled();
        assert!(error.is_cancelled(), "{error:?}");
    }

    #[test]
    fn authentication() {
        let error = Error::authentication(CredentialsError::from_msg(
            CredentialsErrorKind::InvalidKey,
            false,
            "bad key",
        ));
        assert!(error.is_unauthorized(), "{error:?}");
        assert!(error.is_authentication(), "{error:?}");
        assert_eq!(error.kind_name(), "unauthorized");
        assert!(!error.is_transient_and_before_send(), "{error:?}");

        let error = Error::authentication(CredentialsError::from_msg(
            CredentialsErrorKind::Other,
            true,
            "try again",
        ));
        assert!(error.is_transient_and_before_send(), "{error:?}");
        let source = error
            .source()
            .and_then(|e| e.downcast_ref::<CredentialsError>());
        assert!(source.is_some(), "{error:?}");
    }
}
