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

use std::error::Error;
use std::fmt::{Debug, Display, Formatter, Result};
use std::sync::Arc;

/// Represents an error creating or using [Credentials].
///
/// The client may experience problems creating credentials and/or using them.
/// Examples include a missing or badly formatted private key, or a failure to
/// sign the bearer token.
///
/// # Example
/// ```
/// # use asc_gax::error::{CredentialsError, CredentialsErrorKind};
/// let err = CredentialsError::from_msg(
///     CredentialsErrorKind::MissingCredentials, false, "no private key configured");
/// assert!(!err.is_retryable());
/// assert_eq!(err.kind().as_str(), "missing-credentials");
/// assert!(format!("{err}").contains("no private key configured"));
/// ```
///
/// [Credentials]: https://docs.rs/asc-auth/latest/asc_auth/credentials/struct.Credentials.html
#[derive(Clone, Debug)]
pub struct CredentialsError {
    kind: CredentialsErrorKind,

    /// If `true`, the operation that resulted in this error might succeed upon
    /// retry.
    is_retryable: bool,

    source: CredentialsErrorImpl,
}

/// The classification of a [CredentialsError].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum CredentialsErrorKind {
    /// No key material was configured.
    MissingCredentials,
    /// The key material cannot be parsed as a P-256 private key.
    InvalidKey,
    /// The token could not be signed.
    SignError,
    /// Any other problem.
    Other,
}

impl CredentialsErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing-credentials",
            Self::InvalidKey => "invalid-key",
            Self::SignError => "sign-error",
            Self::Other => "other",
        }
    }
}

impl Display for CredentialsErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
enum CredentialsErrorImpl {
    SimpleMessage(String),
    Source(Arc<dyn Error + Send + Sync>),
}

impl CredentialsError {
    /// Creates a new `CredentialsError` wrapping `source`.
    ///
    /// # Arguments
    /// * `kind` - the classification of the failure.
    /// * `is_retryable` - A boolean indicating whether the error is retryable.
    /// * `source` - The underlying error that caused the auth failure.
    pub fn new<T: Error + Send + Sync + 'static>(
        kind: CredentialsErrorKind,
        is_retryable: bool,
        source: T,
    ) -> Self {
        CredentialsError {
            kind,
            is_retryable,
            source: CredentialsErrorImpl::Source(Arc::new(source)),
        }
    }

    /// Creates a new `CredentialsError` from a message.
    pub fn from_msg<T: Into<String>>(
        kind: CredentialsErrorKind,
        is_retryable: bool,
        message: T,
    ) -> Self {
        CredentialsError {
            kind,
            is_retryable,
            source: CredentialsErrorImpl::SimpleMessage(message.into()),
        }
    }

    /// Returns `true` if the error is retryable; otherwise returns `false`.
    pub fn is_retryable(&self) -> bool {
        self.is_retryable
    }

    /// The classification of this error.
    pub fn kind(&self) -> CredentialsErrorKind {
        self.kind
    }
}

impl std::error::Error for CredentialsErrorImpl {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self {
            CredentialsErrorImpl::SimpleMessage(_) => None,
            CredentialsErrorImpl::Source(source) => Some(source),
        }
    }
}

impl Display for CredentialsErrorImpl {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match &self {
            CredentialsErrorImpl::SimpleMessage(message) => write!(f, "{message}"),
            CredentialsErrorImpl::Source(source) => write!(f, "{source}"),
        }
    }
}

impl std::error::Error for CredentialsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.source()
    }
}

const RETRYABLE_MSG: &str = "but future attempts may succeed";
const NON_RETRYABLE_MSG: &str = "and future attempts will not succeed";

impl Display for CredentialsError {
    /// Formats the error message to include the kind, retryability and source.
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let msg = if self.is_retryable {
            RETRYABLE_MSG
        } else {
            NON_RETRYABLE_MSG
        };
        write!(
            f,
            "cannot create bearer token ({}), {msg}, source: {}",
            self.kind, self.source
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(true)]
    #[test_case(false)]
    fn new(retryable: bool) {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "test-only");
        let got = CredentialsError::new(CredentialsErrorKind::MissingCredentials, retryable, source);
        assert_eq!(got.is_retryable(), retryable, "{got}");
        assert_eq!(got.kind(), CredentialsErrorKind::MissingCredentials);
        assert!(got.source().is_some(), "{got}");
        assert!(format!("{got}").contains("test-only"), "{got}");
    }

    #[test_case(true)]
    #[test_case(false)]
    fn from_msg(retryable: bool) {
        let got = CredentialsError::from_msg(CredentialsErrorKind::SignError, retryable, "test-only");
        assert_eq!(got.is_retryable(), retryable, "{got}");
        assert!(got.source().is_none(), "{got}");
        assert!(format!("{got}").contains("test-only"), "{got}");
    }

    #[test_case(CredentialsErrorKind::MissingCredentials, "missing-credentials")]
    #[test_case(CredentialsErrorKind::InvalidKey, "invalid-key")]
    #[test_case(CredentialsErrorKind::SignError, "sign-error")]
    #[test_case(CredentialsErrorKind::Other, "other")]
    fn kind_names(kind: CredentialsErrorKind, want: &str) {
        assert_eq!(kind.as_str(), want);
        let e = CredentialsError::from_msg(kind, false, "test-only-err-123");
        assert!(format!("{e}").contains(want), "{e}");
    }

    #[test]
    fn fmt() {
        let e = CredentialsError::from_msg(CredentialsErrorKind::Other, true, "test-only-err-123");
        let got = format!("{e}");
        assert!(got.contains("test-only-err-123"), "{got}");
        assert!(got.contains(RETRYABLE_MSG), "{got}");

        let e = CredentialsError::from_msg(CredentialsErrorKind::Other, false, "test-only-err-123");
        let got = format!("{e}");
        assert!(got.contains("test-only-err-123"), "{got}");
        assert!(got.contains(NON_RETRYABLE_MSG), "{got}");
    }
}
