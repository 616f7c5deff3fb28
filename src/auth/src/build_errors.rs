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

//! Errors created during credentials construction.

use crate::errors::CredentialsErrorKind;
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A `Result` alias where the `Err` case is [Error].
pub type BuildResult<T> = std::result::Result<T, Error>;

/// The error type for [Credentials] builders.
///
/// [Credentials]: super::credentials::Credentials
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct Error(ErrorKind);

impl Error {
    /// A problem finding or reading the private key file.
    pub fn is_loading(&self) -> bool {
        matches!(self.0, ErrorKind::Loading(_))
    }

    /// No private key was configured.
    pub fn is_missing_key(&self) -> bool {
        matches!(self.0, ErrorKind::MissingKey)
    }

    /// The private key is not a PKCS#8 P-256 key.
    pub fn is_invalid_key(&self) -> bool {
        matches!(self.0, ErrorKind::InvalidKey(_))
    }

    /// A required field was missing from the builder.
    pub fn is_missing_field(&self) -> bool {
        matches!(self.0, ErrorKind::MissingField(_))
    }

    /// The requested token lifetime is out of range.
    pub fn is_invalid_lifetime(&self) -> bool {
        matches!(self.0, ErrorKind::InvalidLifetime(_))
    }

    /// The credentials classification for this error.
    pub fn credentials_kind(&self) -> CredentialsErrorKind {
        match &self.0 {
            ErrorKind::Loading(_) | ErrorKind::MissingKey | ErrorKind::MissingField(_) => {
                CredentialsErrorKind::MissingCredentials
            }
            ErrorKind::InvalidKey(_) => CredentialsErrorKind::InvalidKey,
            ErrorKind::InvalidLifetime(_) => CredentialsErrorKind::Other,
        }
    }

    pub(crate) fn loading<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::Loading(source.into()))
    }

    pub(crate) fn missing_key() -> Error {
        Error(ErrorKind::MissingKey)
    }

    pub(crate) fn invalid_key<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::InvalidKey(source.into()))
    }

    pub(crate) fn missing_field(field: &'static str) -> Error {
        Error(ErrorKind::MissingField(field))
    }

    pub(crate) fn invalid_lifetime(lifetime: Duration) -> Error {
        Error(ErrorKind::InvalidLifetime(lifetime))
    }
}

#[derive(thiserror::Error, Debug)]
enum ErrorKind {
    #[error("could not find or open the private key file {0}")]
    Loading(#[source] BoxError),
    #[error("missing private key, configure a PEM string or a .p8 file")]
    MissingKey,
    #[error("cannot parse the private key as a PKCS#8 P-256 key {0}")]
    InvalidKey(#[source] BoxError),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("the token lifetime ({0:?}) must be greater than zero and at most 20 minutes")]
    InvalidLifetime(Duration),
}
