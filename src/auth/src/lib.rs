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

//! App Store Connect client libraries for Rust - Authentication Components
//!
//! This crate contains types and functions used to authenticate requests to
//! the App Store Connect API. The client consumes an implementation of
//! [credentials::Credentials] and uses these credentials to authenticate the
//! requests issued by the application.
//!
//! The App Store Connect API authenticates requests with short-lived JSON Web
//! Tokens, signed with ES256 using a private key downloaded from App Store
//! Connect. See [credentials::api_key] for details.

pub mod build_errors;

/// Types and functions to work with App Store Connect credentials.
pub mod credentials;

pub(crate) mod token;

/// Re-exports of the error types used by credentials.
pub mod errors {
    pub use gax::error::{CredentialsError, CredentialsErrorKind};
}

/// A `Result` alias where the `Err` case is
/// `asc_auth::errors::CredentialsError`.
pub(crate) type Result<T> = std::result::Result<T, crate::errors::CredentialsError>;
