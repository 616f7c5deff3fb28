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

//! App Store Connect client libraries for Rust - REST client core
//!
//! This crate implements the pieces of the App Store Connect REST API used to
//! ship builds:
//!
//! * A [Client] that authenticates, retries and maps errors for each request.
//! * Pagination over JSON:API documents, with loop detection.
//! * The build upload flow: reserve, upload, verify, commit.
//! * Waiting for a build to finish processing.
//! * Resolving the latest build, and the next build number.
//!
//! # Example
//! ```no_run
//! # use asc_client::{Client, ClientConfig, UploadBuildRequest};
//! # use tokio_util::sync::CancellationToken;
//! # async fn sample() -> anyhow::Result<()> {
//! let credentials = auth::credentials::api_key::Builder::new("KEY123", "issuer-id")
//!     .with_private_key_file("AuthKey_KEY123.p8")
//!     .build()?;
//! let client = Client::new(ClientConfig::from_env()?, credentials)?;
//! let request = UploadBuildRequest::ipa("1234567890", "MyApp.ipa")
//!     .with_version("1.2.3")
//!     .with_build_number("42")
//!     .with_verify_checksum(true);
//! let result = client.upload_build(&CancellationToken::new(), &request).await?;
//! println!("uploaded {}", result.file_id);
//! # Ok(()) }
//! ```

pub use gax::Result;
pub use gax::error::Error;

pub mod build_number;
mod builds;
pub mod checksum;
mod client;
mod config;
pub mod diagnostics;
pub mod envelope;
mod latest;
pub mod model;
pub mod pagination;
pub mod query;
mod upload;
mod wait;

pub use build_number::{BuildNumber, BuildNumberError};
pub use client::{Client, Request, Response};
pub use config::{
    ClientConfig, DEFAULT_ENDPOINT, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BODY_BYTES, DEFAULT_TIMEOUT,
    DEFAULT_UPLOAD_TIMEOUT, is_falsy, is_truthy,
};
pub use latest::{
    LatestBuildQuery, NextBuildNumber, NextBuildNumberQuery, SOURCE_BUILD_UPLOADS,
    SOURCE_PROCESSED_BUILDS,
};
pub use upload::{UploadBuildRequest, UploadBuildResult};
pub use wait::{
    BuildSelector, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT, WaitOptions, wait_for_processing,
};
