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

//! App Store Connect client helpers.
//!
//! This crate contains the error taxonomy, the retry and backoff policies,
//! and the retry and polling loops shared by the App Store Connect client
//! crates. Applications rarely need to use it directly, other than to
//! interrogate errors or to configure retry policies.

/// An alias of [std::result::Result] where the error is always [crate::error::Error].
///
/// This is the result type used by all functions making requests.
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// The core error types used by the client crates.
pub mod error;

pub mod backoff;
pub mod polling;
pub mod retry_loop;
pub mod retry_policy;
