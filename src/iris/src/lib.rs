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

//! App Store Connect client libraries for Rust - web session and IRIS API
//!
//! Creating apps is not available through the App Store Connect REST API.
//! This crate signs in the way the App Store Connect website does, and
//! calls the IRIS API the website uses:
//!
//! * [login] runs the Apple ID SRP-6a sign-in and the two-factor
//!   authentication.
//! * [cookies] holds the session cookies.
//! * [session_cache] persists sessions between invocations.
//! * [client] creates and finds apps.
//!
//! # Example
//! ```no_run
//! # use asc_iris::client::{AppCreateAttributes, IrisClient};
//! # use asc_iris::login::{LoginOutcome, WebAuth};
//! # use asc_iris::session_cache::SessionCache;
//! # async fn sample() -> anyhow::Result<()> {
//! let cache = SessionCache::from_env()?;
//! let session = match cache.resume("dev@example.com").await {
//!     Some(session) => session,
//!     None => match WebAuth::new().login("dev@example.com", "password").await? {
//!         LoginOutcome::Authenticated(session) => session,
//!         LoginOutcome::TwoFactorRequired(mut session, _) => {
//!             session.submit_two_factor_code("123456").await?;
//!             session
//!         }
//!     },
//! };
//! cache.persist(&session).await?;
//! let client = IrisClient::new(&session)?;
//! let app = client
//!     .create_app(AppCreateAttributes::new("com.example.app").with_name("Example"))
//!     .await?;
//! println!("created {}", app.id);
//! # Ok(()) }
//! ```

pub mod client;
pub mod cookies;
pub mod errors;
mod hashcash;
pub mod login;
pub mod session_cache;
mod srp;

pub use errors::{ApiError, Error, Result, is_duplicate_app_name_error};
