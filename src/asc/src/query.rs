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

//! Typed list queries.
//!
//! Each query turns into a [Request]. When `next` is set the query is a
//! continuation: the URL is used verbatim and all other fields are ignored.

use crate::client::Request;
use crate::model::{Platform, ProcessingState};
use gax::Result;
use gax::error::Error;

/// The largest page size the service accepts.
pub const MAX_LIMIT: u32 = 200;

fn check_limit(limit: Option<u32>) -> Result<Option<u32>> {
    match limit {
        Some(l) if l == 0 || l > MAX_LIMIT => Err(Error::usage(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        ))),
        l => Ok(l),
    }
}

fn required<'a>(value: &'a str, name: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::usage(format!("{name} is required")));
    }
    Ok(value)
}

fn with_limit(request: Request, limit: Option<u32>) -> Request {
    match limit {
        Some(l) => request.with_query("limit", l.to_string()),
        None => request,
    }
}

/// Lists builds: `GET /v1/builds`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildsQuery {
    pub app_id: String,
    /// Matches `filter[version]`, the build number.
    pub build_numbers: Vec<String>,
    pub pre_release_version_ids: Vec<String>,
    pub pre_release_platforms: Vec<Platform>,
    pub processing_states: Vec<String>,
    pub expired: Option<bool>,
    /// For example `-uploadedDate`.
    pub sort: Option<String>,
    pub limit: Option<u32>,
    pub next: Option<String>,
}

impl BuildsQuery {
    pub fn new<T: Into<String>>(app_id: T) -> Self {
        Self {
            app_id: app_id.into(),
            ..Default::default()
        }
    }

    /// Queries the build most recently uploaded that matches the filters.
    pub fn latest<T: Into<String>>(app_id: T) -> Self {
        Self {
            sort: Some("-uploadedDate".to_string()),
            limit: Some(1),
            ..Self::new(app_id)
        }
    }

    pub fn with_build_number<T: Into<String>>(mut self, v: T) -> Self {
        self.build_numbers.push(v.into());
        self
    }

    pub fn with_pre_release_version<T: Into<String>>(mut self, v: T) -> Self {
        self.pre_release_version_ids.push(v.into());
        self
    }

    pub fn with_platform(mut self, v: Platform) -> Self {
        self.pre_release_platforms.push(v);
        self
    }

    /// Filters on all processing states, including the terminal ones.
    pub fn with_all_processing_states(mut self) -> Self {
        self.processing_states = ProcessingState::ALL.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_expired(mut self, v: bool) -> Self {
        self.expired = Some(v);
        self
    }

    pub fn with_limit(mut self, v: u32) -> Self {
        self.limit = Some(v);
        self
    }

    pub fn with_next<T: Into<String>>(mut self, v: T) -> Self {
        self.next = Some(v.into());
        self
    }

    pub fn to_request(&self) -> Result<Request> {
        if let Some(next) = self.next.as_deref().filter(|n| !n.trim().is_empty()) {
            return Ok(Request::get(next.trim()));
        }
        let app_id = required(&self.app_id, "app id")?;
        let limit = check_limit(self.limit)?;
        let mut request = Request::get("/v1/builds").with_query("filter[app]", app_id);
        if let Some(sort) = self.sort.as_deref() {
            request = request.with_query("sort", sort);
        }
        request = with_limit(request, limit)
            .with_query_list("filter[version]", &self.build_numbers)
            .with_query_list("filter[preReleaseVersion]", &self.pre_release_version_ids)
            .with_query_list(
                "filter[preReleaseVersion.platform]",
                self.pre_release_platforms.iter().map(Platform::as_str),
            )
            .with_query_list("filter[processingState]", &self.processing_states);
        if let Some(expired) = self.expired {
            request = request.with_query("filter[expired]", expired.to_string());
        }
        Ok(request)
    }
}

/// Lists pre-release versions: `GET /v1/preReleaseVersions`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PreReleaseVersionsQuery {
    pub app_id: String,
    pub versions: Vec<String>,
    pub platforms: Vec<Platform>,
    pub limit: Option<u32>,
    pub next: Option<String>,
}

impl PreReleaseVersionsQuery {
    pub fn new<T: Into<String>>(app_id: T) -> Self {
        Self {
            app_id: app_id.into(),
            ..Default::default()
        }
    }

    pub fn with_version<T: Into<String>>(mut self, v: T) -> Self {
        self.versions.push(v.into());
        self
    }

    pub fn with_platform(mut self, v: Platform) -> Self {
        self.platforms.push(v);
        self
    }

    pub fn with_limit(mut self, v: u32) -> Self {
        self.limit = Some(v);
        self
    }

    pub fn with_next<T: Into<String>>(mut self, v: T) -> Self {
        self.next = Some(v.into());
        self
    }

    pub fn to_request(&self) -> Result<Request> {
        if let Some(next) = self.next.as_deref().filter(|n| !n.trim().is_empty()) {
            return Ok(Request::get(next.trim()));
        }
        let app_id = required(&self.app_id, "app id")?;
        let limit = check_limit(self.limit)?;
        let request = Request::get("/v1/preReleaseVersions")
            .with_query("filter[app]", app_id)
            .with_query_list("filter[version]", &self.versions)
            .with_query_list("filter[platform]", self.platforms.iter().map(Platform::as_str));
        Ok(with_limit(request, limit))
    }
}

/// Lists the build uploads of an app: `GET /v1/apps/{id}/buildUploads`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildUploadsQuery {
    pub app_id: String,
    /// For example `AWAITING_UPLOAD`, `PROCESSING` or `COMPLETE`.
    pub states: Vec<String>,
    pub short_versions: Vec<String>,
    pub platforms: Vec<Platform>,
    pub limit: Option<u32>,
    pub next: Option<String>,
}

impl BuildUploadsQuery {
    /// The states of uploads that may still turn into a build.
    pub const IN_FLIGHT_STATES: [&'static str; 3] = ["AWAITING_UPLOAD", "PROCESSING", "COMPLETE"];

    pub fn new<T: Into<String>>(app_id: T) -> Self {
        Self {
            app_id: app_id.into(),
            ..Default::default()
        }
    }

    /// Uploads that are awaiting bytes, processing, or complete.
    pub fn in_flight<T: Into<String>>(app_id: T) -> Self {
        Self {
            states: Self::IN_FLIGHT_STATES.iter().map(|s| s.to_string()).collect(),
            limit: Some(MAX_LIMIT),
            ..Self::new(app_id)
        }
    }

    pub fn with_short_version<T: Into<String>>(mut self, v: T) -> Self {
        self.short_versions.push(v.into());
        self
    }

    pub fn with_platform(mut self, v: Platform) -> Self {
        self.platforms.push(v);
        self
    }

    pub fn with_limit(mut self, v: u32) -> Self {
        self.limit = Some(v);
        self
    }

    pub fn with_next<T: Into<String>>(mut self, v: T) -> Self {
        self.next = Some(v.into());
        self
    }

    pub fn to_request(&self) -> Result<Request> {
        if let Some(next) = self.next.as_deref().filter(|n| !n.trim().is_empty()) {
            return Ok(Request::get(next.trim()));
        }
        let app_id = required(&self.app_id, "app id")?;
        let limit = check_limit(self.limit)?;
        let request = Request::get(format!("/v1/apps/{app_id}/buildUploads"))
            .with_query_list("filter[state]", &self.states)
            .with_query_list("filter[cfBundleShortVersionString]", &self.short_versions)
            .with_query_list("filter[platform]", self.platforms.iter().map(Platform::as_str));
        Ok(with_limit(request, limit))
    }
}
