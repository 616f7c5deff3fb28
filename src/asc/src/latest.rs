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

//! Finds the latest build of an app and computes the next build number.
//!
//! Two sources are consulted: the processed builds, via the builds list
//! sorted by upload date, and the in-flight uploads, which may not have
//! turned into a build yet.

use crate::build_number::BuildNumber;
use crate::client::Client;
use crate::model::{Build, BuildUploadAttributes, Platform};
use crate::query::{BuildUploadsQuery, BuildsQuery, MAX_LIMIT, PreReleaseVersionsQuery};
use gax::Result;
use gax::error::Error;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// The source name for processed builds.
pub const SOURCE_PROCESSED_BUILDS: &str = "processed_builds";

/// The source name for build uploads.
pub const SOURCE_BUILD_UPLOADS: &str = "build_uploads";

/// Selects the builds considered by [Client::latest_build].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LatestBuildQuery {
    pub app_id: String,
    /// The marketing version (`CFBundleShortVersionString`).
    pub version: Option<String>,
    pub platform: Option<Platform>,
    pub exclude_expired: bool,
}

impl LatestBuildQuery {
    pub fn new<T: Into<String>>(app_id: T) -> Self {
        Self {
            app_id: app_id.into(),
            ..Default::default()
        }
    }

    pub fn with_version<T: Into<String>>(mut self, v: T) -> Self {
        self.version = Some(v.into());
        self
    }

    pub fn with_platform(mut self, v: Platform) -> Self {
        self.platform = Some(v);
        self
    }

    pub fn with_exclude_expired(mut self, v: bool) -> Self {
        self.exclude_expired = v;
        self
    }

    fn version(&self) -> Option<&str> {
        self.version.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    fn has_pre_release_filters(&self) -> bool {
        self.version().is_some() || self.platform.is_some()
    }

    fn no_pre_release_version(&self) -> Error {
        let message = match (self.version(), self.platform) {
            (Some(v), Some(p)) => {
                format!("no pre-release version found for version {v:?} on platform {p}")
            }
            (Some(v), None) => format!("no pre-release version found for version {v:?}"),
            (None, Some(p)) => format!("no pre-release version found for platform {p}"),
            (None, None) => "no pre-release version found".to_string(),
        };
        Error::build_not_found(message)
    }
}

/// Selects the builds considered by [Client::next_build_number].
#[derive(Clone, Debug, PartialEq)]
pub struct NextBuildNumberQuery {
    pub latest: LatestBuildQuery,
    /// The answer when the app has no build history. Must be at least 1.
    pub initial_build_number: u32,
}

impl NextBuildNumberQuery {
    pub fn new(latest: LatestBuildQuery) -> Self {
        Self {
            latest,
            initial_build_number: 1,
        }
    }

    pub fn with_initial_build_number(mut self, v: u32) -> Self {
        self.initial_build_number = v;
        self
    }
}

/// The result of [Client::next_build_number].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextBuildNumber {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_processed_build_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_upload_build_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_observed_build_number: Option<String>,
    pub next_build_number: String,
    pub sources_considered: Vec<String>,
}

impl Client {
    /// Returns the most recently uploaded build matching `query`.
    ///
    /// When only a platform is given, the app may have several pre-release
    /// versions. Each is queried and the build with the newest upload date
    /// wins, even if it belongs to an older marketing version.
    pub async fn latest_build(
        &self,
        cancel: &CancellationToken,
        query: &LatestBuildQuery,
    ) -> Result<Build> {
        let app_id = required_app_id(query)?;
        let pre_release_ids = if query.has_pre_release_filters() {
            let ids = self.find_pre_release_version_ids(cancel, app_id, query).await?;
            if ids.is_empty() {
                return Err(query.no_pre_release_version());
            }
            ids
        } else {
            Vec::new()
        };
        self.find_latest_build(cancel, app_id, query, &pre_release_ids)
            .await?
            .ok_or_else(|| {
                if query.has_pre_release_filters() {
                    Error::build_not_found("no builds found matching filters")
                } else {
                    Error::build_not_found(format!("no builds found for app {app_id}"))
                }
            })
    }

    /// Computes the next build number for an app.
    ///
    /// A marketing version without a pre-release version is not an error
    /// here: it means the version has no processed builds yet.
    pub async fn next_build_number(
        &self,
        cancel: &CancellationToken,
        query: &NextBuildNumberQuery,
    ) -> Result<NextBuildNumber> {
        if query.initial_build_number < 1 {
            return Err(Error::usage("initial build number must be >= 1"));
        }
        let latest = &query.latest;
        let app_id = required_app_id(latest)?;

        let mut result = NextBuildNumber::default();
        let processed = if latest.has_pre_release_filters() {
            let ids = self.find_pre_release_version_ids(cancel, app_id, latest).await?;
            if ids.is_empty() {
                None
            } else {
                self.find_latest_build(cancel, app_id, latest, &ids).await?
            }
        } else {
            self.find_latest_build(cancel, app_id, latest, &[]).await?
        };
        let processed = processed
            .map(|build| {
                BuildNumber::parse(
                    build.attributes.version.as_deref().unwrap_or_default(),
                    &format!("processed build {}", build.id),
                )
            })
            .transpose()
            .map_err(Error::deser)?;
        if let Some(n) = &processed {
            result.latest_processed_build_number = Some(n.to_string());
            result
                .sources_considered
                .push(SOURCE_PROCESSED_BUILDS.to_string());
        }

        let upload = self.find_latest_upload_number(cancel, app_id, latest).await?;
        if let Some(n) = &upload {
            result.latest_upload_build_number = Some(n.to_string());
            result
                .sources_considered
                .push(SOURCE_BUILD_UPLOADS.to_string());
        }

        let observed = match (processed, upload) {
            (Some(p), Some(u)) if u > p => Some(u),
            (Some(p), _) => Some(p),
            (None, u) => u,
        };
        result.next_build_number = match &observed {
            Some(n) => n.next().map_err(Error::deser)?.to_string(),
            None => query.initial_build_number.to_string(),
        };
        result.latest_observed_build_number = observed.map(|n| n.to_string());
        tracing::debug!(app_id, next = %result.next_build_number, sources = ?result.sources_considered, "computed next build number");
        Ok(result)
    }

    async fn find_pre_release_version_ids(
        &self,
        cancel: &CancellationToken,
        app_id: &str,
        query: &LatestBuildQuery,
    ) -> Result<Vec<String>> {
        let mut request = PreReleaseVersionsQuery::new(app_id);
        if let Some(p) = query.platform {
            request = request.with_platform(p);
        }
        if let Some(v) = query.version() {
            let page = self
                .list_pre_release_versions(cancel, &request.with_version(v).with_limit(1))
                .await?;
            return Ok(page.data.into_iter().take(1).map(|v| v.id).collect());
        }
        let mut ids = Vec::new();
        self.paginate_each(
            cancel,
            request.with_limit(MAX_LIMIT).to_request()?,
            |page: crate::envelope::Page<crate::model::PreReleaseVersionAttributes>| {
                ids.extend(page.data.into_iter().map(|v| v.id));
                Ok(())
            },
        )
        .await?;
        Ok(ids)
    }

    async fn find_latest_build(
        &self,
        cancel: &CancellationToken,
        app_id: &str,
        query: &LatestBuildQuery,
        pre_release_ids: &[String],
    ) -> Result<Option<Build>> {
        let base = || {
            let q = BuildsQuery::latest(app_id);
            if query.exclude_expired {
                q.with_expired(false)
            } else {
                q
            }
        };
        if pre_release_ids.is_empty() {
            let page = self.list_builds(cancel, &base()).await?;
            return Ok(page.data.into_iter().next());
        }
        let mut newest: Option<Build> = None;
        for id in pre_release_ids {
            let page = self
                .list_builds(cancel, &base().with_pre_release_version(id))
                .await?;
            let Some(candidate) = page.data.into_iter().next() else {
                continue;
            };
            // RFC 3339 timestamps in the same zone sort lexicographically.
            let is_newer = newest.as_ref().is_none_or(|current| {
                candidate.attributes.uploaded_date.as_deref().unwrap_or_default()
                    > current.attributes.uploaded_date.as_deref().unwrap_or_default()
            });
            if is_newer {
                newest = Some(candidate);
            }
        }
        Ok(newest)
    }

    async fn find_latest_upload_number(
        &self,
        cancel: &CancellationToken,
        app_id: &str,
        query: &LatestBuildQuery,
    ) -> Result<Option<BuildNumber>> {
        let mut request = BuildUploadsQuery::in_flight(app_id);
        if let Some(v) = query.version() {
            request = request.with_short_version(v);
        }
        if let Some(p) = query.platform {
            request = request.with_platform(p);
        }
        let mut latest: Option<BuildNumber> = None;
        self.paginate_each(
            cancel,
            request.to_request()?,
            |page: crate::envelope::Page<BuildUploadAttributes>| {
                for upload in page.data {
                    let parsed = BuildNumber::parse(
                        upload.attributes.cf_bundle_version.as_deref().unwrap_or_default(),
                        &format!("build upload {}", upload.id),
                    )
                    .map_err(Error::deser)?;
                    if latest.as_ref().is_none_or(|current| parsed > *current) {
                        latest = Some(parsed);
                    }
                }
                Ok(())
            },
        )
        .await?;
        Ok(latest)
    }
}

fn required_app_id(query: &LatestBuildQuery) -> Result<&str> {
    let app_id = query.app_id.trim();
    if app_id.is_empty() {
        return Err(Error::usage("app id is required"));
    }
    Ok(app_id)
}
