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

//! Read operations on builds, pre-release versions and build uploads.

use crate::client::{Client, Request};
use crate::envelope::{Page, Single};
use crate::model::{
    Build, BuildAttributes, BuildUploadAttributes, PreReleaseVersionAttributes,
};
use crate::query::{BuildUploadsQuery, BuildsQuery, PreReleaseVersionsQuery};
use gax::Result;
use gax::error::Error;
use tokio_util::sync::CancellationToken;

impl Client {
    /// Fetches a build by id: `GET /v1/builds/{id}`.
    pub async fn get_build(&self, cancel: &CancellationToken, build_id: &str) -> Result<Build> {
        let build_id = build_id.trim();
        if build_id.is_empty() {
            return Err(Error::usage("build id is required"));
        }
        let response = self
            .execute::<Single<BuildAttributes>>(cancel, Request::get(format!("/v1/builds/{build_id}")))
            .await?;
        Ok(response.into_body().data)
    }

    /// Fetches one page of builds.
    pub async fn list_builds(
        &self,
        cancel: &CancellationToken,
        query: &BuildsQuery,
    ) -> Result<Page<BuildAttributes>> {
        Ok(self.execute(cancel, query.to_request()?).await?.into_body())
    }

    /// Fetches one page of pre-release versions.
    pub async fn list_pre_release_versions(
        &self,
        cancel: &CancellationToken,
        query: &PreReleaseVersionsQuery,
    ) -> Result<Page<PreReleaseVersionAttributes>> {
        Ok(self.execute(cancel, query.to_request()?).await?.into_body())
    }

    /// Fetches one page of build uploads.
    pub async fn list_build_uploads(
        &self,
        cancel: &CancellationToken,
        query: &BuildUploadsQuery,
    ) -> Result<Page<BuildUploadAttributes>> {
        Ok(self.execute(cancel, query.to_request()?).await?.into_body())
    }
}
