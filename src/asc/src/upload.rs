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

//! Uploads a build binary.
//!
//! An upload has three phases:
//!
//! 1. Reserve: create a build upload record and a file record. The service
//!    returns the presigned upload operations for the file.
//! 2. Upload: send the byte range of each operation, with bounded
//!    concurrency. The first operation to fail permanently cancels the rest.
//! 3. Commit: mark the file as uploaded, with the verified checksums when
//!    checksum verification was requested.
//!
//! A failed upload is not cleaned up, the service expires the reservation.

use crate::checksum::{self, file_error};
use crate::client::{Client, Request, map_send_error};
use crate::config::DEFAULT_MAX_ATTEMPTS;
use crate::envelope::{Relationship, Single};
use crate::model::{
    APPS, BUILD_UPLOAD_FILES, BUILD_UPLOADS, Build, BuildUpload, BuildUploadCreateAttributes,
    BuildUploadFile, BuildUploadFileAttributes, BuildUploadFileCommitAttributes,
    BuildUploadFileCreateAttributes, BuildUploadFileRelationships, BuildUploadRelationships,
    Checksums, CreateBody, CreateData, Platform, UpdateBody, UpdateData, UploadOperation, Uti,
};
use crate::query::BuildsQuery;
use crate::wait::{WaitOptions, wait_for_processing};
use futures::TryStreamExt;
use gax::Result;
use gax::error::Error;
use gax::retry_loop::retry_loop;
use gax::retry_policy::{RetryPolicy, RetryPolicyExt, RetryResult};
use http::header::{CONTENT_LENGTH, HeaderMap, HeaderName, HeaderValue};
use http::Method;
use serde::Serialize;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;

const ASSET_TYPE: &str = "ASSET";

/// Describes a build upload.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadBuildRequest {
    pub app_id: String,
    pub path: PathBuf,
    pub uti: Uti,
    /// The marketing version (`CFBundleShortVersionString`).
    pub version: String,
    /// The build number (`CFBundleVersion`).
    pub build_number: String,
    /// Defaults to `IOS` for IPA files. PKG files are always `MAC_OS`.
    pub platform: Option<Platform>,
    /// Only reserve the upload, and return the upload operations.
    pub dry_run: bool,
    /// The maximum number of operations in flight.
    pub concurrency: usize,
    /// Verify the source file against the checksums returned by the service.
    pub verify_checksum: bool,
    /// The chunk size for the composite checksum, used when the upload
    /// operations do not imply one.
    pub chunk_size: u64,
    /// Wait for the build to finish processing after the commit.
    pub wait: Option<WaitOptions>,
}

impl UploadBuildRequest {
    pub fn new<A, P>(app_id: A, path: P, uti: Uti) -> Self
    where
        A: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            app_id: app_id.into(),
            path: path.into(),
            uti,
            version: String::new(),
            build_number: String::new(),
            platform: None,
            dry_run: false,
            concurrency: 1,
            verify_checksum: false,
            chunk_size: checksum::DEFAULT_CHUNK_SIZE,
            wait: None,
        }
    }

    /// Uploads an `.ipa` file, for iOS, tvOS and visionOS apps.
    pub fn ipa<A: Into<String>, P: Into<PathBuf>>(app_id: A, path: P) -> Self {
        Self::new(app_id, path, Uti::Ipa)
    }

    /// Uploads a `.pkg` file, for macOS apps.
    pub fn pkg<A: Into<String>, P: Into<PathBuf>>(app_id: A, path: P) -> Self {
        Self::new(app_id, path, Uti::Pkg)
    }

    pub fn with_version<T: Into<String>>(mut self, v: T) -> Self {
        self.version = v.into();
        self
    }

    pub fn with_build_number<T: Into<String>>(mut self, v: T) -> Self {
        self.build_number = v.into();
        self
    }

    pub fn with_platform(mut self, v: Platform) -> Self {
        self.platform = Some(v);
        self
    }

    pub fn with_dry_run(mut self, v: bool) -> Self {
        self.dry_run = v;
        self
    }

    pub fn with_concurrency(mut self, v: usize) -> Self {
        self.concurrency = v;
        self
    }

    pub fn with_verify_checksum(mut self, v: bool) -> Self {
        self.verify_checksum = v;
        self
    }

    pub fn with_chunk_size(mut self, v: u64) -> Self {
        self.chunk_size = v;
        self
    }

    pub fn with_wait(mut self, v: WaitOptions) -> Self {
        self.wait = Some(v);
        self
    }

    /// Validates the options and returns the effective platform.
    fn validate(&self) -> Result<Platform> {
        if self.app_id.trim().is_empty() {
            return Err(Error::usage("app id is required"));
        }
        let platform = match (self.uti, self.platform) {
            (Uti::Pkg, None | Some(Platform::MacOs)) => Platform::MacOs,
            (Uti::Pkg, Some(_)) => {
                return Err(Error::usage("pkg uploads require the MAC_OS platform"));
            }
            (Uti::Ipa, p) => p.unwrap_or(Platform::Ios),
        };
        if self.dry_run {
            if self.concurrency != 1 {
                return Err(Error::usage("concurrency is not supported with dry run"));
            }
            if self.verify_checksum {
                return Err(Error::usage("checksum verification is not supported with dry run"));
            }
            if self.wait.is_some() {
                return Err(Error::usage("waiting is not supported with dry run"));
            }
        } else if self.concurrency < 1 {
            return Err(Error::usage("concurrency must be at least 1"));
        }
        if let Some(wait) = &self.wait {
            wait.validate()?;
        }
        let missing = [
            ("version", self.version.trim().is_empty()),
            ("build number", self.build_number.trim().is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(Error::usage(format!("{} required", missing.join(" and "))));
        }
        Ok(platform)
    }
}

/// The outcome of [Client::upload_build].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBuildResult {
    pub upload_id: String,
    pub file_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// Only set for dry runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operations: Option<Vec<UploadOperation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file_checksums: Option<Checksums>,
    /// The processed build, only set when waiting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<Build>,
}

impl Client {
    /// Reserves, uploads, verifies and commits a build binary.
    pub async fn upload_build(
        &self,
        cancel: &CancellationToken,
        request: &UploadBuildRequest,
    ) -> Result<UploadBuildResult> {
        let platform = request.validate()?;
        let metadata = tokio::fs::metadata(&request.path)
            .await
            .map_err(|e| file_error(&request.path, e))?;
        if !metadata.is_file() {
            return Err(Error::usage(format!(
                "{} must be a file",
                request.path.display()
            )));
        }
        let file_name = request
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::usage(format!("{} has no file name", request.path.display())))?;
        let app_id = request.app_id.trim();
        let version = request.version.trim();
        let build_number = request.build_number.trim();

        let upload = self
            .create_build_upload(cancel, app_id, version, build_number, platform)
            .await?;
        let file = self
            .create_build_upload_file(cancel, &upload.id, &file_name, metadata.len(), request.uti)
            .await?;
        tracing::info!(upload_id = %upload.id, file_id = %file.id, "reserved build upload");

        let BuildUploadFileAttributes {
            file_name,
            file_size,
            upload_operations,
            source_file_checksums,
            ..
        } = file.attributes;
        let mut result = UploadBuildResult {
            upload_id: upload.id,
            file_id: file.id,
            file_name,
            file_size,
            ..Default::default()
        };
        let operations = upload_operations.unwrap_or_default();
        if request.dry_run {
            result.operations = Some(operations);
            return Ok(result);
        }
        if operations.is_empty() {
            return Err(Error::usage("no upload operations returned"));
        }

        self.execute_upload_operations(cancel, &request.path, &operations, request.concurrency)
            .await?;

        let mut verified = None;
        if request.verify_checksum {
            match source_file_checksums.filter(|c| !c.is_empty()) {
                None => self.config().diagnostics().line(
                    "Warning: checksum requested but API provided no checksums to verify; skipping",
                ),
                Some(expected) => {
                    let chunk_size = checksum::part_size(&operations).unwrap_or(request.chunk_size);
                    verified = Some(checksum::verify(&request.path, &expected, chunk_size).await?);
                    result.checksum_verified = Some(true);
                }
            }
        }

        let committed = self
            .commit_build_upload_file(cancel, &result.file_id, verified.clone())
            .await?;
        result.uploaded = Some(committed.attributes.uploaded.unwrap_or(true));
        result.source_file_checksums = verified;
        tracing::info!(file_id = %result.file_id, "committed build upload");

        if let Some(options) = &request.wait {
            let build = self
                .wait_for_uploaded_build(cancel, app_id, build_number, platform, options)
                .await?;
            result.build = Some(build);
        }
        Ok(result)
    }

    /// Creates the build upload record: `POST /v1/buildUploads`.
    pub async fn create_build_upload(
        &self,
        cancel: &CancellationToken,
        app_id: &str,
        version: &str,
        build_number: &str,
        platform: Platform,
    ) -> Result<BuildUpload> {
        let body = CreateBody {
            data: CreateData {
                kind: BUILD_UPLOADS,
                attributes: BuildUploadCreateAttributes {
                    cf_bundle_short_version_string: version.to_string(),
                    cf_bundle_version: build_number.to_string(),
                    platform,
                },
                relationships: BuildUploadRelationships {
                    app: Relationship::new(APPS, app_id),
                },
            },
        };
        let request = Request::post("/v1/buildUploads").with_body(&body)?;
        let response = self.execute::<Single<_>>(cancel, request).await?;
        Ok(response.into_body().data)
    }

    /// Reserves the file: `POST /v1/buildUploadFiles`.
    pub async fn create_build_upload_file(
        &self,
        cancel: &CancellationToken,
        upload_id: &str,
        file_name: &str,
        file_size: u64,
        uti: Uti,
    ) -> Result<BuildUploadFile> {
        let body = CreateBody {
            data: CreateData {
                kind: BUILD_UPLOAD_FILES,
                attributes: BuildUploadFileCreateAttributes {
                    file_name: file_name.to_string(),
                    file_size,
                    uti,
                    asset_type: ASSET_TYPE,
                },
                relationships: BuildUploadFileRelationships {
                    build_upload: Relationship::new(BUILD_UPLOADS, upload_id),
                },
            },
        };
        let request = Request::post("/v1/buildUploadFiles").with_body(&body)?;
        let response = self.execute::<Single<_>>(cancel, request).await?;
        Ok(response.into_body().data)
    }

    /// Marks the file as uploaded: `PATCH /v1/buildUploadFiles/{id}`.
    ///
    /// Committing a file twice is not an error, thus the request is retried
    /// like an idempotent one.
    pub async fn commit_build_upload_file(
        &self,
        cancel: &CancellationToken,
        file_id: &str,
        checksums: Option<Checksums>,
    ) -> Result<BuildUploadFile> {
        let body = UpdateBody {
            data: UpdateData {
                kind: BUILD_UPLOAD_FILES,
                id: file_id.to_string(),
                attributes: BuildUploadFileCommitAttributes {
                    uploaded: true,
                    source_file_checksums: checksums,
                },
            },
        };
        let request = Request::patch(format!("/v1/buildUploadFiles/{file_id}"))
            .with_body(&body)?
            .with_idempotency(true)
            .with_timeout(self.config().upload_timeout());
        let response = self.execute::<Single<_>>(cancel, request).await?;
        Ok(response.into_body().data)
    }

    /// Sends the byte range of each operation to its presigned URL.
    ///
    /// At most `concurrency` operations are in flight. Operations start in
    /// order, and each one reads its range through its own file handle. The
    /// first permanent failure cancels the operations in flight.
    pub async fn execute_upload_operations(
        &self,
        cancel: &CancellationToken,
        path: &Path,
        operations: &[UploadOperation],
        concurrency: usize,
    ) -> Result<()> {
        if concurrency < 1 {
            return Err(Error::usage("concurrency must be at least 1"));
        }
        let file_size = tokio::fs::metadata(path)
            .await
            .map_err(|e| file_error(path, e))?
            .len();
        let total = operations.len();
        for (index, op) in operations.iter().enumerate() {
            if op.offset.checked_add(op.length).is_none_or(|end| end > file_size) {
                return Err(Error::usage(format!(
                    "the operation range {}+{} exceeds the file size {file_size}",
                    op.offset, op.length
                ))
                .with_operation(index));
            }
        }
        let diagnostics = self.config().diagnostics();
        let run = futures::stream::iter(operations.iter().enumerate().map(Ok::<_, Error>))
            .try_for_each_concurrent(concurrency, |(index, op)| {
                let diagnostics = diagnostics.clone();
                async move {
                    self.upload_operation(path, op)
                        .await
                        .map_err(|e| e.with_operation(index))?;
                    diagnostics.line(&format!(
                        "Uploaded part {}/{total} ({} bytes)",
                        index + 1,
                        op.length
                    ));
                    Ok(())
                }
            });
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::cancelled()),
            result = run => result,
        }
    }

    async fn upload_operation(&self, path: &Path, op: &UploadOperation) -> Result<()> {
        let method = Method::from_bytes(op.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|e| Error::usage(format!("invalid upload method {:?}: {e}", op.method)))?;
        let url = reqwest::Url::parse(op.url.trim())
            .map_err(|e| Error::usage(format!("invalid upload URL: {e}")))?;
        let headers = operation_headers(op)?;
        let timeout = self.config().upload_timeout();
        let policy = UploadRetryPolicy.with_attempt_limit(DEFAULT_MAX_ATTEMPTS);
        retry_loop(
            async || {
                let body = operation_body(path, op.offset, op.length).await?;
                let response = self
                    .http()
                    .request(method.clone(), url.clone())
                    .headers(headers.clone())
                    .timeout(timeout)
                    .body(body)
                    .send()
                    .await
                    .map_err(map_send_error)?;
                let status = response.status();
                if status.is_success() {
                    return Ok(());
                }
                let headers = response.headers().clone();
                let payload = match response.bytes().await {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(%status, error = %e, "cannot read the upload error response");
                        bytes::Bytes::new()
                    }
                };
                Err(Error::http(status.as_u16(), headers, payload))
            },
            async |d| tokio::time::sleep(d).await,
            true,
            &policy,
            self.config().backoff_policy(),
            |attempt, error, delay| {
                tracing::debug!(part = ?op.part_number, attempt, ?delay, %error, "retrying upload operation");
            },
        )
        .await
    }

    /// Polls until the uploaded build appears, then waits for processing.
    async fn wait_for_uploaded_build(
        &self,
        cancel: &CancellationToken,
        app_id: &str,
        build_number: &str,
        platform: Platform,
        options: &WaitOptions,
    ) -> Result<Build> {
        let diagnostics = self.config().diagnostics();
        let query = BuildsQuery::latest(app_id)
            .with_build_number(build_number)
            .with_platform(platform)
            .with_all_processing_states();
        let run = async {
            let build = gax::polling::poll_until(cancel, options.poll_interval, async || {
                let page = self.list_builds(cancel, &query).await?;
                let build = page.data.into_iter().next();
                if build.is_none() {
                    diagnostics.line(&format!(
                        "Waiting for build {build_number} to appear in App Store Connect..."
                    ));
                }
                Ok(build)
            })
            .await?;
            let build_id = build.id;
            wait_for_processing(
                cancel,
                &build_id,
                options,
                diagnostics.as_ref(),
                async || self.get_build(cancel, &build_id).await,
            )
            .await
        };
        tokio::time::timeout(options.timeout, run)
            .await
            .map_err(|_| {
                Error::timeout(format!(
                    "timed out waiting for build {build_number} after {}",
                    humantime::format_duration(options.timeout)
                ))
            })?
    }
}

fn operation_headers(op: &UploadOperation) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for h in &op.request_headers {
        let name = HeaderName::from_bytes(h.name.trim().as_bytes())
            .map_err(|e| Error::usage(format!("invalid upload header name {:?}: {e}", h.name)))?;
        let value = HeaderValue::from_str(&h.value)
            .map_err(|e| Error::usage(format!("invalid upload header value for {name}: {e}")))?;
        headers.append(name, value);
    }
    if !headers.contains_key(CONTENT_LENGTH) {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(op.length));
    }
    Ok(headers)
}

/// Opens a new handle on `path`, positioned at `offset` and limited to
/// `length` bytes.
async fn operation_reader(
    path: &Path,
    offset: u64,
    length: u64,
) -> Result<tokio::io::Take<tokio::fs::File>> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| file_error(path, e))?;
    file.seek(SeekFrom::Start(offset))
        .await
        .map_err(|e| file_error(path, e))?;
    Ok(file.take(length))
}

async fn operation_body(path: &Path, offset: u64, length: u64) -> Result<reqwest::Body> {
    let reader = operation_reader(path, offset, length).await?;
    Ok(reqwest::Body::wrap_stream(
        tokio_util::io::ReaderStream::new(reader),
    ))
}

/// Retries upload operations on transport errors, timeouts, `408`, `429` and
/// `5xx` responses.
#[derive(Clone, Copy, Debug, Default)]
struct UploadRetryPolicy;

impl RetryPolicy for UploadRetryPolicy {
    fn on_error(&self, _attempt_count: u32, _idempotent: bool, error: Error) -> RetryResult {
        if error.is_transient()
            || error.is_server_error()
            || error.is_rate_limited()
            || error.http_status_code() == Some(408)
        {
            return RetryResult::Continue(error);
        }
        RetryResult::Permanent(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{test_client, test_config};
    use crate::diagnostics::Capture;
    use httptest::{Expectation, Server, cycle, matchers::*, responders::*};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;
    use test_case::test_case;

    const MIB: usize = 1024 * 1024;

    fn source(content: &[u8]) -> anyhow::Result<NamedTempFile> {
        let mut file = tempfile::Builder::new().suffix(".ipa").tempfile()?;
        file.write_all(content)?;
        file.flush()?;
        Ok(file)
    }

    fn op(server: &Server, part: u32, offset: usize, length: usize) -> Value {
        json!({
            "method": "PUT",
            "url": server.url_str(&format!("/upload/part{part}")),
            "offset": offset,
            "length": length,
            "partNumber": part,
            "requestHeaders": [{"name": "Content-Type", "value": "application/octet-stream"}],
        })
    }

    fn expect_reserve(server: &Server, platform: &str, operations: Vec<Value>, checksums: Value) {
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/v1/buildUploads"),
                request::body(json_decoded(eq(json!({"data": {
                    "type": "buildUploads",
                    "attributes": {
                        "cfBundleShortVersionString": "1.2.3",
                        "cfBundleVersion": "42",
                        "platform": platform,
                    },
                    "relationships": {"app": {"data": {"type": "apps", "id": "app-1"}}},
                }})))),
            ])
            .times(1)
            .respond_with(
                status_code(201)
                    .body(json!({"data": {"type": "buildUploads", "id": "upload-1"}}).to_string()),
            ),
        );
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/v1/buildUploadFiles"),
                request::body(json_decoded(|v: &Value| {
                    v["data"]["type"] == "buildUploadFiles"
                        && v["data"]["attributes"]["assetType"] == "ASSET"
                        && v["data"]["relationships"]["buildUpload"]["data"]["id"] == "upload-1"
                })),
            ])
            .times(1)
            .respond_with(
                status_code(201).body(
                    json!({"data": {"type": "buildUploadFiles", "id": "file-1", "attributes": {
                        "fileName": "app.ipa",
                        "fileSize": 20,
                        "uploadOperations": operations,
                        "sourceFileChecksums": checksums,
                    }}})
                    .to_string(),
                ),
            ),
        );
    }

    fn expect_commit(server: &Server, checksums: Option<Value>) {
        let mut attributes = json!({"uploaded": true});
        if let Some(c) = checksums {
            attributes["sourceFileChecksums"] = c;
        }
        server.expect(
            Expectation::matching(all_of![
                request::method_path("PATCH", "/v1/buildUploadFiles/file-1"),
                request::body(json_decoded(eq(json!({"data": {
                    "type": "buildUploadFiles",
                    "id": "file-1",
                    "attributes": attributes,
                }})))),
            ])
            .times(1)
            .respond_with(json_encoded(json!({"data": {
                "type": "buildUploadFiles", "id": "file-1", "attributes": {"uploaded": true}
            }}))),
        );
    }

    fn request(file: &NamedTempFile) -> UploadBuildRequest {
        UploadBuildRequest::ipa("app-1", file.path())
            .with_version("1.2.3")
            .with_build_number("42")
    }

    #[tokio::test]
    async fn two_operations_with_checksum() -> anyhow::Result<()> {
        let content = b"AB".repeat(10 * MIB);
        let file = source(&content)?;
        let part1 = md5::compute(&content[..10 * MIB]).0;
        let part2 = md5::compute(&content[10 * MIB..]).0;
        let composite = format!("{:x}-2", md5::compute([part1, part2].concat()));
        let whole = format!("{:x}", md5::compute(&content));

        let server = Server::run();
        expect_reserve(
            &server,
            "IOS",
            vec![op(&server, 1, 0, 10 * MIB), op(&server, 2, 10 * MIB, 10 * MIB)],
            json!({
                "file": {"hash": whole, "algorithm": "MD5"},
                "composite": {"hash": composite, "algorithm": "MD5"},
            }),
        );
        for part in ["/upload/part1", "/upload/part2"] {
            server.expect(
                Expectation::matching(all_of![
                    request::method_path("PUT", part),
                    request::headers(contains(("content-length", "10485760"))),
                    request::headers(contains(("content-type", "application/octet-stream"))),
                    request::headers(not(contains(key("authorization")))),
                ])
                .times(1)
                .respond_with(status_code(200)),
            );
        }
        let checksums = json!({
            "file": {"hash": whole, "algorithm": "MD5"},
            "composite": {"hash": composite, "algorithm": "MD5"},
        });
        expect_commit(&server, Some(checksums.clone()));

        let client = test_client(test_config(&server));
        let result = client
            .upload_build(
                &CancellationToken::new(),
                &request(&file).with_concurrency(2).with_verify_checksum(true),
            )
            .await?;
        assert_eq!(result.upload_id, "upload-1");
        assert_eq!(result.file_id, "file-1");
        assert_eq!(result.uploaded, Some(true));
        assert_eq!(result.checksum_verified, Some(true));
        assert_eq!(
            serde_json::to_value(&result.source_file_checksums)?,
            checksums
        );
        assert_eq!(result.operations, None);
        Ok(())
    }

    #[tokio::test]
    async fn dry_run_returns_operations() -> anyhow::Result<()> {
        let file = source(b"0123456789")?;
        let server = Server::run();
        expect_reserve(&server, "IOS", vec![op(&server, 1, 0, 10)], Value::Null);
        let client = test_client(test_config(&server));
        let result = client
            .upload_build(&CancellationToken::new(), &request(&file).with_dry_run(true))
            .await?;
        let operations = result.operations.unwrap_or_default();
        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0].length, 10);
        assert_eq!(result.uploaded, None);
        Ok(())
    }

    #[tokio::test]
    async fn no_operations() -> anyhow::Result<()> {
        let file = source(b"0123456789")?;
        let server = Server::run();
        expect_reserve(&server, "IOS", vec![], Value::Null);
        let client = test_client(test_config(&server));
        let err = client
            .upload_build(&CancellationToken::new(), &request(&file))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no upload operations returned");
        Ok(())
    }

    #[tokio::test]
    async fn checksum_without_expected_values_warns() -> anyhow::Result<()> {
        let file = source(b"0123456789")?;
        let server = Server::run();
        expect_reserve(&server, "IOS", vec![op(&server, 1, 0, 10)], Value::Null);
        server.expect(
            Expectation::matching(request::method_path("PUT", "/upload/part1"))
                .respond_with(status_code(200)),
        );
        expect_commit(&server, None);
        let capture = Capture::new();
        let client = test_client(test_config(&server).set_diagnostics(capture.clone()));
        let result = client
            .upload_build(&CancellationToken::new(), &request(&file).with_verify_checksum(true))
            .await?;
        assert_eq!(result.checksum_verified, None);
        assert!(
            capture
                .lines()
                .iter()
                .any(|l| l.contains("API provided no checksums to verify; skipping")),
            "{:?}",
            capture.lines()
        );
        Ok(())
    }

    #[tokio::test]
    async fn checksum_mismatch_skips_commit() -> anyhow::Result<()> {
        let file = source(b"0123456789")?;
        let server = Server::run();
        expect_reserve(
            &server,
            "IOS",
            vec![op(&server, 1, 0, 10)],
            json!({"file": {"hash": "00000000000000000000000000000000", "algorithm": "MD5"}}),
        );
        server.expect(
            Expectation::matching(request::method_path("PUT", "/upload/part1"))
                .respond_with(status_code(200)),
        );
        let client = test_client(test_config(&server));
        let err = client
            .upload_build(&CancellationToken::new(), &request(&file).with_verify_checksum(true))
            .await
            .unwrap_err();
        assert!(err.is_checksum_mismatch(), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn operation_retried_on_server_error() -> anyhow::Result<()> {
        let file = source(b"0123456789")?;
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", "/upload/part1"))
                .times(3)
                .respond_with(cycle![
                    status_code(503),
                    status_code(408),
                    status_code(200),
                ]),
        );
        let operations: Vec<UploadOperation> =
            serde_json::from_value(json!([op(&server, 1, 0, 10)]))?;
        let client = test_client(test_config(&server));
        client
            .execute_upload_operations(&CancellationToken::new(), file.path(), &operations, 1)
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn operation_failure_has_index() -> anyhow::Result<()> {
        let file = source(b"0123456789")?;
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", "/upload/part1"))
                .respond_with(status_code(200)),
        );
        server.expect(
            Expectation::matching(request::method_path("PUT", "/upload/part2"))
                .times(1)
                .respond_with(status_code(403).body("expired")),
        );
        let operations: Vec<UploadOperation> =
            serde_json::from_value(json!([op(&server, 1, 0, 5), op(&server, 2, 5, 5)]))?;
        let client = test_client(test_config(&server));
        let err = client
            .execute_upload_operations(&CancellationToken::new(), file.path(), &operations, 1)
            .await
            .unwrap_err();
        assert_eq!(err.operation(), Some(1));
        assert_eq!(err.http_status_code(), Some(403));
        assert_eq!(err.http_payload().map(|p| p.as_ref()), Some(b"expired".as_slice()));
        assert!(err.to_string().starts_with("upload operation 1: "), "{err}");
        Ok(())
    }

    #[test_case(1; "sequential")]
    #[test_case(3; "concurrent")]
    #[tokio::test]
    async fn operations_send_exact_ranges(concurrency: usize) -> anyhow::Result<()> {
        let parts: [&[u8]; 4] = [b"alpha-", b"bravo--", b"charlie-", b"delta!!!!"];
        let file = source(&parts.concat())?;
        let server = Server::run();
        let mut operations = Vec::new();
        let mut offset = 0;
        for (i, part) in parts.iter().enumerate() {
            let number = i as u32 + 1;
            operations.push(op(&server, number, offset, part.len()));
            offset += part.len();
            server.expect(
                Expectation::matching(all_of![
                    request::method("PUT"),
                    request::path(eq(format!("/upload/part{number}"))),
                    request::body(eq(part.to_vec())),
                ])
                .times(1)
                .respond_with(status_code(200)),
            );
        }
        let operations: Vec<UploadOperation> = serde_json::from_value(Value::Array(operations))?;
        let capture = Capture::new();
        let client = test_client(test_config(&server).set_diagnostics(capture.clone()));
        client
            .execute_upload_operations(&CancellationToken::new(), file.path(), &operations, concurrency)
            .await?;
        let mut lines = capture.lines();
        lines.sort();
        assert_eq!(
            lines,
            vec![
                "Uploaded part 1/4 (6 bytes)",
                "Uploaded part 2/4 (7 bytes)",
                "Uploaded part 3/4 (8 bytes)",
                "Uploaded part 4/4 (9 bytes)",
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn commit_can_be_repeated() -> anyhow::Result<()> {
        let server = Server::run();
        let committed = json!({"data": {
            "type": "buildUploadFiles", "id": "file-1", "attributes": {"uploaded": true}
        }});
        server.expect(
            Expectation::matching(all_of![
                request::method_path("PATCH", "/v1/buildUploadFiles/file-1"),
                request::body(json_decoded(eq(json!({"data": {
                    "type": "buildUploadFiles",
                    "id": "file-1",
                    "attributes": {"uploaded": true},
                }})))),
            ])
            .times(3)
            .respond_with(cycle![
                status_code(503),
                json_encoded(committed.clone()),
                json_encoded(committed),
            ]),
        );
        let client = test_client(test_config(&server));
        let cancel = CancellationToken::new();
        // The first commit survives a server error, the second one finds the
        // file already committed.
        let first = client.commit_build_upload_file(&cancel, "file-1", None).await?;
        let second = client.commit_build_upload_file(&cancel, "file-1", None).await?;
        assert_eq!(first.attributes.uploaded, Some(true));
        assert_eq!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn permanent_failure_stops_upload_without_commit() -> anyhow::Result<()> {
        let file = source(b"0123456789abcde")?;
        let server = Server::run();
        expect_reserve(
            &server,
            "IOS",
            vec![op(&server, 1, 0, 5), op(&server, 2, 5, 5), op(&server, 3, 10, 5)],
            Value::Null,
        );
        for part in ["/upload/part1", "/upload/part3"] {
            server.expect(
                Expectation::matching(request::method_path("PUT", part))
                    .times(0..=1)
                    .respond_with(delay_and_then(Duration::from_secs(5), status_code(200))),
            );
        }
        server.expect(
            Expectation::matching(request::method_path("PUT", "/upload/part2"))
                .times(1)
                .respond_with(status_code(403).body("signature expired")),
        );
        server.expect(Expectation::matching(request::method("PATCH")).times(0).respond_with(status_code(200)));

        let client = test_client(test_config(&server));
        let start = std::time::Instant::now();
        let err = client
            .upload_build(&CancellationToken::new(), &request(&file).with_concurrency(3))
            .await
            .unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(3), "{:?}", start.elapsed());
        assert_eq!(err.operation(), Some(1), "{err:?}");
        assert_eq!(err.http_status_code(), Some(403), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn operation_range_outside_file() -> anyhow::Result<()> {
        let file = source(b"0123456789")?;
        let server = Server::run();
        let operations: Vec<UploadOperation> =
            serde_json::from_value(json!([op(&server, 1, 5, 10)]))?;
        let client = test_client(test_config(&server));
        let err = client
            .execute_upload_operations(&CancellationToken::new(), file.path(), &operations, 1)
            .await
            .unwrap_err();
        assert!(err.is_usage(), "{err:?}");
        assert_eq!(err.operation(), Some(0));
        Ok(())
    }

    #[tokio::test]
    async fn cancelled() -> anyhow::Result<()> {
        let file = source(b"0123456789")?;
        let server = Server::run();
        let operations: Vec<UploadOperation> =
            serde_json::from_value(json!([op(&server, 1, 0, 10)]))?;
        let client = test_client(test_config(&server));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client
            .execute_upload_operations(&cancel, file.path(), &operations, 1)
            .await
            .unwrap_err();
        assert!(err.is_cancelled(), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn reader_covers_exact_range() -> anyhow::Result<()> {
        let content = b"0123456789abcdef";
        let file = source(content)?;
        let mut parts = Vec::new();
        for (offset, length) in [(12, 4), (0, 5), (5, 7)] {
            let mut buffer = Vec::new();
            operation_reader(file.path(), offset, length)
                .await?
                .read_to_end(&mut buffer)
                .await?;
            parts.push((offset, buffer));
        }
        parts.sort();
        let joined = parts.into_iter().flat_map(|(_, b)| b).collect::<Vec<_>>();
        assert_eq!(joined, content);
        Ok(())
    }

    #[test]
    fn headers_include_content_length() -> anyhow::Result<()> {
        let op = UploadOperation {
            length: 42,
            request_headers: vec![crate::model::HttpHeader {
                name: "Content-Type".into(),
                value: "application/octet-stream".into(),
            }],
            ..Default::default()
        };
        let headers = operation_headers(&op)?;
        assert_eq!(headers.get(CONTENT_LENGTH), Some(&HeaderValue::from(42_u64)));
        assert_eq!(
            headers.get("content-type"),
            Some(&HeaderValue::from_static("application/octet-stream"))
        );
        Ok(())
    }

    #[test]
    fn invalid_header() {
        let op = UploadOperation {
            request_headers: vec![crate::model::HttpHeader {
                name: "bad header".into(),
                value: "x".into(),
            }],
            ..Default::default()
        };
        let err = operation_headers(&op).unwrap_err();
        assert!(err.is_usage(), "{err:?}");
    }

    #[test_case(UploadBuildRequest::ipa("", "a.ipa").with_version("1").with_build_number("1"); "missing app")]
    #[test_case(UploadBuildRequest::pkg("app", "a.pkg").with_version("1").with_build_number("1").with_platform(Platform::Ios); "pkg on ios")]
    #[test_case(UploadBuildRequest::ipa("app", "a.ipa").with_version("1").with_build_number("1").with_dry_run(true).with_concurrency(2); "dry run concurrency")]
    #[test_case(UploadBuildRequest::ipa("app", "a.ipa").with_version("1").with_build_number("1").with_dry_run(true).with_verify_checksum(true); "dry run checksum")]
    #[test_case(UploadBuildRequest::ipa("app", "a.ipa").with_version("1").with_build_number("1").with_dry_run(true).with_wait(WaitOptions::default()); "dry run wait")]
    #[test_case(UploadBuildRequest::ipa("app", "a.ipa").with_version("1").with_build_number("1").with_concurrency(0); "zero concurrency")]
    #[test_case(UploadBuildRequest::ipa("app", "a.ipa").with_build_number("1"); "missing version")]
    #[test_case(UploadBuildRequest::ipa("app", "a.ipa").with_version("1"); "missing build number")]
    fn validation_errors(request: UploadBuildRequest) {
        let err = request.validate().unwrap_err();
        assert!(err.is_usage(), "{err:?}");
    }

    #[test_case(UploadBuildRequest::ipa("app", "a.ipa"), None, Platform::Ios)]
    #[test_case(UploadBuildRequest::ipa("app", "a.ipa"), Some(Platform::TvOs), Platform::TvOs)]
    #[test_case(UploadBuildRequest::pkg("app", "a.pkg"), None, Platform::MacOs)]
    #[test_case(UploadBuildRequest::pkg("app", "a.pkg"), Some(Platform::MacOs), Platform::MacOs)]
    fn effective_platform(
        request: UploadBuildRequest,
        platform: Option<Platform>,
        want: Platform,
    ) -> anyhow::Result<()> {
        let mut request = request.with_version("1").with_build_number("1");
        request.platform = platform;
        assert_eq!(request.validate()?, want);
        Ok(())
    }

    #[test]
    fn missing_fields_message() {
        let err = UploadBuildRequest::ipa("app", "a.ipa").validate().unwrap_err();
        assert_eq!(err.to_string(), "version and build number required");
    }

    #[tokio::test]
    async fn upload_and_wait() -> anyhow::Result<()> {
        let file = source(b"0123456789")?;
        let server = Server::run();
        expect_reserve(&server, "IOS", vec![op(&server, 1, 0, 10)], Value::Null);
        server.expect(
            Expectation::matching(request::method_path("PUT", "/upload/part1"))
                .respond_with(status_code(200)),
        );
        expect_commit(&server, None);
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/v1/builds"),
                request::query(url_decoded(contains(("filter[version]", "42")))),
            ])
            .times(2)
            .respond_with(cycle![
                json_encoded(json!({"data": []})),
                json_encoded(json!({"data": [{"type": "builds", "id": "build-1"}]})),
            ]),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/v1/builds/build-1"))
                .times(2)
                .respond_with(cycle![
                    json_encoded(json!({"data": {"type": "builds", "id": "build-1", "attributes": {"processingState": "PROCESSING"}}})),
                    json_encoded(json!({"data": {"type": "builds", "id": "build-1", "attributes": {"processingState": "VALID"}}})),
                ]),
        );
        let capture = Capture::new();
        let client = test_client(test_config(&server).set_diagnostics(capture.clone()));
        let result = client
            .upload_build(
                &CancellationToken::new(),
                &request(&file).with_wait(
                    WaitOptions::default().with_poll_interval(Duration::from_millis(10)),
                ),
            )
            .await?;
        let build = result.build.expect("waited for the build");
        assert_eq!(build.id, "build-1");
        let lines = capture.lines();
        assert!(
            lines.iter().any(|l| l.starts_with("Waiting for build 42 to appear")),
            "{lines:?}"
        );
        assert!(
            lines.iter().any(|l| l.starts_with("Waiting for build build-1... (VALID")),
            "{lines:?}"
        );
        Ok(())
    }
}
