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

//! Typed models for the resources the client core works with.
//!
//! Only the attributes the core needs are modeled. Unknown keys are ignored.

use crate::envelope::{Relationship, Resource};
use serde::{Deserialize, Serialize};

pub(crate) const BUILDS: &str = "builds";
pub(crate) const APPS: &str = "apps";
pub(crate) const BUILD_UPLOADS: &str = "buildUploads";
pub(crate) const BUILD_UPLOAD_FILES: &str = "buildUploadFiles";

/// An App Store platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "IOS")]
    Ios,
    #[serde(rename = "MAC_OS")]
    MacOs,
    #[serde(rename = "TV_OS")]
    TvOs,
    #[serde(rename = "VISION_OS")]
    VisionOs,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ios => "IOS",
            Self::MacOs => "MAC_OS",
            Self::TvOs => "TV_OS",
            Self::VisionOs => "VISION_OS",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = gax::error::Error;

    /// Parses a platform name, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> gax::Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IOS" => Ok(Self::Ios),
            "MAC_OS" => Ok(Self::MacOs),
            "TV_OS" => Ok(Self::TvOs),
            "VISION_OS" => Ok(Self::VisionOs),
            _ => Err(gax::error::Error::usage(
                "platform must be IOS, MAC_OS, TV_OS, or VISION_OS",
            )),
        }
    }
}

/// The uniform type identifier of an uploaded binary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Uti {
    #[serde(rename = "com.apple.ipa")]
    Ipa,
    #[serde(rename = "com.apple.pkg")]
    Pkg,
}

impl Uti {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ipa => "com.apple.ipa",
            Self::Pkg => "com.apple.pkg",
        }
    }
}

/// The processing state of a build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessingState {
    Processing,
    Valid,
    Failed,
    Invalid,
    /// Any other value, including an empty one.
    Other(String),
}

impl ProcessingState {
    pub const ALL: [&'static str; 4] = ["PROCESSING", "FAILED", "INVALID", "VALID"];

    /// Parses a state, ignoring case and surrounding whitespace.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PROCESSING" => Self::Processing,
            "VALID" => Self::Valid,
            "FAILED" => Self::Failed,
            "INVALID" => Self::Invalid,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Processing => "PROCESSING",
            Self::Valid => "VALID",
            Self::Failed => "FAILED",
            Self::Invalid => "INVALID",
            Self::Other(s) if s.is_empty() => "UNKNOWN",
            Self::Other(s) => s,
        }
    }

    /// PROCESSING and unknown states are not terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Valid | Self::Failed | Self::Invalid)
    }
}

impl std::fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildAttributes {
    /// The build number (`CFBundleVersion`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_os_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_state: Option<String>,
}

impl BuildAttributes {
    pub fn processing_state(&self) -> ProcessingState {
        ProcessingState::parse(self.processing_state.as_deref().unwrap_or_default())
    }
}

pub type Build = Resource<BuildAttributes>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreReleaseVersionAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

pub type PreReleaseVersion = Resource<PreReleaseVersionAttributes>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildUploadAttributes {
    #[serde(
        rename = "cfBundleShortVersionString",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cf_bundle_short_version_string: Option<String>,
    #[serde(
        rename = "cfBundleVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cf_bundle_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(rename = "createdDate", default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    /// The upload state, reported as an object with details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
}

pub type BuildUpload = Resource<BuildUploadAttributes>;

/// A header the upload request must carry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

/// One presigned upload operation.
///
/// Each operation addresses its own byte range of the source file. The
/// method, URL and headers come entirely from the service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOperation {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub request_headers: Vec<HttpHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
}

pub(crate) const MD5: &str = "MD5";

/// A single checksum value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Checksum {
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
}

impl Checksum {
    pub fn md5<T: Into<String>>(hash: T) -> Self {
        Self {
            hash: hash.into(),
            algorithm: Some(MD5.to_string()),
        }
    }
}

/// The whole-file and composite checksums of a source file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Checksums {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<Checksum>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite: Option<Checksum>,
}

impl Checksums {
    pub fn is_empty(&self) -> bool {
        self.file.is_none() && self.composite.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildUploadFileAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_operations: Option<Vec<UploadOperation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file_checksums: Option<Checksums>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded: Option<bool>,
}

pub type BuildUploadFile = Resource<BuildUploadFileAttributes>;

// Request bodies.

#[derive(Clone, Debug, Serialize)]
pub(crate) struct CreateBody<A, R> {
    pub data: CreateData<A, R>,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct CreateData<A, R> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub attributes: A,
    pub relationships: R,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct BuildUploadCreateAttributes {
    #[serde(rename = "cfBundleShortVersionString")]
    pub cf_bundle_short_version_string: String,
    #[serde(rename = "cfBundleVersion")]
    pub cf_bundle_version: String,
    pub platform: Platform,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct BuildUploadRelationships {
    pub app: Relationship,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BuildUploadFileCreateAttributes {
    pub file_name: String,
    pub file_size: u64,
    pub uti: Uti,
    pub asset_type: &'static str,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BuildUploadFileRelationships {
    pub build_upload: Relationship,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct UpdateBody<A> {
    pub data: UpdateData<A>,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct UpdateData<A> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
    pub attributes: A,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BuildUploadFileCommitAttributes {
    pub uploaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file_checksums: Option<Checksums>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("IOS", Platform::Ios)]
    #[test_case(" mac_os ", Platform::MacOs)]
    #[test_case("tv_os", Platform::TvOs)]
    #[test_case("VISION_OS", Platform::VisionOs)]
    fn platform_parse(input: &str, want: Platform) -> anyhow::Result<()> {
        let got = input.parse::<Platform>()?;
        assert_eq!(got, want);
        assert_eq!(got.to_string(), want.as_str());
        Ok(())
    }

    #[test]
    fn platform_parse_error() {
        let err = "WATCH_OS".parse::<Platform>().unwrap_err();
        assert!(err.is_usage(), "{err:?}");
    }

    #[test_case("VALID", ProcessingState::Valid, true)]
    #[test_case(" valid ", ProcessingState::Valid, true)]
    #[test_case("FAILED", ProcessingState::Failed, true)]
    #[test_case("invalid", ProcessingState::Invalid, true)]
    #[test_case("PROCESSING", ProcessingState::Processing, false)]
    #[test_case("", ProcessingState::Other(String::new()), false)]
    #[test_case("QUEUED", ProcessingState::Other("QUEUED".into()), false)]
    fn processing_state(input: &str, want: ProcessingState, terminal: bool) {
        let got = ProcessingState::parse(input);
        assert_eq!(got, want);
        assert_eq!(got.is_terminal(), terminal);
    }

    #[test]
    fn empty_state_displays_unknown() {
        assert_eq!(ProcessingState::parse("  ").to_string(), "UNKNOWN");
    }

    #[test]
    fn upload_file_attributes() -> anyhow::Result<()> {
        let file: BuildUploadFile = serde_json::from_value(json!({
            "type": "buildUploadFiles",
            "id": "file-1",
            "attributes": {
                "fileName": "app.ipa",
                "fileSize": 20,
                "uploadOperations": [{
                    "method": "PUT",
                    "url": "https://upload.example.com/part1",
                    "offset": 0,
                    "length": 10,
                    "partNumber": 1,
                    "requestHeaders": [{"name": "Content-Type", "value": "application/octet-stream"}],
                }],
                "sourceFileChecksums": {
                    "file": {"hash": "abc", "algorithm": "MD5"},
                },
                "someFutureField": true,
            },
        }))?;
        let ops = file.attributes.upload_operations.unwrap_or_default();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].part_number, Some(1));
        assert_eq!(ops[0].request_headers[0].name, "Content-Type");
        let checksums = file.attributes.source_file_checksums.unwrap_or_default();
        assert_eq!(checksums.file, Some(Checksum::md5("abc")));
        assert!(checksums.composite.is_none());
        Ok(())
    }

    #[test]
    fn commit_body() -> anyhow::Result<()> {
        let body = UpdateBody {
            data: UpdateData {
                kind: BUILD_UPLOAD_FILES,
                id: "file-1".into(),
                attributes: BuildUploadFileCommitAttributes {
                    uploaded: true,
                    source_file_checksums: None,
                },
            },
        };
        assert_eq!(
            serde_json::to_value(&body)?,
            json!({"data": {"type": "buildUploadFiles", "id": "file-1", "attributes": {"uploaded": true}}})
        );
        Ok(())
    }
}
