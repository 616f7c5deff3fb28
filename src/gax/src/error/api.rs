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

use serde::{Deserialize, Serialize};

/// The error payload returned by App Store Connect.
///
/// App Store Connect reports failures as a JSON document with an `errors`
/// array. Each entry carries an HTTP status (as a string), a machine-readable
/// code, a title and a human-readable detail. All fields are optional, and
/// unknown fields are ignored.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiErrorPayload {
    pub errors: Vec<ApiErrorEntry>,
}

/// One entry in an [ApiErrorPayload].
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiErrorEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ApiErrorPayload {
    /// Parses the payload, returns `None` if the body is not an error document
    /// or if the document has no entries.
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice::<Self>(body)
            .ok()
            .filter(|p| !p.errors.is_empty())
    }

    /// Returns true if any entry reports that the app name is already in use.
    pub fn is_duplicate_app_name(&self) -> bool {
        self.errors.iter().any(ApiErrorEntry::is_duplicate_app_name)
    }

    /// Classifies the payload of a `409 Conflict` response.
    pub fn conflict_kind(&self) -> ConflictKind {
        if self.is_duplicate_app_name() {
            return ConflictKind::DuplicateAppName;
        }
        let code = self
            .errors
            .iter()
            .find_map(|e| e.code.clone())
            .unwrap_or_default();
        ConflictKind::Other(code)
    }
}

impl ApiErrorEntry {
    fn is_duplicate_app_name(&self) -> bool {
        let code = self.code.as_deref().unwrap_or_default().to_uppercase();
        let title = self.title.as_deref().unwrap_or_default().to_lowercase();
        let detail = self.detail.as_deref().unwrap_or_default().to_lowercase();
        if detail.contains("app name you entered is already being used") {
            return true;
        }
        code.contains("DUPLICATE") && (detail.contains("app name") || title.contains("app name"))
    }
}

impl std::fmt::Display for ApiErrorEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts = [&self.code, &self.title, &self.detail];
        let mut first = true;
        for p in parts.into_iter().flatten().filter(|s| !s.is_empty()) {
            if !first {
                f.write_str(": ")?;
            }
            f.write_str(p)?;
            first = false;
        }
        Ok(())
    }
}

/// The kind of a `409 Conflict` error.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConflictKind {
    /// The app name is already used by another app.
    DuplicateAppName,
    /// Any other conflict, carrying the service error code (possibly empty).
    Other(String),
}

impl ConflictKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::DuplicateAppName => "duplicate-app-name",
            Self::Other(code) => code.as_str(),
        }
    }
}
