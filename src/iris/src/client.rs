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

//! A client for the IRIS API, the web API behind App Store Connect.

use crate::errors::{ApiError, Error, Result};
use crate::login::{Endpoints, Session, read};
use http::header::{ACCEPT, CONTENT_TYPE, ORIGIN, REFERER};
use http::{HeaderMap, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

const REQUEST_ID: &str = "x-apple-request-uuid";
const CORRELATION_KEY: &str = "x-apple-jingle-correlation-key";

const DEFAULT_PRIMARY_LOCALE: &str = "en-US";
const DEFAULT_PLATFORM: &str = "IOS";
const DEFAULT_VERSION: &str = "1.0";
const PLATFORMS: [&str; 4] = ["IOS", "MAC_OS", "TV_OS", "UNIVERSAL"];

/// Sends IRIS requests over an authenticated [Session].
#[derive(Clone, Debug)]
pub struct IrisClient {
    http: reqwest::Client,
    endpoints: Arc<Endpoints>,
    headers: HeaderMap,
}

impl IrisClient {
    pub fn new(session: &Session) -> Result<Self> {
        let endpoints = Arc::new(session.endpoints().clone());
        let origin = endpoints.app_store();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        headers.insert(ORIGIN, header_value(origin)?);
        headers.insert(REFERER, header_value(&format!("{origin}/"))?);
        Ok(Self {
            http: session.http().clone(),
            endpoints,
            headers,
        })
    }

    /// Creates an app, its first version and its app info in one request.
    pub async fn create_app(&self, attributes: AppCreateAttributes) -> Result<App> {
        let attributes = attributes.normalize()?;
        let body = create_app_request(&attributes);
        let response = self.send(Method::POST, "/apps", &[], Some(&body)).await?;
        let response = serde_json::from_slice::<Single>(&response)
            .map_err(|e| Error::decode("create app", e))?;
        tracing::info!(id = %response.data.id, bundle_id = %attributes.bundle_id, "created app");
        Ok(response.data)
    }

    /// Finds an app by its bundle id.
    pub async fn find_app(&self, bundle_id: &str) -> Result<Option<App>> {
        let bundle_id = bundle_id.trim();
        if bundle_id.is_empty() {
            return Err(Error::usage("bundle id is required"));
        }
        let response = self
            .send(Method::GET, "/apps", &[("filter[bundleId]", bundle_id)], None)
            .await?;
        let response = serde_json::from_slice::<List>(&response)
            .map_err(|e| Error::decode("find app", e))?;
        Ok(response.data.into_iter().next())
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> Result<bytes::Bytes> {
        let mut builder = self
            .http
            .request(method, self.endpoints.iris(path))
            .headers(self.headers.clone());
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let (status, headers, body) = read(builder.send().await).await?;
        if status.as_u16() >= 400 {
            return Err(Error::api(ApiError {
                status: status.as_u16(),
                body,
                request_id: header(&headers, REQUEST_ID),
                correlation_key: header(&headers, CORRELATION_KEY),
            }));
        }
        Ok(body)
    }
}

fn header_value(v: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(v).map_err(|_| Error::usage(format!("invalid header value {v:?}")))
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// The inputs to [IrisClient::create_app].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppCreateAttributes {
    /// Defaults to the SKU.
    pub name: String,
    /// Defaults to `APP` followed by the current unix time.
    pub sku: String,
    /// Defaults to `en-US`.
    pub primary_locale: String,
    pub bundle_id: String,
    pub company_name: String,
    /// One of `IOS` (the default), `MAC_OS`, `TV_OS` or `UNIVERSAL`.
    pub platform: String,
    /// Defaults to `1.0`.
    pub version_string: String,
}

impl AppCreateAttributes {
    pub fn new<B: Into<String>>(bundle_id: B) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            ..Default::default()
        }
    }

    pub fn with_name<T: Into<String>>(mut self, v: T) -> Self {
        self.name = v.into();
        self
    }

    pub fn with_sku<T: Into<String>>(mut self, v: T) -> Self {
        self.sku = v.into();
        self
    }

    pub fn with_primary_locale<T: Into<String>>(mut self, v: T) -> Self {
        self.primary_locale = v.into();
        self
    }

    pub fn with_company_name<T: Into<String>>(mut self, v: T) -> Self {
        self.company_name = v.into();
        self
    }

    pub fn with_platform<T: Into<String>>(mut self, v: T) -> Self {
        self.platform = v.into();
        self
    }

    pub fn with_version_string<T: Into<String>>(mut self, v: T) -> Self {
        self.version_string = v.into();
        self
    }

    fn normalize(self) -> Result<Self> {
        let trim = |v: String| v.trim().to_string();
        let or = |v: String, default: &str| if v.is_empty() { default.to_string() } else { v };
        let bundle_id = trim(self.bundle_id);
        if bundle_id.is_empty() {
            return Err(Error::usage("bundle id is required"));
        }
        let sku = trim(self.sku);
        let sku = if sku.is_empty() {
            format!("APP{}", time::OffsetDateTime::now_utc().unix_timestamp())
        } else {
            sku
        };
        let name = or(trim(self.name), &sku);
        let platform = or(trim(self.platform).to_ascii_uppercase(), DEFAULT_PLATFORM);
        if !PLATFORMS.contains(&platform.as_str()) {
            return Err(Error::usage(format!(
                "platform must be one of {}",
                PLATFORMS.join(", ")
            )));
        }
        Ok(Self {
            name,
            sku,
            primary_locale: or(trim(self.primary_locale), DEFAULT_PRIMARY_LOCALE),
            bundle_id,
            company_name: trim(self.company_name),
            platform,
            version_string: or(trim(self.version_string), DEFAULT_VERSION),
        })
    }
}

/// An app returned by the IRIS API.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct App {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct Single {
    data: App,
}

#[derive(Deserialize)]
struct List {
    #[serde(default)]
    data: Vec<App>,
}

const NEW_VERSION: &str = "${new-appStoreVersion}";
const NEW_VERSION_LOCALIZATION: &str = "${new-appStoreVersionLocalization}";
const NEW_APP_INFO: &str = "${new-appInfo}";
const NEW_APP_INFO_LOCALIZATION: &str = "${new-appInfoLocalization}";

fn create_app_request(a: &AppCreateAttributes) -> serde_json::Value {
    let mut attributes = json!({
        "sku": a.sku,
        "primaryLocale": a.primary_locale,
        "bundleId": a.bundle_id,
    });
    if !a.company_name.is_empty() {
        attributes["companyName"] = json!(a.company_name);
    }
    json!({
        "data": {
            "type": "apps",
            "attributes": attributes,
            "relationships": {
                "appStoreVersions": {"data": [{"type": "appStoreVersions", "id": NEW_VERSION}]},
                "appInfos": {"data": [{"type": "appInfos", "id": NEW_APP_INFO}]},
            },
        },
        "included": [
            {
                "type": "appStoreVersions",
                "id": NEW_VERSION,
                "attributes": {"versionString": a.version_string, "platform": a.platform},
                "relationships": {
                    "appStoreVersionLocalizations": {
                        "data": [{"type": "appStoreVersionLocalizations", "id": NEW_VERSION_LOCALIZATION}],
                    },
                },
            },
            {
                "type": "appStoreVersionLocalizations",
                "id": NEW_VERSION_LOCALIZATION,
                "attributes": {"locale": a.primary_locale},
            },
            {
                "type": "appInfos",
                "id": NEW_APP_INFO,
                "relationships": {
                    "appInfoLocalizations": {
                        "data": [{"type": "appInfoLocalizations", "id": NEW_APP_INFO_LOCALIZATION}],
                    },
                },
            },
            {
                "type": "appInfoLocalizations",
                "id": NEW_APP_INFO_LOCALIZATION,
                "attributes": {"locale": a.primary_locale, "name": a.name},
            },
        ],
    })
}
