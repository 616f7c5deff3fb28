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

use crate::Result;
use crate::errors::{CredentialsError, CredentialsErrorKind};
use base64::prelude::{BASE64_URL_SAFE_NO_PAD, Engine as _};
use serde::Serialize;
use time::OffsetDateTime;

/// The audience App Store Connect expects in every token.
pub(crate) const AUDIENCE: &str = "appstoreconnect-v1";

/// The claims of an App Store Connect API token.
#[derive(Debug, Serialize)]
pub(crate) struct JwsClaims<'a> {
    pub iss: &'a str,
    #[serde(with = "time::serde::timestamp")]
    pub iat: OffsetDateTime,
    #[serde(with = "time::serde::timestamp")]
    pub exp: OffsetDateTime,
    pub aud: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<&'a [String]>,
}

impl JwsClaims<'_> {
    pub fn encode(&self) -> Result<String> {
        if self.exp <= self.iat {
            return Err(CredentialsError::from_msg(
                CredentialsErrorKind::SignError,
                false,
                "exp must be later than iat",
            ));
        }
        encode_json(self)
    }
}

/// The header that describes how a token was signed.
#[derive(Debug, Serialize)]
pub(crate) struct JwsHeader<'a> {
    pub alg: &'a str,
    pub kid: &'a str,
    pub typ: &'a str,
}

impl JwsHeader<'_> {
    pub fn encode(&self) -> Result<String> {
        encode_json(self)
    }
}

fn encode_json<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value)
        .map_err(|e| CredentialsError::new(CredentialsErrorKind::SignError, false, e))?;
    Ok(BASE64_URL_SAFE_NO_PAD.encode(json))
}
