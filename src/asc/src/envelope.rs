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

//! The JSON:API envelopes shared by all App Store Connect responses.
//!
//! Attributes are opaque (`serde_json::Value`) unless the caller picks a
//! typed attribute struct, e.g. `Page<BuildAttributes>`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The `links` object of a document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Links {
    /// The URL of this document.
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub this: Option<String>,

    /// The URL of the next page, an opaque absolute URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// A single resource object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource<A = Value> {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub attributes: A,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Map<String, Value>>,
}

/// A top level document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document<D> {
    pub data: D,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}

/// A document holding a sequence of resources, i.e., one page of a list.
pub type Page<A = Value> = Document<Vec<Resource<A>>>;

/// A document holding a single resource.
pub type Single<A = Value> = Document<Resource<A>>;

impl<D> Document<D> {
    /// Returns the URL of the next page, if there is one.
    ///
    /// An empty `links.next` ends the chain, the same as a missing one.
    pub fn next_url(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|l| l.next.as_deref())
            .filter(|n| !n.is_empty())
    }
}

/// Identifies a resource in a relationship or a request body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceId {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

impl ResourceId {
    pub fn new<K: Into<String>, I: Into<String>>(kind: K, id: I) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// A to-one relationship in a request body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub data: ResourceId,
}

impl Relationship {
    pub fn new<K: Into<String>, I: Into<String>>(kind: K, id: I) -> Self {
        Self {
            data: ResourceId::new(kind, id),
        }
    }
}

/// Returns true if `meta` carries any information.
pub(crate) fn has_meta(meta: &Option<Value>) -> bool {
    match meta {
        None | Some(Value::Null) => false,
        Some(Value::Object(m)) => !m.is_empty(),
        Some(_) => true,
    }
}
