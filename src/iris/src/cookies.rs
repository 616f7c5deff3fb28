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

//! A cookie jar for the web session.
//!
//! The jar plugs into `reqwest` as its cookie store, so every request of a
//! session carries the session cookies. It follows the RFC 6265 matching
//! rules for domains and paths, with one deviation: the values of cookies
//! whose name contains `DES` are sent between double quotes. The identity
//! service rejects them otherwise.

use http::HeaderValue;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use time::OffsetDateTime;
use url::Url;

/// A cookie, as stored in the session cache.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// Empty for host-only cookies.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub expires: Option<OffsetDateTime>,
    /// Seconds. Zero or negative values mean the cookie is deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub http_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

impl StoredCookie {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    /// Returns true if the cookie is expired at `now`.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.max_age.is_some_and(|m| m <= 0) || self.expires.is_some_and(|e| e <= now)
    }
}

#[derive(Clone, Debug)]
struct Entry {
    cookie: StoredCookie,
    host_only: bool,
}

impl Entry {
    fn matches(&self, url: &Url, now: OffsetDateTime) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        let c = &self.cookie;
        let domain_ok = if self.host_only {
            host == c.domain
        } else {
            domain_match(&host, &c.domain)
        };
        domain_ok
            && path_match(url.path(), &c.path)
            && (!c.secure || url.scheme() == "https")
            && !c.is_expired(now)
    }

    fn same_key(&self, other: &Entry) -> bool {
        self.cookie.name == other.cookie.name
            && self.cookie.domain == other.cookie.domain
            && self.cookie.path == other.cookie.path
            && self.host_only == other.host_only
    }
}

/// A thread-safe cookie jar.
#[derive(Debug, Default)]
pub struct CookieJar {
    entries: Mutex<Vec<Entry>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a cookie received from `url`.
    ///
    /// Relative `max_age` values are converted into an absolute expiration
    /// time. Cookies for a domain `url` does not belong to are ignored.
    /// Expired cookies delete any matching stored cookie. A replaced cookie
    /// keeps its position.
    pub fn insert(&self, url: &Url, mut cookie: StoredCookie, now: OffsetDateTime) {
        let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
            return;
        };
        if cookie.name.is_empty() {
            return;
        }
        let domain = cookie
            .domain
            .trim_start_matches('.')
            .to_ascii_lowercase();
        let host_only = domain.is_empty();
        if !host_only && !domain_match(&host, &domain) {
            tracing::debug!(name = %cookie.name, %domain, %host, "ignoring cookie for another domain");
            return;
        }
        cookie.domain = if host_only { host } else { domain };
        if cookie.path.is_empty() || !cookie.path.starts_with('/') {
            cookie.path = default_path(url.path());
        }
        if let Some(max_age) = cookie.max_age.filter(|m| *m > 0) {
            cookie.expires = Some(now + time::Duration::seconds(max_age));
            cookie.max_age = None;
        }
        let entry = Entry { cookie, host_only };
        let mut entries = self.entries.lock().expect("cookie jar mutex is poisoned");
        let expired = entry.cookie.is_expired(now);
        match entries.iter().position(|e| e.same_key(&entry)) {
            Some(i) if expired => {
                entries.remove(i);
            }
            Some(i) => entries[i] = entry,
            None if expired => {}
            None => entries.push(entry),
        }
    }

    /// Parses and stores the `Set-Cookie` header values received from `url`.
    pub fn insert_set_cookie<'a, I>(&self, url: &Url, headers: I, now: OffsetDateTime)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for header in headers {
            match cookie::Cookie::parse(header) {
                Ok(c) => self.insert(url, from_set_cookie(&c), now),
                Err(e) => tracing::debug!("ignoring invalid Set-Cookie header: {e}"),
            }
        }
    }

    /// The cookies to send to `url`, longest path first.
    pub fn matching(&self, url: &Url, now: OffsetDateTime) -> Vec<StoredCookie> {
        let entries = self.entries.lock().expect("cookie jar mutex is poisoned");
        let mut found = entries
            .iter()
            .filter(|e| e.matches(url, now))
            .map(|e| e.cookie.clone())
            .collect::<Vec<_>>();
        found.sort_by_key(|c| std::cmp::Reverse(c.path.len()));
        found
    }

    /// The `Cookie` header for `url`, if any cookie matches.
    pub fn header(&self, url: &Url, now: OffsetDateTime) -> Option<HeaderValue> {
        let cookies = self.matching(url, now);
        if cookies.is_empty() {
            return None;
        }
        let value = cookies
            .iter()
            .map(|c| format!("{}={}", c.name, quote_des(&c.name, &c.value)))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&value).ok()
    }

    /// Captures the unexpired cookies sent to each of `urls`.
    ///
    /// Host-only cookies are recorded without a domain, they are restored
    /// for the host of the URL they are recorded under.
    pub fn snapshot<'a, I>(&self, urls: I, now: OffsetDateTime) -> Vec<(Url, Vec<StoredCookie>)>
    where
        I: IntoIterator<Item = &'a Url>,
    {
        let entries = self.entries.lock().expect("cookie jar mutex is poisoned");
        urls.into_iter()
            .filter_map(|url| {
                let cookies = entries
                    .iter()
                    .filter(|e| e.matches(url, now))
                    .map(|e| {
                        let mut c = e.cookie.clone();
                        if e.host_only {
                            c.domain.clear();
                        }
                        c
                    })
                    .collect::<Vec<_>>();
                (!cookies.is_empty()).then(|| (url.clone(), cookies))
            })
            .collect()
    }

    /// Restores cookies captured by [snapshot][Self::snapshot].
    ///
    /// Returns the number of cookies restored. Expired cookies are skipped.
    pub fn restore<I>(&self, snapshot: I, now: OffsetDateTime) -> usize
    where
        I: IntoIterator<Item = (Url, Vec<StoredCookie>)>,
    {
        let mut count = 0;
        for (url, cookies) in snapshot {
            for cookie in cookies {
                if cookie.name.is_empty() || cookie.is_expired(now) {
                    continue;
                }
                self.insert(&url, cookie, now);
                count += 1;
            }
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .expect("cookie jar mutex is poisoned")
            .is_empty()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .expect("cookie jar mutex is poisoned")
            .clear();
    }
}

impl reqwest::cookie::CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let headers = cookie_headers.filter_map(|v| v.to_str().ok()).collect::<Vec<_>>();
        self.insert_set_cookie(url, headers, OffsetDateTime::now_utc());
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.header(url, OffsetDateTime::now_utc())
    }
}

/// Wraps the value of `DES` cookies in double quotes.
pub(crate) fn quote_des<'a>(name: &str, value: &'a str) -> std::borrow::Cow<'a, str> {
    if name.contains("DES") && !value.starts_with('"') {
        return format!("\"{value}\"").into();
    }
    value.into()
}

fn from_set_cookie(c: &cookie::Cookie<'_>) -> StoredCookie {
    StoredCookie {
        name: c.name().to_string(),
        value: c.value().to_string(),
        path: c.path().unwrap_or_default().to_string(),
        domain: c.domain().unwrap_or_default().to_string(),
        expires: c.expires_datetime(),
        max_age: c.max_age().map(|d| d.whole_seconds()),
        secure: c.secure().unwrap_or(false),
        http_only: c.http_only().unwrap_or(false),
        same_site: c.same_site().map(|s| s.to_string()),
    }
}

fn domain_match(host: &str, domain: &str) -> bool {
    if host == domain {
        return true;
    }
    host.parse::<std::net::IpAddr>().is_err()
        && host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn path_match(request: &str, cookie: &str) -> bool {
    let request = if request.is_empty() { "/" } else { request };
    if request == cookie {
        return true;
    }
    request.starts_with(cookie)
        && (cookie.ends_with('/') || request[cookie.len()..].starts_with('/'))
}

fn default_path(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}
