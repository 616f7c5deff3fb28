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

//! Dot-separated numeric build numbers (`CFBundleVersion`).

use std::cmp::Ordering;

/// An error parsing or incrementing a [BuildNumber].
///
/// The message names the source of the value, e.g. `processed build 123`.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum BuildNumberError {
    #[error("{source_name} build number is missing (expected a positive integer)")]
    Missing { source_name: String },
    #[error("{source_name} build number {raw:?} is not numeric (expected a positive integer)")]
    NotNumeric { source_name: String, raw: String },
    #[error("{source_name} build number {raw:?} must be >= 1")]
    TooSmall { source_name: String, raw: String },
    #[error("build number {0:?} is too large to increment")]
    Overflow(String),
}

/// A build number such as `42` or `1.2.3`.
///
/// Build numbers compare component by component, a missing trailing
/// component counts as zero. Thus `1.0` and `1` are equal.
///
/// # Example
/// ```
/// # use asc_client::build_number::BuildNumber;
/// let n = BuildNumber::parse("1.2.9", "example")?;
/// assert_eq!(n.next()?.to_string(), "1.2.10");
/// assert!(BuildNumber::parse("1.10", "example")? > n);
/// # Ok::<(), asc_client::build_number::BuildNumberError>(())
/// ```
#[derive(Clone, Debug)]
pub struct BuildNumber {
    components: Vec<i64>,
}

impl BuildNumber {
    /// Parses `raw`, surrounding whitespace is ignored.
    ///
    /// Every component must be a non-empty run of ASCII digits that fits in
    /// a signed 64-bit integer, and the first component must be at least 1.
    pub fn parse(raw: &str, source: &str) -> Result<Self, BuildNumberError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BuildNumberError::Missing {
                source_name: source.to_string(),
            });
        }
        let not_numeric = || BuildNumberError::NotNumeric {
            source_name: source.to_string(),
            raw: raw.to_string(),
        };
        let components = trimmed
            .split('.')
            .map(str::trim)
            .map(|segment| {
                if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(not_numeric());
                }
                segment.parse::<i64>().map_err(|_| not_numeric())
            })
            .collect::<Result<Vec<_>, _>>()?;
        if components.first().is_none_or(|c| *c < 1) {
            return Err(BuildNumberError::TooSmall {
                source_name: source.to_string(),
                raw: raw.to_string(),
            });
        }
        Ok(Self { components })
    }

    /// A single-component build number.
    pub fn from_number(n: u32) -> Self {
        Self {
            components: vec![n as i64],
        }
    }

    pub fn components(&self) -> &[i64] {
        &self.components
    }

    /// Increments the last component.
    pub fn next(&self) -> Result<Self, BuildNumberError> {
        let mut components = self.components.clone();
        let last = components
            .last_mut()
            .ok_or_else(|| BuildNumberError::Missing {
                source_name: "latest".to_string(),
            })?;
        *last = last
            .checked_add(1)
            .ok_or_else(|| BuildNumberError::Overflow(self.to_string()))?;
        Ok(Self { components })
    }
}

impl std::fmt::Display for BuildNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut iter = self.components.iter();
        if let Some(first) = iter.next() {
            write!(f, "{first}")?;
        }
        for c in iter {
            write!(f, ".{c}")?;
        }
        Ok(())
    }
}

impl Ord for BuildNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| {
                let left = self.components.get(i).copied().unwrap_or(0);
                let right = other.components.get(i).copied().unwrap_or(0);
                left.cmp(&right)
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for BuildNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for BuildNumber {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BuildNumber {}
