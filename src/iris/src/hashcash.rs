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

//! Hashcash proof of work for the sign-in endpoint.
//!
//! The service publishes a challenge and a difficulty in the
//! `X-Apple-HC-Challenge` and `X-Apple-HC-Bits` headers of the sign-in page.
//! The client finds a counter such that the SHA-1 digest of the stamp starts
//! with that many zero bits, and sends the stamp in `X-Apple-HC`.

use crate::errors::{Error, Result};
use http::HeaderMap;
use sha1::{Digest, Sha1};
use time::OffsetDateTime;
use time::macros::format_description;

pub(crate) const BITS_HEADER: &str = "x-apple-hc-bits";
pub(crate) const CHALLENGE_HEADER: &str = "x-apple-hc-challenge";
pub(crate) const STAMP_HEADER: &str = "x-apple-hc";

/// SHA-1 digests have 160 bits.
const MAX_BITS: u32 = 160;

/// Reads the challenge from the sign-in page headers and solves it.
pub(crate) fn from_headers(headers: &HeaderMap, now: OffsetDateTime) -> Result<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    let (Some(bits), Some(challenge)) = (header(BITS_HEADER), header(CHALLENGE_HEADER)) else {
        return Err(Error::hashcash("missing hashcash headers in signin response"));
    };
    let bits = bits
        .parse::<u32>()
        .map_err(|e| Error::hashcash(format!("invalid hashcash bits {bits:?}: {e}")))?;
    make(bits, challenge, now)
}

/// Finds the first stamp `1:{bits}:{date}:{challenge}::{counter}` whose
/// SHA-1 digest starts with `bits` zero bits.
pub(crate) fn make(bits: u32, challenge: &str, now: OffsetDateTime) -> Result<String> {
    if bits > MAX_BITS {
        return Err(Error::hashcash(format!(
            "hashcash bits {bits} exceed the digest width"
        )));
    }
    let date = now
        .to_offset(time::UtcOffset::UTC)
        .format(format_description!("[year][month][day][hour][minute][second]"))
        .map_err(|e| Error::hashcash(e.to_string()))?;
    let prefix = format!("1:{bits}:{date}:{challenge}::");
    let stamp = (0_u64..)
        .map(|counter| format!("{prefix}{counter}"))
        .find(|stamp| has_leading_zero_bits(&Sha1::digest(stamp.as_bytes()), bits));
    stamp.ok_or_else(|| Error::hashcash("no hashcash stamp found"))
}

pub(crate) fn has_leading_zero_bits(digest: &[u8], bits: u32) -> bool {
    let full = (bits / 8) as usize;
    let rest = bits % 8;
    if digest.len() < full + usize::from(rest > 0) {
        return false;
    }
    if digest[..full].iter().any(|b| *b != 0) {
        return false;
    }
    rest == 0 || digest[full] & (0xff_u8 << (8 - rest)) == 0
}
