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

//! The SRP-6a client used by the Apple ID web sign-in.
//!
//! The sign-in service uses the RFC 5054 2048-bit group and SHA-256, with the
//! hashing conventions of the `sirp` Ruby library: values are hashed in their
//! hex form, padded to the width of `N` where the protocol pads them. The
//! functions here reproduce those conventions exactly; any deviation produces
//! proofs the service rejects.

use crate::errors::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use num_bigint::BigUint;
use num_traits::Zero;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;
use zeroize::{Zeroize, Zeroizing};

/// The length of the client secret `a`, in bytes.
const CLIENT_SECRET_BYTES: usize = 256;

/// The length of the password derived with PBKDF2, in bytes.
pub(crate) const DERIVED_PASSWORD_BYTES: usize = 32;

const N_HEX: &str = concat!(
    "AC6BDB41324A9A9BF166DE5E1389582FAF72B6651987EE07FC3192943DB56050",
    "A37329CBB4A099ED8193E0757767A13DD52312AB4B03310DCD7F48A9DA04FD50",
    "E8083969EDB767B0CF6095179A163AB3661A05FBD5FAAAE82918A9962F0B93B8",
    "55F97993EC975EEAA80D740ADBF4FF747359D041D5C33EA71D281E446B14773B",
    "CA97B43A23FB801676BD207A436C6481F1D2B9078717461A5B9D32E688F87748",
    "544523B524B0D57D5EA77A2775D2ECFA032CFBDBF52FB3786160279004E57AE6",
    "AF874E7303CE53299CCC041C7BC308D82A5698F3A8D0C38271AE35F8E9DBFBB6",
    "94B5C803D89F7AE435DE236D525F54759B65E372FCD68EF20FA7111F9E4AFF73",
);

/// The RFC 5054 2048-bit group.
pub(crate) struct Group {
    pub n: BigUint,
    pub g: BigUint,
}

pub(crate) static GROUP_2048: LazyLock<Group> = LazyLock::new(|| Group {
    n: BigUint::parse_bytes(N_HEX.as_bytes(), 16).unwrap_or_default(),
    g: BigUint::from(2_u32),
});

/// The client side of one handshake.
///
/// Holds the secret `a`. The secret is scrubbed when the handshake is
/// dropped.
pub(crate) struct Handshake {
    a: BigUint,
    public: BigUint,
}

impl Handshake {
    /// Starts a handshake with a random 256-byte secret.
    pub fn new() -> Self {
        let mut bytes = Zeroizing::new(vec![0_u8; CLIENT_SECRET_BYTES]);
        rand::rng().fill_bytes(&mut bytes);
        Self::with_secret(&bytes)
    }

    pub fn with_secret(secret: &[u8]) -> Self {
        let group = &*GROUP_2048;
        let a = BigUint::from_bytes_be(secret);
        let public = group.g.modpow(&a, &group.n);
        Self { a, public }
    }

    /// `A`, base64 encoded, as sent to `signin/init`.
    pub fn public_base64(&self) -> String {
        STANDARD.encode(self.public.to_bytes_be())
    }

    /// Computes the client proofs `M1` and `M2`, base64 encoded.
    ///
    /// `server_public` is the raw `B`, `derived_password` the PBKDF2 output.
    pub fn proofs(
        &self,
        account: &str,
        salt: &[u8],
        server_public: &[u8],
        derived_password: &[u8],
    ) -> Result<Proofs> {
        let group = &*GROUP_2048;
        let (n, g) = (&group.n, &group.g);
        let a_hex = num_to_hex(&self.public);
        let b_hex = hex::encode(server_public);
        let salt_hex = hex::encode(salt);
        let derived_hex = Zeroizing::new(hex::encode(derived_password));

        let mut x = calc_x(&derived_hex, &salt_hex)?;
        let k = hash_with_padding(n, &[&num_to_hex(n), &num_to_hex(g)])?;
        let u = hash_with_padding(n, &[&a_hex, &b_hex])?;
        if u.is_zero() {
            scrub(&mut x);
            return Err(Error::srp("the scrambling parameter is zero"));
        }

        let b = BigUint::from_bytes_be(server_public);
        let kgx = (&k * g.modpow(&x, n)) % n;
        let base = ((b % n) + n - kgx) % n;
        let mut exponent = &self.a + &u * &x;
        let mut s = base.modpow(&exponent, n);
        scrub(&mut x);
        scrub(&mut exponent);

        let s_hex = Zeroizing::new(num_to_hex(&s));
        scrub(&mut s);
        let k_hex = Zeroizing::new(sha_hex(&s_hex)?);
        let m1_hex = calc_m(n, g, account, &salt_hex, &a_hex, &b_hex, &k_hex)?;
        let m2_hex = calc_hamk(&a_hex, &m1_hex, &k_hex)?;
        Ok(Proofs {
            m1: STANDARD.encode(decode_hex(&m1_hex)?),
            m2: STANDARD.encode(decode_hex(&m2_hex)?),
        })
    }
}

impl Drop for Handshake {
    fn drop(&mut self) {
        scrub(&mut self.a);
    }
}

impl std::fmt::Debug for Handshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handshake")
            .field("a", &"[censored]")
            .field("public", &num_to_hex(&self.public))
            .finish()
    }
}

/// The client proofs sent to `signin/complete`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Proofs {
    pub m1: String,
    pub m2: String,
}

/// Prepares the password for PBKDF2, depending on the negotiated protocol.
pub(crate) fn prepare_password(password: &str, protocol: &str) -> Result<Zeroizing<Vec<u8>>> {
    let mut digest = Sha256::digest(password.as_bytes());
    let prepared = match protocol {
        "s2k" => Ok(Zeroizing::new(digest.to_vec())),
        "s2k_fo" => Ok(Zeroizing::new(hex::encode(digest.as_slice()).into_bytes())),
        other => Err(Error::unsupported_protocol(other)),
    };
    digest.as_mut_slice().zeroize();
    prepared
}

/// Derives the SRP password with PBKDF2-HMAC-SHA256.
pub(crate) fn derive_password(
    prepared: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<Zeroizing<[u8; DERIVED_PASSWORD_BYTES]>> {
    let mut derived = Zeroizing::new([0_u8; DERIVED_PASSWORD_BYTES]);
    pbkdf2::pbkdf2::<hmac::Hmac<Sha256>>(prepared, salt, iterations, derived.as_mut_slice())
        .map_err(|_| Error::srp("invalid PBKDF2 output length"))?;
    Ok(derived)
}

/// `x = H(salt || H(":" || derived_password))`, in the hex domain.
fn calc_x(derived_hex: &str, salt_hex: &str) -> Result<BigUint> {
    let inner = Zeroizing::new(sha_hex(&format!("3a{derived_hex}"))?);
    let outer = Zeroizing::new(sha_hex(&format!("{salt_hex}{}", inner.as_str()))?);
    parse_hex(&outer)
}

/// `M1 = H(H(N) xor H(g) || H(account) || salt || A || B || K)`.
fn calc_m(
    n: &BigUint,
    g: &BigUint,
    account: &str,
    salt_hex: &str,
    a_hex: &str,
    b_hex: &str,
    k_hex: &str,
) -> Result<String> {
    let hn = hash_with_padding(n, &[&num_to_hex(n)])?;
    let hg = hash_with_padding(n, &[&num_to_hex(g)])?;
    let hxor = hn ^ hg;
    let account_hex = hex::encode(Sha256::digest(account.as_bytes()));
    let input = Zeroizing::new(format!(
        "{}{account_hex}{salt_hex}{a_hex}{b_hex}{k_hex}",
        num_to_hex(&hxor)
    ));
    sha_hex(&input)
}

/// `M2 = H(A || M1 || K)`, re-encoded through its integer value.
///
/// The integer round trip drops leading zero bytes, the service expects the
/// same quirk.
fn calc_hamk(a_hex: &str, m1_hex: &str, k_hex: &str) -> Result<String> {
    let input = Zeroizing::new(format!("{a_hex}{m1_hex}{k_hex}"));
    let digest = Sha256::digest(decode_hex(&input)?);
    Ok(num_to_hex(&BigUint::from_bytes_be(&digest)))
}

/// Hashes the concatenation of `values`, each left-padded with zeros to the
/// width of `n`, and reduces the result modulo `n`.
pub(crate) fn hash_with_padding(n: &BigUint, values: &[&str]) -> Result<BigUint> {
    let n_hex_len = n.to_str_radix(16).len();
    let width = 2 * ((n_hex_len * 4 + 7) >> 3);
    let mut input = String::with_capacity(width * values.len());
    for value in values.iter().filter(|v| !v.is_empty()) {
        let value = value.to_ascii_lowercase();
        if value.len() > width {
            return Err(Error::srp("value is wider than the group modulus"));
        }
        input.extend(std::iter::repeat_n('0', width - value.len()));
        input.push_str(&value);
    }
    Ok(parse_hex(&sha_hex(&input)?)? % n)
}

/// Lower-case hex, padded to an even number of digits.
pub(crate) fn num_to_hex(v: &BigUint) -> String {
    let hex = v.to_str_radix(16);
    if hex.len() % 2 == 1 {
        format!("0{hex}")
    } else {
        hex
    }
}

/// SHA-256 of the bytes encoded in `hex_value`, as lower-case hex.
fn sha_hex(hex_value: &str) -> Result<String> {
    let bytes = Zeroizing::new(decode_hex(hex_value)?);
    Ok(hex::encode(Sha256::digest(bytes.as_slice())))
}

fn decode_hex(v: &str) -> Result<Vec<u8>> {
    hex::decode(v).map_err(|_| Error::srp("invalid hex value"))
}

fn parse_hex(v: &str) -> Result<BigUint> {
    BigUint::parse_bytes(v.as_bytes(), 16).ok_or_else(|| Error::srp("invalid hex value"))
}

/// Clears every bit of `v`, from the least significant limb up.
///
/// Clearing the bits in place overwrites the limbs before the vector is
/// truncated.
fn scrub(v: &mut BigUint) {
    for bit in 0..v.bits() {
        if v.bit(bit) {
            v.set_bit(bit, false);
        }
    }
}
