// SPDX-License-Identifier: MIT OR Apache-2.0

//! HMAC-SHA256 message authentication.
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const HMAC_SHA256_SIZE: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Computes HMAC-SHA256 of `message` under `key`.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; HMAC_SHA256_SIZE] {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac takes keys of any size");
    mac.update(message);
    let result = mac.finalize().into_bytes();
    result[..].try_into().expect("hmac-sha256 output size")
}

/// Verifies an HMAC-SHA256 tag in constant time.
pub fn hmac_sha256_verify(key: &[u8], message: &[u8], tag: &[u8; HMAC_SHA256_SIZE]) -> bool {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac takes keys of any size");
    mac.update(message);
    mac.verify_slice(tag).is_ok()
}
