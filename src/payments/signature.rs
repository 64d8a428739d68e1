//! Gateway request signing
//!
//! HMAC-SHA512 over a canonicalized parameter set, hex encoded. The gateway
//! recomputes the hash the same way on its side, so the canonical string
//! must come out identical whether we are building an outbound checkout URL
//! or verifying an inbound callback: keys sorted bytewise ascending, empty
//! values dropped entirely (not emitted as empty pairs), keys and values
//! percent-encoded.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::collections::HashMap;

type HmacSha512 = Hmac<Sha512>;

/// Render a parameter map into the canonical `key=value&...` string that is
/// both the hash input and the checkout query string.
pub fn canonicalize(params: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, _)| k)
        .collect();
    keys.sort();

    let pairs: Vec<String> = keys
        .into_iter()
        .map(|key| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(&params[key])
            )
        })
        .collect();
    pairs.join("&")
}

/// HMAC-SHA512 of `data`, hex encoded lowercase.
pub fn sign(secret: &str, data: &str) -> String {
    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a provided hash against the canonicalized `params`.
///
/// The caller must have removed the signature fields themselves from
/// `params` before calling; leaving them in changes the canonical string and
/// the comparison will always fail. Comparison is case-insensitive and runs
/// in constant time over equal-length inputs.
pub fn verify(secret: &str, params: &HashMap<String, String>, provided_hash: &str) -> bool {
    let expected = sign(secret, &canonicalize(params));
    constant_time_eq(&expected, provided_hash.trim())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.to_ascii_lowercase();
    let b = b.to_ascii_lowercase();
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
