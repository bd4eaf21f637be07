//! Hex digests used for integrity checks.
//!
//! MD5 guards uploaded/downloaded content against a server-side checksum;
//! SHA3-256 is the verification hash of a shared secret.

use std::fmt;
use std::str::FromStr;

use md5::Md5;
use sha3::{Digest, Sha3_256};

/// Digest used by [`checksum_equal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha3_256,
}

impl HashAlgorithm {
    pub fn hex_digest(self, data: &[u8]) -> String {
        match self {
            HashAlgorithm::Md5 => md5_hex(data),
            HashAlgorithm::Sha3_256 => sha3_256_hex(data),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Md5 => f.write_str("md5"),
            HashAlgorithm::Sha3_256 => f.write_str("sha3-256"),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha3" | "sha3-256" | "sha3_256" => Ok(HashAlgorithm::Sha3_256),
            other => Err(format!("unknown hash algorithm {other:?} (expected md5 or sha3-256)")),
        }
    }
}

pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

pub fn sha3_256_hex(data: &[u8]) -> String {
    hex::encode(Sha3_256::digest(data))
}

/// Compare the digest of `data` with an expected hex string.
///
/// Hex case and surrounding whitespace in `expected_hex` are ignored.
pub fn checksum_equal(data: &[u8], expected_hex: &str, algorithm: HashAlgorithm) -> bool {
    algorithm
        .hex_digest(data)
        .eq_ignore_ascii_case(expected_hex.trim())
}
