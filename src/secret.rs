//! The 32-byte per-deal symmetric key.

use std::fmt;
use std::ops::Deref;

use rand_core::{OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::digest;
use crate::sss::SECRET_LEN;

/// A per-deal content key.
///
/// Generated once on the creating side, split immediately, and afterwards
/// only reconstructed transiently. The bytes are wiped when the value is
/// dropped and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret([u8; SECRET_LEN]);

impl Secret {
    /// Fresh random secret from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Copy a secret out of a slice, `None` if it is not exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; SECRET_LEN] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.0
    }

    /// Lowercase hex SHA3-256 of the secret, the value stored for later
    /// verification of a recovery.
    pub fn hash_hex(&self) -> String {
        digest::sha3_256_hex(&self.0)
    }
}

impl From<[u8; SECRET_LEN]> for Secret {
    fn from(bytes: [u8; SECRET_LEN]) -> Self {
        Self(bytes)
    }
}

impl Deref for Secret {
    type Target = [u8; SECRET_LEN];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for Secret {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Secret").field(&"***SENSITIVE***").finish()
    }
}
