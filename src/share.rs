//! Share format: fixed 33-byte binary layout, base64 text form, JSON form.
//!
//! ## Binary layout (33 bytes)
//!
//! | Field   | Offset | Size | Description                               |
//! |---------|--------|------|-------------------------------------------|
//! | index   | 0      | 1    | evaluation point x (1..=255)              |
//! | payload | 1      | 32   | polynomial value at x, one per secret byte|
//!
//! The index makes a share self-describing, so shares can be combined in
//! any order. In the two-party protocol index 1 is the client's share and
//! index 2 the server's.
//!
//! ## JSON form
//!
//! A share serializes as a plain array of its 33 bytes (`[1,23,...]`), the
//! shape used inside the encrypted share bundle.

use std::fmt;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::SssError;
use crate::sss::SECRET_LEN;

/// Total share size: index(1) + payload(32).
pub const SHARE_LEN: usize = 1 + SECRET_LEN;

/// One point of a split secret.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct Share {
    bytes: [u8; SHARE_LEN],
}

impl Share {
    pub(crate) fn new(index: u8, payload: [u8; SECRET_LEN]) -> Self {
        let mut bytes = [0u8; SHARE_LEN];
        bytes[0] = index;
        bytes[1..].copy_from_slice(&payload);
        Self { bytes }
    }

    /// Parse a share from its binary layout.
    ///
    /// Only the length is checked here; an index of 0 is left for
    /// `combine_shares` to reject so a corrupted share surfaces as a failed
    /// combination rather than a parse error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SssError> {
        let arr: [u8; SHARE_LEN] = bytes
            .try_into()
            .map_err(|_| SssError::InvalidShareLength(bytes.len()))?;
        Ok(Self { bytes: arr })
    }

    /// Evaluation point of this share.
    pub fn index(&self) -> u8 {
        self.bytes[0]
    }

    /// Polynomial values, one per secret byte.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[1..]
    }

    pub fn as_bytes(&self) -> &[u8; SHARE_LEN] {
        &self.bytes
    }

    pub fn to_base64(&self) -> String {
        B64.encode(self.bytes)
    }

    /// Decode from standard base64 (surrounding whitespace ignored).
    pub fn from_base64(s: &str) -> Option<Self> {
        let mut raw = B64.decode(s.trim()).ok()?;
        let share = Self::from_bytes(&raw).ok();
        raw.zeroize();
        share
    }
}

impl AsRef<[u8]> for Share {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl TryFrom<Vec<u8>> for Share {
    type Error = SssError;

    fn try_from(mut value: Vec<u8>) -> Result<Self, Self::Error> {
        let share = Self::from_bytes(&value);
        value.zeroize();
        share
    }
}

impl From<Share> for Vec<u8> {
    fn from(share: Share) -> Self {
        share.bytes.to_vec()
    }
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("index", &self.index())
            .field("payload", &"***SENSITIVE***")
            .finish()
    }
}
