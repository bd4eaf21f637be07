//! Error types for the crypto core.
//!
//! Each layer has its own enum so callers can tell input mistakes
//! (`SssError`), cipher failures (`CipherError`) and storage trouble
//! (`StorageError`) apart. [`Error`] is what the protocol functions return.
//! None of the messages ever include key bytes, shares or plaintext.

/// Errors from the secret sharing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SssError {
    #[error("secret must be exactly {expected} bytes", expected = crate::sss::SECRET_LEN)]
    InvalidInputLength,
    #[error("share count n must be in 1..=255")]
    InvalidNParam,
    #[error("threshold k must be in 1..=n")]
    InvalidKParam,
    #[error("no shares supplied")]
    SharesArrayEmpty,
    #[error("share {0} has the wrong length (expected {len} bytes)", len = crate::share::SHARE_LEN)]
    BadShareLength(usize),
    #[error("a share must be {len} bytes, got {0}", len = crate::share::SHARE_LEN)]
    InvalidShareLength(usize),
}

/// Errors from the symmetric cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    #[error("private key must be at least 32 bytes, got {0}")]
    PrivateKeyTooShort(usize),
    #[error("ciphertext length {0} is not a non-zero multiple of the block size")]
    InvalidBlockLength(usize),
    #[error("bad padding (wrong key or corrupted ciphertext)")]
    BadPadding,
    #[error("invalid data encoding")]
    InvalidData,
}

/// Errors from the secure storage boundary.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored record for {0:?} is corrupt")]
    Corrupt(String),
}

/// Errors returned by the shared secret protocol.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Sss(#[from] SssError),
    #[error(transparent)]
    Cipher(#[from] CipherError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Shares did not combine to the secret whose hash we hold.
    #[error("recovered secret does not match the stored hash")]
    RecoveryMismatch,
    #[error("content checksum does not match")]
    ChecksumMismatch,
    #[error("invalid data: {0}")]
    InvalidData(&'static str),
    #[error("operation {op} is not allowed in state {state}")]
    InvalidState {
        op: &'static str,
        state: &'static str,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
