//! Two-party shared secrets for encrypting deal content.
//!
//! ```text
//!   sss            GF(2^8) Shamir split / combine of a 32-byte secret
//!   share          tagged share bytes: index || payload
//!   cipher         AES-256-CBC/PKCS7 with raw, password or private-key keys
//!   digest         MD5 / SHA3-256 hex digests and checksum comparison
//!   content        TextContent / EncryptedFile envelopes
//!   shared_secret  create, recover and re-open a deal secret
//!   storage        SecretStorage boundary and per-deal client share records
//!   session        per-deal state machine over the above
//! ```

pub mod cipher;
pub mod content;
pub mod digest;
pub mod error;
pub mod secret;
pub mod session;
pub mod share;
pub mod shared_secret;
pub mod sss;
pub mod storage;

pub use error::{CipherError, Error, Result, SssError, StorageError};
pub use secret::Secret;
pub use share::Share;
pub use shared_secret::SharedSecret;
