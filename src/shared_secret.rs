//! Two-party shared secret: create, recover, re-open.
//!
//! ```text
//!   secret (32 random bytes)
//!     ├─ create_shares(n=2, k=2) → [client_share (x=1), server_share (x=2)]
//!     ├─ sha3_256(secret)        → hash_of_secret (kept for verification)
//!     └─ AES(owner_pk[..32], json([client_share, server_share]))
//!                                → base64_encoded_client_secret (owner backup)
//! ```
//!
//! The secret itself never leaves this module except inside the returned
//! bundle; only shares, the hash and the encrypted backup are meant to be
//! stored or sent. Every recovery path checks the hash, because combining
//! shares cannot detect a wrong or missing share on its own.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::cipher::Cipher;
use crate::error::{Error, Result};
use crate::secret::Secret;
use crate::share::Share;
use crate::sss;

/// Shares in the two-party split.
pub const SHARE_COUNT: u8 = 2;
/// Both shares are needed.
pub const THRESHOLD: u8 = 2;

/// Everything produced when a deal secret is created or re-opened.
#[derive(Debug, Clone)]
pub struct SharedSecret {
    pub secret: Secret,
    /// Share kept on this device (index 0 of the split).
    pub client_share: Share,
    /// Share handed to the counterpart service (index 1 of the split).
    pub server_share: Share,
    /// Lowercase hex SHA3-256 of `secret`.
    pub hash_of_secret: String,
    /// Both shares, encrypted under the owner's private key, base64.
    pub base64_encoded_client_secret: String,
}

/// Generate a fresh deal secret and split it between client and server.
pub fn create_shared_secret(owner_private_key: &[u8]) -> Result<SharedSecret> {
    let cipher = Cipher::new_from_private_key(owner_private_key)?;
    let secret = Secret::generate();
    let bundle = split_secret(secret, &cipher)?;
    debug!("created shared secret");
    Ok(bundle)
}

/// Combine the server and client shares and check the result against the
/// stored hash.
pub fn recover(server_share: &[u8], client_share: &[u8], hash_of_secret: &str) -> Result<Secret> {
    let secret = sss::combine_shares(&[server_share, client_share])?.ok_or_else(|| {
        warn!("share combination failed");
        Error::RecoveryMismatch
    })?;
    verify_hash(&secret, hash_of_secret)?;
    debug!("recovered shared secret");
    Ok(secret)
}

/// Re-open an owner backup produced by [`create_shared_secret`].
///
/// Decrypts the share pair with the owner's private key, recombines it and,
/// when `hash_of_secret` is given, checks the recovered secret against it.
/// Lets the owner get back the client share (for example to hand it to a
/// counterparty again) without asking the server for anything.
pub fn encrypt_shared_secret_key(
    base64_client_secret: &str,
    hash_of_secret: Option<&str>,
    owner_private_key: &[u8],
) -> Result<SharedSecret> {
    let encrypted = B64
        .decode(base64_client_secret.trim())
        .map_err(|_| Error::InvalidData("encrypted shares are not valid base64"))?;
    let cipher = Cipher::new_from_private_key(owner_private_key)?;
    let json = Zeroizing::new(cipher.decrypt(&encrypted)?);

    let shares: Vec<Share> = serde_json::from_slice(&json)
        .map_err(|_| Error::InvalidData("decrypted shares are not a share list"))?;
    let [client_share, server_share]: [Share; 2] = shares
        .try_into()
        .map_err(|_| Error::InvalidData("expected exactly two shares"))?;

    let secret = sss::combine_shares(&[&client_share, &server_share])?
        .ok_or(Error::RecoveryMismatch)?;
    let actual_hash = secret.hash_hex();
    if let Some(expected) = hash_of_secret {
        verify_hash(&secret, expected)?;
    }

    debug!("re-opened shared secret backup");
    Ok(SharedSecret {
        secret,
        client_share,
        server_share,
        hash_of_secret: hash_of_secret.map_or(actual_hash, str::to_owned),
        base64_encoded_client_secret: base64_client_secret.trim().to_owned(),
    })
}

/// Split `secret` and build the bundle (shared by create and tests with a
/// chosen secret).
pub(crate) fn split_secret(secret: Secret, cipher: &Cipher) -> Result<SharedSecret> {
    let shares = sss::create_shares(secret.as_bytes(), SHARE_COUNT, THRESHOLD)?;
    let json = Zeroizing::new(
        serde_json::to_vec(&shares).map_err(|_| Error::InvalidData("share serialization"))?,
    );
    let base64_encoded_client_secret = B64.encode(cipher.encrypt(&json));

    let [client_share, server_share]: [Share; 2] = shares
        .try_into()
        .map_err(|_| Error::InvalidData("expected exactly two shares"))?;

    Ok(SharedSecret {
        hash_of_secret: secret.hash_hex(),
        secret,
        client_share,
        server_share,
        base64_encoded_client_secret,
    })
}

fn verify_hash(secret: &Secret, expected_hex: &str) -> Result<()> {
    if secret.hash_hex().eq_ignore_ascii_case(expected_hex.trim()) {
        Ok(())
    } else {
        warn!("recovered secret hash mismatch");
        Err(Error::RecoveryMismatch)
    }
}
