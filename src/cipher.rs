//! Symmetric encryption of deal content: key derivation and AES-256-CBC.
//!
//! Key sources (all end up as exactly 32 bytes):
//!
//! ```text
//!   raw key (32 bytes)              → used as is
//!   password + salt                 → PBKDF2-HMAC-SHA256, 4096 rounds, 32 bytes
//!   wallet private key (≥ 32 bytes) → first 32 bytes
//! ```
//!
//! Ciphertext is `AES-256-CBC(key, IV, PKCS7(plaintext))` with no header,
//! nonce or tag. Base64 (standard alphabet) is the wire form.
//!
//! **Fixed IV.** Every message is encrypted under the same hard-coded IV,
//! so equal plaintexts under one key give equal ciphertexts. Content
//! already stored by existing clients depends on this exact IV; replacing
//! it needs a versioned ciphertext format and a migration, not a silent
//! change here.

use aes::Aes256;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha2::Sha256;
use tracing::trace;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::CipherError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Cipher key size in bytes.
pub const KEY_LEN: usize = 32;
/// AES block size in bytes.
pub const BLOCK_LEN: usize = 16;
/// PBKDF2 iteration count for password-derived keys.
pub const PBKDF2_ROUNDS: u32 = 4096;

/// The IV shared by every encryption. See the module docs.
pub const IV: [u8; BLOCK_LEN] = [
    142, 5, 204, 20, 89, 164, 93, 38, 160, 30, 27, 173, 7, 170, 153, 183,
];

// ---------------------------------------------------------------------------
// Key material
// ---------------------------------------------------------------------------

/// Where a cipher key comes from.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub enum CipherKeyMaterial {
    Key([u8; KEY_LEN]),
    Password { password: Vec<u8>, salt: Vec<u8> },
    PrivateKey(Vec<u8>),
}

/// PBKDF2-HMAC-SHA256 with the fixed parameters above.
pub fn derive_password_key(password: &[u8], salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, PBKDF2_ROUNDS, key.as_mut_slice());
    key
}

// ---------------------------------------------------------------------------
// Cipher
// ---------------------------------------------------------------------------

/// AES-256-CBC keyed with a 32-byte key. Stateless between calls, so one
/// instance can be shared across threads.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Cipher {
    key: [u8; KEY_LEN],
}

impl Cipher {
    pub fn new_from_key(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Derive the key from a password and salt.
    ///
    /// Infallible today; the `Result` keeps the constructor signatures
    /// uniform with [`Cipher::new_from_private_key`].
    pub fn new_from_password(password: &[u8], salt: &[u8]) -> Result<Self, CipherError> {
        let key = derive_password_key(password, salt);
        trace!(salt_len = salt.len(), "derived password key");
        Ok(Self { key: *key })
    }

    /// Use the first 32 bytes of a wallet private key.
    pub fn new_from_private_key(private_key: &[u8]) -> Result<Self, CipherError> {
        let head = private_key
            .get(..KEY_LEN)
            .ok_or(CipherError::PrivateKeyTooShort(private_key.len()))?;
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(head);
        Ok(Self { key: *key })
    }

    pub fn from_material(material: &CipherKeyMaterial) -> Result<Self, CipherError> {
        match material {
            CipherKeyMaterial::Key(key) => Ok(Self::new_from_key(*key)),
            CipherKeyMaterial::Password { password, salt } => {
                Self::new_from_password(password, salt)
            }
            CipherKeyMaterial::PrivateKey(pk) => Self::new_from_private_key(pk),
        }
    }

    /// Encrypt arbitrary bytes. Output length is the next multiple of 16
    /// strictly greater than the input length.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        Aes256CbcEnc::new(self.key.as_slice().into(), IV.as_slice().into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    pub fn encrypt_text(&self, text: &str) -> Vec<u8> {
        self.encrypt(text.as_bytes())
    }

    /// Encrypt a text payload handed over as raw bytes, rejecting anything
    /// that is not valid UTF-8.
    pub fn encrypt_utf8(&self, text: &[u8]) -> Result<Vec<u8>, CipherError> {
        let text = std::str::from_utf8(text).map_err(|_| CipherError::InvalidData)?;
        Ok(self.encrypt_text(text))
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
            return Err(CipherError::InvalidBlockLength(ciphertext.len()));
        }
        Aes256CbcDec::new(self.key.as_slice().into(), IV.as_slice().into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CipherError::BadPadding)
    }

    pub fn encrypt_base64(&self, plaintext: &[u8]) -> String {
        B64.encode(self.encrypt(plaintext))
    }

    pub fn decrypt_base64(&self, encoded: &str) -> Result<Vec<u8>, CipherError> {
        let ciphertext = B64
            .decode(encoded.trim())
            .map_err(|_| CipherError::InvalidData)?;
        self.decrypt(&ciphertext)
    }
}

// ---------------------------------------------------------------------------
// One-shot helpers
// ---------------------------------------------------------------------------

/// Encrypt with a cipher keyed from a private key (or deal secret).
pub fn encrypt_with_private_key(data: &[u8], private_key: &[u8]) -> Result<Vec<u8>, CipherError> {
    Ok(Cipher::new_from_private_key(private_key)?.encrypt(data))
}

pub fn decrypt_with_private_key(data: &[u8], private_key: &[u8]) -> Result<Vec<u8>, CipherError> {
    Cipher::new_from_private_key(private_key)?.decrypt(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::{OsRng, RngCore};

    fn random_key() -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let cipher = Cipher::new_from_key(random_key());
        for len in [0usize, 1, 15, 16, 17, 31, 32, 33, 1000] {
            let mut plaintext = vec![0u8; len];
            OsRng.fill_bytes(&mut plaintext);
            let ct = cipher.encrypt(&plaintext);
            assert_eq!(ct.len(), (len / BLOCK_LEN + 1) * BLOCK_LEN);
            assert_eq!(cipher.decrypt(&ct).unwrap(), plaintext);
        }
    }

    #[test]
    fn fixed_iv_is_deterministic() {
        // Pins the fixed-IV behaviour. Switching to random IVs must be a
        // deliberate, versioned change that updates this test.
        let cipher = Cipher::new_from_key([7u8; KEY_LEN]);
        let a = cipher.encrypt(b"same plaintext");
        let b = cipher.encrypt(b"same plaintext");
        assert_eq!(a, b);

        let other = Cipher::new_from_key([8u8; KEY_LEN]);
        assert_ne!(a, other.encrypt(b"same plaintext"));
    }

    #[test]
    fn first_block_matches_manual_cbc() {
        // CBC first block is AES(key, P1 ^ IV); with P = 16 bytes equal to
        // IV the first block is AES(key, 0).
        use aes::cipher::{BlockEncrypt, KeyInit};
        let key = [0x11u8; KEY_LEN];
        let cipher = Cipher::new_from_key(key);
        let ct = cipher.encrypt(&IV);

        let aes = Aes256::new(key.as_slice().into());
        let mut block = aes::Block::default();
        aes.encrypt_block(&mut block);
        assert_eq!(&ct[..BLOCK_LEN], block.as_slice());
        assert_eq!(ct.len(), 2 * BLOCK_LEN);
    }

    #[test]
    fn pbkdf2_is_deterministic() {
        let a = derive_password_key(b"password", b"salt");
        let b = derive_password_key(b"password", b"salt");
        assert_eq!(a, b);
        assert_ne!(a, derive_password_key(b"password", b"pepper"));

        let c1 = Cipher::new_from_password(b"password", b"salt").unwrap();
        let c2 = Cipher::new_from_password(b"password", b"salt").unwrap();
        assert_eq!(c1.encrypt(b"x"), c2.encrypt(b"x"));
    }

    #[test]
    fn pbkdf2_known_vector() {
        // PBKDF2-HMAC-SHA256, P="password", S="salt", c=4096, dkLen=32.
        let key: Zeroizing<[u8; KEY_LEN]> = derive_password_key(b"password", b"salt");
        assert_eq!(
            hex::encode(*key),
            "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a"
        );
    }

    #[test]
    fn private_key_uses_first_32_bytes() {
        let mut pk = [0u8; 64];
        OsRng.fill_bytes(&mut pk);
        let from_pk = Cipher::new_from_private_key(&pk).unwrap();
        let head: [u8; KEY_LEN] = pk[..KEY_LEN].try_into().unwrap();
        let from_key = Cipher::new_from_key(head);
        assert_eq!(from_pk.encrypt(b"payload"), from_key.encrypt(b"payload"));

        // Tail bytes do not matter.
        pk[40] ^= 0xff;
        let changed_tail = Cipher::new_from_private_key(&pk).unwrap();
        assert_eq!(changed_tail.encrypt(b"payload"), from_key.encrypt(b"payload"));
    }

    #[test]
    fn private_key_too_short() {
        assert_eq!(
            Cipher::new_from_private_key(&[1u8; 31]).err(),
            Some(CipherError::PrivateKeyTooShort(31))
        );
        assert!(Cipher::new_from_private_key(&[1u8; 32]).is_ok());
    }

    #[test]
    fn material_variants() {
        let key = random_key();
        let direct = Cipher::from_material(&CipherKeyMaterial::Key(key)).unwrap();
        let mut pk = key.to_vec();
        pk.extend_from_slice(&[0u8; 32]);
        let via_pk = Cipher::from_material(&CipherKeyMaterial::PrivateKey(pk)).unwrap();
        assert_eq!(direct.encrypt(b"m"), via_pk.encrypt(b"m"));

        let via_pw = Cipher::from_material(&CipherKeyMaterial::Password {
            password: b"pw".to_vec(),
            salt: b"salt".to_vec(),
        })
        .unwrap();
        let derived = Cipher::new_from_key(*derive_password_key(b"pw", b"salt"));
        assert_eq!(via_pw.encrypt(b"m"), derived.encrypt(b"m"));
    }

    #[test]
    fn decrypt_rejects_bad_lengths() {
        let cipher = Cipher::new_from_key(random_key());
        assert_eq!(cipher.decrypt(&[]), Err(CipherError::InvalidBlockLength(0)));
        assert_eq!(
            cipher.decrypt(&[0u8; 17]),
            Err(CipherError::InvalidBlockLength(17))
        );
    }

    #[test]
    fn decrypt_wrong_key_fails_or_differs() {
        let c1 = Cipher::new_from_key(random_key());
        let c2 = Cipher::new_from_key(random_key());
        let ct = c1.encrypt(b"secret data that spans two blocks");
        // A wrong key almost always breaks the padding; when it happens to
        // produce valid padding the plaintext is still wrong.
        match c2.decrypt(&ct) {
            Err(e) => assert_eq!(e, CipherError::BadPadding),
            Ok(pt) => assert_ne!(pt, b"secret data that spans two blocks"),
        }
    }

    #[test]
    fn utf8_boundary() {
        let cipher = Cipher::new_from_key(random_key());
        assert_eq!(
            cipher.encrypt_utf8(&[0xff, 0xfe]),
            Err(CipherError::InvalidData)
        );
        let ct = cipher.encrypt_utf8("héllo".as_bytes()).unwrap();
        assert_eq!(ct, cipher.encrypt_text("héllo"));
        assert_eq!(cipher.decrypt(&ct).unwrap(), "héllo".as_bytes());
    }

    #[test]
    fn base64_roundtrip_and_errors() {
        let cipher = Cipher::new_from_key(random_key());
        let encoded = cipher.encrypt_base64(b"deal text");
        assert_eq!(cipher.decrypt_base64(&encoded).unwrap(), b"deal text");
        assert_eq!(
            cipher.decrypt_base64("%%%"),
            Err(CipherError::InvalidData)
        );
    }

    #[test]
    fn one_shot_helpers() {
        let pk = [5u8; 64];
        let ct = encrypt_with_private_key(b"file bytes", &pk).unwrap();
        assert_eq!(decrypt_with_private_key(&ct, &pk).unwrap(), b"file bytes");
        assert!(encrypt_with_private_key(b"x", &pk[..10]).is_err());
    }

    #[test]
    fn cipher_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Cipher>();
    }
}
