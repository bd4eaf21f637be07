//! Encrypted deal content: text bodies and attached files.
//!
//! ## Text (`TextContent`)
//!
//! ```json
//! { "text": "<base64(AES-CBC(utf8 text))>", "md5": "<hex md5 of the base64 string>" }
//! ```
//!
//! The checksum covers the base64 text as transmitted, so a server can
//! verify it without any key.
//!
//! ## Files (`EncryptedFile`)
//!
//! ```json
//! { "name": "<base64(AES-CBC(file name))>", "md5": "<hex md5 of data>", "data": "<base64(AES-CBC(bytes))>" }
//! ```
//!
//! Here the checksum is over the raw encrypted bytes, the form in which the
//! file is uploaded.

use base64::engine::general_purpose::STANDARD as B64;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::cipher::Cipher;
use crate::digest::{self, HashAlgorithm};
use crate::error::{CipherError, Error, Result};

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
    pub md5: String,
}

impl TextContent {
    /// Encrypt `text` and attach the checksum of the encoded result.
    pub fn seal(cipher: &Cipher, text: &str) -> Self {
        let text = cipher.encrypt_base64(text.as_bytes());
        let md5 = digest::md5_hex(text.as_bytes());
        Self { text, md5 }
    }

    pub fn verify_checksum(&self) -> bool {
        digest::checksum_equal(self.text.as_bytes(), &self.md5, HashAlgorithm::Md5)
    }

    /// Check the checksum, then decrypt back to the original text.
    pub fn open(&self, cipher: &Cipher) -> Result<String> {
        if !self.verify_checksum() {
            return Err(Error::ChecksumMismatch);
        }
        let plain = Zeroizing::new(cipher.decrypt_base64(&self.text)?);
        let text = std::str::from_utf8(&plain).map_err(|_| CipherError::InvalidData)?;
        debug!(len = text.len(), "opened text content");
        Ok(text.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedFile {
    pub name: String,
    pub md5: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl EncryptedFile {
    pub fn seal(cipher: &Cipher, name: &str, data: &[u8]) -> Self {
        let name = cipher.encrypt_base64(name.as_bytes());
        let data = cipher.encrypt(data);
        let md5 = digest::md5_hex(&data);
        debug!(len = data.len(), "sealed file");
        Self { name, md5, data }
    }

    pub fn verify_checksum(&self) -> bool {
        digest::checksum_equal(&self.data, &self.md5, HashAlgorithm::Md5)
    }

    /// Decrypt only the file name (listing files without downloading them).
    pub fn open_name(&self, cipher: &Cipher) -> Result<String> {
        let name = cipher.decrypt_base64(&self.name)?;
        String::from_utf8(name).map_err(|_| CipherError::InvalidData.into())
    }

    /// Check the checksum, then decrypt name and contents.
    pub fn open(&self, cipher: &Cipher) -> Result<(String, Vec<u8>)> {
        if !self.verify_checksum() {
            return Err(Error::ChecksumMismatch);
        }
        let name = self.open_name(cipher)?;
        let data = cipher.decrypt(&self.data)?;
        Ok((name, data))
    }
}

mod base64_bytes {
    use super::B64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&B64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        B64.decode(s.trim()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> Cipher {
        Cipher::new_from_key([0x24; 32])
    }

    #[test]
    fn text_roundtrip() {
        let c = cipher();
        let sealed = TextContent::seal(&c, "Deal terms: 100 tokens, due Friday.");
        assert!(sealed.verify_checksum());
        assert_eq!(sealed.md5, digest::md5_hex(sealed.text.as_bytes()));
        assert_eq!(sealed.open(&c).unwrap(), "Deal terms: 100 tokens, due Friday.");
    }

    #[test]
    fn text_json_shape() {
        let sealed = TextContent::seal(&cipher(), "hi");
        let v: serde_json::Value = serde_json::to_value(&sealed).unwrap();
        assert!(v["text"].is_string());
        assert_eq!(v["md5"].as_str().unwrap().len(), 32);
    }

    #[test]
    fn text_checksum_mismatch() {
        let c = cipher();
        let mut sealed = TextContent::seal(&c, "hello");
        sealed.md5 = digest::md5_hex(b"something else");
        assert!(matches!(sealed.open(&c), Err(Error::ChecksumMismatch)));
    }

    #[test]
    fn text_non_utf8_plaintext() {
        let c = cipher();
        let text = c.encrypt_base64(&[0xff, 0xfe, 0xfd]);
        let md5 = digest::md5_hex(text.as_bytes());
        let content = TextContent { text, md5 };
        assert!(matches!(
            content.open(&c),
            Err(Error::Cipher(CipherError::InvalidData))
        ));
    }

    #[test]
    fn file_roundtrip() {
        let c = cipher();
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let sealed = EncryptedFile::seal(&c, "contract.pdf", &data);
        assert!(sealed.verify_checksum());
        assert_eq!(sealed.open_name(&c).unwrap(), "contract.pdf");
        let (name, plain) = sealed.open(&c).unwrap();
        assert_eq!(name, "contract.pdf");
        assert_eq!(plain, data);

        let json = serde_json::to_string(&sealed).unwrap();
        let back: EncryptedFile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sealed);
    }

    #[test]
    fn file_tampered_data() {
        let c = cipher();
        let mut sealed = EncryptedFile::seal(&c, "a.txt", b"abc");
        sealed.data[0] ^= 1;
        assert!(!sealed.verify_checksum());
        assert!(matches!(sealed.open(&c), Err(Error::ChecksumMismatch)));
    }
}
