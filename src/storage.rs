//! Secure local storage boundary (keychain equivalent).
//!
//! The core only needs `get`/`set`/`remove` on opaque byte values. Two
//! implementations ship with the crate: [`MemoryStorage`] for tests and
//! embedding, and [`DirStorage`], one hex-encoded file per key under a
//! directory, used by the CLI.
//!
//! Per-deal records live under `sharedSecret.deal_<dealId>` and hold the
//! client share and the verification hash (see [`StoredClientShare`]).

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::error::StorageError;
use crate::share::Share;

const KEY_PREFIX: &str = "sharedSecret.deal_";

/// Storage key for a deal's client share record.
pub fn deal_key(deal_id: &str) -> String {
    format!("{KEY_PREFIX}{deal_id}")
}

/// Key/value storage for sensitive bytes.
pub trait SecretStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// Per-deal record
// ---------------------------------------------------------------------------

/// What a client keeps for a deal: its share and the hash that proves a
/// later recovery produced the right secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredClientShare {
    pub client_share: Share,
    pub hash_of_secret: String,
}

#[derive(Serialize, Deserialize)]
struct Record {
    client_share: String,
    hash_of_secret: String,
}

impl Drop for Record {
    fn drop(&mut self) {
        self.client_share.zeroize();
    }
}

impl StoredClientShare {
    fn to_json(&self, key: &str) -> Result<Zeroizing<Vec<u8>>, StorageError> {
        let record = Record {
            client_share: self.client_share.to_base64(),
            hash_of_secret: self.hash_of_secret.clone(),
        };
        serde_json::to_vec(&record)
            .map(Zeroizing::new)
            .map_err(|_| StorageError::Corrupt(key.to_owned()))
    }

    fn from_json(key: &str, bytes: &[u8]) -> Result<Self, StorageError> {
        let corrupt = || StorageError::Corrupt(key.to_owned());
        let record: Record = serde_json::from_slice(bytes).map_err(|_| corrupt())?;
        let client_share = Share::from_base64(&record.client_share).ok_or_else(corrupt)?;
        Ok(Self {
            client_share,
            hash_of_secret: record.hash_of_secret.clone(),
        })
    }
}

/// Typed access to per-deal records on top of any [`SecretStorage`].
pub struct SharedSecretStore<S> {
    storage: S,
}

impl<S: SecretStorage> SharedSecretStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn get_shared_secret(&self, deal_id: &str) -> Result<Option<StoredClientShare>, StorageError> {
        let key = deal_key(deal_id);
        match self.storage.get(&key)? {
            Some(bytes) => {
                let bytes = Zeroizing::new(bytes);
                StoredClientShare::from_json(&key, &bytes).map(Some)
            }
            None => Ok(None),
        }
    }

    pub fn save_shared_secret(&self, deal_id: &str, record: &StoredClientShare) -> Result<(), StorageError> {
        debug!(deal_id, "saving client share");
        let key = deal_key(deal_id);
        self.storage.set(&key, &record.to_json(&key)?)
    }

    pub fn delete_shared_secret(&self, deal_id: &str) -> Result<(), StorageError> {
        debug!(deal_id, "deleting client share");
        self.storage.remove(&deal_key(deal_id))
    }
}

// ---------------------------------------------------------------------------
// In-memory storage
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Zeroizing<Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Zeroizing<Vec<u8>>>> {
        // A poisoned map is still a valid map.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SecretStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.lock().get(key).map(|v| v.to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.lock()
            .insert(key.to_owned(), Zeroizing::new(value.to_vec()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }
}

impl<T: SecretStorage + ?Sized> SecretStorage for &T {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

// ---------------------------------------------------------------------------
// Directory storage
// ---------------------------------------------------------------------------

/// One file per key, `<dir>/<key>.secret`, contents hex-encoded.
///
/// Keys are restricted to `[A-Za-z0-9._-]` so they map onto file names
/// without escaping; anything else is an I/O error.
pub struct DirStorage {
    dir: PathBuf,
}

impl DirStorage {
    /// Open (and create if missing) a storage directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("storage key {key:?} contains unsupported characters"),
            )
            .into());
        }
        Ok(self.dir.join(format!("{key}.secret")))
    }
}

#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create_new(true).open(path)
}

impl SecretStorage for DirStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        let text = match fs::read_to_string(&path) {
            Ok(t) => Zeroizing::new(t),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        hex::decode(text.trim())
            .map(Some)
            .map_err(|_| StorageError::Corrupt(key.to_owned()))
    }

    /// Writes `<key>.secret.tmp` owner-only, syncs it, then renames it over
    /// the record so a reader sees either the old or the new value.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!("{key}.secret.tmp"));
        let text = Zeroizing::new(hex::encode(value));

        // Leftover from an interrupted write.
        match fs::remove_file(&tmp) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let written = create_private(&tmp).and_then(|mut file| {
            file.write_all(text.as_bytes())?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|()| fs::rename(&tmp, &path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sss;

    fn sample_record() -> StoredClientShare {
        let shares = sss::create_shares(&[1u8; 32], 2, 2).unwrap();
        StoredClientShare {
            client_share: shares[0].clone(),
            hash_of_secret: crate::digest::sha3_256_hex(&[1u8; 32]),
        }
    }

    #[test]
    fn deal_key_format() {
        assert_eq!(deal_key("42"), "sharedSecret.deal_42");
    }

    #[test]
    fn memory_storage_basic() {
        let storage = MemoryStorage::new();
        assert!(storage.get("a").unwrap().is_none());
        storage.set("a", b"value").unwrap();
        assert_eq!(storage.get("a").unwrap().unwrap(), b"value");
        storage.remove("a").unwrap();
        assert!(storage.get("a").unwrap().is_none());
        storage.remove("a").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn store_roundtrip_memory() {
        let store = SharedSecretStore::new(MemoryStorage::new());
        let record = sample_record();
        store.save_shared_secret("d1", &record).unwrap();
        assert!(store.storage().get("sharedSecret.deal_d1").unwrap().is_some());
        assert_eq!(store.get_shared_secret("d1").unwrap(), Some(record));
        assert_eq!(store.get_shared_secret("d2").unwrap(), None);
        store.delete_shared_secret("d1").unwrap();
        assert_eq!(store.get_shared_secret("d1").unwrap(), None);
    }

    #[test]
    fn corrupt_record() {
        let storage = MemoryStorage::new();
        storage.set(&deal_key("bad"), b"{not json").unwrap();
        let store = SharedSecretStore::new(&storage);
        assert!(matches!(
            store.get_shared_secret("bad"),
            Err(StorageError::Corrupt(_))
        ));
    }

    #[test]
    fn dir_storage_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = DirStorage::open(tmp.path().join("store")).unwrap();
        assert!(storage.get("sharedSecret.deal_7").unwrap().is_none());
        storage.set("sharedSecret.deal_7", &[0, 1, 2, 255]).unwrap();
        assert_eq!(
            storage.get("sharedSecret.deal_7").unwrap().unwrap(),
            vec![0, 1, 2, 255]
        );
        let on_disk =
            std::fs::read_to_string(storage.dir().join("sharedSecret.deal_7.secret")).unwrap();
        assert_eq!(on_disk, "000102ff");
        storage.remove("sharedSecret.deal_7").unwrap();
        assert!(storage.get("sharedSecret.deal_7").unwrap().is_none());
    }

    #[test]
    fn dir_storage_overwrite_leaves_no_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = DirStorage::open(tmp.path()).unwrap();
        storage.set("k", b"first").unwrap();
        // Stale temp file from an interrupted write.
        std::fs::write(tmp.path().join("k.secret.tmp"), b"junk").unwrap();
        storage.set("k", b"second").unwrap();
        assert_eq!(storage.get("k").unwrap().unwrap(), b"second");
        assert!(!tmp.path().join("k.secret.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn dir_storage_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let storage = DirStorage::open(tmp.path()).unwrap();
        storage.set("sharedSecret.deal_1", b"share").unwrap();
        let mode = std::fs::metadata(tmp.path().join("sharedSecret.deal_1.secret"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn dir_storage_rejects_path_like_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = DirStorage::open(tmp.path()).unwrap();
        assert!(storage.set("../escape", b"x").is_err());
        assert!(storage.set("a/b", b"x").is_err());
        assert!(storage.get("").is_err());
    }

    #[test]
    fn dir_store_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SharedSecretStore::new(DirStorage::open(tmp.path()).unwrap());
        let record = sample_record();
        store.save_shared_secret("abc-123", &record).unwrap();
        assert_eq!(store.get_shared_secret("abc-123").unwrap(), Some(record));
    }
}
