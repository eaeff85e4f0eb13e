use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::app_dirs;

use super::RepoConfig;

const KEYRING_SERVICE: &str = "sonicvault";
const KEYRING_KEY: &str = "sonicvault_gh_config";
const DISABLE_KEYRING_ENV: &str = "SONICVAULT_DISABLE_KEYRING";
const FALLBACK_RECORD_FILE: &str = "gh_config.bin";
const FALLBACK_KEY_FILE: &str = "gh_config.key";
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum CredentialStoreError {
    #[error("Credential store unavailable: {0}")]
    Unavailable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Crypto error: {0}")]
    Crypto(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("App dir error: {0}")]
    AppDir(#[from] crate::app_dirs::AppDirError),
}

/// Read/write access to the saved repository credentials.
pub trait CredentialProvider {
    fn load(&self) -> Result<Option<RepoConfig>, CredentialStoreError>;
    fn save(&self, config: &RepoConfig) -> Result<(), CredentialStoreError>;
}

/// Persists one JSON `{token, owner, repo}` record.
///
/// The OS keyring is tried first; when it is unavailable the record is
/// encrypted into the app's `secrets` directory.
#[derive(Clone, Debug)]
pub struct CredentialStore {
    fallback_dir: PathBuf,
}

impl CredentialStore {
    pub fn new() -> Result<Self, CredentialStoreError> {
        Ok(Self::with_fallback_dir(app_dirs::secrets_dir()?))
    }

    pub fn with_fallback_dir(fallback_dir: PathBuf) -> Self {
        Self { fallback_dir }
    }

    /// Remove the saved record from every backend.
    pub fn clear(&self) -> Result<(), CredentialStoreError> {
        let _ = self.try_keyring_delete();
        self.fallback_delete();
        Ok(())
    }

    fn try_keyring_get(&self) -> Option<String> {
        if keyring_disabled() {
            return None;
        }
        let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_KEY).ok()?;
        match entry.get_password() {
            Ok(json) => Some(json),
            Err(keyring::Error::NoEntry) => None,
            Err(err) => {
                tracing::debug!(error = %err, "Keyring read failed; trying fallback");
                None
            }
        }
    }

    fn try_keyring_set(&self, json: &str) -> Result<(), CredentialStoreError> {
        if keyring_disabled() {
            return Err(CredentialStoreError::Unavailable("keyring disabled".into()));
        }
        keyring::Entry::new(KEYRING_SERVICE, KEYRING_KEY)
            .and_then(|entry| entry.set_password(json))
            .map_err(|err| CredentialStoreError::Unavailable(err.to_string()))
    }

    fn try_keyring_delete(&self) -> Result<(), CredentialStoreError> {
        if keyring_disabled() {
            return Ok(());
        }
        let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_KEY)
            .map_err(|err| CredentialStoreError::Unavailable(err.to_string()))?;
        let _ = entry.delete_credential();
        Ok(())
    }

    fn record_path(&self) -> PathBuf {
        self.fallback_dir.join(FALLBACK_RECORD_FILE)
    }

    fn key_path(&self) -> PathBuf {
        self.fallback_dir.join(FALLBACK_KEY_FILE)
    }

    fn fallback_get(&self) -> Result<Option<String>, CredentialStoreError> {
        let record_path = self.record_path();
        if !record_path.exists() {
            return Ok(None);
        }
        let data = std::fs::read(record_path)?;
        if data.len() < NONCE_LEN {
            return Err(CredentialStoreError::Decode("credential file too short".into()));
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let key = std::fs::read(self.key_path())?;
        if key.len() != KEY_LEN {
            return Err(CredentialStoreError::Decode("credential key invalid".into()));
        }
        let plaintext = decrypt(&key, nonce, ciphertext)?;
        String::from_utf8(plaintext)
            .map(Some)
            .map_err(|err| CredentialStoreError::Decode(err.to_string()))
    }

    fn fallback_set(&self, json: &str) -> Result<(), CredentialStoreError> {
        std::fs::create_dir_all(&self.fallback_dir)?;
        let key_path = self.key_path();
        let key = if key_path.exists() {
            std::fs::read(&key_path)?
        } else {
            let bytes = random_bytes(KEY_LEN)?;
            write_private_file(&key_path, &bytes)?;
            bytes
        };
        if key.len() != KEY_LEN {
            return Err(CredentialStoreError::Decode("credential key invalid".into()));
        }
        let nonce = random_bytes(NONCE_LEN)?;
        let mut payload = nonce.clone();
        payload.extend_from_slice(&encrypt(&key, &nonce, json.as_bytes())?);
        write_private_file(&self.record_path(), &payload)
    }

    fn fallback_delete(&self) {
        let _ = std::fs::remove_file(self.record_path());
        let _ = std::fs::remove_file(self.key_path());
    }
}

impl CredentialProvider for CredentialStore {
    fn load(&self) -> Result<Option<RepoConfig>, CredentialStoreError> {
        let json = match self.try_keyring_get() {
            Some(json) => Some(json),
            None => self.fallback_get()?,
        };
        json.map(|json| {
            serde_json::from_str(&json).map_err(|err| CredentialStoreError::Decode(err.to_string()))
        })
        .transpose()
    }

    fn save(&self, config: &RepoConfig) -> Result<(), CredentialStoreError> {
        let json = serde_json::to_string(config)
            .map_err(|err| CredentialStoreError::Decode(err.to_string()))?;
        // Some keyring backends accept writes they cannot read back.
        if self.try_keyring_set(&json).is_ok() && self.try_keyring_get().as_deref() == Some(json.as_str()) {
            self.fallback_delete();
            return Ok(());
        }
        self.fallback_set(&json)
    }
}

/// Process-local credentials, used for dry runs.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    saved: Mutex<Option<RepoConfig>>,
}

impl MemoryCredentials {
    pub fn with_config(config: RepoConfig) -> Self {
        Self {
            saved: Mutex::new(Some(config)),
        }
    }

    pub fn saved(&self) -> Option<RepoConfig> {
        self.saved
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }
}

impl CredentialProvider for MemoryCredentials {
    fn load(&self) -> Result<Option<RepoConfig>, CredentialStoreError> {
        Ok(self.saved())
    }

    fn save(&self, config: &RepoConfig) -> Result<(), CredentialStoreError> {
        *self.saved.lock().unwrap_or_else(|err| err.into_inner()) = Some(config.clone());
        Ok(())
    }
}

fn keyring_disabled() -> bool {
    std::env::var(DISABLE_KEYRING_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn random_bytes(len: usize) -> Result<Vec<u8>, CredentialStoreError> {
    use rand::TryRngCore;
    let mut out = vec![0u8; len];
    rand::rngs::OsRng
        .try_fill_bytes(&mut out)
        .map_err(|err| CredentialStoreError::Unavailable(err.to_string()))?;
    Ok(out)
}

fn write_private_file(path: &Path, bytes: &[u8]) -> Result<(), CredentialStoreError> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    file.write_all(bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    Ok(())
}

fn cipher(key: &[u8]) -> Result<chacha20poly1305::ChaCha20Poly1305, CredentialStoreError> {
    use chacha20poly1305::KeyInit;
    chacha20poly1305::ChaCha20Poly1305::new_from_slice(key)
        .map_err(|err| CredentialStoreError::Crypto(err.to_string()))
}

fn encrypt(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CredentialStoreError> {
    use chacha20poly1305::aead::Aead;
    cipher(key)?
        .encrypt(chacha20poly1305::Nonce::from_slice(nonce), plaintext)
        .map_err(|err| CredentialStoreError::Crypto(err.to_string()))
}

fn decrypt(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CredentialStoreError> {
    use chacha20poly1305::aead::Aead;
    cipher(key)?
        .decrypt(chacha20poly1305::Nonce::from_slice(nonce), ciphertext)
        .map_err(|err| CredentialStoreError::Crypto(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct KeyringOff;

    impl KeyringOff {
        fn set() -> Self {
            // SAFETY: every test touching this variable sets the same value.
            unsafe {
                std::env::set_var(DISABLE_KEYRING_ENV, "1");
            }
            Self
        }
    }

    #[test]
    fn fallback_roundtrip_when_keyring_disabled() {
        let _off = KeyringOff::set();
        let dir = tempdir().unwrap();
        let store = CredentialStore::with_fallback_dir(dir.path().join("secrets"));
        assert_eq!(store.load().unwrap(), None);
        let config = RepoConfig::new("ghp_abcdefghijklmnop", "octo", "vault");
        store.save(&config).unwrap();
        assert_eq!(store.load().unwrap(), Some(config));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn fallback_file_does_not_contain_plaintext_token() {
        let _off = KeyringOff::set();
        let dir = tempdir().unwrap();
        let store = CredentialStore::with_fallback_dir(dir.path().to_path_buf());
        store
            .save(&RepoConfig::new("ghp_plaintext_marker", "octo", "vault"))
            .unwrap();
        let raw = std::fs::read(dir.path().join(FALLBACK_RECORD_FILE)).unwrap();
        let haystack = String::from_utf8_lossy(&raw);
        assert!(!haystack.contains("ghp_plaintext_marker"));
    }

    #[test]
    fn corrupt_fallback_is_reported() {
        let _off = KeyringOff::set();
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(FALLBACK_RECORD_FILE), b"short").unwrap();
        let store = CredentialStore::with_fallback_dir(dir.path().to_path_buf());
        assert!(matches!(store.load(), Err(CredentialStoreError::Decode(_))));
    }
}
