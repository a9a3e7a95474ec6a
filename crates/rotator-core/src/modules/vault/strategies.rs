//! Master key storage strategies, tried in order until one yields a key.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use super::MasterKey;
use crate::utils::fs::atomic_write;

/// One way of persisting the master key.
///
/// `load` returns `Ok(None)` when no usable key is stored yet, in which case the
/// resolver calls `generate`, which must create, persist and return a new key.
pub trait KeyStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn load(&self) -> Result<Option<MasterKey>, String>;
    fn generate(&self) -> Result<MasterKey, String>;
}

/// OS-level secret protection (DPAPI, Keychain-backed safe storage, libsecret, ...).
pub trait OsProtector: Send + Sync {
    fn is_available(&self) -> bool;
    fn protect(&self, plaintext: &[u8]) -> Result<Vec<u8>, String>;
    fn unprotect(&self, blob: &[u8]) -> Result<Vec<u8>, String>;
}

/// Protector for hosts without an OS facility; makes the first strategy step aside.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableProtector;

impl OsProtector for UnavailableProtector {
    fn is_available(&self) -> bool {
        false
    }

    fn protect(&self, _plaintext: &[u8]) -> Result<Vec<u8>, String> {
        Err("OS secure storage is not available".to_string())
    }

    fn unprotect(&self, _blob: &[u8]) -> Result<Vec<u8>, String> {
        Err("OS secure storage is not available".to_string())
    }
}

/// Key file whose content is the hex key encrypted by an [`OsProtector`].
pub struct OsProtectedKeyFile {
    path: PathBuf,
    protector: Arc<dyn OsProtector>,
}

impl OsProtectedKeyFile {
    pub fn new(path: PathBuf, protector: Arc<dyn OsProtector>) -> Self {
        Self { path, protector }
    }
}

impl KeyStrategy for OsProtectedKeyFile {
    fn name(&self) -> &'static str {
        "os-secure-storage"
    }

    fn load(&self) -> Result<Option<MasterKey>, String> {
        if !self.protector.is_available() {
            return Err("OS secure storage is not available".to_string());
        }

        let blob = match fs::read(&self.path) {
            Ok(blob) => blob,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!("[Vault] Error reading protected key file, regenerating: {}", e);
                return Ok(None);
            },
        };

        let key = self
            .protector
            .unprotect(&blob)
            .and_then(|hex_key| String::from_utf8(hex_key).map_err(|e| e.to_string()))
            .and_then(|hex_key| MasterKey::from_hex(&hex_key));
        match key {
            Ok(key) => {
                info!("[Vault] Loaded master key via OS secure storage");
                Ok(Some(key))
            },
            Err(e) => {
                warn!("[Vault] Protected key file unreadable, regenerating: {}", e);
                Ok(None)
            },
        }
    }

    fn generate(&self) -> Result<MasterKey, String> {
        let key = MasterKey::random();
        let blob = self.protector.protect(key.to_hex().as_bytes())?;
        atomic_write(&self.path, &blob)
            .map_err(|e| format!("failed to write {}: {}", self.path.display(), e))?;
        info!("[Vault] Generated new master key via OS secure storage");
        Ok(key)
    }
}

/// System keychain / credential manager entry holding the hex key.
pub struct KeychainStrategy {
    service: String,
    account: String,
}

impl KeychainStrategy {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self { service: service.into(), account: account.into() }
    }

    fn entry(&self) -> Result<keyring::Entry, String> {
        keyring::Entry::new(&self.service, &self.account).map_err(|e| e.to_string())
    }
}

impl KeyStrategy for KeychainStrategy {
    fn name(&self) -> &'static str {
        "keychain"
    }

    fn load(&self) -> Result<Option<MasterKey>, String> {
        match self.entry()?.get_password() {
            Ok(hex_key) => {
                let key = MasterKey::from_hex(&hex_key)?;
                info!("[Vault] Loaded master key via keychain");
                Ok(Some(key))
            },
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.to_string()),
        }
    }

    fn generate(&self) -> Result<MasterKey, String> {
        info!("[Vault] Generating new master key via keychain...");
        let key = MasterKey::random();
        self.entry()?.set_password(&key.to_hex()).map_err(|e| e.to_string())?;
        Ok(key)
    }
}

/// Plain 64-hex-character key file. Least secure; only used when nothing else works.
pub struct FallbackKeyFile {
    path: PathBuf,
}

impl FallbackKeyFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl KeyStrategy for FallbackKeyFile {
    fn name(&self) -> &'static str {
        "fallback-file"
    }

    fn load(&self) -> Result<Option<MasterKey>, String> {
        warn!(
            "[Vault] Using file-based key storage. This is less secure than the system \
             keychain; keep the data directory permissions restricted."
        );
        match fs::read_to_string(&self.path) {
            Ok(content) if content.len() == 64 => Ok(MasterKey::from_hex(&content).ok()),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!("[Vault] Error reading fallback key file: {}", e);
                Ok(None)
            },
        }
    }

    fn generate(&self) -> Result<MasterKey, String> {
        warn!("[Vault] Generating file-based fallback key");
        let key = MasterKey::random();
        atomic_write(&self.path, key.to_hex().as_bytes())
            .map_err(|e| format!("failed to write {}: {}", self.path.display(), e))?;
        Ok(key)
    }
}

/// Try every strategy in order; the first key loaded or generated wins.
pub fn resolve_master_key(
    strategies: &[Box<dyn KeyStrategy>],
) -> Result<MasterKey, rotator_types::VaultError> {
    let mut attempts = Vec::with_capacity(strategies.len());

    for strategy in strategies {
        let outcome = strategy.load().and_then(|loaded| match loaded {
            Some(key) => Ok(key),
            None => strategy.generate(),
        });
        match outcome {
            Ok(key) => return Ok(key),
            Err(e) => {
                warn!("[Vault] Key strategy {} failed: {}", strategy.name(), e);
                attempts.push(format!("{}: {}", strategy.name(), e));
            },
        }
    }

    tracing::error!("[Vault] All key storage methods failed");
    Err(rotator_types::VaultError::KeyStorageUnavailable { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::XorProtector;

    #[test]
    fn test_fallback_file_generates_then_loads() {
        let dir = tempfile::tempdir().unwrap();
        let strategy = FallbackKeyFile::new(dir.path().join(".mk.fallback"));

        assert_eq!(strategy.load().unwrap(), None);
        let key = strategy.generate().unwrap();
        let content = fs::read_to_string(dir.path().join(".mk.fallback")).unwrap();
        assert_eq!(content.len(), 64);
        assert_eq!(strategy.load().unwrap(), Some(key));
    }

    #[test]
    fn test_fallback_file_ignores_malformed_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".mk.fallback");
        fs::write(&path, "not-a-key").unwrap();
        assert_eq!(FallbackKeyFile::new(path.clone()).load().unwrap(), None);
        fs::write(&path, "g".repeat(64)).unwrap();
        assert_eq!(FallbackKeyFile::new(path).load().unwrap(), None);
    }

    #[test]
    fn test_protected_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let protector = Arc::new(XorProtector::default());
        let strategy = OsProtectedKeyFile::new(dir.path().join(".mk"), protector.clone());

        assert_eq!(strategy.load().unwrap(), None);
        let key = strategy.generate().unwrap();
        // Stored bytes are the protected form, not the hex key.
        assert_ne!(fs::read(dir.path().join(".mk")).unwrap(), key.to_hex().into_bytes());
        assert_eq!(strategy.load().unwrap(), Some(key));
    }

    #[test]
    fn test_protected_file_unavailable_fails_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let strategy =
            OsProtectedKeyFile::new(dir.path().join(".mk"), Arc::new(UnavailableProtector));
        assert!(strategy.load().is_err());
    }

    struct Broken;
    impl KeyStrategy for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn load(&self) -> Result<Option<MasterKey>, String> {
            Err("locked".to_string())
        }
        fn generate(&self) -> Result<MasterKey, String> {
            Err("locked".to_string())
        }
    }

    #[test]
    fn test_first_success_wins_after_failures() {
        let dir = tempfile::tempdir().unwrap();
        let strategies: Vec<Box<dyn KeyStrategy>> =
            vec![Box::new(Broken), Box::new(FallbackKeyFile::new(dir.path().join("k")))];
        assert!(resolve_master_key(&strategies).is_ok());
        assert!(dir.path().join("k").exists());
    }

    #[test]
    fn test_all_failures_are_aggregated() {
        let strategies: Vec<Box<dyn KeyStrategy>> = vec![Box::new(Broken), Box::new(Broken)];
        let err = resolve_master_key(&strategies).unwrap_err();
        assert_eq!(
            err,
            rotator_types::VaultError::KeyStorageUnavailable {
                attempts: vec!["broken: locked".to_string(), "broken: locked".to_string()]
            }
        );
    }
}
