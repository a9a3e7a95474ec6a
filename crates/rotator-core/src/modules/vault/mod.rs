//! Credential vault.
//!
//! Encrypts secret strings at rest under a machine-local master key. The key is
//! resolved once per process through an ordered list of [`KeyStrategy`]s and then
//! kept in memory; concurrent first uses share a single resolution.

mod cipher;
mod strategies;

use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use rand::RngCore;
use rotator_types::models::VaultConfig;
use rotator_types::VaultError;
use tracing::debug;

use crate::utils::single_flight::SingleFlight;

pub use cipher::{parse_envelope, Envelope, IV_LEN, TAG_LEN};
pub use strategies::{
    resolve_master_key, FallbackKeyFile, KeyStrategy, KeychainStrategy, OsProtectedKeyFile,
    OsProtector, UnavailableProtector,
};

/// File holding the OS-protected key.
pub const PROTECTED_KEY_FILE: &str = ".mk";
/// File holding the plaintext fallback key.
pub const FALLBACK_KEY_FILE: &str = ".mk.fallback";

const RESOLVE_KEY: &str = "master-key";

/// 256-bit master key. `Debug` never prints the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// 32 bytes from the thread-local CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_hex(hex_key: &str) -> Result<Self, String> {
        let bytes = hex::decode(hex_key.trim()).map_err(|e| format!("key is not hex: {e}"))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| format!("key is {} bytes, expected 32", v.len()))?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// Encryption boundary with a lazily resolved, process-lifetime master key.
pub struct Vault {
    strategies: Arc<Vec<Box<dyn KeyStrategy>>>,
    cached: Arc<OnceLock<MasterKey>>,
    resolving: SingleFlight<&'static str, MasterKey, VaultError>,
}

impl Vault {
    pub fn new(strategies: Vec<Box<dyn KeyStrategy>>) -> Self {
        Self {
            strategies: Arc::new(strategies),
            cached: Arc::new(OnceLock::new()),
            resolving: SingleFlight::new(),
        }
    }

    /// OS secure storage, then the system keychain, then a plain key file.
    pub fn with_default_strategies(
        data_dir: &Path,
        protector: Arc<dyn OsProtector>,
        config: &VaultConfig,
    ) -> Self {
        Self::new(vec![
            Box::new(OsProtectedKeyFile::new(data_dir.join(PROTECTED_KEY_FILE), protector)),
            Box::new(KeychainStrategy::new(&config.keychain_service, &config.keychain_account)),
            Box::new(FallbackKeyFile::new(data_dir.join(FALLBACK_KEY_FILE))),
        ])
    }

    /// Whether the master key has been resolved in this process.
    pub fn is_key_cached(&self) -> bool {
        self.cached.get().is_some()
    }

    /// Resolve (once) and return the master key.
    pub async fn master_key(&self) -> Result<MasterKey, VaultError> {
        if let Some(key) = self.cached.get() {
            return Ok(key.clone());
        }

        let strategies = Arc::clone(&self.strategies);
        let cached = Arc::clone(&self.cached);
        self.resolving
            .run(RESOLVE_KEY, move || async move {
                if let Some(key) = cached.get() {
                    return Ok(key.clone());
                }
                let key = tokio::task::spawn_blocking(move || resolve_master_key(&strategies))
                    .await
                    .map_err(|e| VaultError::KeyStorageUnavailable {
                        attempts: vec![format!("resolver task: {e}")],
                    })??;
                let _ = cached.set(key.clone());
                debug!("[Vault] Master key cached for this process");
                Ok(key)
            })
            .await
    }

    pub async fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let key = self.master_key().await?;
        cipher::seal(&key, plaintext)
    }

    /// Decrypt an envelope; legacy plaintext is returned unchanged without touching the key.
    pub async fn decrypt(&self, text: &str) -> Result<String, VaultError> {
        let Some(envelope) = cipher::parse_envelope(text)? else {
            return Ok(text.to_string());
        };
        let key = self.master_key().await?;
        cipher::open(&key, &envelope)
    }
}
