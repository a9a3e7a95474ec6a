//! AES-256-GCM envelope `ivhex:taghex:cipherhex`.
//!
//! A 16-byte IV and a 16-byte tag are used so envelopes written by earlier releases
//! keep decrypting.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce};
use rand::RngCore;
use rotator_types::VaultError;

use super::MasterKey;

/// AES-256-GCM with a 128-bit nonce.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

pub const IV_LEN: usize = 16;
pub const TAG_LEN: usize = 16;

/// A parsed ciphertext envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub iv: Vec<u8>,
    pub tag: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

/// Classify `text`: `Ok(None)` means legacy plaintext to be returned unchanged.
///
/// JSON-looking input and anything that is not exactly three colon-separated
/// segments is legacy. Bad hex is `InvalidFormat`; wrong IV or tag length is
/// `CorruptedData`.
pub fn parse_envelope(text: &str) -> Result<Option<Envelope>, VaultError> {
    if text.starts_with('{') || text.starts_with('[') {
        return Ok(None);
    }

    let parts: Vec<&str> = text.split(':').collect();
    let [iv_hex, tag_hex, cipher_hex] = parts.as_slice() else {
        return Ok(None);
    };

    let decode = |label: &str, segment: &str| {
        hex::decode(segment).map_err(|e| VaultError::InvalidFormat {
            message: format!("{label} segment is not valid hex: {e}"),
        })
    };
    let iv = decode("iv", iv_hex)?;
    let tag = decode("auth tag", tag_hex)?;
    let ciphertext = decode("cipher", cipher_hex)?;

    if iv.len() != IV_LEN {
        return Err(VaultError::CorruptedData {
            message: format!("iv is {} bytes, expected {}", iv.len(), IV_LEN),
        });
    }
    if tag.len() != TAG_LEN {
        return Err(VaultError::CorruptedData {
            message: format!("auth tag is {} bytes, expected {}", tag.len(), TAG_LEN),
        });
    }

    Ok(Some(Envelope { iv, tag, ciphertext }))
}

fn cipher_for(key: &MasterKey) -> Result<Aes256Gcm16, String> {
    Aes256Gcm16::new_from_slice(key.as_bytes()).map_err(|e| format!("invalid key length: {e}"))
}

/// Encrypt `plaintext` under `key` with a fresh random IV.
pub fn seal(key: &MasterKey, plaintext: &str) -> Result<String, VaultError> {
    let cipher =
        cipher_for(key).map_err(|message| VaultError::EncryptionFailed { message })?;

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    // aes-gcm appends the tag to the ciphertext.
    let mut sealed = cipher
        .encrypt(Nonce::<U16>::from_slice(&iv), plaintext.as_bytes())
        .map_err(|_| VaultError::EncryptionFailed { message: "AEAD seal failed".to_string() })?;
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    Ok(format!("{}:{}:{}", hex::encode(iv), hex::encode(tag), hex::encode(sealed)))
}

/// Decrypt an already parsed envelope.
pub fn open(key: &MasterKey, envelope: &Envelope) -> Result<String, VaultError> {
    let cipher =
        cipher_for(key).map_err(|message| VaultError::CorruptedData { message })?;

    let mut combined = Vec::with_capacity(envelope.ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(&envelope.ciphertext);
    combined.extend_from_slice(&envelope.tag);

    let plain = cipher
        .decrypt(Nonce::<U16>::from_slice(&envelope.iv), combined.as_slice())
        .map_err(|_| VaultError::AuthTagMismatch)?;

    String::from_utf8(plain).map_err(|e| VaultError::DecryptionFailed {
        message: format!("plaintext is not UTF-8: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> MasterKey {
        MasterKey::from_bytes([byte; 32])
    }

    #[test]
    fn test_round_trip() {
        let k = key(7);
        for text in ["", "hello", "{\"access_token\":\"x\"}", "ключ:значение 🔑"] {
            let sealed = seal(&k, text).unwrap();
            let env = parse_envelope(&sealed).unwrap().expect("envelope");
            assert_eq!(open(&k, &env).unwrap(), text);
        }
    }

    #[test]
    fn test_envelope_shape() {
        let sealed = seal(&key(1), "abc").unwrap();
        let parts: Vec<&str> = sealed.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), IV_LEN * 2);
        assert_eq!(parts[1].len(), TAG_LEN * 2);
        assert_eq!(parts[2].len(), 6);
        assert!(sealed.chars().all(|c| c == ':' || c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let k = key(2);
        assert_ne!(seal(&k, "same").unwrap(), seal(&k, "same").unwrap());
    }

    #[test]
    fn test_legacy_inputs_pass_through() {
        assert_eq!(parse_envelope("{\"a\":1}").unwrap(), None);
        assert_eq!(parse_envelope("[1,2]").unwrap(), None);
        assert_eq!(parse_envelope("plain-token").unwrap(), None);
        assert_eq!(parse_envelope("a:b").unwrap(), None);
        assert_eq!(parse_envelope("a:b:c:d").unwrap(), None);
    }

    #[test]
    fn test_error_categories() {
        assert!(matches!(parse_envelope("zz:00:00"), Err(VaultError::InvalidFormat { .. })));
        assert!(matches!(
            parse_envelope(&format!("{}:{}:00", "00".repeat(12), "00".repeat(16))),
            Err(VaultError::CorruptedData { .. })
        ));

        let sealed = seal(&key(3), "secret").unwrap();
        let env = parse_envelope(&sealed).unwrap().unwrap();
        assert_eq!(open(&key(4), &env), Err(VaultError::AuthTagMismatch));

        let mut tampered = env.clone();
        tampered.ciphertext[0] ^= 0xFF;
        assert_eq!(open(&key(3), &tampered), Err(VaultError::AuthTagMismatch));
    }

    #[test]
    fn test_uppercase_hex_is_accepted() {
        let k = key(5);
        let sealed = seal(&k, "mixed").unwrap().to_uppercase();
        let env = parse_envelope(&sealed).unwrap().unwrap();
        assert_eq!(open(&k, &env).unwrap(), "mixed");
    }
}
