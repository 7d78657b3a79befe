//! Credential vault: symmetric encryption of device descriptors at rest.
//!
//! Device configurations may carry connection secrets, so only the
//! encrypted wrapper ever reaches the tasks table. Logs and API responses
//! always see the decrypted descriptor.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, CHACHA20_POLY1305, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

use crate::domain::errors::{TrackerError, TrackerResult};
use crate::domain::models::Device;

const KEY_LEN: usize = 32;
const ENCRYPTION_KEY_ENV: &str = "ENCRYPTION_KEY";

/// Symmetric vault keyed by a process-wide 32-byte secret.
pub struct CredentialVault {
    key: [u8; KEY_LEN],
}

impl CredentialVault {
    /// Build a vault from an explicit key. Used by tests.
    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Acquire the key: `ENCRYPTION_KEY` env var first, then the key file
    /// under the user's config directory, else generate a fresh key and
    /// persist it. The first write uses an exclusive create so concurrent
    /// processes never clobber each other; the loser re-reads the winner's
    /// file.
    pub fn bootstrap() -> TrackerResult<Self> {
        if let Ok(encoded) = std::env::var(ENCRYPTION_KEY_ENV) {
            return Ok(Self {
                key: decode_key(&encoded)?,
            });
        }

        let path = key_file_path()?;
        if let Ok(encoded) = fs::read_to_string(&path) {
            return Ok(Self {
                key: decode_key(encoded.trim())?,
            });
        }

        let mut key = [0u8; KEY_LEN];
        SystemRandom::new()
            .fill(&mut key)
            .map_err(|_| TrackerError::Encryption("key generation failed".into()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| TrackerError::Encryption(format!("cannot create key dir: {e}")))?;
        }
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => {
                use std::io::Write;
                let mut file = file;
                file.write_all(BASE64.encode(key).as_bytes())
                    .map_err(|e| TrackerError::Encryption(format!("cannot write key file: {e}")))?;
                Ok(Self { key })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let encoded = fs::read_to_string(&path)
                    .map_err(|e| TrackerError::Encryption(format!("cannot read key file: {e}")))?;
                Ok(Self {
                    key: decode_key(encoded.trim())?,
                })
            }
            Err(e) => Err(TrackerError::Encryption(format!(
                "cannot create key file: {e}"
            ))),
        }
    }

    fn sealing_key(&self) -> TrackerResult<LessSafeKey> {
        let unbound = UnboundKey::new(&CHACHA20_POLY1305, &self.key)
            .map_err(|_| TrackerError::Encryption("invalid key material".into()))?;
        Ok(LessSafeKey::new(unbound))
    }

    /// Encrypt a device descriptor: base64 of `nonce || ciphertext || tag`
    /// over the descriptor's canonical (JCS) JSON.
    pub fn encrypt_device(&self, device: &Device) -> TrackerResult<String> {
        let plaintext = serde_jcs::to_string(device)?.into_bytes();
        let key = self.sealing_key()?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        SystemRandom::new()
            .fill(&mut nonce_bytes)
            .map_err(|_| TrackerError::Encryption("nonce generation failed".into()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext;
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| TrackerError::Encryption("seal failed".into()))?;

        let mut wrapped = Vec::with_capacity(NONCE_LEN + in_out.len());
        wrapped.extend_from_slice(&nonce_bytes);
        wrapped.extend_from_slice(&in_out);
        Ok(BASE64.encode(wrapped))
    }

    /// Decrypt a wrapped device column. `None` passes through as `None`.
    pub fn decrypt_device(&self, wrapped: Option<&str>) -> TrackerResult<Option<Device>> {
        let Some(wrapped) = wrapped else {
            return Ok(None);
        };
        let raw = BASE64
            .decode(wrapped)
            .map_err(|e| TrackerError::Encryption(format!("bad device wrapper: {e}")))?;
        if raw.len() <= NONCE_LEN {
            return Err(TrackerError::Encryption("device wrapper too short".into()));
        }
        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| TrackerError::Encryption("bad nonce".into()))?;

        let key = self.sealing_key()?;
        let mut in_out = ciphertext.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| TrackerError::Encryption("open failed".into()))?;
        let device = serde_json::from_slice(plaintext)?;
        Ok(Some(device))
    }
}

fn decode_key(encoded: &str) -> TrackerResult<[u8; KEY_LEN]> {
    let raw = BASE64
        .decode(encoded)
        .map_err(|e| TrackerError::Encryption(format!("bad encryption key encoding: {e}")))?;
    raw.try_into()
        .map_err(|_| TrackerError::Encryption("encryption key must be 32 bytes".into()))
}

fn key_file_path() -> TrackerResult<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| TrackerError::Encryption("HOME is not set; cannot locate key file".into()))?;
    Ok(PathBuf::from(home).join(".trackway").join("encryption_key"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> CredentialVault {
        CredentialVault::from_key([7u8; KEY_LEN])
    }

    fn device() -> Device {
        Device {
            name: "desktop-1".into(),
            provider: Some("qemu".into()),
            config: [("password".to_string(), serde_json::json!("hunter2"))].into(),
        }
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let vault = vault();
        let wrapped = vault.encrypt_device(&device()).unwrap();
        // Ciphertext must not leak the plaintext.
        assert!(!wrapped.contains("hunter2"));
        let opened = vault.decrypt_device(Some(&wrapped)).unwrap().unwrap();
        assert_eq!(opened, device());
    }

    #[test]
    fn test_decrypt_none_is_none() {
        assert!(vault().decrypt_device(None).unwrap().is_none());
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let wrapped = vault().encrypt_device(&device()).unwrap();
        let other = CredentialVault::from_key([9u8; KEY_LEN]);
        assert!(other.decrypt_device(Some(&wrapped)).is_err());
    }

    #[test]
    fn test_nonces_differ_between_calls() {
        let vault = vault();
        let a = vault.encrypt_device(&device()).unwrap();
        let b = vault.encrypt_device(&device()).unwrap();
        assert_ne!(a, b);
    }
}
