use std::fmt;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

const NONCE_LENGTH: usize = 12;
const ENVELOPE_PREFIX: &str = "enc:v1";

/// AES-256-GCM encryption of individual column values, plus a keyed hash used
/// as a searchable blind index for uniqueness.
#[derive(Clone)]
pub struct FieldCipher {
    key: [u8; 32],
    secret: Vec<u8>,
}

impl fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldCipher(..)")
    }
}

impl FieldCipher {
    pub fn new(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self {
            key,
            secret: secret.as_bytes().to_vec(),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce_bytes);

        let cipher =
            Aes256Gcm::new_from_slice(&self.key).map_err(|_| anyhow!("Invalid encryption key"))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| anyhow!("Encryption failed"))?;

        Ok(format!(
            "{}:{}:{}",
            ENVELOPE_PREFIX,
            STANDARD_NO_PAD.encode(nonce_bytes),
            STANDARD_NO_PAD.encode(ciphertext)
        ))
    }

    /// Values without the envelope prefix were written in clear and are
    /// returned as is.
    pub fn decrypt(&self, stored: &str) -> Result<String> {
        let Some(payload) = stored
            .strip_prefix(ENVELOPE_PREFIX)
            .and_then(|rest| rest.strip_prefix(':'))
        else {
            return Ok(stored.to_string());
        };

        let (nonce_part, cipher_part) = payload
            .split_once(':')
            .ok_or_else(|| anyhow!("Missing ciphertext payload"))?;

        let nonce_bytes = STANDARD_NO_PAD
            .decode(nonce_part)
            .map_err(|_| anyhow!("Invalid nonce encoding"))?;
        if nonce_bytes.len() != NONCE_LENGTH {
            return Err(anyhow!("Invalid nonce length"));
        }
        let ciphertext = STANDARD_NO_PAD
            .decode(cipher_part)
            .map_err(|_| anyhow!("Invalid ciphertext encoding"))?;

        let cipher =
            Aes256Gcm::new_from_slice(&self.key).map_err(|_| anyhow!("Invalid decryption key"))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| anyhow!("Decryption failed"))?;
        String::from_utf8(plaintext).map_err(|_| anyhow!("Decrypted data is not UTF-8"))
    }

    /// Deterministic hex digest of `secret | part | part ...`.
    pub fn blind_index(&self, parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        for part in parts {
            hasher.update(b"|");
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}
