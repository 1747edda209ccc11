use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::Argon2;
use rand::Rng;
use zeroize::Zeroizing;

use crate::error::{AppError, AppResult};

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

/// Encrypts private keys at rest with AES-256-GCM.
///
/// The AES key is derived once from the configured passphrase with Argon2id.
/// Ciphertext text is `hex(nonce ‖ ciphertext ‖ tag)`.
pub struct KeyCipher {
    cipher: Aes256Gcm,
}

impl KeyCipher {
    pub fn new(passphrase: &str, salt: &str) -> AppResult<Self> {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        Argon2::default()
            .hash_password_into(passphrase.as_bytes(), salt.as_bytes(), &mut *key)
            .map_err(|e| AppError::EncryptionError(format!("Key derivation failed: {}", e)))?;

        let cipher = Aes256Gcm::new_from_slice(&*key)
            .map_err(|e| AppError::EncryptionError(format!("Failed to create cipher: {}", e)))?;

        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> AppResult<String> {
        // Generate random nonce
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| AppError::EncryptionError(format!("Encryption failed: {}", e)))?;

        let mut result = nonce_bytes.to_vec();
        result.extend(ciphertext);

        Ok(hex::encode(result))
    }

    pub fn decrypt(&self, encrypted_hex: &str) -> AppResult<Zeroizing<String>> {
        let data = hex::decode(encrypted_hex.trim())
            .map_err(|e| AppError::EncryptionError(format!("Hex decode failed: {}", e)))?;

        if data.len() <= NONCE_SIZE {
            return Err(AppError::EncryptionError(
                "Invalid encrypted data: too short".to_string(),
            ));
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = Zeroizing::new(
            self.cipher
                .decrypt(nonce, ciphertext)
                .map_err(|_| AppError::EncryptionError("Decryption failed".to_string()))?,
        );

        let text = std::str::from_utf8(&plaintext)
            .map_err(|e| AppError::EncryptionError(format!("UTF-8 decode failed: {}", e)))?;

        Ok(Zeroizing::new(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSPHRASE: &str = "correct horse battery staple";
    const SALT: &str = "btc-sign-salt";

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = KeyCipher::new(PASSPHRASE, SALT).unwrap();
        let data = "1e99423a4ed27608a15a2616a2b0e9e52ced330ac530edcc32c8ffc6a526aedd";

        let encrypted = cipher.encrypt(data).unwrap();
        let decrypted = cipher.decrypt(&encrypted).unwrap();

        assert_eq!(data, decrypted.as_str());
        assert!(hex::decode(&encrypted).is_ok());
    }

    #[test]
    fn test_different_encryptions() {
        let cipher = KeyCipher::new(PASSPHRASE, SALT).unwrap();
        let data = "test data";

        let encrypted1 = cipher.encrypt(data).unwrap();
        let encrypted2 = cipher.encrypt(data).unwrap();

        // Each encryption should produce different output due to random nonce
        assert_ne!(encrypted1, encrypted2);

        assert_eq!(cipher.decrypt(&encrypted1).unwrap().as_str(), data);
        assert_eq!(cipher.decrypt(&encrypted2).unwrap().as_str(), data);
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let cipher = KeyCipher::new(PASSPHRASE, SALT).unwrap();
        let other = KeyCipher::new("another passphrase", SALT).unwrap();

        let encrypted = cipher.encrypt("secret").unwrap();
        assert!(matches!(
            other.decrypt(&encrypted),
            Err(AppError::EncryptionError(_))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let cipher = KeyCipher::new(PASSPHRASE, SALT).unwrap();
        let mut bytes = hex::decode(cipher.encrypt("secret").unwrap()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;

        assert!(cipher.decrypt(&hex::encode(bytes)).is_err());
        assert!(cipher.decrypt("zz").is_err());
        assert!(cipher.decrypt(&hex::encode([0u8; NONCE_SIZE])).is_err());
    }

    #[test]
    fn test_short_salt_rejected() {
        assert!(KeyCipher::new(PASSPHRASE, "short").is_err());
    }
}
