//! Fuschia Encryption
//!
//! Encrypts secret values with AES-256-GCM. The key is the raw bytes of the
//! configured secret and must be exactly 32 bytes long.
//!
//! Ciphertexts are base64 encoded, with the 12-byte nonce prepended to the
//! sealed payload, so a value can be stored as a plain string.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Required key length in bytes.
pub const KEY_LENGTH: usize = 32;

const NONCE_LENGTH: usize = 12;

/// Errors raised while encrypting or decrypting.
#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
  #[error("invalid key length: expected {KEY_LENGTH} bytes, got {actual}")]
  InvalidKeyLength { actual: usize },

  #[error("encryption failed")]
  Encrypt,

  #[error("decryption failed")]
  Decrypt,

  #[error("ciphertext is too short")]
  Truncated,

  #[error("ciphertext is not valid base64: {0}")]
  Encoding(#[from] base64::DecodeError),

  #[error("decrypted value is not valid utf-8")]
  Utf8(#[from] std::string::FromUtf8Error),
}

fn cipher(key: &str) -> Result<Aes256Gcm, EncryptionError> {
  if key.len() != KEY_LENGTH {
    return Err(EncryptionError::InvalidKeyLength { actual: key.len() });
  }
  Aes256Gcm::new_from_slice(key.as_bytes())
    .map_err(|_| EncryptionError::InvalidKeyLength { actual: key.len() })
}

/// Encrypt `plaintext` with `key`.
pub fn encrypt(key: &str, plaintext: &str) -> Result<String, EncryptionError> {
  let cipher = cipher(key)?;
  let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
  let sealed = cipher
    .encrypt(&nonce, plaintext.as_bytes())
    .map_err(|_| EncryptionError::Encrypt)?;

  let mut payload = nonce.to_vec();
  payload.extend_from_slice(&sealed);
  Ok(STANDARD.encode(payload))
}

/// Decrypt a value produced by [`encrypt`].
pub fn decrypt(key: &str, ciphertext: &str) -> Result<String, EncryptionError> {
  let cipher = cipher(key)?;
  let payload = STANDARD.decode(ciphertext)?;
  if payload.len() < NONCE_LENGTH {
    return Err(EncryptionError::Truncated);
  }

  let (nonce, sealed) = payload.split_at(NONCE_LENGTH);
  let plain = cipher
    .decrypt(Nonce::from_slice(nonce), sealed)
    .map_err(|_| EncryptionError::Decrypt)?;
  Ok(String::from_utf8(plain)?)
}

#[cfg(test)]
mod tests {
  use super::*;

  const KEY: &str = "I6EGNzRESu3X3pKZidrqCGOHQFUFC0yK";

  #[test]
  fn test_encrypt_then_decrypt() {
    let encrypted = encrypt(KEY, "my secret").unwrap();

    assert_ne!(encrypted, "my secret");
    assert_eq!(decrypt(KEY, &encrypted).unwrap(), "my secret");
  }

  #[test]
  fn test_nonce_differs_per_call() {
    assert_ne!(encrypt(KEY, "value").unwrap(), encrypt(KEY, "value").unwrap());
  }

  #[test]
  fn test_rejects_short_key() {
    assert!(matches!(
      encrypt("too-short", "value"),
      Err(EncryptionError::InvalidKeyLength { actual: 9 })
    ));
  }

  #[test]
  fn test_wrong_key_fails_to_decrypt() {
    let encrypted = encrypt(KEY, "value").unwrap();
    let other = "0123456789abcdef0123456789abcdef";

    assert!(matches!(
      decrypt(other, &encrypted),
      Err(EncryptionError::Decrypt)
    ));
  }

  #[test]
  fn test_malformed_ciphertext() {
    assert!(matches!(
      decrypt(KEY, "not base64!"),
      Err(EncryptionError::Encoding(_))
    ));
    assert!(matches!(
      decrypt(KEY, "AAAA"),
      Err(EncryptionError::Truncated)
    ));
  }
}
