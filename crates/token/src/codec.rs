//! Authenticated-encryption codec for token strings.
//!
//! A token is `base64url(nonce || ciphertext)` where the ciphertext is
//! the XChaCha20-Poly1305 sealing of the serialized claims. A fresh
//! random nonce is drawn per call, so encrypting the same claims twice
//! yields different token strings.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use vaultbank_common::TOKEN_KEY_SIZE;

use crate::error::TokenError;

/// XChaCha20 nonce size in bytes.
const NONCE_SIZE: usize = 24;

/// Symmetric codec turning claims bytes into opaque token strings.
#[derive(Clone)]
pub struct TokenCodec {
    cipher: XChaCha20Poly1305,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The key must never reach logs.
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Create a codec from a 32-byte symmetric key.
    ///
    /// # Errors
    /// Returns [`TokenError::InvalidKeyLength`] for any other key size.
    pub fn new(key: &[u8]) -> Result<Self, TokenError> {
        if key.len() != TOKEN_KEY_SIZE {
            return Err(TokenError::InvalidKeyLength {
                expected: TOKEN_KEY_SIZE,
                got: key.len(),
            });
        }

        let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| {
            TokenError::InvalidKeyLength {
                expected: TOKEN_KEY_SIZE,
                got: key.len(),
            }
        })?;

        Ok(Self { cipher })
    }

    /// Seal `plaintext` under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, TokenError> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| TokenError::Malformed)?;

        let mut raw = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        raw.extend_from_slice(nonce.as_slice());
        raw.extend_from_slice(&ciphertext);

        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    /// Open a token string back into claims bytes.
    ///
    /// # Errors
    /// [`TokenError::Malformed`] if the text is not valid base64 or is
    /// too short to carry a nonce and tag; [`TokenError::Integrity`] if
    /// the authentication tag does not verify (tampering or wrong key).
    pub fn decrypt(&self, token: &str) -> Result<Vec<u8>, TokenError> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| TokenError::Malformed)?;

        if raw.len() <= NONCE_SIZE {
            return Err(TokenError::Malformed);
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| TokenError::Integrity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> Vec<u8> {
        (0..32u8).collect()
    }

    #[test]
    fn round_trip() {
        let codec = TokenCodec::new(&test_key()).unwrap();
        let token = codec.encrypt(b"hello world").unwrap();
        assert_eq!(codec.decrypt(&token).unwrap(), b"hello world");
    }

    #[test]
    fn fresh_nonce_per_call() {
        let codec = TokenCodec::new(&test_key()).unwrap();
        let a = codec.encrypt(b"same claims").unwrap();
        let b = codec.encrypt(b"same claims").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_length_rejected() {
        assert_eq!(
            TokenCodec::new(&[0u8; 16]).unwrap_err(),
            TokenError::InvalidKeyLength {
                expected: 32,
                got: 16
            }
        );
        assert!(TokenCodec::new(&[0u8; 33]).is_err());
    }

    #[test]
    fn wrong_key_fails_integrity() {
        let codec = TokenCodec::new(&test_key()).unwrap();
        let other = TokenCodec::new(&[7u8; 32]).unwrap();
        let token = codec.encrypt(b"claims").unwrap();
        assert_eq!(other.decrypt(&token).unwrap_err(), TokenError::Integrity);
    }

    #[test]
    fn every_single_byte_flip_is_rejected() {
        let codec = TokenCodec::new(&test_key()).unwrap();
        let token = codec.encrypt(b"claims").unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(&token).unwrap();

        for i in 0..raw.len() {
            raw[i] ^= 0x01;
            let tampered = URL_SAFE_NO_PAD.encode(&raw);
            let err = codec.decrypt(&tampered).unwrap_err();
            assert!(
                matches!(err, TokenError::Integrity | TokenError::Malformed),
                "byte {i} flip slipped through"
            );
            raw[i] ^= 0x01;
        }
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = TokenCodec::new(&test_key()).unwrap();
        assert_eq!(
            codec.decrypt("not!!valid//base64==").unwrap_err(),
            TokenError::Malformed
        );
        // Valid base64 but shorter than a nonce.
        assert_eq!(
            codec.decrypt(&URL_SAFE_NO_PAD.encode([1u8; 8])).unwrap_err(),
            TokenError::Malformed
        );
    }
}
