//! Authenticated symmetric encryption of VM values.
//!
//! Construction: XSalsa20-Poly1305 (NaCl `secretbox`), 256-bit key,
//! 192-bit random nonce, 128-bit tag. The envelope is
//! `nonce(24) ‖ tag(16) ‖ ciphertext(n)`, base64 encoded as a whole.

use crate::codec::{self, Base64Error};
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::XSalsa20Poly1305;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use thiserror::Error;

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 24;
pub const MAC_SIZE: usize = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(EnvelopeFault),
    #[error("authentication failure")]
    AuthenticationFailure,
    #[error("entropy source unavailable")]
    Entropy,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeFault {
    #[error("{0}")]
    Base64(#[from] Base64Error),
    #[error("{len} bytes is shorter than nonce + tag ({min})")]
    TooShort { len: usize, min: usize },
}

pub type Result<T> = std::result::Result<T, CryptoError>;

type Nonce = crypto_secretbox::aead::Nonce<XSalsa20Poly1305>;

fn cipher_for(key: &[u8]) -> Result<XSalsa20Poly1305> {
    if key.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: key.len(),
        });
    }
    XSalsa20Poly1305::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
        expected: KEY_SIZE,
        actual: key.len(),
    })
}

/// Seal `plaintext` under `key` with a fresh OS-random nonce and return the
/// base64 envelope text.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<String> {
    let cipher = cipher_for(key)?;

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|_| CryptoError::Entropy)?;

    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::AuthenticationFailure)?;

    let mut envelope = Vec::with_capacity(NONCE_SIZE + sealed.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&sealed);
    Ok(codec::encode(&envelope))
}

/// Open a base64 envelope produced by [`encrypt`].
pub fn decrypt(envelope_text: &str, key: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;

    let envelope = codec::decode(envelope_text)
        .map_err(|e| CryptoError::MalformedEnvelope(EnvelopeFault::Base64(e)))?;
    let min = NONCE_SIZE + MAC_SIZE;
    if envelope.len() < min {
        return Err(CryptoError::MalformedEnvelope(EnvelopeFault::TooShort {
            len: envelope.len(),
            min,
        }));
    }

    let (nonce, sealed) = envelope.split_at(NONCE_SIZE);
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| CryptoError::AuthenticationFailure)
}

/// Cheap structural check: does `text` decode to something long enough to
/// be an envelope? Says nothing about the key.
pub fn looks_like_envelope(text: &str) -> bool {
    codec::decode(text)
        .map(|b| b.len() >= NONCE_SIZE + MAC_SIZE)
        .unwrap_or(false)
}

// ── Keys ─────────────────────────────────────────────────────────

/// A 256-bit symmetric key. `Debug` never prints the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey([u8; KEY_SIZE]);

impl SecretKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Parse 64 hex characters.
    pub fn from_hex(text: &str) -> Result<Self> {
        let bytes = hex::decode(text.trim()).map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: text.trim().len() / 2,
        })?;
        Self::from_slice(&bytes)
    }

    /// Parse standard base64 of exactly 32 bytes.
    pub fn from_base64(text: &str) -> Result<Self> {
        let bytes = codec::decode(text)
            .map_err(|e| CryptoError::MalformedEnvelope(EnvelopeFault::Base64(e)))?;
        Self::from_slice(&bytes)
    }

    /// Fresh key from the OS RNG.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|_| CryptoError::Entropy)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn id(&self) -> KeyId {
        KeyId::of(&self.0)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretKey").field(&self.id()).finish()
    }
}

/// Loggable key fingerprint: `b3:` + first 16 hex chars of BLAKE3(key).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct KeyId(String);

impl KeyId {
    pub fn of(key: &[u8]) -> Self {
        let hash = blake3::hash(key);
        Self(format!("b3:{}", &hex::encode(hash.as_bytes())[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
