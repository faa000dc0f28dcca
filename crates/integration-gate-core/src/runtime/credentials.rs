// crates/integration-gate-core/src/runtime/credentials.rs
// ============================================================================
// Module: Credential Codec
// Description: XChaCha20-Poly1305 sealing of connection credentials.
// Purpose: Keep credentials encrypted at rest and decrypt them per call.
// Dependencies: base64, chacha20poly1305, serde_json, crate::interfaces
// ============================================================================

//! ## Overview
//! Sealed credentials are `base64(nonce(24) || ciphertext || tag(16))` over a
//! JSON object of string fields. Nonces are random per seal. Decryption
//! failures never reveal which check failed beyond the error variant.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::Key;
use chacha20poly1305::XChaCha20Poly1305;
use chacha20poly1305::XNonce;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::aead::AeadCore;
use chacha20poly1305::aead::KeyInit;
use chacha20poly1305::aead::OsRng;
use serde_json::Value;

use crate::interfaces::CredentialCodec;
use crate::interfaces::CredentialError;
use crate::interfaces::Credentials;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Key length in bytes.
pub const KEY_SIZE: usize = 32;
/// Nonce length in bytes.
pub const NONCE_SIZE: usize = 24;
/// Authentication tag length in bytes.
pub const TAG_SIZE: usize = 16;

// ============================================================================
// SECTION: Encryption Key
// ============================================================================

/// 256-bit credential encryption key.
#[derive(Clone)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Creates a key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parses a base64-encoded key.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidKey`] unless the input decodes to 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, CredentialError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| CredentialError::InvalidKey("key is not valid base64".to_string()))?;
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            CredentialError::InvalidKey(format!("expected {KEY_SIZE} bytes, got {}", bytes.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Generates a random key.
    #[must_use]
    pub fn generate() -> Self {
        let generated = XChaCha20Poly1305::generate_key(&mut OsRng);
        let mut bytes = [0_u8; KEY_SIZE];
        bytes.copy_from_slice(&generated);
        Self(bytes)
    }

    /// Returns the key as base64.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Builds the cipher for this key.
    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(&self.0))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

// ============================================================================
// SECTION: Seal and Open
// ============================================================================

/// Encrypts credential fields into a base64 blob.
///
/// # Errors
///
/// Returns [`CredentialError`] when serialization or encryption fails.
pub fn seal_credentials(
    key: &EncryptionKey,
    credentials: &Credentials,
) -> Result<String, CredentialError> {
    let plaintext = serde_json::to_vec(credentials)
        .map_err(|err| CredentialError::InvalidPayload(err.to_string()))?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = key
        .cipher()
        .encrypt(&nonce, plaintext.as_slice())
        .map_err(|_| CredentialError::EncryptionFailed)?;
    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(sealed))
}

/// Decrypts a base64 blob into credential fields.
///
/// Scalar JSON values are accepted and rendered as strings.
///
/// # Errors
///
/// Returns [`CredentialError`] when the blob is malformed, tampered, or not an object.
pub fn open_credentials(key: &EncryptionKey, sealed: &str) -> Result<Credentials, CredentialError> {
    let bytes = STANDARD
        .decode(sealed.trim())
        .map_err(|_| CredentialError::Malformed("not valid base64".to_string()))?;
    if bytes.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CredentialError::Malformed("ciphertext too short".to_string()));
    }
    let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
    let plaintext = key
        .cipher()
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| CredentialError::DecryptionFailed)?;
    let value: Value = serde_json::from_slice(&plaintext)
        .map_err(|err| CredentialError::InvalidPayload(err.to_string()))?;
    let Value::Object(map) = value else {
        return Err(CredentialError::InvalidPayload("expected a json object".to_string()));
    };
    let mut fields = BTreeMap::new();
    for (name, value) in map {
        let rendered = match value {
            Value::String(text) => text,
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            Value::Null => continue,
            Value::Array(_) | Value::Object(_) => {
                return Err(CredentialError::InvalidPayload(format!(
                    "field {name} must be a scalar"
                )));
            }
        };
        fields.insert(name, rendered);
    }
    Ok(Credentials::new(fields))
}

// ============================================================================
// SECTION: Codec
// ============================================================================

/// Credential codec backed by a single XChaCha20-Poly1305 key.
#[derive(Debug, Clone)]
pub struct XChaChaCredentialCodec {
    /// Decryption key.
    key: EncryptionKey,
}

impl XChaChaCredentialCodec {
    /// Creates a codec for the given key.
    #[must_use]
    pub const fn new(key: EncryptionKey) -> Self {
        Self { key }
    }
}

impl CredentialCodec for XChaChaCredentialCodec {
    fn decrypt(&self, ciphertext: &str) -> Result<Credentials, CredentialError> {
        open_credentials(&self.key, ciphertext)
    }
}
