//! Sealed session codec — encrypts the session payload into one opaque
//! cookie-safe string.
//!
//! Envelope layout (before base64url): version byte ‖ 12-byte nonce ‖
//! AES-256-GCM ciphertext of `{"sealed_at": <unix secs>, "payload": ...}`.
//! AES-GCM is authenticated, so a tampered string never unseals.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::model::SessionPayload;

/// Current envelope version byte.
const SEAL_VERSION: u8 = 0x01;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// Unseal failure. Distinct from "no cookie present".
#[derive(Debug, Error)]
pub enum SealError {
    /// Bad base64, truncated blob, unknown version, or bad inner JSON.
    #[error("malformed sealed session: {0}")]
    Malformed(String),

    /// AEAD verification failed — the string was tampered with or sealed
    /// under a different key.
    #[error("sealed session failed integrity check")]
    Integrity,

    /// The envelope is older than the codec max age.
    #[error("sealed session expired")]
    Expired,

    /// Payload could not be serialized during sealing.
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    sealed_at: i64,
    payload: &'a SessionPayload,
}

#[derive(Deserialize)]
struct Envelope {
    sealed_at: i64,
    payload: SessionPayload,
}

/// Seals and unseals session payloads with AES-256-GCM.
///
/// The key is derived as SHA-256 of the configured secret, so operators
/// configure a passphrase rather than raw key bytes.
pub struct SealedSessionCodec {
    cipher: Aes256Gcm,
    max_age: Duration,
}

impl SealedSessionCodec {
    pub fn new(secret: &str, max_age_days: i64) -> Self {
        let derived_key: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        let key = Key::<Aes256Gcm>::from(derived_key);
        Self {
            cipher: Aes256Gcm::new(&key),
            max_age: Duration::days(max_age_days),
        }
    }

    /// Seal a payload into an opaque cookie-safe string.
    pub fn seal(&self, payload: &SessionPayload) -> Result<String, SealError> {
        let envelope = EnvelopeRef {
            sealed_at: Utc::now().timestamp(),
            payload,
        };
        let plain = serde_json::to_vec(&envelope)
            .map_err(|e| SealError::Serialization(e.to_string()))?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let nonce_ga = GenericArray::from_slice(&nonce);

        let ciphertext = self
            .cipher
            .encrypt(nonce_ga, plain.as_ref())
            .map_err(|_| SealError::Integrity)?;

        let mut blob = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        blob.push(SEAL_VERSION);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(blob))
    }

    /// Unseal an opaque string back into a payload.
    ///
    /// Fails with [`SealError::Malformed`] on garbage input,
    /// [`SealError::Integrity`] on tampering or a key mismatch, and
    /// [`SealError::Expired`] past the codec max age.
    pub fn unseal(&self, sealed: &str) -> Result<SessionPayload, SealError> {
        let blob = URL_SAFE_NO_PAD
            .decode(sealed)
            .map_err(|e| SealError::Malformed(format!("bad base64: {e}")))?;

        if blob.len() < 1 + NONCE_LEN + TAG_LEN {
            return Err(SealError::Malformed("truncated".into()));
        }
        if blob[0] != SEAL_VERSION {
            return Err(SealError::Malformed(format!("unknown version {:#04x}", blob[0])));
        }

        let nonce = GenericArray::from_slice(&blob[1..1 + NONCE_LEN]);
        let plain = self
            .cipher
            .decrypt(nonce, &blob[1 + NONCE_LEN..])
            .map_err(|_| SealError::Integrity)?;

        let envelope: Envelope = serde_json::from_slice(&plain)
            .map_err(|e| SealError::Malformed(format!("bad envelope: {e}")))?;

        let sealed_at = DateTime::from_timestamp(envelope.sealed_at, 0)
            .ok_or_else(|| SealError::Malformed("bad sealed_at".into()))?;
        if Utc::now() - sealed_at > self.max_age {
            return Err(SealError::Expired);
        }

        Ok(envelope.payload)
    }
}
