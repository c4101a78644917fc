//! Opaque id encoding.
//!
//! Database rows use sequential integer keys. Everything that leaves the
//! service (JSON bodies, URLs) carries an encoded form instead.
//!
//! An id is written as one 8-byte big-endian block, encrypted with Blowfish
//! and rendered as 16 lowercase hex digits. The Blowfish key is the first
//! 56 bytes of the SHA-512 digest of `ID_SECRET`.
//!
//! # Example
//!
//! ```
//! use flowhub::security::IdEncoder;
//!
//! let encoder = IdEncoder::new("changethisinproduction");
//! let encoded = encoder.encode(42);
//! assert_eq!(encoded.len(), 16);
//! assert_eq!(encoder.decode(&encoded).unwrap(), 42);
//! assert!(encoder.decode("not-an-id").is_err());
//! ```

use std::sync::Arc;

use blowfish::cipher::{Block, BlockDecrypt, BlockEncrypt, Key, KeyInit};
use blowfish::Blowfish;
use sha2::{Digest, Sha512};

use crate::error::ApiError;

/// Longest key Blowfish accepts.
const KEY_LEN: usize = 56;

/// Encodes and decodes database ids.
#[derive(Clone)]
pub struct IdEncoder {
    cipher: Arc<Blowfish>,
}

impl IdEncoder {
    /// Create an encoder keyed by `secret`.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let digest = Sha512::digest(secret.as_bytes());
        let key = Key::<Blowfish>::from_slice(&digest[..KEY_LEN]);
        Self {
            cipher: Arc::new(Blowfish::new(key)),
        }
    }

    /// Encode a database id.
    #[must_use]
    pub fn encode(&self, id: i64) -> String {
        let mut block = Block::<Blowfish>::from(id.to_be_bytes());
        self.cipher.encrypt_block(&mut block);
        block.iter().map(|byte| format!("{byte:02x}")).collect()
    }

    /// Decode an encoded id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MalformedId`] if `encoded` is not 16 hex digits or
    /// does not decode to a positive id.
    pub fn decode(&self, encoded: &str) -> Result<i64, ApiError> {
        let malformed = || ApiError::MalformedId {
            id: encoded.to_string(),
        };
        if encoded.len() != 16 {
            return Err(malformed());
        }
        let raw = u64::from_str_radix(encoded, 16).map_err(|_| malformed())?;

        let mut block = Block::<Blowfish>::from(raw.to_be_bytes());
        self.cipher.decrypt_block(&mut block);
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&block);

        let id = i64::from_be_bytes(bytes);
        if id <= 0 {
            return Err(malformed());
        }
        Ok(id)
    }
}

impl std::fmt::Debug for IdEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdEncoder").finish_non_exhaustive()
    }
}
