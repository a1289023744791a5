//! Content addressing for fiscal artifacts.
//!
//! Every stored document is keyed by the SHA-256 of its bytes. Two documents
//! with identical bytes share a hash; a mismatch between stored and
//! recomputed hash is evidence of corruption.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::CoreError;

/// A 32-byte SHA-256 content hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Compute the SHA-256 hash of the given bytes.
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full 64-character lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidHash(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(CoreError::InvalidHash(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Truncated 12-character prefix for logs and audit records.
    ///
    /// Audit trails must never carry document content; the prefix is enough
    /// for traceability.
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }

    /// The zero hash (sentinel).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256({})", self.short())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}

impl AsRef<[u8]> for ContentHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for ContentHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_deterministic() {
        let h1 = ContentHash::digest(b"factura.xml");
        let h2 = ContentHash::digest(b"factura.xml");
        assert_eq!(h1, h2);

        let h3 = ContentHash::digest(b"factura-v2.xml");
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_hex_roundtrip() {
        let hash = ContentHash::digest(b"payload");
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(ContentHash::from_hex(&hex).unwrap(), hash);
    }

    #[test]
    fn test_from_hex_rejects_bad_length() {
        assert!(ContentHash::from_hex("abcd").is_err());
        assert!(ContentHash::from_hex("zz").is_err());
    }

    #[test]
    fn test_short_prefix() {
        let hash = ContentHash::digest(b"x");
        assert_eq!(hash.short().len(), 12);
        assert!(hash.to_hex().starts_with(&hash.short()));
    }

    #[test]
    fn test_known_vector() {
        // SHA-256 of the empty string.
        let hash = ContentHash::digest(b"");
        assert_eq!(
            hash.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn hex_roundtrip_any(bytes in proptest::array::uniform32(any::<u8>())) {
                let hash = ContentHash::from_bytes(bytes);
                prop_assert_eq!(ContentHash::from_hex(&hash.to_hex()).unwrap(), hash);
            }

            #[test]
            fn digest_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..256)) {
                prop_assert_eq!(ContentHash::digest(&data), ContentHash::digest(&data));
            }
        }
    }
}
