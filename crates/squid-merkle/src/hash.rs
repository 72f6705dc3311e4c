//! Hash primitives shared by the static and dynamic trees.
//!
//! The static tree hashes with BLAKE2b-256, the dynamic engine with SHA-256.
//! Both combine a pair as `H(left || right)` with no domain prefix, so a
//! root can be recomputed by any party holding the leaf hashes.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

use crate::error::{MerkleError, MerkleResult};
use crate::HASH_LENGTH;

type Blake2b256 = Blake2b<U32>;

/// A 32-byte digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct HashValue([u8; HASH_LENGTH]);

impl HashValue {
    pub const fn new(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    pub const fn zero() -> Self {
        Self([0u8; HASH_LENGTH])
    }

    pub fn from_slice(bytes: &[u8]) -> MerkleResult<Self> {
        if bytes.len() != HASH_LENGTH {
            return Err(MerkleError::InvalidHashLength {
                expected: HASH_LENGTH,
                got: bytes.len(),
            });
        }
        let mut out = [0u8; HASH_LENGTH];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn from_hex(s: &str) -> MerkleResult<Self> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(|_| {
            MerkleError::InvalidHashLength {
                expected: HASH_LENGTH,
                got: 0,
            }
        })?;
        Self::from_slice(&bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LENGTH]
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for HashValue {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; HASH_LENGTH]> for HashValue {
    fn from(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashValue({})", &self.to_hex()[..16])
    }
}

/// BLAKE2b-256 over the concatenation of `parts`.
pub fn blake2b_256(parts: &[&[u8]]) -> HashValue {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    HashValue(hasher.finalize().into())
}

/// SHA-256 over the concatenation of `parts`.
pub fn sha256(parts: &[&[u8]]) -> HashValue {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    HashValue(hasher.finalize().into())
}

/// Pair combiner used by the dynamic engine.
pub fn sha256_pair(left: &HashValue, right: &HashValue) -> HashValue {
    sha256(&[left.as_ref(), right.as_ref()])
}
