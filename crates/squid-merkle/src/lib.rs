//! # squid-merkle
//!
//! Merkle tree primitives for SQUID.
//!
//! - [`binary::BinaryMerkleTree`]: the static tree anchoring a derived leaf set
//!   (BLAKE2b-256, optional [`mixer::HashMixer`]).
//! - [`levels`]: pairwise level hashing shared with the dynamic engine, which
//!   combines SHA-256 leaf hashes via [`hash::sha256_pair`].
//!
//! ## Odd nodes
//!
//! An unpaired node at the end of a level is hashed with itself. Proofs and
//! roots from every party depend on this, so it is fixed.

pub mod binary;
pub mod error;
pub mod hash;
pub mod levels;
pub mod mixer;

pub use binary::{BinaryMerkleProof, BinaryMerkleTree, TreeHasher};
pub use error::{MerkleError, MerkleResult};
pub use hash::{blake2b_256, sha256, sha256_pair, HashValue};
pub use levels::{build_levels, compute_root, fold_proof, proof_steps, ProofStep};
pub use mixer::{HashMixer, HostHashMixer};

/// The length of hash digests used in merkle trees (32 bytes = 256 bits)
pub const HASH_LENGTH: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_and_dynamic_hashing_differ() {
        let leaves: Vec<Vec<u8>> = vec![b"leaf0".to_vec(), b"leaf1".to_vec()];

        let tree = BinaryMerkleTree::build(&leaves).unwrap();
        let sha_leaves: Vec<HashValue> = leaves.iter().map(|l| sha256(&[l])).collect();
        let dynamic_root = compute_root(&sha_leaves, sha256_pair).unwrap();

        assert_ne!(tree.root(), dynamic_root);
    }
}
