//! Static binary Merkle tree over a derived leaf set.
//!
//! Leaves are hashed with BLAKE2b-256 and adjacent pairs are combined level
//! by level until one root remains. An unpaired last node is duplicated.
//!
//! # Features
//!
//! - O(log n) proof generation and verification
//! - Optional [`HashMixer`] blended into leaf and pair hashing
//! - Verification reports a mismatch as `false`, never as an error
//!
//! # Example
//!
//! ```
//! use squid_merkle::binary::BinaryMerkleTree;
//!
//! let leaves = vec![b"leaf0".to_vec(), b"leaf1".to_vec(), b"leaf2".to_vec()];
//! let tree = BinaryMerkleTree::build(&leaves).unwrap();
//!
//! let proof = tree.get_proof(2).unwrap();
//! assert!(tree.verify_proof(&proof, &leaves[2]));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::{MerkleError, MerkleResult};
use crate::hash::{blake2b_256, HashValue};
use crate::levels::{build_levels, fold_proof, proof_steps, ProofStep};
use crate::mixer::HashMixer;

/// Leaf and pair hashing, optionally perturbed by a mixer.
#[derive(Clone, Default)]
pub struct TreeHasher {
    mixer: Option<Arc<dyn HashMixer>>,
}

impl TreeHasher {
    pub fn plain() -> Self {
        Self { mixer: None }
    }

    pub fn with_mixer(mixer: Arc<dyn HashMixer>) -> Self {
        Self { mixer: Some(mixer) }
    }

    pub fn is_mixed(&self) -> bool {
        self.mixer.is_some()
    }

    /// `H(leaf)` or `H(leaf || mix(leaf))`.
    pub fn hash_leaf(&self, leaf: &[u8]) -> HashValue {
        match &self.mixer {
            None => blake2b_256(&[leaf]),
            Some(mixer) => {
                let mixed = mixer.mix(leaf, mixer.seed());
                blake2b_256(&[leaf, &mixed])
            }
        }
    }

    /// `H(left || right)` or `H(mix(left) || mix(right))`.
    pub fn hash_pair(&self, left: &HashValue, right: &HashValue) -> HashValue {
        match &self.mixer {
            None => blake2b_256(&[left.as_ref(), right.as_ref()]),
            Some(mixer) => {
                let seed = mixer.seed();
                let left = mixer.mix(left.as_ref(), seed);
                let right = mixer.mix(right.as_ref(), seed);
                blake2b_256(&[&left, &right])
            }
        }
    }
}

impl fmt::Debug for TreeHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeHasher")
            .field("mixed", &self.is_mixed())
            .finish()
    }
}

/// Inclusion proof for one leaf.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryMerkleProof {
    leaf_index: usize,
    steps: Vec<ProofStep>,
    expected_root: HashValue,
}

impl BinaryMerkleProof {
    pub fn new(leaf_index: usize, steps: Vec<ProofStep>, expected_root: HashValue) -> Self {
        Self {
            leaf_index,
            steps,
            expected_root,
        }
    }

    pub fn leaf_index(&self) -> usize {
        self.leaf_index
    }

    /// Number of levels between leaf and root.
    pub fn depth(&self) -> usize {
        self.steps.len()
    }

    pub fn steps(&self) -> &[ProofStep] {
        &self.steps
    }

    pub fn expected_root(&self) -> &HashValue {
        &self.expected_root
    }

    /// Recompute the root this proof implies for `leaf`.
    pub fn compute_root(&self, leaf: &[u8], hasher: &TreeHasher) -> HashValue {
        fold_proof(hasher.hash_leaf(leaf), &self.steps, |l, r| hasher.hash_pair(l, r))
    }

    /// Verify `leaf` against the embedded root with plain hashing.
    pub fn verify(&self, leaf: &[u8]) -> bool {
        self.verify_with(leaf, &TreeHasher::plain())
    }

    pub fn verify_with(&self, leaf: &[u8], hasher: &TreeHasher) -> bool {
        self.compute_root(leaf, hasher) == self.expected_root
    }
}

/// A binary Merkle tree for ordered leaf commitments.
///
/// Levels are stored explicitly, leaf hashes first.
#[derive(Clone, Debug)]
pub struct BinaryMerkleTree {
    levels: Vec<Vec<HashValue>>,
    hasher: TreeHasher,
}

impl BinaryMerkleTree {
    /// Build a tree with plain BLAKE2b-256 hashing.
    pub fn build<T: AsRef<[u8]>>(leaves: &[T]) -> MerkleResult<Self> {
        Self::build_with(leaves, TreeHasher::plain())
    }

    /// Build a tree whose hashing is blended with `mixer`.
    pub fn build_mixed<T: AsRef<[u8]>>(
        leaves: &[T],
        mixer: Arc<dyn HashMixer>,
    ) -> MerkleResult<Self> {
        Self::build_with(leaves, TreeHasher::with_mixer(mixer))
    }

    pub fn build_with<T: AsRef<[u8]>>(leaves: &[T], hasher: TreeHasher) -> MerkleResult<Self> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyInput);
        }

        let leaf_hashes: Vec<HashValue> = leaves
            .iter()
            .map(|leaf| hasher.hash_leaf(leaf.as_ref()))
            .collect();
        let levels = build_levels(leaf_hashes, |l, r| hasher.hash_pair(l, r));

        tracing::trace!(
            leaves = leaves.len(),
            depth = levels.len() - 1,
            mixed = hasher.is_mixed(),
            "Built static merkle tree"
        );

        Ok(Self { levels, hasher })
    }

    /// Get the root hash of the tree.
    pub fn root(&self) -> HashValue {
        // build_with rejects empty input, so the top level always exists
        self.levels[self.levels.len() - 1][0]
    }

    pub fn num_leaves(&self) -> usize {
        self.levels[0].len()
    }

    /// Number of levels from leaf to root.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn levels(&self) -> &[Vec<HashValue>] {
        &self.levels
    }

    pub fn hasher(&self) -> &TreeHasher {
        &self.hasher
    }

    /// Get a proof of inclusion for the leaf at the given index.
    pub fn get_proof(&self, leaf_index: usize) -> MerkleResult<BinaryMerkleProof> {
        if leaf_index >= self.num_leaves() {
            return Err(MerkleError::InvalidIndex {
                index: leaf_index,
                size: self.num_leaves(),
            });
        }

        let steps = proof_steps(&self.levels, leaf_index);
        Ok(BinaryMerkleProof::new(leaf_index, steps, self.root()))
    }

    /// Verify `leaf` against this tree's root, with this tree's hasher.
    ///
    /// A proof carrying any other root is rejected, whatever it folds to.
    pub fn verify_proof(&self, proof: &BinaryMerkleProof, leaf: &[u8]) -> bool {
        proof.expected_root() == &self.root() && proof.verify_with(leaf, &self.hasher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::HostHashMixer;

    fn leaves(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| format!("leaf{}", i).into_bytes()).collect()
    }

    #[test]
    fn test_empty_tree() {
        let result = BinaryMerkleTree::build::<Vec<u8>>(&[]);
        assert!(matches!(result, Err(MerkleError::EmptyInput)));
    }

    #[test]
    fn test_single_leaf() {
        let leaves = vec![b"only leaf".to_vec()];
        let tree = BinaryMerkleTree::build(&leaves).unwrap();

        assert_eq!(tree.num_leaves(), 1);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.root(), blake2b_256(&[b"only leaf"]));

        let proof = tree.get_proof(0).unwrap();
        assert_eq!(proof.depth(), 0);
        assert!(tree.verify_proof(&proof, &leaves[0]));
    }

    #[test]
    fn test_two_leaves_root() {
        let leaves = leaves(2);
        let tree = BinaryMerkleTree::build(&leaves).unwrap();
        let l = blake2b_256(&[&leaves[0]]);
        let r = blake2b_256(&[&leaves[1]]);
        assert_eq!(tree.root(), blake2b_256(&[l.as_ref(), r.as_ref()]));
    }

    #[test]
    fn test_all_proofs_verify() {
        for n in 1..=20 {
            let leaves = leaves(n);
            let tree = BinaryMerkleTree::build(&leaves).unwrap();
            for (i, leaf) in leaves.iter().enumerate() {
                let proof = tree.get_proof(i).unwrap();
                assert!(proof.verify(leaf), "Proof failed for leaf {} of {}", i, n);
            }
        }
    }

    #[test]
    fn test_odd_last_leaf_proof_uses_itself() {
        let leaves = leaves(5);
        let tree = BinaryMerkleTree::build(&leaves).unwrap();
        let proof = tree.get_proof(4).unwrap();

        let first = proof.steps()[0];
        assert!(first.sibling_is_right);
        assert_eq!(first.sibling, blake2b_256(&[&leaves[4]]));
        assert!(proof.verify(&leaves[4]));
    }

    #[test]
    fn test_proof_for_invalid_index() {
        let tree = BinaryMerkleTree::build(&leaves(2)).unwrap();
        let result = tree.get_proof(5);
        assert!(matches!(
            result,
            Err(MerkleError::InvalidIndex { index: 5, size: 2 })
        ));
    }

    #[test]
    fn test_corrupted_leaf_fails() {
        let leaves = leaves(7);
        let tree = BinaryMerkleTree::build(&leaves).unwrap();

        for (i, leaf) in leaves.iter().enumerate() {
            let proof = tree.get_proof(i).unwrap();
            for byte in 0..leaf.len() {
                let mut corrupted = leaf.clone();
                corrupted[byte] ^= 0x01;
                assert!(!proof.verify(&corrupted), "leaf {} byte {}", i, byte);
            }
        }
    }

    #[test]
    fn test_wrong_root_fails() {
        let leaves = leaves(4);
        let tree = BinaryMerkleTree::build(&leaves).unwrap();
        let other = BinaryMerkleTree::build(&[b"x".to_vec(), b"y".to_vec()]).unwrap();

        let proof = tree.get_proof(1).unwrap();
        let forged = BinaryMerkleProof::new(1, proof.steps().to_vec(), other.root());
        assert!(!forged.verify(&leaves[1]));
    }

    #[test]
    fn test_tree_rejects_proof_for_another_root() {
        let leaves = leaves(3);
        let tree = BinaryMerkleTree::build(&leaves).unwrap();

        // Zero steps folds to the leaf hash itself, so this proof is self-consistent
        let outsider = b"not in the tree";
        let forged = BinaryMerkleProof::new(0, vec![], tree.hasher().hash_leaf(outsider));
        assert!(forged.verify(outsider));
        assert!(!tree.verify_proof(&forged, outsider));

        let other = BinaryMerkleTree::build(&[b"x".to_vec(), b"y".to_vec()]).unwrap();
        let foreign = other.get_proof(0).unwrap();
        assert!(!tree.verify_proof(&foreign, b"x"));

        let genuine = tree.get_proof(1).unwrap();
        assert!(tree.verify_proof(&genuine, &leaves[1]));
        assert!(!tree.verify_proof(&genuine, &leaves[2]));
    }

    #[test]
    fn test_proof_serde_keeps_verifying() {
        let leaves = leaves(5);
        let tree = BinaryMerkleTree::build(&leaves).unwrap();
        let proof = tree.get_proof(4).unwrap();

        let json = serde_json::to_string(&proof).unwrap();
        let back: BinaryMerkleProof = serde_json::from_str(&json).unwrap();
        assert_eq!(back, proof);
        assert!(tree.verify_proof(&back, &leaves[4]));
    }

    #[test]
    fn test_deterministic() {
        let leaves = vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()];
        let tree1 = BinaryMerkleTree::build(&leaves).unwrap();
        let tree2 = BinaryMerkleTree::build(&leaves).unwrap();

        assert_eq!(tree1.root(), tree2.root());
    }

    #[test]
    fn test_mixed_tree() {
        let leaves = leaves(6);
        let mixer: Arc<dyn HashMixer> = Arc::new(HostHashMixer::with_descriptor("test-host"));
        let plain = BinaryMerkleTree::build(&leaves).unwrap();
        let mixed = BinaryMerkleTree::build_mixed(&leaves, mixer.clone()).unwrap();
        let again = BinaryMerkleTree::build_mixed(&leaves, mixer).unwrap();

        assert_ne!(plain.root(), mixed.root());
        assert_eq!(mixed.root(), again.root());

        let proof = mixed.get_proof(3).unwrap();
        assert!(mixed.verify_proof(&proof, &leaves[3]));
        // Plain hashing cannot reproduce a mixed root
        assert!(!proof.verify(&leaves[3]));
    }
}
