//! Level-by-level pairwise hashing.
//!
//! Level `k+1` holds `ceil(len(level k) / 2)` entries. An unpaired last node
//! is combined with itself rather than promoted or padded with an empty
//! hash; proofs for it carry its own hash as the right sibling. Changing this
//! breaks every previously issued proof and root.

use serde::{Deserialize, Serialize};

use crate::hash::HashValue;

/// One step of an inclusion proof.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: HashValue,
    /// `true` when the sibling sits to the right of the running hash.
    pub sibling_is_right: bool,
}

/// All levels, leaf hashes first, root level last. Empty input yields no levels.
pub fn build_levels<F>(leaf_hashes: Vec<HashValue>, combine: F) -> Vec<Vec<HashValue>>
where
    F: Fn(&HashValue, &HashValue) -> HashValue,
{
    if leaf_hashes.is_empty() {
        return Vec::new();
    }

    let mut levels = vec![leaf_hashes];
    loop {
        let current = &levels[levels.len() - 1];
        if current.len() <= 1 {
            break;
        }
        let next = next_level(current, &combine);
        levels.push(next);
    }
    levels
}

/// Root over `leaf_hashes` without keeping intermediate levels.
pub fn compute_root<F>(leaf_hashes: &[HashValue], combine: F) -> Option<HashValue>
where
    F: Fn(&HashValue, &HashValue) -> HashValue,
{
    if leaf_hashes.is_empty() {
        return None;
    }

    let mut level = leaf_hashes.to_vec();
    while level.len() > 1 {
        level = next_level(&level, &combine);
    }
    level.first().copied()
}

fn next_level<F>(level: &[HashValue], combine: &F) -> Vec<HashValue>
where
    F: Fn(&HashValue, &HashValue) -> HashValue,
{
    level
        .chunks(2)
        .map(|pair| {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            combine(left, right)
        })
        .collect()
}

/// Sibling path for `index`. Caller guarantees `index < levels[0].len()`.
pub fn proof_steps(levels: &[Vec<HashValue>], index: usize) -> Vec<ProofStep> {
    let mut steps = Vec::with_capacity(levels.len().saturating_sub(1));
    let mut position = index;

    for level in levels.iter().take(levels.len().saturating_sub(1)) {
        let step = if position % 2 == 0 {
            // Unpaired last node is its own sibling
            let sibling = level.get(position + 1).unwrap_or(&level[position]);
            ProofStep {
                sibling: *sibling,
                sibling_is_right: true,
            }
        } else {
            ProofStep {
                sibling: level[position - 1],
                sibling_is_right: false,
            }
        };
        steps.push(step);
        position /= 2;
    }

    steps
}

/// Replay `steps` from `leaf_hash` up to a root.
pub fn fold_proof<F>(leaf_hash: HashValue, steps: &[ProofStep], combine: F) -> HashValue
where
    F: Fn(&HashValue, &HashValue) -> HashValue,
{
    steps.iter().fold(leaf_hash, |current, step| {
        if step.sibling_is_right {
            combine(&current, &step.sibling)
        } else {
            combine(&step.sibling, &current)
        }
    })
}
