// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! Hierarchical leaf derivation.
//!
//! Every leaf `i` of a `b^m` tree is reached by walking the base-`b` digits
//! of `i` from the root secret:
//!
//! - branch: `key = HKDF-SHA256(key, "branch|{level}|{digit}")`, level from 0
//! - leaf key: `HKDF-SHA256(branch_key, "leaf|{i}")`
//! - value: `HMAC-SHA256(leaf_key, "leaf|{i}")` truncated to `ceil(t/8)` bytes
//!
//! HKDF here is the full extract-then-expand with an absent salt. When `t` is
//! not byte aligned the low-order bits of the final byte are cleared.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use squid_types::{BranchingParams, LeafRecord};
use zeroize::Zeroizing;

use crate::error::{KeyError, KeyResult};

type HmacSha256 = Hmac<Sha256>;

/// Length of every intermediate key.
pub const KEY_LENGTH: usize = 32;

/// A branch or leaf key, wiped on drop.
pub type NodeKey = Zeroizing<[u8; KEY_LENGTH]>;

/// HKDF-Extract. An empty salt means HashLen zero bytes.
pub fn extract(salt: &[u8], ikm: &[u8]) -> NodeKey {
    let salt = if salt.is_empty() { None } else { Some(salt) };
    let (prk, _) = Hkdf::<Sha256>::extract(salt, ikm);
    let mut out = Zeroizing::new([0u8; KEY_LENGTH]);
    out.copy_from_slice(&prk);
    out
}

/// HKDF-SHA256 over `key` with no salt, producing `length` bytes.
pub fn expand(key: &[u8], info: &str, length: usize) -> KeyResult<Zeroizing<Vec<u8>>> {
    let mut okm = Zeroizing::new(vec![0u8; length]);
    Hkdf::<Sha256>::new(None, key)
        .expand(info.as_bytes(), &mut okm)
        .map_err(|_| {
            KeyError::InvalidParameters(format!("HKDF output of {} bytes is too long", length))
        })?;
    Ok(okm)
}

fn expand_key(key: &[u8], info: &str) -> KeyResult<NodeKey> {
    let mut out = Zeroizing::new([0u8; KEY_LENGTH]);
    Hkdf::<Sha256>::new(None, key)
        .expand(info.as_bytes(), &mut out[..])
        .map_err(|e| KeyError::Structural(format!("HKDF expand failed: {}", e)))?;
    Ok(out)
}

/// One step down the tree.
pub fn derive_branch_key(parent: &[u8], level: u32, digit: u32) -> KeyResult<NodeKey> {
    expand_key(parent, &format!("branch|{}|{}", level, digit))
}

/// Leaf value for `index` under its final branch key.
pub fn derive_leaf(branch_key: &[u8], index: u32, t: u32) -> KeyResult<Vec<u8>> {
    let info = format!("leaf|{}", index);
    let leaf_key = expand_key(branch_key, &info)?;

    let mut mac = HmacSha256::new_from_slice(&leaf_key[..])
        .map_err(|e| KeyError::Structural(format!("HMAC key rejected: {}", e)))?;
    mac.update(info.as_bytes());
    let digest = mac.finalize().into_bytes();

    let len = (t as usize).div_ceil(8);
    if len == 0 || len > digest.len() {
        return Err(KeyError::InvalidParameters(format!(
            "t={} is outside 1..={}",
            t,
            digest.len() * 8
        )));
    }

    let mut value = digest[..len].to_vec();
    let rem = t % 8;
    if rem != 0 {
        let excess = 8 - rem;
        value[len - 1] &= 0xFFu8 << excess;
    }
    Ok(value)
}

/// Base-`b` digits of `index`, most significant first, padded to `m`.
pub fn index_to_path(index: u64, b: u32, m: u32) -> Vec<u32> {
    let base = b.max(1) as u64;
    let mut digits = vec![0u32; m as usize];
    let mut rest = index;
    for slot in digits.iter_mut().rev() {
        *slot = (rest % base) as u32;
        rest /= base;
    }
    digits
}

/// Shannon entropy of the byte distribution, in bits.
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut counts = [0usize; 256];
    for byte in data {
        counts[*byte as usize] += 1;
    }

    let len = data.len() as f64;
    counts
        .iter()
        .filter(|c| **c > 0)
        .map(|c| {
            let p = *c as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Value assigned to leaf position `index` when the engine rotates to `key`.
pub fn derive_rotation_value(key: &[u8], index: usize) -> KeyResult<Vec<u8>> {
    Ok(expand_key(key, &format!("rotate|{}", index))?.to_vec())
}

/// Derive all `b^m` leaves from `secret`.
///
/// Branch keys shared by consecutive indices are kept on a stack, so each
/// internal key is derived once per run.
pub fn derive_leaves(secret: &[u8], params: &BranchingParams) -> KeyResult<Vec<LeafRecord>> {
    let count = params.validate()?;
    let depth = params.m as usize;

    let mut leaves = Vec::with_capacity(count as usize);
    let mut stack: Vec<NodeKey> = Vec::with_capacity(depth);
    let mut previous: Vec<u32> = Vec::new();

    for i in 0..count {
        let path = index_to_path(i, params.b, params.m);
        let shared = previous
            .iter()
            .zip(path.iter())
            .take_while(|(a, b)| a == b)
            .count()
            .min(stack.len());
        stack.truncate(shared);

        for level in shared..depth {
            let key = {
                let parent: &[u8] = if level == 0 {
                    secret
                } else {
                    &stack[level - 1][..]
                };
                derive_branch_key(parent, level as u32, path[level])?
            };
            stack.push(key);
        }

        let branch_key = stack
            .last()
            .ok_or_else(|| KeyError::Structural("empty branch stack".to_string()))?;
        let index = i as u32;
        let value = derive_leaf(&branch_key[..], index, params.t)?;
        let entropy = shannon_entropy(&value);

        leaves.push(LeafRecord {
            index,
            path: path.clone(),
            value,
            depth: params.m,
            entropy,
        });
        previous = path;
    }

    tracing::debug!(
        b = params.b,
        m = params.m,
        t = params.t,
        leaves = leaves.len(),
        "Derived leaf set"
    );

    Ok(leaves)
}
