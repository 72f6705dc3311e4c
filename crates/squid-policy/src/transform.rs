// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! Byte transforms applied per leaf action. All preserve the value length.

use sha2::{Digest, Sha256};
use squid_types::LeafAction;

const DECOY_MASK: u8 = 0xAA;
const MUTATE_BIT: u8 = 0x01;
const REASSIGN_TAG: &[u8] = b"REASSIGN";

pub fn decoy(value: &[u8]) -> Vec<u8> {
    value.iter().map(|b| b ^ DECOY_MASK).collect()
}

pub fn mutate(value: &[u8]) -> Vec<u8> {
    let mut out = value.to_vec();
    if let Some(first) = out.first_mut() {
        *first ^= MUTATE_BIT;
    }
    out
}

/// `SHA-256(value || "REASSIGN")`, truncated or zero padded to `value.len()`.
pub fn reassign(value: &[u8]) -> Vec<u8> {
    let digest = Sha256::new()
        .chain_update(value)
        .chain_update(REASSIGN_TAG)
        .finalize();
    let mut out = vec![0u8; value.len()];
    let n = out.len().min(digest.len());
    out[..n].copy_from_slice(&digest[..n]);
    out
}

/// `None` for VALID, which leaves the value untouched.
pub fn apply(action: LeafAction, value: &[u8]) -> Option<Vec<u8>> {
    match action {
        LeafAction::Valid => None,
        LeafAction::Decoy => Some(decoy(value)),
        LeafAction::Mutate => Some(mutate(value)),
        LeafAction::Reassign => Some(reassign(value)),
    }
}
