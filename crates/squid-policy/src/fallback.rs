// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! Local deterministic action policy.
//!
//! Each leaf gets one draw from ChaCha8 seeded with
//! `H(engine_id) ^ index * 73856093 ^ bits(sr) * 19349663` (wrapping), where
//! `H` is the first 8 bytes of SHA-256, big-endian. The draw is reproducible
//! across runs and platforms; it is not a secret.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use squid_types::LeafAction;

use crate::classifier::{ActionClassifier, ClassifierDecision, LeafFeatures};
use crate::error::PolicyResult;

pub const FALLBACK_MODEL_HASH: &str = "DETERMINISTIC_V1";
pub const FALLBACK_DECISION: &str = "HOLD_STATE";
pub const FALLBACK_DRIVER: &str = "deterministic_fallback";

const INDEX_PRIME: u64 = 73_856_093;
const SR_PRIME: u64 = 19_349_663;
const SECONDARY_BAND: f64 = 0.05;

/// First 8 bytes of `SHA-256(engine_id)`, big-endian.
pub fn engine_id_hash(engine_id: &str) -> u64 {
    let digest = Sha256::digest(engine_id.as_bytes());
    let mut first = [0u8; 8];
    first.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(first)
}

pub fn action_seed(engine_hash: u64, index: u32, sr: f64) -> u64 {
    engine_hash ^ (index as u64).wrapping_mul(INDEX_PRIME) ^ sr.to_bits().wrapping_mul(SR_PRIME)
}

#[derive(Debug, Clone)]
pub struct DeterministicPolicy {
    engine_hash: u64,
    sr_min: f64,
    gamma_t: f64,
}

impl DeterministicPolicy {
    pub fn new(engine_id: &str, sr_min: f64, gamma_t: f64) -> Self {
        Self {
            engine_hash: engine_id_hash(engine_id),
            sr_min,
            gamma_t,
        }
    }

    /// High-confidence zone when `sr >= sr_min` and `c >= gamma_t`.
    pub fn decoy_rate(&self, sr: f64, c: f64) -> f64 {
        if sr >= self.sr_min && c >= self.gamma_t {
            (sr / 10.0).clamp(0.2, 0.5)
        } else {
            (c / 100.0).clamp(0.01, 0.1)
        }
    }

    pub fn select_action(&self, index: u32, sr: f64, c: f64) -> LeafAction {
        let seed = action_seed(self.engine_hash, index, sr);
        let draw: f64 = ChaCha8Rng::seed_from_u64(seed).gen();
        let decoy_rate = self.decoy_rate(sr, c);
        let strong = sr >= self.sr_min;

        if draw < decoy_rate {
            if strong {
                LeafAction::Decoy
            } else {
                LeafAction::Mutate
            }
        } else if draw < decoy_rate + SECONDARY_BAND {
            if strong {
                LeafAction::Mutate
            } else {
                LeafAction::Reassign
            }
        } else {
            LeafAction::Valid
        }
    }

    /// Actions for leaves `0..count`, tagged as the fallback.
    pub fn decide_all(&self, count: usize, sr: f64, c: f64) -> ClassifierDecision {
        let actions = (0..count)
            .map(|i| self.select_action(i as u32, sr, c))
            .collect();
        fallback_decision(actions, sr, c)
    }
}

fn fallback_decision(actions: Vec<LeafAction>, sr: f64, c: f64) -> ClassifierDecision {
    ClassifierDecision {
        sr,
        c,
        actions,
        model_hash: FALLBACK_MODEL_HASH.to_string(),
        decision: Some(FALLBACK_DECISION.to_string()),
        confidence: Some(1.0),
        drivers: vec![FALLBACK_DRIVER.to_string()],
        entropy_budget_remaining: Some(0.0),
    }
}

impl ActionClassifier for DeterministicPolicy {
    fn decide(&self, features: &[LeafFeatures], sr: f64, c: f64) -> PolicyResult<ClassifierDecision> {
        let actions = features
            .iter()
            .map(|f| self.select_action(f.index, sr, c))
            .collect();
        Ok(fallback_decision(actions, sr, c))
    }
}
