// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! Generation and verification responses.

use serde::{Deserialize, Serialize};
use squid_policy::{DecisionSource, PolicyOutcome};
use squid_types::{BranchingParams, LeafAction, LeafRecord};

/// Result of one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// KEM ciphertext, hex.
    pub ciphertext: String,
    pub merkle_root: String,
    /// Signature over `merkle_root || seed_model_hash || model_hash`.
    pub signature: String,
    pub seed_model_hash: String,
    pub model_hash: String,
    /// RFC 3339; also bound into the model seed.
    pub timestamp: String,
    pub analysis: AnalysisData,
}

impl GenerateResponse {
    pub fn public_root(&self, scheme: &str) -> PublishedRoot {
        PublishedRoot {
            merkle_root: self.merkle_root.clone(),
            signature: self.signature.clone(),
            timestamp: self.timestamp.clone(),
            seed_model_hash: self.seed_model_hash.clone(),
            model_hash: self.model_hash.clone(),
            scheme: scheme.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisData {
    pub sr: f64,
    pub c: f64,
    pub total_leaves: usize,
    pub actions: Vec<LeafAction>,
    pub distribution: ActionDistribution,
    #[serde(flatten)]
    pub decision_source: DecisionSource,
    pub tree_params: BranchingParams,
    pub leaf_details: Vec<LeafDetail>,
}

impl AnalysisData {
    pub fn new(outcome: &PolicyOutcome, leaves: &[LeafRecord], params: BranchingParams) -> Self {
        let actions = outcome.actions().to_vec();
        let leaf_details = leaves
            .iter()
            .zip(actions.iter())
            .map(|(leaf, action)| LeafDetail {
                index: leaf.index,
                path: leaf.path.clone(),
                action: *action,
                entropy: leaf.entropy,
            })
            .collect();

        Self {
            sr: outcome.decision.sr,
            c: outcome.decision.c,
            total_leaves: leaves.len(),
            distribution: ActionDistribution::count(&actions),
            actions,
            decision_source: outcome.source.clone(),
            tree_params: params,
            leaf_details,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDistribution {
    pub valid: usize,
    pub decoy: usize,
    pub mutate: usize,
    pub reassign: usize,
}

impl ActionDistribution {
    pub fn count(actions: &[LeafAction]) -> Self {
        let mut out = Self::default();
        for action in actions {
            match action {
                LeafAction::Valid => out.valid += 1,
                LeafAction::Decoy => out.decoy += 1,
                LeafAction::Mutate => out.mutate += 1,
                LeafAction::Reassign => out.reassign += 1,
            }
        }
        out
    }

    pub fn total(&self) -> usize {
        self.valid + self.decoy + self.mutate + self.reassign
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafDetail {
    pub index: u32,
    pub path: Vec<u32>,
    pub action: LeafAction,
    /// Entropy of the value as derived, before the action was applied.
    pub entropy: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub reason: String,
    pub timestamp: String,
}

/// The last root issued by a pipeline instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedRoot {
    pub merkle_root: String,
    pub signature: String,
    pub timestamp: String,
    pub seed_model_hash: String,
    pub model_hash: String,
    pub scheme: String,
}
