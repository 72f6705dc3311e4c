// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! The external action classifier boundary.

use serde::{Deserialize, Serialize};
use squid_types::{BranchingParams, LeafAction, LeafRecord};

use crate::error::PolicyResult;

/// Per-leaf features handed to the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafFeatures {
    pub depth: u32,
    pub index: u32,
    pub index_hash: u32,
    pub local_entropy: f64,
    /// Epoch milliseconds, shared by every leaf of one run.
    pub timestamp: u64,
    #[serde(rename = "global_L")]
    pub global_l: u64,
    pub global_b: u32,
    pub global_m: u32,
    pub global_t: u32,
    pub last_access_count: u32,
    pub leaf_hist_score: f64,
}

impl LeafFeatures {
    pub fn from_leaf(
        leaf: &LeafRecord,
        params: &BranchingParams,
        total: u64,
        timestamp: u64,
    ) -> Self {
        Self {
            depth: leaf.depth,
            index: leaf.index,
            index_hash: leaf.index % 1000,
            local_entropy: leaf.entropy,
            timestamp,
            global_l: total,
            global_b: params.b,
            global_m: params.m,
            global_t: params.t,
            last_access_count: 0,
            leaf_hist_score: leaf.entropy * 0.5 + (leaf.index % 10) as f64 * 0.1,
        }
    }
}

/// A classifier verdict for one whole leaf set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierDecision {
    pub sr: f64,
    pub c: f64,
    /// One action per leaf, in leaf order.
    pub actions: Vec<LeafAction>,
    pub model_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub drivers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entropy_budget_remaining: Option<f64>,
}

/// Where the applied actions came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DecisionSource {
    Classifier { model_hash: String },
    Fallback,
}

impl DecisionSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, DecisionSource::Fallback)
    }
}

/// Chooses one action per leaf.
///
/// Implementations may be remote. Any error, or a decision whose action
/// count differs from the feature count, is replaced by the local
/// deterministic policy.
pub trait ActionClassifier: Send + Sync {
    fn decide(&self, features: &[LeafFeatures], sr: f64, c: f64) -> PolicyResult<ClassifierDecision>;
}
