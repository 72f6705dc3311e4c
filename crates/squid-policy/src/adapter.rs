// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! Scores a derived leaf set, picks one action per leaf and applies it.

use serde::{Deserialize, Serialize};
use squid_storage::LeafHistoryStore;
use squid_types::{now_millis, BranchingParams, LeafAction, LeafHistoryEntry, LeafRecord};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::classifier::{ActionClassifier, ClassifierDecision, DecisionSource, LeafFeatures};
use crate::error::PolicyResult;
use crate::fallback::DeterministicPolicy;
use crate::scores::{correlation_coefficient, super_relation};
use crate::transform;

/// Policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Mixed into every fallback seed. Two engines with different ids pick
    /// different actions for the same leaf set.
    pub engine_id: String,
    pub sr_min: f64,
    pub gamma_t: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            engine_id: "squid-core".to_string(),
            sr_min: 1.0,
            gamma_t: 10.0,
        }
    }
}

impl PolicyConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let engine_id = std::env::var("SQUID_ENGINE_ID").unwrap_or(defaults.engine_id);

        let sr_min: f64 = std::env::var("SQUID_SR_MIN")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.sr_min);

        let gamma_t: f64 = std::env::var("SQUID_GAMMA_T")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.gamma_t);

        Self {
            engine_id,
            sr_min,
            gamma_t,
        }
    }
}

/// Result of one policy pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyOutcome {
    pub decision: ClassifierDecision,
    pub source: DecisionSource,
}

impl PolicyOutcome {
    pub fn actions(&self) -> &[LeafAction] {
        &self.decision.actions
    }

    /// Count per action, in `LeafAction::ALL` order.
    pub fn distribution(&self) -> Vec<(LeafAction, usize)> {
        LeafAction::ALL
            .iter()
            .map(|a| (*a, self.decision.actions.iter().filter(|x| *x == a).count()))
            .collect()
    }
}

pub struct PolicyAdapter {
    config: PolicyConfig,
    fallback: DeterministicPolicy,
    classifier: Option<Arc<dyn ActionClassifier>>,
    history: Arc<dyn LeafHistoryStore>,
}

impl PolicyAdapter {
    pub fn new(config: PolicyConfig, history: Arc<dyn LeafHistoryStore>) -> Self {
        let fallback = DeterministicPolicy::new(&config.engine_id, config.sr_min, config.gamma_t);
        Self {
            config,
            fallback,
            classifier: None,
            history,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ActionClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn history(&self) -> &Arc<dyn LeafHistoryStore> {
        &self.history
    }

    /// Ask the classifier, falling back to the local policy when it fails or
    /// returns the wrong number of actions.
    pub fn decide(&self, leaves: &[LeafRecord], params: &BranchingParams) -> PolicyOutcome {
        let sr = super_relation(params);
        let c = correlation_coefficient(params);

        if let Some(classifier) = &self.classifier {
            let timestamp = now_millis();
            let total = leaves.len() as u64;
            let features: Vec<LeafFeatures> = leaves
                .iter()
                .map(|leaf| LeafFeatures::from_leaf(leaf, params, total, timestamp))
                .collect();

            match classifier.decide(&features, sr, c) {
                Ok(decision) if decision.actions.len() == leaves.len() => {
                    let source = DecisionSource::Classifier {
                        model_hash: decision.model_hash.clone(),
                    };
                    return PolicyOutcome { decision, source };
                }
                Ok(decision) => {
                    warn!(
                        expected = leaves.len(),
                        got = decision.actions.len(),
                        "Classifier returned wrong action count, using fallback"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Classifier failed, using fallback");
                }
            }
        }

        PolicyOutcome {
            decision: self.fallback.decide_all(leaves.len(), sr, c),
            source: DecisionSource::Fallback,
        }
    }

    /// Decide and transform `leaves` in place. Every non-VALID transform is
    /// appended to the history store.
    pub fn apply(
        &self,
        leaves: &mut [LeafRecord],
        params: &BranchingParams,
    ) -> PolicyResult<PolicyOutcome> {
        let outcome = self.decide(leaves, params);

        let mut changed = 0usize;
        for (leaf, action) in leaves.iter_mut().zip(outcome.decision.actions.iter()) {
            if let Some(next) = transform::apply(*action, &leaf.value) {
                let entry = LeafHistoryEntry::new(leaf.index, &leaf.value, &next, *action);
                self.history.append(&entry)?;
                leaf.value = next;
                changed += 1;
            }
        }

        debug!(
            leaves = leaves.len(),
            changed = changed,
            sr = outcome.decision.sr,
            c = outcome.decision.c,
            fallback = outcome.source.is_fallback(),
            "Applied leaf policy"
        );

        Ok(outcome)
    }
}
