// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! Leaf policy for SQUID.
//!
//! This crate provides:
//! - The SR and C scores over branching parameters
//! - The `ActionClassifier` boundary and its deterministic fallback
//! - DECOY / MUTATE / REASSIGN byte transforms with history recording

pub mod adapter;
pub mod classifier;
pub mod error;
pub mod fallback;
pub mod scores;
pub mod transform;

pub use adapter::{PolicyAdapter, PolicyConfig, PolicyOutcome};
pub use classifier::{ActionClassifier, ClassifierDecision, DecisionSource, LeafFeatures};
pub use error::{PolicyError, PolicyResult};
pub use fallback::DeterministicPolicy;
pub use scores::{correlation_coefficient, super_relation};
