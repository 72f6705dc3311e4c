// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! Engine timing and probability settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Period of the transition cycle (ms)
    pub transition_interval_ms: u64,
    /// Period of the integrity sweep (ms)
    pub integrity_interval_ms: u64,
    /// Chance that a newly added leaf starts as DECOY
    pub decoy_ratio: f64,
    /// Per-sweep chance that a leaf becomes COMPROMISED
    pub compromise_rate: f64,
    /// Per-sweep chance that a COMPROMISED leaf recovers
    pub recovery_rate: f64,
    /// Upper bound of leaves picked per transition cycle
    pub max_transitions_per_cycle: usize,
    /// Fixed RNG seed. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            transition_interval_ms: 2_000,
            integrity_interval_ms: 3_000,
            decoy_ratio: 0.2,
            compromise_rate: 0.05,
            recovery_rate: 0.3,
            max_transitions_per_cycle: 3,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let transition_interval_ms: u64 = std::env::var("SQUID_TRANSITION_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.transition_interval_ms);

        let integrity_interval_ms: u64 = std::env::var("SQUID_INTEGRITY_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.integrity_interval_ms);

        let decoy_ratio: f64 = std::env::var("SQUID_DECOY_RATIO")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.decoy_ratio);

        let compromise_rate: f64 = std::env::var("SQUID_COMPROMISE_RATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.compromise_rate);

        let recovery_rate: f64 = std::env::var("SQUID_RECOVERY_RATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.recovery_rate);

        let max_transitions_per_cycle: usize = std::env::var("SQUID_MAX_TRANSITIONS_PER_CYCLE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_transitions_per_cycle);

        let seed: Option<u64> = std::env::var("SQUID_ENGINE_SEED")
            .ok()
            .and_then(|s| s.parse().ok());

        Self {
            transition_interval_ms,
            integrity_interval_ms,
            decoy_ratio,
            compromise_rate,
            recovery_rate,
            max_transitions_per_cycle,
            seed,
        }
        .sanitized()
    }

    /// Builder helper for tests and hosts that need reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Clamp probabilities into [0, 1] and keep periods and the cycle bound
    /// at one or more.
    pub fn sanitized(mut self) -> Self {
        let unit = |p: f64| if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
        self.decoy_ratio = unit(self.decoy_ratio);
        self.compromise_rate = unit(self.compromise_rate);
        self.recovery_rate = unit(self.recovery_rate);
        self.transition_interval_ms = self.transition_interval_ms.max(1);
        self.integrity_interval_ms = self.integrity_interval_ms.max(1);
        self.max_transitions_per_cycle = self.max_transitions_per_cycle.max(1);
        self
    }

    pub fn transition_interval(&self) -> Duration {
        Duration::from_millis(self.transition_interval_ms)
    }

    pub fn integrity_interval(&self) -> Duration {
        Duration::from_millis(self.integrity_interval_ms)
    }
}
