// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! Pipeline configuration.

use serde::{Deserialize, Serialize};
use squid_policy::PolicyConfig;
use squid_types::BranchingParams;
use std::path::PathBuf;

pub const DEFAULT_SALT: &str = "SQUID-v1";
pub const DEFAULT_MODEL_HASH: &str = "MODEL_HASH_V1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Used when a request carries no parameters.
    pub default_params: BranchingParams,
    /// HKDF-Extract salt turning the KEM shared secret into the root key.
    pub salt: String,
    /// Model identifier bound into every root signature.
    pub model_hash: String,
    /// JSON-lines leaf history file. `None` keeps history in memory.
    pub history_path: Option<PathBuf>,
    pub policy: PolicyConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_params: BranchingParams::default(),
            salt: DEFAULT_SALT.to_string(),
            model_hash: DEFAULT_MODEL_HASH.to_string(),
            history_path: None,
            policy: PolicyConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let b: u32 = std::env::var("SQUID_DEFAULT_B")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.default_params.b);

        let m: u32 = std::env::var("SQUID_DEFAULT_M")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.default_params.m);

        let t: u32 = std::env::var("SQUID_DEFAULT_T")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.default_params.t);

        let salt = std::env::var("SQUID_SALT").unwrap_or(defaults.salt);
        let model_hash = std::env::var("SQUID_MODEL_HASH").unwrap_or(defaults.model_hash);
        let history_path = std::env::var("SQUID_HISTORY_PATH").ok().map(PathBuf::from);

        Self {
            default_params: BranchingParams::new(b, m, t),
            salt,
            model_hash,
            history_path,
            policy: PolicyConfig::from_env(),
        }
    }

    pub fn with_history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.default_params, BranchingParams::new(4, 3, 128));
        assert_eq!(config.salt, "SQUID-v1");
        assert_eq!(config.model_hash, "MODEL_HASH_V1");
        assert!(config.history_path.is_none());
        assert_eq!(config.policy.engine_id, "squid-core");
    }
}
