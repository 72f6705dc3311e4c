// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! One generation request, end to end.
//!
//! ```text
//! encapsulate ─► extract(salt, shared) = root key
//!                  ├─► expand("model-seed|ts") ─► seed_model_hash
//!                  └─► derive b^m leaves ─► policy ─► Merkle tree ─► sign
//! ```
//!
//! The signed message is the ASCII concatenation
//! `hex(root) || seed_model_hash || model_hash`.

use parking_lot::RwLock;
use squid_keys::{derive_leaves, expand, extract, KemSignatureService};
use squid_merkle::{sha256, BinaryMerkleTree, HashMixer};
use squid_policy::{ActionClassifier, PolicyAdapter};
use squid_storage::{FileLeafHistoryStore, InMemoryLeafHistoryStore, LeafHistoryStore};
use squid_types::{now_rfc3339, BranchingParams, LeafHistoryEntry};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::CoreResult;
use crate::response::{AnalysisData, GenerateResponse, PublishedRoot, VerifyResponse};

const MODEL_SEED_LENGTH: usize = 32;

pub struct SquidCore {
    config: PipelineConfig,
    kem: Arc<dyn KemSignatureService>,
    policy: PolicyAdapter,
    mixer: Option<Arc<dyn HashMixer>>,
    latest: RwLock<Option<PublishedRoot>>,
}

impl SquidCore {
    pub fn new(
        config: PipelineConfig,
        kem: Arc<dyn KemSignatureService>,
        history: Arc<dyn LeafHistoryStore>,
    ) -> Self {
        let policy = PolicyAdapter::new(config.policy.clone(), history);
        Self {
            config,
            kem,
            policy,
            mixer: None,
            latest: RwLock::new(None),
        }
    }

    /// Build with the history store named by `config.history_path`, or an
    /// in-memory one when unset.
    pub fn from_config(config: PipelineConfig, kem: Arc<dyn KemSignatureService>) -> CoreResult<Self> {
        let history: Arc<dyn LeafHistoryStore> = match &config.history_path {
            Some(path) => Arc::new(FileLeafHistoryStore::open(path)?),
            None => Arc::new(InMemoryLeafHistoryStore::new()),
        };
        Ok(Self::new(config, kem, history))
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ActionClassifier>) -> Self {
        self.policy = self.policy.with_classifier(classifier);
        self
    }

    /// Hash the static tree through `mixer` instead of plain BLAKE2b.
    pub fn with_mixer(mut self, mixer: Arc<dyn HashMixer>) -> Self {
        self.mixer = Some(mixer);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Derive, classify, anchor and sign one leaf set. `None` uses the
    /// configured default parameters.
    pub fn generate(&self, params: Option<BranchingParams>) -> CoreResult<GenerateResponse> {
        let params = params.unwrap_or(self.config.default_params);
        params.validate()?;

        let kem_output = self.kem.encapsulate()?;
        let root_key = extract(self.config.salt.as_bytes(), &kem_output.shared_secret[..]);

        let timestamp = now_rfc3339();
        let seed_model = expand(
            &root_key[..],
            &format!("model-seed|{}", timestamp),
            MODEL_SEED_LENGTH,
        )?;
        let seed_model_hash = sha256(&[&seed_model[..]]).to_hex();

        let mut leaves = derive_leaves(&root_key[..], &params)?;
        let outcome = self.policy.apply(&mut leaves, &params)?;

        let values: Vec<&[u8]> = leaves.iter().map(|leaf| leaf.value.as_slice()).collect();
        let tree = match &self.mixer {
            Some(mixer) => BinaryMerkleTree::build_mixed(&values, mixer.clone())?,
            None => BinaryMerkleTree::build(&values)?,
        };
        let merkle_root = tree.root().to_hex();

        let model_hash = self.config.model_hash.clone();
        let message = signed_message(&merkle_root, &seed_model_hash, &model_hash);
        let signature = self.kem.sign(message.as_bytes())?;

        let response = GenerateResponse {
            ciphertext: hex::encode(&kem_output.ciphertext),
            merkle_root,
            signature,
            seed_model_hash,
            model_hash,
            timestamp,
            analysis: AnalysisData::new(&outcome, &leaves, params),
        };

        let published = response.public_root(self.kem.scheme());
        info!(
            root = %published.merkle_root,
            leaves = response.analysis.total_leaves,
            fallback = outcome.source.is_fallback(),
            scheme = %published.scheme,
            "Published merkle root"
        );
        *self.latest.write() = Some(published);

        Ok(response)
    }

    /// Check a root signature issued by this pipeline's signer.
    ///
    /// Never errors: malformed input is reported as an invalid result with
    /// the decoding error as its reason.
    pub fn verify(
        &self,
        merkle_root: &str,
        seed_model_hash: &str,
        model_hash: &str,
        signature: &str,
    ) -> VerifyResponse {
        let message = signed_message(&merkle_root.to_ascii_lowercase(), seed_model_hash, model_hash);
        let (valid, reason) = match self.kem.verify(message.as_bytes(), signature) {
            Ok(true) => (true, "Valid signature".to_string()),
            Ok(false) => (false, "Invalid signature".to_string()),
            Err(e) => {
                warn!(error = %e, "Signature verification failed");
                (false, e.to_string())
            }
        };
        debug!(root = %merkle_root, valid = valid, "Verified merkle root");

        VerifyResponse {
            valid,
            reason,
            timestamp: now_rfc3339(),
        }
    }

    /// The root issued by the most recent successful `generate`.
    pub fn latest_public_root(&self) -> Option<PublishedRoot> {
        self.latest.read().clone()
    }

    /// Applied leaf transforms, newest first.
    pub fn leaf_history(&self) -> CoreResult<Vec<LeafHistoryEntry>> {
        Ok(self.policy.history().list_all()?)
    }
}

fn signed_message(merkle_root: &str, seed_model_hash: &str, model_hash: &str) -> String {
    format!("{}{}{}", merkle_root, seed_model_hash, model_hash)
}
