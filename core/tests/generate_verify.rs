// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! End-to-end generation with the local KEM stand-in.

use squid_core::{PipelineConfig, SquidCore};
use squid_keys::{KemSignatureService, LocalEd25519Kem};
use squid_merkle::HostHashMixer;
use squid_policy::{
    ActionClassifier, ClassifierDecision, DecisionSource, LeafFeatures, PolicyError, PolicyResult,
};
use squid_storage::{InMemoryLeafHistoryStore, LeafHistoryStore};
use squid_types::{BranchingParams, LeafAction, SquidError};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn kem() -> Arc<LocalEd25519Kem> {
    Arc::new(LocalEd25519Kem::from_bytes(&[7u8; 32]))
}

fn core_with_history() -> (SquidCore, Arc<InMemoryLeafHistoryStore>) {
    let history = Arc::new(InMemoryLeafHistoryStore::new());
    let core = SquidCore::new(PipelineConfig::default(), kem(), history.clone());
    (core, history)
}

struct UnreachableClassifier;

impl ActionClassifier for UnreachableClassifier {
    fn decide(&self, _: &[LeafFeatures], _: f64, _: f64) -> PolicyResult<ClassifierDecision> {
        Err(PolicyError::ClassifierUnavailable("connection refused".to_string()))
    }
}

/// Marks every third leaf REASSIGN.
struct EveryThirdClassifier;

impl ActionClassifier for EveryThirdClassifier {
    fn decide(&self, features: &[LeafFeatures], sr: f64, c: f64) -> PolicyResult<ClassifierDecision> {
        let actions = features
            .iter()
            .map(|f| {
                if f.index % 3 == 0 {
                    LeafAction::Reassign
                } else {
                    LeafAction::Valid
                }
            })
            .collect();
        Ok(ClassifierDecision {
            sr,
            c,
            actions,
            model_hash: "REMOTE_MODEL_V2".to_string(),
            decision: Some("ROTATE".to_string()),
            confidence: Some(0.9),
            drivers: vec!["test".to_string()],
            entropy_budget_remaining: None,
        })
    }
}

#[test]
fn test_generate_then_verify() -> anyhow::Result<()> {
    init_tracing();
    let (core, _) = core_with_history();

    let response = core.generate(Some(BranchingParams::new(2, 3, 32)))?;
    assert_eq!(response.analysis.total_leaves, 8);
    assert_eq!(response.analysis.actions.len(), 8);
    assert_eq!(response.analysis.distribution.total(), 8);
    assert_eq!(response.model_hash, "MODEL_HASH_V1");
    assert_eq!(response.seed_model_hash.len(), 64);
    for (i, detail) in response.analysis.leaf_details.iter().enumerate() {
        assert_eq!(detail.index as usize, i);
        assert_eq!(detail.path.len(), 3);
    }

    let ok = core.verify(
        &response.merkle_root,
        &response.seed_model_hash,
        &response.model_hash,
        &response.signature,
    );
    assert!(ok.valid, "{}", ok.reason);
    assert_eq!(ok.reason, "Valid signature");

    // Upper-case hex roots verify as well
    let upper = core.verify(
        &response.merkle_root.to_uppercase(),
        &response.seed_model_hash,
        &response.model_hash,
        &response.signature,
    );
    assert!(upper.valid);

    let wrong_model = core.verify(
        &response.merkle_root,
        &response.seed_model_hash,
        "MODEL_HASH_V2",
        &response.signature,
    );
    assert!(!wrong_model.valid);
    assert_eq!(wrong_model.reason, "Invalid signature");

    let garbage = core.verify(
        &response.merkle_root,
        &response.seed_model_hash,
        &response.model_hash,
        "not-hex",
    );
    assert!(!garbage.valid);
    Ok(())
}

#[test]
fn test_latest_public_root_tracks_last_generation() -> anyhow::Result<()> {
    let (core, _) = core_with_history();
    assert!(core.latest_public_root().is_none());

    let first = core.generate(Some(BranchingParams::new(3, 2, 16)))?;
    let second = core.generate(Some(BranchingParams::new(3, 2, 16)))?;
    // Each request encapsulates afresh
    assert_ne!(first.ciphertext, second.ciphertext);
    assert_ne!(first.merkle_root, second.merkle_root);

    let latest = core.latest_public_root().expect("published root");
    assert_eq!(latest.merkle_root, second.merkle_root);
    assert_eq!(latest.signature, second.signature);
    assert_eq!(latest.scheme, kem().scheme());
    Ok(())
}

#[test]
fn test_signature_covers_root_and_hashes() -> anyhow::Result<()> {
    let kem = kem();
    let history = Arc::new(InMemoryLeafHistoryStore::new());
    let core = SquidCore::new(PipelineConfig::default(), kem.clone(), history);
    let response = core.generate(Some(BranchingParams::new(2, 2, 8)))?;

    let message = format!(
        "{}{}{}",
        response.merkle_root, response.seed_model_hash, response.model_hash
    );
    assert!(kem.verify(message.as_bytes(), &response.signature)?);
    assert!(!kem.verify(response.merkle_root.as_bytes(), &response.signature)?);
    Ok(())
}

#[test]
fn test_unreachable_classifier_falls_back() -> anyhow::Result<()> {
    init_tracing();
    let (core, history) = core_with_history();
    let core = core.with_classifier(Arc::new(UnreachableClassifier));

    let response = core.generate(Some(BranchingParams::new(4, 3, 64)))?;
    assert_eq!(response.analysis.decision_source, DecisionSource::Fallback);
    assert_eq!(response.analysis.actions.len(), 64);

    let transformed = response
        .analysis
        .actions
        .iter()
        .filter(|a| **a != LeafAction::Valid)
        .count();
    assert_eq!(history.list_all()?.len(), transformed);
    assert_eq!(core.leaf_history()?.len(), transformed);
    Ok(())
}

#[test]
fn test_classifier_decision_is_applied() -> anyhow::Result<()> {
    let (core, history) = core_with_history();
    let core = core.with_classifier(Arc::new(EveryThirdClassifier));

    let response = core.generate(Some(BranchingParams::new(3, 2, 32)))?;
    assert_eq!(
        response.analysis.decision_source,
        DecisionSource::Classifier {
            model_hash: "REMOTE_MODEL_V2".to_string()
        }
    );
    assert_eq!(response.analysis.distribution.reassign, 3);
    assert_eq!(response.analysis.distribution.valid, 6);

    let entries = history.list_all()?;
    assert_eq!(entries.len(), 3);
    // Newest first
    let indices: Vec<u32> = entries.iter().map(|e| e.index).collect();
    assert_eq!(indices, vec![6, 3, 0]);
    assert!(entries.iter().all(|e| e.action == LeafAction::Reassign));
    Ok(())
}

#[test]
fn test_mixed_tree_changes_root_binding() -> anyhow::Result<()> {
    let (core, _) = core_with_history();
    let core = core.with_mixer(Arc::new(HostHashMixer::with_descriptor("test-host")));

    let response = core.generate(Some(BranchingParams::new(2, 2, 16)))?;
    let ok = core.verify(
        &response.merkle_root,
        &response.seed_model_hash,
        &response.model_hash,
        &response.signature,
    );
    assert!(ok.valid);
    Ok(())
}

#[test]
fn test_file_history_store() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("history").join("leaf_history.jsonl");
    let config = PipelineConfig::default().with_history_path(&path);

    let core = SquidCore::from_config(config.clone(), kem())?
        .with_classifier(Arc::new(EveryThirdClassifier));
    core.generate(Some(BranchingParams::new(3, 2, 32)))?;
    drop(core);

    let reopened = SquidCore::from_config(config, kem())?;
    assert_eq!(reopened.leaf_history()?.len(), 3);
    assert!(path.exists());
    Ok(())
}

#[test]
fn test_invalid_params_map_to_squid_error() {
    let (core, _) = core_with_history();
    let err = core.generate(Some(BranchingParams::new(8, 8, 32))).unwrap_err();
    match SquidError::from(err) {
        SquidError::InvalidParameters(msg) => assert!(msg.contains("exceeds")),
        other => panic!("expected InvalidParameters, got {:?}", other),
    }
}
