// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! Caller-facing service over the dynamic engine.
//!
//! Every successful mutation records exactly one external event carrying the
//! roots around it. A failed integrity check is recorded as well.

use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use squid_types::{now_millis, ExternalEventType};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::audit::TransitionAudit;
use crate::config::EngineConfig;
use crate::engine::{BatchOutcome, DynamicMerkleEngine, EngineStats, IntegrityReport};
use crate::error::EngineResult;
use crate::transition::{reasons, ExternalTransitionEvent};

const ROTATION_KEY_LENGTH: usize = 32;

pub struct DynamicMerkleService {
    engine: Arc<DynamicMerkleEngine>,
    external: Arc<RwLock<Vec<ExternalTransitionEvent>>>,
}

impl DynamicMerkleService {
    pub fn new(engine: Arc<DynamicMerkleEngine>) -> Self {
        Self {
            engine,
            external: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Service over a fresh engine holding the three genesis leaves.
    pub fn genesis(config: EngineConfig) -> EngineResult<Self> {
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let values = [
            format!("genesis_block_{}", stamp),
            format!("merkle_root_{}", stamp),
            format!("security_hash_{}", stamp),
        ];
        let engine = DynamicMerkleEngine::with_leaves(config, &values)?;

        info!(root = %engine.root_hex(), "Dynamic merkle service initialized with genesis leaves");
        Ok(Self::new(Arc::new(engine)))
    }

    pub fn start(&self) -> Vec<JoinHandle<()>> {
        self.engine.start()
    }

    pub fn shutdown(&self) {
        self.engine.shutdown();
    }

    pub fn engine(&self) -> &Arc<DynamicMerkleEngine> {
        &self.engine
    }

    pub fn audit(&self) -> TransitionAudit {
        TransitionAudit::new(self.engine.clone(), self.external.clone())
    }

    pub fn external_events(&self) -> Vec<ExternalTransitionEvent> {
        self.external.read().clone()
    }

    pub fn add_leaves<V: AsRef<[u8]>>(
        &self,
        values: &[V],
        reason: Option<&str>,
    ) -> EngineResult<ExternalTransitionEvent> {
        let outcome = self.engine.add_leaves(values)?;
        let added = outcome.positions.len();
        Ok(self.record(
            ExternalEventType::AddLeaves,
            trigger(reason, reasons::DATA_INSERTION),
            &outcome,
            format!("Added {} new leaves to tree", added),
        ))
    }

    pub fn update_leaves(
        &self,
        updates: &BTreeMap<usize, Vec<u8>>,
        reason: Option<&str>,
    ) -> EngineResult<ExternalTransitionEvent> {
        let outcome = self.engine.update_leaves(updates)?;
        let updated = outcome.positions.len();
        Ok(self.record(
            ExternalEventType::UpdateLeaves,
            trigger(reason, reasons::DATA_UPDATE),
            &outcome,
            format!("Updated {} leaves in tree", updated),
        ))
    }

    /// Replace the leaves at `indices` with fresh values. Recorded as an
    /// UPDATE_LEAVES event.
    pub fn rotate_indices(
        &self,
        indices: &[usize],
        reason: Option<&str>,
    ) -> EngineResult<ExternalTransitionEvent> {
        let outcome = self.engine.rotate_by_indices(indices)?;
        let details = format!(
            "Rotated {} leaves at positions {:?}",
            outcome.positions.len(),
            outcome.positions
        );
        Ok(self.record(
            ExternalEventType::UpdateLeaves,
            trigger(reason, reasons::ROTATE_INDICES),
            &outcome,
            details,
        ))
    }

    /// Draw a new rotation key and re-derive every leaf from it.
    pub fn rotate_keys_and_rebuild(&self, reason: Option<&str>) -> EngineResult<ExternalTransitionEvent> {
        let mut key = Zeroizing::new([0u8; ROTATION_KEY_LENGTH]);
        OsRng.fill_bytes(&mut key[..]);

        let outcome = self.engine.rotate_all(&key[..])?;
        Ok(self.record(
            ExternalEventType::KeyRotation,
            trigger(reason, reasons::KEY_ROTATION),
            &outcome,
            "Full tree rebuild with key rotation".to_string(),
        ))
    }

    /// Check for compromised nodes. A failure is appended to the external
    /// log with identical previous and new roots.
    pub fn verify_integrity(&self) -> IntegrityReport {
        let report = self.engine.verify_integrity();
        if !report.is_valid {
            warn!(
                compromised = report.compromised_count,
                root = %report.root_hash,
                "Integrity verification failed"
            );
            let event = ExternalTransitionEvent {
                id: Uuid::new_v4(),
                sequence: self.engine.next_sequence(),
                event_type: ExternalEventType::IntegrityCheckFailed,
                timestamp: now_millis(),
                trigger_reason: reasons::INTEGRITY_FAILED.to_string(),
                previous_root_hash: report.root_hash.clone(),
                new_root_hash: report.root_hash.clone(),
                node_count: report.total_nodes,
                leaf_changed_count: 0,
                details: format!("Found {} compromised nodes", report.compromised_count),
            };
            self.external.write().push(event);
        }
        report
    }

    pub fn get_status(&self) -> EngineStats {
        self.engine.get_stats()
    }

    fn record(
        &self,
        event_type: ExternalEventType,
        trigger_reason: &str,
        outcome: &BatchOutcome,
        details: String,
    ) -> ExternalTransitionEvent {
        let event = ExternalTransitionEvent {
            id: Uuid::new_v4(),
            sequence: self.engine.next_sequence(),
            event_type,
            timestamp: now_millis(),
            trigger_reason: trigger_reason.to_string(),
            previous_root_hash: outcome.previous_root_hex(),
            new_root_hash: outcome.new_root_hex(),
            node_count: outcome.node_count,
            leaf_changed_count: outcome.positions.len(),
            details,
        };

        info!(
            event_type = %event.event_type,
            leaves_changed = event.leaf_changed_count,
            root = %event.new_root_hash,
            "Recorded tree event"
        );

        self.external.write().push(event.clone());
        event
    }
}

fn trigger<'a>(reason: Option<&'a str>, default: &'a str) -> &'a str {
    reason.filter(|r| !r.trim().is_empty()).unwrap_or(default)
}
