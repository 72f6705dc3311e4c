// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! Dynamic Merkle engine.
//!
//! One `RwLock<NodeArena>` guards every mutation, including the two
//! background cycles. A write guard is held for a whole batch and its root
//! recompute, so readers never observe a root that disagrees with the leaves.
//! Autonomous transitions are appended to their log while that guard is held,
//! which keeps log order equal to decision order.

use parking_lot::RwLock;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use squid_keys::derive_rotation_value;
use squid_merkle::{
    build_levels, fold_proof, proof_steps, sha256, sha256_pair, HashValue, MerkleError, ProofStep,
};
use squid_types::{now_millis, NodeId, NodeState, MAX_LEAVES};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::arena::NodeArena;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::node::{next_state, DynamicNode};
use crate::transition::{reasons, DynamicTransition};

/// Root movement caused by one caller batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub previous_root: Option<HashValue>,
    pub new_root: Option<HashValue>,
    /// Leaf positions written by the batch, ascending.
    pub positions: Vec<usize>,
    /// Arena size after the batch.
    pub node_count: usize,
}

impl BatchOutcome {
    pub fn previous_root_hex(&self) -> String {
        root_hex(self.previous_root)
    }

    pub fn new_root_hex(&self) -> String {
        root_hex(self.new_root)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// `true` exactly when no node is COMPROMISED.
    pub is_valid: bool,
    pub compromised_count: usize,
    pub total_nodes: usize,
    pub root_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub total_nodes: usize,
    pub leaf_count: usize,
    pub valid_nodes: usize,
    pub decoy_nodes: usize,
    pub transitioning_nodes: usize,
    pub compromised_nodes: usize,
    pub total_transitions: usize,
    pub root_hash: String,
    pub running: bool,
}

/// Inclusion proof of one leaf against the dynamic root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicProof {
    pub leaf_position: usize,
    pub node_id: NodeId,
    pub leaf_hash: HashValue,
    pub steps: Vec<ProofStep>,
    /// Root at the time the proof was taken.
    pub root: HashValue,
}

impl DynamicProof {
    pub fn compute_root(&self) -> HashValue {
        fold_proof(self.leaf_hash, &self.steps, sha256_pair)
    }

    pub fn verify_against(&self, root: &HashValue) -> bool {
        self.compute_root() == *root
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    Transition,
    Integrity,
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cycle::Transition => f.write_str("transition"),
            Cycle::Integrity => f.write_str("integrity"),
        }
    }
}

/// A state change decided inside a batch, recorded once the root is fresh.
struct PendingChange {
    node_id: NodeId,
    from: NodeState,
    to: NodeState,
    previous_hash: HashValue,
    new_hash: HashValue,
    reason: &'static str,
}

pub struct DynamicMerkleEngine {
    config: EngineConfig,
    arena: RwLock<NodeArena>,
    transitions: RwLock<Vec<DynamicTransition>>,
    /// Shared by the transition log and any external event log.
    sequence: AtomicU64,
    running: AtomicBool,
    stopped: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl DynamicMerkleEngine {
    pub fn new(config: EngineConfig) -> Self {
        let config = config.sanitized();
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            arena: RwLock::new(NodeArena::new(rng)),
            transitions: RwLock::new(Vec::new()),
            sequence: AtomicU64::new(0),
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    /// Engine seeded with `values` as its first leaves.
    pub fn with_leaves<V: AsRef<[u8]>>(config: EngineConfig, values: &[V]) -> EngineResult<Self> {
        let engine = Self::new(config);
        if !values.is_empty() {
            engine.add_leaves(values)?;
        }
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    // ============================================
    // Lifecycle
    // ============================================

    /// Spawn the transition cycle and the integrity sweep.
    ///
    /// Each first fires one period after start. Calling this on a running or
    /// shut down engine spawns nothing. Must be called within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        if self.stopped.load(Ordering::SeqCst) {
            warn!("Engine has been shut down, not restarting");
            return Vec::new();
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Vec::new();
        }

        info!(
            transition_interval_ms = self.config.transition_interval_ms,
            integrity_interval_ms = self.config.integrity_interval_ms,
            "Dynamic merkle engine started"
        );

        vec![
            self.spawn_cycle(Cycle::Transition),
            self.spawn_cycle(Cycle::Integrity),
        ]
    }

    fn spawn_cycle(self: &Arc<Self>, cycle: Cycle) -> JoinHandle<()> {
        let period = match cycle {
            Cycle::Transition => self.config.transition_interval(),
            Cycle::Integrity => self.config.integrity_interval(),
        };
        let engine = Arc::downgrade(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        debug!(cycle = %cycle, "Engine cycle shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let Some(engine) = engine.upgrade() else {
                            warn!(cycle = %cycle, "Engine has been dropped, cycle stopping");
                            break;
                        };
                        engine.run_background(cycle);
                    }
                }
            }
        })
    }

    /// Stop both cycles. Safe to call more than once.
    ///
    /// Returns after any in-flight cycle batch has finished, so no transition
    /// is appended once this returns.
    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        drop(self.arena.write());
        self.shutdown_tx.send_replace(true);
        info!(
            total_transitions = self.transitions.read().len(),
            "Dynamic merkle engine stopped"
        );
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ============================================
    // Caller batches
    // ============================================

    /// Append leaves hashed with SHA-256. Each starts DECOY with probability
    /// `decoy_ratio`, otherwise VALID.
    pub fn add_leaves<V: AsRef<[u8]>>(&self, values: &[V]) -> EngineResult<BatchOutcome> {
        if values.is_empty() {
            return Err(EngineError::EmptyBatch);
        }

        let mut guard = self.arena.write();
        let arena = &mut *guard;

        let requested = arena.leaf_order.len() + values.len();
        if requested as u64 > MAX_LEAVES {
            return Err(EngineError::CapacityExceeded {
                requested,
                max: MAX_LEAVES,
            });
        }

        let previous_root = arena.root;
        let now = now_millis();
        let first = arena.leaf_order.len();
        let mut decoys = 0usize;

        for value in values {
            let state = if arena.rng.gen::<f64>() < self.config.decoy_ratio {
                decoys += 1;
                NodeState::Decoy
            } else {
                NodeState::Valid
            };
            arena.push_leaf(sha256(&[value.as_ref()]), state, now);
        }
        arena.recompute(now);

        debug!(
            added = values.len(),
            decoys = decoys,
            leaves = arena.leaf_order.len(),
            root = %root_hex(arena.root),
            "Added leaves"
        );

        Ok(BatchOutcome {
            previous_root,
            new_root: arena.root,
            positions: (first..arena.leaf_order.len()).collect(),
            node_count: arena.nodes.len(),
        })
    }

    /// Replace one leaf's hash with `SHA-256(value)`.
    ///
    /// Returns `false`, changing nothing, when `node_id` is unknown or is an
    /// internal node.
    pub fn update_leaf(&self, node_id: &str, value: &[u8]) -> bool {
        let mut guard = self.arena.write();
        let arena = &mut *guard;

        match arena.nodes.get_mut(node_id) {
            Some(node) if node.is_leaf() => node.data_hash = sha256(&[value]),
            _ => return false,
        }
        arena.recompute(now_millis());
        true
    }

    /// Replace leaves by position in leaf order. Unknown positions are
    /// skipped; the batch fails only when none resolves.
    pub fn update_leaves(&self, updates: &BTreeMap<usize, Vec<u8>>) -> EngineResult<BatchOutcome> {
        if updates.is_empty() {
            return Err(EngineError::EmptyBatch);
        }
        let hashed: Vec<(usize, HashValue)> = updates
            .iter()
            .map(|(position, value)| (*position, sha256(&[value])))
            .collect();
        self.write_leaf_hashes(&hashed)
    }

    /// Overwrite the given positions with fresh random values.
    pub fn rotate_by_indices(&self, indices: &[usize]) -> EngineResult<BatchOutcome> {
        if indices.is_empty() {
            return Err(EngineError::EmptyBatch);
        }
        let unique: BTreeSet<usize> = indices.iter().copied().collect();
        let hashed: Vec<(usize, HashValue)> = unique
            .into_iter()
            .map(|position| {
                let value = format!("rotated_leaf_{}", Uuid::new_v4());
                (position, sha256(&[value.as_bytes()]))
            })
            .collect();
        self.write_leaf_hashes(&hashed)
    }

    /// Re-derive every leaf as `HKDF(key, "rotate|i")` and rehash it.
    pub fn rotate_all(&self, key: &[u8]) -> EngineResult<BatchOutcome> {
        let mut guard = self.arena.write();
        let arena = &mut *guard;

        if arena.leaf_order.is_empty() {
            return Err(EngineError::EmptyBatch);
        }

        let mut hashed = Vec::with_capacity(arena.leaf_order.len());
        for position in 0..arena.leaf_order.len() {
            let value = derive_rotation_value(key, position)?;
            hashed.push((position, sha256(&[&value])));
        }

        Self::apply_leaf_hashes(arena, &hashed)
    }

    fn write_leaf_hashes(&self, hashed: &[(usize, HashValue)]) -> EngineResult<BatchOutcome> {
        let mut guard = self.arena.write();
        Self::apply_leaf_hashes(&mut guard, hashed)
    }

    fn apply_leaf_hashes(
        arena: &mut NodeArena,
        hashed: &[(usize, HashValue)],
    ) -> EngineResult<BatchOutcome> {
        let previous_root = arena.root;
        let mut positions = Vec::with_capacity(hashed.len());

        for (position, hash) in hashed {
            match arena.leaf_at_mut(*position) {
                Some(node) => {
                    node.data_hash = *hash;
                    positions.push(*position);
                }
                None => {
                    debug!(position = *position, "Skipping unknown leaf position");
                }
            }
        }

        if positions.is_empty() {
            return Err(EngineError::InvalidIndices(
                hashed.iter().map(|(position, _)| *position).collect(),
            ));
        }
        arena.recompute(now_millis());

        debug!(
            updated = positions.len(),
            root = %root_hex(arena.root),
            "Updated leaves"
        );

        Ok(BatchOutcome {
            previous_root,
            new_root: arena.root,
            positions,
            node_count: arena.nodes.len(),
        })
    }

    // ============================================
    // Autonomous cycles
    // ============================================

    fn run_background(&self, cycle: Cycle) {
        let changed = match cycle {
            Cycle::Transition => self.transition_cycle(true),
            Cycle::Integrity => self.integrity_sweep(true),
        };
        if changed > 0 {
            debug!(cycle = %cycle, transitions = changed, "Engine cycle applied transitions");
        }
    }

    /// Pick 1..=`max_transitions_per_cycle` leaves and step each through the
    /// state table. Returns the number of recorded transitions.
    pub fn run_transition_cycle(&self) -> usize {
        self.transition_cycle(false)
    }

    /// Compromise or recover leaves. Returns the number of recorded
    /// transitions.
    pub fn run_integrity_sweep(&self) -> usize {
        self.integrity_sweep(false)
    }

    fn transition_cycle(&self, background: bool) -> usize {
        let mut guard = self.arena.write();
        if background && !self.is_running() {
            return 0;
        }
        let arena = &mut *guard;

        let leaf_count = arena.leaf_order.len();
        if leaf_count == 0 {
            return 0;
        }

        let picks = arena
            .rng
            .gen_range(1..=self.config.max_transitions_per_cycle)
            .min(leaf_count);
        let now = now_millis();
        let mut changes = Vec::with_capacity(picks);

        for _ in 0..picks {
            let position = arena.rng.gen_range(0..leaf_count);
            let draw: f64 = arena.rng.gen();
            let Some(node) = arena.nodes.get_mut(&arena.leaf_order[position]) else {
                continue;
            };

            let from = node.state;
            let to = next_state(from, draw);
            if to == from {
                continue;
            }
            let previous_hash = node.enter(to, now);
            changes.push(PendingChange {
                node_id: node.node_id.clone(),
                from,
                to,
                previous_hash,
                new_hash: node.data_hash,
                reason: reasons::AUTONOMOUS_CYCLE,
            });
        }

        self.commit(arena, changes, now)
    }

    fn integrity_sweep(&self, background: bool) -> usize {
        let mut guard = self.arena.write();
        if background && !self.is_running() {
            return 0;
        }
        let arena = &mut *guard;
        let now = now_millis();
        let mut changes = Vec::new();

        for node_id in &arena.leaf_order {
            let roll: f64 = arena.rng.gen();
            let Some(node) = arena.nodes.get_mut(node_id) else {
                continue;
            };
            let from = node.state;

            if roll < self.config.compromise_rate {
                if from == NodeState::Compromised {
                    continue;
                }
                let previous_hash = node.enter(NodeState::Compromised, now);
                node.integrity_valid = false;
                changes.push(PendingChange {
                    node_id: node_id.clone(),
                    from,
                    to: NodeState::Compromised,
                    previous_hash,
                    new_hash: node.data_hash,
                    reason: reasons::INTEGRITY_COMPROMISED,
                });
            } else if from == NodeState::Compromised
                && arena.rng.gen::<f64>() < self.config.recovery_rate
            {
                let previous_hash = node.enter(NodeState::Valid, now);
                node.integrity_valid = true;
                changes.push(PendingChange {
                    node_id: node_id.clone(),
                    from,
                    to: NodeState::Valid,
                    previous_hash,
                    new_hash: node.data_hash,
                    reason: reasons::INTEGRITY_RECOVERED,
                });
            }
        }

        self.commit(arena, changes, now)
    }

    /// Refresh the root if any hash moved, then append one record per change.
    fn commit(&self, arena: &mut NodeArena, changes: Vec<PendingChange>, now: u64) -> usize {
        if changes.is_empty() {
            return 0;
        }
        if changes.iter().any(|c| c.previous_hash != c.new_hash) {
            arena.recompute(now);
        }

        let count = changes.len();
        let mut log = self.transitions.write();
        for change in changes {
            let mut affected_node_ids = vec![change.node_id.clone()];
            if change.previous_hash != change.new_hash {
                affected_node_ids.extend(arena.ancestors(&change.node_id));
            }
            log.push(DynamicTransition {
                transition_id: Uuid::new_v4(),
                sequence: self.next_sequence(),
                node_id: change.node_id,
                from_state: change.from,
                to_state: change.to,
                timestamp: now,
                reason: change.reason.to_string(),
                previous_hash: change.previous_hash,
                new_hash: change.new_hash,
                affected_node_ids,
            });
        }
        count
    }

    // ============================================
    // Queries
    // ============================================

    pub fn verify_integrity(&self) -> IntegrityReport {
        let arena = self.arena.read();
        let compromised_count = arena.count_in(NodeState::Compromised);
        IntegrityReport {
            is_valid: compromised_count == 0,
            compromised_count,
            total_nodes: arena.nodes.len(),
            root_hash: root_hex(arena.root),
        }
    }

    pub fn get_stats(&self) -> EngineStats {
        let arena = self.arena.read();
        EngineStats {
            total_nodes: arena.nodes.len(),
            leaf_count: arena.leaf_order.len(),
            valid_nodes: arena.count_in(NodeState::Valid),
            decoy_nodes: arena.count_in(NodeState::Decoy),
            transitioning_nodes: arena.count_in(NodeState::Transitioning),
            compromised_nodes: arena.count_in(NodeState::Compromised),
            total_transitions: self.transitions.read().len(),
            root_hash: root_hex(arena.root),
            running: self.is_running(),
        }
    }

    pub fn root(&self) -> Option<HashValue> {
        self.arena.read().root
    }

    pub fn root_hex(&self) -> String {
        root_hex(self.root())
    }

    pub fn leaf_count(&self) -> usize {
        self.arena.read().leaf_order.len()
    }

    pub fn node_count(&self) -> usize {
        self.arena.read().nodes.len()
    }

    /// Leaf hashes in leaf order.
    pub fn leaf_hashes(&self) -> Vec<HashValue> {
        self.arena.read().leaf_hashes()
    }

    pub fn leaf_ids(&self) -> Vec<NodeId> {
        self.arena.read().leaf_order.clone()
    }

    pub fn node(&self, node_id: &str) -> Option<DynamicNode> {
        self.arena.read().nodes.get(node_id).cloned()
    }

    /// Copy of every node, leaves first in leaf order, then internal nodes by id.
    pub fn nodes(&self) -> Vec<DynamicNode> {
        let arena = self.arena.read();
        let mut out: Vec<DynamicNode> = arena
            .leaf_order
            .iter()
            .filter_map(|id| arena.nodes.get(id).cloned())
            .collect();
        let mut internal: Vec<DynamicNode> = arena
            .nodes
            .values()
            .filter(|n| !n.is_leaf())
            .cloned()
            .collect();
        internal.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        out.extend(internal);
        out
    }

    pub fn transitions(&self) -> Vec<DynamicTransition> {
        self.transitions.read().clone()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.read().len()
    }

    pub fn get_proof(&self, leaf_position: usize) -> EngineResult<DynamicProof> {
        let arena = self.arena.read();
        let size = arena.leaf_order.len();
        if size == 0 {
            return Err(MerkleError::EmptyInput.into());
        }
        if leaf_position >= size {
            return Err(MerkleError::InvalidIndex {
                index: leaf_position,
                size,
            }
            .into());
        }

        let levels = build_levels(arena.leaf_hashes(), sha256_pair);
        let leaf_hash = levels[0][leaf_position];
        let root = levels
            .last()
            .and_then(|top| top.first().copied())
            .ok_or(MerkleError::EmptyInput)?;

        Ok(DynamicProof {
            leaf_position,
            node_id: arena.leaf_order[leaf_position].clone(),
            leaf_hash,
            steps: proof_steps(&levels, leaf_position),
            root,
        })
    }

    pub fn get_proof_for_node(&self, node_id: &str) -> EngineResult<DynamicProof> {
        let position = self
            .arena
            .read()
            .leaf_position(node_id)
            .ok_or_else(|| EngineError::NodeNotFound(node_id.to_string()))?;
        self.get_proof(position)
    }

    /// `true` when `proof` folds to the current root.
    pub fn verify_proof(&self, proof: &DynamicProof) -> bool {
        match self.root() {
            Some(root) => proof.verify_against(&root),
            None => false,
        }
    }
}

impl fmt::Debug for DynamicMerkleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicMerkleEngine")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Hex of `root`, empty for an empty tree.
pub fn root_hex(root: Option<HashValue>) -> String {
    root.map(|r| r.to_hex()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use squid_merkle::compute_root;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    }

    fn values(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| format!("value_{}", i).into_bytes()).collect()
    }

    fn engine(n: usize) -> DynamicMerkleEngine {
        DynamicMerkleEngine::with_leaves(EngineConfig::default().with_seed(11), &values(n)).unwrap()
    }

    fn fresh_root(engine: &DynamicMerkleEngine) -> Option<HashValue> {
        compute_root(&engine.leaf_hashes(), sha256_pair)
    }

    #[test]
    fn test_add_leaves() {
        init_tracing();
        let engine = engine(0);
        assert!(engine.root().is_none());

        let outcome = engine.add_leaves(&values(8)).unwrap();
        assert!(outcome.previous_root.is_none());
        assert_eq!(outcome.new_root, fresh_root(&engine));
        assert_eq!(outcome.positions, (0..8).collect::<Vec<_>>());
        assert_eq!(outcome.node_count, 8 + 4 + 2 + 1);
        assert_eq!(engine.leaf_count(), 8);

        // Leaf hashes are plain SHA-256 of the values
        assert_eq!(engine.leaf_hashes()[3], sha256(&[b"value_3"]));
    }

    #[test]
    fn test_empty_batch_leaves_root_unchanged() {
        let engine = engine(4);
        let before = engine.root();
        let empty: Vec<Vec<u8>> = Vec::new();

        assert!(matches!(engine.add_leaves(&empty), Err(EngineError::EmptyBatch)));
        assert!(matches!(
            engine.update_leaves(&BTreeMap::new()),
            Err(EngineError::EmptyBatch)
        ));
        assert!(matches!(engine.rotate_by_indices(&[]), Err(EngineError::EmptyBatch)));
        assert_eq!(engine.root(), before);
    }

    #[test]
    fn test_decoy_ratio_bounds() {
        let all_decoy = EngineConfig {
            decoy_ratio: 1.0,
            ..EngineConfig::default().with_seed(3)
        };
        let engine = DynamicMerkleEngine::with_leaves(all_decoy, &values(16)).unwrap();
        assert_eq!(engine.get_stats().decoy_nodes, 16);

        let none = EngineConfig {
            decoy_ratio: 0.0,
            ..EngineConfig::default().with_seed(3)
        };
        let engine = DynamicMerkleEngine::with_leaves(none, &values(16)).unwrap();
        assert_eq!(engine.get_stats().decoy_nodes, 0);
    }

    #[test]
    fn test_update_leaf() {
        let engine = engine(5);
        let before = engine.root();

        assert!(engine.update_leaf("leaf_2", b"replacement"));
        assert_eq!(engine.leaf_hashes()[2], sha256(&[b"replacement"]));
        assert_ne!(engine.root(), before);
        assert_eq!(engine.root(), fresh_root(&engine));

        let after = engine.root();
        assert!(!engine.update_leaf("node_L0_0", b"x"));
        assert!(!engine.update_leaf("leaf_99", b"x"));
        assert_eq!(engine.root(), after);
    }

    #[test]
    fn test_update_leaves_skips_unknown_positions() {
        let engine = engine(4);
        let mut updates = BTreeMap::new();
        updates.insert(1, b"one".to_vec());
        updates.insert(9, b"nine".to_vec());

        let outcome = engine.update_leaves(&updates).unwrap();
        assert_eq!(outcome.positions, vec![1]);
        assert_eq!(engine.root(), fresh_root(&engine));

        let mut bad = BTreeMap::new();
        bad.insert(7, b"x".to_vec());
        bad.insert(8, b"y".to_vec());
        let before = engine.root();
        match engine.update_leaves(&bad) {
            Err(EngineError::InvalidIndices(indices)) => assert_eq!(indices, vec![7, 8]),
            other => panic!("expected InvalidIndices, got {:?}", other),
        }
        assert_eq!(engine.root(), before);
    }

    #[test]
    fn test_rotate_by_indices() {
        let engine = engine(8);
        let before = engine.leaf_hashes();

        let outcome = engine.rotate_by_indices(&[2, 0, 2]).unwrap();
        assert_eq!(outcome.positions, vec![0, 2]);
        assert_ne!(outcome.previous_root, outcome.new_root);

        let after = engine.leaf_hashes();
        assert_ne!(after[0], before[0]);
        assert_ne!(after[2], before[2]);
        assert_eq!(after[1], before[1]);

        assert!(matches!(
            engine.rotate_by_indices(&[100]),
            Err(EngineError::InvalidIndices(_))
        ));
    }

    #[test]
    fn test_rotate_all_is_keyed() {
        let a = engine(6);
        let b = engine(6);
        a.rotate_all(b"key-one").unwrap();
        b.rotate_all(b"key-one").unwrap();
        assert_eq!(a.leaf_hashes(), b.leaf_hashes());

        let outcome = b.rotate_all(b"key-two").unwrap();
        assert_eq!(outcome.positions.len(), 6);
        assert_ne!(a.root(), b.root());

        let expected = derive_rotation_value(b"key-two", 4).unwrap();
        assert_eq!(b.leaf_hashes()[4], sha256(&[&expected]));

        assert!(matches!(engine(0).rotate_all(b"k"), Err(EngineError::EmptyBatch)));
    }

    #[test]
    fn test_transition_counts_match_log() {
        init_tracing();
        let engine = engine(12);
        for _ in 0..200 {
            engine.run_transition_cycle();
            engine.run_integrity_sweep();
        }

        let nodes = engine.nodes();
        let total: u64 = nodes.iter().map(|n| n.transition_count).sum();
        assert_eq!(total as usize, engine.transition_count());
        assert!(engine.transition_count() > 0);

        // Internal nodes never change state
        assert!(nodes
            .iter()
            .filter(|n| !n.is_leaf())
            .all(|n| n.state == NodeState::Valid && n.transition_count == 0));

        assert_eq!(engine.root(), fresh_root(&engine));
    }

    #[test]
    fn test_transition_records() {
        let engine = engine(8);
        for _ in 0..100 {
            engine.run_transition_cycle();
        }
        let log = engine.transitions();
        assert!(!log.is_empty());

        for pair in log.windows(2) {
            assert!(pair[0].sequence < pair[1].sequence);
        }
        for t in &log {
            assert_ne!(t.from_state, t.to_state);
            assert_eq!(t.affected_node_ids[0], t.node_id);
            if t.to_state.restamps_hash() {
                assert_eq!(t.new_hash, sha256(&[t.previous_hash.as_bytes(), t.to_state.as_str().as_bytes()]));
                // leaf, three levels of internal nodes
                assert_eq!(t.affected_node_ids.len(), 4);
            } else {
                assert_eq!(t.new_hash, t.previous_hash);
                assert_eq!(t.affected_node_ids.len(), 1);
            }
        }
    }

    #[test]
    fn test_integrity_report_matches_compromised() {
        let config = EngineConfig {
            compromise_rate: 1.0,
            ..EngineConfig::default().with_seed(5)
        };
        let engine = DynamicMerkleEngine::with_leaves(config, &values(6)).unwrap();
        assert!(engine.verify_integrity().is_valid);

        assert_eq!(engine.run_integrity_sweep(), 6);
        let report = engine.verify_integrity();
        assert!(!report.is_valid);
        assert_eq!(report.compromised_count, 6);
        assert_eq!(report.compromised_count, engine.get_stats().compromised_nodes);
        assert!(engine.nodes().iter().filter(|n| n.is_leaf()).all(|n| !n.integrity_valid));

        // Already compromised leaves produce no new records
        assert_eq!(engine.run_integrity_sweep(), 0);
        // and the transition cycle never moves them
        for _ in 0..20 {
            assert_eq!(engine.run_transition_cycle(), 0);
        }
    }

    #[test]
    fn test_recovery() {
        let config = EngineConfig {
            compromise_rate: 0.5,
            recovery_rate: 1.0,
            ..EngineConfig::default().with_seed(9)
        };
        let engine = DynamicMerkleEngine::with_leaves(config, &values(3)).unwrap();
        for _ in 0..50 {
            engine.run_integrity_sweep();
        }

        let log = engine.transitions();
        let recovered: Vec<_> = log
            .iter()
            .filter(|t| t.reason == reasons::INTEGRITY_RECOVERED)
            .collect();
        assert!(!recovered.is_empty());
        for t in recovered {
            assert_eq!(t.from_state, NodeState::Compromised);
            assert_eq!(t.to_state, NodeState::Valid);
            assert_eq!(t.previous_hash, t.new_hash);
        }

        let stats = engine.get_stats();
        let leaves: Vec<_> = engine.nodes().into_iter().filter(|n| n.is_leaf()).collect();
        assert_eq!(
            leaves.iter().filter(|n| !n.integrity_valid).count(),
            stats.compromised_nodes
        );
        assert_eq!(engine.root(), fresh_root(&engine));
    }

    #[test]
    fn test_proofs_against_current_root() {
        let engine = engine(7);
        for position in 0..7 {
            let proof = engine.get_proof(position).unwrap();
            assert!(engine.verify_proof(&proof));
            assert_eq!(Some(proof.root), engine.root());
        }

        let stale = engine.get_proof(6).unwrap();
        engine.update_leaf("leaf_0", b"changed");
        assert!(!engine.verify_proof(&stale));
        assert!(stale.verify_against(&stale.root));

        let by_id = engine.get_proof_for_node("leaf_6").unwrap();
        assert_eq!(by_id.leaf_position, 6);
        assert!(engine.verify_proof(&by_id));

        assert!(matches!(
            engine.get_proof(7),
            Err(EngineError::Merkle(MerkleError::InvalidIndex { index: 7, size: 7 }))
        ));
        assert!(matches!(
            engine.get_proof_for_node("node_L0_0"),
            Err(EngineError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_capacity() {
        let engine = engine(0);
        let too_many = vec![vec![0u8]; MAX_LEAVES as usize + 1];
        assert!(matches!(
            engine.add_leaves(&too_many),
            Err(EngineError::CapacityExceeded { .. })
        ));
        assert_eq!(engine.leaf_count(), 0);
    }
}
