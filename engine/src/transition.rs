// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! Transition records. Both kinds are immutable once appended to their log.

use serde::{Deserialize, Serialize};
use squid_merkle::HashValue;
use squid_types::{ExternalEventType, NodeId, NodeState};
use uuid::Uuid;

/// One autonomous state change of a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicTransition {
    pub transition_id: Uuid,
    pub sequence: u64,
    pub node_id: NodeId,
    pub from_state: NodeState,
    pub to_state: NodeState,
    pub timestamp: u64,
    pub reason: String,
    pub previous_hash: HashValue,
    pub new_hash: HashValue,
    /// The leaf, followed by every ancestor whose hash changed with it.
    pub affected_node_ids: Vec<NodeId>,
}

/// One caller-triggered structural change of the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalTransitionEvent {
    pub id: Uuid,
    pub sequence: u64,
    pub event_type: ExternalEventType,
    pub timestamp: u64,
    pub trigger_reason: String,
    /// Hex root before the change; empty for an empty tree.
    pub previous_root_hash: String,
    pub new_root_hash: String,
    pub node_count: usize,
    pub leaf_changed_count: usize,
    pub details: String,
}

pub(crate) mod reasons {
    pub const AUTONOMOUS_CYCLE: &str = "autonomous_cycle";
    pub const INTEGRITY_COMPROMISED: &str = "integrity_sweep_compromised";
    pub const INTEGRITY_RECOVERED: &str = "integrity_sweep_recovered";

    pub const DATA_INSERTION: &str = "Data insertion";
    pub const DATA_UPDATE: &str = "Data update";
    pub const ROTATE_INDICES: &str = "rotate_indices";
    pub const KEY_ROTATION: &str = "Security key rotation";
    pub const INTEGRITY_FAILED: &str = "Integrity verification detected compromised nodes";
}
