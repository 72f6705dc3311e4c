// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! Arena nodes and the per-leaf state table.

use serde::{Deserialize, Serialize};
use squid_merkle::{sha256, HashValue};
use squid_types::{NodeId, NodeState};

/// A node of the dynamic tree.
///
/// Leaves carry caller data hashes and move through the state machine.
/// Internal nodes aggregate their children and stay VALID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicNode {
    pub node_id: NodeId,
    pub parent_id: Option<NodeId>,
    pub children_ids: Vec<NodeId>,
    pub data_hash: HashValue,
    pub state: NodeState,
    pub previous_state: Option<NodeState>,
    pub integrity_valid: bool,
    /// Epoch milliseconds of the last state change, or of creation.
    pub last_transition_time: u64,
    pub transition_count: u64,
}

impl DynamicNode {
    pub fn leaf(node_id: NodeId, data_hash: HashValue, state: NodeState, now: u64) -> Self {
        Self {
            node_id,
            parent_id: None,
            children_ids: Vec::new(),
            data_hash,
            state,
            previous_state: None,
            integrity_valid: true,
            last_transition_time: now,
            transition_count: 0,
        }
    }

    pub fn internal(node_id: NodeId, children_ids: Vec<NodeId>, data_hash: HashValue, now: u64) -> Self {
        Self {
            node_id,
            parent_id: None,
            children_ids,
            data_hash,
            state: NodeState::Valid,
            previous_state: None,
            integrity_valid: true,
            last_transition_time: now,
            transition_count: 0,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children_ids.is_empty()
    }

    /// Move to `to`, restamping the hash for DECOY and COMPROMISED.
    /// Returns the hash held before the move.
    pub(crate) fn enter(&mut self, to: NodeState, now: u64) -> HashValue {
        let previous_hash = self.data_hash;
        if to.restamps_hash() {
            self.data_hash = restamp(&self.data_hash, to);
        }
        self.previous_state = Some(self.state);
        self.state = to;
        self.last_transition_time = now;
        self.transition_count += 1;
        previous_hash
    }
}

/// `SHA-256(hash || STATE_NAME)`
pub fn restamp(hash: &HashValue, state: NodeState) -> HashValue {
    sha256(&[hash.as_bytes(), state.as_str().as_bytes()])
}

/// Next state for a leaf given a uniform draw in `[0, 1)`.
///
/// | from | to |
/// |---|---|
/// | VALID | VALID 60%, DECOY 30%, TRANSITIONING 10% |
/// | DECOY | DECOY 50%, VALID 40%, TRANSITIONING 10% |
/// | TRANSITIONING | VALID 50%, DECOY 50% |
/// | COMPROMISED | COMPROMISED |
pub fn next_state(state: NodeState, draw: f64) -> NodeState {
    match state {
        NodeState::Valid => {
            if draw < 0.6 {
                NodeState::Valid
            } else if draw < 0.9 {
                NodeState::Decoy
            } else {
                NodeState::Transitioning
            }
        }
        NodeState::Decoy => {
            if draw < 0.5 {
                NodeState::Decoy
            } else if draw < 0.9 {
                NodeState::Valid
            } else {
                NodeState::Transitioning
            }
        }
        NodeState::Transitioning => {
            if draw < 0.5 {
                NodeState::Valid
            } else {
                NodeState::Decoy
            }
        }
        NodeState::Compromised => NodeState::Compromised,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_table() {
        assert_eq!(next_state(NodeState::Valid, 0.0), NodeState::Valid);
        assert_eq!(next_state(NodeState::Valid, 0.59), NodeState::Valid);
        assert_eq!(next_state(NodeState::Valid, 0.6), NodeState::Decoy);
        assert_eq!(next_state(NodeState::Valid, 0.95), NodeState::Transitioning);

        assert_eq!(next_state(NodeState::Decoy, 0.3), NodeState::Decoy);
        assert_eq!(next_state(NodeState::Decoy, 0.7), NodeState::Valid);
        assert_eq!(next_state(NodeState::Decoy, 0.99), NodeState::Transitioning);

        assert_eq!(next_state(NodeState::Transitioning, 0.1), NodeState::Valid);
        assert_eq!(next_state(NodeState::Transitioning, 0.5), NodeState::Decoy);

        for draw in [0.0, 0.5, 0.999] {
            assert_eq!(next_state(NodeState::Compromised, draw), NodeState::Compromised);
        }
    }

    #[test]
    fn test_transitioning_is_always_left() {
        for i in 0..100 {
            let draw = i as f64 / 100.0;
            assert_ne!(next_state(NodeState::Transitioning, draw), NodeState::Transitioning);
        }
    }

    #[test]
    fn test_enter_restamps_only_decoy_and_compromised() {
        let hash = sha256(&[b"leaf"]);
        let mut node = DynamicNode::leaf("leaf_0".to_string(), hash, NodeState::Valid, 1);

        let before = node.enter(NodeState::Decoy, 2);
        assert_eq!(before, hash);
        assert_eq!(node.data_hash, sha256(&[hash.as_bytes(), b"DECOY"]));
        assert_eq!(node.previous_state, Some(NodeState::Valid));
        assert_eq!(node.transition_count, 1);
        assert_eq!(node.last_transition_time, 2);

        let decoy_hash = node.data_hash;
        node.enter(NodeState::Transitioning, 3);
        assert_eq!(node.data_hash, decoy_hash);
        node.enter(NodeState::Valid, 4);
        assert_eq!(node.data_hash, decoy_hash);
        assert_eq!(node.transition_count, 3);
    }

    #[test]
    fn test_is_leaf() {
        let hash = sha256(&[b"x"]);
        let leaf = DynamicNode::leaf("leaf_0".to_string(), hash, NodeState::Valid, 0);
        let parent = DynamicNode::internal("node_L0_0".to_string(), vec!["leaf_0".to_string()], hash, 0);
        assert!(leaf.is_leaf());
        assert!(!parent.is_leaf());
    }
}
