use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::SquidError;

/// Stable identifier of a node in the dynamic tree arena.
pub type NodeId = String;

/// Per-node state of the dynamic tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeState {
    Valid,
    Decoy,
    Transitioning,
    Compromised,
}

impl NodeState {
    pub const ALL: [NodeState; 4] = [
        NodeState::Valid,
        NodeState::Decoy,
        NodeState::Transitioning,
        NodeState::Compromised,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Valid => "VALID",
            NodeState::Decoy => "DECOY",
            NodeState::Transitioning => "TRANSITIONING",
            NodeState::Compromised => "COMPROMISED",
        }
    }

    /// Entering this state restamps the node hash.
    pub fn restamps_hash(&self) -> bool {
        matches!(self, NodeState::Decoy | NodeState::Compromised)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeState {
    type Err = SquidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "VALID" => Ok(NodeState::Valid),
            "DECOY" => Ok(NodeState::Decoy),
            "TRANSITIONING" => Ok(NodeState::Transitioning),
            "COMPROMISED" => Ok(NodeState::Compromised),
            other => Err(SquidError::InvalidParameters(format!(
                "Unknown node state: {}",
                other
            ))),
        }
    }
}
