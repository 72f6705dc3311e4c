//! Leaf types shared by derivation, policy and the generation pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::SquidError;

/// Upper bound on `b^m`. Keeps a single derivation run in memory.
pub const MAX_LEAVES: u64 = 262_144;

/// One HMAC-SHA256 block per leaf.
pub const MAX_LEAF_BITS: u32 = 256;

/// Tree shape parameters: branching factor `b`, depth `m`, leaf bits `t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchingParams {
    pub b: u32,
    pub m: u32,
    pub t: u32,
}

impl BranchingParams {
    pub fn new(b: u32, m: u32, t: u32) -> Self {
        Self { b, m, t }
    }

    /// Total leaf count `b^m`, or `None` when it overflows `u64`.
    pub fn leaf_count(&self) -> Option<u64> {
        (self.b as u64).checked_pow(self.m)
    }

    /// Validate against the in-memory bounds.
    pub fn validate(&self) -> Result<u64, SquidError> {
        if self.b < 1 || self.m < 1 || self.t < 1 {
            return Err(SquidError::InvalidParameters(format!(
                "b, m and t must be >= 1 (got b={}, m={}, t={})",
                self.b, self.m, self.t
            )));
        }
        if self.t > MAX_LEAF_BITS {
            return Err(SquidError::InvalidParameters(format!(
                "t={} exceeds {} bits",
                self.t, MAX_LEAF_BITS
            )));
        }
        match self.leaf_count() {
            Some(n) if n <= MAX_LEAVES => Ok(n),
            _ => Err(SquidError::InvalidParameters(format!(
                "{}^{} leaves exceeds the cap of {}",
                self.b, self.m, MAX_LEAVES
            ))),
        }
    }
}

impl Default for BranchingParams {
    fn default() -> Self {
        Self { b: 4, m: 3, t: 128 }
    }
}

/// One deterministically derived leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafRecord {
    pub index: u32,
    /// Base-`b` digits of `index`, most significant first.
    pub path: Vec<u32>,
    pub value: Vec<u8>,
    pub depth: u32,
    /// Shannon byte entropy (log2) of the value at derivation time.
    pub entropy: f64,
}

/// Per-leaf outcome of the integrity/decoy policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LeafAction {
    Valid,
    Decoy,
    Mutate,
    Reassign,
}

impl LeafAction {
    pub const ALL: [LeafAction; 4] = [
        LeafAction::Valid,
        LeafAction::Decoy,
        LeafAction::Mutate,
        LeafAction::Reassign,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeafAction::Valid => "VALID",
            LeafAction::Decoy => "DECOY",
            LeafAction::Mutate => "MUTATE",
            LeafAction::Reassign => "REASSIGN",
        }
    }
}

impl fmt::Display for LeafAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeafAction {
    type Err = SquidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "VALID" => Ok(LeafAction::Valid),
            "DECOY" => Ok(LeafAction::Decoy),
            "MUTATE" => Ok(LeafAction::Mutate),
            "REASSIGN" => Ok(LeafAction::Reassign),
            other => Err(SquidError::InvalidParameters(format!(
                "Unknown leaf action: {}",
                other
            ))),
        }
    }
}
