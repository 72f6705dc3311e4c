// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

use squid_keys::KeyError;
use squid_merkle::MerkleError;
use squid_types::SquidError;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Empty batch")]
    EmptyBatch,

    /// None of the requested leaf positions exist.
    #[error("No valid leaf indices in {0:?}")]
    InvalidIndices(Vec<usize>),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Leaf capacity exceeded: {requested} > {max}")]
    CapacityExceeded { requested: usize, max: u64 },

    #[error("Merkle error: {0}")]
    Merkle(#[from] MerkleError),

    #[error("Key derivation failed: {0}")]
    Derivation(#[from] KeyError),
}

impl From<EngineError> for SquidError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::EmptyBatch => SquidError::EmptyBatch,
            EngineError::InvalidIndices(indices) => SquidError::InvalidIndices(indices),
            other @ EngineError::CapacityExceeded { .. } => {
                SquidError::InvalidParameters(other.to_string())
            }
            EngineError::Merkle(err) => err.into(),
            EngineError::Derivation(err) => err.into(),
            other => SquidError::StructuralFailure(other.to_string()),
        }
    }
}
