// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

use squid_keys::KeyError;
use squid_merkle::MerkleError;
use squid_policy::PolicyError;
use squid_storage::StorageError;
use squid_types::SquidError;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Types(#[from] SquidError),

    /// KEM, signature or derivation failure.
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Merkle error: {0}")]
    Merkle(#[from] MerkleError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<CoreError> for SquidError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Types(err) => err,
            CoreError::Key(err) => err.into(),
            CoreError::Policy(err) => err.into(),
            CoreError::Merkle(err) => err.into(),
            CoreError::Storage(err) => err.into(),
        }
    }
}
