// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

use squid_storage::StorageError;
use squid_types::SquidError;
use thiserror::Error;

pub type PolicyResult<T> = Result<T, PolicyError>;

#[derive(Error, Debug)]
pub enum PolicyError {
    /// The classifier could not produce a decision. Recovered by the fallback.
    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("History store error: {0}")]
    Storage(#[from] StorageError),
}

impl From<PolicyError> for SquidError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::InvalidParameters(msg) => SquidError::InvalidParameters(msg),
            PolicyError::Storage(err) => err.into(),
            other => SquidError::StructuralFailure(other.to_string()),
        }
    }
}
