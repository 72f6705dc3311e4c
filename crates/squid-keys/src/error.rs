// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! Error types for derivation and the KEM/signature boundary.

use squid_types::SquidError;
use thiserror::Error;

pub type KeyResult<T> = Result<T, KeyError>;

/// Errors that can occur during key operations.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Derivation failed: {0}")]
    Structural(String),

    #[error("Signature operation failed: {0}")]
    Signature(String),

    #[error("Decoding error: {0}")]
    Decoding(String),
}

/// Derivation errors share the key error taxonomy.
pub type DerivationError = KeyError;

impl From<SquidError> for KeyError {
    fn from(e: SquidError) -> Self {
        match e {
            SquidError::InvalidParameters(msg) => KeyError::InvalidParameters(msg),
            other => KeyError::Structural(other.to_string()),
        }
    }
}

impl From<KeyError> for SquidError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::InvalidParameters(msg) => SquidError::InvalidParameters(msg),
            other => SquidError::StructuralFailure(other.to_string()),
        }
    }
}
