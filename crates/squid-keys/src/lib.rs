// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! SQUID key material.
//!
//! This crate provides:
//! - Hierarchical HKDF-SHA256 derivation of `b^m` leaves from one secret
//! - The `KemSignatureService` boundary and a local Ed25519 stand-in

// Suppress warning from zeroize macro
#![allow(unused_assignments)]

pub mod error;
pub mod hkdf_tree;
pub mod kem;

pub use error::{DerivationError, KeyError, KeyResult};
pub use hkdf_tree::{
    derive_branch_key, derive_leaf, derive_leaves, derive_rotation_value, expand, extract,
    index_to_path, shannon_entropy,
};
pub use kem::{KemOutput, KemSignatureService, LocalEd25519Kem};
