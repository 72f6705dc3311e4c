// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! SQUID generation pipeline.
//!
//! Ties the workspace together for one request: KEM encapsulation, HKDF root
//! key and model seed, hierarchical leaf derivation, the leaf policy, the
//! static Merkle tree and the root signature. Issued roots can be verified
//! later, and the latest one is kept for publication.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod response;

pub use config::{PipelineConfig, DEFAULT_MODEL_HASH, DEFAULT_SALT};
pub use error::{CoreError, CoreResult};
pub use pipeline::SquidCore;
pub use response::{
    ActionDistribution, AnalysisData, GenerateResponse, LeafDetail, PublishedRoot, VerifyResponse,
};
