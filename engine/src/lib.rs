// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! Dynamic Merkle engine for SQUID.
//!
//! A long-lived tree of nodes that re-states its own leaves over time:
//!
//! ```text
//!  DynamicMerkleService ── add / update / rotate / verify
//!      │                         │
//!      ▼                         ▼
//!  DynamicMerkleEngine       external event log
//!    RwLock<NodeArena>           │
//!    transition log              │
//!    ├─ transition cycle (task)  │
//!    └─ integrity sweep  (task)  │
//!      │                         │
//!      └──────► TransitionAudit ◄┘
//! ```

mod arena;
pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod node;
pub mod service;
pub mod transition;

pub use audit::{merge, AuditEntry, AuditEventType, AuditTrail, TransitionAudit, AUDIT_TRAIL_RECENT};
pub use config::EngineConfig;
pub use engine::{root_hex, BatchOutcome, DynamicMerkleEngine, DynamicProof, EngineStats, IntegrityReport};
pub use error::{EngineError, EngineResult};
pub use node::{next_state, restamp, DynamicNode};
pub use service::DynamicMerkleService;
pub use transition::{DynamicTransition, ExternalTransitionEvent};
