// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! Read-only view over both transition streams.
//!
//! Autonomous transitions and external events live in separate logs. They are
//! merged only when read, ordered by the sequence both logs draw from. Wall
//! clock timestamps are reported but never used for ordering.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use squid_types::{ExternalEventType, NodeId, NodeState, SquidError};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::engine::{DynamicMerkleEngine, EngineStats};
use crate::transition::{DynamicTransition, ExternalTransitionEvent};

/// Entries returned by `get_audit_trail` in its `recent` list.
pub const AUDIT_TRAIL_RECENT: usize = 50;

const AUTONOMOUS_PREFIX: &str = "AUTONOMOUS_";

/// `AUTONOMOUS_<STATE>` for engine transitions, or one of the external types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AuditEventType {
    Autonomous(NodeState),
    External(ExternalEventType),
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEventType::Autonomous(state) => write!(f, "{}{}", AUTONOMOUS_PREFIX, state),
            AuditEventType::External(kind) => f.write_str(kind.as_str()),
        }
    }
}

impl FromStr for AuditEventType {
    type Err = SquidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(AUTONOMOUS_PREFIX) {
            Some(state) => Ok(AuditEventType::Autonomous(state.parse()?)),
            None => Ok(AuditEventType::External(s.parse()?)),
        }
    }
}

impl From<AuditEventType> for String {
    fn from(t: AuditEventType) -> Self {
        t.to_string()
    }
}

impl TryFrom<String> for AuditEventType {
    type Error = SquidError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// One entry of the merged history.
///
/// For autonomous entries the hashes are the leaf hashes around the change;
/// for external entries they are the tree roots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub sequence: u64,
    pub timestamp: u64,
    pub event_type: AuditEventType,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_state: Option<NodeState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_state: Option<NodeState>,
    pub previous_hash: String,
    pub new_hash: String,
    #[serde(default)]
    pub affected_node_ids: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_changed_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&DynamicTransition> for AuditEntry {
    fn from(t: &DynamicTransition) -> Self {
        Self {
            id: t.transition_id,
            sequence: t.sequence,
            timestamp: t.timestamp,
            event_type: AuditEventType::Autonomous(t.to_state),
            reason: t.reason.clone(),
            node_id: Some(t.node_id.clone()),
            from_state: Some(t.from_state),
            to_state: Some(t.to_state),
            previous_hash: t.previous_hash.to_hex(),
            new_hash: t.new_hash.to_hex(),
            affected_node_ids: t.affected_node_ids.clone(),
            node_count: None,
            leaf_changed_count: None,
            details: None,
        }
    }
}

impl From<&ExternalTransitionEvent> for AuditEntry {
    fn from(e: &ExternalTransitionEvent) -> Self {
        Self {
            id: e.id,
            sequence: e.sequence,
            timestamp: e.timestamp,
            event_type: AuditEventType::External(e.event_type),
            reason: e.trigger_reason.clone(),
            node_id: None,
            from_state: None,
            to_state: None,
            previous_hash: e.previous_root_hash.clone(),
            new_hash: e.new_root_hash.clone(),
            affected_node_ids: Vec::new(),
            node_count: Some(e.node_count),
            leaf_changed_count: Some(e.leaf_changed_count),
            details: Some(e.details.clone()),
        }
    }
}

/// Merge both streams into one list in decision order.
pub fn merge(transitions: &[DynamicTransition], external: &[ExternalTransitionEvent]) -> Vec<AuditEntry> {
    let mut entries: Vec<AuditEntry> = transitions
        .iter()
        .map(AuditEntry::from)
        .chain(external.iter().map(AuditEntry::from))
        .collect();
    entries.sort_by_key(|e| e.sequence);
    entries
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub total_transitions: usize,
    /// Entry count per event type name. Types with no entries are absent.
    pub transition_counts: BTreeMap<String, usize>,
    pub recent: Vec<AuditEntry>,
    pub status: EngineStats,
}

/// Queryable history of one engine and its external event log.
#[derive(Clone)]
pub struct TransitionAudit {
    engine: Arc<DynamicMerkleEngine>,
    external: Arc<RwLock<Vec<ExternalTransitionEvent>>>,
}

impl TransitionAudit {
    pub fn new(
        engine: Arc<DynamicMerkleEngine>,
        external: Arc<RwLock<Vec<ExternalTransitionEvent>>>,
    ) -> Self {
        Self { engine, external }
    }

    pub fn get_history(&self) -> Vec<AuditEntry> {
        let transitions = self.engine.transitions();
        let external = self.external.read().clone();
        merge(&transitions, &external)
    }

    /// The last `n` entries, oldest first.
    pub fn get_recent(&self, n: usize) -> Vec<AuditEntry> {
        let mut history = self.get_history();
        let skip = history.len().saturating_sub(n);
        history.split_off(skip)
    }

    pub fn get_by_type(&self, event_type: AuditEventType) -> Vec<AuditEntry> {
        self.get_history()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    pub fn get_audit_trail(&self) -> AuditTrail {
        let mut history = self.get_history();

        let mut transition_counts = BTreeMap::new();
        for entry in &history {
            *transition_counts.entry(entry.event_type.to_string()).or_insert(0) += 1;
        }

        let total_transitions = history.len();
        let recent = history.split_off(total_transitions.saturating_sub(AUDIT_TRAIL_RECENT));

        AuditTrail {
            total_transitions,
            transition_counts,
            recent,
            status: self.engine.get_stats(),
        }
    }
}
