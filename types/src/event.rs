//! Caller-triggered tree events and leaf transform history.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{LeafAction, SquidError};

/// Structural events triggered from outside the dynamic engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalEventType {
    AddLeaves,
    UpdateLeaves,
    KeyRotation,
    IntegrityCheckFailed,
}

impl ExternalEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExternalEventType::AddLeaves => "ADD_LEAVES",
            ExternalEventType::UpdateLeaves => "UPDATE_LEAVES",
            ExternalEventType::KeyRotation => "KEY_ROTATION",
            ExternalEventType::IntegrityCheckFailed => "INTEGRITY_CHECK_FAILED",
        }
    }
}

impl fmt::Display for ExternalEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExternalEventType {
    type Err = SquidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADD_LEAVES" => Ok(ExternalEventType::AddLeaves),
            "UPDATE_LEAVES" => Ok(ExternalEventType::UpdateLeaves),
            "KEY_ROTATION" => Ok(ExternalEventType::KeyRotation),
            "INTEGRITY_CHECK_FAILED" => Ok(ExternalEventType::IntegrityCheckFailed),
            other => Err(SquidError::InvalidParameters(format!(
                "Unknown event type: {}",
                other
            ))),
        }
    }
}

/// One applied leaf transform. Values are hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafHistoryEntry {
    pub index: u32,
    pub previous_value: String,
    pub new_value: String,
    pub action: LeafAction,
    pub timestamp: String,
}

impl LeafHistoryEntry {
    pub fn new(index: u32, previous: &[u8], current: &[u8], action: LeafAction) -> Self {
        Self {
            index,
            previous_value: hex::encode(previous),
            new_value: hex::encode(current),
            action,
            timestamp: crate::now_rfc3339(),
        }
    }
}
