// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! Node arena behind the engine lock.
//!
//! Leaves are addressed by `leaf_{n}` in insertion order. Internal nodes are
//! named by position, `node_L{level}_{index}` with level 0 directly above the
//! leaves, so a grown tree reuses the ids of the positions it already had.
//! Nothing is ever removed.

use rand_chacha::ChaCha8Rng;
use squid_merkle::{build_levels, sha256_pair, HashValue};
use squid_types::{NodeId, NodeState};
use std::collections::HashMap;

use crate::node::DynamicNode;

pub(crate) struct NodeArena {
    pub(crate) nodes: HashMap<NodeId, DynamicNode>,
    pub(crate) leaf_order: Vec<NodeId>,
    pub(crate) root: Option<HashValue>,
    pub(crate) rng: ChaCha8Rng,
    next_leaf: u64,
}

impl NodeArena {
    pub(crate) fn new(rng: ChaCha8Rng) -> Self {
        Self {
            nodes: HashMap::new(),
            leaf_order: Vec::new(),
            root: None,
            rng,
            next_leaf: 0,
        }
    }

    /// Append a leaf without touching the root.
    pub(crate) fn push_leaf(&mut self, data_hash: HashValue, state: NodeState, now: u64) -> NodeId {
        let node_id = format!("leaf_{}", self.next_leaf);
        self.next_leaf += 1;
        self.nodes
            .insert(node_id.clone(), DynamicNode::leaf(node_id.clone(), data_hash, state, now));
        self.leaf_order.push(node_id.clone());
        node_id
    }

    pub(crate) fn leaf_hashes(&self) -> Vec<HashValue> {
        self.leaf_order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|node| node.data_hash)
            .collect()
    }

    pub(crate) fn leaf_at_mut(&mut self, position: usize) -> Option<&mut DynamicNode> {
        let node_id = self.leaf_order.get(position)?;
        self.nodes.get_mut(node_id)
    }

    pub(crate) fn leaf_position(&self, node_id: &str) -> Option<usize> {
        self.leaf_order.iter().position(|id| id == node_id)
    }

    /// Rebuild the internal levels and the root from the leaf hashes.
    pub(crate) fn recompute(&mut self, now: u64) {
        let levels = build_levels(self.leaf_hashes(), sha256_pair);
        self.root = levels.last().and_then(|top| top.first().copied());

        let mut below = self.leaf_order.clone();
        for (k, level) in levels.iter().enumerate().skip(1) {
            let mut ids = Vec::with_capacity(level.len());
            for (i, hash) in level.iter().enumerate() {
                let node_id = internal_id(k - 1, i);
                let end = (2 * i + 2).min(below.len());
                let children = below[2 * i..end].to_vec();

                for child in &children {
                    if let Some(node) = self.nodes.get_mut(child) {
                        node.parent_id = Some(node_id.clone());
                    }
                }

                match self.nodes.get_mut(&node_id) {
                    Some(node) => {
                        node.data_hash = *hash;
                        node.children_ids = children;
                    }
                    None => {
                        self.nodes.insert(
                            node_id.clone(),
                            DynamicNode::internal(node_id.clone(), children, *hash, now),
                        );
                    }
                }
                ids.push(node_id);
            }
            below = ids;
        }

        if let Some(top) = below.first() {
            if let Some(node) = self.nodes.get_mut(top) {
                node.parent_id = None;
            }
        }
    }

    /// Parent chain of `node_id`, nearest first.
    pub(crate) fn ancestors(&self, node_id: &str) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.nodes.get(node_id).and_then(|n| n.parent_id.clone());
        while let Some(id) = current {
            current = self.nodes.get(&id).and_then(|n| n.parent_id.clone());
            chain.push(id);
        }
        chain
    }

    pub(crate) fn count_in(&self, state: NodeState) -> usize {
        self.nodes.values().filter(|n| n.state == state).count()
    }
}

fn internal_id(level: usize, index: usize) -> NodeId {
    format!("node_L{}_{}", level, index)
}
