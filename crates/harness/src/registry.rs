//! Static description of the cluster under test.

use std::collections::BTreeMap;

use alloy_core::primitives::Address;
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{HarnessError, HarnessResult, config::NodeConfig};

/// 1-based identity of a node in the cluster.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    From,
)]
#[display("node{_0}")]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(&self) -> u32 {
        self.0
    }
}

/// Everything the harness knows about one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub id: NodeId,
    pub rpc_endpoint: Url,
    pub account: Address,
    /// Private-transaction manager key, absent on nodes that cannot take part
    /// in private transactions.
    pub recipient_key: Option<String>,
}

impl NodeDescriptor {
    /// The recipient key, or a configuration error naming the node.
    pub fn require_recipient_key(&self) -> HarnessResult<&str> {
        self.recipient_key.as_deref().ok_or_else(|| {
            HarnessError::config(format!("{} has no private-transaction recipient key", self.id))
        })
    }
}

/// Keyed lookup table of the cluster's nodes, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRegistry {
    nodes: BTreeMap<NodeId, NodeDescriptor>,
}

impl ClusterRegistry {
    /// Build a registry, rejecting empty clusters, duplicate indexes and
    /// index ranges that are not exactly `1..=n`.
    pub fn new(nodes: impl IntoIterator<Item = NodeDescriptor>) -> HarnessResult<Self> {
        let mut map = BTreeMap::new();
        for node in nodes {
            if node.id.index() == 0 {
                return Err(HarnessError::config("node indexes start at 1"));
            }
            let id = node.id;
            if map.insert(id, node).is_some() {
                return Err(HarnessError::config(format!("{} is configured twice", id)));
            }
        }

        if map.is_empty() {
            return Err(HarnessError::config("cluster has no nodes"));
        }

        let count = map.len() as u32;
        if let Some(missing) = (1..=count).map(NodeId::new).find(|id| !map.contains_key(id)) {
            return Err(HarnessError::config(format!(
                "node indexes must be contiguous from 1 to {}, {} is missing",
                count, missing
            )));
        }

        Ok(Self { nodes: map })
    }

    pub fn from_configs(configs: &[NodeConfig]) -> HarnessResult<Self> {
        let nodes = configs
            .iter()
            .map(|cfg| {
                let rpc_endpoint = Url::parse(&cfg.rpc_url).map_err(|e| {
                    HarnessError::config(format!(
                        "node{} has an invalid rpc_url '{}': {}",
                        cfg.index, cfg.rpc_url, e
                    ))
                })?;
                Ok(NodeDescriptor {
                    id: NodeId::new(cfg.index),
                    rpc_endpoint,
                    account: cfg.account,
                    recipient_key: cfg.recipient_key.clone(),
                })
            })
            .collect::<HarnessResult<Vec<_>>>()?;

        Self::new(nodes)
    }

    pub fn node(&self, id: NodeId) -> HarnessResult<&NodeDescriptor> {
        self.nodes.get(&id).ok_or_else(|| {
            HarnessError::config(format!(
                "{} is out of range, the cluster has {} nodes",
                id,
                self.node_count()
            ))
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All node ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Every node except `id`, ascending.
    pub fn others(&self, id: NodeId) -> impl Iterator<Item = &NodeDescriptor> + '_ {
        self.nodes.values().filter(move |node| node.id != id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeDescriptor> + '_ {
        self.nodes.values()
    }
}
