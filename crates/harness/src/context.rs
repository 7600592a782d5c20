//! Shared, read-only state handed to every scenario.

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    HarnessError, HarnessResult,
    config::HarnessConfig,
    finality::FinalityPolicy,
    registry::{ClusterRegistry, NodeDescriptor, NodeId},
    rpc::{self, NodeClient},
};

/// Registry, per-node clients and timing, cloned cheaply into parallel tasks.
#[derive(Debug, Clone)]
pub struct HarnessContext {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: HarnessConfig,
    registry: ClusterRegistry,
    clients: BTreeMap<NodeId, NodeClient>,
    finality: FinalityPolicy,
}

impl HarnessContext {
    /// Validate `config` and build one client per configured node.
    pub fn new(config: HarnessConfig) -> HarnessResult<Self> {
        config.validate()?;
        let registry = ClusterRegistry::from_configs(&config.nodes)?;
        let http = rpc::create_client(config.timing.rpc_timeout())?;

        let clients = registry
            .iter()
            .map(|node| (node.id, NodeClient::for_node(node, http.clone())))
            .collect();
        let finality = FinalityPolicy::from(&config.timing);

        tracing::debug!(nodes = registry.node_count(), ?finality, "Harness context ready");

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                registry,
                clients,
                finality,
            }),
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &ClusterRegistry {
        &self.inner.registry
    }

    pub fn finality(&self) -> &FinalityPolicy {
        &self.inner.finality
    }

    pub fn node(&self, id: NodeId) -> HarnessResult<&NodeDescriptor> {
        self.inner.registry.node(id)
    }

    pub fn client(&self, id: NodeId) -> HarnessResult<&NodeClient> {
        self.inner
            .clients
            .get(&id)
            .ok_or_else(|| HarnessError::config(format!("no client configured for {}", id)))
    }
}
