//! Private state isolation, checked through contract storage roots.
//!
//! A private `SimpleStorage` contract is deployed from the origin to one
//! recipient. Both must report the same storage root for it; any other node
//! either does not know the address or reports a different root.

use std::collections::BTreeMap;

use alloy_core::primitives::{Address, B256};
use futures::future::try_join_all;

use crate::{
    HarnessError, HarnessResult,
    context::HarnessContext,
    contract::{DEFAULT_GAS_LIMIT, simple_storage_code},
    error::{INVALID_ADDRESS, ensure_eq},
    finality::wait_for_receipt,
    registry::NodeId,
    rpc::{NodeClient, TransactionRequest},
};

/// Constructor argument of the deployed contract.
const INITIAL_VALUE: u64 = 42;

/// What a node answered when asked for the contract's storage root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootProbe {
    Root(B256),
    /// The node rejected the query with "invalid address".
    InvalidAddress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRootReport {
    pub origin: NodeId,
    pub recipient: NodeId,
    pub contract: Address,
    pub origin_root: B256,
    pub recipient_root: B256,
    pub others: BTreeMap<NodeId, RootProbe>,
}

impl StorageRootReport {
    /// Parties agree on the root; no outsider shares it.
    pub fn evaluate(&self) -> HarnessResult<()> {
        ensure_eq(
            &format!("{} vs {} contract {}", self.origin, self.recipient, self.contract),
            "storage roots of the parties differ",
            self.origin_root,
            self.recipient_root,
        )?;

        for (node, probe) in &self.others {
            if let RootProbe::Root(root) = probe {
                if *root == self.origin_root {
                    return Err(HarnessError::assertion(
                        format!("{} contract {}", node, self.contract),
                        "outsider shares the private storage root",
                        format!("a root other than {}", self.origin_root),
                        root,
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Query `contract`'s storage root, treating "invalid address" as a result.
pub async fn probe_storage_root(client: &NodeClient, contract: Address) -> HarnessResult<RootProbe> {
    match client.storage_root(contract).await {
        Ok(root) => Ok(RootProbe::Root(root)),
        Err(e) if e.is_rejection_containing(INVALID_ADDRESS) => {
            tracing::debug!(node = %client.node(), contract = %contract, "Contract unknown to node");
            Ok(RootProbe::InvalidAddress)
        }
        Err(e) => Err(e),
    }
}

/// Deploy a private contract from `origin` to `recipient` and compare the
/// storage roots seen by every node.
pub async fn cross_check(
    ctx: &HarnessContext,
    origin: NodeId,
    recipient: NodeId,
) -> HarnessResult<StorageRootReport> {
    if origin == recipient {
        return Err(HarnessError::config(format!(
            "storage root recipient {} is the origin itself",
            recipient
        )));
    }

    let origin_node = ctx.node(origin)?;
    let recipient_key = ctx.node(recipient)?.require_recipient_key()?;
    let client = ctx.client(origin)?;

    let deploy = TransactionRequest::deploy(origin_node.account, simple_storage_code(INITIAL_VALUE))
        .with_gas(DEFAULT_GAS_LIMIT)
        .private_for(vec![recipient_key.to_string()]);
    let tx_hash = client.send_transaction(&deploy).await?;
    let receipt = wait_for_receipt(client, tx_hash, ctx.finality()).await?;
    let contract = receipt.contract_address.ok_or_else(|| {
        HarnessError::assertion(
            format!("{} deploy {}", origin, tx_hash),
            "deployment receipt has no contract address",
            "contract address",
            "none",
        )
    })?;

    tracing::info!(origin = %origin, recipient = %recipient, contract = %contract, "Private storage contract deployed");

    let origin_root = client.storage_root(contract).await?;
    let recipient_root = ctx.client(recipient)?.storage_root(contract).await?;

    let outsiders: Vec<NodeId> = ctx
        .registry()
        .ids()
        .filter(|id| *id != origin && *id != recipient)
        .collect();
    let probes = try_join_all(outsiders.iter().map(|id| async move {
        probe_storage_root(ctx.client(*id)?, contract).await
    }))
    .await?;

    let report = StorageRootReport {
        origin,
        recipient,
        contract,
        origin_root,
        recipient_root,
        others: outsiders.into_iter().zip(probes).collect(),
    };
    report.evaluate()?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(others: Vec<(u32, RootProbe)>) -> StorageRootReport {
        StorageRootReport {
            origin: NodeId::new(1),
            recipient: NodeId::new(7),
            contract: Address::with_last_byte(0xaa),
            origin_root: B256::repeat_byte(1),
            recipient_root: B256::repeat_byte(1),
            others: others
                .into_iter()
                .map(|(n, probe)| (NodeId::new(n), probe))
                .collect(),
        }
    }

    #[test]
    fn test_isolated_roots_pass() {
        report(vec![
            (2, RootProbe::InvalidAddress),
            (3, RootProbe::Root(B256::repeat_byte(9))),
        ])
        .evaluate()
        .unwrap();
    }

    #[test]
    fn test_party_mismatch_fails() {
        let mut bad = report(vec![]);
        bad.recipient_root = B256::repeat_byte(2);
        let err = bad.evaluate().unwrap_err();
        assert!(err.to_string().contains("storage roots of the parties differ"));
    }

    #[test]
    fn test_outsider_sharing_root_fails() {
        let err = report(vec![
            (2, RootProbe::InvalidAddress),
            (5, RootProbe::Root(B256::repeat_byte(1))),
        ])
        .evaluate()
        .unwrap_err();
        assert!(err.to_string().contains("node5"));
    }
}
