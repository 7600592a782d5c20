//! Contract visibility across the cluster.
//!
//! An event-emitting contract is deployed from one node, `emitEvent()` is
//! called a number of times, and every node is then asked for the receipts.
//! A public contract must produce logs everywhere; a private one only on the
//! nodes party to it.

use std::collections::BTreeSet;

use alloy_core::primitives::{Address, B256};
use futures::future::try_join_all;

use crate::{
    HarnessError, HarnessResult,
    context::HarnessContext,
    contract::{DEFAULT_GAS_LIMIT, emit_event_calldata, event_emitter_code},
    error::ensure_eq,
    finality::wait_for_receipt,
    registry::NodeId,
    rpc::{NodeClient, TransactionRequest},
};

/// Who may observe a contract's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    /// Shared between the origin and `recipient` only.
    Private { recipient: NodeId },
}

impl Visibility {
    /// Build from a privacy flag and an optional recipient, rejecting a
    /// private contract without a recipient.
    pub fn new(private: bool, recipient: Option<NodeId>) -> HarnessResult<Self> {
        match (private, recipient) {
            (false, _) => Ok(Self::Public),
            (true, Some(recipient)) => Ok(Self::Private { recipient }),
            (true, None) => Err(HarnessError::config(
                "a private contract needs a recipient node",
            )),
        }
    }

    /// Nodes expected to see every event when `origin` deploys.
    pub fn participants(&self, ctx: &HarnessContext, origin: NodeId) -> BTreeSet<NodeId> {
        match self {
            Self::Public => ctx.registry().ids().collect(),
            Self::Private { recipient } => BTreeSet::from([origin, *recipient]),
        }
    }
}

/// Receipts observed by one node for the fired events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityReport {
    pub node: NodeId,
    /// Receipts present with at least one log.
    pub found: usize,
    /// Receipts absent, or present without logs.
    pub missing: usize,
    /// Payload of the first log of each found receipt, in submission order.
    pub payloads: Vec<String>,
}

/// A deployed event emitter and the transactions fired at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredContract {
    pub origin: NodeId,
    pub address: Address,
    pub visibility: Visibility,
    pub event_tx_hashes: Vec<B256>,
}

/// Deploy from `origin`, fire `event_count` events and collect one report per
/// node, after checking the reports against `visibility`.
pub async fn deploy_and_fire(
    ctx: &HarnessContext,
    visibility: Visibility,
    origin: NodeId,
    event_count: usize,
) -> HarnessResult<Vec<VisibilityReport>> {
    let fired = fire_events(ctx, visibility, origin, event_count).await?;
    let reports = collect_reports(ctx, &fired.event_tx_hashes).await?;
    assert_visibility(&reports, &visibility.participants(ctx, origin), event_count)?;
    Ok(reports)
}

/// Deploy the event emitter and call it `event_count` times, each call
/// confirmed before the next.
pub async fn fire_events(
    ctx: &HarnessContext,
    visibility: Visibility,
    origin: NodeId,
    event_count: usize,
) -> HarnessResult<FiredContract> {
    let origin_node = ctx.node(origin)?;
    let client = ctx.client(origin)?;

    let private_for = match visibility {
        Visibility::Public => None,
        Visibility::Private { recipient } if recipient == origin => {
            return Err(HarnessError::config(format!(
                "private contract recipient {} is the origin itself",
                recipient
            )));
        }
        Visibility::Private { recipient } => {
            Some(vec![ctx.node(recipient)?.require_recipient_key()?.to_string()])
        }
    };
    let with_privacy = |request: TransactionRequest| match &private_for {
        Some(keys) => request.private_for(keys.clone()),
        None => request,
    };

    let deploy = with_privacy(
        TransactionRequest::deploy(origin_node.account, event_emitter_code())
            .with_gas(DEFAULT_GAS_LIMIT),
    );
    let deploy_hash = client.send_transaction(&deploy).await?;
    let receipt = wait_for_receipt(client, deploy_hash, ctx.finality()).await?;
    let address = receipt.contract_address.ok_or_else(|| {
        HarnessError::assertion(
            format!("{} deploy {}", origin, deploy_hash),
            "deployment receipt has no contract address",
            "contract address",
            "none",
        )
    })?;

    tracing::info!(origin = %origin, contract = %address, ?visibility, "Event emitter deployed");

    let mut event_tx_hashes = Vec::with_capacity(event_count);
    for _ in 0..event_count {
        let call = with_privacy(
            TransactionRequest::call(origin_node.account, address, emit_event_calldata())
                .with_gas(DEFAULT_GAS_LIMIT),
        );
        let tx_hash = client.send_transaction(&call).await?;
        wait_for_receipt(client, tx_hash, ctx.finality()).await?;
        tracing::debug!(origin = %origin, tx_hash = %tx_hash, "Event fired");
        event_tx_hashes.push(tx_hash);
    }

    Ok(FiredContract {
        origin,
        address,
        visibility,
        event_tx_hashes,
    })
}

/// Ask every node for the receipts of `tx_hashes`.
pub async fn collect_reports(
    ctx: &HarnessContext,
    tx_hashes: &[B256],
) -> HarnessResult<Vec<VisibilityReport>> {
    let checks = ctx
        .registry()
        .ids()
        .map(|id| async move { check_receipts_in_node(ctx.client(id)?, tx_hashes).await });
    try_join_all(checks).await
}

/// Fetch all receipts from one node concurrently and classify them.
pub async fn check_receipts_in_node(
    client: &NodeClient,
    tx_hashes: &[B256],
) -> HarnessResult<VisibilityReport> {
    let receipts =
        try_join_all(tx_hashes.iter().map(|hash| client.get_transaction_receipt(*hash))).await?;

    let mut report = VisibilityReport {
        node: client.node(),
        found: 0,
        missing: 0,
        payloads: Vec::new(),
    };

    for (hash, receipt) in tx_hashes.iter().zip(receipts) {
        match receipt {
            Some(receipt) if receipt.has_logs() => {
                report.found += 1;
                report.payloads.push(receipt.logs[0].payload());
            }
            Some(_) => report.missing += 1,
            None => {
                tracing::warn!(node = %client.node(), tx_hash = %hash, "No receipt for transaction");
                report.missing += 1;
            }
        }
    }

    tracing::debug!(
        node = %report.node,
        found = report.found,
        missing = report.missing,
        "Receipts checked"
    );
    Ok(report)
}

/// Participants must have found every event, everyone else none.
pub fn assert_visibility(
    reports: &[VisibilityReport],
    participants: &BTreeSet<NodeId>,
    event_count: usize,
) -> HarnessResult<()> {
    for report in reports {
        let context = report.node.to_string();
        if participants.contains(&report.node) {
            ensure_eq(
                &context,
                "participant did not see every event",
                event_count,
                report.found,
            )?;
        } else {
            ensure_eq(&context, "outsider saw private events", 0, report.found)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(node: u32, found: usize, total: usize) -> VisibilityReport {
        VisibilityReport {
            node: NodeId::new(node),
            found,
            missing: total - found,
            payloads: (1..=found).map(|i| format!("{:x}", i)).collect(),
        }
    }

    #[test]
    fn test_private_partition_two_to_seven() {
        let participants = BTreeSet::from([NodeId::new(2), NodeId::new(7)]);
        let reports: Vec<_> = (1..=7)
            .map(|n| {
                let found = if n == 2 || n == 7 { 10 } else { 0 };
                report(n, found, 10)
            })
            .collect();
        assert_visibility(&reports, &participants, 10).unwrap();
    }

    #[test]
    fn test_leak_to_outsider_fails() {
        let participants = BTreeSet::from([NodeId::new(2), NodeId::new(7)]);
        let mut reports: Vec<_> = (1..=7)
            .map(|n| report(n, if n == 2 || n == 7 { 10 } else { 0 }, 10))
            .collect();
        reports[3] = report(4, 1, 10);

        let err = assert_visibility(&reports, &participants, 10).unwrap_err();
        assert!(err.to_string().contains("node4"));
        assert!(err.to_string().contains("outsider"));
    }

    #[test]
    fn test_public_requires_every_node() {
        let participants: BTreeSet<_> = (1..=7).map(NodeId::new).collect();
        let mut reports: Vec<_> = (1..=7).map(|n| report(n, 10, 10)).collect();
        assert_visibility(&reports, &participants, 10).unwrap();

        reports[0] = report(1, 9, 10);
        assert!(assert_visibility(&reports, &participants, 10).is_err());
    }

    #[test]
    fn test_private_without_recipient_is_config_error() {
        let err = Visibility::new(true, None).unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
        assert_eq!(Visibility::new(false, Some(NodeId::new(3))).unwrap(), Visibility::Public);
        assert_eq!(
            Visibility::new(true, Some(NodeId::new(3))).unwrap(),
            Visibility::Private {
                recipient: NodeId::new(3)
            }
        );
    }
}
