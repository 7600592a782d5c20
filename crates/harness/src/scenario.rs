//! Transaction scenarios: one origin node sending to every other node.
//!
//! The engine submits a transfer (public) or a zero-value private transaction
//! from the origin's account to each destination account, waits for the
//! receipt and checks block progression and, for public transfers, that both
//! balances moved. [`ExecutionStrategy`] selects between one origin at a time
//! and every origin concurrently.

use alloy_core::primitives::{B256, U256};
use futures::future::try_join_all;
use rand::Rng;

use crate::{
    HarnessError, HarnessResult,
    context::HarnessContext,
    error::{PRIVATE_VALUE_REJECTION, ensure_eq},
    finality::wait_for_receipt,
    registry::{NodeDescriptor, NodeId},
    rpc::{NodeClient, TransactionRequest},
};

/// What each origin sends to its destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// A value transfer of a random amount in `[1, amount_bound)` wei.
    Public { amount_bound: u64 },
    /// A zero-value transaction private to the destination's recipient key.
    Private,
}

/// How origins are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// A single origin, destinations in ascending order.
    Sequential { origin: NodeId },
    /// Every node as origin at once; any failure fails the run.
    AllOriginsParallel,
}

/// Observed effect of one submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutcome {
    pub origin: NodeId,
    pub destination: NodeId,
    pub tx_hash: B256,
    pub amount: U256,
    pub block_hash: Option<B256>,
    pub block_number_before: u64,
    pub block_number_after: u64,
    pub sender_balance_before: U256,
    pub sender_balance_after: U256,
    pub recipient_balance_before: U256,
    pub recipient_balance_after: U256,
}

impl TransactionOutcome {
    /// Check the outcome against the invariants of `kind`.
    pub fn validate(&self, kind: TransferKind) -> HarnessResult<()> {
        let context = format!("{} -> {} tx {}", self.origin, self.destination, self.tx_hash);

        if self.block_number_after <= self.block_number_before {
            return Err(HarnessError::assertion(
                &context,
                "block number did not advance",
                format!("> {}", self.block_number_before),
                self.block_number_after,
            ));
        }

        if !matches!(self.block_hash, Some(hash) if !hash.is_zero()) {
            return Err(HarnessError::assertion(
                &context,
                "receipt block hash is empty",
                "non-empty block hash",
                format!("{:?}", self.block_hash),
            ));
        }

        if let TransferKind::Public { .. } = kind {
            if self.sender_balance_after == self.sender_balance_before {
                return Err(HarnessError::assertion(
                    &context,
                    "sender balance did not change",
                    format!("!= {}", self.sender_balance_before),
                    self.sender_balance_after,
                ));
            }
            if self.recipient_balance_after == self.recipient_balance_before {
                return Err(HarnessError::assertion(
                    &context,
                    "recipient balance did not change",
                    format!("!= {}", self.recipient_balance_before),
                    self.recipient_balance_after,
                ));
            }
        }

        Ok(())
    }
}

/// A private transaction with ether that the node refused, as it must.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectionOutcome {
    pub origin: NodeId,
    pub destination: NodeId,
    pub message: String,
    pub block_number_before: u64,
    pub block_number_after: u64,
}

/// Draw a non-zero amount in `[1, bound)`.
///
/// A zero transfer could satisfy or defeat the balance checks by accident,
/// so it is never drawn.
pub fn random_amount(bound: u64) -> HarnessResult<u64> {
    if bound < 2 {
        return Err(HarnessError::config(format!(
            "amount bound must be at least 2, got {}",
            bound
        )));
    }
    Ok(rand::rng().random_range(1..bound))
}

/// Runs transaction scenarios against the cluster.
#[derive(Debug, Clone)]
pub struct ScenarioEngine {
    ctx: HarnessContext,
}

impl ScenarioEngine {
    pub fn new(ctx: HarnessContext) -> Self {
        Self { ctx }
    }

    pub async fn run(
        &self,
        strategy: ExecutionStrategy,
        kind: TransferKind,
    ) -> HarnessResult<Vec<TransactionOutcome>> {
        match strategy {
            ExecutionStrategy::Sequential { origin } => self.run_sequential(origin, kind).await,
            ExecutionStrategy::AllOriginsParallel => self.run_all_origins_in_parallel(kind).await,
        }
    }

    /// Send from `origin` to every other node, one transaction at a time.
    ///
    /// Stops at the first failure; nothing is retried.
    pub async fn run_sequential(
        &self,
        origin: NodeId,
        kind: TransferKind,
    ) -> HarnessResult<Vec<TransactionOutcome>> {
        let origin_node = self.ctx.node(origin)?;
        let client = self.ctx.client(origin)?;

        tracing::info!(origin = %origin, ?kind, "Starting transfers from origin");

        let mut outcomes = Vec::with_capacity(self.ctx.registry().node_count().saturating_sub(1));
        for destination in self.ctx.registry().others(origin) {
            let outcome = self.transfer(client, origin_node, destination, kind).await?;
            outcome.validate(kind)?;
            tracing::debug!(
                origin = %origin,
                destination = %destination.id,
                tx_hash = %outcome.tx_hash,
                block = outcome.block_number_after,
                "Transfer confirmed"
            );
            outcomes.push(outcome);
        }

        tracing::info!(origin = %origin, transfers = outcomes.len(), "Finished transfers from origin");
        Ok(outcomes)
    }

    /// Run [`Self::run_sequential`] for every origin concurrently.
    ///
    /// Outcomes are returned grouped by origin in ascending order.
    pub async fn run_all_origins_in_parallel(
        &self,
        kind: TransferKind,
    ) -> HarnessResult<Vec<TransactionOutcome>> {
        let runs = self
            .ctx
            .registry()
            .ids()
            .map(|origin| self.run_sequential(origin, kind));

        let per_origin = try_join_all(runs).await?;
        Ok(per_origin.into_iter().flatten().collect())
    }

    async fn transfer(
        &self,
        client: &NodeClient,
        origin: &NodeDescriptor,
        destination: &NodeDescriptor,
        kind: TransferKind,
    ) -> HarnessResult<TransactionOutcome> {
        let (amount, request) = match kind {
            TransferKind::Public { amount_bound } => {
                let amount = U256::from(random_amount(amount_bound)?);
                (
                    amount,
                    TransactionRequest::transfer(origin.account, destination.account, amount),
                )
            }
            TransferKind::Private => {
                let key = destination.require_recipient_key()?;
                (
                    U256::ZERO,
                    TransactionRequest::transfer(origin.account, destination.account, U256::ZERO)
                        .private_for(vec![key.to_string()]),
                )
            }
        };

        let sender_balance_before = client.get_balance(origin.account).await?;
        let recipient_balance_before = client.get_balance(destination.account).await?;
        let block_number_before = client.block_number().await?;

        tracing::debug!(
            origin = %origin.id,
            destination = %destination.id,
            %amount,
            block = block_number_before,
            private = request.is_private(),
            "Sending transaction"
        );

        let tx_hash = client.send_transaction(&request).await?;
        let receipt = wait_for_receipt(client, tx_hash, self.ctx.finality()).await?;

        let sender_balance_after = client.get_balance(origin.account).await?;
        let recipient_balance_after = client.get_balance(destination.account).await?;

        Ok(TransactionOutcome {
            origin: origin.id,
            destination: destination.id,
            tx_hash,
            amount,
            block_hash: receipt.block_hash,
            block_number_before,
            block_number_after: receipt.block_number.unwrap_or_default(),
            sender_balance_before,
            sender_balance_after,
            recipient_balance_before,
            recipient_balance_after,
        })
    }

    /// Send a private transaction carrying `value` and require the node to
    /// refuse it without producing a block.
    pub async fn verify_private_value_rejected(
        &self,
        origin: NodeId,
        destination: NodeId,
        value: U256,
    ) -> HarnessResult<RejectionOutcome> {
        let origin_node = self.ctx.node(origin)?;
        let destination_node = self.ctx.node(destination)?;
        let client = self.ctx.client(origin)?;

        let request =
            TransactionRequest::transfer(origin_node.account, destination_node.account, value)
                .private_for(vec![destination_node.require_recipient_key()?.to_string()]);

        let block_number_before = client.block_number().await?;
        let context = format!("{} -> {} private value {}", origin, destination, value);

        let message = match client.send_transaction(&request).await {
            Err(e) if e.is_rejection_containing(PRIVATE_VALUE_REJECTION) => {
                tracing::info!(origin = %origin, error = %e, "Private transaction with value rejected");
                e.to_string()
            }
            Err(e) => return Err(e),
            Ok(tx_hash) => {
                return Err(HarnessError::assertion(
                    context,
                    "node accepted a private transaction carrying ether",
                    format!("rejection containing '{}'", PRIVATE_VALUE_REJECTION),
                    format!("tx {}", tx_hash),
                ));
            }
        };

        let block_number_after = client.block_number().await?;
        ensure_eq(
            &context,
            "block number changed after a rejected transaction",
            block_number_before,
            block_number_after,
        )?;

        Ok(RejectionOutcome {
            origin,
            destination,
            message,
            block_number_before,
            block_number_after,
        })
    }
}
