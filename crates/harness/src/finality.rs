//! Waiting for transactions to land in a block.
//!
//! Receipts are polled with exponential backoff until they report a block,
//! bounded by an overall deadline. Running out of time yields
//! [`HarnessError::FinalityTimeout`], never an assertion failure.

use std::time::{Duration, Instant};

use alloy_core::primitives::B256;
use backon::{ExponentialBuilder, Retryable};

use crate::{
    HarnessError, HarnessResult,
    config::TimingConfig,
    rpc::{NodeClient, TransactionReceipt},
};

/// Backoff schedule and deadline for receipt polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalityPolicy {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub timeout: Duration,
}

impl Default for FinalityPolicy {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

impl From<&TimingConfig> for FinalityPolicy {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            min_delay: Duration::from_millis(timing.poll_min_delay_ms),
            max_delay: Duration::from_millis(timing.poll_max_delay_ms),
            timeout: timing.finality_timeout(),
        }
    }
}

impl FinalityPolicy {
    fn backoff(&self) -> ExponentialBuilder {
        // Enough attempts to cover the deadline even if every delay were the
        // minimum; the deadline itself is enforced separately.
        let min_ms = self.min_delay.as_millis().max(1);
        let attempts = (self.timeout.as_millis() / min_ms).max(1) as usize;

        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_factor(2.0)
            .with_max_times(attempts)
    }
}

enum Poll {
    Pending,
    Failed(HarnessError),
}

/// Poll `client` until the receipt of `tx_hash` is mined.
///
/// RPC failures while polling are surfaced immediately rather than retried.
pub async fn wait_for_receipt(
    client: &NodeClient,
    tx_hash: B256,
    policy: &FinalityPolicy,
) -> HarnessResult<TransactionReceipt> {
    let started = Instant::now();

    let fetch = || async move {
        match client.get_transaction_receipt(tx_hash).await {
            Ok(Some(receipt)) if receipt.is_mined() => Ok(receipt),
            Ok(_) => Err(Poll::Pending),
            Err(e) => Err(Poll::Failed(e)),
        }
    };

    let polled = fetch
        .retry(policy.backoff())
        .when(|e| matches!(e, Poll::Pending))
        .notify(|_, delay| {
            tracing::trace!(node = %client.node(), tx_hash = %tx_hash, ?delay, "Receipt not available yet");
        });

    match tokio::time::timeout(policy.timeout, polled).await {
        Ok(Ok(receipt)) => {
            tracing::debug!(
                node = %client.node(),
                tx_hash = %tx_hash,
                block = ?receipt.block_number,
                elapsed = ?started.elapsed(),
                "Transaction mined"
            );
            Ok(receipt)
        }
        Ok(Err(Poll::Failed(e))) => Err(e),
        Ok(Err(Poll::Pending)) | Err(_) => Err(HarnessError::FinalityTimeout {
            tx_hash,
            waited: started.elapsed(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_timing() {
        let timing = TimingConfig {
            poll_min_delay_ms: 250,
            poll_max_delay_ms: 4_000,
            finality_timeout_secs: 20,
            ..TimingConfig::default()
        };
        let policy = FinalityPolicy::from(&timing);
        assert_eq!(policy.min_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_secs(4));
        assert_eq!(policy.timeout, Duration::from_secs(20));
    }
}
