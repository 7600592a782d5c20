//! Named acceptance suites and their report.

use std::{
    fmt,
    time::{Duration, Instant},
};

use alloy_core::primitives::U256;
use comfy_table::Table;
use strum::IntoEnumIterator;

use crate::{
    HarnessError, HarnessResult,
    async_submit::{submit_async, submit_async_invalid_account},
    context::HarnessContext,
    error::{ErrorKind, ensure_eq},
    registry::NodeId,
    scenario::{ExecutionStrategy, ScenarioEngine, TransferKind},
    signed::run_signed,
    storage_root::cross_check,
    visibility::{Visibility, deploy_and_fire},
};

/// Acceptance suites, in their default execution order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum Suite {
    Config,
    PublicTransfers,
    PublicTransfersParallel,
    PrivateTransfers,
    PrivateTransfersParallel,
    PrivateValueRejected,
    SignedTransfers,
    PublicContractEvents,
    PrivateContractEvents,
    StorageRoot,
    AsyncSubmission,
}

impl Suite {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Config => "Every node is reachable and manages its configured account",
            Self::PublicTransfers => "Public transfers from each node to every other, one origin at a time",
            Self::PublicTransfersParallel => "Public transfers from all origins concurrently",
            Self::PrivateTransfers => "Private transactions from each node to every other",
            Self::PrivateTransfersParallel => "Private transactions from all origins concurrently",
            Self::PrivateValueRejected => "Private transactions carrying ether are rejected",
            Self::SignedTransfers => "Locally signed transfers from each node's keystore",
            Self::PublicContractEvents => "Events of a public contract are visible on every node",
            Self::PrivateContractEvents => "Events of a private contract are visible to its parties only",
            Self::StorageRoot => "Private contract storage roots agree between parties only",
            Self::AsyncSubmission => "Asynchronous submission reports back through a callback",
        }
    }
}

/// Result of one suite run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteOutcome {
    pub suite: Suite,
    pub passed: bool,
    pub duration: Duration,
    /// Summary on success, the error on failure.
    pub detail: String,
    /// Category of the failure, `None` on success.
    pub kind: Option<ErrorKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteReport {
    pub outcomes: Vec<SuiteOutcome>,
}

impl SuiteReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &SuiteOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.passed)
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.passed() { "PASSED" } else { "FAILED" };
        writeln!(f, "Acceptance Status: {}", status)?;
        writeln!(f)?;

        let mut table = Table::new();
        table.set_header(vec!["Suite", "Status", "Duration", "Detail"]);
        for outcome in &self.outcomes {
            let status = match outcome.kind {
                None => status_icon(true).to_string(),
                Some(kind) => format!("{} {}", status_icon(false), kind),
            };
            table.add_row(vec![
                outcome.suite.to_string(),
                status,
                format!("{:.1}s", outcome.duration.as_secs_f64()),
                outcome.detail.clone(),
            ]);
        }
        writeln!(f, "{}", table)
    }
}

fn status_icon(passed: bool) -> &'static str {
    if passed { "[ok]" } else { "[FAIL]" }
}

/// Runs suites against one cluster.
#[derive(Debug, Clone)]
pub struct SuiteRunner {
    ctx: HarnessContext,
    engine: ScenarioEngine,
}

impl SuiteRunner {
    pub fn new(ctx: HarnessContext) -> Self {
        let engine = ScenarioEngine::new(ctx.clone());
        Self { ctx, engine }
    }

    /// Every suite the configuration allows, in order.
    ///
    /// Signed transfers need keystore files, so they are left out when no
    /// `keys_dir` is configured.
    pub fn default_suites(&self) -> Vec<Suite> {
        let has_keys = self.ctx.config().keys_dir.is_some();
        Suite::iter()
            .filter(|suite| {
                let runnable = has_keys || *suite != Suite::SignedTransfers;
                if !runnable {
                    tracing::info!(%suite, "Skipping suite, keys_dir is not set");
                }
                runnable
            })
            .collect()
    }

    /// Run `suites` in order. With `fail_fast`, stop after the first failure.
    ///
    /// A configuration error always stops the run.
    pub async fn run_all(&self, suites: &[Suite], fail_fast: bool) -> SuiteReport {
        let mut report = SuiteReport::default();
        for suite in suites {
            let outcome = self.run(*suite).await;
            let failed = !outcome.passed;
            let misconfigured = outcome.kind == Some(ErrorKind::Configuration);
            report.outcomes.push(outcome);
            if misconfigured {
                tracing::error!(suite = %suite, "Aborting run on configuration error");
                break;
            }
            if failed && fail_fast {
                tracing::warn!(suite = %suite, "Stopping after first failure");
                break;
            }
        }
        report
    }

    /// Run one suite, capturing its failure in the outcome.
    pub async fn run(&self, suite: Suite) -> SuiteOutcome {
        tracing::info!(%suite, "Running suite");
        let started = Instant::now();
        let result = self.execute(suite).await;
        let duration = started.elapsed();

        match result {
            Ok(detail) => {
                tracing::info!(%suite, ?duration, %detail, "Suite passed");
                SuiteOutcome {
                    suite,
                    passed: true,
                    duration,
                    detail,
                    kind: None,
                }
            }
            Err(e) => {
                tracing::error!(%suite, ?duration, kind = %e.kind(), error = %e, "Suite failed");
                SuiteOutcome {
                    suite,
                    passed: false,
                    duration,
                    detail: e.to_string(),
                    kind: Some(e.kind()),
                }
            }
        }
    }

    async fn execute(&self, suite: Suite) -> HarnessResult<String> {
        let scenario = &self.ctx.config().scenario;
        let public = TransferKind::Public {
            amount_bound: scenario.amount_bound,
        };

        match suite {
            Suite::Config => self.check_config().await,
            Suite::PublicTransfers => self.transfers_per_origin(public).await,
            Suite::PublicTransfersParallel => {
                let outcomes = self
                    .engine
                    .run(ExecutionStrategy::AllOriginsParallel, public)
                    .await?;
                Ok(format!("{} transfers", outcomes.len()))
            }
            Suite::PrivateTransfers => self.transfers_per_origin(TransferKind::Private).await,
            Suite::PrivateTransfersParallel => {
                let outcomes = self
                    .engine
                    .run(ExecutionStrategy::AllOriginsParallel, TransferKind::Private)
                    .await?;
                Ok(format!("{} private transactions", outcomes.len()))
            }
            Suite::PrivateValueRejected => {
                let value = U256::from(scenario.rejected_private_value);
                let mut rejected = 0;
                for origin in self.ctx.registry().ids() {
                    for destination in self.ctx.registry().others(origin) {
                        self.engine
                            .verify_private_value_rejected(origin, destination.id, value)
                            .await?;
                        rejected += 1;
                    }
                }
                Ok(format!("{} rejections", rejected))
            }
            Suite::SignedTransfers => {
                let mut sent = 0;
                for origin in self.ctx.registry().ids() {
                    sent += run_signed(&self.ctx, origin).await?.len();
                }
                Ok(format!("{} signed transfers", sent))
            }
            Suite::PublicContractEvents => {
                for origin in self.ctx.registry().ids() {
                    deploy_and_fire(&self.ctx, Visibility::Public, origin, scenario.event_count)
                        .await?;
                }
                Ok(format!(
                    "{} events per origin seen by {} nodes",
                    scenario.event_count,
                    self.ctx.registry().node_count()
                ))
            }
            Suite::PrivateContractEvents => {
                let recipient = NodeId::new(scenario.private_recipient);
                let visibility = Visibility::new(true, Some(recipient))?;
                let mut origins = 0;
                for origin in self.ctx.registry().ids().filter(|id| *id != recipient) {
                    deploy_and_fire(&self.ctx, visibility, origin, scenario.event_count).await?;
                    origins += 1;
                }
                Ok(format!(
                    "{} events from {} origins private to {}",
                    scenario.event_count, origins, recipient
                ))
            }
            Suite::StorageRoot => {
                let report = cross_check(
                    &self.ctx,
                    NodeId::new(scenario.storage_root_origin),
                    NodeId::new(scenario.storage_root_recipient),
                )
                .await?;
                Ok(format!(
                    "root {} shared by {} and {}, {} outsiders isolated",
                    report.origin_root,
                    report.origin,
                    report.recipient,
                    report.others.len()
                ))
            }
            Suite::AsyncSubmission => {
                let origin = NodeId::new(scenario.storage_root_origin);
                let recipient = NodeId::new(scenario.private_recipient);
                let private_for = (recipient != origin).then_some(recipient);

                let mined =
                    submit_async(&self.ctx, origin, self.ctx.node(origin)?.account, private_for)
                        .await?;
                let rejected = submit_async_invalid_account(&self.ctx, origin).await?;
                Ok(format!(
                    "tx {} mined in block {}; unknown account {} refused",
                    mined.tx_hash, mined.block_number, rejected.account
                ))
            }
        }
    }

    async fn transfers_per_origin(&self, kind: TransferKind) -> HarnessResult<String> {
        let mut total = 0;
        for origin in self.ctx.registry().ids() {
            total += self
                .engine
                .run(ExecutionStrategy::Sequential { origin }, kind)
                .await?
                .len();
        }
        Ok(format!("{} transactions", total))
    }

    async fn check_config(&self) -> HarnessResult<String> {
        let timeout = self.ctx.config().timing.rpc_timeout();
        for node in self.ctx.registry().iter() {
            let client = self.ctx.client(node.id)?;
            client.wait_until_ready(timeout).await?;
            node.require_recipient_key()?;

            let accounts = client.accounts().await?;
            if !accounts.contains(&node.account) {
                return Err(HarnessError::assertion(
                    node.id.to_string(),
                    "configured account is not managed by the node",
                    node.account,
                    format!("{:?}", accounts),
                ));
            }

            match client.chain_id().await {
                Ok(chain_id) => ensure_eq(
                    &node.id.to_string(),
                    "chain id mismatch",
                    self.ctx.config().chain_id,
                    chain_id,
                )?,
                Err(e @ HarnessError::Rpc { .. }) => {
                    tracing::warn!(node = %node.id, error = %e, "Node does not report its chain id");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(format!("{} nodes reachable", self.ctx.registry().node_count()))
    }
}
