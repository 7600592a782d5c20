//! `eth_sendTransactionAsync` with a local callback endpoint.

use alloy_core::primitives::{Address, B256};

use crate::{
    HarnessError, HarnessResult,
    callback::{CallbackListener, CallbackPayload},
    context::HarnessContext,
    contract::{DEFAULT_GAS_LIMIT, simple_storage_code},
    error::ensure_ne,
    finality::wait_for_receipt,
    registry::NodeId,
    rpc::{NodeClient, TransactionRequest},
};

const METHOD: &str = "eth_sendTransactionAsync";

/// Constructor argument of the contract deployed asynchronously.
const INITIAL_VALUE: u64 = 42;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncSubmissionOutcome {
    pub origin: NodeId,
    pub tx_hash: B256,
    pub block_number_before: u64,
    pub block_number: u64,
}

/// How a submission from an unknown account was turned down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidAccountOutcome {
    pub origin: NodeId,
    pub account: Address,
    /// Error reported by the node, if any; `None` when no callback came.
    pub rejection: Option<String>,
}

/// Deploy a contract through `origin` with `eth_sendTransactionAsync`, wait
/// for the callback and confirm the resulting transaction was mined.
pub async fn submit_async(
    ctx: &HarnessContext,
    origin: NodeId,
    from: Address,
    private_for: Option<NodeId>,
) -> HarnessResult<AsyncSubmissionOutcome> {
    let client = ctx.client(origin)?;
    let mut request = deploy_request(from);
    if let Some(recipient) = private_for {
        request = request.private_for(vec![ctx.node(recipient)?.require_recipient_key()?.to_string()]);
    }

    let mut listener = CallbackListener::bind(&ctx.config().scenario.callback_bind).await?;
    request = request.callback_url(listener.url(&ctx.config().scenario.callback_host));

    let outcome = await_mined(ctx, client, &mut listener, &request).await;
    let shutdown = listener.shutdown().await;
    let outcome = outcome?;
    shutdown?;
    Ok(outcome)
}

async fn await_mined(
    ctx: &HarnessContext,
    client: &NodeClient,
    listener: &mut CallbackListener,
    request: &TransactionRequest,
) -> HarnessResult<AsyncSubmissionOutcome> {
    let origin = client.node();
    let context = format!("{} async from {}", origin, request.from);

    let block_number_before = client.block_number().await?;
    let ack = client.send_transaction_async(request).await?;
    tracing::debug!(node = %origin, %ack, "Async submission acknowledged");

    let wait = ctx.config().timing.callback_wait();
    let payload = listener.next_within(wait).await.ok_or_else(|| {
        HarnessError::assertion(&context, "no callback received", "callback", format!("nothing after {:?}", wait))
    })?;

    let tx_hash = match payload {
        CallbackPayload {
            error: Some(message),
            ..
        } => {
            return Err(HarnessError::Rpc {
                method: METHOD.to_string(),
                code: None,
                message,
            });
        }
        CallbackPayload {
            tx_hash: Some(tx_hash),
            ..
        } => tx_hash,
        CallbackPayload { .. } => {
            return Err(HarnessError::assertion(
                &context,
                "callback carried neither a hash nor an error",
                "txHash",
                "empty payload",
            ));
        }
    };

    let receipt = wait_for_receipt(client, tx_hash, ctx.finality()).await?;
    let block_number = receipt.block_number.unwrap_or_default();
    ensure_ne(&context, "receipt block number is zero", 0, block_number)?;

    let block_number_after = client.block_number().await?;
    if block_number_after <= block_number_before {
        return Err(HarnessError::assertion(
            &context,
            "no new block was created",
            format!("> {}", block_number_before),
            block_number_after,
        ));
    }

    tracing::info!(node = %origin, tx_hash = %tx_hash, block = block_number, "Async submission mined");
    Ok(AsyncSubmissionOutcome {
        origin,
        tx_hash,
        block_number_before,
        block_number,
    })
}

/// Submit from an account `origin` does not manage; no transaction may result.
///
/// An immediate RPC error, an error callback or no callback at all are all
/// acceptable. A callback carrying a transaction hash is not.
pub async fn submit_async_invalid_account(
    ctx: &HarnessContext,
    origin: NodeId,
) -> HarnessResult<InvalidAccountOutcome> {
    let client = ctx.client(origin)?;
    let account = unmanaged_account(ctx.node(origin)?.account);

    if client.accounts().await?.contains(&account) {
        return Err(HarnessError::config(format!(
            "{} unexpectedly manages {}",
            origin, account
        )));
    }

    let mut listener = CallbackListener::bind(&ctx.config().scenario.callback_bind).await?;
    let request = deploy_request(account)
        .callback_url(listener.url(&ctx.config().scenario.callback_host));

    let outcome = await_rejection(ctx, client, &mut listener, &request).await;
    let shutdown = listener.shutdown().await;
    let rejection = outcome?;
    shutdown?;

    tracing::info!(node = %origin, %account, ?rejection, "Submission from unknown account produced no transaction");
    Ok(InvalidAccountOutcome {
        origin,
        account,
        rejection,
    })
}

async fn await_rejection(
    ctx: &HarnessContext,
    client: &NodeClient,
    listener: &mut CallbackListener,
    request: &TransactionRequest,
) -> HarnessResult<Option<String>> {
    match client.send_transaction_async(request).await {
        Err(e @ HarnessError::Rpc { .. }) => return Ok(Some(e.to_string())),
        Err(e) => return Err(e),
        Ok(_) => {}
    }

    match listener.next_within(ctx.config().timing.callback_wait()).await {
        None => Ok(None),
        Some(CallbackPayload {
            error: Some(message),
            ..
        }) => Ok(Some(message)),
        Some(CallbackPayload {
            tx_hash: Some(tx_hash),
            ..
        }) => Err(HarnessError::assertion(
            format!("{} async from {}", client.node(), request.from),
            "node accepted a transaction from an unmanaged account",
            "no transaction",
            tx_hash,
        )),
        Some(CallbackPayload { .. }) => Ok(None),
    }
}

fn deploy_request(from: Address) -> TransactionRequest {
    TransactionRequest::deploy(from, simple_storage_code(INITIAL_VALUE)).with_gas(DEFAULT_GAS_LIMIT)
}

/// `account` with one bit flipped: same shape, almost surely unknown to the node.
fn unmanaged_account(account: Address) -> Address {
    let mut raw = account.0.0;
    raw[0] ^= 0x01;
    Address::from(raw)
}
