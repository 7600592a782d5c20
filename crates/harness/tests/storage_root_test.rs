//! Storage-root cross-check against mock nodes.

mod common;

use acctest_harness::{
    ErrorKind, INVALID_ADDRESS, NodeId, RootProbe,
    storage_root::cross_check,
};
use alloy_core::primitives::{Address, B256};
use anyhow::Result;
use common::{RpcCall, context, mount, receipt, rpc_error};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn contract() -> Address {
    Address::with_last_byte(0x5e)
}

async fn start_cluster() -> [MockServer; 4] {
    [
        MockServer::start().await,
        MockServer::start().await,
        MockServer::start().await,
        MockServer::start().await,
    ]
}

/// The origin deploys the contract and reports `root` for it.
async fn script_origin(server: &MockServer, root: B256) {
    let hash = B256::repeat_byte(0x77);
    mount(server, "eth_sendTransaction", hash).await;
    mount(
        server,
        "eth_getTransactionReceipt",
        receipt(hash, 9, Some(contract()), false),
    )
    .await;
    mount(server, "eth_storageRoot", root).await;
}

/// Node 1 deploys the contract; nodes 1 and 2 share `root`.
async fn script_parties(servers: &[MockServer], root: B256) {
    script_origin(&servers[0], root).await;
    mount(&servers[1], "eth_storageRoot", root).await;
}

async fn reject_address(server: &MockServer) {
    Mock::given(RpcCall::method("eth_storageRoot").with_first_param(contract()))
        .respond_with(rpc_error(-32000, INVALID_ADDRESS))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_roots_isolated_from_outsiders() -> Result<()> {
    let servers = start_cluster().await;
    let ctx = context(&servers.iter().collect::<Vec<_>>());
    let root = B256::repeat_byte(0xa1);

    script_parties(&servers, root).await;
    reject_address(&servers[2]).await;
    mount(&servers[3], "eth_storageRoot", B256::repeat_byte(0xf0)).await;

    let report = cross_check(&ctx, NodeId::new(1), NodeId::new(2)).await?;
    assert_eq!(report.contract, contract());
    assert_eq!(report.origin_root, root);
    assert_eq!(report.recipient_root, root);
    assert_eq!(report.others[&NodeId::new(3)], RootProbe::InvalidAddress);
    assert_eq!(
        report.others[&NodeId::new(4)],
        RootProbe::Root(B256::repeat_byte(0xf0))
    );
    Ok(())
}

#[tokio::test]
async fn test_outsider_with_same_root_fails() {
    let servers = start_cluster().await;
    let ctx = context(&servers.iter().collect::<Vec<_>>());
    let root = B256::repeat_byte(0xa2);

    script_parties(&servers, root).await;
    reject_address(&servers[2]).await;
    mount(&servers[3], "eth_storageRoot", root).await;

    let err = cross_check(&ctx, NodeId::new(1), NodeId::new(2))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Assertion);
    assert!(err.to_string().contains("node4"));
}

#[tokio::test]
async fn test_outsider_infrastructure_fault_aborts() {
    let servers = start_cluster().await;
    let ctx = context(&servers.iter().collect::<Vec<_>>());

    script_parties(&servers, B256::repeat_byte(0xa3)).await;
    reject_address(&servers[2]).await;
    Mock::given(RpcCall::method("eth_storageRoot"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&servers[3])
        .await;

    let err = cross_check(&ctx, NodeId::new(1), NodeId::new(2))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Infrastructure);
}

#[tokio::test]
async fn test_recipient_must_know_the_contract() {
    let servers = start_cluster().await;
    let ctx = context(&servers.iter().collect::<Vec<_>>());

    script_origin(&servers[0], B256::repeat_byte(0xa4)).await;
    reject_address(&servers[1]).await;

    let err = cross_check(&ctx, NodeId::new(1), NodeId::new(2))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Rejection);
}

#[tokio::test]
async fn test_origin_as_recipient_is_config_error() {
    let servers = start_cluster().await;
    let ctx = context(&servers.iter().collect::<Vec<_>>());
    let err = cross_check(&ctx, NodeId::new(2), NodeId::new(2))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
