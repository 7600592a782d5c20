//! Local HTTP endpoint receiving asynchronous submission results.
//!
//! Nodes POST `{"txHash": ..., "error": ...}` to the `callbackUrl` given with
//! `eth_sendTransactionAsync`. The listener binds an ephemeral port, forwards
//! every payload to a channel and is shut down by its owner.

use std::{net::SocketAddr, time::Duration};

use alloy_core::primitives::B256;
use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::{Deserialize, Serialize};
use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{HarnessError, HarnessResult};

/// Body posted by a node once an async submission is processed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct CallbackListener {
    addr: SocketAddr,
    receiver: mpsc::UnboundedReceiver<CallbackPayload>,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<std::io::Result<()>>>,
}

async fn receive(
    State(sender): State<mpsc::UnboundedSender<CallbackPayload>>,
    Json(payload): Json<CallbackPayload>,
) -> StatusCode {
    tracing::debug!(?payload, "Callback received");
    // The receiver is gone once the scenario stopped waiting.
    let _ = sender.send(payload);
    StatusCode::OK
}

impl CallbackListener {
    /// Bind to `bind_ip` on a port chosen by the OS and start serving.
    pub async fn bind(bind_ip: &str) -> HarnessResult<Self> {
        let listener = TcpListener::bind((bind_ip, 0)).await?;
        let addr = listener.local_addr()?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let router = Router::new()
            .route("/", post(receive))
            .with_state(sender);

        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tracing::debug!(%addr, "Callback listener started");

        Ok(Self {
            addr,
            receiver,
            shutdown: Some(shutdown_tx),
            server: Some(server),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL nodes should post to, reaching this machine as `host`.
    pub fn url(&self, host: &str) -> String {
        format!("http://{}:{}/", host, self.addr.port())
    }

    /// The next payload, or `None` if nothing arrives within `wait`.
    pub async fn next_within(&mut self, wait: Duration) -> Option<CallbackPayload> {
        tokio::time::timeout(wait, self.receiver.recv())
            .await
            .ok()
            .flatten()
    }

    /// Stop accepting callbacks and wait for the server task to finish.
    pub async fn shutdown(mut self) -> HarnessResult<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            server
                .await
                .map_err(|e| HarnessError::Callback(std::io::Error::other(e)))??;
        }
        tracing::debug!(addr = %self.addr, "Callback listener stopped");
        Ok(())
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
