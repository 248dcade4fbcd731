//! Transaction Broadcaster
//!
//! Submits a signed payload exactly once. Node rejections (nonce too low,
//! underpriced, malformed) come back as [`RelayError::Broadcast`] carrying
//! the node's message unmodified.

use crate::config::RelayConfig;
use crate::crypto::to_hex;
use crate::error::{RelayError, RelayResult};
use crate::utils::JsonRpcClient;
use crate::{log_debug, log_info};
use ethers_core::types::{H256, U64};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, Instant};

/// Sends a broadcast-ready payload and returns the transaction id
pub trait Broadcaster {
    fn submit(&self, raw: &[u8]) -> RelayResult<String>;
}

/// Receipt fields reported back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: H256,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub gas_used: Option<U64>,
    /// `1` success, `0` reverted
    #[serde(default)]
    pub status: Option<U64>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> Option<bool> {
        self.status.map(|s| s == U64::one())
    }
}

/// `eth_sendRawTransaction` broadcaster
pub struct RpcBroadcaster {
    rpc: JsonRpcClient,
    poll_interval: Duration,
    receipt_timeout: Duration,
}

impl RpcBroadcaster {
    pub fn new(config: &RelayConfig) -> RelayResult<Self> {
        Ok(Self {
            rpc: JsonRpcClient::new(config.rpc_endpoint()?, config.request_timeout())?,
            poll_interval: config.receipt_poll_interval(),
            receipt_timeout: config.receipt_timeout(),
        })
    }

    /// Poll for the receipt of `tx_hash`
    ///
    /// Not finding a receipt before the configured timeout is a broadcast
    /// failure, never a success.
    pub fn wait_for_receipt(&self, tx_hash: &str) -> RelayResult<TransactionReceipt> {
        let deadline = Instant::now() + self.receipt_timeout;

        loop {
            let receipt: Option<TransactionReceipt> = self
                .rpc
                .call_optional("eth_getTransactionReceipt", json!([tx_hash]))
                .map_err(|e| e.into_error(RelayError::Broadcast))?;

            if let Some(receipt) = receipt {
                log_info!(
                    "tx::broadcaster",
                    "Receipt received",
                    tx_hash = tx_hash,
                    status = format!("{:?}", receipt.succeeded()),
                );
                return Ok(receipt);
            }

            if Instant::now() + self.poll_interval > deadline {
                return Err(RelayError::broadcast(format!(
                    "No receipt for {} after {}s",
                    tx_hash,
                    self.receipt_timeout.as_secs()
                )));
            }

            log_debug!("tx::broadcaster", "Receipt pending", tx_hash = tx_hash);
            std::thread::sleep(self.poll_interval);
        }
    }
}

impl Broadcaster for RpcBroadcaster {
    fn submit(&self, raw: &[u8]) -> RelayResult<String> {
        let tx_hash: String = self
            .rpc
            .call("eth_sendRawTransaction", json!([to_hex(raw)]))
            .map_err(|e| e.into_error(RelayError::Broadcast))?;

        log_info!(
            "tx::broadcaster",
            "Transaction broadcast",
            tx_hash = tx_hash,
            size = raw.len(),
        );

        Ok(tx_hash)
    }
}
