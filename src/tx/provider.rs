//! Chain-state provider
//!
//! Nonces, fee data, chain id and gas estimates come from a
//! [`ChainStateProvider`]. The JSON-RPC implementation sends each request
//! once; [`RetryingProvider`] adds bounded retry around any provider.

use crate::config::{RelayConfig, RetryPolicy};
use crate::error::{RelayError, RelayResult};
use crate::utils::{JsonRpcClient, RpcFailure};
use crate::{log_debug, log_warn};
use ethers_core::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// Priority fee used when the node has no `eth_maxPriorityFeePerGas`
pub const DEFAULT_PRIORITY_FEE_WEI: u64 = 1_000_000_000;

/// EIP-1559 fee fields; `None` when the node cannot provide them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeData {
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
}

impl FeeData {
    /// ethers-style derivation: `max = 2 * base + priority`
    pub fn from_base_fee(base_fee: Option<U256>, priority_fee: U256) -> Self {
        match base_fee {
            Some(base) => Self {
                max_fee_per_gas: Some(base.saturating_mul(U256::from(2)).saturating_add(priority_fee)),
                max_priority_fee_per_gas: Some(priority_fee),
            },
            None => Self::default(),
        }
    }
}

/// Call shape passed to gas estimation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

/// Read-only chain state needed before an envelope is built
pub trait ChainStateProvider {
    fn chain_id(&self) -> RelayResult<U256>;

    /// Pending transaction count, used as the next nonce
    fn transaction_count(&self, address: Address) -> RelayResult<u64>;

    fn fee_data(&self) -> RelayResult<FeeData>;

    fn estimate_gas(&self, call: &CallRequest) -> RelayResult<U256>;
}

impl<T: ChainStateProvider + ?Sized> ChainStateProvider for &T {
    fn chain_id(&self) -> RelayResult<U256> {
        (**self).chain_id()
    }

    fn transaction_count(&self, address: Address) -> RelayResult<u64> {
        (**self).transaction_count(address)
    }

    fn fee_data(&self) -> RelayResult<FeeData> {
        (**self).fee_data()
    }

    fn estimate_gas(&self, call: &CallRequest) -> RelayResult<U256> {
        (**self).estimate_gas(call)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockHeader {
    #[serde(default)]
    base_fee_per_gas: Option<U256>,
}

/// JSON-RPC provider
pub struct RpcProvider {
    rpc: JsonRpcClient,
}

impl RpcProvider {
    pub fn new(config: &RelayConfig) -> RelayResult<Self> {
        Ok(Self {
            rpc: JsonRpcClient::new(config.rpc_endpoint()?, config.request_timeout())?,
        })
    }

    fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> RelayResult<T> {
        self.rpc
            .call(method, params)
            .map_err(|e| e.into_error(RelayError::Provider))
    }
}

impl ChainStateProvider for RpcProvider {
    fn chain_id(&self) -> RelayResult<U256> {
        self.call("eth_chainId", json!([]))
    }

    fn transaction_count(&self, address: Address) -> RelayResult<u64> {
        let count: U256 = self.call("eth_getTransactionCount", json!([address, "pending"]))?;
        if count > U256::from(u64::MAX) {
            return Err(RelayError::provider(format!("Nonce {} out of range", count)));
        }
        Ok(count.as_u64())
    }

    fn fee_data(&self) -> RelayResult<FeeData> {
        let block: Option<BlockHeader> = self
            .rpc
            .call_optional("eth_getBlockByNumber", json!(["latest", false]))
            .map_err(|e| e.into_error(RelayError::Provider))?;
        let base_fee = block.and_then(|b| b.base_fee_per_gas);

        let priority_fee = match self.rpc.call::<U256>("eth_maxPriorityFeePerGas", json!([])) {
            Ok(fee) => fee,
            Err(RpcFailure::Node { message, .. }) => {
                log_debug!(
                    "tx::provider",
                    "Priority fee unavailable, using default",
                    reason = message,
                );
                U256::from(DEFAULT_PRIORITY_FEE_WEI)
            }
            Err(other) => return Err(other.into_error(RelayError::Provider)),
        };

        Ok(FeeData::from_base_fee(base_fee, priority_fee))
    }

    fn estimate_gas(&self, call: &CallRequest) -> RelayResult<U256> {
        self.call("eth_estimateGas", json!([call]))
    }
}

/// Fixed chain state for offline building and tests
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    pub chain_id: U256,
    pub nonces: HashMap<Address, u64>,
    pub fees: FeeData,
    pub gas_estimate: U256,
}

impl StaticProvider {
    pub fn new(chain_id: U256) -> Self {
        Self {
            chain_id,
            ..Self::default()
        }
    }

    pub fn with_nonce(mut self, address: Address, nonce: u64) -> Self {
        self.nonces.insert(address, nonce);
        self
    }

    pub fn with_fees(mut self, fees: FeeData) -> Self {
        self.fees = fees;
        self
    }

    pub fn with_gas_estimate(mut self, gas: U256) -> Self {
        self.gas_estimate = gas;
        self
    }
}

impl ChainStateProvider for StaticProvider {
    fn chain_id(&self) -> RelayResult<U256> {
        Ok(self.chain_id)
    }

    fn transaction_count(&self, address: Address) -> RelayResult<u64> {
        self.nonces
            .get(&address)
            .copied()
            .ok_or_else(|| RelayError::provider(format!("No nonce known for {:?}", address)))
    }

    fn fee_data(&self) -> RelayResult<FeeData> {
        Ok(self.fees)
    }

    fn estimate_gas(&self, _call: &CallRequest) -> RelayResult<U256> {
        if self.gas_estimate.is_zero() {
            return Err(RelayError::provider("No gas estimate available"));
        }
        Ok(self.gas_estimate)
    }
}

/// Bounded retry around a provider
///
/// Only [`RelayError::is_retryable`] errors are retried, with linear backoff.
pub struct RetryingProvider<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: ChainStateProvider> RetryingProvider<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn with_retry<T>(&self, what: &'static str, op: impl Fn(&P) -> RelayResult<T>) -> RelayResult<T> {
        let mut attempt = 1;
        loop {
            match op(&self.inner) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    log_warn!(
                        "tx::provider",
                        "Chain-state lookup failed, retrying",
                        lookup = what,
                        attempt = attempt,
                        error = e,
                    );
                    std::thread::sleep(self.policy.delay_after(attempt));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<P: ChainStateProvider> ChainStateProvider for RetryingProvider<P> {
    fn chain_id(&self) -> RelayResult<U256> {
        self.with_retry("chain_id", |p| p.chain_id())
    }

    fn transaction_count(&self, address: Address) -> RelayResult<u64> {
        self.with_retry("transaction_count", |p| p.transaction_count(address))
    }

    fn fee_data(&self) -> RelayResult<FeeData> {
        self.with_retry("fee_data", |p| p.fee_data())
    }

    fn estimate_gas(&self, call: &CallRequest) -> RelayResult<U256> {
        self.with_retry("estimate_gas", |p| p.estimate_gas(call))
    }
}
