//! Relay configuration
//!
//! Passed explicitly to the provider, broadcaster and pipeline at
//! construction. Keys are never part of it.

use crate::error::{RelayError, RelayResult};
use crate::utils::sanitize::validate_safe_url;
use ethers_core::types::U256;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Bounded retry for read-only chain-state lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay before attempt `n + 1` is `backoff_ms * n`
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// No retries, single attempt
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 0,
        }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(attempt as u64))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RelayConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,

    /// Expected chain id; checked against the node when set
    pub chain_id: Option<u64>,

    pub request_timeout_secs: u64,

    pub retry: RetryPolicy,

    /// Added to the node's gas estimate to cover authorization processing
    pub gas_buffer: u64,

    pub receipt_poll_interval_ms: u64,

    pub receipt_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: None,
            request_timeout_secs: 15,
            retry: RetryPolicy::default(),
            gas_buffer: 30_000,
            receipt_poll_interval_ms: 2_000,
            receipt_timeout_secs: 120,
        }
    }
}

impl RelayConfig {
    /// Load and validate a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> RelayResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RelayError::config(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> RelayResult<Self> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RelayResult<()> {
        validate_safe_url(&self.rpc_url)
            .map_err(|e| RelayError::config(format!("rpcUrl: {}", e)))?;

        if self.retry.max_attempts == 0 {
            return Err(RelayError::config("retry.maxAttempts must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(RelayError::config("requestTimeoutSecs must be greater than zero"));
        }
        if self.receipt_poll_interval_ms == 0 {
            return Err(RelayError::config("receiptPollIntervalMs must be greater than zero"));
        }
        if self.chain_id == Some(0) {
            return Err(RelayError::config("chainId must be non-zero"));
        }
        Ok(())
    }

    pub fn rpc_endpoint(&self) -> RelayResult<url::Url> {
        validate_safe_url(&self.rpc_url).map_err(|e| RelayError::config(format!("rpcUrl: {}", e)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn gas_buffer(&self) -> U256 {
        U256::from(self.gas_buffer)
    }
}
