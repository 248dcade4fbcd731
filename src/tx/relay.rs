//! Delegated relay pipeline
//!
//! Runs one preparation in strict order:
//! chain id, authority nonce, relay nonce, fee data, gas estimate,
//! authorization, unsigned envelope, relay signature, submit.
//!
//! Nonce acquisition is not serialized here. Callers preparing several
//! transactions for the same signer concurrently must serialize them.

use super::broadcaster::Broadcaster;
use super::provider::{CallRequest, ChainStateProvider};
use crate::config::RelayConfig;
use crate::crypto::{to_checksum_address, to_hex, Digest, PrivateKey};
use crate::eip7702::{build_authorization, build_unsigned, sign_envelope, SignedEnvelope, TransactionFields};
use crate::error::{RelayError, RelayResult};
use crate::{log_debug, log_info};
use ethers_core::types::{Address, Bytes, U256};
use serde::Serialize;

/// What the caller wants relayed
pub struct RelayRequest<'a> {
    pub authority_key: &'a PrivateKey,
    pub relay_key: &'a PrivateKey,
    pub delegate: Address,
    /// Call target, the authority's own account when `None`
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
    /// Skips estimation when set
    pub gas_limit: Option<U256>,
}

impl<'a> RelayRequest<'a> {
    pub fn new(authority_key: &'a PrivateKey, relay_key: &'a PrivateKey, delegate: Address) -> Self {
        Self {
            authority_key,
            relay_key,
            delegate,
            to: None,
            value: U256::zero(),
            data: Vec::new(),
            gas_limit: None,
        }
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: U256) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

/// A signed payload that has not been broadcast
///
/// Dropping it discards the signature; it is never cached for reuse.
#[derive(Debug)]
pub struct PreparedTransaction {
    pub authority: Address,
    pub relay: Address,
    pub envelope: SignedEnvelope,
}

impl PreparedTransaction {
    pub fn transaction_hash(&self) -> Digest {
        self.envelope.transaction_hash()
    }

    pub fn summary(&self) -> PreparedSummary {
        let fields = self.envelope.fields();
        PreparedSummary {
            authority: to_checksum_address(&self.authority),
            relay: to_checksum_address(&self.relay),
            chain_id: fields.chain_id,
            nonce: fields.nonce,
            gas_limit: fields.gas_limit,
            max_fee_per_gas: fields.max_fee_per_gas,
            max_priority_fee_per_gas: fields.max_priority_fee_per_gas,
            digest: to_hex(&self.envelope.signing_digest()),
            hash: to_hex(&self.transaction_hash()),
            raw: self.envelope.raw_hex(),
        }
    }
}

/// JSON view of a prepared transaction
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedSummary {
    pub authority: String,
    pub relay: String,
    pub chain_id: U256,
    pub nonce: u64,
    pub gas_limit: U256,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
    pub digest: String,
    pub hash: String,
    pub raw: String,
}

/// Result of a successful submit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    pub tx_hash: String,
    pub authority: Address,
    pub relay: Address,
}

pub struct DelegatedRelay<P, B> {
    config: RelayConfig,
    provider: P,
    broadcaster: B,
}

impl<P, B> DelegatedRelay<P, B> {
    pub fn new(config: RelayConfig, provider: P, broadcaster: B) -> Self {
        Self {
            config,
            provider,
            broadcaster,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn broadcaster(&self) -> &B {
        &self.broadcaster
    }
}

impl<P: ChainStateProvider, B> DelegatedRelay<P, B> {
    /// Fetch chain state, sign the authorization and the envelope
    pub fn prepare(&self, request: &RelayRequest<'_>) -> RelayResult<PreparedTransaction> {
        let chain_id = self.provider.chain_id()?;
        if let Some(expected) = self.config.chain_id {
            if chain_id != U256::from(expected) {
                return Err(RelayError::config(format!(
                    "Node reports chain {}, configuration expects {}",
                    chain_id, expected
                )));
            }
        }

        let authority = request.authority_key.address()?;
        let relay = request.relay_key.address()?;

        let authority_nonce = self.provider.transaction_count(authority)?;
        let relay_nonce = self.provider.transaction_count(relay)?;

        // A self-sponsored sender's nonce is bumped before the authorization
        // list is processed.
        let auth_nonce = if authority == relay {
            relay_nonce
                .checked_add(1)
                .ok_or_else(|| RelayError::validation("Relay nonce overflow"))?
        } else {
            authority_nonce
        };

        let fees = self.provider.fee_data()?;

        let gas_limit = match request.gas_limit {
            Some(limit) => limit,
            None => {
                // Without an explicit target the delegate's code is what runs
                let estimate = self.provider.estimate_gas(&CallRequest {
                    from: relay,
                    to: request.to.unwrap_or(request.delegate),
                    value: request.value,
                    data: Bytes::from(request.data.clone()),
                })?;
                estimate.saturating_add(self.config.gas_buffer())
            }
        };

        log_debug!(
            "tx::relay",
            "Chain state fetched",
            chain_id = chain_id,
            auth_nonce = auth_nonce,
            tx_nonce = relay_nonce,
            gas_limit = gas_limit,
        );

        let authorization = build_authorization(
            chain_id,
            request.delegate,
            auth_nonce,
            request.authority_key,
            authority,
        )?;

        let fields = TransactionFields::new(chain_id, request.to.unwrap_or(authority))
            .with_nonce(relay_nonce)
            .with_fees(fees.max_priority_fee_per_gas, fees.max_fee_per_gas)
            .with_gas_limit(gas_limit)
            .with_value(request.value)
            .with_data(request.data.clone())
            .add_authorization(authorization);

        let envelope = sign_envelope(build_unsigned(fields)?, request.relay_key)?;

        log_info!(
            "tx::relay",
            "Delegated transaction signed",
            authority = to_checksum_address(&authority),
            relay = to_checksum_address(&relay),
            tx_hash = to_hex(&envelope.transaction_hash()),
        );

        Ok(PreparedTransaction {
            authority,
            relay,
            envelope,
        })
    }
}

impl<P: ChainStateProvider, B: Broadcaster> DelegatedRelay<P, B> {
    /// Broadcast a prepared payload, consuming it
    pub fn submit(&self, prepared: PreparedTransaction) -> RelayResult<SendOutcome> {
        let PreparedTransaction {
            authority,
            relay,
            envelope,
        } = prepared;

        let tx_hash = self.broadcaster.submit(&envelope.into_raw())?;

        Ok(SendOutcome {
            tx_hash,
            authority,
            relay,
        })
    }

    pub fn send(&self, request: &RelayRequest<'_>) -> RelayResult<SendOutcome> {
        let prepared = self.prepare(request)?;
        self.submit(prepared)
    }
}
