//! EIP-7702 Type Definitions
//!
//! Core types for delegated transactions.

use crate::crypto::{Digest, Signature};
use ethers_core::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

/// EIP-7702 Transaction type identifier
pub const EIP7702_TX_TYPE: u8 = 0x04;

/// Magic byte prefixed to the authorization signing payload (EIP-7702)
pub const AUTHORIZATION_MAGIC: u8 = 0x05;

/// Top-level fields of the unsigned envelope
pub const UNSIGNED_FIELD_COUNT: usize = 10;

/// Top-level fields of the broadcast envelope (unsigned + y_parity, r, s)
pub const SIGNED_FIELD_COUNT: usize = 13;

/// Fields of one authorization-list entry
pub const AUTHORIZATION_FIELD_COUNT: usize = 6;

/// The object an authority signs
///
/// A `chain_id` of zero authorizes the delegation on any chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationTuple {
    /// Chain ID for replay protection
    pub chain_id: U256,

    /// Contract address to delegate to
    pub delegate: Address,

    /// Nonce of the authorizing account
    pub nonce: u64,
}

impl AuthorizationTuple {
    pub fn new(chain_id: U256, delegate: Address, nonce: u64) -> Self {
        Self {
            chain_id,
            delegate,
            nonce,
        }
    }
}

/// An authorization tuple plus the authority's signature over its digest
///
/// Only produced by signing or by decoding a payload, and immutable after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedAuthorization {
    #[serde(flatten)]
    tuple: AuthorizationTuple,

    #[serde(flatten)]
    signature: Signature,
}

impl SignedAuthorization {
    pub(crate) fn from_parts(tuple: AuthorizationTuple, signature: Signature) -> Self {
        Self { tuple, signature }
    }

    pub fn tuple(&self) -> &AuthorizationTuple {
        &self.tuple
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn chain_id(&self) -> U256 {
        self.tuple.chain_id
    }

    pub fn delegate(&self) -> Address {
        self.tuple.delegate
    }

    pub fn nonce(&self) -> u64 {
        self.tuple.nonce
    }
}

/// Access list entry (address + storage keys)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListEntry {
    pub address: Address,
    pub storage_keys: Vec<H256>,
}

/// Envelope fields in wire order
///
/// A fee of `None` means the fee source could not provide it; it is encoded
/// as the empty byte string in its slot, never dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFields {
    pub chain_id: U256,
    /// Relay nonce
    pub nonce: u64,
    /// `None` and `Some(0)` share the empty-string encoding and decode as `None`
    pub max_priority_fee_per_gas: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub gas_limit: U256,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
    pub access_list: Vec<AccessListEntry>,
    pub authorization_list: Vec<SignedAuthorization>,
}

impl TransactionFields {
    /// Create fields for a call to `to` on `chain_id`
    pub fn new(chain_id: U256, to: Address) -> Self {
        Self {
            chain_id,
            nonce: 0,
            max_priority_fee_per_gas: None,
            max_fee_per_gas: None,
            gas_limit: U256::zero(),
            to,
            value: U256::zero(),
            data: Vec::new(),
            access_list: Vec::new(),
            authorization_list: Vec::new(),
        }
    }

    /// Set the relay nonce
    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Set both fee fields; `None` marks a fee as unavailable
    pub fn with_fees(mut self, max_priority_fee: Option<U256>, max_fee: Option<U256>) -> Self {
        self.max_priority_fee_per_gas = max_priority_fee;
        self.max_fee_per_gas = max_fee;
        self
    }

    pub fn with_gas_limit(mut self, limit: U256) -> Self {
        self.gas_limit = limit;
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    pub fn add_access_list_entry(mut self, entry: AccessListEntry) -> Self {
        self.access_list.push(entry);
        self
    }

    pub fn add_authorization(mut self, auth: SignedAuthorization) -> Self {
        self.authorization_list.push(auth);
        self
    }
}

/// Canonical unsigned envelope and the digest the relay signs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedEnvelope {
    pub(crate) fields: TransactionFields,
    pub(crate) encoded: Vec<u8>,
    pub(crate) digest: Digest,
}

impl UnsignedEnvelope {
    pub fn fields(&self) -> &TransactionFields {
        &self.fields
    }

    /// `0x04 || rlp(fields)`
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }
}

/// Broadcast-ready envelope
#[derive(Debug, PartialEq, Eq)]
pub struct SignedEnvelope {
    pub(crate) fields: TransactionFields,
    pub(crate) signature: Signature,
    pub(crate) encoded: Vec<u8>,
}

impl SignedEnvelope {
    pub fn fields(&self) -> &TransactionFields {
        &self.fields
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// `0x04 || rlp(fields ++ [y_parity, r, s])`
    pub fn raw(&self) -> &[u8] {
        &self.encoded
    }

    pub fn raw_hex(&self) -> String {
        crate::crypto::to_hex(&self.encoded)
    }

    /// Give up the payload bytes, consuming the envelope
    pub fn into_raw(self) -> Vec<u8> {
        self.encoded
    }
}
