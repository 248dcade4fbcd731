//! Delegate Relay Core Library
//!
//! Builds, signs and broadcasts EIP-7702 delegated transactions: an authority
//! signs an authorization granting a delegate contract code-execution rights
//! over its account, and a relay wraps it in a type-`0x04` envelope, pays gas
//! and broadcasts.
//!
//! # Architecture
//!
//! - **codec**: canonical RLP encoding and strict decoding
//! - **crypto**: keccak digests, secp256k1 signing and signer recovery
//! - **eip7702**: authorization builder and transaction envelope builder
//! - **tx**: chain-state provider, broadcaster and the relay pipeline
//! - **config**: explicit relay configuration
//! - **utils**: redacting logger, input sanitization, JSON-RPC transport
//!
//! # Security
//!
//! Private keys are held in zeroizing buffers and never logged. Every
//! authorization is recovered and checked against the expected authority
//! before it is returned.
//!
//! # Example
//!
//! ```rust,ignore
//! use delegate_relay::{build_authorization, build_unsigned, sign_envelope, PrivateKey, TransactionFields};
//!
//! let authority = PrivateKey::from_hex(authority_hex)?;
//! let relay = PrivateKey::from_hex(relay_hex)?;
//!
//! let auth = build_authorization(chain_id, delegate, 0, &authority, authority.address()?)?;
//! let fields = TransactionFields::new(chain_id, authority.address()?)
//!     .with_nonce(relay_nonce)
//!     .with_gas_limit(gas_limit)
//!     .add_authorization(auth);
//! let signed = sign_envelope(build_unsigned(fields)?, &relay)?;
//! println!("{}", signed.raw_hex());
//! ```

pub mod codec;
pub mod config;
pub mod crypto;
pub mod eip7702;
pub mod error;
pub mod serde_bytes;
pub mod tx;
pub mod utils;

pub use config::{RelayConfig, RetryPolicy};
pub use crypto::{keccak256, recover_address, sign, to_checksum_address, Digest, PrivateKey, Signature};
pub use eip7702::{
    attach_signature, authorization_digest, build_authorization, build_unsigned,
    decode_signed_envelope, sign_envelope, AuthorizationTuple, SignedAuthorization,
    SignedEnvelope, TransactionFields, UnsignedEnvelope,
};
pub use error::{ErrorBody, ErrorCode, RelayError, RelayResult};
pub use tx::{
    Broadcaster, ChainStateProvider, DelegatedRelay, FeeData, RelayRequest, RetryingProvider,
    RpcBroadcaster, RpcProvider, StaticProvider,
};
