//! EIP-7702 Account Delegation
//!
//! Implements the type-`0x04` delegated transaction: an authority signs an
//! authorization tuple granting code-execution rights to a delegate contract,
//! and a relay wraps it in an envelope, pays gas, signs and broadcasts.
//! Reference: https://eips.ethereum.org/EIPS/eip-7702
//!
//! Two independent digests are involved:
//! - authorization digest: `keccak256(0x05 || rlp([chain_id, delegate, nonce]))`
//! - transaction digest: `keccak256(0x04 || rlp([...10 envelope fields]))`

pub mod types;
pub mod authorization;
pub mod transaction;

#[cfg(test)]
mod tests;

pub use types::*;
pub use authorization::*;
pub use transaction::*;
