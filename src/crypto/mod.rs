//! Cryptographic primitives for the relay
//!
//! This module provides:
//! - Keccak-256 digests shared by authorization and transaction hashing
//! - secp256k1 recoverable signing and signer address recovery
//! - Zeroizing private key handling

pub mod digest;
pub mod signer;

pub use digest::*;
pub use signer::*;
