//! Signing service
//!
//! Recoverable secp256k1 signatures over 32-byte digests. Nonces are derived
//! deterministically (RFC 6979) from the key and the digest, so two different
//! digests never share an ephemeral nonce under the same key.

use super::digest::{address_from_public_key, Digest};
use crate::error::{RelayError, RelayResult};
use ethers_core::types::Address;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

/// Offset between a legacy `v` value (27/28) and the y-parity bit
pub const LEGACY_V_OFFSET: u64 = 27;

/// secp256k1 group order `n`
pub const SECP256K1_ORDER: [u8; 32] = secp256k1::constants::CURVE_ORDER;

/// `n / 2`, the upper bound for low-s signatures
pub const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

/// A raw secp256k1 private key, zeroed on drop
pub struct PrivateKey {
    bytes: Zeroizing<[u8; 32]>,
}

impl PrivateKey {
    /// Build a key from 32 raw bytes
    pub fn from_bytes(bytes: &[u8]) -> RelayResult<Self> {
        if bytes.len() != 32 {
            return Err(RelayError::signing(format!(
                "Expected 32-byte private key, got {} bytes",
                bytes.len()
            )));
        }

        SecretKey::from_slice(bytes)
            .map_err(|e| RelayError::signing(format!("Invalid private key: {}", e)))?;

        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(bytes);
        Ok(Self { bytes: key })
    }

    /// Parse a hex key with or without `0x`
    pub fn from_hex(input: &str) -> RelayResult<Self> {
        let trimmed = input.trim();
        let clean = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let decoded = Zeroizing::new(
            hex::decode(clean).map_err(|_| RelayError::signing("Private key is not valid hex"))?,
        );
        Self::from_bytes(&decoded)
    }

    /// Address controlled by this key
    pub fn address(&self) -> RelayResult<Address> {
        let secp = Secp256k1::signing_only();
        let public_key = PublicKey::from_secret_key(&secp, &self.secret_key()?);
        Ok(address_from_public_key(&public_key.serialize_uncompressed()))
    }

    fn secret_key(&self) -> RelayResult<SecretKey> {
        SecretKey::from_slice(self.bytes.as_ref())
            .map_err(|e| RelayError::signing(format!("Invalid private key: {}", e)))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

/// Recoverable ECDSA signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    #[serde(with = "crate::serde_bytes::hex32")]
    pub r: [u8; 32],

    #[serde(with = "crate::serde_bytes::hex32")]
    pub s: [u8; 32],

    /// 0 or 1
    pub y_parity: u8,
}

impl Signature {
    /// Build a signature, rejecting out-of-range components
    pub fn new(r: [u8; 32], s: [u8; 32], y_parity: u8) -> RelayResult<Self> {
        let sig = Self { r, s, y_parity };
        sig.validate()?;
        Ok(sig)
    }

    /// Build from a raw recovery value (`0`/`1` or legacy `27`/`28`)
    pub fn from_raw_v(r: [u8; 32], s: [u8; 32], v: u64) -> RelayResult<Self> {
        let parity = if v >= LEGACY_V_OFFSET { v - LEGACY_V_OFFSET } else { v };
        if parity > 1 {
            return Err(RelayError::recovery(format!(
                "Recovery value {} does not map to a y-parity of 0 or 1",
                v
            )));
        }
        Self::new(r, s, parity as u8)
    }

    /// Check `y_parity ∈ {0,1}`, `0 < r < n` and `0 < s <= n/2`
    pub fn validate(&self) -> RelayResult<()> {
        if self.y_parity > 1 {
            return Err(RelayError::recovery(format!(
                "y_parity must be 0 or 1, got {}",
                self.y_parity
            )));
        }
        if self.r == [0u8; 32] || self.r >= SECP256K1_ORDER {
            return Err(RelayError::recovery("r is outside the curve order range"));
        }
        if self.s == [0u8; 32] || self.s >= SECP256K1_ORDER {
            return Err(RelayError::recovery("s is outside the curve order range"));
        }
        if self.s > SECP256K1_HALF_ORDER {
            return Err(RelayError::recovery("s is in the upper half of the curve order"));
        }
        Ok(())
    }

    /// 65-byte `r || s || v` with legacy `v = 27 + y_parity`
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut sig = [0u8; 65];
        sig[..32].copy_from_slice(&self.r);
        sig[32..64].copy_from_slice(&self.s);
        sig[64] = self.y_parity + LEGACY_V_OFFSET as u8;
        sig
    }
}

/// Sign a 32-byte digest
pub fn sign(digest: &Digest, key: &PrivateKey) -> RelayResult<Signature> {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest(*digest);

    let (recovery_id, compact) = secp
        .sign_ecdsa_recoverable(&message, &key.secret_key()?)
        .serialize_compact();

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&compact[..32]);
    s.copy_from_slice(&compact[32..]);

    let y_parity = u8::try_from(recovery_id.to_i32())
        .map_err(|_| RelayError::signing("Negative recovery id"))?;

    Signature::new(r, s, y_parity)
        .map_err(|e| RelayError::signing(format!("Produced unusable signature: {}", e)))
}

/// Recover the signer address of `digest`
pub fn recover_address(digest: &Digest, signature: &Signature) -> RelayResult<Address> {
    signature.validate()?;

    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(*digest);

    let recovery_id = RecoveryId::from_i32(signature.y_parity as i32)
        .map_err(|e| RelayError::recovery(e.to_string()))?;

    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(&signature.r);
    compact[32..].copy_from_slice(&signature.s);

    let recoverable = RecoverableSignature::from_compact(&compact, recovery_id)
        .map_err(|e| RelayError::recovery(e.to_string()))?;

    let public_key = secp
        .recover_ecdsa(&message, &recoverable)
        .map_err(|e| RelayError::recovery(e.to_string()))?;

    Ok(address_from_public_key(&public_key.serialize_uncompressed()))
}
