//! Digest service
//!
//! One fixed hash primitive for every digest in the crate.

use ethers_core::types::Address;
use tiny_keccak::{Hasher, Keccak};

/// A 32-byte Keccak-256 digest
pub type Digest = [u8; 32];

/// Keccak256 hash of an arbitrary byte sequence
pub fn keccak256(data: &[u8]) -> Digest {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Hash the concatenation of a one-byte tag and a payload
pub fn tagged_digest(tag: u8, payload: &[u8]) -> Digest {
    let mut hasher = Keccak::v256();
    hasher.update(&[tag]);
    hasher.update(payload);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Address owning an uncompressed public key (65 bytes, `0x04` prefixed)
pub fn address_from_public_key(uncompressed: &[u8; 65]) -> Address {
    let hash = keccak256(&uncompressed[1..]);
    Address::from_slice(&hash[12..])
}

/// Convert raw address bytes to an EIP-55 checksummed string
pub fn to_checksum_address(address: &Address) -> String {
    let lower = hex::encode(address.as_bytes());
    let hash = keccak256(lower.as_bytes());

    let mut result = String::from("0x");
    for (i, ch) in lower.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };

        if ch.is_ascii_digit() || nibble < 8 {
            result.push(ch);
        } else {
            result.push(ch.to_ascii_uppercase());
        }
    }

    result
}

/// `0x`-prefixed lowercase hex
pub fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}
