//! Canonical RLP codec
//!
//! Recursive-length-prefix encoding used for both hashing and wire
//! transmission:
//! - byte strings with length prefixes
//! - unsigned integers in minimal big-endian form (zero is the empty string)
//! - nested lists of already-encoded items
//!
//! Decoding is strict: any non-canonical form is rejected so that a payload
//! has exactly one byte representation.

pub mod encoder;
pub mod decoder;

pub use encoder::*;
pub use decoder::*;

use ethers_core::types::U256;

/// A decoded RLP value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem {
    Bytes(Vec<u8>),
    List(Vec<RlpItem>),
}

impl RlpItem {
    /// Byte string item
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        RlpItem::Bytes(data.into())
    }

    /// Unsigned integer item in minimal big-endian form
    pub fn uint(value: U256) -> Self {
        RlpItem::Bytes(encoder::minimal_be_bytes(value))
    }

    pub fn u64(value: u64) -> Self {
        Self::uint(U256::from(value))
    }

    pub fn list(items: Vec<RlpItem>) -> Self {
        RlpItem::List(items)
    }

    /// Canonical encoding of this item and all children
    pub fn encode(&self) -> Vec<u8> {
        match self {
            RlpItem::Bytes(data) => encoder::encode_bytes(data),
            RlpItem::List(items) => {
                let payload: Vec<u8> = items.iter().flat_map(|item| item.encode()).collect();
                encoder::wrap_list_payload(&payload)
            }
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RlpItem::Bytes(data) => Some(data),
            RlpItem::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RlpItem]> {
        match self {
            RlpItem::List(items) => Some(items),
            RlpItem::Bytes(_) => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, RlpItem::List(_))
    }

    /// Interpret a byte string item as a canonical unsigned integer
    pub fn to_uint(&self) -> crate::error::RelayResult<U256> {
        match self {
            RlpItem::Bytes(data) => decoder::decode_uint(data),
            RlpItem::List(_) => Err(crate::error::RelayError::encoding(
                "Expected integer, found list",
            )),
        }
    }

    /// Interpret a byte string item as an integer that fits in 64 bits
    pub fn to_u64(&self) -> crate::error::RelayResult<u64> {
        let value = self.to_uint()?;
        if value > U256::from(u64::MAX) {
            return Err(crate::error::RelayError::encoding(format!(
                "Integer {} does not fit in 64 bits",
                value
            )));
        }
        Ok(value.as_u64())
    }
}
