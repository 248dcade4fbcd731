//! RLP encoder

use crate::error::{RelayError, RelayResult};
use ethers_core::types::U256;

/// Prefix of a byte string shorter than 56 bytes
pub const SHORT_STRING_OFFSET: u8 = 0x80;
/// Prefix base of a byte string whose length needs its own bytes
pub const LONG_STRING_OFFSET: u8 = 0xb7;
/// Prefix of a list whose payload is shorter than 56 bytes
pub const SHORT_LIST_OFFSET: u8 = 0xc0;
/// Prefix base of a list whose payload length needs its own bytes
pub const LONG_LIST_OFFSET: u8 = 0xf7;
/// Payloads at or above this size use the long form
pub const SHORT_PAYLOAD_LIMIT: usize = 56;

/// Encode an arbitrary byte string
pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < SHORT_STRING_OFFSET {
        return data.to_vec();
    }

    let mut encoded = encode_header(data.len(), SHORT_STRING_OFFSET, LONG_STRING_OFFSET);
    encoded.extend_from_slice(data);
    encoded
}

/// Encode an unsigned integer; zero encodes as the empty string (`0x80`)
pub fn encode_uint(value: U256) -> Vec<u8> {
    encode_bytes(&minimal_be_bytes(value))
}

pub fn encode_u64(value: u64) -> Vec<u8> {
    encode_uint(U256::from(value))
}

/// Encode a signed integer, rejecting negative values
pub fn encode_int(value: i128) -> RelayResult<Vec<u8>> {
    if value < 0 {
        return Err(RelayError::encoding(format!(
            "Cannot encode negative integer {}",
            value
        )));
    }
    Ok(encode_uint(U256::from(value as u128)))
}

/// Encode a list from already-encoded items
///
/// Each item must be exactly one canonical RLP item; anything else would
/// silently change the list's structure once concatenated.
pub fn encode_list(items: &[Vec<u8>]) -> RelayResult<Vec<u8>> {
    for (index, item) in items.iter().enumerate() {
        super::decoder::decode(item).map_err(|e| {
            RelayError::encoding(format!("List item {} is not a valid encoded item: {}", index, e))
        })?;
    }

    let payload = items.concat();
    Ok(wrap_list_payload(&payload))
}

/// Prefix an already-concatenated list payload with its list header
pub(crate) fn wrap_list_payload(payload: &[u8]) -> Vec<u8> {
    let mut encoded = encode_header(payload.len(), SHORT_LIST_OFFSET, LONG_LIST_OFFSET);
    encoded.extend_from_slice(payload);
    encoded
}

/// Big-endian bytes of `value` with no leading zeros (empty for zero)
pub fn minimal_be_bytes(value: U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    trim_leading_zeros(&buf).to_vec()
}

/// Strip leading zero bytes from an integer stored as bytes
pub fn trim_leading_zeros(data: &[u8]) -> &[u8] {
    let start = data.iter().position(|&b| b != 0).unwrap_or(data.len());
    &data[start..]
}

fn encode_header(len: usize, short_offset: u8, long_offset: u8) -> Vec<u8> {
    if len < SHORT_PAYLOAD_LIMIT {
        return vec![short_offset + len as u8];
    }

    let len_bytes = len.to_be_bytes();
    let significant = trim_leading_zeros(&len_bytes);

    let mut header = Vec::with_capacity(1 + significant.len());
    header.push(long_offset + significant.len() as u8);
    header.extend_from_slice(significant);
    header
}
