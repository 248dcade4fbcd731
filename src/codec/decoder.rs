//! Strict RLP decoder

use super::encoder::{
    LONG_LIST_OFFSET, LONG_STRING_OFFSET, SHORT_LIST_OFFSET, SHORT_PAYLOAD_LIMIT,
    SHORT_STRING_OFFSET,
};
use super::RlpItem;
use crate::error::{RelayError, RelayResult};
use ethers_core::types::U256;

/// Deepest list nesting accepted; a signed envelope needs four levels
pub const MAX_DEPTH: usize = 16;

/// Decode exactly one item spanning the whole input
pub fn decode(input: &[u8]) -> RelayResult<RlpItem> {
    let (item, consumed) = decode_item(input, 0)?;
    if consumed != input.len() {
        return Err(RelayError::encoding(format!(
            "{} trailing bytes after item",
            input.len() - consumed
        )));
    }
    Ok(item)
}

/// Decode a list and return its children
pub fn decode_list(input: &[u8]) -> RelayResult<Vec<RlpItem>> {
    match decode(input)? {
        RlpItem::List(items) => Ok(items),
        RlpItem::Bytes(_) => Err(RelayError::encoding("Expected list, found byte string")),
    }
}

/// Interpret raw bytes as a canonical unsigned integer
pub fn decode_uint(data: &[u8]) -> RelayResult<U256> {
    if data.len() > 32 {
        return Err(RelayError::encoding(format!(
            "Integer of {} bytes exceeds 256 bits",
            data.len()
        )));
    }
    if data.first() == Some(&0) {
        return Err(RelayError::encoding("Integer has leading zero bytes"));
    }
    Ok(U256::from_big_endian(data))
}

/// Decode one item from the front of `input`, returning it and its encoded size
fn decode_item(input: &[u8], depth: usize) -> RelayResult<(RlpItem, usize)> {
    let header = parse_header(input)?;
    let end = header
        .offset
        .checked_add(header.payload_len)
        .ok_or_else(|| RelayError::encoding("Length overflow"))?;

    if end > input.len() {
        return Err(RelayError::encoding(format!(
            "Item needs {} bytes, only {} available",
            end,
            input.len()
        )));
    }

    let payload = &input[header.offset..end];

    if !header.is_list {
        if header.single_byte {
            return Ok((RlpItem::Bytes(vec![input[0]]), 1));
        }
        if payload.len() == 1 && payload[0] < SHORT_STRING_OFFSET {
            return Err(RelayError::encoding(
                "Single byte below 0x80 must not carry a length prefix",
            ));
        }
        return Ok((RlpItem::Bytes(payload.to_vec()), end));
    }

    if depth >= MAX_DEPTH {
        return Err(RelayError::encoding(format!(
            "List nesting exceeds {} levels",
            MAX_DEPTH
        )));
    }

    let mut items = Vec::new();
    let mut cursor = 0;
    while cursor < payload.len() {
        let (item, consumed) = decode_item(&payload[cursor..], depth + 1)?;
        items.push(item);
        cursor += consumed;
    }

    Ok((RlpItem::List(items), end))
}

struct Header {
    is_list: bool,
    single_byte: bool,
    offset: usize,
    payload_len: usize,
}

fn parse_header(input: &[u8]) -> RelayResult<Header> {
    let prefix = *input
        .first()
        .ok_or_else(|| RelayError::encoding("Unexpected end of input"))?;

    let header = match prefix {
        0x00..=0x7f => Header {
            is_list: false,
            single_byte: true,
            offset: 0,
            payload_len: 1,
        },
        0x80..=0xb7 => Header {
            is_list: false,
            single_byte: false,
            offset: 1,
            payload_len: (prefix - SHORT_STRING_OFFSET) as usize,
        },
        0xb8..=0xbf => {
            let len_of_len = (prefix - LONG_STRING_OFFSET) as usize;
            Header {
                is_list: false,
                single_byte: false,
                offset: 1 + len_of_len,
                payload_len: read_long_length(input, len_of_len)?,
            }
        }
        0xc0..=0xf7 => Header {
            is_list: true,
            single_byte: false,
            offset: 1,
            payload_len: (prefix - SHORT_LIST_OFFSET) as usize,
        },
        0xf8..=0xff => {
            let len_of_len = (prefix - LONG_LIST_OFFSET) as usize;
            Header {
                is_list: true,
                single_byte: false,
                offset: 1 + len_of_len,
                payload_len: read_long_length(input, len_of_len)?,
            }
        }
    };

    Ok(header)
}

fn read_long_length(input: &[u8], len_of_len: usize) -> RelayResult<usize> {
    if len_of_len > std::mem::size_of::<usize>() {
        return Err(RelayError::encoding("Length of length too large"));
    }

    let len_bytes = input
        .get(1..1 + len_of_len)
        .ok_or_else(|| RelayError::encoding("Truncated length prefix"))?;

    if len_bytes[0] == 0 {
        return Err(RelayError::encoding("Length prefix has leading zero bytes"));
    }

    let len = len_bytes
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);

    if len < SHORT_PAYLOAD_LIMIT {
        return Err(RelayError::encoding(format!(
            "Length {} must use the short form",
            len
        )));
    }

    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encoder::{encode_bytes, encode_u64, encode_uint};

    #[test]
    fn test_decode_uint_values() {
        for n in [0u64, 1, 0x7f, 0x80, 0xff, 0x100, 11_155_111, u64::MAX] {
            let item = decode(&encode_u64(n)).unwrap();
            assert_eq!(item.to_u64().unwrap(), n);
        }
    }

    #[test]
    fn test_decode_max_uint() {
        let item = decode(&encode_uint(U256::MAX)).unwrap();
        assert_eq!(item.to_uint().unwrap(), U256::MAX);
    }

    #[test]
    fn test_decode_long_string() {
        let data = vec![0x42; 300];
        let item = decode(&encode_bytes(&data)).unwrap();
        assert_eq!(item.as_bytes().unwrap(), &data[..]);
    }

    #[test]
    fn test_reject_wrapped_single_byte() {
        assert!(decode(&[0x81, 0x05]).is_err());
        assert!(decode(&[0x81, 0x80]).is_ok());
    }

    #[test]
    fn test_reject_non_minimal_long_form() {
        // 3-byte string written with the long form
        assert!(decode(&[0xb8, 0x03, 0x61, 0x62, 0x63]).is_err());
        // length with a leading zero byte
        let mut input = vec![0xb9, 0x00, 0x40];
        input.extend(vec![0x11; 64]);
        assert!(decode(&input).is_err());
    }

    #[test]
    fn test_reject_truncated_and_trailing() {
        assert!(decode(&[]).is_err());
        assert!(decode(&[0x83, 0x61, 0x62]).is_err());
        assert!(decode(&[0xc2, 0x01]).is_err());
        assert!(decode(&[0x01, 0x02]).is_err());
    }

    #[test]
    fn test_reject_integer_with_leading_zero() {
        assert!(decode_uint(&[0x00, 0x01]).is_err());
        assert!(decode_uint(&[0x00]).is_err());
        assert_eq!(decode_uint(&[]).unwrap(), U256::zero());
        assert!(decode_uint(&[0x01; 33]).is_err());
    }

    #[test]
    fn test_decode_nested_list() {
        let item = decode(&[0xc7, 0xc0, 0xc1, 0xc0, 0xc3, 0xc0, 0xc1, 0xc0]).unwrap();
        let children = item.as_list().unwrap();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0], RlpItem::List(vec![]));
        assert_eq!(children[1], RlpItem::List(vec![RlpItem::List(vec![])]));
    }

    #[test]
    fn test_decode_list_rejects_string() {
        assert!(decode_list(&encode_bytes(b"dog")).is_err());
    }

    fn nested_lists(depth: usize) -> Vec<u8> {
        let mut headers = Vec::with_capacity(depth);
        let mut payload_len = 0usize;
        for _ in 0..depth {
            let header = if payload_len < SHORT_PAYLOAD_LIMIT {
                vec![SHORT_LIST_OFFSET + payload_len as u8]
            } else {
                let len_bytes: Vec<u8> = payload_len
                    .to_be_bytes()
                    .iter()
                    .copied()
                    .skip_while(|b| *b == 0)
                    .collect();
                let mut header = vec![LONG_LIST_OFFSET + len_bytes.len() as u8];
                header.extend(len_bytes);
                header
            };
            payload_len += header.len();
            headers.push(header);
        }
        headers.into_iter().rev().flatten().collect()
    }

    #[test]
    fn test_nesting_limit() {
        assert!(decode(&nested_lists(MAX_DEPTH)).is_ok());
        assert!(matches!(
            decode(&nested_lists(MAX_DEPTH + 1)),
            Err(RelayError::Encoding(_))
        ));
    }

    #[test]
    fn test_deeply_nested_input_is_rejected_without_overflow() {
        let input = nested_lists(10_000);
        assert!(input.len() > 20_000);
        assert!(matches!(decode(&input), Err(RelayError::Encoding(_))));
        assert!(decode_list(&input).is_err());
    }
}
