//! Input Sanitization
//!
//! Parsing of user-supplied addresses, quantities, hex blobs and endpoint
//! URLs. Everything here fails with a validation error before any key is
//! touched.

use crate::crypto::to_checksum_address;
use crate::error::{RelayError, RelayResult};
use ethers_core::types::{Address, U256};

/// Maximum accepted length of a URL
pub const MAX_URL_LENGTH: usize = 2048;

/// Strip surrounding whitespace and any control characters
fn clean(input: &str) -> String {
    input.trim().chars().filter(|c| !c.is_control()).collect()
}

/// Decode hex with or without `0x`, optionally checking the decoded length
pub fn validate_hex(input: &str, expected_bytes: Option<usize>) -> RelayResult<Vec<u8>> {
    let cleaned = clean(input);
    let body = cleaned.strip_prefix("0x").unwrap_or(&cleaned);

    if !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RelayError::validation("Invalid hexadecimal string"));
    }

    if body.len() % 2 != 0 {
        return Err(RelayError::validation(
            "Hex string must have even number of characters",
        ));
    }

    let bytes = hex::decode(body)?;

    if let Some(expected) = expected_bytes {
        if bytes.len() != expected {
            return Err(RelayError::validation(format!(
                "Expected {} bytes, got {}",
                expected,
                bytes.len()
            )));
        }
    }

    Ok(bytes)
}

/// Parse a 20-byte address
///
/// All-lowercase and all-uppercase input is accepted as is; mixed case must
/// carry a valid EIP-55 checksum.
pub fn parse_address(input: &str) -> RelayResult<Address> {
    let cleaned = clean(input);
    let bytes = validate_hex(&cleaned, Some(20))
        .map_err(|e| RelayError::validation(format!("Invalid address '{}': {}", cleaned, e)))?;
    let address = Address::from_slice(&bytes);

    let body = cleaned.strip_prefix("0x").unwrap_or(&cleaned);
    let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        let expected = to_checksum_address(&address);
        if expected[2..] != *body {
            return Err(RelayError::validation(format!(
                "Address '{}' has an invalid checksum",
                cleaned
            )));
        }
    }

    Ok(address)
}

/// Parse a non-negative quantity, decimal or `0x` hex
pub fn parse_quantity(input: &str) -> RelayResult<U256> {
    let cleaned = clean(input);

    if cleaned.is_empty() {
        return Err(RelayError::validation("Quantity cannot be empty"));
    }
    if cleaned.starts_with('-') {
        return Err(RelayError::validation(format!(
            "Quantity '{}' must not be negative",
            cleaned
        )));
    }

    let parsed = match cleaned.strip_prefix("0x") {
        Some(hex_part) if !hex_part.is_empty() => U256::from_str_radix(hex_part, 16).ok(),
        Some(_) => None,
        None => U256::from_dec_str(&cleaned).ok(),
    };

    parsed.ok_or_else(|| RelayError::validation(format!("Invalid quantity '{}'", cleaned)))
}

/// Parse a quantity that must fit in 64 bits (nonces)
pub fn parse_u64(input: &str) -> RelayResult<u64> {
    let value = parse_quantity(input)?;
    if value > U256::from(u64::MAX) {
        return Err(RelayError::validation(format!(
            "Value {} does not fit in 64 bits",
            value
        )));
    }
    Ok(value.as_u64())
}

/// Check an RPC endpoint URL
///
/// Only http(s) is accepted and credentials must not be embedded in the URL.
pub fn validate_safe_url(input: &str) -> RelayResult<url::Url> {
    let cleaned = clean(input);

    if cleaned.len() > MAX_URL_LENGTH {
        return Err(RelayError::validation("URL is too long"));
    }

    let parsed = url::Url::parse(&cleaned)
        .map_err(|e| RelayError::validation(format!("Invalid URL: {}", e)))?;

    let scheme = parsed.scheme();
    if !["http", "https"].contains(&scheme) {
        return Err(RelayError::validation(format!(
            "URL scheme '{}' is not allowed",
            scheme
        )));
    }

    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(RelayError::validation(
            "URLs with embedded credentials are not allowed",
        ));
    }

    if parsed.host_str().is_none() {
        return Err(RelayError::validation("URL has no host"));
    }

    Ok(parsed)
}
