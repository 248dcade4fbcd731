//! EIP-7702 Transaction Building and Encoding
//!
//! Field order is fixed:
//! `[chain_id, nonce, max_priority_fee_per_gas, max_fee_per_gas, gas_limit,
//!   destination, value, data, access_list, authorization_list]`
//! and the broadcast form appends `[y_parity, r, s]`. The signed form is always
//! re-encoded from the fields; splicing bytes onto the unsigned payload would
//! leave a stale list-length prefix.

use super::authorization::address_field;
use super::types::{
    AccessListEntry, AuthorizationTuple, SignedAuthorization, SignedEnvelope, TransactionFields,
    UnsignedEnvelope, AUTHORIZATION_FIELD_COUNT, EIP7702_TX_TYPE, SIGNED_FIELD_COUNT,
    UNSIGNED_FIELD_COUNT,
};
use crate::codec::{self, trim_leading_zeros, RlpItem};
use crate::crypto::{self, keccak256, Digest, PrivateKey, Signature};
use crate::error::{RelayError, RelayResult};
use crate::log_debug;
use ethers_core::types::{H256, U256};

/// Validate fields and produce the canonical unsigned envelope and its digest
pub fn build_unsigned(fields: TransactionFields) -> RelayResult<UnsignedEnvelope> {
    validate_fields(&fields)?;

    let encoded = typed_payload(field_items(&fields));
    let digest = keccak256(&encoded);

    log_debug!(
        "eip7702::transaction",
        "Unsigned envelope built",
        tx_nonce = fields.nonce,
        authorizations = fields.authorization_list.len(),
        size = encoded.len(),
    );

    Ok(UnsignedEnvelope {
        fields,
        encoded,
        digest,
    })
}

/// Append the relay signature and re-encode for broadcast
///
/// `r` and `s` are written as exactly 32 bytes in the trailer.
pub fn attach_signature(
    unsigned: UnsignedEnvelope,
    signature: Signature,
) -> RelayResult<SignedEnvelope> {
    signature.validate()?;

    let mut items = field_items(&unsigned.fields);
    items.push(RlpItem::u64(signature.y_parity as u64));
    items.push(RlpItem::bytes(signature.r.to_vec()));
    items.push(RlpItem::bytes(signature.s.to_vec()));

    Ok(SignedEnvelope {
        fields: unsigned.fields,
        signature,
        encoded: typed_payload(items),
    })
}

/// Sign the unsigned digest with the relay key and attach the signature
pub fn sign_envelope(unsigned: UnsignedEnvelope, relay_key: &PrivateKey) -> RelayResult<SignedEnvelope> {
    let signature = crypto::sign(unsigned.digest(), relay_key)?;
    attach_signature(unsigned, signature)
}

/// Parse a broadcast payload back into its fields and signature
///
/// The decoded fields go through the same checks as [`build_unsigned`].
pub fn decode_signed_envelope(raw: &[u8]) -> RelayResult<SignedEnvelope> {
    let (&type_byte, body) = raw
        .split_first()
        .ok_or_else(|| RelayError::encoding("Empty transaction payload"))?;

    if type_byte != EIP7702_TX_TYPE {
        return Err(RelayError::encoding(format!(
            "Expected transaction type 0x{:02x}, found 0x{:02x}",
            EIP7702_TX_TYPE, type_byte
        )));
    }

    let items = codec::decode_list(body)?;
    if items.len() != SIGNED_FIELD_COUNT {
        return Err(RelayError::encoding(format!(
            "Signed envelope has {} fields, expected {}",
            items.len(),
            SIGNED_FIELD_COUNT
        )));
    }

    let fields = TransactionFields {
        chain_id: items[0].to_uint()?,
        nonce: items[1].to_u64()?,
        max_priority_fee_per_gas: optional_fee(&items[2])?,
        max_fee_per_gas: optional_fee(&items[3])?,
        gas_limit: items[4].to_uint()?,
        to: address_field(&items[5])?,
        value: items[6].to_uint()?,
        data: bytes_field(&items[7], "data")?.to_vec(),
        access_list: decode_access_list(&items[8])?,
        authorization_list: decode_authorization_list(&items[9])?,
    };
    validate_fields(&fields)?;

    let y_parity = u8::try_from(items[10].to_u64()?)
        .map_err(|_| RelayError::recovery("y_parity does not fit in a byte"))?;
    let signature = Signature::new(
        left_pad_32(bytes_field(&items[11], "r")?)?,
        left_pad_32(bytes_field(&items[12], "s")?)?,
        y_parity,
    )?;

    Ok(SignedEnvelope {
        fields,
        signature,
        encoded: raw.to_vec(),
    })
}

/// Check the fields before anything is signed
pub fn validate_fields(fields: &TransactionFields) -> RelayResult<()> {
    if fields.authorization_list.is_empty() {
        return Err(RelayError::validation("Authorization list must not be empty"));
    }

    if fields.chain_id.is_zero() {
        return Err(RelayError::validation("Transaction chain id must be non-zero"));
    }

    if fields.gas_limit.is_zero() {
        return Err(RelayError::validation("Gas limit must be greater than zero"));
    }

    if let (Some(priority), Some(max)) = (fields.max_priority_fee_per_gas, fields.max_fee_per_gas) {
        if priority > max {
            return Err(RelayError::validation(format!(
                "maxPriorityFeePerGas {} exceeds maxFeePerGas {}",
                priority, max
            )));
        }
    }

    for (index, auth) in fields.authorization_list.iter().enumerate() {
        if !auth.chain_id().is_zero() && auth.chain_id() != fields.chain_id {
            return Err(RelayError::validation(format!(
                "Authorization {} is for chain {}, transaction is for chain {}",
                index,
                auth.chain_id(),
                fields.chain_id
            )));
        }
        auth.signature().validate()?;
    }

    Ok(())
}

impl UnsignedEnvelope {
    /// Top-level RLP items of the unsigned field list
    pub fn field_items(&self) -> Vec<RlpItem> {
        field_items(&self.fields)
    }
}

impl SignedEnvelope {
    /// Digest the relay signed
    pub fn signing_digest(&self) -> Digest {
        keccak256(&typed_payload(field_items(&self.fields)))
    }

    /// Transaction hash the network reports for this payload
    pub fn transaction_hash(&self) -> Digest {
        keccak256(&self.encoded)
    }

    /// Recover the relay (sender) address
    pub fn recover_sender(&self) -> RelayResult<ethers_core::types::Address> {
        crypto::recover_address(&self.signing_digest(), &self.signature)
    }
}

/// `0x04 || rlp(items)`
fn typed_payload(items: Vec<RlpItem>) -> Vec<u8> {
    let list = RlpItem::list(items).encode();
    let mut encoded = Vec::with_capacity(1 + list.len());
    encoded.push(EIP7702_TX_TYPE);
    encoded.extend_from_slice(&list);
    encoded
}

fn field_items(fields: &TransactionFields) -> Vec<RlpItem> {
    let items = vec![
        RlpItem::uint(fields.chain_id),
        RlpItem::u64(fields.nonce),
        fee_item(fields.max_priority_fee_per_gas),
        fee_item(fields.max_fee_per_gas),
        RlpItem::uint(fields.gas_limit),
        RlpItem::bytes(fields.to.as_bytes()),
        RlpItem::uint(fields.value),
        RlpItem::bytes(fields.data.clone()),
        access_list_item(&fields.access_list),
        authorization_list_item(&fields.authorization_list),
    ];
    debug_assert_eq!(items.len(), UNSIGNED_FIELD_COUNT);
    items
}

fn fee_item(fee: Option<U256>) -> RlpItem {
    match fee {
        Some(value) => RlpItem::uint(value),
        None => RlpItem::bytes(Vec::new()),
    }
}

fn access_list_item(access_list: &[AccessListEntry]) -> RlpItem {
    RlpItem::list(
        access_list
            .iter()
            .map(|entry| {
                RlpItem::list(vec![
                    RlpItem::bytes(entry.address.as_bytes()),
                    RlpItem::list(
                        entry
                            .storage_keys
                            .iter()
                            .map(|key| RlpItem::bytes(key.as_bytes()))
                            .collect(),
                    ),
                ])
            })
            .collect(),
    )
}

/// Each entry is `[delegate, chain_id, nonce, y_parity, r, s]` with every
/// scalar minimally encoded (no 32-byte padding inside this inner list).
fn authorization_list_item(auths: &[SignedAuthorization]) -> RlpItem {
    RlpItem::list(
        auths
            .iter()
            .map(|auth| {
                let sig = auth.signature();
                RlpItem::list(vec![
                    RlpItem::bytes(auth.delegate().as_bytes()),
                    RlpItem::uint(auth.chain_id()),
                    RlpItem::u64(auth.nonce()),
                    RlpItem::u64(sig.y_parity as u64),
                    RlpItem::bytes(trim_leading_zeros(&sig.r)),
                    RlpItem::bytes(trim_leading_zeros(&sig.s)),
                ])
            })
            .collect(),
    )
}

fn decode_access_list(item: &RlpItem) -> RelayResult<Vec<AccessListEntry>> {
    let entries = list_field(item, "access list")?;
    entries
        .iter()
        .map(|entry| {
            let parts = list_field(entry, "access list entry")?;
            if parts.len() != 2 {
                return Err(RelayError::encoding("Access list entry must have 2 fields"));
            }
            let storage_keys = list_field(&parts[1], "storage keys")?
                .iter()
                .map(|key| {
                    let bytes = bytes_field(key, "storage key")?;
                    if bytes.len() != 32 {
                        return Err(RelayError::encoding("Storage key must be 32 bytes"));
                    }
                    Ok(H256::from_slice(bytes))
                })
                .collect::<RelayResult<Vec<_>>>()?;
            Ok(AccessListEntry {
                address: address_field(&parts[0])?,
                storage_keys,
            })
        })
        .collect()
}

fn decode_authorization_list(item: &RlpItem) -> RelayResult<Vec<SignedAuthorization>> {
    let entries = list_field(item, "authorization list")?;
    entries
        .iter()
        .map(|entry| {
            let parts = list_field(entry, "authorization")?;
            if parts.len() != AUTHORIZATION_FIELD_COUNT {
                return Err(RelayError::encoding(format!(
                    "Authorization has {} fields, expected {}",
                    parts.len(),
                    AUTHORIZATION_FIELD_COUNT
                )));
            }

            let tuple = AuthorizationTuple {
                delegate: address_field(&parts[0])?,
                chain_id: parts[1].to_uint()?,
                nonce: parts[2].to_u64()?,
            };
            let y_parity = u8::try_from(parts[3].to_u64()?)
                .map_err(|_| RelayError::recovery("y_parity does not fit in a byte"))?;
            let signature = Signature::new(
                scalar_field(&parts[4])?,
                scalar_field(&parts[5])?,
                y_parity,
            )?;

            Ok(SignedAuthorization::from_parts(tuple, signature))
        })
        .collect()
}

/// The empty string is read as an unavailable fee, so a zero fee comes back as `None`
fn optional_fee(item: &RlpItem) -> RelayResult<Option<U256>> {
    match item.as_bytes() {
        Some([]) => Ok(None),
        _ => item.to_uint().map(Some),
    }
}

/// Minimally encoded scalar, widened to 32 bytes
fn scalar_field(item: &RlpItem) -> RelayResult<[u8; 32]> {
    let value = item.to_uint()?;
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    Ok(out)
}

fn left_pad_32(bytes: &[u8]) -> RelayResult<[u8; 32]> {
    if bytes.len() > 32 {
        return Err(RelayError::encoding(format!(
            "Signature scalar of {} bytes exceeds 32",
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}

fn bytes_field<'a>(item: &'a RlpItem, name: &str) -> RelayResult<&'a [u8]> {
    item.as_bytes()
        .ok_or_else(|| RelayError::encoding(format!("Expected byte string for {}", name)))
}

fn list_field<'a>(item: &'a RlpItem, name: &str) -> RelayResult<&'a [RlpItem]> {
    item.as_list()
        .ok_or_else(|| RelayError::encoding(format!("Expected list for {}", name)))
}

