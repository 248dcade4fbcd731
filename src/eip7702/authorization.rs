//! EIP-7702 Authorization Handling
//!
//! Implements authorization signing and verification.

use super::types::{AuthorizationTuple, SignedAuthorization, AUTHORIZATION_MAGIC};
use crate::codec::{self, RlpItem};
use crate::crypto::{self, tagged_digest, to_checksum_address, Digest, PrivateKey};
use crate::error::{RelayError, RelayResult};
use crate::log_info;
use ethers_core::types::{Address, U256};

/// RLP encode an authorization for signing
///
/// Per EIP-7702: `rlp([chain_id, address, nonce])`
pub fn authorization_payload(tuple: &AuthorizationTuple) -> Vec<u8> {
    RlpItem::list(vec![
        RlpItem::uint(tuple.chain_id),
        RlpItem::bytes(tuple.delegate.as_bytes()),
        RlpItem::u64(tuple.nonce),
    ])
    .encode()
}

/// Get the hash to sign for an authorization
///
/// Per EIP-7702: `keccak256(0x05 || rlp([chain_id, address, nonce]))`
pub fn authorization_digest(tuple: &AuthorizationTuple) -> Digest {
    tagged_digest(AUTHORIZATION_MAGIC, &authorization_payload(tuple))
}

/// Parse a tagged authorization message back into its tuple
///
/// Any tag other than the authorization magic byte is unrecognized.
pub fn parse_authorization_message(message: &[u8]) -> RelayResult<AuthorizationTuple> {
    let (&tag, payload) = message
        .split_first()
        .ok_or_else(|| RelayError::validation("Empty authorization message"))?;

    if tag != AUTHORIZATION_MAGIC {
        return Err(RelayError::validation(format!(
            "Unrecognized authorization tag 0x{:02x}",
            tag
        )));
    }

    let items = codec::decode_list(payload)?;
    if items.len() != 3 {
        return Err(RelayError::encoding(format!(
            "Authorization tuple has {} fields, expected 3",
            items.len()
        )));
    }

    Ok(AuthorizationTuple {
        chain_id: items[0].to_uint()?,
        delegate: address_field(&items[1])?,
        nonce: items[2].to_u64()?,
    })
}

/// Sign an authorization and verify it before handing it out
///
/// The signature is recovered immediately; if the recovered signer is not
/// `expected_authority` the signature is discarded and
/// [`RelayError::AuthorizationIntegrity`] is returned.
pub fn build_authorization(
    chain_id: U256,
    delegate: Address,
    nonce: u64,
    authority_key: &PrivateKey,
    expected_authority: Address,
) -> RelayResult<SignedAuthorization> {
    let tuple = AuthorizationTuple::new(chain_id, delegate, nonce);
    let digest = authorization_digest(&tuple);

    let signature = crypto::sign(&digest, authority_key)?;
    let recovered = crypto::recover_address(&digest, &signature)?;

    if recovered != expected_authority {
        return Err(RelayError::AuthorizationIntegrity {
            expected: to_checksum_address(&expected_authority),
            recovered: to_checksum_address(&recovered),
        });
    }

    log_info!(
        "eip7702::authorization",
        "Authorization signed",
        authority = to_checksum_address(&recovered),
        delegate = to_checksum_address(&delegate),
        chain_id = chain_id,
        auth_nonce = nonce,
    );

    Ok(SignedAuthorization::from_parts(tuple, signature))
}

impl SignedAuthorization {
    /// Digest the authority signed
    pub fn digest(&self) -> Digest {
        authorization_digest(self.tuple())
    }

    /// Recover the authority address from the signature
    pub fn recover_authority(&self) -> RelayResult<Address> {
        crypto::recover_address(&self.digest(), self.signature())
    }

    /// Check the authorization was signed by `expected`
    pub fn verify(&self, expected: &Address) -> RelayResult<()> {
        let recovered = self.recover_authority()?;
        if recovered != *expected {
            return Err(RelayError::AuthorizationIntegrity {
                expected: to_checksum_address(expected),
                recovered: to_checksum_address(&recovered),
            });
        }
        Ok(())
    }
}

pub(crate) fn address_field(item: &RlpItem) -> RelayResult<Address> {
    let bytes = item
        .as_bytes()
        .ok_or_else(|| RelayError::encoding("Expected address, found list"))?;
    if bytes.len() != 20 {
        return Err(RelayError::encoding(format!(
            "Address must be 20 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(Address::from_slice(bytes))
}
