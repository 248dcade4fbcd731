//! EIP-7702 Tests
//!
//! Authorization signing, envelope construction and decoding.

#[cfg(test)]
mod tests {
    use crate::codec::{self, RlpItem};
    use crate::crypto::{keccak256, PrivateKey, Signature, SECP256K1_HALF_ORDER};
    use crate::eip7702::*;
    use crate::error::RelayError;
    use ethers_core::types::{Address, H256, U256};

    const SEPOLIA: u64 = 11_155_111;

    fn key(byte: u8) -> PrivateKey {
        let mut bytes = [0u8; 32];
        bytes[31] = byte;
        PrivateKey::from_bytes(&bytes).unwrap()
    }

    fn delegate() -> Address {
        "0x571D806987bB6579d80002d49274d25A216c31da".parse().unwrap()
    }

    fn chain() -> U256 {
        U256::from(SEPOLIA)
    }

    fn signed_auth(nonce: u64) -> SignedAuthorization {
        let authority = key(1);
        build_authorization(chain(), delegate(), nonce, &authority, authority.address().unwrap()).unwrap()
    }

    fn fields() -> TransactionFields {
        TransactionFields::new(chain(), key(1).address().unwrap())
            .with_nonce(3)
            .with_fees(Some(U256::from(2_000_000_000u64)), Some(U256::from(30_000_000_000u64)))
            .with_gas_limit(U256::from(80_000u64))
            .with_data(vec![0x55, 0x24, 0x10, 0x77])
            .add_authorization(signed_auth(0))
    }

    fn top_level(encoded: &[u8]) -> Vec<RlpItem> {
        assert_eq!(encoded[0], EIP7702_TX_TYPE);
        codec::decode_list(&encoded[1..]).unwrap()
    }

    // === Authorization Tests ===

    #[test]
    fn test_authorization_recovers_authority() {
        let auth = signed_auth(0);
        assert_eq!(auth.recover_authority().unwrap(), key(1).address().unwrap());
        assert!(auth.verify(&key(1).address().unwrap()).is_ok());
    }

    #[test]
    fn test_wrong_expected_authority_fails() {
        let err = build_authorization(chain(), delegate(), 0, &key(1), key(2).address().unwrap()).unwrap_err();
        assert!(matches!(err, RelayError::AuthorizationIntegrity { .. }));

        let auth = signed_auth(0);
        assert!(matches!(
            auth.verify(&key(2).address().unwrap()),
            Err(RelayError::AuthorizationIntegrity { .. })
        ));
    }

    #[test]
    fn test_different_chain_ids_different_digests() {
        let a = authorization_digest(&AuthorizationTuple::new(U256::from(1u64), delegate(), 0));
        let b = authorization_digest(&AuthorizationTuple::new(chain(), delegate(), 0));
        let any = authorization_digest(&AuthorizationTuple::new(U256::zero(), delegate(), 0));
        assert_ne!(a, b);
        assert_ne!(a, any);
    }

    #[test]
    fn test_different_nonces_different_digests() {
        let a = authorization_digest(&AuthorizationTuple::new(chain(), delegate(), 0));
        let b = authorization_digest(&AuthorizationTuple::new(chain(), delegate(), 1));
        assert_ne!(a, b);
    }

    #[test]
    fn test_authorization_signature_is_low_s() {
        for nonce in 0..8 {
            assert!(signed_auth(nonce).signature().s <= SECP256K1_HALF_ORDER);
        }
    }

    #[test]
    fn test_authorization_json() {
        let json = serde_json::to_value(signed_auth(0)).unwrap();
        assert_eq!(json["chainId"], "0xaa36a7");
        assert_eq!(json["nonce"], 0);
        assert!(json["r"].as_str().unwrap().starts_with("0x"));
        assert!(json["yParity"].as_u64().unwrap() <= 1);
    }

    // === Envelope Tests ===

    #[test]
    fn test_unsigned_has_ten_fields() {
        let unsigned = build_unsigned(fields()).unwrap();
        assert_eq!(top_level(unsigned.encoded()).len(), UNSIGNED_FIELD_COUNT);
        assert_eq!(unsigned.field_items().len(), UNSIGNED_FIELD_COUNT);
        assert_eq!(*unsigned.digest(), keccak256(unsigned.encoded()));
    }

    #[test]
    fn test_build_unsigned_is_deterministic() {
        let a = build_unsigned(fields()).unwrap();
        let b = build_unsigned(fields()).unwrap();
        assert_eq!(a.encoded(), b.encoded());
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_signed_has_thirteen_fields() {
        let unsigned = build_unsigned(fields()).unwrap();
        let digest = *unsigned.digest();
        let signed = sign_envelope(unsigned, &key(2)).unwrap();

        let items = top_level(signed.raw());
        assert_eq!(items.len(), SIGNED_FIELD_COUNT);

        let sig = signed.signature();
        assert_eq!(items[10].to_u64().unwrap(), sig.y_parity as u64);
        assert_eq!(items[11].as_bytes().unwrap(), &sig.r);
        assert_eq!(items[12].as_bytes().unwrap(), &sig.s);
        assert_eq!(signed.signing_digest(), digest);
    }

    #[test]
    fn test_signed_is_re_encoded_not_spliced() {
        let unsigned = build_unsigned(fields()).unwrap();
        let unsigned_bytes = unsigned.encoded().to_vec();
        let signed = sign_envelope(unsigned, &key(2)).unwrap();

        // The list header changes once the trailer is added
        assert_ne!(&signed.raw()[..unsigned_bytes.len()], &unsigned_bytes[..]);
        assert_eq!(signed.raw()[0], EIP7702_TX_TYPE);
    }

    #[test]
    fn test_signed_trailer_pads_short_scalars() {
        let mut r = [0u8; 32];
        r[31] = 0x01;
        let mut s = [0u8; 32];
        s[30] = 0x02;
        let signature = Signature::new(r, s, 1).unwrap();

        let signed = attach_signature(build_unsigned(fields()).unwrap(), signature).unwrap();
        let items = top_level(signed.raw());
        assert_eq!(items[11].as_bytes().unwrap().len(), 32);
        assert_eq!(items[12].as_bytes().unwrap().len(), 32);
    }

    #[test]
    fn test_inner_authorization_scalars_are_minimal() {
        let unsigned = build_unsigned(fields()).unwrap();
        let items = top_level(unsigned.encoded());
        let auth_list = items[9].as_list().unwrap();
        let entry = auth_list[0].as_list().unwrap();

        assert_eq!(entry.len(), AUTHORIZATION_FIELD_COUNT);
        assert_eq!(entry[0].as_bytes().unwrap(), delegate().as_bytes());
        assert_eq!(entry[1].to_uint().unwrap(), chain());
        assert_eq!(entry[2].as_bytes().unwrap(), &[] as &[u8]);
        for scalar in &entry[4..] {
            let bytes = scalar.as_bytes().unwrap();
            assert!(bytes.len() <= 32);
            assert_ne!(bytes.first(), Some(&0u8));
        }
    }

    #[test]
    fn test_unavailable_fees_encode_empty() {
        let unsigned = build_unsigned(fields().with_fees(None, None)).unwrap();
        let items = top_level(unsigned.encoded());
        assert_eq!(items[2], RlpItem::bytes(Vec::new()));
        assert_eq!(items[3], RlpItem::bytes(Vec::new()));
    }

    #[test]
    fn test_zero_fee_shares_unavailable_encoding() {
        let zero_tip = fields().with_fees(Some(U256::zero()), Some(U256::from(7u64)));
        let unavailable = fields().with_fees(None, Some(U256::from(7u64)));
        assert_eq!(
            build_unsigned(zero_tip.clone()).unwrap().encoded(),
            build_unsigned(unavailable).unwrap().encoded()
        );

        let signed = sign_envelope(build_unsigned(zero_tip).unwrap(), &key(2)).unwrap();
        let decoded = decode_signed_envelope(signed.raw()).unwrap();
        assert_eq!(decoded.fields().max_priority_fee_per_gas, None);
        assert_eq!(decoded.fields().max_fee_per_gas, Some(U256::from(7u64)));
        assert_eq!(decoded.recover_sender().unwrap(), key(2).address().unwrap());
    }

    #[test]
    fn test_multiple_authorizations_keep_order() {
        let with_two = fields().add_authorization(signed_auth(1));
        let signed = sign_envelope(build_unsigned(with_two).unwrap(), &key(2)).unwrap();
        let decoded = decode_signed_envelope(signed.raw()).unwrap();

        let nonces: Vec<u64> = decoded.fields().authorization_list.iter().map(|a| a.nonce()).collect();
        assert_eq!(nonces, vec![0, 1]);
    }

    // === Validation Tests ===

    #[test]
    fn test_empty_authorization_list_rejected() {
        let mut f = fields();
        f.authorization_list.clear();
        assert!(matches!(build_unsigned(f), Err(RelayError::Validation(_))));
    }

    #[test]
    fn test_zero_gas_limit_rejected() {
        assert!(matches!(
            build_unsigned(fields().with_gas_limit(U256::zero())),
            Err(RelayError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_chain_id_rejected() {
        let mut f = fields();
        f.chain_id = U256::zero();
        assert!(matches!(build_unsigned(f), Err(RelayError::Validation(_))));
    }

    #[test]
    fn test_priority_above_max_fee_rejected() {
        let f = fields().with_fees(Some(U256::from(10u64)), Some(U256::from(9u64)));
        assert!(matches!(build_unsigned(f), Err(RelayError::Validation(_))));
    }

    #[test]
    fn test_authorization_for_other_chain_rejected() {
        let authority = key(1);
        let mainnet_auth =
            build_authorization(U256::one(), delegate(), 0, &authority, authority.address().unwrap()).unwrap();
        let mut f = fields();
        f.authorization_list = vec![mainnet_auth];
        assert!(matches!(build_unsigned(f), Err(RelayError::Validation(_))));

        let any_chain =
            build_authorization(U256::zero(), delegate(), 0, &authority, authority.address().unwrap()).unwrap();
        let mut f = fields();
        f.authorization_list = vec![any_chain];
        assert!(build_unsigned(f).is_ok());
    }

    // === Decoding Tests ===

    #[test]
    fn test_decode_roundtrip_recovers_both_signers() {
        let f = fields().add_access_list_entry(AccessListEntry {
            address: Address::repeat_byte(0xaa),
            storage_keys: vec![H256::repeat_byte(0x01), H256::zero()],
        });
        let signed = sign_envelope(build_unsigned(f.clone()).unwrap(), &key(2)).unwrap();
        let decoded = decode_signed_envelope(signed.raw()).unwrap();

        assert_eq!(decoded.fields(), &f);
        assert_eq!(decoded.signature(), signed.signature());
        assert_eq!(decoded.transaction_hash(), signed.transaction_hash());
        assert_eq!(decoded.recover_sender().unwrap(), key(2).address().unwrap());
        assert_eq!(
            decoded.fields().authorization_list[0].recover_authority().unwrap(),
            key(1).address().unwrap()
        );
    }

    #[test]
    fn test_decode_rejects_wrong_type_and_shape() {
        let signed = sign_envelope(build_unsigned(fields()).unwrap(), &key(2)).unwrap();

        let mut wrong_type = signed.raw().to_vec();
        wrong_type[0] = 0x02;
        assert!(matches!(decode_signed_envelope(&wrong_type), Err(RelayError::Encoding(_))));

        let unsigned = build_unsigned(fields()).unwrap();
        assert!(matches!(
            decode_signed_envelope(unsigned.encoded()),
            Err(RelayError::Encoding(_))
        ));

        let mut trailing = signed.raw().to_vec();
        trailing.push(0x00);
        assert!(decode_signed_envelope(&trailing).is_err());

        assert!(decode_signed_envelope(&[]).is_err());
    }

    /// Re-encode a signed payload with one top-level field replaced
    fn with_field(raw: &[u8], index: usize, value: RlpItem) -> Vec<u8> {
        let mut items = top_level(raw);
        items[index] = value;
        let mut out = vec![EIP7702_TX_TYPE];
        out.extend(RlpItem::list(items).encode());
        out
    }

    #[test]
    fn test_decode_rejects_invalid_fields() {
        let signed = sign_envelope(build_unsigned(fields()).unwrap(), &key(2)).unwrap();
        let raw = signed.raw();

        let cases = [
            with_field(raw, 0, RlpItem::uint(U256::zero())),
            with_field(raw, 4, RlpItem::uint(U256::zero())),
            with_field(raw, 9, RlpItem::list(Vec::new())),
        ];
        for tampered in cases {
            assert!(matches!(
                decode_signed_envelope(&tampered),
                Err(RelayError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_attach_rejects_invalid_signature() {
        let bad = Signature {
            r: [0u8; 32],
            s: [1u8; 32],
            y_parity: 0,
        };
        assert!(matches!(
            attach_signature(build_unsigned(fields()).unwrap(), bad),
            Err(RelayError::Recovery(_))
        ));
    }
}
