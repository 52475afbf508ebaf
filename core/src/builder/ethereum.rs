// Copyright (c) 2023 The Tapsign Authors

use alloy_rlp::{Encodable, Header};
use log::debug;

use crate::{
    address::{secp256k1_key, EthereumAddressService},
    error::BuildError,
    helpers::keccak256,
    provider::ChainState,
    signature::SignatureEncoding,
    signer::KeyRef,
    Curve, TransactionData,
};

use super::{check_count, encode_signature, Prepared, TransactionBuilder, Unsigned};

/// Gas limit for a plain value transfer
pub const DEFAULT_GAS_LIMIT: u64 = 21_000;

/// Gas limit for an ERC-20 `transfer` call
pub const DEFAULT_TOKEN_GAS_LIMIT: u64 = 60_000;

/// `keccak256("transfer(address,uint256)")[..4]`
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// Unsigned EIP-155 legacy transaction
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EvmTx {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: [u8; 20],
    pub value: u128,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

impl EvmTx {
    /// `keccak256(rlp([nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0]))`
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut buf = Vec::new();

        encode_rlp_list(&mut buf, |buf| {
            self.encode_fields(buf);
            self.chain_id.encode(buf);
            0u8.encode(buf);
            0u8.encode(buf);
        });

        keccak256(&buf)
    }

    /// `rlp([nonce, gasPrice, gasLimit, to, value, data, v, r, s])`
    pub fn signed_rlp(&self, recid: u8, r: &[u8], s: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();

        let v = self.chain_id * 2 + 35 + recid as u64;

        encode_rlp_list(&mut buf, |buf| {
            self.encode_fields(buf);
            v.encode(buf);
            encode_trimmed(r, buf);
            encode_trimmed(s, buf);
        });

        buf
    }

    fn encode_fields(&self, buf: &mut Vec<u8>) {
        self.nonce.encode(buf);
        self.gas_price.encode(buf);
        self.gas_limit.encode(buf);
        self.to.as_slice().encode(buf);
        self.value.encode(buf);
        self.data.as_slice().encode(buf);
    }
}

/// Encodes an RLP list using a closure to write elements
fn encode_rlp_list<F>(out: &mut Vec<u8>, f: F)
where
    F: FnOnce(&mut Vec<u8>),
{
    let mut content = Vec::new();
    f(&mut content);

    let header = Header {
        list: true,
        payload_length: content.len(),
    };
    header.encode(out);
    out.extend_from_slice(&content);
}

/// Encodes a big-endian integer with leading zeros stripped
fn encode_trimmed(v: &[u8], out: &mut Vec<u8>) {
    let start = v.iter().position(|b| *b != 0).unwrap_or(v.len());
    v[start..].encode(out);
}

/// ERC-20 `transfer(to, amount)` call data
pub fn transfer_call(to: &[u8; 20], amount: u128) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 + 32);
    data.extend_from_slice(&TRANSFER_SELECTOR);
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(to);
    data.extend_from_slice(&[0u8; 16]);
    data.extend_from_slice(&amount.to_be_bytes());
    data
}

/// EVM builder for EIP-155 chains
#[derive(Clone, Debug)]
pub struct EthereumBuilder {
    chain_id: u64,
    gas_limit: u64,
    token_gas_limit: u64,
    addresses: EthereumAddressService,
}

impl EthereumBuilder {
    pub fn new(chain_id: u64, checksum_chain_id: Option<u64>, gas_limit: u64) -> Self {
        Self {
            chain_id,
            gas_limit,
            token_gas_limit: DEFAULT_TOKEN_GAS_LIMIT,
            addresses: EthereumAddressService::new(checksum_chain_id),
        }
    }

    /// Override the gas limit used for token transfers
    pub fn with_token_gas_limit(mut self, gas_limit: u64) -> Self {
        self.token_gas_limit = gas_limit;
        self
    }

    /// Gas price for a fee, the fee must split evenly over the gas limit
    fn gas_price(fee: u128, gas_limit: u64) -> Result<u128, BuildError> {
        let limit = gas_limit as u128;
        if limit == 0 || fee < limit || fee % limit != 0 {
            return Err(BuildError::GasPrice { fee, gas_limit });
        }
        Ok(fee / limit)
    }
}

impl TransactionBuilder for EthereumBuilder {
    fn build_to_sign(
        &self,
        intent: &TransactionData,
        state: &ChainState,
        key: &KeyRef,
    ) -> Result<Prepared, BuildError> {
        let nonce = match state {
            ChainState::Account { nonce } => *nonce,
            _ => return Err(BuildError::UnsupportedState("evm")),
        };
        if key.curve != Curve::Secp256k1 {
            return Err(BuildError::InvalidPublicKey);
        }

        let public_key =
            secp256k1_key(&key.public_key, false).map_err(|_| BuildError::InvalidPublicKey)?;
        let destination = self.addresses.decode(&intent.destination_address)?;

        // Token transfers call the contract with no value attached
        let (to, value, data, gas_limit) = match &intent.contract_address {
            Some(contract) => (
                self.addresses.decode(contract)?,
                0,
                transfer_call(&destination, intent.amount),
                self.token_gas_limit,
            ),
            None => (destination, intent.amount, Vec::new(), self.gas_limit),
        };

        let tx = EvmTx {
            nonce,
            gas_price: Self::gas_price(intent.fee, gas_limit)?,
            gas_limit,
            to,
            value,
            data,
            chain_id: self.chain_id,
        };

        debug!(
            "prepared evm tx chain: {} nonce: {} gas price: {}",
            tx.chain_id, tx.nonce, tx.gas_price
        );

        Ok(Prepared {
            hashes: vec![tx.signing_hash().to_vec()],
            public_key,
            unsigned: Unsigned::Evm(tx),
        })
    }

    fn build_to_send(
        &self,
        prepared: &Prepared,
        signatures: &[Vec<u8>],
    ) -> Result<Vec<u8>, BuildError> {
        let tx = match &prepared.unsigned {
            Unsigned::Evm(tx) => tx,
            _ => return Err(BuildError::UnsupportedState("evm")),
        };
        check_count(prepared, signatures)?;

        let sig = encode_signature(
            SignatureEncoding::Recoverable,
            0,
            &signatures[0],
            &prepared.hashes[0],
            &prepared.public_key,
        )?;

        Ok(tx.signed_rlp(sig[64], &sig[..32], &sig[32..64]))
    }

    fn transaction_id(&self, _prepared: &Prepared, signed: &[u8]) -> String {
        format!("0x{}", hex::encode(keccak256(signed)))
    }
}

#[cfg(test)]
mod test {
    use alloy_rlp::Decodable;
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    use crate::{
        address::AddressService,
        builder::test::{card_sign, key_ref, test_key},
    };

    use super::*;

    const DESTINATION: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    struct Decoded {
        nonce: u64,
        gas_price: u128,
        gas_limit: u64,
        to: [u8; 20],
        value: u128,
        data: Vec<u8>,
        v: u64,
        r: Vec<u8>,
        s: Vec<u8>,
    }

    fn decode(raw: &[u8]) -> Decoded {
        let buf = &mut &raw[..];

        let h = Header::decode(buf).unwrap();
        assert!(h.list);
        assert_eq!(h.payload_length, buf.len());

        let nonce = u64::decode(buf).unwrap();
        let gas_price = u128::decode(buf).unwrap();
        let gas_limit = u64::decode(buf).unwrap();
        let to = <[u8; 20]>::decode(buf).unwrap();
        let value = u128::decode(buf).unwrap();
        let data = Header::decode_bytes(buf, false).unwrap().to_vec();
        let v = u64::decode(buf).unwrap();
        let r = Header::decode_bytes(buf, false).unwrap().to_vec();
        let s = Header::decode_bytes(buf, false).unwrap().to_vec();
        assert!(buf.is_empty());

        Decoded {
            nonce,
            gas_price,
            gas_limit,
            to,
            value,
            data,
            v,
            r,
            s,
        }
    }

    fn padded(v: &[u8]) -> [u8; 32] {
        let mut b = [0u8; 32];
        b[32 - v.len()..].copy_from_slice(v);
        b
    }

    #[test]
    fn signed_transfer() {
        let b = EthereumBuilder::new(1, None, DEFAULT_GAS_LIMIT);
        let key = test_key();

        let intent = TransactionData::new("", DESTINATION, 1_000_000_000_000_000, 21_000 * 7);
        let p = b
            .build_to_sign(&intent, &ChainState::Account { nonce: 9 }, &key_ref(&key, true))
            .unwrap();
        assert_eq!(p.hashes.len(), 1);

        let raw = b.build_to_send(&p, &card_sign(&key, &p)).unwrap();
        let d = decode(&raw);

        assert_eq!(d.nonce, 9);
        assert_eq!(d.gas_price, 7);
        assert_eq!(d.gas_limit, 21_000);
        assert_eq!(d.value, 1_000_000_000_000_000);
        assert!(d.data.is_empty());
        assert_eq!(hex::encode(d.to), "5aaeb6053f3e94c9b9a09f33669435e7ef1beaed");
        assert!(d.v == 37 || d.v == 38);

        // Signature recovers to the wallet key with the encoded v
        let mut rs = [0u8; 64];
        rs[..32].copy_from_slice(&padded(&d.r));
        rs[32..].copy_from_slice(&padded(&d.s));
        let sig = Signature::from_slice(&rs).unwrap();
        assert!(sig.normalize_s().is_none());

        let recid = RecoveryId::from_byte((d.v - 37) as u8).unwrap();
        let recovered = VerifyingKey::recover_from_prehash(&p.hashes[0], &sig, recid).unwrap();
        assert_eq!(&recovered, key.verifying_key());

        let id = b.transaction_id(&p, &raw);
        assert!(id.starts_with("0x"));
        assert_eq!(id.len(), 66);
    }

    #[test]
    fn chain_id_in_v() {
        let key = test_key();
        let b = EthereumBuilder::new(137, None, DEFAULT_GAS_LIMIT);

        let intent = TransactionData::new("", DESTINATION, 5, 21_000);
        let p = b
            .build_to_sign(&intent, &ChainState::Account { nonce: 0 }, &key_ref(&key, false))
            .unwrap();
        let raw = b.build_to_send(&p, &card_sign(&key, &p)).unwrap();

        let v = decode(&raw).v;
        assert!(v == 137 * 2 + 35 || v == 137 * 2 + 36);
    }

    #[test]
    fn hash_depends_on_chain() {
        let key = key_ref(&test_key(), true);
        let intent = TransactionData::new("", DESTINATION, 5, 21_000);
        let state = ChainState::Account { nonce: 0 };

        let a = EthereumBuilder::new(1, None, DEFAULT_GAS_LIMIT)
            .build_to_sign(&intent, &state, &key)
            .unwrap();
        let b = EthereumBuilder::new(56, None, DEFAULT_GAS_LIMIT)
            .build_to_sign(&intent, &state, &key)
            .unwrap();

        assert_ne!(a.hashes, b.hashes);
    }

    #[test]
    fn errors() {
        let b = EthereumBuilder::new(1, None, DEFAULT_GAS_LIMIT);
        let key = key_ref(&test_key(), true);

        assert_eq!(
            b.build_to_sign(
                &TransactionData::new("", DESTINATION, 1, 1),
                &ChainState::Utxo(vec![]),
                &key
            ),
            Err(BuildError::UnsupportedState("evm"))
        );

        // Bad checksum casing
        assert!(matches!(
            b.build_to_sign(
                &TransactionData::new("", "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAeD", 1, 1),
                &ChainState::Account { nonce: 0 },
                &key
            ),
            Err(BuildError::Address(_))
        ));

        let ed = KeyRef::new(Curve::Ed25519, &[0u8; 32]);
        assert_eq!(
            b.build_to_sign(
                &TransactionData::new("", DESTINATION, 1, 1),
                &ChainState::Account { nonce: 0 },
                &ed
            ),
            Err(BuildError::InvalidPublicKey)
        );
    }

    #[test]
    fn source_address_matches_key() {
        let key = test_key();
        let s = EthereumAddressService::new(None);

        let from_compressed = s.make_address(&key_ref(&key, true).public_key).unwrap();
        let from_full = s.make_address(&key_ref(&key, false).public_key).unwrap();
        assert_eq!(from_compressed, from_full);
    }

    #[test]
    fn fee_must_split_over_gas_limit() {
        let b = EthereumBuilder::new(1, None, DEFAULT_GAS_LIMIT);
        let key = key_ref(&test_key(), true);
        let state = ChainState::Account { nonce: 0 };

        for fee in [0, 20_999, 21_001, 21_000 * 3 + 7] {
            assert_eq!(
                b.build_to_sign(&TransactionData::new("", DESTINATION, 1, fee), &state, &key),
                Err(BuildError::GasPrice {
                    fee,
                    gas_limit: DEFAULT_GAS_LIMIT
                })
            );
        }

        let p = b
            .build_to_sign(&TransactionData::new("", DESTINATION, 1, 21_000 * 3), &state, &key)
            .unwrap();
        match p.unsigned {
            Unsigned::Evm(tx) => assert_eq!(tx.gas_price, 3),
            _ => unreachable!(),
        }
    }

    #[test]
    fn transfer_selector() {
        assert_eq!(
            &keccak256(b"transfer(address,uint256)")[..4],
            &TRANSFER_SELECTOR
        );

        let mut to = [0u8; 20];
        hex::decode_to_slice("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed", &mut to).unwrap();

        assert_eq!(
            hex::encode(transfer_call(&to, 1)),
            concat!(
                "a9059cbb",
                "0000000000000000000000005aaeb6053f3e94c9b9a09f33669435e7ef1beaed",
                "0000000000000000000000000000000000000000000000000000000000000001",
            )
        );
    }

    #[test]
    fn token_transfer() {
        const CONTRACT: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";

        let b = EthereumBuilder::new(1, None, DEFAULT_GAS_LIMIT).with_token_gas_limit(65_000);
        let key = test_key();

        let intent =
            TransactionData::new("", DESTINATION, 2_500_000, 65_000 * 4).with_token(CONTRACT);
        let p = b
            .build_to_sign(&intent, &ChainState::Account { nonce: 2 }, &key_ref(&key, false))
            .unwrap();
        let raw = b.build_to_send(&p, &card_sign(&key, &p)).unwrap();
        let d = decode(&raw);

        assert_eq!(hex::encode(d.to), "dac17f958d2ee523a2206206994597c13d831ec7");
        assert_eq!(d.value, 0);
        assert_eq!(d.gas_limit, 65_000);
        assert_eq!(d.gas_price, 4);

        let mut dest = [0u8; 20];
        hex::decode_to_slice(&DESTINATION[2..], &mut dest).unwrap();
        assert_eq!(d.data, transfer_call(&dest, 2_500_000));

        // Contract address is checksum validated like any destination
        let bad = TransactionData::new("", DESTINATION, 1, 65_000)
            .with_token("0xdac17f958D2ee523a2206206994597C13D831ec7");
        assert!(matches!(
            b.build_to_sign(&bad, &ChainState::Account { nonce: 0 }, &key_ref(&key, false)),
            Err(BuildError::Address(_))
        ));
    }
}
