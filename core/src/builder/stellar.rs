// Copyright (c) 2023 The Tapsign Authors

//! Stellar native payments
//!
//! ## Transaction XDR (v1):
//! ```text
//! source (muxed ed25519) | fee u32 | seq i64 | cond NONE | memo NONE
//! | [ payment { dest, asset NATIVE, amount i64 } ] | ext 0
//! ```
//! The card signs `sha256(network_id || ENVELOPE_TYPE_TX || tx)`.

use byteorder::{BigEndian, ByteOrder};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use log::debug;

use crate::{
    address::StellarAddressService,
    error::BuildError,
    helpers::sha256,
    provider::ChainState,
    signature::SignatureEncoding,
    signer::KeyRef,
    Curve, TransactionData,
};

use super::{check_count, encode_signature, Prepared, TransactionBuilder, Unsigned};

/// Minimum per-operation fee in stroops
pub const DEFAULT_BASE_FEE: u32 = 100;

const ENVELOPE_TYPE_TX: u32 = 2;
const KEY_TYPE_ED25519: u32 = 0;
const PRECOND_NONE: u32 = 0;
const MEMO_NONE: u32 = 0;
const OP_PAYMENT: u32 = 1;
const ASSET_TYPE_NATIVE: u32 = 0;

/// Minimal XDR writer
#[derive(Default)]
struct Xdr(Vec<u8>);

impl Xdr {
    fn u32(&mut self, v: u32) -> &mut Self {
        let mut b = [0u8; 4];
        BigEndian::write_u32(&mut b, v);
        self.0.extend_from_slice(&b);
        self
    }

    fn i64(&mut self, v: i64) -> &mut Self {
        let mut b = [0u8; 8];
        BigEndian::write_i64(&mut b, v);
        self.0.extend_from_slice(&b);
        self
    }

    /// Fixed length opaque, lengths used here are multiples of 4
    fn fixed(&mut self, v: &[u8]) -> &mut Self {
        self.0.extend_from_slice(v);
        self
    }

    fn account(&mut self, pk: &[u8; 32]) -> &mut Self {
        self.u32(KEY_TYPE_ED25519).fixed(pk)
    }
}

/// Stellar payment builder
#[derive(Clone, Debug)]
pub struct StellarBuilder {
    network_id: [u8; 32],
    base_fee: u32,
}

impl StellarBuilder {
    pub fn new(passphrase: &str, base_fee: u32) -> Self {
        Self {
            network_id: sha256(passphrase.as_bytes()),
            base_fee,
        }
    }
}

impl TransactionBuilder for StellarBuilder {
    fn build_to_sign(
        &self,
        intent: &TransactionData,
        state: &ChainState,
        key: &KeyRef,
    ) -> Result<Prepared, BuildError> {
        let sequence = match state {
            ChainState::Account { nonce } => nonce
                .checked_add(1)
                .ok_or(BuildError::AmountOverflow(*nonce as u128))?,
            _ => return Err(BuildError::UnsupportedState("stellar")),
        };
        if intent.contract_address.is_some() {
            return Err(BuildError::TokenUnsupported("stellar"));
        }
        let sequence =
            i64::try_from(sequence).map_err(|_| BuildError::AmountOverflow(sequence as u128))?;

        if key.curve != Curve::Ed25519 {
            return Err(BuildError::InvalidPublicKey);
        }
        let source: [u8; 32] = key
            .public_key
            .as_slice()
            .try_into()
            .map_err(|_| BuildError::InvalidPublicKey)?;

        let destination = StellarAddressService::decode(&intent.destination_address)?;

        let amount =
            i64::try_from(intent.amount).map_err(|_| BuildError::AmountOverflow(intent.amount))?;
        let fee = u32::try_from(intent.fee.max(self.base_fee as u128))
            .map_err(|_| BuildError::AmountOverflow(intent.fee))?;

        let mut tx = Xdr::default();
        tx.account(&source)
            .u32(fee)
            .i64(sequence)
            .u32(PRECOND_NONE)
            .u32(MEMO_NONE)
            // One operation, no per-operation source account
            .u32(1)
            .u32(0)
            .u32(OP_PAYMENT)
            .account(&destination)
            .u32(ASSET_TYPE_NATIVE)
            .i64(amount)
            // ext
            .u32(0);
        let tx = tx.0;

        let mut base = Vec::with_capacity(36 + tx.len());
        base.extend_from_slice(&self.network_id);
        base.extend_from_slice(&ENVELOPE_TYPE_TX.to_be_bytes());
        base.extend_from_slice(&tx);

        debug!("prepared stellar payment seq: {} fee: {}", sequence, fee);

        Ok(Prepared {
            hashes: vec![sha256(&base).to_vec()],
            public_key: source.to_vec(),
            unsigned: Unsigned::Stellar(tx),
        })
    }

    fn build_to_send(
        &self,
        prepared: &Prepared,
        signatures: &[Vec<u8>],
    ) -> Result<Vec<u8>, BuildError> {
        let tx = match &prepared.unsigned {
            Unsigned::Stellar(tx) => tx,
            _ => return Err(BuildError::UnsupportedState("stellar")),
        };
        check_count(prepared, signatures)?;

        let sig = encode_signature(
            SignatureEncoding::Raw,
            0,
            &signatures[0],
            &prepared.hashes[0],
            &prepared.public_key,
        )?;
        let raw: [u8; 64] = sig
            .as_slice()
            .try_into()
            .map_err(|_| BuildError::InvalidSignature(0))?;

        let pk: [u8; 32] = prepared
            .public_key
            .as_slice()
            .try_into()
            .map_err(|_| BuildError::InvalidPublicKey)?;
        let vk = VerifyingKey::from_bytes(&pk).map_err(|_| BuildError::InvalidPublicKey)?;
        vk.verify(&prepared.hashes[0], &Signature::from_bytes(&raw))
            .map_err(|_| BuildError::InvalidSignature(0))?;

        let mut env = Xdr::default();
        env.u32(ENVELOPE_TYPE_TX)
            .fixed(tx)
            // One decorated signature, hint is the key tail
            .u32(1)
            .fixed(&pk[28..])
            .u32(64)
            .fixed(&raw);

        Ok(env.0)
    }

    fn transaction_id(&self, prepared: &Prepared, _signed: &[u8]) -> String {
        prepared
            .hashes
            .first()
            .map(hex::encode)
            .unwrap_or_default()
    }
}
