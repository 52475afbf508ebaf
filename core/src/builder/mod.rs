// Copyright (c) 2023 The Tapsign Authors

//! Transaction builders
//!
//! Builders are stateless: given the same intent, chain state and key they
//! produce byte-identical unsigned transactions and hashes. Signing happens
//! elsewhere, [TransactionBuilder::build_to_send] only assembles.

use crate::{
    error::BuildError, provider::ChainState, signature::SignatureEncoding, signer::KeyRef,
    TransactionData,
};

mod utxo;
pub use utxo::{UtxoTx, SEQUENCE_FINAL};

mod bitcoin;
pub use bitcoin::{BitcoinBuilder, SIGHASH_ALL};

mod bitcoin_cash;
pub use bitcoin_cash::{BitcoinCashBuilder, SIGHASH_ALL_FORKID};

mod ethereum;
pub use ethereum::{
    transfer_call, EthereumBuilder, EvmTx, DEFAULT_GAS_LIMIT, DEFAULT_TOKEN_GAS_LIMIT,
    TRANSFER_SELECTOR,
};

mod stellar;
pub use stellar::{StellarBuilder, DEFAULT_BASE_FEE};

/// Unsigned transaction and the hashes the card must sign
#[derive(Clone, PartialEq, Debug)]
pub struct Prepared {
    /// Hashes to sign, one per input for UTXO chains, one for account chains
    pub hashes: Vec<Vec<u8>>,
    pub(crate) public_key: Vec<u8>,
    pub(crate) unsigned: Unsigned,
}

impl Prepared {
    /// Wallet key the hashes are to be signed with
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }
}

/// Chain-specific unsigned transaction
#[derive(Clone, PartialEq, Debug)]
pub(crate) enum Unsigned {
    Utxo(UtxoTx),
    Evm(EvmTx),
    Stellar(Vec<u8>),
}

/// Per-chain transaction builder
pub trait TransactionBuilder: Send + Sync {
    /// Build the unsigned transaction and the hashes to sign
    fn build_to_sign(
        &self,
        intent: &TransactionData,
        state: &ChainState,
        key: &KeyRef,
    ) -> Result<Prepared, BuildError>;

    /// Assemble the signed wire transaction from raw card signatures
    fn build_to_send(&self, prepared: &Prepared, signatures: &[Vec<u8>])
        -> Result<Vec<u8>, BuildError>;

    /// Transaction id of an assembled transaction, as shown by explorers
    fn transaction_id(&self, prepared: &Prepared, signed: &[u8]) -> String;
}

/// Check one signature was returned per hash
pub(crate) fn check_count(prepared: &Prepared, signatures: &[Vec<u8>]) -> Result<(), BuildError> {
    if signatures.len() != prepared.hashes.len() {
        return Err(BuildError::SignatureCount {
            expected: prepared.hashes.len(),
            actual: signatures.len(),
        });
    }
    Ok(())
}

/// Encode a signature, reporting failures against its index
pub(crate) fn encode_signature(
    encoding: SignatureEncoding,
    index: usize,
    raw: &[u8],
    prehash: &[u8],
    public_key: &[u8],
) -> Result<Vec<u8>, BuildError> {
    encoding
        .encode(raw, prehash, public_key)
        .map_err(|e| match e {
            BuildError::InvalidSignature(_) => BuildError::InvalidSignature(index),
            e => e,
        })
}

/// Convert an intent amount to a native 64-bit amount
pub(crate) fn to_u64(v: u128) -> Result<u64, BuildError> {
    u64::try_from(v).map_err(|_| BuildError::AmountOverflow(v))
}
