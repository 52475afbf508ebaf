// Copyright (c) 2023 The Tapsign Authors

use bitcoin::transaction::Version;
use log::debug;

use crate::{
    address::{p2pkh_script, secp256k1_key, Base58AddressService},
    blockchain::BitcoinNetwork,
    error::BuildError,
    provider::ChainState,
    signature::SignatureEncoding,
    signer::KeyRef,
    Curve, TransactionData,
};

use super::{
    check_count, encode_signature,
    utxo::{p2pkh_script_sig, txid, UtxoTx},
    Prepared, TransactionBuilder, Unsigned,
};

/// SIGHASH_ALL
pub const SIGHASH_ALL: u8 = 0x01;

/// Legacy P2PKH builder for bitcoin and derived chains
#[derive(Clone, Debug)]
pub struct BitcoinBuilder {
    network: BitcoinNetwork,
    addresses: Base58AddressService,
    encoding: SignatureEncoding,
}

impl BitcoinBuilder {
    pub fn new(network: BitcoinNetwork) -> Self {
        Self {
            network,
            addresses: Base58AddressService::new(network),
            encoding: SignatureEncoding::Der {
                sighash: SIGHASH_ALL,
            },
        }
    }

    fn sighash_type(&self) -> u8 {
        match self.encoding {
            SignatureEncoding::Der { sighash } => sighash,
            _ => SIGHASH_ALL,
        }
    }
}

impl TransactionBuilder for BitcoinBuilder {
    fn build_to_sign(
        &self,
        intent: &TransactionData,
        state: &ChainState,
        key: &KeyRef,
    ) -> Result<Prepared, BuildError> {
        let unspents = match state {
            ChainState::Utxo(u) => u,
            _ => return Err(BuildError::UnsupportedState("bitcoin")),
        };
        if intent.contract_address.is_some() {
            return Err(BuildError::TokenUnsupported("bitcoin"));
        }
        if key.curve != Curve::Secp256k1 {
            return Err(BuildError::InvalidPublicKey);
        }

        let public_key = secp256k1_key(&key.public_key, self.network.compressed_keys)
            .map_err(|_| BuildError::InvalidPublicKey)?;
        let own_hash = self.addresses.key_hash(&public_key)?;

        let destination = self.addresses.decode(&intent.destination_address)?;
        let change = self.addresses.decode(intent.change_address())?;

        let tx = UtxoTx::plan(
            Version::ONE,
            intent,
            unspents,
            p2pkh_script(&destination),
            p2pkh_script(&change),
            &p2pkh_script(&own_hash),
        )?;

        let hashes = (0..tx.input_count())
            .map(|i| tx.legacy_sighash(i, self.sighash_type()).map(|h| h.to_vec()))
            .collect::<Result<Vec<_>, BuildError>>()?;

        debug!(
            "prepared {} input(s), outputs: {:?}",
            tx.input_count(),
            tx.output_values()
        );

        Ok(Prepared {
            hashes,
            public_key,
            unsigned: Unsigned::Utxo(tx),
        })
    }

    fn build_to_send(
        &self,
        prepared: &Prepared,
        signatures: &[Vec<u8>],
    ) -> Result<Vec<u8>, BuildError> {
        let tx = match &prepared.unsigned {
            Unsigned::Utxo(tx) => tx,
            _ => return Err(BuildError::UnsupportedState("bitcoin")),
        };
        check_count(prepared, signatures)?;

        let mut scripts = Vec::with_capacity(signatures.len());
        for (i, (raw, hash)) in signatures.iter().zip(prepared.hashes.iter()).enumerate() {
            let sig = encode_signature(self.encoding, i, raw, hash, &prepared.public_key)?;
            scripts.push(p2pkh_script_sig(&sig, &prepared.public_key));
        }

        Ok(tx.serialize(scripts))
    }

    fn transaction_id(&self, _prepared: &Prepared, signed: &[u8]) -> String {
        txid(signed)
    }
}
