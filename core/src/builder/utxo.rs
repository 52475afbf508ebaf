// Copyright (c) 2023 The Tapsign Authors

//! Shared UTXO transaction planning and sighash algorithms

use std::str::FromStr;

use bitcoin::{
    absolute::LockTime,
    consensus::encode::serialize,
    hashes::{sha256d, Hash},
    sighash::{EcdsaSighashType, SighashCache},
    transaction::Version,
    Amount, OutPoint, Script, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};

use crate::{error::BuildError, provider::Unspent, TransactionData};

use super::to_u64;

/// Final input sequence number (no RBF, no relative locktime)
pub const SEQUENCE_FINAL: Sequence = Sequence::MAX;

/// Unsigned UTXO transaction, with the outputs each input spends
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct UtxoTx {
    pub(crate) tx: Transaction,
    pub(crate) spent: Vec<TxOut>,
}

impl UtxoTx {
    /// Plan a payment spending every available output
    ///
    /// The destination output comes first, change follows and is left out
    /// entirely when it would be zero.
    pub(crate) fn plan(
        version: Version,
        intent: &TransactionData,
        unspents: &[Unspent],
        destination_script: ScriptBuf,
        change_script: ScriptBuf,
        default_script: &ScriptBuf,
    ) -> Result<Self, BuildError> {
        if unspents.is_empty() {
            return Err(BuildError::NoUtxo);
        }

        let amount = to_u64(intent.amount)?;
        let required = intent
            .amount
            .checked_add(intent.fee)
            .ok_or(BuildError::AmountOverflow(intent.amount))?;

        let available: u128 = unspents.iter().map(|u| u.value as u128).sum();
        if available < required {
            return Err(BuildError::InsufficientFunds {
                available,
                required,
            });
        }

        let mut input = Vec::with_capacity(unspents.len());
        let mut spent = Vec::with_capacity(unspents.len());
        for u in unspents {
            // Display order hex, parsing reverses into internal order
            let txid = Txid::from_str(&u.txid)
                .map_err(|_| BuildError::InvalidUnspent(u.txid.clone()))?;

            input.push(TxIn {
                previous_output: OutPoint::new(txid, u.vout),
                script_sig: ScriptBuf::new(),
                sequence: SEQUENCE_FINAL,
                witness: Witness::new(),
            });

            let script_pubkey = match u.script.is_empty() {
                true => default_script.clone(),
                false => ScriptBuf::from_bytes(u.script.clone()),
            };
            spent.push(TxOut {
                value: Amount::from_sat(u.value),
                script_pubkey,
            });
        }

        let mut output = vec![TxOut {
            value: Amount::from_sat(amount),
            script_pubkey: destination_script,
        }];

        let change = to_u64(available - required)?;
        if change > 0 {
            output.push(TxOut {
                value: Amount::from_sat(change),
                script_pubkey: change_script,
            });
        }

        let tx = Transaction {
            version,
            lock_time: LockTime::ZERO,
            input,
            output,
        };

        Ok(Self { tx, spent })
    }

    /// Number of inputs, one hash is signed per input
    pub fn input_count(&self) -> usize {
        self.tx.input.len()
    }

    /// Output values in order
    pub fn output_values(&self) -> Vec<u64> {
        self.tx.output.iter().map(|o| o.value.to_sat()).collect()
    }

    /// Serialise with the provided per-input unlocking scripts
    pub(crate) fn serialize(&self, scripts: Vec<ScriptBuf>) -> Vec<u8> {
        let mut tx = self.tx.clone();
        for (input, script) in tx.input.iter_mut().zip(scripts) {
            input.script_sig = script;
        }
        serialize(&tx)
    }

    /// Legacy sighash, signing input `index` against the script it spends
    pub(crate) fn legacy_sighash(&self, index: usize, sighash: u8) -> Result<[u8; 32], BuildError> {
        let script_code = self.script_code(index)?;

        SighashCache::new(&self.tx)
            .legacy_signature_hash(index, script_code, sighash as u32)
            .map(|h| h.to_byte_array())
            .map_err(|e| BuildError::Sighash(e.to_string()))
    }

    /// BIP143 sighash, with `sighash` written as the trailing type
    ///
    /// The preimage is built for SIGHASH_ALL and the type field replaced,
    /// so fork id flags outside the bitcoin sighash set are carried as-is.
    pub(crate) fn bip143_sighash(&self, index: usize, sighash: u8) -> Result<[u8; 32], BuildError> {
        let script_code = self.script_code(index)?;
        let value = self.spent[index].value;

        let mut preimage = Vec::with_capacity(200);
        SighashCache::new(&self.tx)
            .segwit_v0_encode_signing_data_to(
                &mut preimage,
                index,
                script_code,
                value,
                EcdsaSighashType::All,
            )
            .map_err(|e| BuildError::Sighash(e.to_string()))?;

        let n = preimage.len();
        preimage[n - 4..].copy_from_slice(&(sighash as u32).to_le_bytes());

        Ok(sha256d::Hash::hash(&preimage).to_byte_array())
    }

    fn script_code(&self, index: usize) -> Result<&Script, BuildError> {
        self.spent
            .get(index)
            .map(|o| o.script_pubkey.as_script())
            .ok_or_else(|| BuildError::Sighash(format!("no input at index {index}")))
    }
}

/// P2PKH unlocking script, `<sig> <pubkey>`
pub(crate) fn p2pkh_script_sig(signature: &[u8], public_key: &[u8]) -> ScriptBuf {
    let mut s = Vec::with_capacity(2 + signature.len() + public_key.len());
    s.push(signature.len() as u8);
    s.extend_from_slice(signature);
    s.push(public_key.len() as u8);
    s.extend_from_slice(public_key);
    ScriptBuf::from_bytes(s)
}

/// Transaction id, reversed double-sha256 in hex
pub(crate) fn txid(raw: &[u8]) -> String {
    Txid::from_raw_hash(sha256d::Hash::hash(raw)).to_string()
}

#[cfg(test)]
pub(crate) mod test {
    use bitcoin::consensus::deserialize;

    use super::*;

    pub fn unspent(value: u64) -> Unspent {
        Unspent {
            txid: "11".repeat(31) + "22",
            vout: 0,
            value,
            script: vec![0x76, 0xa9, 0x14, 0x00],
        }
    }

    fn intent(amount: u128, fee: u128) -> TransactionData {
        TransactionData::new("src", "dst", amount, fee)
    }

    fn script(b: &[u8]) -> ScriptBuf {
        ScriptBuf::from_bytes(b.to_vec())
    }

    fn plan(amount: u128, fee: u128, unspents: &[Unspent]) -> Result<UtxoTx, BuildError> {
        UtxoTx::plan(
            Version::ONE,
            &intent(amount, fee),
            unspents,
            script(&[0xd0]),
            script(&[0xc0]),
            &ScriptBuf::new(),
        )
    }

    /// Parse output values and scripts back out of a serialised transaction
    pub fn parse_outputs(raw: &[u8]) -> Vec<(u64, Vec<u8>)> {
        let tx: Transaction = deserialize(raw).unwrap();
        tx.output
            .into_iter()
            .map(|o| (o.value.to_sat(), o.script_pubkey.into_bytes()))
            .collect()
    }

    /// Unlocking script of the first input of a serialised transaction
    pub fn first_script_sig(raw: &[u8]) -> Vec<u8> {
        let tx: Transaction = deserialize(raw).unwrap();
        tx.input[0].script_sig.to_bytes()
    }

    /// Unsigned two input transaction from the BIP143 native P2WPKH example
    fn bip143_example() -> UtxoTx {
        let raw = hex::decode(
            "0100000002fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f00000000\
             00eeffffffef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90ec68a010000\
             0000ffffffff02202cb206000000001976a9148280b37df378db99f66f85c95a783a76ac7a6d5988\
             ac9093510d000000001976a9143bde42dbee7e4dbe6a21b2d50ce2f0167faa815988ac11000000",
        )
        .unwrap();
        let tx: Transaction = deserialize(&raw).unwrap();

        let code = script(
            &hex::decode("76a9141d0f172a0ecb48aee1be1f2687d2963ae33f71a188ac").unwrap(),
        );
        let spent = vec![
            TxOut {
                value: Amount::from_sat(625_000_000),
                script_pubkey: code.clone(),
            },
            TxOut {
                value: Amount::from_sat(600_000_000),
                script_pubkey: code,
            },
        ];

        UtxoTx { tx, spent }
    }

    #[test]
    fn plan_with_change() {
        let tx = plan(60000, 1000, &[unspent(100000)]).unwrap();
        assert_eq!(tx.output_values(), vec![60000, 39000]);
        assert_eq!(tx.tx.output[1].script_pubkey, script(&[0xc0]));
    }

    #[test]
    fn plan_without_change() {
        let tx = plan(99000, 1000, &[unspent(100000)]).unwrap();
        assert_eq!(tx.output_values(), vec![99000]);
    }

    #[test]
    fn plan_errors() {
        assert_eq!(plan(1, 1, &[]), Err(BuildError::NoUtxo));
        assert_eq!(
            plan(100000, 1, &[unspent(100000)]),
            Err(BuildError::InsufficientFunds {
                available: 100000,
                required: 100001
            })
        );

        let mut bad = unspent(10);
        bad.txid = "zz".into();
        assert_eq!(
            plan(1, 1, &[bad]),
            Err(BuildError::InvalidUnspent("zz".into()))
        );
    }

    #[test]
    fn txid_is_reversed() {
        let tx = plan(1, 1, &[unspent(10)]).unwrap();
        let raw = serialize(&tx.tx);

        // Outpoint hash follows the version and input count
        assert_eq!(raw[5], 0x22);
        assert_eq!(raw[5 + 31], 0x11);
    }

    #[test]
    fn serialize_layout() {
        let tx = plan(60000, 1000, &[unspent(100000), unspent(5000)]).unwrap();
        let raw = tx.serialize(vec![script(&[0xAA]), script(&[0xBB, 0xCC])]);

        assert_eq!(&raw[..4], &[1, 0, 0, 0]);
        assert_eq!(raw[4], 2);
        assert_eq!(first_script_sig(&raw), vec![0xAA]);
        assert_eq!(
            parse_outputs(&raw),
            vec![(60000, vec![0xd0]), (44000, vec![0xc0])]
        );
    }

    #[test]
    fn bip143_known_vector() {
        let tx = bip143_example();

        assert_eq!(
            hex::encode(tx.bip143_sighash(1, 0x01).unwrap()),
            "c37af31116d1b27caf68aae9e3ac82f1477929014d5b917657d0eb49478cb670"
        );
        assert_eq!(
            hex::encode(tx.bip143_sighash(1, 0x41).unwrap()),
            "467f411d178762db122a6aced76370a1c8324355bf0796502bf82eeaeda86a35"
        );
    }

    #[test]
    fn legacy_known_vector() {
        let tx = bip143_example();

        assert_eq!(
            hex::encode(tx.legacy_sighash(0, 0x01).unwrap()),
            "47194bc3c303a30aa5f78e45c7c2980b3be1284a9d69b1ea9ec0d29aac5f6848"
        );
        assert_eq!(
            hex::encode(tx.legacy_sighash(1, 0x01).unwrap()),
            "c46030820cbc48402a47cc5b5d3d41648f4e3a711f56b804d601d09dc112a6a4"
        );
    }

    #[test]
    fn sighash_index_out_of_range() {
        let tx = plan(1, 1, &[unspent(10)]).unwrap();

        assert!(matches!(tx.legacy_sighash(1, 0x01), Err(BuildError::Sighash(_))));
        assert!(matches!(tx.bip143_sighash(1, 0x41), Err(BuildError::Sighash(_))));
    }

    #[test]
    fn spends_default_script_when_provider_omits_it() {
        let mut u = unspent(10);
        u.script.clear();

        let tx = UtxoTx::plan(
            Version::ONE,
            &intent(1, 1),
            &[u],
            script(&[0xd0]),
            script(&[0xc0]),
            &script(&[0x51]),
        )
        .unwrap();
        assert_eq!(tx.spent[0].script_pubkey, script(&[0x51]));
    }
}
