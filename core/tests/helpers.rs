#![allow(unused)]

use std::sync::Mutex;

use async_trait::async_trait;
use log::debug;

use tapsign_core::{ChainInfo, ChainState, Curve, FeeEstimate, KeyRef, NetworkProvider, Signer};

/// In-memory network provider
#[derive(Default)]
pub struct MockProvider {
    pub info: Mutex<ChainInfo>,
    pub sent: Mutex<Vec<Vec<u8>>>,
    pub fail: Mutex<bool>,
}

impl MockProvider {
    pub fn new(info: ChainInfo) -> Self {
        Self {
            info: Mutex::new(info),
            ..Default::default()
        }
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    fn check(&self) -> anyhow::Result<()> {
        match *self.fail.lock().unwrap() {
            true => Err(anyhow::anyhow!("provider offline")),
            false => Ok(()),
        }
    }
}

#[async_trait]
impl NetworkProvider for MockProvider {
    async fn get_info(&self, address: &str) -> anyhow::Result<ChainInfo> {
        self.check()?;
        debug!("get_info: {}", address);
        Ok(self.info.lock().unwrap().clone())
    }

    async fn get_fee(&self, amount: u128, _destination: &str) -> anyhow::Result<FeeEstimate> {
        self.check()?;
        Ok(FeeEstimate {
            minimal: 1000,
            normal: 2000 + amount / 1000,
            priority: 5000,
        })
    }

    async fn send_transaction(&self, tx: &[u8]) -> anyhow::Result<()> {
        self.check()?;
        self.sent.lock().unwrap().push(tx.to_vec());
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TestSignError {
    #[error("card removed")]
    Removed,
    #[error("wrong key")]
    WrongKey,
}

/// Software signer standing in for the card
pub enum KeySigner {
    Secp256k1(k256::ecdsa::SigningKey),
    Ed25519(ed25519_dalek::SigningKey),
    Failing,
}

impl KeySigner {
    pub fn secp256k1() -> Self {
        Self::Secp256k1(k256::ecdsa::SigningKey::from_slice(&[0x5a; 32]).unwrap())
    }

    pub fn ed25519() -> Self {
        Self::Ed25519(ed25519_dalek::SigningKey::from_bytes(&[0x5b; 32]))
    }

    pub fn key(&self) -> KeyRef {
        match self {
            Self::Secp256k1(k) => KeyRef::new(
                Curve::Secp256k1,
                k.verifying_key().to_encoded_point(true).as_bytes(),
            ),
            Self::Ed25519(k) => KeyRef::new(Curve::Ed25519, &k.verifying_key().to_bytes()),
            Self::Failing => KeyRef::new(Curve::Secp256k1, &[]),
        }
    }
}

#[async_trait]
impl Signer for KeySigner {
    type Error = TestSignError;

    async fn sign(&self, hashes: &[Vec<u8>], key: &KeyRef) -> Result<Vec<Vec<u8>>, Self::Error> {
        use ed25519_dalek::Signer as _;

        match self {
            Self::Failing => Err(TestSignError::Removed),
            _ if key.public_key != self.key().public_key => Err(TestSignError::WrongKey),
            Self::Secp256k1(k) => Ok(hashes
                .iter()
                .map(|h| {
                    let (s, _) = k.sign_prehash_recoverable(h).unwrap();
                    s.to_bytes().to_vec()
                })
                .collect()),
            Self::Ed25519(k) => Ok(hashes.iter().map(|h| k.sign(h).to_bytes().to_vec()).collect()),
        }
    }
}

pub fn utxo_info(values: &[u64]) -> ChainInfo {
    ChainInfo {
        balance: values.iter().map(|v| *v as u128).sum(),
        state: ChainState::Utxo(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| tapsign_core::Unspent {
                    txid: format!("{:064x}", i + 1),
                    vout: i as u32,
                    value: *v,
                    script: vec![],
                })
                .collect(),
        ),
    }
}
