#![allow(unused)]

use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::Mutex;

use tapsign::{
    engine::{ChainInfo, ChainState, FeeEstimate, NetworkProvider, Unspent},
    CardSession, SessionConfig, TagMonitor,
};
use tapsign_apdu::Curve;
use tapsign_sim::{SimCard, SimKey, SimOptions, SimTransport};

pub fn init_log() {
    let _ = simplelog::SimpleLogger::init(log::LevelFilter::Debug, Default::default());
}

/// Emulated card attached to a card session
pub struct Rig {
    pub session: CardSession,
    pub tag: TagMonitor,
    pub card: Arc<Mutex<SimCard>>,
}

impl Rig {
    pub async fn new(curve: Curve, opts: SimOptions, config: SessionConfig) -> Self {
        init_log();

        let key = SimKey::from_seed(curve, [0x2a; 32]).unwrap();
        let transport = SimTransport::from(SimCard::new(key, opts));
        let card = transport.card();

        let session = CardSession::new(config);

        let reader = session.reader();
        let mut reader = reader.lock().await;
        reader.enable();
        let tag = reader.attach(transport).unwrap();

        Self {
            session,
            tag,
            card,
        }
    }

    pub async fn signed_hashes(&self) -> u32 {
        self.card.lock().await.signed_hashes()
    }
}

/// Fast session timings for tests
pub fn test_config() -> SessionConfig {
    SessionConfig {
        timeout_ms: 200,
        max_timeout_ms: 1_000,
        max_delay_retries: 3,
        ..Default::default()
    }
}

/// In-memory network provider
#[derive(Default)]
pub struct MockProvider {
    pub info: StdMutex<ChainInfo>,
    pub sent: StdMutex<Vec<Vec<u8>>>,
}

impl MockProvider {
    pub fn new(info: ChainInfo) -> Self {
        Self {
            info: StdMutex::new(info),
            ..Default::default()
        }
    }

    pub fn utxo(values: &[u64]) -> Self {
        Self::new(ChainInfo {
            balance: values.iter().map(|v| *v as u128).sum(),
            state: ChainState::Utxo(
                values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| Unspent {
                        txid: format!("{:064x}", i + 0x100),
                        vout: 0,
                        value: *v,
                        script: vec![],
                    })
                    .collect(),
            ),
        })
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NetworkProvider for MockProvider {
    async fn get_info(&self, _address: &str) -> anyhow::Result<ChainInfo> {
        Ok(self.info.lock().unwrap().clone())
    }

    async fn get_fee(&self, _amount: u128, _destination: &str) -> anyhow::Result<FeeEstimate> {
        Ok(FeeEstimate {
            minimal: 500,
            normal: 1000,
            priority: 2000,
        })
    }

    async fn send_transaction(&self, tx: &[u8]) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(tx.to_vec());
        Ok(())
    }
}
