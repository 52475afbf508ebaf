// Copyright (c) 2023 The Tapsign Authors

//! Network provider interface
//!
//! Providers wrap chain-specific node or indexer APIs. Implementations
//! live outside this crate, errors are reported as [anyhow::Error].

use serde::{Deserialize, Serialize};

/// Unspent transaction output
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Unspent {
    /// Transaction id, hex in display (reversed) byte order
    pub txid: String,
    /// Output index
    pub vout: u32,
    /// Output value in the chain's smallest unit
    pub value: u64,
    /// Locking script of the output
    #[serde(with = "hex::serde")]
    pub script: Vec<u8>,
}

/// Chain state needed to build a transaction
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ChainState {
    /// UTXO chains, spendable outputs for the wallet address
    Utxo(Vec<Unspent>),
    /// Account chains
    Account {
        /// Next EVM nonce, or the current Stellar account sequence number
        nonce: u64,
    },
}

impl Default for ChainState {
    fn default() -> Self {
        ChainState::Utxo(Vec::new())
    }
}

/// Account information returned by a provider
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct ChainInfo {
    /// Confirmed balance in the chain's smallest unit
    pub balance: u128,
    pub state: ChainState,
}

impl ChainInfo {
    /// Spendable outputs, empty for account chains
    pub fn utxos(&self) -> &[Unspent] {
        match &self.state {
            ChainState::Utxo(u) => u,
            ChainState::Account { .. } => &[],
        }
    }
}

/// Fee options for a transfer
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub minimal: u128,
    pub normal: u128,
    pub priority: u128,
}

/// Network provider for a single chain
#[async_trait::async_trait]
pub trait NetworkProvider: Send + Sync {
    /// Fetch balance and chain state for an address
    async fn get_info(&self, address: &str) -> anyhow::Result<ChainInfo>;

    /// Estimate fees for sending `amount` to `destination`
    async fn get_fee(&self, amount: u128, destination: &str) -> anyhow::Result<FeeEstimate>;

    /// Broadcast a signed transaction
    async fn send_transaction(&self, tx: &[u8]) -> anyhow::Result<()>;
}
