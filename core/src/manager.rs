// Copyright (c) 2023 The Tapsign Authors

//! Wallet manager, owns the chain state for one card key on one chain
//!
//! All state changes happen with the state lock held, so an `update()`
//! can never interleave with a `send()` building from the same UTXO set.
//! Observers read [WalletSnapshot]s via [WalletManager::subscribe].

use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};

use crate::{
    blockchain::Blockchain,
    error::{BuildError, WalletError},
    factory::Engine,
    provider::{ChainState, FeeEstimate, NetworkProvider},
    signer::{KeyRef, Signer},
    TransactionData,
};

/// Broadcast transaction awaiting confirmation
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub id: String,
    pub destination: String,
    pub amount: u128,
    pub fee: u128,
}

/// Result of a successful send
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SendResult {
    /// Transaction id as reported by explorers
    pub id: String,
}

/// Read-only view of wallet state
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub blockchain: Blockchain,
    pub address: String,
    pub balance: u128,
    pub pending: Vec<PendingTransaction>,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct WalletState {
    address: String,
    balance: u128,
    chain: ChainState,
    pending: Vec<PendingTransaction>,
    last_error: Option<String>,
}

/// Per chain wallet manager
pub struct WalletManager {
    engine: Engine,
    key: KeyRef,
    provider: Arc<dyn NetworkProvider>,
    state: Mutex<WalletState>,
    snapshots: watch::Sender<WalletSnapshot>,
}

impl WalletManager {
    /// Create a wallet manager, deriving the address from the card key
    pub fn new(
        engine: Engine,
        key: KeyRef,
        provider: Arc<dyn NetworkProvider>,
    ) -> Result<Self, WalletError> {
        if key.curve != engine.blockchain.curve() {
            return Err(WalletError::CurveMismatch {
                curve: key.curve,
                blockchain: engine.blockchain,
            });
        }

        let address = engine.address_service.make_address(&key.public_key)?;
        debug!("wallet manager for {} address: {}", engine.blockchain, address);

        let state = WalletState {
            address,
            balance: 0,
            chain: ChainState::default(),
            pending: Vec::new(),
            last_error: None,
        };

        let (snapshots, _) = watch::channel(Self::snapshot_of(engine.blockchain, &state));

        Ok(Self {
            engine,
            key,
            provider,
            state: Mutex::new(state),
            snapshots,
        })
    }

    /// Blockchain this manager operates on
    pub fn blockchain(&self) -> Blockchain {
        self.engine.blockchain
    }

    /// Wallet key
    pub fn key(&self) -> &KeyRef {
        &self.key
    }

    /// Current state
    pub fn snapshot(&self) -> WalletSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<WalletSnapshot> {
        self.snapshots.subscribe()
    }

    /// Refresh balance and chain state from the network
    pub async fn update(&self) -> Result<WalletSnapshot, WalletError> {
        let mut state = self.state.lock().await;

        let r = self
            .provider
            .get_info(&state.address)
            .await
            .map_err(WalletError::Network);

        match r {
            Ok(info) => {
                debug!(
                    "{} update, balance: {} utxos: {}",
                    self.engine.blockchain,
                    info.balance,
                    info.utxos().len()
                );

                state.balance = info.balance;
                state.chain = info.state;
                state.last_error = None;
                Ok(self.publish(&state))
            }
            Err(e) => Err(self.fail(&mut state, e)),
        }
    }

    /// Estimate fees for a transfer
    pub async fn get_fee(
        &self,
        amount: u128,
        destination: &str,
    ) -> Result<FeeEstimate, WalletError> {
        if !self.engine.address_service.validate(destination) {
            return Err(crate::AddressError::InvalidAddress(destination.to_string()).into());
        }

        self.provider
            .get_fee(amount, destination)
            .await
            .map_err(WalletError::Network)
    }

    /// Build, sign and broadcast a transaction
    ///
    /// The state lock is held throughout, failures are recorded as the
    /// last error and leave the chain state untouched.
    pub async fn send<S: Signer>(
        &self,
        intent: &TransactionData,
        signer: &S,
    ) -> Result<SendResult, WalletError> {
        let mut state = self.state.lock().await;

        match self.send_locked(&state, intent, signer).await {
            Ok((id, raw_len)) => {
                debug!(
                    "{} sent {} ({} bytes)",
                    self.engine.blockchain, id, raw_len
                );

                state.pending.push(PendingTransaction {
                    id: id.clone(),
                    destination: intent.destination_address.clone(),
                    amount: intent.amount,
                    fee: intent.fee,
                });
                state.balance = state
                    .balance
                    .saturating_sub(intent.native_cost().unwrap_or(u128::MAX));

                // Spent outputs are gone, the next nonce is taken
                state.chain = match &state.chain {
                    ChainState::Utxo(_) => ChainState::Utxo(Vec::new()),
                    ChainState::Account { nonce } => ChainState::Account { nonce: nonce + 1 },
                };
                state.last_error = None;

                self.publish(&state);
                Ok(SendResult { id })
            }
            Err(e) => Err(self.fail(&mut state, e)),
        }
    }

    async fn send_locked<S: Signer>(
        &self,
        state: &WalletState,
        intent: &TransactionData,
        signer: &S,
    ) -> Result<(String, usize), WalletError> {
        let builder = &self.engine.builder;

        // UTXO builders check against the spendable outputs instead
        if let ChainState::Account { .. } = state.chain {
            let required = intent
                .native_cost()
                .ok_or(BuildError::AmountOverflow(intent.amount))?;

            if required > state.balance {
                return Err(BuildError::InsufficientFunds {
                    available: state.balance,
                    required,
                }
                .into());
            }
        }

        let prepared = builder.build_to_sign(intent, &state.chain, &self.key)?;

        let signatures = signer
            .sign(&prepared.hashes, &self.key)
            .await
            .map_err(|e| WalletError::Signing(anyhow::Error::new(e)))?;

        let raw = builder.build_to_send(&prepared, &signatures)?;
        let id = builder.transaction_id(&prepared, &raw);

        self.provider
            .send_transaction(&raw)
            .await
            .map_err(WalletError::Network)?;

        Ok((id, raw.len()))
    }

    fn fail(&self, state: &mut WalletState, e: WalletError) -> WalletError {
        warn!("{} wallet error: {}", self.engine.blockchain, e);

        state.last_error = Some(e.to_string());
        self.publish(state);
        e
    }

    fn publish(&self, state: &WalletState) -> WalletSnapshot {
        let s = Self::snapshot_of(self.engine.blockchain, state);
        self.snapshots.send_replace(s.clone());
        s
    }

    fn snapshot_of(blockchain: Blockchain, state: &WalletState) -> WalletSnapshot {
        WalletSnapshot {
            blockchain,
            address: state.address.clone(),
            balance: state.balance,
            pending: state.pending.clone(),
            last_error: state.last_error.clone(),
        }
    }
}
