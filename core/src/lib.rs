// Copyright (c) 2023 The Tapsign Authors

//! Multi-chain wallet engine for tapsign cards
//!
//! The card is used as a signing oracle, everything else happens here:
//! per-chain [address] derivation, unsigned transaction construction and
//! signed transaction assembly ([builder]), and [manager::WalletManager]
//! instances tying a [provider::NetworkProvider] to a [signer::Signer].
//!
//! [factory::EngineFactory] is the single dispatch point mapping a
//! [Blockchain] identifier to its builder and address service.

pub mod address;
pub mod blockchain;
pub mod builder;
pub mod error;
pub mod factory;
pub mod helpers;
pub mod manager;
pub mod provider;
pub mod signature;
pub mod signer;

pub use blockchain::{Blockchain, ChainKind};
pub use error::{AddressError, BuildError, WalletError};
pub use factory::{Engine, EngineFactory, FactoryConfig};
pub use manager::{PendingTransaction, SendResult, WalletManager, WalletSnapshot};
pub use provider::{ChainInfo, ChainState, FeeEstimate, NetworkProvider, Unspent};
pub use signer::{KeyRef, Signer};

pub use tapsign_apdu::Curve;

/// Transaction intent
///
/// Amounts and fees are in the chain's smallest unit.
#[derive(Clone, PartialEq, Debug)]
pub struct TransactionData {
    pub source_address: String,
    pub destination_address: String,
    pub amount: u128,
    pub fee: u128,
    /// Change destination, defaults to the source address
    pub change_address: Option<String>,
    /// ERC-20 contract for token transfers, `amount` is then in token units
    pub contract_address: Option<String>,
}

impl TransactionData {
    /// Create a new transaction intent
    pub fn new(source: &str, destination: &str, amount: u128, fee: u128) -> Self {
        Self {
            source_address: source.to_string(),
            destination_address: destination.to_string(),
            amount,
            fee,
            change_address: None,
            contract_address: None,
        }
    }

    /// Transfer a token held at `contract` instead of the native coin
    pub fn with_token(mut self, contract: &str) -> Self {
        self.contract_address = Some(contract.to_string());
        self
    }

    /// Native units debited from the source, only the fee for token transfers
    pub fn native_cost(&self) -> Option<u128> {
        match self.contract_address {
            Some(_) => Some(self.fee),
            None => self.amount.checked_add(self.fee),
        }
    }

    /// Address receiving change for UTXO chains
    pub fn change_address(&self) -> &str {
        self.change_address
            .as_deref()
            .unwrap_or(&self.source_address)
    }
}
