// Copyright (c) 2023 The Tapsign Authors

//! Engine factory, the single dispatch point from a [Blockchain] to its
//! transaction builder and address service

use std::{str::FromStr, sync::Arc};

use log::debug;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{
    address::{
        AddressService, Base58AddressService, CashAddrService, EthereumAddressService,
        StellarAddressService,
    },
    blockchain::{Blockchain, ChainKind},
    builder::{
        BitcoinBuilder, BitcoinCashBuilder, EthereumBuilder, StellarBuilder, TransactionBuilder,
        DEFAULT_BASE_FEE, DEFAULT_GAS_LIMIT, DEFAULT_TOKEN_GAS_LIMIT,
    },
    error::WalletError,
    manager::WalletManager,
    provider::NetworkProvider,
    signer::KeyRef,
};

/// Builder parameters that are not fixed per chain
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Gas limit for EVM value transfers
    pub evm_gas_limit: u64,
    /// Gas limit for ERC-20 token transfers
    pub evm_token_gas_limit: u64,
    /// Minimum Stellar fee in stroops
    pub stellar_base_fee: u32,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            evm_gas_limit: DEFAULT_GAS_LIMIT,
            evm_token_gas_limit: DEFAULT_TOKEN_GAS_LIMIT,
            stellar_base_fee: DEFAULT_BASE_FEE,
        }
    }
}

/// Builder and address service for one blockchain
#[derive(Clone)]
pub struct Engine {
    pub blockchain: Blockchain,
    pub builder: Arc<dyn TransactionBuilder>,
    pub address_service: Arc<dyn AddressService>,
}

impl core::fmt::Debug for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("blockchain", &self.blockchain)
            .finish()
    }
}

impl Engine {
    /// Create a wallet manager for a card key on this chain
    pub fn wallet_manager(
        &self,
        key: KeyRef,
        provider: Arc<dyn NetworkProvider>,
    ) -> Result<WalletManager, WalletError> {
        WalletManager::new(self.clone(), key, provider)
    }
}

/// Maps blockchain identifiers to engines
#[derive(Clone, Debug, Default)]
pub struct EngineFactory {
    config: FactoryConfig,
}

impl EngineFactory {
    pub fn new(config: FactoryConfig) -> Self {
        Self { config }
    }

    /// Create the engine for a network identifier, `None` if unsupported
    pub fn create(&self, id: &str) -> Option<Engine> {
        match Blockchain::from_str(id) {
            Ok(b) => Some(self.engine(b)),
            Err(_) => {
                debug!("unsupported blockchain: {}", id);
                None
            }
        }
    }

    /// Create the engine for a blockchain
    pub fn engine(&self, blockchain: Blockchain) -> Engine {
        let (builder, address_service): (Arc<dyn TransactionBuilder>, Arc<dyn AddressService>) =
            match blockchain.kind() {
                ChainKind::Bitcoin(network) => (
                    Arc::new(BitcoinBuilder::new(network)),
                    Arc::new(Base58AddressService::new(network)),
                ),
                ChainKind::BitcoinCash { prefix } => (
                    Arc::new(BitcoinCashBuilder::new(prefix)),
                    Arc::new(CashAddrService::new(prefix)),
                ),
                ChainKind::Evm {
                    chain_id,
                    checksum_chain_id,
                } => (
                    Arc::new(
                        EthereumBuilder::new(
                            chain_id,
                            checksum_chain_id,
                            self.config.evm_gas_limit,
                        )
                        .with_token_gas_limit(self.config.evm_token_gas_limit),
                    ),
                    Arc::new(EthereumAddressService::new(checksum_chain_id)),
                ),
                ChainKind::Stellar { passphrase } => (
                    Arc::new(StellarBuilder::new(passphrase, self.config.stellar_base_fee)),
                    Arc::new(StellarAddressService),
                ),
            };

        Engine {
            blockchain,
            builder,
            address_service,
        }
    }

    /// All supported blockchains
    pub fn supported() -> impl Iterator<Item = Blockchain> {
        Blockchain::iter()
    }
}
