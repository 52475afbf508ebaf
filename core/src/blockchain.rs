// Copyright (c) 2023 The Tapsign Authors

//! Supported blockchains
//!
//! Network identifiers are the stable strings used by persisted wallet
//! metadata (`"bitcoin"`, `"ethereum/test"`, ...).

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use tapsign_apdu::Curve;

/// Blockchain identifier
#[derive(
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Debug,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[serde(into = "&'static str", try_from = "String")]
pub enum Blockchain {
    #[strum(serialize = "bitcoin")]
    Bitcoin,
    #[strum(serialize = "bitcoin/test")]
    BitcoinTestnet,
    #[strum(serialize = "bitcoin-cash")]
    BitcoinCash,
    #[strum(serialize = "bitcoin-cash/test")]
    BitcoinCashTestnet,
    #[strum(serialize = "litecoin")]
    Litecoin,
    #[strum(serialize = "dogecoin")]
    Dogecoin,
    #[strum(serialize = "dash")]
    Dash,
    #[strum(serialize = "ducatus")]
    Ducatus,
    #[strum(serialize = "ravencoin")]
    Ravencoin,
    #[strum(serialize = "ravencoin/test")]
    RavencoinTestnet,

    #[strum(serialize = "ethereum")]
    Ethereum,
    #[strum(serialize = "ethereum/test")]
    EthereumTestnet,
    #[strum(serialize = "ethereum-classic")]
    EthereumClassic,
    #[strum(serialize = "ethereum-classic/test")]
    EthereumClassicTestnet,
    #[strum(serialize = "ethereum-pow-iou")]
    EthereumPow,
    #[strum(serialize = "ethereumfair")]
    EthereumFair,
    #[strum(serialize = "rootstock")]
    Rsk,
    #[strum(serialize = "binance-smart-chain")]
    BinanceSmartChain,
    #[strum(serialize = "binance-smart-chain/test")]
    BinanceSmartChainTestnet,
    #[strum(serialize = "polygon-pos")]
    Polygon,
    #[strum(serialize = "polygon-pos/test")]
    PolygonTestnet,
    #[strum(serialize = "avalanche")]
    Avalanche,
    #[strum(serialize = "avalanche/test")]
    AvalancheTestnet,
    #[strum(serialize = "fantom")]
    Fantom,
    #[strum(serialize = "fantom/test")]
    FantomTestnet,
    #[strum(serialize = "arbitrum-one")]
    Arbitrum,
    #[strum(serialize = "optimistic-ethereum")]
    Optimism,
    #[strum(serialize = "xdai")]
    Gnosis,
    #[strum(serialize = "cronos")]
    Cronos,
    #[strum(serialize = "base")]
    Base,
    #[strum(serialize = "kava")]
    Kava,
    #[strum(serialize = "telos")]
    Telos,
    #[strum(serialize = "octaspace")]
    OctaSpace,
    #[strum(serialize = "moonbeam")]
    Moonbeam,
    #[strum(serialize = "moonriver")]
    Moonriver,
    #[strum(serialize = "mantle")]
    Mantle,
    #[strum(serialize = "flare-network")]
    Flare,
    #[strum(serialize = "taraxa")]
    Taraxa,
    #[strum(serialize = "blast")]
    Blast,
    #[strum(serialize = "cyber")]
    Cyber,
    #[strum(serialize = "pulsechain")]
    PulseChain,
    #[strum(serialize = "aurora")]
    Aurora,
    #[strum(serialize = "areon-network")]
    Areon,
    #[strum(serialize = "zksync")]
    ZkSync,
    #[strum(serialize = "polygon-zkevm")]
    PolygonZkEvm,
    #[strum(serialize = "manta-pacific")]
    MantaPacific,
    #[strum(serialize = "shibarium")]
    Shibarium,

    #[strum(serialize = "stellar")]
    Stellar,
    #[strum(serialize = "stellar/test")]
    StellarTestnet,
}

/// Legacy P2PKH network parameters
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct BitcoinNetwork {
    /// Base58check version byte for pay-to-pubkey-hash addresses
    pub p2pkh_version: u8,
    /// Use compressed public keys when deriving addresses and scripts
    pub compressed_keys: bool,
}

impl BitcoinNetwork {
    const fn new(p2pkh_version: u8) -> Self {
        Self {
            p2pkh_version,
            compressed_keys: true,
        }
    }

    /// Networks whose card wallets were issued with uncompressed key hashes
    const fn uncompressed(p2pkh_version: u8) -> Self {
        Self {
            p2pkh_version,
            compressed_keys: false,
        }
    }
}

/// Transaction family, with the parameters each family needs
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ChainKind {
    /// Legacy P2PKH, SIGHASH_ALL
    Bitcoin(BitcoinNetwork),
    /// BIP143 with SIGHASH_FORKID, cashaddr addresses
    BitcoinCash { prefix: &'static str },
    /// EIP-155 account chains
    Evm {
        chain_id: u64,
        /// Chain id mixed into the address checksum (EIP-1191)
        checksum_chain_id: Option<u64>,
    },
    /// Ed25519 account chains with a network passphrase
    Stellar { passphrase: &'static str },
}

const fn evm(chain_id: u64) -> ChainKind {
    ChainKind::Evm {
        chain_id,
        checksum_chain_id: None,
    }
}

impl Blockchain {
    /// Transaction family and parameters
    pub const fn kind(&self) -> ChainKind {
        use Blockchain::*;

        match self {
            Bitcoin => ChainKind::Bitcoin(BitcoinNetwork::uncompressed(0x00)),
            BitcoinTestnet => ChainKind::Bitcoin(BitcoinNetwork::uncompressed(0x6F)),
            Litecoin => ChainKind::Bitcoin(BitcoinNetwork::uncompressed(0x30)),
            Dogecoin => ChainKind::Bitcoin(BitcoinNetwork::new(0x1E)),
            Dash => ChainKind::Bitcoin(BitcoinNetwork::new(0x4C)),
            Ducatus => ChainKind::Bitcoin(BitcoinNetwork::uncompressed(0x31)),
            Ravencoin => ChainKind::Bitcoin(BitcoinNetwork::new(0x3C)),
            RavencoinTestnet => ChainKind::Bitcoin(BitcoinNetwork::new(0x6F)),

            BitcoinCash => ChainKind::BitcoinCash {
                prefix: "bitcoincash",
            },
            BitcoinCashTestnet => ChainKind::BitcoinCash { prefix: "bchtest" },

            Ethereum => evm(1),
            EthereumTestnet => evm(11155111),
            EthereumClassic => evm(61),
            EthereumClassicTestnet => evm(63),
            EthereumPow => evm(10001),
            EthereumFair => evm(513100),
            Rsk => ChainKind::Evm {
                chain_id: 30,
                checksum_chain_id: Some(30),
            },
            BinanceSmartChain => evm(56),
            BinanceSmartChainTestnet => evm(97),
            Polygon => evm(137),
            PolygonTestnet => evm(80002),
            Avalanche => evm(43114),
            AvalancheTestnet => evm(43113),
            Fantom => evm(250),
            FantomTestnet => evm(4002),
            Arbitrum => evm(42161),
            Optimism => evm(10),
            Gnosis => evm(100),
            Cronos => evm(25),
            Base => evm(8453),
            Kava => evm(2222),
            Telos => evm(40),
            OctaSpace => evm(800001),
            Moonbeam => evm(1284),
            Moonriver => evm(1285),
            Mantle => evm(5000),
            Flare => evm(14),
            Taraxa => evm(841),
            Blast => evm(81457),
            Cyber => evm(7560),
            PulseChain => evm(369),
            Aurora => evm(1313161554),
            Areon => evm(463),
            ZkSync => evm(324),
            PolygonZkEvm => evm(1101),
            MantaPacific => evm(169),
            Shibarium => evm(109),

            Stellar => ChainKind::Stellar {
                passphrase: "Public Global Stellar Network ; September 2015",
            },
            StellarTestnet => ChainKind::Stellar {
                passphrase: "Test SDF Network ; September 2015",
            },
        }
    }

    /// Curve of the wallet key used by this chain
    pub const fn curve(&self) -> Curve {
        match self.kind() {
            ChainKind::Stellar { .. } => Curve::Ed25519,
            _ => Curve::Secp256k1,
        }
    }

    /// Number of decimals in the chain's base unit
    pub const fn decimals(&self) -> u8 {
        match self.kind() {
            ChainKind::Bitcoin(_) | ChainKind::BitcoinCash { .. } => 8,
            ChainKind::Evm { .. } => 18,
            ChainKind::Stellar { .. } => 7,
        }
    }

    /// Check whether this is a test network
    pub fn is_testnet(&self) -> bool {
        let id: &'static str = self.into();
        id.ends_with("/test")
    }

    /// Network identifier
    pub fn id(&self) -> &'static str {
        self.into()
    }
}

impl TryFrom<String> for Blockchain {
    type Error = strum::ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
