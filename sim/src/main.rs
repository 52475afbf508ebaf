// Copyright (c) 2023 The Tapsign Authors

//! Command line utility for exercising tapsign hosts against an emulated card

use std::path::PathBuf;

use clap::Parser;
use log::{debug, info, LevelFilter};

use tapsign::{
    engine::EngineFactory, CardSession, SessionConfig, SessionEvent, SigningGateway,
};
use tapsign_apdu::Curve;
use tapsign_sim::{SimCard, SimKey, SimOptions, SimTransport};

/// Tapsign card emulator
#[derive(Clone, Debug, PartialEq, Parser)]
struct Args {
    /// Wallet key curve
    #[clap(long, value_enum, default_value = "secp256k1")]
    curve: CurveArg,

    /// Hex encoded wallet key seed, random if not provided
    #[clap(long)]
    seed: Option<HexData>,

    /// Session configuration file (JSON)
    #[clap(long)]
    config: Option<PathBuf>,

    #[clap(flatten)]
    sim: SimOptions,

    /// Subcommand to execute
    #[clap(subcommand)]
    cmd: Actions,

    /// Log level
    #[clap(long, default_value = "info")]
    log_level: LevelFilter,
}

#[derive(Clone, Debug, PartialEq, Parser)]
enum Actions {
    /// Read card information
    Read,

    /// Derive the wallet address for a blockchain
    Address {
        /// Network identifier (eg. `bitcoin`, `ethereum/test`)
        blockchain: String,
    },

    /// Sign raw 32-byte hashes
    Sign {
        /// Hex encoded hashes
        #[clap(required = true)]
        hashes: Vec<HexData>,
    },

    /// Challenge the card to prove it holds its wallet key
    CheckWallet,

    /// List supported network identifiers
    Chains,
}

#[derive(Copy, Clone, Debug, PartialEq, clap::ValueEnum, strum::Display)]
enum CurveArg {
    Secp256k1,
    Ed25519,
}

impl From<CurveArg> for Curve {
    fn from(c: CurveArg) -> Self {
        match c {
            CurveArg::Secp256k1 => Curve::Secp256k1,
            CurveArg::Ed25519 => Curve::Ed25519,
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
struct HexData(Vec<u8>);

impl std::str::FromStr for HexData {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        hex::decode(s.trim_start_matches("0x")).map(HexData)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging
    let _ = simplelog::TermLogger::init(
        args.log_level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    if args.cmd == Actions::Chains {
        for b in EngineFactory::supported() {
            info!("{:24} {} ({})", b.id(), b, b.curve());
        }
        return Ok(());
    }

    // Load session configuration
    let config = match &args.config {
        Some(p) => {
            let s = std::fs::read_to_string(p)?;
            serde_json::from_str::<SessionConfig>(&s)?
        }
        None => SessionConfig::default(),
    };

    // Setup emulated card
    let key = match &args.seed {
        Some(s) => {
            let seed = <[u8; 32]>::try_from(s.0.as_slice())
                .map_err(|_| anyhow::anyhow!("seed must be 32 bytes"))?;
            SimKey::from_seed(args.curve.into(), seed)?
        }
        None => SimKey::random(args.curve.into()),
    };
    let card = SimCard::new(key, args.sim.clone());

    // Present the card to a reader
    let session = CardSession::new(config);
    {
        let reader = session.reader();
        let mut reader = reader.lock().await;
        reader.enable();
        reader.attach(SimTransport::from(card))?;
    }

    // Report security delays while commands are in flight
    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(SessionEvent::SecurityDelay { delay_ms, attempt }) = events.recv().await {
            info!("Security delay {}ms (attempt {})", delay_ms, attempt);
        }
    });

    execute(session, args.cmd).await
}

async fn execute(session: CardSession, cmd: Actions) -> anyhow::Result<()> {
    match cmd {
        Actions::Read => {
            let r = session.read_card().await?;

            info!("Card ID: {}", hex::encode(r.card_id));
            info!("Manufacturer: {}", r.manufacturer);
            info!("Firmware: {}", r.firmware);
            info!("Status: {}", r.status);
            info!("Curve: {}", r.curve);
            if let Some(k) = &r.wallet_public_key {
                info!("Wallet key: {}", hex::encode(k));
            }
            if let Some(n) = r.remaining_signatures {
                info!("Remaining signatures: {}", n);
            }
        }
        Actions::Address { blockchain } => {
            let engine = EngineFactory::default()
                .create(&blockchain)
                .ok_or_else(|| anyhow::anyhow!("unsupported blockchain: {}", blockchain))?;

            let gateway = SigningGateway::connect(session).await?;
            let key = gateway.wallet_key();

            if key.curve != engine.blockchain.curve() {
                return Err(anyhow::anyhow!(
                    "{} requires a {} key (card: {})",
                    engine.blockchain,
                    engine.blockchain.curve(),
                    key.curve
                ));
            }

            let address = engine.address_service.make_address(&key.public_key)?;
            info!("{} address: {}", engine.blockchain, address);
        }
        Actions::Sign { hashes } => {
            let gateway = SigningGateway::connect(session).await?;

            let hashes: Vec<_> = hashes.into_iter().map(|h| h.0).collect();
            debug!("Signing {} hashes", hashes.len());

            let signatures = gateway.sign_hashes(&hashes, gateway.wallet_key()).await?;
            for (h, s) in hashes.iter().zip(&signatures) {
                info!("{}: {}", hex::encode(h), hex::encode(s));
            }
        }
        Actions::CheckWallet => {
            let gateway = SigningGateway::connect(session).await?;
            gateway.check_wallet().await?;

            info!("Wallet verified: {}", hex::encode(&gateway.wallet_key().public_key));
        }
        Actions::Chains => (),
    }

    Ok(())
}
