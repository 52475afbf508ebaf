use std::sync::Arc;

use encdec::Encode;
use k256::ecdsa::{signature::hazmat::PrehashVerifier, Signature, VerifyingKey};
use sha2::{Digest, Sha256};

use tapsign::{
    apdu::{ApduReq, EncodingError},
    engine::{
        ChainInfo, ChainState, EngineFactory, KeyRef, TransactionData, WalletError,
    },
    SessionConfig, SessionError, SessionState, SigningError, SigningGateway, TransportError,
};
use tapsign_apdu::Curve;
use tapsign_sim::{SimOptions, SimTransport};

mod helpers;
use helpers::*;

const BTC_DESTINATION: &str = "1BpEi6DfDAUFd7GtittLSdBeYJvcoaVggu";

fn hashes(n: u8) -> Vec<Vec<u8>> {
    (1..=n).map(|i| vec![i; 32]).collect()
}

fn verify_all(key: &KeyRef, hashes: &[Vec<u8>], signatures: &[Vec<u8>]) {
    let k = VerifyingKey::from_sec1_bytes(&key.public_key).unwrap();

    assert_eq!(hashes.len(), signatures.len());
    for (h, s) in hashes.iter().zip(signatures) {
        let s = Signature::from_slice(s).unwrap();
        k.verify_prehash(h, &s).unwrap();
    }
}

#[tokio::test]
async fn sign_in_order() -> anyhow::Result<()> {
    let rig = Rig::new(Curve::Secp256k1, SimOptions::default(), test_config()).await;
    let gateway = SigningGateway::connect(rig.session.clone()).await?;

    // More hashes than fit a single request
    let h = hashes(23);
    let signatures = gateway.sign_hashes(&h, gateway.wallet_key()).await?;

    verify_all(gateway.wallet_key(), &h, &signatures);
    assert_eq!(rig.signed_hashes().await, 23);

    // Nothing to sign never touches the card
    assert!(gateway.sign_hashes(&[], gateway.wallet_key()).await?.is_empty());
    assert_eq!(rig.signed_hashes().await, 23);

    Ok(())
}

#[tokio::test]
async fn batches_fit_frame_length() -> anyhow::Result<()> {
    let rig = Rig::new(Curve::Secp256k1, SimOptions::default(), test_config()).await;
    let gateway = SigningGateway::connect(rig.session.clone()).await?;

    // Shrink the frame length to fit two hashes per request
    let two = rig
        .session
        .sign_req(
            gateway.card_id(),
            hashes(2),
            Some(gateway.wallet_key().public_key.clone()),
        )?
        .command()
        .encode_len()?;

    rig.session
        .reader()
        .lock()
        .await
        .attach(SimTransport::new(rig.card.clone(), two))?;

    let h = hashes(5);
    let signatures = gateway.sign_hashes(&h, gateway.wallet_key()).await?;
    verify_all(gateway.wallet_key(), &h, &signatures);

    Ok(())
}

#[tokio::test]
async fn oversize_frame_rejected() -> anyhow::Result<()> {
    let rig = Rig::new(Curve::Secp256k1, SimOptions::default(), test_config()).await;
    let gateway = SigningGateway::connect(rig.session.clone()).await?;

    rig.session
        .reader()
        .lock()
        .await
        .attach(SimTransport::new(rig.card.clone(), 64))?;

    let e = gateway
        .sign_hashes(&hashes(1), gateway.wallet_key())
        .await
        .unwrap_err();

    assert!(matches!(
        e,
        SigningError::Session(SessionError::Encoding(EncodingError::FrameTooLarge {
            max: 64,
            ..
        }))
    ));
    assert_eq!(rig.signed_hashes().await, 0);

    Ok(())
}

#[tokio::test]
async fn all_or_nothing() -> anyhow::Result<()> {
    let opts = SimOptions {
        lose_tag_after: Some(1),
        ..Default::default()
    };
    let config = SessionConfig {
        max_hashes_per_batch: 1,
        ..test_config()
    };
    let rig = Rig::new(Curve::Secp256k1, opts, config).await;
    let gateway = SigningGateway::connect(rig.session.clone()).await?;

    let e = gateway
        .sign_hashes(&hashes(2), gateway.wallet_key())
        .await
        .unwrap_err();

    assert_eq!(
        e,
        SigningError::Session(SessionError::Transport(TransportError::Lost))
    );

    // First hash was signed by the card, the signature is discarded
    assert_eq!(rig.signed_hashes().await, 1);

    let reader = rig.session.reader();
    assert_eq!(reader.lock().await.state(), SessionState::Detached);

    Ok(())
}

#[tokio::test]
async fn key_checks() -> anyhow::Result<()> {
    let rig = Rig::new(Curve::Ed25519, SimOptions::default(), test_config()).await;
    let gateway = SigningGateway::connect(rig.session.clone()).await?;

    let mut other = gateway.wallet_key().clone();
    other.public_key[0] ^= 0xff;
    assert_eq!(
        gateway.sign_hashes(&hashes(1), &other).await,
        Err(SigningError::KeyMismatch)
    );

    let secp = KeyRef::new(Curve::Secp256k1, &gateway.wallet_key().public_key);
    assert_eq!(
        gateway.sign_hashes(&hashes(1), &secp).await,
        Err(SigningError::CurveMismatch {
            card: Curve::Ed25519,
            requested: Curve::Secp256k1
        })
    );

    assert_eq!(rig.signed_hashes().await, 0);

    gateway.check_wallet().await?;

    Ok(())
}

#[tokio::test]
async fn bitcoin_send() -> anyhow::Result<()> {
    let rig = Rig::new(Curve::Secp256k1, SimOptions::default(), test_config()).await;
    let gateway = SigningGateway::connect(rig.session.clone()).await?;

    let provider = Arc::new(MockProvider::utxo(&[40000, 60000]));
    let engine = EngineFactory::default().create("bitcoin").unwrap();
    let wallet = engine.wallet_manager(gateway.wallet_key().clone(), provider.clone())?;

    let s = wallet.update().await?;
    assert_eq!(s.balance, 100000);

    let intent = TransactionData::new(&s.address, BTC_DESTINATION, 60000, 1000);
    let r = wallet.send(&intent, &gateway).await?;

    // One signature per input
    assert_eq!(rig.signed_hashes().await, 2);

    let sent = provider.sent();
    assert_eq!(sent.len(), 1);

    let mut id: [u8; 32] = Sha256::digest(Sha256::digest(&sent[0])).into();
    id.reverse();
    assert_eq!(r.id, hex::encode(id));
    assert_eq!(wallet.snapshot().balance, 39000);

    Ok(())
}

#[tokio::test]
async fn failed_signing_sends_nothing() -> anyhow::Result<()> {
    let opts = SimOptions {
        lose_tag_after: Some(1),
        ..Default::default()
    };
    let config = SessionConfig {
        max_hashes_per_batch: 1,
        ..test_config()
    };
    let rig = Rig::new(Curve::Secp256k1, opts, config).await;
    let gateway = SigningGateway::connect(rig.session.clone()).await?;

    let provider = Arc::new(MockProvider::utxo(&[40000, 60000]));
    let engine = EngineFactory::default().create("bitcoin/test").unwrap();
    let wallet = engine.wallet_manager(gateway.wallet_key().clone(), provider.clone())?;
    let s = wallet.update().await?;

    let intent = TransactionData::new(&s.address, &s.address, 50000, 1000);
    let e = wallet.send(&intent, &gateway).await.unwrap_err();

    assert!(matches!(e, WalletError::Signing(_)));
    assert!(provider.sent().is_empty());

    let s = wallet.snapshot();
    assert_eq!(s.balance, 100000);
    assert!(s.pending.is_empty());
    assert_eq!(s.last_error.as_deref(), Some("signing failed: tag lost"));

    Ok(())
}

#[tokio::test]
async fn ethereum_send() -> anyhow::Result<()> {
    let rig = Rig::new(Curve::Secp256k1, SimOptions::default(), test_config()).await;
    let gateway = SigningGateway::connect(rig.session.clone()).await?;

    let provider = Arc::new(MockProvider::new(ChainInfo {
        balance: 10u128.pow(18),
        state: ChainState::Account { nonce: 0 },
    }));
    let engine = EngineFactory::default().create("ethereum/test").unwrap();
    let wallet = engine.wallet_manager(gateway.wallet_key().clone(), provider.clone())?;
    let s = wallet.update().await?;

    let intent = TransactionData::new(
        &s.address,
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        10u128.pow(15),
        21000 * 1_000_000_000,
    );
    let r = wallet.send(&intent, &gateway).await?;

    assert!(r.id.starts_with("0x"));
    assert_eq!(rig.signed_hashes().await, 1);
    assert_eq!(provider.sent().len(), 1);

    Ok(())
}

#[tokio::test]
async fn stellar_send() -> anyhow::Result<()> {
    let rig = Rig::new(Curve::Ed25519, SimOptions::default(), test_config()).await;
    let gateway = SigningGateway::connect(rig.session.clone()).await?;

    let provider = Arc::new(MockProvider::new(ChainInfo {
        balance: 100_000_000,
        state: ChainState::Account { nonce: 12 },
    }));
    let engine = EngineFactory::default().create("stellar/test").unwrap();
    let wallet = engine.wallet_manager(gateway.wallet_key().clone(), provider.clone())?;
    let s = wallet.update().await?;

    let intent = TransactionData::new(
        &s.address,
        "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF",
        5_000_000,
        100,
    );
    wallet.send(&intent, &gateway).await?;

    assert_eq!(rig.signed_hashes().await, 1);
    assert_eq!(wallet.snapshot().pending.len(), 1);

    // Next send uses the next sequence number
    wallet.send(&intent, &gateway).await?;
    assert_eq!(rig.signed_hashes().await, 2);
    assert_eq!(provider.sent().len(), 2);
    assert_ne!(provider.sent()[0], provider.sent()[1]);

    Ok(())
}
