// Copyright (c) 2023 The Tapsign Authors

//! Tapsign card emulator
//!
//! [SimCard] answers Read, Sign and CheckWallet commands with a software
//! wallet key and can emulate the card behaviours hosts must cope with:
//! security delays, unanswered exchanges and tag loss mid-signing.
//! [SimTransport] connects an emulated card to a
//! [ReaderSession](tapsign::ReaderSession).

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use tapsign::{config::pin_hash, Transport, TransportError};
use tapsign_apdu::{prelude::*, status::sw, ProtocolError, DEFAULT_MAX_FRAME_LEN};

/// Emulated card behaviour
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize, clap::Args)]
#[serde(default)]
pub struct SimOptions {
    /// Card access code
    #[clap(long, default_value = "000000")]
    pub pin1: String,

    /// Card signing code
    #[clap(long, default_value = "000")]
    pub pin2: String,

    /// Number of initial requests answered with a security delay
    #[clap(long, default_value = "0")]
    pub delay_requests: usize,

    /// Reported security delay in milliseconds
    #[clap(long, default_value = "100")]
    pub delay_ms: u32,

    /// Number of initial requests left unanswered
    #[clap(long, default_value = "0")]
    pub stall_requests: usize,

    /// Lose the tag once more than this many hashes have been signed
    #[clap(long)]
    pub lose_tag_after: Option<u32>,

    /// Reader frame length limit
    #[clap(long, default_value_t = DEFAULT_MAX_FRAME_LEN)]
    pub max_frame_len: usize,

    /// Signature budget
    #[clap(long, default_value = "100000")]
    pub max_signatures: u32,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            pin1: "000000".to_string(),
            pin2: "000".to_string(),
            delay_requests: 0,
            delay_ms: 100,
            stall_requests: 0,
            lose_tag_after: None,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            max_signatures: 100_000,
        }
    }
}

/// Emulated wallet key
pub enum SimKey {
    Secp256k1(k256::ecdsa::SigningKey),
    Ed25519(ed25519_dalek::SigningKey),
}

impl SimKey {
    /// Create a key of the given curve from a 32-byte seed
    pub fn from_seed(curve: Curve, seed: [u8; 32]) -> anyhow::Result<Self> {
        let k = match curve {
            Curve::Secp256k1 => Self::Secp256k1(k256::ecdsa::SigningKey::from_slice(&seed)?),
            Curve::Ed25519 => Self::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed)),
        };
        Ok(k)
    }

    /// Create a random key of the given curve
    pub fn random(curve: Curve) -> Self {
        let mut rng = rand::thread_rng();
        match curve {
            Curve::Secp256k1 => Self::Secp256k1(k256::ecdsa::SigningKey::random(&mut rng)),
            Curve::Ed25519 => Self::Ed25519(ed25519_dalek::SigningKey::generate(&mut rng)),
        }
    }

    pub fn curve(&self) -> Curve {
        match self {
            Self::Secp256k1(_) => Curve::Secp256k1,
            Self::Ed25519(_) => Curve::Ed25519,
        }
    }

    /// Public key as reported by cards, uncompressed SEC1 for secp256k1
    pub fn public_key(&self) -> Vec<u8> {
        match self {
            Self::Secp256k1(k) => k
                .verifying_key()
                .to_encoded_point(false)
                .as_bytes()
                .to_vec(),
            Self::Ed25519(k) => k.verifying_key().to_bytes().to_vec(),
        }
    }

    /// Sign a hash, `None` if the key cannot sign it
    pub fn sign(&self, hash: &[u8]) -> Option<[u8; SIGNATURE_LEN]> {
        match self {
            Self::Secp256k1(k) => {
                use k256::ecdsa::{signature::hazmat::PrehashSigner, Signature};

                let s: Signature = k.sign_prehash(hash).ok()?;

                let mut out = [0u8; SIGNATURE_LEN];
                out.copy_from_slice(&s.to_bytes());
                Some(out)
            }
            Self::Ed25519(k) => {
                use ed25519_dalek::Signer;

                Some(k.sign(hash).to_bytes())
            }
        }
    }
}

/// Outcome of presenting a frame to the emulated card
#[derive(Clone, PartialEq, Debug)]
pub enum Exchange {
    /// Response frame
    Response(Vec<u8>),
    /// Card never answers
    Stall,
    /// Tag left the field
    Lost,
}

/// Emulated card
pub struct SimCard {
    card_id: [u8; 8],
    key: SimKey,
    salt: [u8; 16],
    pin1_hash: [u8; 32],
    pin2_hash: [u8; 32],
    signed_hashes: u32,
    requests: usize,
    lost: bool,
    opts: SimOptions,
}

impl SimCard {
    pub fn new(key: SimKey, opts: SimOptions) -> Self {
        Self {
            card_id: rand::random(),
            key,
            salt: rand::random(),
            pin1_hash: pin_hash(&opts.pin1),
            pin2_hash: pin_hash(&opts.pin2),
            signed_hashes: 0,
            requests: 0,
            lost: false,
            opts,
        }
    }

    pub fn card_id(&self) -> [u8; 8] {
        self.card_id
    }

    pub fn key(&self) -> &SimKey {
        &self.key
    }

    pub fn signed_hashes(&self) -> u32 {
        self.signed_hashes
    }

    pub fn options(&self) -> &SimOptions {
        &self.opts
    }

    /// Return the tag to the field
    pub fn restore_tag(&mut self) {
        self.lost = false;
    }

    /// Handle a raw command frame
    pub fn exchange(&mut self, frame: &[u8]) -> Exchange {
        if self.lost {
            return Exchange::Lost;
        }

        self.requests += 1;

        if self.requests <= self.opts.stall_requests {
            debug!("stalling request {}", self.requests);
            return Exchange::Stall;
        }

        let cmd = match CommandApdu::parse(frame) {
            Ok(v) => v,
            Err(e) => {
                debug!("invalid command: {}", e);
                let status = match e {
                    ProtocolError::UnknownInstruction(_) => sw::INS_NOT_SUPPORTED,
                    _ => sw::ERROR_PROCESSING_COMMAND,
                };
                return respond(ResponseApdu::status_only(status));
            }
        };

        // Tag loss is checked before the security delay so signing budgets
        // count hashes, not attempts
        if let (Instruction::Sign, Some(limit)) = (cmd.instruction, self.opts.lose_tag_after) {
            let n = SignReq::try_from(&cmd.payload)
                .map(|r| r.hashes().len() as u32)
                .unwrap_or(0);

            if self.signed_hashes + n > limit {
                debug!("tag lost after {} signed hashes", self.signed_hashes);
                self.lost = true;
                return Exchange::Lost;
            }
        }

        if self.requests <= self.opts.stall_requests + self.opts.delay_requests {
            debug!("security delay for request {}", self.requests);
            let pause = Tlv::u32(Tag::Pause, self.opts.delay_ms / 10);
            return respond(ResponseApdu::new(sw::NEED_PAUSE, TlvList::new().with(pause)));
        }

        respond(self.process(&cmd))
    }

    /// Handle a parsed command
    pub fn process(&mut self, cmd: &CommandApdu) -> ResponseApdu {
        trace!("process {}: {:?}", cmd.instruction, cmd.payload);

        let r = match cmd.instruction {
            Instruction::Read => self.read(&cmd.payload),
            Instruction::Sign => self.sign(&cmd.payload),
            Instruction::CheckWallet => self.check_wallet(&cmd.payload),
            _ => Err(sw::INS_NOT_SUPPORTED),
        };

        match r {
            Ok(t) => ResponseApdu::new(sw::PROCESS_COMPLETED, t),
            Err(status) => ResponseApdu::status_only(status),
        }
    }

    fn read(&mut self, t: &TlvList) -> Result<TlvList, u16> {
        let req = ReadReq::try_from(t).map_err(|_| sw::INVALID_PARAMS)?;
        if req.pin_hash != self.pin1_hash {
            return Err(sw::INVALID_PARAMS);
        }

        let resp = ReadResp {
            card_id: self.card_id,
            manufacturer: "TAPSIGN".to_string(),
            status: CardStatus::Loaded,
            firmware: "4.12r".to_string(),
            curve: self.key.curve(),
            settings_mask: SettingsMask::IS_REUSABLE | SettingsMask::ALLOW_SWAP_PIN,
            wallet_public_key: Some(self.key.public_key()),
            max_signatures: Some(self.opts.max_signatures),
            remaining_signatures: Some(self.remaining()),
            signed_hashes: Some(self.signed_hashes),
            pause_before_pin2_ms: 0,
            blockchain_name: None,
        };

        Ok(resp.tlvs())
    }

    fn sign(&mut self, t: &TlvList) -> Result<TlvList, u16> {
        let req = SignReq::try_from(t).map_err(|_| sw::INVALID_PARAMS)?;

        if req.pin_hash != self.pin1_hash || req.pin2_hash != self.pin2_hash {
            return Err(sw::INVALID_PARAMS);
        }
        if req.card_id != self.card_id {
            return Err(sw::INVALID_STATE);
        }
        if let Some(k) = &req.wallet_public_key {
            if *k != self.key.public_key() {
                return Err(sw::INVALID_PARAMS);
            }
        }

        let hashes = req.hashes();
        if hashes.len() > MAX_HASHES_PER_REQUEST || hashes.len() as u32 > self.remaining() {
            return Err(sw::INVALID_PARAMS);
        }

        let signatures = hashes
            .iter()
            .map(|h| self.key.sign(h))
            .collect::<Option<Vec<_>>>()
            .ok_or(sw::ERROR_PROCESSING_COMMAND)?;

        self.signed_hashes += signatures.len() as u32;

        let resp = SignResp {
            card_id: self.card_id,
            signatures,
            remaining_signatures: Some(self.remaining()),
            signed_hashes: Some(self.signed_hashes),
        };

        Ok(resp.tlvs())
    }

    fn check_wallet(&mut self, t: &TlvList) -> Result<TlvList, u16> {
        let req = CheckWalletReq::try_from(t).map_err(|_| sw::INVALID_PARAMS)?;

        if req.pin_hash != self.pin1_hash {
            return Err(sw::INVALID_PARAMS);
        }
        if req.card_id != self.card_id {
            return Err(sw::INVALID_STATE);
        }

        let digest = Sha256::new()
            .chain_update(req.challenge)
            .chain_update(self.salt)
            .finalize();

        let signature = self
            .key
            .sign(&digest)
            .ok_or(sw::ERROR_PROCESSING_COMMAND)?;

        let resp = CheckWalletResp {
            card_id: self.card_id,
            salt: self.salt.to_vec(),
            signature,
        };

        Ok(resp.tlvs())
    }

    fn remaining(&self) -> u32 {
        self.opts.max_signatures.saturating_sub(self.signed_hashes)
    }
}

fn respond(resp: ResponseApdu) -> Exchange {
    match resp.to_vec() {
        Ok(v) => Exchange::Response(v),
        Err(e) => {
            debug!("response encoding failed: {}", e);
            Exchange::Response(sw::ERROR_PROCESSING_COMMAND.to_be_bytes().to_vec())
        }
    }
}

/// [Transport] connecting a reader to an emulated card
#[derive(Clone)]
pub struct SimTransport {
    card: Arc<Mutex<SimCard>>,
    max_frame_len: usize,
}

impl SimTransport {
    pub fn new(card: Arc<Mutex<SimCard>>, max_frame_len: usize) -> Self {
        Self {
            card,
            max_frame_len,
        }
    }

    pub fn card(&self) -> Arc<Mutex<SimCard>> {
        self.card.clone()
    }
}

impl From<SimCard> for SimTransport {
    fn from(card: SimCard) -> Self {
        let max_frame_len = card.opts.max_frame_len;
        Self::new(Arc::new(Mutex::new(card)), max_frame_len)
    }
}

#[async_trait]
impl Transport for SimTransport {
    async fn transceive(&self, req: &[u8]) -> Result<Vec<u8>, TransportError> {
        // Lock released before stalling so the card stays inspectable
        let r = self.card.lock().await.exchange(req);

        match r {
            Exchange::Response(v) => Ok(v),
            Exchange::Lost => Err(TransportError::Lost),
            Exchange::Stall => futures::future::pending().await,
        }
    }

    fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}
