// Copyright (c) 2023 The Tapsign Authors

//! Card session driver
//!
//! Serialises command exchanges over a shared [ReaderSession], maps status
//! words to [SessionError]s and retries commands while the card reports a
//! security delay.

use std::{sync::Arc, time::Duration};

use log::{debug, warn};
use tokio::sync::{broadcast, Mutex};

use tapsign_apdu::{
    check_wallet::CHALLENGE_LEN,
    prelude::{
        ApduReq, CheckWalletReq, CheckWalletResp, CommandApdu, ReadReq, ReadResp, ResponseApdu,
        SignReq, SignResp,
    },
    DecodeError, TlvList,
};

use crate::{reader::ReaderSession, SessionConfig, SessionError};

/// Progress events published while a command is in flight
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SessionEvent {
    /// Card reported a security delay, the command is resent after `delay_ms`
    SecurityDelay { delay_ms: u32, attempt: usize },
}

/// Card session driver, cheap to clone
#[derive(Clone)]
pub struct CardSession {
    reader: Arc<Mutex<ReaderSession>>,
    config: SessionConfig,
    events: broadcast::Sender<SessionEvent>,
}

impl CardSession {
    /// Create a session driver with a new reader
    pub fn new(config: SessionConfig) -> Self {
        let reader = ReaderSession::new(&config);
        Self::with_reader(Arc::new(Mutex::new(reader)), config)
    }

    /// Create a session driver over an existing reader
    pub fn with_reader(reader: Arc<Mutex<ReaderSession>>, config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(16);

        Self {
            reader,
            config,
            events,
        }
    }

    /// Shared reader, used by the platform to enable the reader and attach tags
    pub fn reader(&self) -> Arc<Mutex<ReaderSession>> {
        self.reader.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Maximum command frame length for the attached tag
    pub async fn max_frame_len(&self) -> usize {
        self.reader.lock().await.max_frame_len()
    }

    /// Execute a command, returning the successful response
    ///
    /// The reader is held for the whole command including security delay
    /// retries, so concurrent calls never interleave on the transport.
    pub async fn execute(&self, cmd: &CommandApdu) -> Result<ResponseApdu, SessionError> {
        let mut reader = self.reader.lock().await;

        let frame = cmd.to_vec(reader.max_frame_len())?;

        debug!("execute {} ({} bytes)", cmd.instruction, frame.len());

        let mut attempt = 0;
        loop {
            let r = reader.transceive(&frame).await;
            reader.notify_result(r.is_ok());

            let resp = ResponseApdu::parse(&r?)?;
            let status = resp.status_code();

            if status.is_success() {
                return Ok(resp);
            }

            let delay_ms = match resp.security_delay_ms() {
                Some(v) => v,
                None => {
                    debug!("{} failed with status {:04x}", cmd.instruction, resp.status);
                    return Err(SessionError::Status(status));
                }
            };

            if attempt >= self.config.max_delay_retries {
                return Err(SessionError::RetriesExhausted { attempts: attempt });
            }
            attempt += 1;

            warn!(
                "security delay {}ms (attempt {}/{})",
                delay_ms, attempt, self.config.max_delay_retries
            );

            // No subscribers is fine
            let _ = self
                .events
                .send(SessionEvent::SecurityDelay { delay_ms, attempt });

            // Tag loss ends the wait early
            reader.pause(Duration::from_millis(delay_ms as u64)).await?;
        }
    }

    /// Execute a typed request and decode its response
    pub async fn request<R, T>(&self, req: &R) -> Result<T, SessionError>
    where
        R: ApduReq + Sync,
        T: for<'a> TryFrom<&'a TlvList, Error = DecodeError>,
    {
        let resp = self.execute(&req.command()).await?;
        let v = T::try_from(&resp.payload)?;
        Ok(v)
    }

    /// Read card and wallet information
    pub async fn read_card(&self) -> Result<ReadResp, SessionError> {
        let resp: ReadResp = self.request(&ReadReq::new(self.config.pin1_hash())).await?;

        debug!(
            "read card {} ({}, {}, firmware {})",
            hex::encode(resp.card_id),
            resp.status,
            resp.curve,
            resp.firmware
        );

        Ok(resp)
    }

    /// Sign a single batch of equal length hashes
    pub async fn sign_batch(
        &self,
        card_id: [u8; 8],
        hashes: Vec<Vec<u8>>,
        wallet_public_key: Option<Vec<u8>>,
    ) -> Result<SignResp, SessionError> {
        let req = self.sign_req(card_id, hashes, wallet_public_key)?;
        self.request(&req).await
    }

    /// Build a sign request with the configured PINs
    pub fn sign_req(
        &self,
        card_id: [u8; 8],
        hashes: Vec<Vec<u8>>,
        wallet_public_key: Option<Vec<u8>>,
    ) -> Result<SignReq, SessionError> {
        let req = SignReq::new(
            card_id,
            self.config.pin1_hash(),
            self.config.pin2_hash(),
            hashes,
        )?;

        Ok(match wallet_public_key {
            Some(k) => req.with_wallet(k),
            None => req,
        })
    }

    /// Ask the card to prove ownership of its wallet key
    pub async fn check_wallet(
        &self,
        card_id: [u8; 8],
        challenge: [u8; CHALLENGE_LEN],
    ) -> Result<CheckWalletResp, SessionError> {
        let req = CheckWalletReq {
            card_id,
            pin_hash: self.config.pin1_hash(),
            challenge,
        };

        self.request(&req).await
    }
}
