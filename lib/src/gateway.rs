// Copyright (c) 2023 The Tapsign Authors

//! Signing gateway, signs hash sets for wallet managers using the card
//!
//! Hashes are split into batches bounded by the configured batch size and
//! the reader frame length, then signed one batch after another. A failure
//! in any batch fails the whole call and discards signatures from earlier
//! batches, so a transaction is never assembled from a partial set.

use std::ops::Range;

use async_trait::async_trait;
use encdec::Encode;
use log::{debug, warn};
use sha2::{Digest, Sha256};

use tapsign_apdu::{
    check_wallet::CHALLENGE_LEN,
    prelude::{ApduReq, ReadResp, SIGNATURE_LEN},
};
use tapsign_core::{Curve, KeyRef, Signer};

use crate::{session::CardSession, SessionError, SigningError};

/// Card backed [Signer]
#[derive(Clone)]
pub struct SigningGateway {
    session: CardSession,
    card_id: [u8; 8],
    key: KeyRef,
}

impl SigningGateway {
    /// Read the attached card and create a gateway for its wallet
    pub async fn connect(session: CardSession) -> Result<Self, SigningError> {
        let card = session.read_card().await?;
        Self::from_card(session, &card)
    }

    /// Create a gateway from a previous card read
    pub fn from_card(session: CardSession, card: &ReadResp) -> Result<Self, SigningError> {
        let public_key = card
            .wallet_public_key
            .as_ref()
            .ok_or(SigningError::NoWallet)?;

        Ok(Self {
            session,
            card_id: card.card_id,
            key: KeyRef::new(card.curve, public_key),
        })
    }

    /// Wallet key held by the card
    pub fn wallet_key(&self) -> &KeyRef {
        &self.key
    }

    pub fn card_id(&self) -> [u8; 8] {
        self.card_id
    }

    pub fn session(&self) -> &CardSession {
        &self.session
    }

    /// Challenge the card to prove it holds the wallet key
    pub async fn check_wallet(&self) -> Result<(), SigningError> {
        let challenge: [u8; CHALLENGE_LEN] = rand::random();

        let resp = self.session.check_wallet(self.card_id, challenge).await?;
        if resp.card_id != self.card_id {
            return Err(SigningError::CardMismatch);
        }

        let digest = Sha256::new()
            .chain_update(challenge)
            .chain_update(&resp.salt)
            .finalize();

        match self.verify(&digest, &resp.signature) {
            true => Ok(()),
            false => Err(SigningError::InvalidSignature(0)),
        }
    }

    /// Sign hashes with the card wallet key, returning raw 64-byte
    /// signatures in input order
    pub async fn sign_hashes(
        &self,
        hashes: &[Vec<u8>],
        key: &KeyRef,
    ) -> Result<Vec<Vec<u8>>, SigningError> {
        self.check_key(key)?;

        if hashes.is_empty() {
            return Ok(Vec::new());
        }

        let batches = self.batches(hashes).await?;
        let verify = self.session.config().verify_signatures;

        debug!(
            "signing {} hashes in {} batches",
            hashes.len(),
            batches.len()
        );

        let mut signatures = Vec::with_capacity(hashes.len());

        for range in batches {
            let batch = &hashes[range.clone()];

            let resp = match self
                .session
                .sign_batch(self.card_id, batch.to_vec(), Some(self.key.public_key.clone()))
                .await
            {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        "batch {:?} failed, discarding {} signatures: {}",
                        range,
                        signatures.len(),
                        e
                    );
                    return Err(e.into());
                }
            };

            if resp.card_id != self.card_id {
                return Err(SigningError::CardMismatch);
            }

            if resp.signatures.len() != batch.len() {
                return Err(SigningError::CountMismatch {
                    expected: batch.len(),
                    actual: resp.signatures.len(),
                });
            }

            for (i, (h, s)) in batch.iter().zip(&resp.signatures).enumerate() {
                if verify && !self.verify(h, s) {
                    return Err(SigningError::InvalidSignature(range.start + i));
                }
                signatures.push(s.to_vec());
            }

            if let Some(n) = resp.remaining_signatures {
                debug!("remaining signatures: {}", n);
            }
        }

        Ok(signatures)
    }

    fn check_key(&self, key: &KeyRef) -> Result<(), SigningError> {
        if key.curve != self.key.curve {
            return Err(SigningError::CurveMismatch {
                card: self.key.curve,
                requested: key.curve,
            });
        }

        if key.public_key != self.key.public_key {
            return Err(SigningError::KeyMismatch);
        }

        Ok(())
    }

    /// Split hashes into batches that fit both the batch size and the frame length
    async fn batches(&self, hashes: &[Vec<u8>]) -> Result<Vec<Range<usize>>, SessionError> {
        let max_frame_len = self.session.max_frame_len().await;
        let batch_size = self.session.config().batch_size();

        let mut batches = Vec::new();
        let mut start = 0;

        while start < hashes.len() {
            let mut n = batch_size.min(hashes.len() - start);

            // A single oversize hash is left to fail on encode
            while n > 1 && self.frame_len(&hashes[start..start + n])? > max_frame_len {
                n -= 1;
            }

            batches.push(start..start + n);
            start += n;
        }

        Ok(batches)
    }

    fn frame_len(&self, hashes: &[Vec<u8>]) -> Result<usize, SessionError> {
        let req = self.session.sign_req(
            self.card_id,
            hashes.to_vec(),
            Some(self.key.public_key.clone()),
        )?;

        Ok(req.command().encode_len()?)
    }

    /// Verify a raw card signature over a hash with the wallet key
    fn verify(&self, hash: &[u8], signature: &[u8; SIGNATURE_LEN]) -> bool {
        match self.key.curve {
            Curve::Secp256k1 => {
                use k256::ecdsa::{signature::hazmat::PrehashVerifier, Signature, VerifyingKey};

                let (key, sig) = match (
                    VerifyingKey::from_sec1_bytes(&self.key.public_key),
                    Signature::from_slice(signature),
                ) {
                    (Ok(k), Ok(s)) => (k, s),
                    _ => return false,
                };

                // Cards may return high-s signatures
                let sig = sig.normalize_s().unwrap_or(sig);
                key.verify_prehash(hash, &sig).is_ok()
            }
            Curve::Ed25519 => {
                use ed25519_dalek::{Signature, Verifier, VerifyingKey};

                let key = <[u8; 32]>::try_from(self.key.public_key.as_slice())
                    .ok()
                    .and_then(|k| VerifyingKey::from_bytes(&k).ok());

                match key {
                    Some(k) => k.verify(hash, &Signature::from_bytes(signature)).is_ok(),
                    None => false,
                }
            }
        }
    }
}

#[async_trait]
impl Signer for SigningGateway {
    type Error = SigningError;

    async fn sign(&self, hashes: &[Vec<u8>], key: &KeyRef) -> Result<Vec<Vec<u8>>, Self::Error> {
        self.sign_hashes(hashes, key).await
    }
}
