// Copyright (c) 2023 The Tapsign Authors

//! Card session configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tapsign_apdu::sign::MAX_HASHES_PER_REQUEST;

/// Default PIN1 for factory cards
pub const DEFAULT_PIN1: &str = "000000";

/// Default PIN2 for factory cards
pub const DEFAULT_PIN2: &str = "000";

/// Session configuration, shared by the reader, session driver and gateway
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Initial timeout for a single exchange in milliseconds
    pub timeout_ms: u64,

    /// Upper bound for the adaptive exchange timeout in milliseconds
    pub max_timeout_ms: u64,

    /// Maximum number of security delay retries per command
    pub max_delay_retries: usize,

    /// Card access code
    pub pin1: String,

    /// Card signing code
    pub pin2: String,

    /// Maximum hashes per sign request
    pub max_hashes_per_batch: usize,

    /// Verify card signatures against the wallet key before returning them
    pub verify_signatures: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_timeout_ms: 30_000,
            max_delay_retries: 8,
            pin1: DEFAULT_PIN1.to_string(),
            pin2: DEFAULT_PIN2.to_string(),
            max_hashes_per_batch: MAX_HASHES_PER_REQUEST,
            verify_signatures: true,
        }
    }
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_millis(self.max_timeout_ms.max(self.timeout_ms))
    }

    /// Batch size clamped to what the card accepts
    pub fn batch_size(&self) -> usize {
        self.max_hashes_per_batch.clamp(1, MAX_HASHES_PER_REQUEST)
    }

    /// SHA-256 of PIN1 as sent to the card
    pub fn pin1_hash(&self) -> [u8; 32] {
        pin_hash(&self.pin1)
    }

    /// SHA-256 of PIN2 as sent to the card
    pub fn pin2_hash(&self) -> [u8; 32] {
        pin_hash(&self.pin2)
    }
}

/// Hash a PIN string the way cards store it
pub fn pin_hash(pin: &str) -> [u8; 32] {
    Sha256::digest(pin.as_bytes()).into()
}
