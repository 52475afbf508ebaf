// Copyright (c) 2023 The Tapsign Authors

//! Reader session, owns the transport for one physical tap
//!
//! ```text
//! Idle --attach--> Attached --transceive--> Exchanging --> Attached
//!                     |                          |
//!                     +------- tag lost ---------+----> Detached
//! ```
//!
//! Tag loss is reported by the platform through a [TagMonitor], which
//! fails any in-flight exchange with [TransportError::Lost] rather than
//! leaving it to time out.

use std::{sync::Arc, time::Duration};

use log::{debug, trace, warn};
use strum::Display;
use tokio::sync::watch;

use tapsign_apdu::DEFAULT_MAX_FRAME_LEN;

use crate::{transport::Transport, SessionConfig, TransportError};

/// Reader session state
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display)]
pub enum SessionState {
    /// No tag present
    Idle,
    /// Tag present, no exchange in flight
    Attached,
    /// Exchange in flight
    Exchanging,
    /// Tag lost, waiting for [ReaderSession::ignore_tag] or a new tag
    Detached,
}

/// Handle used by the platform to report tag presence
#[derive(Clone, Debug)]
pub struct TagMonitor {
    present: Arc<watch::Sender<bool>>,
}

impl TagMonitor {
    fn new() -> Self {
        let (present, _) = watch::channel(true);
        Self {
            present: Arc::new(present),
        }
    }

    /// Report the tag left the field
    pub fn lost(&self) {
        debug!("tag lost");
        self.present.send_replace(false);
    }

    /// Check whether the tag is still present
    pub fn is_present(&self) -> bool {
        *self.present.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.present.subscribe()
    }
}

/// Exchange outcome counters
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct ReaderStats {
    pub successes: u64,
    pub failures: u64,
    /// Failures since the last success
    pub consecutive_failures: u32,
}

/// Reader session for a single reader
pub struct ReaderSession {
    enabled: bool,
    state: SessionState,
    transport: Option<Box<dyn Transport>>,
    tag: Option<TagMonitor>,
    base_timeout: Duration,
    max_timeout: Duration,
    timeout: Duration,
    stats: ReaderStats,
}

impl ReaderSession {
    /// Create a disabled reader session
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            enabled: false,
            state: SessionState::Idle,
            transport: None,
            tag: None,
            base_timeout: config.timeout(),
            max_timeout: config.max_timeout(),
            timeout: config.timeout(),
            stats: ReaderStats::default(),
        }
    }

    /// Enable the reader, a no-op when already enabled
    pub fn enable(&mut self) {
        if !self.enabled {
            debug!("reader enabled");
            self.enabled = true;
        }
    }

    /// Disable the reader, releasing any attached tag. A no-op when
    /// already disabled
    pub fn disable(&mut self) {
        if self.enabled {
            debug!("reader disabled");
            self.enabled = false;
            self.ignore_tag();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Timeout applied to the next exchange
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Maximum command frame length for the attached transport
    pub fn max_frame_len(&self) -> usize {
        self.transport
            .as_ref()
            .map(|t| t.max_frame_len())
            .unwrap_or(DEFAULT_MAX_FRAME_LEN)
    }

    /// Attach a newly discovered tag, replacing any previous one
    pub fn attach(&mut self, transport: impl Transport + 'static) -> Result<TagMonitor, TransportError> {
        if !self.enabled {
            return Err(TransportError::Disabled);
        }

        if self.state == SessionState::Exchanging {
            warn!("attach while exchanging, previous tag dropped");
        }

        let tag = TagMonitor::new();

        self.transport = Some(Box::new(transport));
        self.tag = Some(tag.clone());
        self.state = SessionState::Attached;

        debug!("tag attached (mtu: {})", self.max_frame_len());

        Ok(tag)
    }

    /// Release the transport so the platform can present the tag again.
    /// Safe to call repeatedly
    pub fn ignore_tag(&mut self) {
        if self.transport.is_none() && self.state == SessionState::Idle {
            return;
        }

        debug!("ignoring tag (state: {})", self.state);

        self.transport = None;
        self.tag = None;
        self.state = SessionState::Idle;
    }

    /// Exchange a frame with the attached tag
    ///
    /// Fails with [TransportError::Timeout] after the current timeout,
    /// leaving the session attached, or with [TransportError::Lost] as
    /// soon as the tag is reported lost.
    pub async fn transceive(&mut self, req: &[u8]) -> Result<Vec<u8>, TransportError> {
        if !self.enabled {
            return Err(TransportError::Disabled);
        }

        let (transport, tag) = match (&self.transport, &self.tag, self.state) {
            (_, _, SessionState::Detached) => return Err(TransportError::Lost),
            (Some(t), Some(m), _) => (t, m.clone()),
            _ => return Err(TransportError::NotConnected),
        };

        if !tag.is_present() {
            self.state = SessionState::Detached;
            return Err(TransportError::Lost);
        }

        trace!("tx: {}", hex::encode(req));

        self.state = SessionState::Exchanging;

        let timeout = self.timeout;
        let r = tokio::select! {
            r = tokio::time::timeout(timeout, transport.transceive(req)) => {
                r.map_err(TransportError::from).and_then(|r| r)
            }
            _ = wait_lost(tag.subscribe()) => Err(TransportError::Lost),
        };

        self.state = match &r {
            Err(TransportError::Lost) => SessionState::Detached,
            _ => SessionState::Attached,
        };

        match &r {
            Ok(resp) => trace!("rx: {}", hex::encode(resp)),
            Err(e) => debug!("exchange failed: {}", e),
        }

        r
    }

    /// Wait out a card requested delay with the tag held
    ///
    /// Fails with [TransportError::Lost] as soon as the tag is reported
    /// lost, the session is then detached.
    pub async fn pause(&mut self, delay: Duration) -> Result<(), TransportError> {
        let tag = match (&self.tag, self.state) {
            (_, SessionState::Detached) => return Err(TransportError::Lost),
            (Some(m), _) => m.clone(),
            _ => return Err(TransportError::NotConnected),
        };

        let r = tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = wait_lost(tag.subscribe()) => Err(TransportError::Lost),
        };

        if r.is_err() {
            debug!("tag lost during {:?} pause", delay);
            self.state = SessionState::Detached;
        }

        r
    }

    /// Record an exchange outcome
    ///
    /// Consecutive failures double the exchange timeout up to the
    /// configured maximum, a success restores the initial timeout.
    pub fn notify_result(&mut self, success: bool) {
        match success {
            true => {
                self.stats.successes += 1;
                self.stats.consecutive_failures = 0;
                self.timeout = self.base_timeout;
            }
            false => {
                self.stats.failures += 1;
                self.stats.consecutive_failures += 1;
                self.timeout = self.timeout.saturating_mul(2).min(self.max_timeout);
            }
        }

        trace!("exchange result: {} (next timeout: {:?})", success, self.timeout);
    }
}

/// Resolves once the tag is reported lost
async fn wait_lost(mut present: watch::Receiver<bool>) {
    loop {
        if !*present.borrow_and_update() {
            return;
        }

        if present.changed().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}
