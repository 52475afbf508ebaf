// Copyright (c) 2023 The Tapsign Authors

//! Tapsign card session and signing library
//!
//! Layers, from the wire up:
//!
//! - [transport::Transport]: raw frame exchange with an attached tag,
//!   implemented by platform readers (and the `tapsign-sim` emulator)
//! - [reader::ReaderSession]: tag lifecycle, timeouts and tag loss
//! - [session::CardSession]: serialised command execution, status mapping
//!   and security delay retries
//! - [gateway::SigningGateway]: batched all-or-nothing hash signing,
//!   consumed by `tapsign-core` wallet managers as a [Signer]

pub mod config;
pub use config::SessionConfig;

mod error;
pub use error::{SessionError, SigningError, TransportError};

pub mod gateway;
pub use gateway::SigningGateway;

pub mod reader;
pub use reader::{ReaderSession, SessionState, TagMonitor};

pub mod session;
pub use session::{CardSession, SessionEvent};

pub mod transport;
pub use transport::Transport;

/// Re-export `tapsign-apdu` for consumers
pub use tapsign_apdu::{self as apdu};

/// Re-export `tapsign-core` for consumers
pub use tapsign_core::{self as engine, KeyRef, Signer};
