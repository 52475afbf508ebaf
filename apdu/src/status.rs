// Copyright (c) 2023 The Tapsign Authors

//! Card status words

use strum::Display;

/// Raw status word values returned by the card
pub mod sw {
    pub const PROCESS_COMPLETED: u16 = 0x9000;
    pub const PIN1_CHANGED: u16 = 0x9001;
    pub const PIN2_CHANGED: u16 = 0x9002;
    pub const PINS_CHANGED: u16 = 0x9003;
    pub const PIN3_CHANGED: u16 = 0x9004;
    pub const NEED_PAUSE: u16 = 0x9789;
    pub const INVALID_PARAMS: u16 = 0x6A86;
    pub const ERROR_PROCESSING_COMMAND: u16 = 0x6286;
    pub const INVALID_STATE: u16 = 0x6985;
    pub const INS_NOT_SUPPORTED: u16 = 0x6D00;
    pub const NEED_ENCRYPTION: u16 = 0x6982;
    pub const BUSY: u16 = 0x6400;
}

/// Protocol-level outcome derived from a status word
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display)]
pub enum StatusCode {
    /// Command completed
    ProcessCompleted,
    /// Command completed, PIN1 changed
    Pin1Changed,
    /// Command completed, PIN2 changed
    Pin2Changed,
    /// Command completed, both PINs changed
    PinsChanged,
    /// Command completed, PIN3 changed
    Pin3Changed,
    /// Security delay in progress, resend the command
    NeedPause,
    /// Invalid parameters, usually a wrong PIN
    InvalidParams,
    /// Card failed to process the command
    ErrorProcessingCommand,
    /// Command not permitted in the current card state
    InvalidState,
    /// Instruction not supported
    InsNotSupported,
    /// Command requires an encrypted session
    NeedEncryption,
    /// Card busy with another operation
    Busy,
    /// Status word with no table entry
    Unknown(u16),
}

impl StatusCode {
    /// Check whether this status indicates a completed command
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::ProcessCompleted
                | Self::Pin1Changed
                | Self::Pin2Changed
                | Self::PinsChanged
                | Self::Pin3Changed
        )
    }

    /// Raw status word for this code
    pub fn word(&self) -> u16 {
        match self {
            Self::ProcessCompleted => sw::PROCESS_COMPLETED,
            Self::Pin1Changed => sw::PIN1_CHANGED,
            Self::Pin2Changed => sw::PIN2_CHANGED,
            Self::PinsChanged => sw::PINS_CHANGED,
            Self::Pin3Changed => sw::PIN3_CHANGED,
            Self::NeedPause => sw::NEED_PAUSE,
            Self::InvalidParams => sw::INVALID_PARAMS,
            Self::ErrorProcessingCommand => sw::ERROR_PROCESSING_COMMAND,
            Self::InvalidState => sw::INVALID_STATE,
            Self::InsNotSupported => sw::INS_NOT_SUPPORTED,
            Self::NeedEncryption => sw::NEED_ENCRYPTION,
            Self::Busy => sw::BUSY,
            Self::Unknown(v) => *v,
        }
    }
}

impl From<u16> for StatusCode {
    fn from(v: u16) -> Self {
        match v {
            sw::PROCESS_COMPLETED => Self::ProcessCompleted,
            sw::PIN1_CHANGED => Self::Pin1Changed,
            sw::PIN2_CHANGED => Self::Pin2Changed,
            sw::PINS_CHANGED => Self::PinsChanged,
            sw::PIN3_CHANGED => Self::Pin3Changed,
            sw::NEED_PAUSE => Self::NeedPause,
            sw::INVALID_PARAMS => Self::InvalidParams,
            sw::ERROR_PROCESSING_COMMAND => Self::ErrorProcessingCommand,
            sw::INVALID_STATE => Self::InvalidState,
            sw::INS_NOT_SUPPORTED => Self::InsNotSupported,
            sw::NEED_ENCRYPTION => Self::NeedEncryption,
            sw::BUSY => Self::Busy,
            _ => Self::Unknown(v),
        }
    }
}

impl From<StatusCode> for u16 {
    fn from(s: StatusCode) -> Self {
        s.word()
    }
}
