//! Error taxonomy for the PPM bootloader engine.
//!
//! Mirrors the stable wire error codes of the original C library
//! (`ppm_err_t`) so a caller that cares about process exit codes can still
//! get them, while giving Rust call sites a real `std::error::Error`.

use thiserror::Error;

/// Failure of the frame-transport collaborator (spec.md §6).
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to set bitrate to {bps} bps")]
    SetBitrate { bps: u32 },
    #[error("failed to send enter-ppm pattern")]
    EnterPattern,
    #[error("failed to send calibration frame")]
    Calibration,
    #[error("failed to send frame")]
    Send,
    #[error("underlying I/O error")]
    Io(#[from] std::io::Error),
}

/// Failure of a single session invocation (spec.md §4.2 step 5: "details
/// lost" — the orchestrator is the one that knows which semantic error to
/// surface from this).
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("transport error while running session")]
    Transport(#[from] TransportError),
    #[error("page {seq} failed after {retries} attempt(s)")]
    PageRetriesExhausted { seq: u16, retries: u8 },
    #[error("no session acknowledge received")]
    NoSessionAck,
    #[error("session acknowledge failed verification")]
    SessionAckMismatch,
}

/// Top-level error/result code, stable-numbered to match spec.md §6.
#[derive(Error, Debug)]
pub enum PpmError {
    #[error("internal error")]
    Internal,
    #[error("failed to set baudrate")]
    SetBaud(#[source] TransportError),
    #[error("failed to enter ppm mode")]
    EnterPpm(#[source] TransportError),
    #[error("calibration frame failed")]
    Calibration(#[source] TransportError),
    #[error("unlock session failed")]
    Unlock(#[source] SessionError),
    #[error("chip (project id 0x{project_id:04x}) is not supported")]
    ChipNotSupported { project_id: u16 },
    #[error("requested action is not supported by this chip")]
    ActionNotSupported,
    #[error("invalid hex file")]
    InvHex,
    #[error("hex image has no data overlapping the target memory region")]
    MissingData,
    #[error("programming failed")]
    ProgrammingFailed(#[source] SessionError),
    #[error("verification failed")]
    VerifyFailed,
}

impl PpmError {
    /// The stable wire value from spec.md §6, usable as a process exit code.
    pub fn code(&self) -> i32 {
        match self {
            PpmError::Internal => -2,
            PpmError::SetBaud(_) => -16,
            PpmError::EnterPpm(_) => -17,
            PpmError::Calibration(_) => -18,
            PpmError::Unlock(_) => -19,
            PpmError::ChipNotSupported { .. } => -20,
            PpmError::ActionNotSupported => -21,
            PpmError::InvHex => -22,
            PpmError::MissingData => -23,
            PpmError::ProgrammingFailed(_) => -24,
            PpmError::VerifyFailed => -25,
        }
    }
}

pub type Result<T> = core::result::Result<T, PpmError>;
