//! Per-subsystem error types and the aggregating host-facing error (§7, §10.1).
//!
//! Each subsystem gets its own narrow `thiserror` enum, following the same
//! shape as `RecordingStateError`/`ListeningError`: `Debug + Clone +
//! PartialEq`, one `#[error("...")]` per variant. `VoiceFrontEndError`
//! aggregates them with `#[from]` for the Control Surface's public `Result`.

use thiserror::Error;

/// Errors surfaced by `set_aec_params` / `set_interrupt_params` (configuration
/// errors, §7 — caller passed something out of range).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AecError {
    /// `gain_shift` outside [`crate::config::GAIN_SHIFT_MIN`, `GAIN_SHIFT_MAX`].
    #[error("gain_shift {0} outside the saturating-safe range {}..={}", crate::config::GAIN_SHIFT_MIN, crate::config::GAIN_SHIFT_MAX)]
    InvalidGainShift(u8),
    /// `delay_ms` would produce a delay longer than the reference ring's capacity.
    #[error("delay_ms {delay_ms} exceeds the reference ring's capacity ({capacity_ms} ms)")]
    DelayExceedsCapacity { delay_ms: u32, capacity_ms: u32 },
}

/// Errors from the capture/recording/playback channel traits (§6, §10.4).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The underlying hardware channel could not be opened.
    #[error("failed to open channel: {0}")]
    OpenFailed(String),
    /// A blocking read or write failed.
    #[error("channel I/O error: {0}")]
    Io(String),
    /// The channel was closed while a call was in flight.
    #[error("channel closed")]
    Closed,
}

/// Errors from the acoustic front-end black box (§1).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrontEndError {
    #[error("front-end failed to accept a frame: {0}")]
    FeedFailed(String),
    #[error("front-end fetch failed: {0}")]
    FetchFailed(String),
}

/// Errors from the command-recognition model black box (§1, §7 "model errors").
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("command model is not loaded")]
    NotLoaded,
    #[error("command model fetch failed: {0}")]
    FetchFailed(String),
}

/// Errors surfaced by the Control Surface (§4.F, §7).
#[derive(Debug, Error)]
pub enum VoiceFrontEndError {
    /// `init` was called while partially or fully initialized through a path
    /// other than the idempotent no-op (should not normally be reachable).
    #[error("already initialized")]
    AlreadyInitialized,
    /// A resource-acquisition step during `init` failed; any partial state
    /// has already been torn down.
    #[error("initialization failed: {0}")]
    InitFailed(String),
    /// An operation that requires `init` to have completed was called first.
    #[error("voice front-end is not initialized")]
    NotInitialized,
    #[error(transparent)]
    Aec(#[from] AecError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    FrontEnd(#[from] FrontEndError),
    #[error(transparent)]
    Model(#[from] ModelError),
    /// Requested a command id outside the vocabulary.
    #[error("unknown command id {0}")]
    UnknownCommandId(u32),
}

pub type Result<T> = std::result::Result<T, VoiceFrontEndError>;
