// offrecord error types

use thiserror::Error;

use crate::smp::SmpOutcome;

/// Top-level error type for the offrecord crate.
#[derive(Debug, Error)]
pub enum OtrError {
    // ── Group and proof errors ──────────────────────────────────────────
    #[error("group element outside [2, N-2]")]
    GroupMembershipViolation,

    #[error("proof exponent outside [1, q)")]
    ExponentOutOfRange,

    #[error("verification failed: {0}")]
    ZkProofFailed(&'static str),

    // ── State machine errors ────────────────────────────────────────────
    #[error("invalid AKE message: {message} in auth state {state}")]
    InvalidAkeMessage {
        message: &'static str,
        state: &'static str,
    },

    #[error("unexpected SMP message: {message} in state {state}")]
    UnexpectedMessage {
        message: &'static str,
        state: &'static str,
    },

    #[error("SMP run already in progress (state {0})")]
    SmpInProgress(&'static str),

    #[error("no SMP secret supplied for this run")]
    MissingSecret,

    #[error("no encrypted session established")]
    NotEncrypted,

    // ── Wire errors ─────────────────────────────────────────────────────
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("unknown message type: 0x{0:04x}")]
    UnknownMessageType(u16),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u16),

    // ── Key and configuration errors ────────────────────────────────────
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("invalid group parameters: {0}")]
    InvalidGroup(String),

    #[error("group configuration: {0}")]
    Config(#[from] serde_json::Error),

    // ── Delivery errors ─────────────────────────────────────────────────
    #[error("no delivery path for outbound message")]
    NoContinuation,

    #[error("transport error: {0}")]
    Transport(String),

    /// The SMP step completed but its reply never reached the peer.
    #[error("SMP reply not delivered: {delivery}")]
    SmpReplyUndelivered {
        outcome: Option<SmpOutcome>,
        delivery: Box<OtrError>,
    },

    #[error("{error}; abort not delivered: {delivery}")]
    SmpAbortUndelivered {
        error: Box<OtrError>,
        delivery: Box<OtrError>,
    },
}

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, OtrError>;
