// AKE state machine.

use std::fmt;

use num_bigint::BigUint;

use crate::ake::messages::{DhCommit, RevealSignature};
use crate::crypto::ctr::CtrKey;
use crate::crypto::dh::DhKeyPair;
use crate::crypto::kdf::AkeKeys;

/// Whether application data may flow in the clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgState {
    Plaintext,
    Encrypted,
    Finished,
}

/// Which AKE message is valid next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    None,
    AwaitingDhKey,
    AwaitingRevealSig,
    AwaitingSig,
}

impl AuthState {
    pub fn label(self) -> &'static str {
        match self {
            AuthState::None => "None",
            AuthState::AwaitingDhKey => "AwaitingDhKey",
            AuthState::AwaitingRevealSig => "AwaitingRevealSig",
            AuthState::AwaitingSig => "AwaitingSig",
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for MsgState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MsgState::Plaintext => write!(f, "Plaintext"),
            MsgState::Encrypted => write!(f, "Encrypted"),
            MsgState::Finished => write!(f, "Finished"),
        }
    }
}

/// Handshake progress, carrying exactly what each auth state needs.
/// Dropping a variant wipes the secrets it holds.
pub(crate) enum Handshake {
    /// No handshake in progress.
    Idle,

    /// We sent D-H Commit and wait for D-H Key.
    AwaitingDhKey {
        our_dh: DhKeyPair,
        /// Commitment key `r`, revealed in Reveal Signature.
        r: CtrKey,
        /// Our commit message, kept for resends and the tie break.
        commit: DhCommit,
    },

    /// We answered a D-H Commit with D-H Key and wait for Reveal Signature.
    AwaitingRevealSig {
        our_dh: DhKeyPair,
        /// The peer's commitment to gx.
        their_commit: DhCommit,
    },

    /// We sent Reveal Signature and wait for Signature.
    AwaitingSig {
        our_dh: DhKeyPair,
        their_gy: BigUint,
        keys: AkeKeys,
        /// Resent verbatim if the same D-H Key arrives again.
        sent: RevealSignature,
    },
}

impl Handshake {
    pub(crate) fn auth_state(&self) -> AuthState {
        match self {
            Handshake::Idle => AuthState::None,
            Handshake::AwaitingDhKey { .. } => AuthState::AwaitingDhKey,
            Handshake::AwaitingRevealSig { .. } => AuthState::AwaitingRevealSig,
            Handshake::AwaitingSig { .. } => AuthState::AwaitingSig,
        }
    }
}
