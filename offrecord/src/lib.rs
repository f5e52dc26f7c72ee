// offrecord: OTR v2 authenticated key exchange and Socialist Millionaire Protocol
//
// Crate root: module declarations and public re-exports.

pub mod ake;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod group;
pub mod session;
pub mod smp;

// Re-export key types at crate root for convenience.
pub use ake::{AkeEngine, AkeMessage, AkeStep, AuthState, MsgState, SessionKeys};
pub use crypto::keys::IdentityKeyPair;
pub use error::{OtrError, Result};
pub use group::GroupParams;
pub use session::{Message, Session, Transport};
pub use smp::{SmpContext, SmpEngine, SmpFailure, SmpMessage, SmpOutcome, SmpState, SmpStep};
