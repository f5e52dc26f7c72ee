// AKE messages exchanged during the OTR v2 handshake.
//
//   Committer (B)                      Responder (A)
//     |--- D-H Commit  {AES_r(gx), H(gx)} -->|
//     |<-- D-H Key     {gy} -----------------|
//     |--- Reveal Sig  {r, AES_c(X_B), MAC} ->|
//     |<-- Signature   {AES_c'(X_A), MAC} ---|
//
// Wire layout: SHORT protocol version || BYTE message type || fields.

use bytes::Bytes;
use num_bigint::BigUint;

use crate::crypto::ctr::CTR_KEY_LEN;
use crate::crypto::hash::MAC160_LEN;
use crate::encoding::{Decoder, Encoder};
use crate::error::{OtrError, Result};

/// The only protocol version spoken here.
pub const PROTOCOL_VERSION: u16 = 0x0002;

/// AKE message type bytes.
pub const TYPE_DH_COMMIT: u8 = 0x02;
pub const TYPE_DH_KEY: u8 = 0x0a;
pub const TYPE_REVEAL_SIGNATURE: u8 = 0x11;
pub const TYPE_SIGNATURE: u8 = 0x12;

/// Message 1: committer -> responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhCommit {
    /// `AES-CTR_r(MPI(gx))`.
    pub gx_encrypted: Vec<u8>,
    /// `SHA-256(MPI(gx))`.
    pub gx_hashed: [u8; 32],
}

/// Message 2: responder -> committer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhKey {
    pub gy: BigUint,
}

/// Message 3: committer -> responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealSignature {
    /// The commitment key, revealed now that gx is bound by its hash.
    pub key: [u8; CTR_KEY_LEN],
    /// `AES-CTR_c(X_B)`.
    pub encrypted_signature: Vec<u8>,
    /// `HMAC-SHA256-160_m2(DATA(encrypted_signature))`.
    pub mac: [u8; MAC160_LEN],
}

/// Message 4: responder -> committer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// `AES-CTR_c'(X_A)`.
    pub encrypted_signature: Vec<u8>,
    /// `HMAC-SHA256-160_m2'(DATA(encrypted_signature))`.
    pub mac: [u8; MAC160_LEN],
}

/// Any AKE message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AkeMessage {
    DhCommit(DhCommit),
    DhKey(DhKey),
    RevealSignature(RevealSignature),
    Signature(Signature),
}

impl AkeMessage {
    /// Wire type byte.
    pub fn message_type(&self) -> u8 {
        match self {
            AkeMessage::DhCommit(_) => TYPE_DH_COMMIT,
            AkeMessage::DhKey(_) => TYPE_DH_KEY,
            AkeMessage::RevealSignature(_) => TYPE_REVEAL_SIGNATURE,
            AkeMessage::Signature(_) => TYPE_SIGNATURE,
        }
    }

    /// Human-readable name (used in errors and logs).
    pub fn name(&self) -> &'static str {
        match self {
            AkeMessage::DhCommit(_) => "DH-Commit",
            AkeMessage::DhKey(_) => "DH-Key",
            AkeMessage::RevealSignature(_) => "Reveal-Signature",
            AkeMessage::Signature(_) => "Signature",
        }
    }

    /// Encode to the binary wire form.
    pub fn encode(&self) -> Bytes {
        let mut enc = Encoder::new();
        enc.write_short(PROTOCOL_VERSION)
            .write_byte(self.message_type());
        match self {
            AkeMessage::DhCommit(m) => {
                enc.write_data(&m.gx_encrypted).write_data(&m.gx_hashed);
            }
            AkeMessage::DhKey(m) => {
                enc.write_mpi(&m.gy);
            }
            AkeMessage::RevealSignature(m) => {
                enc.write_data(&m.key)
                    .write_data(&m.encrypted_signature)
                    .write_raw(&m.mac);
            }
            AkeMessage::Signature(m) => {
                enc.write_data(&m.encrypted_signature).write_raw(&m.mac);
            }
        }
        enc.freeze()
    }

    /// Decode from the binary wire form.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(data);
        let version = dec.read_short()?;
        if version != PROTOCOL_VERSION {
            return Err(OtrError::UnsupportedVersion(version));
        }
        let message = match dec.read_byte()? {
            TYPE_DH_COMMIT => AkeMessage::DhCommit(DhCommit {
                gx_encrypted: dec.read_data()?.to_vec(),
                gx_hashed: dec.read_data_array()?,
            }),
            TYPE_DH_KEY => AkeMessage::DhKey(DhKey {
                gy: dec.read_mpi()?,
            }),
            TYPE_REVEAL_SIGNATURE => AkeMessage::RevealSignature(RevealSignature {
                key: dec.read_data_array()?,
                encrypted_signature: dec.read_data()?.to_vec(),
                mac: dec.read_array()?,
            }),
            TYPE_SIGNATURE => AkeMessage::Signature(Signature {
                encrypted_signature: dec.read_data()?.to_vec(),
                mac: dec.read_array()?,
            }),
            other => return Err(OtrError::UnknownMessageType(u16::from(other))),
        };
        dec.finish()?;
        Ok(message)
    }
}
