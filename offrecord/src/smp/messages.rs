// SMP messages, carried as TLVs inside encrypted data messages.
//
// Wire layout: SHORT tlv type || SHORT payload length || payload, where the
// payload of types 2-5 is an INT-counted sequence of MPIs.

use bytes::Bytes;
use num_bigint::BigUint;

use crate::encoding::{Decoder, Encoder};
use crate::error::{OtrError, Result};

/// SMP TLV types.
pub const TLV_SMP1: u16 = 2;
pub const TLV_SMP2: u16 = 3;
pub const TLV_SMP3: u16 = 4;
pub const TLV_SMP4: u16 = 5;
pub const TLV_SMP_ABORT: u16 = 6;

/// Proof of knowledge of `log_G(X)`: `(c, d)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeProof {
    pub c: BigUint,
    pub d: BigUint,
}

/// Proof that `P`, `Q` were built from the same `r4` and the secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentProof {
    pub c: BigUint,
    pub d5: BigUint,
    pub d6: BigUint,
}

/// Proof that `R` and `g3` share the exponent `a3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualityProof {
    pub c: BigUint,
    pub d: BigUint,
}

/// Type 2: initiator -> responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smp1 {
    pub g2a: BigUint,
    pub g2a_proof: KnowledgeProof,
    pub g3a: BigUint,
    pub g3a_proof: KnowledgeProof,
}

/// Type 3: responder -> initiator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smp2 {
    pub g2b: BigUint,
    pub g2b_proof: KnowledgeProof,
    pub g3b: BigUint,
    pub g3b_proof: KnowledgeProof,
    pub pb: BigUint,
    pub qb: BigUint,
    pub commitment_proof: CommitmentProof,
}

/// Type 4: initiator -> responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smp3 {
    pub pa: BigUint,
    pub qa: BigUint,
    pub commitment_proof: CommitmentProof,
    pub ra: BigUint,
    pub ra_proof: EqualityProof,
}

/// Type 5: responder -> initiator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smp4 {
    pub rb: BigUint,
    pub rb_proof: EqualityProof,
}

/// Any SMP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmpMessage {
    Message1(Smp1),
    Message2(Smp2),
    Message3(Smp3),
    Message4(Smp4),
    Abort,
}

impl SmpMessage {
    pub fn tlv_type(&self) -> u16 {
        match self {
            SmpMessage::Message1(_) => TLV_SMP1,
            SmpMessage::Message2(_) => TLV_SMP2,
            SmpMessage::Message3(_) => TLV_SMP3,
            SmpMessage::Message4(_) => TLV_SMP4,
            SmpMessage::Abort => TLV_SMP_ABORT,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SmpMessage::Message1(_) => "SMP1",
            SmpMessage::Message2(_) => "SMP2",
            SmpMessage::Message3(_) => "SMP3",
            SmpMessage::Message4(_) => "SMP4",
            SmpMessage::Abort => "SMP-Abort",
        }
    }

    /// The MPI fields in wire order.
    fn fields(&self) -> Vec<&BigUint> {
        match self {
            SmpMessage::Message1(m) => vec![
                &m.g2a,
                &m.g2a_proof.c,
                &m.g2a_proof.d,
                &m.g3a,
                &m.g3a_proof.c,
                &m.g3a_proof.d,
            ],
            SmpMessage::Message2(m) => vec![
                &m.g2b,
                &m.g2b_proof.c,
                &m.g2b_proof.d,
                &m.g3b,
                &m.g3b_proof.c,
                &m.g3b_proof.d,
                &m.pb,
                &m.qb,
                &m.commitment_proof.c,
                &m.commitment_proof.d5,
                &m.commitment_proof.d6,
            ],
            SmpMessage::Message3(m) => vec![
                &m.pa,
                &m.qa,
                &m.commitment_proof.c,
                &m.commitment_proof.d5,
                &m.commitment_proof.d6,
                &m.ra,
                &m.ra_proof.c,
                &m.ra_proof.d,
            ],
            SmpMessage::Message4(m) => vec![&m.rb, &m.rb_proof.c, &m.rb_proof.d],
            SmpMessage::Abort => Vec::new(),
        }
    }

    /// Encode as a TLV.
    pub fn encode(&self) -> Result<Bytes> {
        let payload = match self {
            SmpMessage::Abort => Vec::new(),
            _ => Encoder::new().write_mpi_sequence(&self.fields()).to_vec(),
        };
        let len = u16::try_from(payload.len()).map_err(|_| {
            OtrError::MalformedMessage(format!("SMP payload of {} bytes", payload.len()))
        })?;
        let mut enc = Encoder::new();
        enc.write_short(self.tlv_type())
            .write_short(len)
            .write_raw(&payload);
        Ok(enc.freeze())
    }

    /// Decode one TLV.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(data);
        let tlv_type = dec.read_short()?;
        let len = dec.read_short()?;
        let payload = dec.read_raw(usize::from(len))?;
        dec.finish()?;

        let mut dec = Decoder::new(payload);
        let message = match tlv_type {
            TLV_SMP1 => {
                let [g2a, c2, d2, g3a, c3, d3] = read_fields(&mut dec)?;
                SmpMessage::Message1(Smp1 {
                    g2a,
                    g2a_proof: KnowledgeProof { c: c2, d: d2 },
                    g3a,
                    g3a_proof: KnowledgeProof { c: c3, d: d3 },
                })
            }
            TLV_SMP2 => {
                let [g2b, c2, d2, g3b, c3, d3, pb, qb, cp, d5, d6] = read_fields(&mut dec)?;
                SmpMessage::Message2(Smp2 {
                    g2b,
                    g2b_proof: KnowledgeProof { c: c2, d: d2 },
                    g3b,
                    g3b_proof: KnowledgeProof { c: c3, d: d3 },
                    pb,
                    qb,
                    commitment_proof: CommitmentProof { c: cp, d5, d6 },
                })
            }
            TLV_SMP3 => {
                let [pa, qa, cp, d5, d6, ra, cr, d7] = read_fields(&mut dec)?;
                SmpMessage::Message3(Smp3 {
                    pa,
                    qa,
                    commitment_proof: CommitmentProof { c: cp, d5, d6 },
                    ra,
                    ra_proof: EqualityProof { c: cr, d: d7 },
                })
            }
            TLV_SMP4 => {
                let [rb, cr, d7] = read_fields(&mut dec)?;
                SmpMessage::Message4(Smp4 {
                    rb,
                    rb_proof: EqualityProof { c: cr, d: d7 },
                })
            }
            // The abort payload carries nothing.
            TLV_SMP_ABORT => return Ok(SmpMessage::Abort),
            other => return Err(OtrError::UnknownMessageType(other)),
        };
        dec.finish()?;
        Ok(message)
    }
}

fn read_fields<const N: usize>(dec: &mut Decoder<'_>) -> Result<[BigUint; N]> {
    let fields = dec.read_mpi_sequence(N)?;
    fields
        .try_into()
        .map_err(|_| OtrError::MalformedMessage(format!("expected {N} MPIs")))
}
