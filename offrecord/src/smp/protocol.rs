// Socialist Millionaire Protocol engine.
//
//   Initiator (a)                         Responder (b)
//     |--- type 2 {g2a, g3a, proofs 1,2} ---->|  Expect2
//     |<-- type 3 {g2b, g3b, Pb, Qb, 3,4,5} --|  Expect3
//     |--- type 4 {Pa, Qa, Ra, proofs 6,7} -->|  Expect4
//     |<-- type 5 {Rb, proof 8} --------------|  (responder: done)
//     |  (initiator: done)                    |
//
// Secrets match iff Rab == Pa / Pb.

use std::mem;
use std::sync::Arc;

use num_bigint::BigUint;
use thiserror::Error;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::crypto::hash::sha256;
use crate::crypto::kdf::Ssid;
use crate::crypto::keys::Fingerprint;
use crate::error::{OtrError, Result};
use crate::group::GroupParams;
use crate::smp::messages::{Smp1, Smp2, Smp3, Smp4, SmpMessage};
use crate::smp::proof::{
    prove_commitment, prove_equality, prove_knowledge, verify_commitment, verify_equality,
    verify_knowledge,
};
use crate::smp::state::{Progress, Secret, SmpState};

/// Version byte prefixed to the secret hash.
const SMP_VERSION: u8 = 0x01;

/// Values both sides bind the secret to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmpContext {
    pub our_fingerprint: Fingerprint,
    pub their_fingerprint: Fingerprint,
    pub ssid: Ssid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Initiator,
    Responder,
}

impl SmpContext {
    /// `x = SHA-256(0x01 || initiator_fp || responder_fp || ssid || secret)`.
    fn derive_secret(&self, role: Role, user_secret: &[u8]) -> Secret {
        let (initiator, responder) = match role {
            Role::Initiator => (&self.our_fingerprint, &self.their_fingerprint),
            Role::Responder => (&self.their_fingerprint, &self.our_fingerprint),
        };
        let mut input = Zeroizing::new(Vec::with_capacity(1 + 32 + 32 + 8 + user_secret.len()));
        input.push(SMP_VERSION);
        input.extend_from_slice(initiator);
        input.extend_from_slice(responder);
        input.extend_from_slice(&self.ssid);
        input.extend_from_slice(user_secret);
        let digest = Zeroizing::new(sha256(&input));
        Secret::new(BigUint::from_bytes_be(&digest[..]))
    }
}

/// How a finished run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmpOutcome {
    SecretsMatch,
    SecretsDiffer,
    /// The peer sent an abort.
    Aborted,
}

/// Result of processing one SMP message.
#[derive(Debug)]
pub struct SmpStep {
    pub outbound: Option<SmpMessage>,
    pub state: SmpState,
    /// Set when the run ended with this message.
    pub outcome: Option<SmpOutcome>,
}

/// A failed SMP step. The run has been reset; `outbound` is the abort
/// message to deliver to the peer.
#[derive(Debug, Error)]
#[error("SMP run aborted: {error}")]
pub struct SmpFailure {
    #[source]
    pub error: OtrError,
    pub outbound: Option<SmpMessage>,
}

/// Failures that happen before any run state is touched carry no abort.
impl From<OtrError> for SmpFailure {
    fn from(error: OtrError) -> Self {
        SmpFailure {
            error,
            outbound: None,
        }
    }
}

/// One side of SMP, bound to an encrypted session.
pub struct SmpEngine {
    group: Arc<GroupParams>,
    context: SmpContext,
    progress: Progress,
    secret: Option<Secret>,
}

impl SmpEngine {
    pub fn new(group: Arc<GroupParams>, context: SmpContext) -> Self {
        Self {
            group,
            context,
            progress: Progress::Idle,
            secret: None,
        }
    }

    pub fn state(&self) -> SmpState {
        self.progress.state()
    }

    pub fn context(&self) -> &SmpContext {
        &self.context
    }

    /// Whether any secret exponent or user secret is currently held.
    pub fn has_secret_material(&self) -> bool {
        self.secret.is_some() || !matches!(self.progress, Progress::Idle)
    }

    /// Supply the responder's secret ahead of the peer's type 2 message.
    pub fn set_secret(&mut self, user_secret: &[u8]) {
        self.secret = Some(self.context.derive_secret(Role::Responder, user_secret));
        debug!("SMP responder secret set");
    }

    /// Start a run as initiator, emitting type 2.
    ///
    /// A run already in progress is aborted and the call fails with
    /// `SmpInProgress`; the failure carries the abort for the peer.
    pub fn initiate(&mut self, user_secret: &[u8]) -> std::result::Result<SmpMessage, SmpFailure> {
        let state = self.state();
        if state != SmpState::Expect1 {
            return Err(self.fail(OtrError::SmpInProgress(state.label())));
        }

        let group = Arc::clone(&self.group);
        let x = self.context.derive_secret(Role::Initiator, user_secret);
        let a2 = Secret::random(&group);
        let a3 = Secret::random(&group);
        let msg = Smp1 {
            g2a: group.pow_g(a2.get()),
            g2a_proof: prove_knowledge(&group, 1, &a2),
            g3a: group.pow_g(a3.get()),
            g3a_proof: prove_knowledge(&group, 2, &a3),
        };

        self.secret = Some(x);
        self.progress = Progress::Expect2 { a2, a3 };
        debug!("SMP initiated, sending type 2");
        Ok(SmpMessage::Message1(msg))
    }

    /// Process one inbound SMP message.
    pub fn receive(&mut self, message: SmpMessage) -> std::result::Result<SmpStep, SmpFailure> {
        let state = self.state();
        debug!(message = message.name(), state = %state, "SMP message received");

        let result = match (mem::replace(&mut self.progress, Progress::Idle), message) {
            (_, SmpMessage::Abort) => {
                self.reset();
                debug!("SMP aborted by peer");
                Ok(SmpStep {
                    outbound: None,
                    state: SmpState::Expect1,
                    outcome: Some(SmpOutcome::Aborted),
                })
            }
            (Progress::Idle, SmpMessage::Message1(m)) => self.handle_message1(m),
            (Progress::Expect2 { a2, a3 }, SmpMessage::Message2(m)) => {
                self.handle_message2(a2, a3, m)
            }
            (
                Progress::Expect3 {
                    g3o,
                    g2,
                    g3,
                    b3,
                    p,
                    q,
                },
                SmpMessage::Message3(m),
            ) => self.handle_message3(g3o, g2, g3, b3, p, q, m),
            (
                Progress::Expect4 {
                    g3o,
                    a3,
                    qoq,
                    pop,
                },
                SmpMessage::Message4(m),
            ) => self.handle_message4(g3o, a3, qoq, pop, m),
            (_, other) => Err(OtrError::UnexpectedMessage {
                message: other.name(),
                state: state.label(),
            }),
        };
        result.map_err(|e| self.fail(e))
    }

    /// Reset the run and return the abort message for the peer.
    pub fn abort(&mut self) -> SmpMessage {
        if self.has_secret_material() {
            debug!(state = %self.state(), "SMP aborted locally");
        }
        self.reset();
        SmpMessage::Abort
    }

    // Responder, Expect1.
    fn handle_message1(&mut self, m: Smp1) -> Result<SmpStep> {
        let group = Arc::clone(&self.group);
        let x = self.secret.take().ok_or(OtrError::MissingSecret)?;

        group.check_element(&m.g2a)?;
        group.check_element(&m.g3a)?;
        verify_knowledge(&group, 1, &m.g2a, &m.g2a_proof)?;
        verify_knowledge(&group, 2, &m.g3a, &m.g3a_proof)?;

        let b2 = Secret::random(&group);
        let b3 = Secret::random(&group);
        let g2 = group.pow(&m.g2a, b2.get());
        let g3 = group.pow(&m.g3a, b3.get());

        let r4 = Secret::random(&group);
        let pb = group.pow(&g3, r4.get());
        let qb = group.mul(&group.pow_g(r4.get()), &group.pow(&g2, x.get()));

        let reply = Smp2 {
            g2b: group.pow_g(b2.get()),
            g2b_proof: prove_knowledge(&group, 3, &b2),
            g3b: group.pow_g(b3.get()),
            g3b_proof: prove_knowledge(&group, 4, &b3),
            pb: pb.clone(),
            qb: qb.clone(),
            commitment_proof: prove_commitment(&group, 5, &g2, &g3, &r4, &x),
        };

        self.progress = Progress::Expect3 {
            g3o: m.g3a,
            g2,
            g3,
            b3,
            p: pb,
            q: qb,
        };
        debug!("SMP type 2 verified, sending type 3");
        Ok(self.step(Some(SmpMessage::Message2(reply)), None))
    }

    // Initiator, Expect2.
    fn handle_message2(&mut self, a2: Secret, a3: Secret, m: Smp2) -> Result<SmpStep> {
        let group = Arc::clone(&self.group);

        for element in [&m.g2b, &m.g3b, &m.pb, &m.qb] {
            group.check_element(element)?;
        }
        verify_knowledge(&group, 3, &m.g2b, &m.g2b_proof)?;
        verify_knowledge(&group, 4, &m.g3b, &m.g3b_proof)?;

        let g2 = group.pow(&m.g2b, a2.get());
        let g3 = group.pow(&m.g3b, a3.get());
        verify_commitment(&group, 5, &g2, &g3, &m.pb, &m.qb, &m.commitment_proof)?;

        let x = self.secret.take().ok_or(OtrError::MissingSecret)?;
        let r4 = Secret::random(&group);
        let pa = group.pow(&g3, r4.get());
        let qa = group.mul(&group.pow_g(r4.get()), &group.pow(&g2, x.get()));
        let commitment_proof = prove_commitment(&group, 6, &g2, &g3, &r4, &x);

        let qoq = group.div(&qa, &m.qb);
        let pop = group.div(&pa, &m.pb);
        let ra = group.pow(&qoq, a3.get());
        let ra_proof = prove_equality(&group, 7, &qoq, &a3);

        self.progress = Progress::Expect4 {
            g3o: m.g3b,
            a3,
            qoq,
            pop,
        };
        debug!("SMP type 3 verified, sending type 4");
        Ok(self.step(
            Some(SmpMessage::Message3(Smp3 {
                pa,
                qa,
                commitment_proof,
                ra,
                ra_proof,
            })),
            None,
        ))
    }

    // Responder, Expect3.
    #[allow(clippy::too_many_arguments)]
    fn handle_message3(
        &mut self,
        g3o: BigUint,
        g2: BigUint,
        g3: BigUint,
        b3: Secret,
        pb: BigUint,
        qb: BigUint,
        m: Smp3,
    ) -> Result<SmpStep> {
        let group = Arc::clone(&self.group);

        for element in [&m.pa, &m.qa, &m.ra] {
            group.check_element(element)?;
        }
        verify_commitment(&group, 6, &g2, &g3, &m.pa, &m.qa, &m.commitment_proof)?;

        let qoq = group.div(&m.qa, &qb);
        verify_equality(&group, 7, &g3o, &qoq, &m.ra, &m.ra_proof)?;

        let reply = Smp4 {
            rb: group.pow(&qoq, b3.get()),
            rb_proof: prove_equality(&group, 8, &qoq, &b3),
        };
        let rab = group.pow(&m.ra, b3.get());
        let outcome = compare(&rab, &group.div(&m.pa, &pb));

        self.reset();
        debug!(?outcome, "SMP type 4 verified, sending type 5");
        Ok(self.step(Some(SmpMessage::Message4(reply)), Some(outcome)))
    }

    // Initiator, Expect4.
    fn handle_message4(
        &mut self,
        g3o: BigUint,
        a3: Secret,
        qoq: BigUint,
        pop: BigUint,
        m: Smp4,
    ) -> Result<SmpStep> {
        let group = Arc::clone(&self.group);

        group.check_element(&m.rb)?;
        verify_equality(&group, 8, &g3o, &qoq, &m.rb, &m.rb_proof)?;

        let rab = group.pow(&m.rb, a3.get());
        let outcome = compare(&rab, &pop);

        self.reset();
        debug!(?outcome, "SMP type 5 verified, run complete");
        Ok(self.step(None, Some(outcome)))
    }

    fn step(&self, outbound: Option<SmpMessage>, outcome: Option<SmpOutcome>) -> SmpStep {
        SmpStep {
            outbound,
            state: self.state(),
            outcome,
        }
    }

    fn reset(&mut self) {
        self.progress = Progress::Idle;
        self.secret = None;
    }

    fn fail(&mut self, error: OtrError) -> SmpFailure {
        warn!(error = %error, state = %self.state(), "SMP run aborted");
        self.reset();
        SmpFailure {
            error,
            outbound: Some(SmpMessage::Abort),
        }
    }
}

fn compare(rab: &BigUint, pop: &BigUint) -> SmpOutcome {
    if rab == pop {
        SmpOutcome::SecretsMatch
    } else {
        SmpOutcome::SecretsDiffer
    }
}
