// Conversation façade: one AKE engine, the SMP engine it unlocks, and an
// optional transport for outbound messages.

use std::sync::mpsc;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::ake::{AkeEngine, AkeMessage, AkeStep, AuthState, MsgState};
use crate::crypto::keys::IdentityKeyPair;
use crate::error::{OtrError, Result};
use crate::group::GroupParams;
use crate::smp::{SmpContext, SmpEngine, SmpFailure, SmpMessage, SmpOutcome, SmpState, SmpStep};

/// Any protocol message exchanged by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Ake(AkeMessage),
    Smp(SmpMessage),
}

impl Message {
    pub fn name(&self) -> &'static str {
        match self {
            Message::Ake(m) => m.name(),
            Message::Smp(m) => m.name(),
        }
    }

    /// Encode to the wire form of the underlying message.
    pub fn encode(&self) -> Result<Bytes> {
        match self {
            Message::Ake(m) => Ok(m.encode()),
            Message::Smp(m) => m.encode(),
        }
    }
}

/// Delivery path for outbound messages.
pub trait Transport: Send {
    /// Hand one message to the peer.
    fn deliver(&mut self, message: Message) -> Result<()>;
}

impl Transport for mpsc::Sender<Message> {
    fn deliver(&mut self, message: Message) -> Result<()> {
        self.send(message)
            .map_err(|e| OtrError::Transport(e.to_string()))
    }
}

/// One OTR conversation with a single peer.
pub struct Session {
    group: Arc<GroupParams>,
    ake: AkeEngine,
    smp: Option<SmpEngine>,
    transport: Option<Box<dyn Transport>>,
}

impl Session {
    pub fn new(group: Arc<GroupParams>, identity: Arc<IdentityKeyPair>) -> Self {
        Self {
            ake: AkeEngine::new(Arc::clone(&group), identity),
            group,
            smp: None,
            transport: None,
        }
    }

    /// Attach the transport used by [`send`](Self::send) and [`handle`](Self::handle).
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn set_transport(&mut self, transport: impl Transport + 'static) {
        self.transport = Some(Box::new(transport));
    }

    pub fn ake(&self) -> &AkeEngine {
        &self.ake
    }

    pub fn msg_state(&self) -> MsgState {
        self.ake.msg_state()
    }

    pub fn auth_state(&self) -> AuthState {
        self.ake.auth_state()
    }

    /// `None` until an encrypted session exists.
    pub fn smp_state(&self) -> Option<SmpState> {
        self.smp.as_ref().map(SmpEngine::state)
    }

    pub fn initiate_ake(&mut self) -> AkeMessage {
        self.ake.initiate()
    }

    /// Process an AKE message. A completed handshake starts a fresh SMP
    /// engine bound to the new session id.
    pub fn receive_ake(&mut self, message: AkeMessage) -> Result<AkeStep> {
        let step = self.ake.receive(message)?;
        if let Some(keys) = self.ake.session_keys() {
            let stale = self
                .smp
                .as_ref()
                .map_or(true, |smp| smp.context().ssid != *keys.ssid());
            if stale {
                let context = SmpContext {
                    our_fingerprint: self.ake.identity().fingerprint(),
                    their_fingerprint: keys.their_fingerprint(),
                    ssid: *keys.ssid(),
                };
                self.smp = Some(SmpEngine::new(Arc::clone(&self.group), context));
                debug!("SMP engine bound to new session");
            }
        }
        Ok(step)
    }

    pub fn initiate_smp(&mut self, secret: &[u8]) -> std::result::Result<SmpMessage, SmpFailure> {
        self.smp_engine()?.initiate(secret)
    }

    pub fn set_smp_secret(&mut self, secret: &[u8]) -> Result<()> {
        self.smp_engine()?.set_secret(secret);
        Ok(())
    }

    pub fn receive_smp(&mut self, message: SmpMessage) -> std::result::Result<SmpStep, SmpFailure> {
        self.smp_engine()?.receive(message)
    }

    pub fn abort_smp(&mut self) -> Result<SmpMessage> {
        Ok(self.smp_engine()?.abort())
    }

    /// End the conversation, discarding session keys and any SMP run.
    pub fn end(&mut self) {
        self.ake.finish();
        self.smp = None;
    }

    /// Deliver a message through the attached transport.
    pub fn send(&mut self, message: Message) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(OtrError::NoContinuation)?;
        trace!(message = message.name(), "delivering");
        transport.deliver(message)
    }

    /// Route an inbound message to its engine and deliver any reply.
    ///
    /// Without a transport nothing is processed. A failed SMP step still
    /// delivers its abort before the error is returned, and a failed
    /// delivery keeps the step's outcome or original error.
    pub fn handle(&mut self, message: Message) -> Result<Option<SmpOutcome>> {
        if self.transport.is_none() {
            return Err(OtrError::NoContinuation);
        }
        match message {
            Message::Ake(m) => {
                let step = self.receive_ake(m)?;
                if let Some(reply) = step.outbound {
                    self.send(Message::Ake(reply))?;
                }
                Ok(None)
            }
            Message::Smp(m) => match self.receive_smp(m) {
                Ok(step) => {
                    let outcome = step.outcome;
                    if let Some(reply) = step.outbound {
                        self.send(Message::Smp(reply)).map_err(|e| {
                            warn!(error = %e, "SMP reply not delivered");
                            OtrError::SmpReplyUndelivered {
                                outcome,
                                delivery: Box::new(e),
                            }
                        })?;
                    }
                    Ok(outcome)
                }
                Err(failure) => {
                    if let Some(reply) = failure.outbound {
                        if let Err(e) = self.send(Message::Smp(reply)) {
                            warn!(error = %e, "SMP abort not delivered");
                            return Err(OtrError::SmpAbortUndelivered {
                                error: Box::new(failure.error),
                                delivery: Box::new(e),
                            });
                        }
                    }
                    Err(failure.error)
                }
            },
        }
    }

    fn smp_engine(&mut self) -> Result<&mut SmpEngine> {
        if self.ake.msg_state() != MsgState::Encrypted {
            return Err(OtrError::NotEncrypted);
        }
        self.smp.as_mut().ok_or(OtrError::NotEncrypted)
    }
}
