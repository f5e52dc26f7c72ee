// OTR v2 authenticated key exchange engine.
//
//   Committer                               Responder
//     |--- D-H Commit ----------------------->|  AwaitingDhKey
//     |<-- D-H Key ---------------------------|  AwaitingRevealSig
//     |--- Reveal Signature ----------------->|  AwaitingSig
//     |<-- Signature -------------------------|  (responder: Encrypted)
//     |  (committer: Encrypted)                |

use std::mem;
use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::Zero;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::ake::messages::{AkeMessage, DhCommit, DhKey, RevealSignature, Signature};
use crate::ake::state::{AuthState, Handshake, MsgState};
use crate::crypto::ctr::CtrKey;
use crate::crypto::dh::DhKeyPair;
use crate::crypto::hash::{hmac_sha256, hmac_sha256_160, sha256, verify_hmac_sha256_160, MAC160_LEN};
use crate::crypto::kdf::{AkeKeys, Ssid};
use crate::crypto::keys::{
    fingerprint, verify_signature, Fingerprint, IdentityKeyPair, PUBLIC_KEY_LEN, SIGNATURE_LEN,
};
use crate::encoding::{mpi_bytes, Decoder, Encoder};
use crate::error::{OtrError, Result};
use crate::group::GroupParams;

/// Keys and peer identity installed by a completed handshake.
#[derive(Debug)]
pub struct SessionKeys {
    keys: AkeKeys,
    our_key_id: u32,
    their_key_id: u32,
    their_public_key: [u8; PUBLIC_KEY_LEN],
    our_dh_public: BigUint,
    their_dh_public: BigUint,
}

impl SessionKeys {
    /// The 64-bit session id, identical on both sides.
    pub fn ssid(&self) -> &Ssid {
        &self.keys.ssid
    }

    /// The full derived key schedule.
    pub fn keys(&self) -> &AkeKeys {
        &self.keys
    }

    pub fn our_key_id(&self) -> u32 {
        self.our_key_id
    }

    pub fn their_key_id(&self) -> u32 {
        self.their_key_id
    }

    /// The peer's verified long-term public key.
    pub fn their_public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.their_public_key
    }

    pub fn their_fingerprint(&self) -> Fingerprint {
        fingerprint(&self.their_public_key)
    }

    pub fn our_dh_public(&self) -> &BigUint {
        &self.our_dh_public
    }

    pub fn their_dh_public(&self) -> &BigUint {
        &self.their_dh_public
    }
}

/// Result of processing one AKE message.
#[derive(Debug)]
pub struct AkeStep {
    /// Message to deliver to the peer, if any.
    pub outbound: Option<AkeMessage>,
    pub auth_state: AuthState,
    pub msg_state: MsgState,
}

impl AkeStep {
    pub fn is_encrypted(&self) -> bool {
        self.msg_state == MsgState::Encrypted
    }
}

/// Peer identity recovered from a verified authentication block.
struct VerifiedPeer {
    public_key: [u8; PUBLIC_KEY_LEN],
    key_id: u32,
}

/// One side of an AKE, owned by a single conversation.
pub struct AkeEngine {
    group: Arc<GroupParams>,
    identity: Arc<IdentityKeyPair>,
    msg_state: MsgState,
    handshake: Handshake,
    key_id: u32,
    session: Option<SessionKeys>,
}

impl AkeEngine {
    pub fn new(group: Arc<GroupParams>, identity: Arc<IdentityKeyPair>) -> Self {
        Self {
            group,
            identity,
            msg_state: MsgState::Plaintext,
            handshake: Handshake::Idle,
            key_id: 0,
            session: None,
        }
    }

    pub fn msg_state(&self) -> MsgState {
        self.msg_state
    }

    pub fn auth_state(&self) -> AuthState {
        self.handshake.auth_state()
    }

    /// Number of authenticated keys this side has produced.
    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    /// Keys installed by the most recent successful handshake.
    pub fn session_keys(&self) -> Option<&SessionKeys> {
        self.session.as_ref()
    }

    pub fn identity(&self) -> &IdentityKeyPair {
        &self.identity
    }

    /// Start a handshake: emit D-H Commit and wait for D-H Key.
    ///
    /// Any half-finished handshake is discarded first.
    pub fn initiate(&mut self) -> AkeMessage {
        self.handshake = Handshake::Idle;

        let our_dh = DhKeyPair::generate(&self.group);
        let r = CtrKey::generate();
        let gx_mpi = mpi_bytes(our_dh.public());
        let commit = DhCommit {
            gx_encrypted: r.encrypt(&gx_mpi),
            gx_hashed: sha256(&gx_mpi),
        };
        debug!("AKE initiated, sending D-H Commit");

        self.handshake = Handshake::AwaitingDhKey {
            our_dh,
            r,
            commit: commit.clone(),
        };
        AkeMessage::DhCommit(commit)
    }

    /// Process one inbound AKE message.
    pub fn receive(&mut self, message: AkeMessage) -> Result<AkeStep> {
        debug!(
            message = message.name(),
            auth_state = %self.auth_state(),
            "AKE message received"
        );
        let outbound = match message {
            AkeMessage::DhCommit(m) => Some(self.handle_dh_commit(m)),
            AkeMessage::DhKey(m) => Some(self.handle_dh_key(m)?),
            AkeMessage::RevealSignature(m) => Some(self.handle_reveal_signature(m)?),
            AkeMessage::Signature(m) => {
                self.handle_signature(m)?;
                None
            }
        };
        Ok(AkeStep {
            outbound,
            auth_state: self.auth_state(),
            msg_state: self.msg_state,
        })
    }

    /// The peer ended the conversation: stop using the session keys.
    pub fn finish(&mut self) {
        self.handshake = Handshake::Idle;
        self.session = None;
        self.msg_state = MsgState::Finished;
    }

    /// Return to plaintext, discarding every secret.
    pub fn reset(&mut self) {
        self.handshake = Handshake::Idle;
        self.session = None;
        self.msg_state = MsgState::Plaintext;
    }

    fn handle_dh_commit(&mut self, their_commit: DhCommit) -> AkeMessage {
        match mem::replace(&mut self.handshake, Handshake::Idle) {
            // Both sides committed; the larger hash keeps its commitment.
            Handshake::AwaitingDhKey { our_dh, r, commit }
                if commit.gx_hashed > their_commit.gx_hashed =>
            {
                debug!("simultaneous D-H Commit, keeping ours");
                let resend = AkeMessage::DhCommit(commit.clone());
                self.handshake = Handshake::AwaitingDhKey { our_dh, r, commit };
                resend
            }
            Handshake::AwaitingRevealSig { our_dh, .. } => {
                debug!("D-H Commit replaced, resending D-H Key");
                let reply = AkeMessage::DhKey(DhKey {
                    gy: our_dh.public().clone(),
                });
                self.handshake = Handshake::AwaitingRevealSig {
                    our_dh,
                    their_commit,
                };
                reply
            }
            _ => {
                let our_dh = DhKeyPair::generate(&self.group);
                let reply = AkeMessage::DhKey(DhKey {
                    gy: our_dh.public().clone(),
                });
                self.handshake = Handshake::AwaitingRevealSig {
                    our_dh,
                    their_commit,
                };
                reply
            }
        }
    }

    fn handle_dh_key(&mut self, msg: DhKey) -> Result<AkeMessage> {
        match &self.handshake {
            Handshake::AwaitingDhKey { .. } => {}
            Handshake::AwaitingSig { their_gy, sent, .. } if *their_gy == msg.gy => {
                debug!("duplicate D-H Key, resending Reveal Signature");
                return Ok(AkeMessage::RevealSignature(sent.clone()));
            }
            _ => return Err(self.invalid("DH-Key")),
        }

        let Handshake::AwaitingDhKey { our_dh, r, .. } =
            mem::replace(&mut self.handshake, Handshake::Idle)
        else {
            return Err(self.invalid("DH-Key"));
        };

        if let Err(e) = self.group.check_element(&msg.gy) {
            warn!("D-H Key rejected: gy outside group, handshake aborted");
            return Err(e);
        }

        let mut s = our_dh.shared_secret(&self.group, &msg.gy);
        let keys = AkeKeys::derive(&s);
        s.set_zero();

        let key_id = self.next_key_id();
        let (encrypted_signature, mac) = self.build_auth_block(
            &keys.c,
            &keys.m1,
            &keys.m2,
            our_dh.public(),
            &msg.gy,
            key_id,
        )?;
        let reveal = RevealSignature {
            key: *r.as_bytes(),
            encrypted_signature,
            mac,
        };
        debug!(key_id, "sending Reveal Signature");

        self.handshake = Handshake::AwaitingSig {
            our_dh,
            their_gy: msg.gy,
            keys,
            sent: reveal.clone(),
        };
        Ok(AkeMessage::RevealSignature(reveal))
    }

    fn handle_reveal_signature(&mut self, msg: RevealSignature) -> Result<AkeMessage> {
        if !matches!(self.handshake, Handshake::AwaitingRevealSig { .. }) {
            return Err(self.invalid("Reveal-Signature"));
        }
        // From here on every failure leaves the handshake aborted.
        let Handshake::AwaitingRevealSig {
            our_dh,
            their_commit,
        } = mem::replace(&mut self.handshake, Handshake::Idle)
        else {
            return Err(self.invalid("Reveal-Signature"));
        };

        let r = CtrKey::from_bytes(msg.key);
        let gx_mpi = r.decrypt(&their_commit.gx_encrypted);
        let hashed = sha256(&gx_mpi);
        if !bool::from(hashed[..].ct_eq(&their_commit.gx_hashed[..])) {
            warn!("revealed gx does not match its commitment, handshake aborted");
            return Err(OtrError::ZkProofFailed("gx commitment hash"));
        }

        let mut dec = Decoder::new(&gx_mpi);
        let gx = dec.read_mpi()?;
        dec.finish()?;
        self.group.check_element(&gx)?;

        let mut s = our_dh.shared_secret(&self.group, &gx);
        let keys = AkeKeys::derive(&s);
        s.set_zero();

        let peer = self
            .verify_auth_block(
                &keys.c,
                &keys.m1,
                &keys.m2,
                &gx,
                our_dh.public(),
                &msg.encrypted_signature,
                &msg.mac,
            )
            .map_err(|e| {
                warn!(error = %e, "Reveal Signature verification failed, handshake aborted");
                e
            })?;
        debug!(their_key_id = peer.key_id, "Reveal Signature verified");

        let key_id = self.next_key_id();
        let (encrypted_signature, mac) = self.build_auth_block(
            &keys.c_prime,
            &keys.m1_prime,
            &keys.m2_prime,
            our_dh.public(),
            &gx,
            key_id,
        )?;

        let our_dh_public = our_dh.public().clone();
        self.install(keys, key_id, peer, our_dh_public, gx);

        Ok(AkeMessage::Signature(Signature {
            encrypted_signature,
            mac,
        }))
    }

    fn handle_signature(&mut self, msg: Signature) -> Result<()> {
        if !matches!(self.handshake, Handshake::AwaitingSig { .. }) {
            return Err(self.invalid("Signature"));
        }
        let Handshake::AwaitingSig {
            our_dh,
            their_gy,
            keys,
            ..
        } = mem::replace(&mut self.handshake, Handshake::Idle)
        else {
            return Err(self.invalid("Signature"));
        };

        let peer = self
            .verify_auth_block(
                &keys.c_prime,
                &keys.m1_prime,
                &keys.m2_prime,
                &their_gy,
                our_dh.public(),
                &msg.encrypted_signature,
                &msg.mac,
            )
            .map_err(|e| {
                warn!(error = %e, "Signature verification failed, handshake aborted");
                e
            })?;
        debug!(their_key_id = peer.key_id, "Signature verified");

        let our_dh_public = our_dh.public().clone();
        let key_id = self.key_id;
        self.install(keys, key_id, peer, our_dh_public, their_gy);
        Ok(())
    }

    /// Build `AES_c(X)` and `MAC_m2(DATA(AES_c(X)))` where
    /// `X = DATA(pub) || INT(key_id) || sig(MAC_m1(our_dh || their_dh || pub || key_id))`.
    fn build_auth_block(
        &self,
        c: &CtrKey,
        m1: &[u8; 32],
        m2: &[u8; 32],
        our_dh: &BigUint,
        their_dh: &BigUint,
        key_id: u32,
    ) -> Result<(Vec<u8>, [u8; MAC160_LEN])> {
        let public_key = self.identity.public_key_bytes();
        let m = hmac_sha256(m1, &auth_mac_input(our_dh, their_dh, &public_key, key_id))?;
        let sig = self.identity.sign(&m);
        let x = Encoder::new()
            .write_data(&public_key)
            .write_int(key_id)
            .write_raw(&sig)
            .to_vec();
        let encrypted = c.encrypt(&x);
        let mac = hmac_sha256_160(m2, &Encoder::new().write_data(&encrypted).to_vec())?;
        Ok((encrypted, mac))
    }

    /// Check the MAC, decrypt `X`, and verify the embedded signature.
    #[allow(clippy::too_many_arguments)]
    fn verify_auth_block(
        &self,
        c: &CtrKey,
        m1: &[u8; 32],
        m2: &[u8; 32],
        their_dh: &BigUint,
        our_dh: &BigUint,
        encrypted: &[u8],
        mac: &[u8; MAC160_LEN],
    ) -> Result<VerifiedPeer> {
        verify_hmac_sha256_160(m2, &Encoder::new().write_data(encrypted).to_vec(), mac)?;

        let x = c.decrypt(encrypted);
        let mut dec = Decoder::new(&x);
        let public_key: [u8; PUBLIC_KEY_LEN] = dec.read_data_array()?;
        let key_id = dec.read_int()?;
        let sig: [u8; SIGNATURE_LEN] = dec.read_array()?;
        dec.finish()?;
        if key_id == 0 {
            return Err(OtrError::ZkProofFailed("zero key id"));
        }

        let m = hmac_sha256(m1, &auth_mac_input(their_dh, our_dh, &public_key, key_id))?;
        verify_signature(&public_key, &m, &sig)?;
        Ok(VerifiedPeer { public_key, key_id })
    }

    fn install(
        &mut self,
        keys: AkeKeys,
        our_key_id: u32,
        peer: VerifiedPeer,
        our_dh_public: BigUint,
        their_dh_public: BigUint,
    ) {
        self.session = Some(SessionKeys {
            keys,
            our_key_id,
            their_key_id: peer.key_id,
            their_public_key: peer.public_key,
            our_dh_public,
            their_dh_public,
        });
        self.handshake = Handshake::Idle;
        self.msg_state = MsgState::Encrypted;
        debug!(our_key_id, their_key_id = peer.key_id, "AKE complete, session encrypted");
    }

    fn next_key_id(&mut self) -> u32 {
        self.key_id = self.key_id.checked_add(1).unwrap_or(1);
        self.key_id
    }

    fn invalid(&self, message: &'static str) -> OtrError {
        debug!(message, auth_state = %self.auth_state(), "AKE message ignored");
        OtrError::InvalidAkeMessage {
            message,
            state: self.auth_state().label(),
        }
    }
}

/// `MPI(sender_dh) || MPI(receiver_dh) || DATA(sender_pub) || INT(sender_key_id)`.
fn auth_mac_input(
    sender_dh: &BigUint,
    receiver_dh: &BigUint,
    sender_public_key: &[u8; PUBLIC_KEY_LEN],
    sender_key_id: u32,
) -> Vec<u8> {
    Encoder::new()
        .write_mpi(sender_dh)
        .write_mpi(receiver_dh)
        .write_data(sender_public_key)
        .write_int(sender_key_id)
        .to_vec()
}
