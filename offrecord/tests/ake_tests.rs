// Integration tests for the OTR v2 authenticated key exchange.

use std::sync::Arc;

use num_bigint::BigUint;

use offrecord::ake::messages::{DhKey, RevealSignature};
use offrecord::{AkeEngine, AkeMessage, AuthState, GroupParams, IdentityKeyPair, MsgState, OtrError};

fn engine() -> AkeEngine {
    AkeEngine::new(
        GroupParams::modp1536(),
        Arc::new(IdentityKeyPair::generate()),
    )
}

fn reply(engine: &mut AkeEngine, msg: AkeMessage) -> AkeMessage {
    engine
        .receive(msg)
        .expect("message accepted")
        .outbound
        .expect("reply produced")
}

/// Run Commit / Key / Reveal / Signature between `bob` (committer) and `alice`.
fn handshake(bob: &mut AkeEngine, alice: &mut AkeEngine) {
    let commit = bob.initiate();
    let key = reply(alice, commit);
    let reveal = reply(bob, key);
    let sig = reply(alice, reveal);
    let step = bob.receive(sig).unwrap();
    assert!(step.outbound.is_none());
}

// ── Happy path ───────────────────────────────────────────────────────────

#[test]
fn full_handshake_installs_matching_keys() {
    let mut bob = engine();
    let mut alice = engine();
    handshake(&mut bob, &mut alice);

    assert_eq!(alice.msg_state(), MsgState::Encrypted);
    assert_eq!(bob.msg_state(), MsgState::Encrypted);
    assert_eq!(alice.auth_state(), AuthState::None);
    assert_eq!(bob.auth_state(), AuthState::None);

    let a = alice.session_keys().unwrap();
    let b = bob.session_keys().unwrap();
    assert_eq!(a.ssid(), b.ssid());
    assert_eq!(a.keys().c.as_bytes(), b.keys().c.as_bytes());
    assert_eq!(a.keys().c_prime.as_bytes(), b.keys().c_prime.as_bytes());
    assert_eq!(a.keys().m1, b.keys().m1);
    assert_eq!(a.keys().m2_prime, b.keys().m2_prime);

    assert_eq!(a.our_dh_public(), b.their_dh_public());
    assert_eq!(a.their_dh_public(), b.our_dh_public());
    assert_eq!(a.their_fingerprint(), bob.identity().fingerprint());
    assert_eq!(b.their_fingerprint(), alice.identity().fingerprint());

    assert_eq!(a.our_key_id(), 1);
    assert_eq!(b.our_key_id(), 1);
    assert_eq!(a.their_key_id(), b.our_key_id());
    assert_eq!(b.their_key_id(), a.our_key_id());
}

#[test]
fn handshake_over_the_wire() {
    let mut bob = engine();
    let mut alice = engine();

    let mut msg = bob.initiate();
    let mut to_alice = true;
    loop {
        let decoded = AkeMessage::decode(&msg.encode()).unwrap();
        assert_eq!(decoded, msg);
        let target = if to_alice { &mut alice } else { &mut bob };
        match target.receive(decoded).unwrap().outbound {
            Some(next) => msg = next,
            None => break,
        }
        to_alice = !to_alice;
    }
    assert_eq!(
        alice.session_keys().unwrap().ssid(),
        bob.session_keys().unwrap().ssid()
    );
}

#[test]
fn rekey_produces_new_session() {
    let mut bob = engine();
    let mut alice = engine();
    handshake(&mut bob, &mut alice);
    let first = *alice.session_keys().unwrap().ssid();

    // Roles swap; both sides stay encrypted throughout.
    handshake(&mut alice, &mut bob);
    assert_eq!(alice.msg_state(), MsgState::Encrypted);
    let second = *alice.session_keys().unwrap().ssid();
    assert_ne!(first, second);
    assert_eq!(&second, bob.session_keys().unwrap().ssid());
    assert_eq!(alice.key_id(), 2);
    assert_eq!(bob.key_id(), 2);
}

// ── Verification failures ────────────────────────────────────────────────

#[test]
fn corrupted_commit_hash_is_rejected() {
    let mut bob = engine();
    let mut alice = engine();

    let mut commit = bob.initiate();
    if let AkeMessage::DhCommit(c) = &mut commit {
        c.gx_hashed[0] ^= 0xff;
    }
    let key = reply(&mut alice, commit);
    let reveal = reply(&mut bob, key);

    let err = alice.receive(reveal).unwrap_err();
    assert!(matches!(err, OtrError::ZkProofFailed(_)));
    assert!(alice.session_keys().is_none());
    assert_eq!(alice.msg_state(), MsgState::Plaintext);
    assert_eq!(alice.auth_state(), AuthState::None);
}

#[test]
fn tampered_reveal_mac_is_rejected() {
    let mut bob = engine();
    let mut alice = engine();

    let key = reply(&mut alice, bob.initiate());
    let mut reveal = reply(&mut bob, key);
    if let AkeMessage::RevealSignature(r) = &mut reveal {
        r.mac[0] ^= 0x01;
    }
    assert!(matches!(
        alice.receive(reveal),
        Err(OtrError::ZkProofFailed("message authentication code"))
    ));
    assert!(alice.session_keys().is_none());
}

#[test]
fn tampered_signature_payload_is_rejected() {
    let mut bob = engine();
    let mut alice = engine();

    let key = reply(&mut alice, bob.initiate());
    let reveal = reply(&mut bob, key);
    let mut sig = reply(&mut alice, reveal);
    if let AkeMessage::Signature(s) = &mut sig {
        s.encrypted_signature[0] ^= 0x01;
    }
    assert!(matches!(
        bob.receive(sig),
        Err(OtrError::ZkProofFailed(_))
    ));
    assert!(bob.session_keys().is_none());
    assert_eq!(bob.msg_state(), MsgState::Plaintext);
    assert_eq!(bob.auth_state(), AuthState::None);
}

#[test]
fn wrong_reveal_key_is_rejected() {
    let mut bob = engine();
    let mut alice = engine();

    let key = reply(&mut alice, bob.initiate());
    let mut reveal = reply(&mut bob, key);
    if let AkeMessage::RevealSignature(r) = &mut reveal {
        r.key = [0u8; 16];
    }
    assert!(alice.receive(reveal).is_err());
    assert_eq!(alice.auth_state(), AuthState::None);
}

#[test]
fn out_of_range_gy_aborts() {
    let mut bob = engine();
    bob.initiate();
    let err = bob
        .receive(AkeMessage::DhKey(DhKey {
            gy: BigUint::from(1u8),
        }))
        .unwrap_err();
    assert!(matches!(err, OtrError::GroupMembershipViolation));
    assert_eq!(bob.auth_state(), AuthState::None);
}

// ── State dispatch ───────────────────────────────────────────────────────

#[test]
fn out_of_state_messages_leave_state_unchanged() {
    let mut alice = engine();
    let reveal = AkeMessage::RevealSignature(RevealSignature {
        key: [1u8; 16],
        encrypted_signature: vec![0u8; 4],
        mac: [0u8; 20],
    });
    assert!(matches!(
        alice.receive(reveal),
        Err(OtrError::InvalidAkeMessage { state: "None", .. })
    ));

    let mut bob = engine();
    let commit = bob.initiate();
    let key = reply(&mut alice, commit);
    assert_eq!(alice.auth_state(), AuthState::AwaitingRevealSig);

    // A D-H Key in AwaitingRevealSig is ignored.
    assert!(matches!(
        alice.receive(key.clone()),
        Err(OtrError::InvalidAkeMessage { message: "DH-Key", .. })
    ));
    assert_eq!(alice.auth_state(), AuthState::AwaitingRevealSig);

    // The handshake still completes afterwards.
    let reveal = reply(&mut bob, key);
    let sig = reply(&mut alice, reveal);
    bob.receive(sig).unwrap();
    assert_eq!(bob.msg_state(), MsgState::Encrypted);
}

#[test]
fn repeated_commit_retransmits_same_key() {
    let mut bob = engine();
    let mut alice = engine();

    let commit = bob.initiate();
    let first = reply(&mut alice, commit.clone());
    let second = reply(&mut alice, commit);
    assert_eq!(first, second);
    assert_eq!(alice.auth_state(), AuthState::AwaitingRevealSig);
}

#[test]
fn repeated_key_resends_reveal_signature() {
    let mut bob = engine();
    let mut alice = engine();

    let key = reply(&mut alice, bob.initiate());
    let first = reply(&mut bob, key.clone());
    let again = reply(&mut bob, key);
    assert_eq!(first, again);
    assert_eq!(bob.auth_state(), AuthState::AwaitingSig);

    let other = engine().receive(engine().initiate()).unwrap().outbound.unwrap();
    assert!(matches!(
        bob.receive(other),
        Err(OtrError::InvalidAkeMessage { .. })
    ));
    assert_eq!(bob.auth_state(), AuthState::AwaitingSig);
}

#[test]
fn commit_in_awaiting_sig_restarts_as_responder() {
    let mut bob = engine();
    let mut alice = engine();
    let mut carol = engine();

    let key = reply(&mut alice, bob.initiate());
    reply(&mut bob, key);
    assert_eq!(bob.auth_state(), AuthState::AwaitingSig);

    let answer = reply(&mut bob, carol.initiate());
    assert!(matches!(answer, AkeMessage::DhKey(_)));
    assert_eq!(bob.auth_state(), AuthState::AwaitingRevealSig);
}

#[test]
fn simultaneous_commits_resolve() {
    let mut alice = engine();
    let mut bob = engine();

    let commit_a = alice.initiate();
    let commit_b = bob.initiate();
    let hash = |m: &AkeMessage| match m {
        AkeMessage::DhCommit(c) => c.gx_hashed,
        _ => unreachable!(),
    };
    let (winner, loser, winner_commit, loser_commit) = if hash(&commit_a) > hash(&commit_b) {
        (&mut alice, &mut bob, commit_a, commit_b)
    } else {
        (&mut bob, &mut alice, commit_b, commit_a)
    };

    // The larger hash keeps its commitment and resends it.
    let resent = reply(winner, loser_commit);
    assert_eq!(resent, winner_commit);
    assert_eq!(winner.auth_state(), AuthState::AwaitingDhKey);

    // The smaller hash yields and answers as responder.
    let key = reply(loser, winner_commit);
    assert!(matches!(key, AkeMessage::DhKey(_)));
    assert_eq!(loser.auth_state(), AuthState::AwaitingRevealSig);

    let reveal = reply(winner, key);
    let sig = reply(loser, reveal);
    winner.receive(sig).unwrap();

    assert_eq!(winner.msg_state(), MsgState::Encrypted);
    assert_eq!(loser.msg_state(), MsgState::Encrypted);
    assert_eq!(
        winner.session_keys().unwrap().ssid(),
        loser.session_keys().unwrap().ssid()
    );
}

#[test]
fn finish_and_reset() {
    let mut bob = engine();
    let mut alice = engine();
    handshake(&mut bob, &mut alice);

    alice.finish();
    assert_eq!(alice.msg_state(), MsgState::Finished);
    assert!(alice.session_keys().is_none());

    alice.reset();
    assert_eq!(alice.msg_state(), MsgState::Plaintext);
    assert_eq!(alice.auth_state(), AuthState::None);
}
