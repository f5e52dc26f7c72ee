// Integration tests for the offrecord crypto layer and group configuration.

use num_bigint::BigUint;

use offrecord::crypto::ctr::CtrKey;
use offrecord::crypto::dh::DhKeyPair;
use offrecord::crypto::hash::{hmac_sha256_160, sha256, verify_hmac_sha256_160};
use offrecord::crypto::kdf::AkeKeys;
use offrecord::crypto::keys::{fingerprint, verify_signature, IdentityKeyPair};
use offrecord::{GroupParams, OtrError};

// ── Diffie-Hellman ───────────────────────────────────────────────────────

#[test]
fn dh_agreement_in_builtin_group() {
    let group = GroupParams::modp1536();
    let a = DhKeyPair::generate(&group);
    let b = DhKeyPair::generate(&group);

    group.check_element(a.public()).unwrap();
    group.check_element(b.public()).unwrap();
    assert_eq!(
        a.shared_secret(&group, b.public()),
        b.shared_secret(&group, a.public())
    );
}

#[test]
fn dh_private_exponent_is_short() {
    let group = GroupParams::modp1536();
    // 2^320 - 1 is the largest private exponent generate() can produce.
    let max = (BigUint::from(1u8) << 320u32) - 1u8;
    let kp = DhKeyPair::from_private(&group, max.clone());
    assert_eq!(kp.public(), &group.pow_g(&max));
}

#[test]
fn dh_derived_keys_agree() {
    let group = GroupParams::modp1536();
    let a = DhKeyPair::generate(&group);
    let b = DhKeyPair::generate(&group);
    let ka = AkeKeys::derive(&a.shared_secret(&group, b.public()));
    let kb = AkeKeys::derive(&b.shared_secret(&group, a.public()));
    assert_eq!(ka.ssid, kb.ssid);
    assert_eq!(ka.m1, kb.m1);
    assert_eq!(ka.c_prime.as_bytes(), kb.c_prime.as_bytes());
}

// ── Group configuration ──────────────────────────────────────────────────

#[test]
fn small_group_from_json() {
    // N = 0x17 = 23, a safe prime with Q = 11.
    let group = GroupParams::from_json(r#"{"G": "2", "N": "17"}"#).unwrap();
    assert_eq!(group.modulus(), &BigUint::from(23u8));
    assert_eq!(group.order(), &BigUint::from(11u8));

    let a = DhKeyPair::from_private(&group, BigUint::from(3u8));
    let b = DhKeyPair::from_private(&group, BigUint::from(7u8));
    assert_eq!(a.public(), &BigUint::from(8u8));
    assert_eq!(
        a.shared_secret(&group, b.public()),
        b.shared_secret(&group, a.public())
    );
}

#[test]
fn group_rejects_even_modulus() {
    assert!(matches!(
        GroupParams::new(BigUint::from(24u8), BigUint::from(2u8)),
        Err(OtrError::InvalidGroup(_))
    ));
}

#[test]
fn json_with_whitespace_in_modulus() {
    let group = GroupParams::from_json("{\"G\": \"3\", \"N\": \"1 7\"}").unwrap();
    assert_eq!(group.modulus(), &BigUint::from(23u8));
    assert_eq!(group.generator(), &BigUint::from(3u8));
}

// ── Symmetric primitives ─────────────────────────────────────────────────

#[test]
fn ctr_commitment_reveal() {
    let r = CtrKey::generate();
    let gx = b"MPI-encoded public value".to_vec();
    let committed = r.encrypt(&gx);
    assert_ne!(committed, gx);

    let revealed = CtrKey::from_bytes(*r.as_bytes());
    assert_eq!(revealed.decrypt(&committed), gx);
    assert_eq!(sha256(&revealed.decrypt(&committed)), sha256(&gx));
}

#[test]
fn truncated_mac_detects_tampering() {
    let key = [0x0b; 32];
    let tag = hmac_sha256_160(&key, b"encrypted signature").unwrap();
    verify_hmac_sha256_160(&key, b"encrypted signature", &tag).unwrap();

    let mut bad = tag;
    bad[19] ^= 0x01;
    assert!(matches!(
        verify_hmac_sha256_160(&key, b"encrypted signature", &bad),
        Err(OtrError::ZkProofFailed(_))
    ));
}

// ── Identity keys ────────────────────────────────────────────────────────

#[test]
fn fingerprint_of_public_key() {
    let kp = IdentityKeyPair::generate();
    assert_eq!(kp.fingerprint(), fingerprint(&kp.public_key_bytes()));
    assert_eq!(kp.fingerprint(), sha256(&kp.public_key_bytes()));
}

#[test]
fn seeded_keys_are_deterministic() {
    let a = IdentityKeyPair::from_seed(&[9u8; 32]);
    let b = IdentityKeyPair::from_seed(&[9u8; 32]);
    assert_eq!(a.public_key_bytes(), b.public_key_bytes());
    let sig = a.sign(b"auth block");
    verify_signature(&b.public_key_bytes(), b"auth block", &sig).unwrap();
}
