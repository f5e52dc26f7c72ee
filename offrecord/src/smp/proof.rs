// Schnorr-style zero-knowledge proofs used by SMP.
//
// Challenge: c = SHA-256(tag || MPI(a) [|| MPI(b)]) read as an integer.
// Response:  d = r - e*c mod Q for secret exponent e and nonce r.

use num_bigint::BigUint;
use tracing::trace;

use crate::crypto::hash::sha256;
use crate::encoding::Encoder;
use crate::error::{OtrError, Result};
use crate::group::GroupParams;
use crate::smp::messages::{CommitmentProof, EqualityProof, KnowledgeProof};
use crate::smp::state::Secret;

/// Hash one or two group elements under a proof tag.
pub fn challenge(tag: u8, a: &BigUint, b: Option<&BigUint>) -> BigUint {
    let mut enc = Encoder::new();
    enc.write_byte(tag).write_mpi(a);
    if let Some(b) = b {
        enc.write_mpi(b);
    }
    BigUint::from_bytes_be(&sha256(&enc.to_vec()))
}

/// Prove knowledge of `exponent` for `G^exponent`.
pub(crate) fn prove_knowledge(group: &GroupParams, tag: u8, exponent: &Secret) -> KnowledgeProof {
    let r = Secret::random(group);
    let c = challenge(tag, &group.pow_g(r.get()), None);
    let d = group.response(r.get(), exponent.get(), &c);
    KnowledgeProof { c, d }
}

/// Check `c == H(tag, G^d * X^c)`.
pub fn verify_knowledge(
    group: &GroupParams,
    tag: u8,
    public: &BigUint,
    proof: &KnowledgeProof,
) -> Result<()> {
    group.check_exponent(&proof.d)?;
    let t = group.mul(&group.pow_g(&proof.d), &group.pow(public, &proof.c));
    check(tag, &proof.c, challenge(tag, &t, None), "knowledge proof")
}

/// Prove `P = g3^r4` and `Q = G^r4 * g2^x` with the same `r4`.
pub(crate) fn prove_commitment(
    group: &GroupParams,
    tag: u8,
    g2: &BigUint,
    g3: &BigUint,
    r4: &Secret,
    x: &Secret,
) -> CommitmentProof {
    let r5 = Secret::random(group);
    let r6 = Secret::random(group);
    let t1 = group.pow(g3, r5.get());
    let t2 = group.mul(&group.pow_g(r5.get()), &group.pow(g2, r6.get()));
    let c = challenge(tag, &t1, Some(&t2));
    CommitmentProof {
        d5: group.response(r5.get(), r4.get(), &c),
        d6: group.response(r6.get(), x.get(), &c),
        c,
    }
}

/// Check `c == H(tag, g3^d5 * P^c, G^d5 * g2^d6 * Q^c)`.
pub fn verify_commitment(
    group: &GroupParams,
    tag: u8,
    g2: &BigUint,
    g3: &BigUint,
    p: &BigUint,
    q: &BigUint,
    proof: &CommitmentProof,
) -> Result<()> {
    group.check_exponent(&proof.d5)?;
    group.check_exponent(&proof.d6)?;
    let t1 = group.mul(&group.pow(g3, &proof.d5), &group.pow(p, &proof.c));
    let t2 = group.mul(
        &group.mul(&group.pow_g(&proof.d5), &group.pow(g2, &proof.d6)),
        &group.pow(q, &proof.c),
    );
    check(tag, &proof.c, challenge(tag, &t1, Some(&t2)), "commitment proof")
}

/// Prove `R = QoQ^a3` shares its exponent with `g3 = G^a3`.
pub(crate) fn prove_equality(
    group: &GroupParams,
    tag: u8,
    qoq: &BigUint,
    a3: &Secret,
) -> EqualityProof {
    let r7 = Secret::random(group);
    let c = challenge(tag, &group.pow_g(r7.get()), Some(&group.pow(qoq, r7.get())));
    let d = group.response(r7.get(), a3.get(), &c);
    EqualityProof { c, d }
}

/// Check `c == H(tag, G^d * g3o^c, QoQ^d * R^c)`.
pub fn verify_equality(
    group: &GroupParams,
    tag: u8,
    g3o: &BigUint,
    qoq: &BigUint,
    r: &BigUint,
    proof: &EqualityProof,
) -> Result<()> {
    group.check_exponent(&proof.d)?;
    let t1 = group.mul(&group.pow_g(&proof.d), &group.pow(g3o, &proof.c));
    let t2 = group.mul(&group.pow(qoq, &proof.d), &group.pow(r, &proof.c));
    check(tag, &proof.c, challenge(tag, &t1, Some(&t2)), "equality proof")
}

fn check(tag: u8, received: &BigUint, expected: BigUint, what: &'static str) -> Result<()> {
    if *received == expected {
        trace!(tag, what, "proof verified");
        Ok(())
    } else {
        Err(OtrError::ZkProofFailed(what))
    }
}
