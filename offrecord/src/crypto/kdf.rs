// AKE key schedule.
//
// ```text
// secbytes = MPI(s)
// h2(b)    = SHA-256(b || secbytes)
// ssid     = h2(0x00)[0..8]
// c, c'    = h2(0x01)[0..16], h2(0x01)[16..32]
// m1, m2   = h2(0x02), h2(0x03)
// m1', m2' = h2(0x04), h2(0x05)
// ```
//
// Unprimed keys protect the committer's authentication block (Reveal
// Signature message), primed keys the responder's (Signature message).

use num_bigint::BigUint;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::ctr::CtrKey;
use crate::crypto::hash::sha256_tagged;
use crate::encoding::mpi_bytes;

/// 64-bit session identifier.
pub type Ssid = [u8; 8];

/// All keys derived from one AKE shared secret.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AkeKeys {
    pub ssid: Ssid,
    pub c: CtrKey,
    pub c_prime: CtrKey,
    pub m1: [u8; 32],
    pub m2: [u8; 32],
    pub m1_prime: [u8; 32],
    pub m2_prime: [u8; 32],
}

impl AkeKeys {
    /// Derive the key schedule from the DH shared secret `s`.
    pub fn derive(shared_secret: &BigUint) -> Self {
        let mut secbytes = mpi_bytes(shared_secret);
        let h2 = |tag: u8| sha256_tagged(tag, &secbytes);

        let mut h0 = h2(0x00);
        let mut h1 = h2(0x01);
        let mut ssid = [0u8; 8];
        ssid.copy_from_slice(&h0[..8]);
        let mut c = [0u8; 16];
        let mut c_prime = [0u8; 16];
        c.copy_from_slice(&h1[..16]);
        c_prime.copy_from_slice(&h1[16..]);

        let keys = Self {
            ssid,
            c: CtrKey::from_bytes(c),
            c_prime: CtrKey::from_bytes(c_prime),
            m1: h2(0x02),
            m2: h2(0x03),
            m1_prime: h2(0x04),
            m2_prime: h2(0x05),
        };

        h0.zeroize();
        h1.zeroize();
        c.zeroize();
        c_prime.zeroize();
        secbytes.zeroize();
        keys
    }
}

impl std::fmt::Debug for AkeKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AkeKeys")
            .field("ssid", &self.ssid)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let s = BigUint::from(0xDEADBEEFu32);
        let a = AkeKeys::derive(&s);
        let b = AkeKeys::derive(&s);
        assert_eq!(a.ssid, b.ssid);
        assert_eq!(a.c.as_bytes(), b.c.as_bytes());
        assert_eq!(a.m2_prime, b.m2_prime);
    }

    #[test]
    fn subkeys_are_domain_separated() {
        let keys = AkeKeys::derive(&BigUint::from(42u8));
        assert_ne!(keys.c.as_bytes(), keys.c_prime.as_bytes());
        assert_ne!(keys.m1, keys.m2);
        assert_ne!(keys.m1, keys.m1_prime);
        assert_ne!(keys.m2, keys.m2_prime);
    }

    #[test]
    fn ssid_is_prefix_of_tag_zero_hash() {
        let s = BigUint::from(7u8);
        let keys = AkeKeys::derive(&s);
        let h0 = sha256_tagged(0x00, &mpi_bytes(&s));
        assert_eq!(&keys.ssid[..], &h0[..8]);
        let h1 = sha256_tagged(0x01, &mpi_bytes(&s));
        assert_eq!(&keys.c.as_bytes()[..], &h1[..16]);
        assert_eq!(&keys.c_prime.as_bytes()[..], &h1[16..]);
    }
}
