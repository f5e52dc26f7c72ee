// Ephemeral Diffie-Hellman keypairs over the MODP group.

use num_bigint::{BigUint, RandBigInt};
use num_traits::Zero;
use rand::rngs::OsRng;

use crate::group::GroupParams;

/// Bit length of ephemeral private exponents.
pub const PRIVATE_KEY_BITS: u64 = 320;

/// An ephemeral DH keypair for one handshake attempt.
pub struct DhKeyPair {
    private: BigUint,
    public: BigUint,
}

impl DhKeyPair {
    /// Generate a fresh keypair with a 320-bit private exponent.
    pub fn generate(group: &GroupParams) -> Self {
        let mut private = OsRng.gen_biguint(PRIVATE_KEY_BITS);
        while private.is_zero() {
            private = OsRng.gen_biguint(PRIVATE_KEY_BITS);
        }
        Self::from_private(group, private)
    }

    /// Build from a known private exponent (deterministic tests).
    pub fn from_private(group: &GroupParams, private: BigUint) -> Self {
        let public = group.pow_g(&private);
        Self { private, public }
    }

    /// The public value `G^x mod N`.
    pub fn public(&self) -> &BigUint {
        &self.public
    }

    /// Shared secret `peer^x mod N`. The caller range-checks `peer` first.
    pub fn shared_secret(&self, group: &GroupParams, peer_public: &BigUint) -> BigUint {
        group.pow(peer_public, &self.private)
    }
}

impl Drop for DhKeyPair {
    fn drop(&mut self) {
        self.private.set_zero();
    }
}

impl std::fmt::Debug for DhKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DhKeyPair")
            .field("public_bits", &self.public.bits())
            .finish_non_exhaustive()
    }
}
