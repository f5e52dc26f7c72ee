// Diffie-Hellman group parameters shared by the AKE and SMP engines.
//
// The default group is the 1536-bit MODP group from RFC 3526 (group 5) with
// generator 2. Since N is a safe prime with N = 7 mod 8, G generates the
// subgroup of prime order Q = (N - 1) / 2, which is where all SMP exponent
// arithmetic happens.

use std::sync::Arc;

use num_bigint::{BigUint, RandBigInt};
use num_traits::{Num, One};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use serde::Deserialize;

use crate::error::{OtrError, Result};

/// RFC 3526 group 5 prime, hex.
const MODP_1536_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1",
    "29024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245",
    "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D",
    "C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F",
    "83655D23DCA3AD961C62F356208552BB9ED529077096966D",
    "670C354E4ABC9804F1746C08CA237327FFFFFFFFFFFFFFFF",
);

static MODP_1536: Lazy<Arc<GroupParams>> = Lazy::new(|| {
    let modulus = BigUint::from_str_radix(MODP_1536_HEX, 16)
        .unwrap_or_else(|_| unreachable!("RFC 3526 prime is valid hex"));
    Arc::new(GroupParams::build(modulus, BigUint::from(2u8)))
});

/// Group parameters as stored in a JSON document: `G` in decimal, `N` in hex.
#[derive(Debug, Deserialize)]
struct GroupConfig {
    #[serde(rename = "G")]
    generator: String,
    #[serde(rename = "N")]
    modulus: String,
}

/// Immutable prime-order group description: modulus `N`, generator `G`, and
/// subgroup order `Q = (N - 1) / 2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupParams {
    modulus: BigUint,
    generator: BigUint,
    order: BigUint,
    modulus_minus_two: BigUint,
}

impl GroupParams {
    /// The process-wide RFC 3526 1536-bit group.
    pub fn modp1536() -> Arc<GroupParams> {
        Arc::clone(&MODP_1536)
    }

    /// Build a group from an explicit modulus and generator.
    ///
    /// The modulus is not tested for primality; it must be odd and the
    /// generator must have order `Q = (N - 1) / 2`.
    pub fn new(modulus: BigUint, generator: BigUint) -> Result<Self> {
        if modulus <= BigUint::from(5u8) || !(&modulus & BigUint::one()).is_one() {
            return Err(OtrError::InvalidGroup("modulus must be odd and > 5".into()));
        }
        let two = BigUint::from(2u8);
        if generator < two || generator > &modulus - &two {
            return Err(OtrError::InvalidGroup("generator outside [2, N-2]".into()));
        }
        let group = Self::build(modulus, generator);
        if !group.pow_g(&group.order).is_one() {
            return Err(OtrError::InvalidGroup("generator does not have order (N-1)/2".into()));
        }
        Ok(group)
    }

    /// Parse a `{"G": "<decimal>", "N": "<hex>"}` document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: GroupConfig = serde_json::from_str(json)?;
        let generator = BigUint::from_str_radix(config.generator.trim(), 10)
            .map_err(|e| OtrError::InvalidGroup(format!("generator: {e}")))?;
        let hex: String = config.modulus.split_whitespace().collect();
        let modulus = BigUint::from_str_radix(&hex, 16)
            .map_err(|e| OtrError::InvalidGroup(format!("modulus: {e}")))?;
        Self::new(modulus, generator)
    }

    fn build(modulus: BigUint, generator: BigUint) -> Self {
        let order = (&modulus - BigUint::one()) / 2u8;
        let modulus_minus_two = &modulus - BigUint::from(2u8);
        Self {
            modulus,
            generator,
            order,
            modulus_minus_two,
        }
    }

    /// The prime modulus `N`.
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// The generator `G`.
    pub fn generator(&self) -> &BigUint {
        &self.generator
    }

    /// The subgroup order `Q`.
    pub fn order(&self) -> &BigUint {
        &self.order
    }

    /// Check that a received group element lies in `[2, N-2]`.
    pub fn check_element(&self, value: &BigUint) -> Result<()> {
        if value >= &BigUint::from(2u8) && value <= &self.modulus_minus_two {
            Ok(())
        } else {
            Err(OtrError::GroupMembershipViolation)
        }
    }

    /// Check that a received proof exponent lies in `[1, Q)`.
    pub fn check_exponent(&self, value: &BigUint) -> Result<()> {
        if value >= &BigUint::one() && value < &self.order {
            Ok(())
        } else {
            Err(OtrError::ExponentOutOfRange)
        }
    }

    /// `base^exp mod N`.
    pub fn pow(&self, base: &BigUint, exp: &BigUint) -> BigUint {
        base.modpow(exp, &self.modulus)
    }

    /// `G^exp mod N`.
    pub fn pow_g(&self, exp: &BigUint) -> BigUint {
        self.generator.modpow(exp, &self.modulus)
    }

    /// `a * b mod N`.
    pub fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.modulus
    }

    /// `a / b mod N`, using `b^(N-2)` as the inverse since `N` is prime.
    pub fn div(&self, a: &BigUint, b: &BigUint) -> BigUint {
        let inverse = b.modpow(&self.modulus_minus_two, &self.modulus);
        self.mul(a, &inverse)
    }

    /// `r - a*c mod Q`, the response half of a Schnorr proof.
    pub fn response(&self, r: &BigUint, a: &BigUint, c: &BigUint) -> BigUint {
        let ac = (a * c) % &self.order;
        let r = r % &self.order;
        (r + &self.order - ac) % &self.order
    }

    /// Uniformly random exponent in `[1, Q)`.
    pub fn random_exponent(&self) -> BigUint {
        OsRng.gen_biguint_range(&BigUint::one(), &self.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modp1536_shape() {
        let group = GroupParams::modp1536();
        assert_eq!(group.modulus().bits(), 1536);
        assert_eq!(group.generator(), &BigUint::from(2u8));
        assert_eq!(group.order().clone() * 2u8 + 1u8, *group.modulus());
    }

    #[test]
    fn generator_has_prime_order() {
        let group = GroupParams::modp1536();
        assert_eq!(group.pow_g(group.order()), BigUint::one());
    }

    #[test]
    fn element_bounds() {
        let group = GroupParams::modp1536();
        let n = group.modulus().clone();
        for bad in [
            BigUint::from(0u8),
            BigUint::one(),
            &n - BigUint::one(),
            n.clone(),
        ] {
            assert!(matches!(
                group.check_element(&bad),
                Err(OtrError::GroupMembershipViolation)
            ));
        }
        group.check_element(&BigUint::from(2u8)).unwrap();
        group.check_element(&(&n - BigUint::from(2u8))).unwrap();
    }

    #[test]
    fn exponent_bounds() {
        let group = GroupParams::modp1536();
        assert!(group.check_exponent(&BigUint::from(0u8)).is_err());
        assert!(group.check_exponent(group.order()).is_err());
        group.check_exponent(&BigUint::one()).unwrap();
    }

    #[test]
    fn division_inverts_multiplication() {
        let group = GroupParams::modp1536();
        let a = group.pow_g(&BigUint::from(12345u32));
        let b = group.pow_g(&BigUint::from(678u32));
        let product = group.mul(&a, &b);
        assert_eq!(group.div(&product, &b), a);
    }

    #[test]
    fn response_wraps_modulo_order() {
        let group = GroupParams::modp1536();
        let r = BigUint::from(5u8);
        let a = BigUint::from(3u8);
        let c = BigUint::from(2u8);
        // 5 - 6 = -1 = Q - 1
        assert_eq!(group.response(&r, &a, &c), group.order() - BigUint::one());
    }

    #[test]
    fn json_config_matches_builtin() {
        let json = format!(r#"{{"G": "2", "N": "{MODP_1536_HEX}"}}"#);
        let parsed = GroupParams::from_json(&json).unwrap();
        assert_eq!(&parsed, GroupParams::modp1536().as_ref());
    }

    #[test]
    fn json_config_rejects_bad_generator() {
        let json = r#"{"G": "1", "N": "17"}"#;
        assert!(matches!(
            GroupParams::from_json(json),
            Err(OtrError::InvalidGroup(_))
        ));
        assert!(matches!(
            GroupParams::from_json("{"),
            Err(OtrError::Config(_))
        ));
    }

    #[test]
    fn generator_outside_subgroup_rejected() {
        // 5 has order 22 modulo 23, not Q = 11.
        assert!(matches!(
            GroupParams::new(BigUint::from(23u8), BigUint::from(5u8)),
            Err(OtrError::InvalidGroup(_))
        ));
        // 3 is a quadratic residue, so 3^11 = 1.
        assert!(GroupParams::new(BigUint::from(23u8), BigUint::from(3u8)).is_ok());
    }
}
