// Long-term Ed25519 identity keys and fingerprints.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::crypto::hash::sha256;
use crate::error::{OtrError, Result};

/// Encoded public key length.
pub const PUBLIC_KEY_LEN: usize = 32;
/// Encoded signature length.
pub const SIGNATURE_LEN: usize = 64;

/// 32-byte fingerprint: SHA-256 of the encoded public key.
pub type Fingerprint = [u8; 32];

/// An Ed25519 long-term identity keypair.
#[derive(Debug)]
pub struct IdentityKeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl IdentityKeyPair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Reconstruct from a 32-byte secret seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// The encoded public key.
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.verifying_key.to_bytes()
    }

    /// Fingerprint of our public key.
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(&self.public_key_bytes())
    }

    /// Sign arbitrary data.
    pub fn sign(&self, data: &[u8]) -> [u8; SIGNATURE_LEN] {
        let sig: Signature = self.signing_key.sign(data);
        sig.to_bytes()
    }
}

/// Fingerprint of an encoded public key.
pub fn fingerprint(public_key: &[u8; PUBLIC_KEY_LEN]) -> Fingerprint {
    sha256(public_key)
}

/// Verify a signature given raw public key bytes, message, and signature bytes.
pub fn verify_signature(
    public_key: &[u8; PUBLIC_KEY_LEN],
    message: &[u8],
    signature: &[u8; SIGNATURE_LEN],
) -> Result<()> {
    let vk = VerifyingKey::from_bytes(public_key)
        .map_err(|_| OtrError::ZkProofFailed("signature key"))?;
    let sig = Signature::from_bytes(signature);
    vk.verify(message, &sig)
        .map_err(|_| OtrError::ZkProofFailed("signature"))
}
