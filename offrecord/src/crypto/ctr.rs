// AES-128 in counter mode with an all-zero initial counter block.
//
// Every key is used for exactly one message: the commitment key `r` encrypts
// gx once, and `c`/`c'` each encrypt one authentication block.

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// AES-128 key length in bytes.
pub const CTR_KEY_LEN: usize = 16;

const ZERO_IV: [u8; 16] = [0u8; 16];

/// A 128-bit AES-CTR key, wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CtrKey([u8; CTR_KEY_LEN]);

impl CtrKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        let mut key = [0u8; CTR_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Wrap existing key bytes.
    pub fn from_bytes(bytes: [u8; CTR_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; CTR_KEY_LEN] {
        &self.0
    }

    /// Encrypt `plaintext`. Counter mode is its own inverse.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        self.apply(plaintext)
    }

    /// Decrypt `ciphertext`.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Vec<u8> {
        self.apply(ciphertext)
    }

    fn apply(&self, data: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        let mut cipher = Aes128Ctr::new(&self.0.into(), &ZERO_IV.into());
        cipher.apply_keystream(&mut out);
        out
    }
}

impl std::fmt::Debug for CtrKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CtrKey(..)")
    }
}
