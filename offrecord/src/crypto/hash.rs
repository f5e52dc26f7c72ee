// SHA-256 and HMAC-SHA256 helpers.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::{OtrError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Length of the truncated MAC carried in Reveal-Signature and Signature messages.
pub const MAC160_LEN: usize = 20;

/// SHA-256 hash of `data`, returning a 32-byte digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256 over a one-byte domain tag followed by `data`.
pub fn sha256_tagged(tag: u8, data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([tag]);
    hasher.update(data);
    hasher.finalize().into()
}

/// Full 32-byte HMAC-SHA256 of `data` under `key`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| OtrError::InvalidKey(format!("hmac key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// HMAC-SHA256 truncated to its first 160 bits.
pub fn hmac_sha256_160(key: &[u8], data: &[u8]) -> Result<[u8; MAC160_LEN]> {
    let full = hmac_sha256(key, data)?;
    let mut out = [0u8; MAC160_LEN];
    out.copy_from_slice(&full[..MAC160_LEN]);
    Ok(out)
}

/// Constant-time check of a truncated 160-bit MAC.
pub fn verify_hmac_sha256_160(key: &[u8], data: &[u8], tag: &[u8; MAC160_LEN]) -> Result<()> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| OtrError::InvalidKey(format!("hmac key: {e}")))?;
    mac.update(data);
    mac.verify_truncated_left(tag)
        .map_err(|_| OtrError::ZkProofFailed("message authentication code"))
}
