// Crypto module declarations

pub mod ctr;
pub mod dh;
pub mod hash;
pub mod kdf;
pub mod keys;
