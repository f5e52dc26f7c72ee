// OTR primitive data types: BYTE, SHORT, INT, DATA, MPI and fixed-length MAC.
//
// All multi-byte integers are big-endian. MPIs carry a 4-byte length followed
// by the minimal big-endian magnitude (zero has length 0). The same encoding
// feeds the hashes and MACs of both engines, so it must be byte-exact.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_bigint::BigUint;

use crate::error::{OtrError, Result};

/// Append-only writer for OTR data types.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_byte(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    pub fn write_short(&mut self, value: u16) -> &mut Self {
        self.buf.put_u16(value);
        self
    }

    pub fn write_int(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32(value);
        self
    }

    /// Length-prefixed opaque bytes.
    pub fn write_data(&mut self, data: &[u8]) -> &mut Self {
        self.buf.put_u32(data.len() as u32);
        self.buf.put_slice(data);
        self
    }

    /// Length-prefixed minimal big-endian integer.
    pub fn write_mpi(&mut self, value: &BigUint) -> &mut Self {
        let magnitude = mpi_magnitude(value);
        self.write_data(&magnitude)
    }

    /// Count-prefixed sequence of MPIs, as used in SMP TLV payloads.
    pub fn write_mpi_sequence(&mut self, values: &[&BigUint]) -> &mut Self {
        self.buf.put_u32(values.len() as u32);
        for value in values {
            self.write_mpi(value);
        }
        self
    }

    /// Raw bytes without a length prefix (fixed-length fields).
    pub fn write_raw(&mut self, data: &[u8]) -> &mut Self {
        self.buf.put_slice(data);
        self
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.buf.to_vec()
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Encoded MPI of a single value, the `secbytes` input to key derivation.
pub fn mpi_bytes(value: &BigUint) -> Vec<u8> {
    Encoder::new().write_mpi(value).to_vec()
}

fn mpi_magnitude(value: &BigUint) -> Vec<u8> {
    if value.bits() == 0 {
        Vec::new()
    } else {
        value.to_bytes_be()
    }
}

/// Cursor over an encoded buffer. Every read is bounds-checked.
#[derive(Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn ensure_len(&self, needed: usize, context: &str) -> Result<()> {
        if self.data.len() < needed {
            Err(OtrError::MalformedMessage(format!(
                "{context}: need {needed} bytes, have {}",
                self.data.len()
            )))
        } else {
            Ok(())
        }
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        self.ensure_len(1, "BYTE")?;
        Ok(self.data.get_u8())
    }

    pub fn read_short(&mut self) -> Result<u16> {
        self.ensure_len(2, "SHORT")?;
        Ok(self.data.get_u16())
    }

    pub fn read_int(&mut self) -> Result<u32> {
        self.ensure_len(4, "INT")?;
        Ok(self.data.get_u32())
    }

    pub fn read_data(&mut self) -> Result<&'a [u8]> {
        let len = self.read_int()? as usize;
        self.read_raw(len)
    }

    pub fn read_mpi(&mut self) -> Result<BigUint> {
        let magnitude = self.read_data()?;
        Ok(BigUint::from_bytes_be(magnitude))
    }

    /// Read a count-prefixed MPI sequence, requiring exactly `expected` entries.
    pub fn read_mpi_sequence(&mut self, expected: usize) -> Result<Vec<BigUint>> {
        let count = self.read_int()? as usize;
        if count != expected {
            return Err(OtrError::MalformedMessage(format!(
                "expected {expected} MPIs, got {count}"
            )));
        }
        (0..count).map(|_| self.read_mpi()).collect()
    }

    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure_len(len, "raw")?;
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    /// Read exactly `N` raw bytes into an array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let raw = self.read_raw(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(raw);
        Ok(out)
    }

    /// Read a DATA field that must be exactly `N` bytes long.
    pub fn read_data_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let raw = self.read_data()?;
        if raw.len() != N {
            return Err(OtrError::MalformedMessage(format!(
                "expected {N}-byte field, got {}",
                raw.len()
            )));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(raw);
        Ok(out)
    }

    /// Fail if unread bytes remain.
    pub fn finish(&self) -> Result<()> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(OtrError::MalformedMessage(format!(
                "{} trailing bytes",
                self.data.len()
            )))
        }
    }
}
