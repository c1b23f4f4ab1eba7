use crate::characteristic::CharacteristicId;
use crate::error::{DecodeError, Result};

/// The binary contract of a single characteristic.
///
/// `decode(&value.encode())` returns `value` for every representable value. Decoding a
/// fixed-size characteristic fails with a length mismatch unless the buffer is exactly
/// [`CharacteristicId::size()`] bytes long; every buffer of the right length decodes to some
/// value.
pub trait Codec: Sized {
    /// The characteristic this value is read from or written to.
    const CHARACTERISTIC: CharacteristicId;

    /// Serializes the value into the characteristic's byte layout.
    fn encode(&self) -> Vec<u8>;

    /// Parses a value from the characteristic's byte layout.
    fn decode(bytes: &[u8]) -> Result<Self>;
}

/// A little-endian cursor over a characteristic payload.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> Reader<'a> {
    /// Creates a reader for a variable-size payload.
    pub fn new(data: &'a [u8], context: &'static str) -> Self {
        Self {
            data,
            pos: 0,
            context,
        }
    }

    /// Creates a reader for a fixed-size characteristic, rejecting buffers of any other length.
    pub fn fixed(data: &'a [u8], id: CharacteristicId) -> Result<Self> {
        let expected = id.size().unwrap_or(data.len());
        if data.len() != expected {
            return Err(DecodeError::length_mismatch(id.name(), expected, data.len()));
        }
        Ok(Self::new(data, id.name()))
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(DecodeError::truncated(
                self.context,
                self.pos + n,
                self.data.len(),
            ));
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        self.array().map(u16::from_le_bytes)
    }

    pub fn i16(&mut self) -> Result<i16> {
        self.array().map(i16::from_le_bytes)
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.array().map(u32::from_le_bytes)
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.array().map(u64::from_le_bytes)
    }

    pub fn f32(&mut self) -> Result<f32> {
        self.array().map(f32::from_le_bytes)
    }

    /// Consumes and returns everything after the cursor.
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }
}
