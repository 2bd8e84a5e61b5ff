use super::{StreamError, bits_required};

#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    bytes: &'a [u8],
    byte_index: usize,
    scratch: u64,
    scratch_bits: u32,
    bits_read: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            byte_index: 0,
            scratch: 0,
            scratch_bits: 0,
            bits_read: 0,
        }
    }

    pub fn bits_read(&self) -> usize {
        self.bits_read
    }

    pub fn bits_remaining(&self) -> usize {
        self.bytes.len() * 8 - self.bits_read
    }

    pub fn read_bits(&mut self, bits: u32) -> Result<u32, StreamError> {
        debug_assert!(bits <= 32);
        if bits == 0 {
            return Ok(0);
        }
        let remaining = self.bits_remaining();
        if bits as usize > remaining {
            return Err(StreamError::Overflow {
                requested: bits,
                remaining,
            });
        }

        while self.scratch_bits < bits {
            self.scratch |= (self.bytes[self.byte_index] as u64) << self.scratch_bits;
            self.byte_index += 1;
            self.scratch_bits += 8;
        }

        let mask = if bits == 32 { u32::MAX as u64 } else { (1u64 << bits) - 1 };
        let value = (self.scratch & mask) as u32;
        self.scratch >>= bits;
        self.scratch_bits -= bits;
        self.bits_read += bits as usize;
        Ok(value)
    }

    pub fn read_bool(&mut self) -> Result<bool, StreamError> {
        Ok(self.read_bits(1)? != 0)
    }

    pub fn read_bounded(&mut self, min: i32, max: i32) -> Result<i32, StreamError> {
        let raw = self.read_bits(bits_required(min, max))?;
        let value = min as i64 + raw as i64;
        if value > max as i64 {
            return Err(StreamError::OutOfRange { value, min, max });
        }
        Ok(value as i32)
    }

    pub fn read_u16(&mut self) -> Result<u16, StreamError> {
        Ok(self.read_bits(16)? as u16)
    }

    pub fn read_f32(&mut self) -> Result<f32, StreamError> {
        Ok(f32::from_bits(self.read_bits(32)?))
    }
}
