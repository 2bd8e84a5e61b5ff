use super::BitWrite;

/// Packs bits least-significant first into a growable byte buffer.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bytes: Vec<u8>,
    scratch: u64,
    scratch_bits: u32,
    bits_written: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            ..Self::default()
        }
    }

    pub fn bytes_written(&self) -> usize {
        self.bits_written.div_ceil(8)
    }

    /// Flushes the partial byte and returns the packed buffer.
    pub fn finish(mut self) -> Vec<u8> {
        while self.scratch_bits > 0 {
            self.bytes.push(self.scratch as u8);
            self.scratch >>= 8;
            self.scratch_bits = self.scratch_bits.saturating_sub(8);
        }
        self.bytes
    }
}

impl BitWrite for BitWriter {
    fn write_bits(&mut self, value: u32, bits: u32) {
        debug_assert!(bits <= 32);
        if bits == 0 {
            return;
        }
        let mask = if bits == 32 { u32::MAX } else { (1 << bits) - 1 };
        self.scratch |= ((value & mask) as u64) << self.scratch_bits;
        self.scratch_bits += bits;
        self.bits_written += bits as usize;

        while self.scratch_bits >= 8 {
            self.bytes.push(self.scratch as u8);
            self.scratch >>= 8;
            self.scratch_bits -= 8;
        }
    }

    fn bits_written(&self) -> usize {
        self.bits_written
    }
}

/// Counts bits without storing them.
#[derive(Debug, Default, Clone, Copy)]
pub struct BitCounter {
    bits: usize,
}

impl BitCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BitWrite for BitCounter {
    #[inline]
    fn write_bits(&mut self, _value: u32, bits: u32) {
        self.bits += bits as usize;
    }

    fn bits_written(&self) -> usize {
        self.bits
    }
}
