//! Bit-packed, non byte-aligned streams.
//!
//! Every encoder is written once against [`BitWrite`], so the same code path produces packets
//! ([`BitWriter`]) and measures their exact cost ([`BitCounter`]). [`BitReader`] mirrors the
//! writer and fails fast on truncated input or out-of-range bounded integers.

mod reader;
mod writer;

pub use reader::BitReader;
pub use writer::{BitCounter, BitWriter};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("stream overflow: requested {requested} bits with {remaining} remaining")]
    Overflow { requested: u32, remaining: usize },
    #[error("bounded value {value} outside [{min}, {max}]")]
    OutOfRange { value: i64, min: i32, max: i32 },
}

/// Number of bits needed to store any integer in `[min, max]`.
#[inline]
pub const fn bits_required(min: i32, max: i32) -> u32 {
    let range = max.abs_diff(min);
    if max <= min {
        0
    } else {
        32 - range.leading_zeros()
    }
}

pub trait BitWrite {
    /// Appends the low `bits` bits of `value`. `bits` must be in `0..=32`.
    fn write_bits(&mut self, value: u32, bits: u32);

    fn bits_written(&self) -> usize;

    #[inline]
    fn write_bool(&mut self, value: bool) {
        self.write_bits(value as u32, 1);
    }

    /// Writes `value` relative to `min` using `bits_required(min, max)` bits.
    #[inline]
    fn write_bounded(&mut self, value: i32, min: i32, max: i32) {
        debug_assert!(
            value >= min && value <= max,
            "{value} outside [{min}, {max}]"
        );
        let value = value.clamp(min, max);
        self.write_bits(value.abs_diff(min), bits_required(min, max));
    }

    #[inline]
    fn write_u16(&mut self, value: u16) {
        self.write_bits(value as u32, 16);
    }

    #[inline]
    fn write_f32(&mut self, value: f32) {
        self.write_bits(value.to_bits(), 32);
    }
}
