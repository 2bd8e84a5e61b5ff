mod buffer;
mod window;

pub use buffer::SequenceBuffer;
pub use window::SlidingWindow;

const SEQUENCE_HALF_RANGE: u16 = 32768;

/// Wraparound-aware ordering over 16-bit sequence numbers.
///
/// `s1` is newer than `s2` when the forward distance from `s2` to `s1` is at most half the
/// sequence space.
#[inline]
pub fn sequence_greater_than(s1: u16, s2: u16) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_HALF_RANGE))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_HALF_RANGE))
}

#[inline]
pub fn sequence_less_than(s1: u16, s2: u16) -> bool {
    sequence_greater_than(s2, s1)
}

/// Signed distance from `s2` forward to `s1`, in `[-32767, 32768]`.
#[inline]
pub fn sequence_difference(s1: u16, s2: u16) -> i32 {
    let forward = s1.wrapping_sub(s2);
    if forward <= SEQUENCE_HALF_RANGE {
        forward as i32
    } else {
        forward as i32 - 65536
    }
}

/// True when `s1` and `s2` sit exactly half the sequence space apart, where ordering is
/// ambiguous. Bounded in-flight counts keep this unreachable in a healthy session.
#[inline]
pub fn sequence_ambiguous(s1: u16, s2: u16) -> bool {
    s1.wrapping_sub(s2) == SEQUENCE_HALF_RANGE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_comparison() {
        assert!(sequence_greater_than(1, 65535));
        assert!(sequence_greater_than(100, 50));
        assert!(!sequence_greater_than(50, 100));
        assert!(!sequence_greater_than(65535, 1));
        assert!(!sequence_greater_than(7, 7));
    }

    #[test]
    fn test_sequence_less_than() {
        assert!(sequence_less_than(65535, 1));
        assert!(sequence_less_than(50, 100));
        assert!(!sequence_less_than(100, 50));
    }

    #[test]
    fn test_sequence_difference_wraps() {
        assert_eq!(sequence_difference(1, 65535), 2);
        assert_eq!(sequence_difference(65535, 1), -2);
        assert_eq!(sequence_difference(100, 100), 0);
        assert_eq!(sequence_difference(40000, 0), 40000 - 65536);
    }

    #[test]
    fn test_half_range_is_ambiguous() {
        assert!(sequence_ambiguous(32768, 0));
        assert!(sequence_ambiguous(0, 32768));
        assert!(!sequence_ambiguous(32767, 0));
    }
}
