use glam::Quat;

/// Bound on each of the three transmitted components. The dropped component has the largest
/// magnitude, so the others cannot exceed `1/√2`.
pub const ORIENTATION_COMPONENT_MAX: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Smallest-three quaternion code.
///
/// `largest` is the index (x, y, z, w order) of the dropped component; `a`, `b`, `c` are the
/// remaining components in order, each quantized to the configured bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressedOrientation {
    pub largest: u8,
    pub a: u16,
    pub b: u16,
    pub c: u16,
}

#[inline]
fn component_scale(bits: u32) -> f32 {
    ((1u32 << bits) - 1) as f32
}

impl CompressedOrientation {
    pub fn compress(orientation: Quat, bits: u32) -> Self {
        debug_assert!((2..=10).contains(&bits));
        let length = orientation.length();
        let mut q = if length.is_finite() && length > f32::EPSILON {
            (orientation / length).to_array()
        } else {
            Quat::IDENTITY.to_array()
        };

        let mut largest = 0;
        for i in 1..4 {
            if q[i].abs() > q[largest].abs() {
                largest = i;
            }
        }

        // q and -q are the same rotation; keep the dropped component non-negative
        if q[largest] < 0.0 {
            q = q.map(|v| -v);
        }

        let scale = component_scale(bits);
        let mut encoded = [0u16; 3];
        for (slot, value) in encoded
            .iter_mut()
            .zip(q.iter().enumerate().filter(|(i, _)| *i != largest).map(|(_, v)| *v))
        {
            let normalized = (value + ORIENTATION_COMPONENT_MAX) / (2.0 * ORIENTATION_COMPONENT_MAX);
            *slot = (normalized * scale + 0.5).floor().clamp(0.0, scale) as u16;
        }

        Self {
            largest: largest as u8,
            a: encoded[0],
            b: encoded[1],
            c: encoded[2],
        }
    }

    pub fn decompress(&self, bits: u32) -> Quat {
        let scale = component_scale(bits);
        let decode = |v: u16| {
            (v as f32 / scale) * (2.0 * ORIENTATION_COMPONENT_MAX) - ORIENTATION_COMPONENT_MAX
        };
        let (a, b, c) = (decode(self.a), decode(self.b), decode(self.c));
        let dropped = (1.0 - a * a - b * b - c * c).max(0.0).sqrt();

        let components = match self.largest {
            0 => [dropped, a, b, c],
            1 => [a, dropped, b, c],
            2 => [a, b, dropped, c],
            _ => [a, b, c, dropped],
        };
        Quat::from_array(components).normalize()
    }

    pub fn components(&self) -> [u16; 3] {
        [self.a, self.b, self.c]
    }

    pub fn with_components(largest: u8, [a, b, c]: [u16; 3]) -> Self {
        Self { largest, a, b, c }
    }

    /// Packs into `2 + 3 * bits` bits: `largest` in the top two, then `a`, `b`, `c`.
    pub fn pack(&self, bits: u32) -> u32 {
        let mask = (1u32 << bits) - 1;
        ((self.largest as u32 & 0b11) << (3 * bits))
            | ((self.a as u32 & mask) << (2 * bits))
            | ((self.b as u32 & mask) << bits)
            | (self.c as u32 & mask)
    }

    pub fn unpack(packed: u32, bits: u32) -> Self {
        let mask = (1u32 << bits) - 1;
        Self {
            largest: ((packed >> (3 * bits)) & 0b11) as u8,
            a: ((packed >> (2 * bits)) & mask) as u16,
            b: ((packed >> bits) & mask) as u16,
            c: (packed & mask) as u16,
        }
    }
}
