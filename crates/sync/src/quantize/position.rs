use glam::{IVec3, Vec3};

/// Clamps `position` into `[min, max]` and rounds each axis to the nearest `1 / resolution`.
pub fn quantize_position(position: Vec3, min: Vec3, max: Vec3, resolution: f32) -> IVec3 {
    (position.clamp(min, max) * resolution).round().as_ivec3()
}

pub fn dequantize_position(position: IVec3, resolution: f32) -> Vec3 {
    position.as_vec3() / resolution
}

/// Quantizes a vector to `resolution` units with every axis clamped to `[-bound, bound]`.
pub fn quantize_vector(vector: Vec3, bound: i32, resolution: f32) -> IVec3 {
    (vector * resolution)
        .round()
        .as_ivec3()
        .clamp(IVec3::splat(-bound), IVec3::splat(bound))
}

pub fn dequantize_vector(vector: IVec3, resolution: f32) -> Vec3 {
    vector.as_vec3() / resolution
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_nearest_unit() {
        let quantized = quantize_position(
            Vec3::new(0.001, 0.00099, -0.0015),
            Vec3::splat(-1.0),
            Vec3::splat(1.0),
            512.0,
        );
        assert_eq!(quantized, IVec3::new(1, 1, -1));
    }

    #[test]
    fn nan_components_collapse_to_zero() {
        // `as` saturates and maps NaN to zero
        let quantized = quantize_vector(Vec3::new(f32::NAN, 1.0, 0.0), 10, 4.0);
        assert_eq!(quantized, IVec3::new(0, 4, 0));
    }
}
