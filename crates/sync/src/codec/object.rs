use glam::{IVec3, Quat, Vec3};

use super::{CodecError, DeltaMode};
use crate::bitstream::{BitReader, BitWrite, StreamError};
use crate::config::{CodecConfig, RelativeBounds};
use crate::quantize::{CompressedOrientation, Quantizer};
use crate::state::{QuantizedRigidBodyState, RigidBodyState};

/// Range of offsets the two-tier relative code can carry.
fn offset_range(bounds: RelativeBounds) -> (i32, i32) {
    let spill = bounds.small - 1;
    (-bounds.large - spill, bounds.large - 1 + spill)
}

fn offset_fits(offset: i32, bounds: RelativeBounds) -> bool {
    let (min, max) = offset_range(bounds);
    (min..=max).contains(&offset)
}

fn is_small(offset: i32, bounds: RelativeBounds) -> bool {
    (-bounds.small..bounds.small).contains(&offset)
}

/// Writes an offset known to be outside the small tier. The large tier is shifted past the
/// small one so no value is coded twice.
fn write_large_offset<W: BitWrite>(writer: &mut W, offset: i32, bounds: RelativeBounds) {
    let shifted = if offset > 0 {
        offset - (bounds.small - 1)
    } else {
        offset + (bounds.small - 1)
    };
    writer.write_bounded(shifted, -bounds.large, bounds.large - 1);
}

fn read_large_offset(reader: &mut BitReader<'_>, bounds: RelativeBounds) -> Result<i32, StreamError> {
    let shifted = reader.read_bounded(-bounds.large, bounds.large - 1)?;
    Ok(if shifted >= 0 {
        shifted + (bounds.small - 1)
    } else {
        shifted - (bounds.small - 1)
    })
}

fn write_offsets<W: BitWrite>(writer: &mut W, offsets: [i32; 3], bounds: RelativeBounds) {
    let small = offsets.map(|offset| is_small(offset, bounds));
    for flag in small {
        writer.write_bool(flag);
    }
    for (offset, small) in offsets.into_iter().zip(small) {
        if small {
            writer.write_bounded(offset, -bounds.small, bounds.small - 1);
        } else {
            write_large_offset(writer, offset, bounds);
        }
    }
}

fn read_offsets(reader: &mut BitReader<'_>, bounds: RelativeBounds) -> Result<[i32; 3], StreamError> {
    let small = [reader.read_bool()?, reader.read_bool()?, reader.read_bool()?];
    let mut offsets = [0; 3];
    for (offset, small) in offsets.iter_mut().zip(small) {
        *offset = if small {
            reader.read_bounded(-bounds.small, bounds.small - 1)?
        } else {
            read_large_offset(reader, bounds)?
        };
    }
    Ok(offsets)
}

/// Field-level encoders shared by every snapshot mode.
#[derive(Debug, Clone)]
pub struct FieldCoder {
    position_min: IVec3,
    position_max: IVec3,
    linear_bound: i32,
    angular_bound: i32,
    orientation_bits: u32,
    relative_position: RelativeBounds,
    relative_orientation: RelativeBounds,
}

impl FieldCoder {
    pub fn new(quantizer: &Quantizer, config: &CodecConfig) -> Self {
        let (position_min, position_max) = quantizer.position_bounds();
        Self {
            position_min,
            position_max,
            linear_bound: quantizer.linear_velocity_bound(),
            angular_bound: quantizer.angular_velocity_bound(),
            orientation_bits: quantizer.orientation_bits(),
            relative_position: config.relative_position,
            relative_orientation: config.relative_orientation,
        }
    }

    fn write_position<W: BitWrite>(&self, writer: &mut W, position: IVec3) {
        for axis in 0..3 {
            writer.write_bounded(position[axis], self.position_min[axis], self.position_max[axis]);
        }
    }

    fn read_position(&self, reader: &mut BitReader<'_>) -> Result<IVec3, StreamError> {
        let mut position = IVec3::ZERO;
        for axis in 0..3 {
            position[axis] =
                reader.read_bounded(self.position_min[axis], self.position_max[axis])?;
        }
        Ok(position)
    }

    fn write_orientation<W: BitWrite>(&self, writer: &mut W, orientation: &CompressedOrientation) {
        writer.write_bits(orientation.largest as u32, 2);
        for component in orientation.components() {
            writer.write_bits(component as u32, self.orientation_bits);
        }
    }

    fn read_orientation(&self, reader: &mut BitReader<'_>) -> Result<CompressedOrientation, StreamError> {
        let largest = reader.read_bits(2)? as u8;
        let mut components = [0u16; 3];
        for component in &mut components {
            *component = reader.read_bits(self.orientation_bits)? as u16;
        }
        Ok(CompressedOrientation::with_components(largest, components))
    }

    fn write_velocity<W: BitWrite>(&self, writer: &mut W, state: &QuantizedRigidBodyState) {
        let at_rest = state.at_rest();
        writer.write_bool(at_rest);
        if at_rest {
            return;
        }
        for (velocity, bound) in [
            (state.linear_velocity, self.linear_bound),
            (state.angular_velocity, self.angular_bound),
        ] {
            for axis in 0..3 {
                writer.write_bounded(velocity[axis], -bound, bound);
            }
        }
    }

    fn read_velocity(&self, reader: &mut BitReader<'_>) -> Result<(IVec3, IVec3), StreamError> {
        if reader.read_bool()? {
            return Ok((IVec3::ZERO, IVec3::ZERO));
        }
        let mut read_vector = |bound: i32| -> Result<IVec3, StreamError> {
            Ok(IVec3::new(
                reader.read_bounded(-bound, bound)?,
                reader.read_bounded(-bound, bound)?,
                reader.read_bounded(-bound, bound)?,
            ))
        };
        let linear = read_vector(self.linear_bound)?;
        let angular = read_vector(self.angular_bound)?;
        Ok((linear, angular))
    }

    /// Full quantized state with no baseline.
    pub fn write_state<W: BitWrite>(&self, writer: &mut W, state: &QuantizedRigidBodyState) {
        writer.write_bool(state.interacting);
        self.write_position(writer, state.position);
        self.write_orientation(writer, &state.orientation);
        self.write_velocity(writer, state);
    }

    pub fn read_state(&self, reader: &mut BitReader<'_>) -> Result<QuantizedRigidBodyState, CodecError> {
        let interacting = reader.read_bool()?;
        let position = self.read_position(reader)?;
        let orientation = self.read_orientation(reader)?;
        let (linear_velocity, angular_velocity) = self.read_velocity(reader)?;
        Ok(QuantizedRigidBodyState {
            position,
            orientation,
            linear_velocity,
            angular_velocity,
            interacting,
        })
    }

    pub fn write_uncompressed<W: BitWrite>(&self, writer: &mut W, state: &RigidBodyState) {
        writer.write_bool(state.interacting);
        for value in state.position.to_array() {
            writer.write_f32(value);
        }
        for value in state.orientation.to_array() {
            writer.write_f32(value);
        }
        for value in state
            .linear_velocity
            .to_array()
            .into_iter()
            .chain(state.angular_velocity.to_array())
        {
            writer.write_f32(value);
        }
    }

    pub fn read_uncompressed(&self, reader: &mut BitReader<'_>) -> Result<RigidBodyState, CodecError> {
        let interacting = reader.read_bool()?;
        let mut values = [0.0f32; 13];
        for value in &mut values {
            *value = reader.read_f32()?;
            if !value.is_finite() {
                return Err(CodecError::InvalidFloat);
            }
        }
        let [px, py, pz, qx, qy, qz, qw, lx, ly, lz, ax, ay, az] = values;
        Ok(RigidBodyState {
            position: Vec3::new(px, py, pz),
            orientation: Quat::from_xyzw(qx, qy, qz, qw),
            linear_velocity: Vec3::new(lx, ly, lz),
            angular_velocity: Vec3::new(ax, ay, az),
            interacting,
        })
    }

    /// Payload of an object that differs from its baseline. Only the fields that changed are
    /// written, relative to the baseline when `mode` allows and the offset fits.
    pub fn write_changed<W: BitWrite>(
        &self,
        writer: &mut W,
        mode: DeltaMode,
        state: &QuantizedRigidBodyState,
        base: &QuantizedRigidBodyState,
    ) {
        let position_changed = state.position != base.position;
        let orientation_changed = state.orientation != base.orientation;

        writer.write_bool(state.interacting);
        writer.write_bool(position_changed);
        writer.write_bool(orientation_changed);

        if position_changed {
            if mode.relative_position() {
                self.write_relative_position(writer, state.position, base.position);
            } else {
                self.write_position(writer, state.position);
            }
        }

        if orientation_changed {
            if mode.relative_orientation() {
                self.write_relative_orientation(writer, &state.orientation, &base.orientation);
            } else {
                self.write_orientation(writer, &state.orientation);
            }
        }

        self.write_velocity(writer, state);
    }

    pub fn read_changed(
        &self,
        reader: &mut BitReader<'_>,
        mode: DeltaMode,
        base: &QuantizedRigidBodyState,
    ) -> Result<QuantizedRigidBodyState, CodecError> {
        let interacting = reader.read_bool()?;
        let position_changed = reader.read_bool()?;
        let orientation_changed = reader.read_bool()?;

        let position = match (position_changed, mode.relative_position()) {
            (false, _) => base.position,
            (true, true) => self.read_relative_position(reader, base.position)?,
            (true, false) => self.read_position(reader)?,
        };

        let orientation = match (orientation_changed, mode.relative_orientation()) {
            (false, _) => base.orientation,
            (true, true) => self.read_relative_orientation(reader, &base.orientation)?,
            (true, false) => self.read_orientation(reader)?,
        };

        let (linear_velocity, angular_velocity) = self.read_velocity(reader)?;

        Ok(QuantizedRigidBodyState {
            position,
            orientation,
            linear_velocity,
            angular_velocity,
            interacting,
        })
    }

    fn write_relative_position<W: BitWrite>(&self, writer: &mut W, position: IVec3, base: IVec3) {
        let offset = position - base;
        let relative = offset
            .to_array()
            .iter()
            .all(|&axis| offset_fits(axis, self.relative_position));

        writer.write_bool(relative);
        if relative {
            write_offsets(writer, offset.to_array(), self.relative_position);
        } else {
            self.write_position(writer, position);
        }
    }

    fn read_relative_position(&self, reader: &mut BitReader<'_>, base: IVec3) -> Result<IVec3, CodecError> {
        if !reader.read_bool()? {
            return Ok(self.read_position(reader)?);
        }
        let offset = IVec3::from_array(read_offsets(reader, self.relative_position)?);
        let position = base + offset;
        if position.cmplt(self.position_min).any() || position.cmpgt(self.position_max).any() {
            return Err(CodecError::PositionOutOfBounds(position));
        }
        Ok(position)
    }

    fn write_relative_orientation<W: BitWrite>(
        &self,
        writer: &mut W,
        orientation: &CompressedOrientation,
        base: &CompressedOrientation,
    ) {
        let current = orientation.components();
        let previous = base.components();
        let offsets = [0, 1, 2].map(|i| current[i] as i32 - previous[i] as i32);
        let relative = orientation.largest == base.largest
            && offsets
                .iter()
                .all(|&offset| offset_fits(offset, self.relative_orientation));

        writer.write_bool(relative);
        if relative {
            write_offsets(writer, offsets, self.relative_orientation);
        } else {
            self.write_orientation(writer, orientation);
        }
    }

    fn read_relative_orientation(
        &self,
        reader: &mut BitReader<'_>,
        base: &CompressedOrientation,
    ) -> Result<CompressedOrientation, CodecError> {
        if !reader.read_bool()? {
            return Ok(self.read_orientation(reader)?);
        }
        let offsets = read_offsets(reader, self.relative_orientation)?;
        let max = ((1u32 << self.orientation_bits) - 1) as i32;
        let previous = base.components();
        let mut components = [0u16; 3];
        for i in 0..3 {
            let value = previous[i] as i32 + offsets[i];
            if !(0..=max).contains(&value) {
                return Err(StreamError::OutOfRange {
                    value: value as i64,
                    min: 0,
                    max,
                }
                .into());
            }
            components[i] = value as u16;
        }
        Ok(CompressedOrientation::with_components(base.largest, components))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::{BitCounter, BitWriter};
    use crate::config::QuantizationConfig;

    fn coder() -> FieldCoder {
        FieldCoder::new(
            &Quantizer::new(&QuantizationConfig::default()),
            &CodecConfig::default(),
        )
    }

    fn state(position: IVec3) -> QuantizedRigidBodyState {
        QuantizedRigidBodyState {
            position,
            orientation: CompressedOrientation::with_components(3, [255, 255, 255]),
            linear_velocity: IVec3::ZERO,
            angular_velocity: IVec3::ZERO,
            interacting: false,
        }
    }

    fn round_trip_changed(
        mode: DeltaMode,
        current: &QuantizedRigidBodyState,
        base: &QuantizedRigidBodyState,
    ) -> (QuantizedRigidBodyState, usize) {
        let coder = coder();
        let mut writer = BitWriter::new();
        coder.write_changed(&mut writer, mode, current, base);
        let bits = writer.bits_written();
        let bytes = writer.finish();
        let decoded = coder
            .read_changed(&mut BitReader::new(&bytes), mode, base)
            .unwrap();
        (decoded, bits)
    }

    #[test]
    fn offset_tiers_cover_range_without_gaps() {
        let bounds = RelativeBounds::new(16, 256);
        let (min, max) = offset_range(bounds);
        assert_eq!((min, max), (-271, 270));

        for offset in min..=max {
            let mut writer = BitWriter::new();
            write_offsets(&mut writer, [offset, 0, -7], bounds);
            let bytes = writer.finish();
            let decoded = read_offsets(&mut BitReader::new(&bytes), bounds).unwrap();
            assert_eq!(decoded, [offset, 0, -7]);
        }
    }

    #[test]
    fn small_offsets_are_cheaper() {
        let base = state(IVec3::new(0, 0, 512));
        let (near, near_bits) =
            round_trip_changed(DeltaMode::RelativePosition, &state(IVec3::new(10, 0, 512)), &base);
        let (far, far_bits) =
            round_trip_changed(DeltaMode::RelativePosition, &state(IVec3::new(200, 0, 512)), &base);
        let (absolute, absolute_bits) = round_trip_changed(
            DeltaMode::RelativePosition,
            &state(IVec3::new(5000, 0, 512)),
            &base,
        );

        assert_eq!(near.position, IVec3::new(10, 0, 512));
        assert_eq!(far.position, IVec3::new(200, 0, 512));
        assert_eq!(absolute.position, IVec3::new(5000, 0, 512));
        assert!(near_bits < far_bits);
        assert!(far_bits < absolute_bits);
    }

    #[test]
    fn orientation_falls_back_when_largest_differs() {
        let base = state(IVec3::ZERO);
        let mut current = base;
        current.orientation = CompressedOrientation::with_components(2, [256, 250, 260]);

        let (decoded, _) = round_trip_changed(DeltaMode::RelativeOrientation, &current, &base);
        assert_eq!(decoded.orientation, current.orientation);

        current.orientation = CompressedOrientation::with_components(3, [260, 250, 256]);
        let (decoded, _) = round_trip_changed(DeltaMode::RelativeOrientation, &current, &base);
        assert_eq!(decoded.orientation, current.orientation);
    }

    #[test]
    fn unchanged_fields_come_from_base() {
        let base = state(IVec3::new(100, 100, 100));
        let mut current = base;
        current.interacting = true;
        current.linear_velocity = IVec3::new(0, 0, -512);

        let (decoded, bits) = round_trip_changed(DeltaMode::NotChanged, &current, &base);
        assert_eq!(decoded, current);
        // three flags, at-rest bit, six velocity axes
        let linear = crate::bitstream::bits_required(-8192, 8192) as usize;
        let angular = crate::bitstream::bits_required(-4096, 4096) as usize;
        assert_eq!(bits, 4 + 3 * linear + 3 * angular);
    }

    #[test]
    fn relative_offset_leaving_world_is_rejected() {
        let coder = coder();
        let mut writer = BitWriter::new();
        // hand-built relative position: z offset of -10 from z = 0
        writer.write_bool(false);
        writer.write_bool(true);
        writer.write_bool(false);
        writer.write_bool(true);
        writer.write_bool(true);
        writer.write_bool(true);
        writer.write_bool(true);
        writer.write_bounded(0, -16, 15);
        writer.write_bounded(0, -16, 15);
        writer.write_bounded(-10, -16, 15);
        writer.write_bool(true);
        let bytes = writer.finish();

        let result = coder.read_changed(
            &mut BitReader::new(&bytes),
            DeltaMode::RelativePosition,
            &state(IVec3::ZERO),
        );
        assert!(matches!(result, Err(CodecError::PositionOutOfBounds(_))));
    }

    #[test]
    fn state_cost_matches_field_widths() {
        let coder = coder();
        let mut counter = BitCounter::new();
        coder.write_state(&mut counter, &state(IVec3::ZERO));
        // interacting, 17 + 17 + 15 position bits, 2 + 27 orientation bits, at-rest bit
        assert_eq!(counter.bits_written(), 1 + 17 + 17 + 15 + 29 + 1);
    }
}
