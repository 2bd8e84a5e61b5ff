//! Lossy float to bounded-integer transforms.
//!
//! Out-of-range input is clamped, never rejected: a body that leaves the world box is pinned to
//! its boundary on the wire.

mod orientation;
mod position;

pub use orientation::{CompressedOrientation, ORIENTATION_COMPONENT_MAX};
pub use position::{dequantize_position, dequantize_vector, quantize_position, quantize_vector};

use glam::{IVec3, Vec3};

use crate::config::QuantizationConfig;
use crate::state::{QuantizedRigidBodyState, QuantizedSnapshot, RigidBodyState, Snapshot};

#[derive(Debug, Clone)]
pub struct Quantizer {
    config: QuantizationConfig,
    position_min: IVec3,
    position_max: IVec3,
    linear_bound: i32,
    angular_bound: i32,
}

impl Quantizer {
    pub fn new(config: &QuantizationConfig) -> Self {
        let resolution = config.position_resolution;
        Self {
            position_min: (config.position_min * resolution).round().as_ivec3(),
            position_max: (config.position_max * resolution).round().as_ivec3(),
            linear_bound: (config.max_linear_velocity * config.velocity_resolution).round() as i32,
            angular_bound: (config.max_angular_velocity * config.velocity_resolution).round()
                as i32,
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &QuantizationConfig {
        &self.config
    }

    pub fn orientation_bits(&self) -> u32 {
        self.config.orientation_bits
    }

    /// Inclusive integer bounds of a quantized position.
    pub fn position_bounds(&self) -> (IVec3, IVec3) {
        (self.position_min, self.position_max)
    }

    pub fn position_in_bounds(&self, position: IVec3) -> bool {
        position.cmpge(self.position_min).all() && position.cmple(self.position_max).all()
    }

    pub fn linear_velocity_bound(&self) -> i32 {
        self.linear_bound
    }

    pub fn angular_velocity_bound(&self) -> i32 {
        self.angular_bound
    }

    pub fn quantize_position(&self, position: Vec3) -> IVec3 {
        quantize_position(
            position,
            self.config.position_min,
            self.config.position_max,
            self.config.position_resolution,
        )
        .clamp(self.position_min, self.position_max)
    }

    pub fn dequantize_position(&self, position: IVec3) -> Vec3 {
        dequantize_position(position, self.config.position_resolution)
    }

    pub fn quantize_state(&self, state: &RigidBodyState) -> QuantizedRigidBodyState {
        let resolution = self.config.velocity_resolution;
        let (linear_velocity, angular_velocity) = if state.at_rest(self.config.at_rest_threshold) {
            (IVec3::ZERO, IVec3::ZERO)
        } else {
            (
                quantize_vector(state.linear_velocity, self.linear_bound, resolution),
                quantize_vector(state.angular_velocity, self.angular_bound, resolution),
            )
        };

        QuantizedRigidBodyState {
            position: self.quantize_position(state.position),
            orientation: CompressedOrientation::compress(
                state.orientation,
                self.config.orientation_bits,
            ),
            linear_velocity,
            angular_velocity,
            interacting: state.interacting,
        }
    }

    pub fn dequantize_state(&self, state: &QuantizedRigidBodyState) -> RigidBodyState {
        let resolution = self.config.velocity_resolution;
        RigidBodyState {
            position: self.dequantize_position(state.position),
            orientation: state.orientation.decompress(self.config.orientation_bits),
            linear_velocity: dequantize_vector(state.linear_velocity, resolution),
            angular_velocity: dequantize_vector(state.angular_velocity, resolution),
            interacting: state.interacting,
        }
    }

    pub fn quantize_snapshot(&self, snapshot: &Snapshot<RigidBodyState>) -> QuantizedSnapshot {
        Snapshot::new(
            snapshot
                .objects
                .iter()
                .map(|state| self.quantize_state(state))
                .collect(),
        )
    }
}
