use glam::{IVec3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::quantize::CompressedOrientation;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidBodyState {
    pub position: Vec3,
    pub orientation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    /// Coupled to the player or its active cluster this tick.
    pub interacting: bool,
}

impl Default for RigidBodyState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            interacting: false,
        }
    }
}

impl RigidBodyState {
    pub fn at_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn at_rest(&self, threshold: f32) -> bool {
        self.linear_velocity.length() < threshold && self.angular_velocity.length() < threshold
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.orientation.is_finite()
            && self.linear_velocity.is_finite()
            && self.angular_velocity.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuantizedRigidBodyState {
    pub position: IVec3,
    pub orientation: CompressedOrientation,
    pub linear_velocity: IVec3,
    pub angular_velocity: IVec3,
    pub interacting: bool,
}

impl QuantizedRigidBodyState {
    /// Resting bodies carry no velocity on the wire.
    pub fn at_rest(&self) -> bool {
        self.linear_velocity == IVec3::ZERO && self.angular_velocity == IVec3::ZERO
    }
}

/// Fixed-length array of per-object states, indexed by object index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot<T> {
    pub objects: Vec<T>,
}

pub type QuantizedSnapshot = Snapshot<QuantizedRigidBodyState>;

impl<T> Snapshot<T> {
    pub fn new(objects: Vec<T>) -> Self {
        Self { objects }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.objects.get(index)
    }
}

impl<T: Clone> Snapshot<T> {
    pub fn filled(count: usize, value: T) -> Self {
        Self {
            objects: vec![value; count],
        }
    }
}

/// One record of the live feed: the state of an object the activation system reports this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveObject {
    pub index: usize,
    pub state: RigidBodyState,
}

impl ActiveObject {
    pub fn new(index: usize, state: RigidBodyState) -> Self {
        Self { index, state }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_rest_uses_both_velocities() {
        let mut state = RigidBodyState::default();
        assert!(state.at_rest(0.05));

        state.angular_velocity = Vec3::new(0.0, 0.1, 0.0);
        assert!(!state.at_rest(0.05));

        state.angular_velocity = Vec3::ZERO;
        state.linear_velocity = Vec3::new(0.03, 0.03, 0.0);
        assert!(state.at_rest(0.05));
    }
}
