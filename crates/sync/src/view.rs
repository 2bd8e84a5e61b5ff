use glam::{Quat, Vec3};

use crate::config::ViewConfig;
use crate::state::RigidBodyState;

/// Per-object output consumed by a view or render layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectUpdate {
    /// Object index plus one; zero is reserved by the view layer.
    pub id: u32,
    pub position: Vec3,
    pub orientation: Quat,
    pub scale: f32,
    /// Player that currently owns the object, if any.
    pub authority: Option<u8>,
    pub visible: bool,
}

impl ObjectUpdate {
    pub fn from_state(
        index: usize,
        state: &RigidBodyState,
        player_index: Option<usize>,
        view: &ViewConfig,
    ) -> Self {
        Self {
            id: index as u32 + 1,
            position: state.position,
            orientation: state.orientation,
            scale: if player_index == Some(index) {
                view.player_scale
            } else {
                view.object_scale
            },
            authority: state.interacting.then_some(0),
            visible: true,
        }
    }
}
