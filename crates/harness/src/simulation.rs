use glam::{Quat, Vec3};

use cubesync::{ActiveObject, RigidBodyState, Snapshot};

const GRID_SPACING: f32 = 2.5;
const CUBE_REST_HEIGHT: f32 = 0.5;
const PLAYER_ORBIT_RADIUS: f32 = 20.0;
const PLAYER_ORBIT_SPEED: f32 = 0.4;
const PUSH_RADIUS: f32 = 3.0;
const PUSH_STRENGTH: f32 = 12.0;
const LINEAR_DAMPING: f32 = 2.0;
const ANGULAR_DAMPING: f32 = 1.5;

/// Deterministic stand-in for the physics feed: a player orbits a grid of cubes and shoves the
/// ones it passes, which then slide, spin and settle.
pub struct World {
    objects: Vec<RigidBodyState>,
    player: Option<usize>,
    rest_threshold: f32,
    time: f32,
}

impl World {
    pub fn new(count: usize, player: Option<usize>, rest_threshold: f32) -> Self {
        let columns = ((count as f32).sqrt().ceil() as usize).max(1);
        let offset = (columns - 1) as f32 * GRID_SPACING * 0.5;

        let mut objects: Vec<_> = (0..count)
            .map(|i| {
                let x = (i % columns) as f32 * GRID_SPACING - offset;
                let y = (i / columns) as f32 * GRID_SPACING - offset;
                RigidBodyState::at_position(Vec3::new(x, y, CUBE_REST_HEIGHT))
            })
            .collect();

        if let Some(state) = player.and_then(|index| objects.get_mut(index)) {
            *state = RigidBodyState::at_position(Self::player_position(0.0));
            state.interacting = true;
        }

        Self {
            objects,
            player,
            rest_threshold,
            time: 0.0,
        }
    }

    fn player_position(time: f32) -> Vec3 {
        let angle = time * PLAYER_ORBIT_SPEED;
        Vec3::new(angle.cos(), angle.sin(), 0.0) * PLAYER_ORBIT_RADIUS + Vec3::Z
    }

    pub fn snapshot(&self) -> Snapshot<RigidBodyState> {
        Snapshot::new(self.objects.clone())
    }

    /// Advances the world and reports the objects that are awake this tick.
    pub fn step(&mut self, dt: f32) -> Vec<ActiveObject> {
        self.time += dt;
        let player_position = Self::player_position(self.time);

        if let Some(state) = self.player.and_then(|index| self.objects.get_mut(index)) {
            state.linear_velocity = (player_position - state.position) / dt;
            state.position = player_position;
            state.orientation = Quat::from_rotation_z(self.time * PLAYER_ORBIT_SPEED);
        }

        let mut active = Vec::new();
        for (index, state) in self.objects.iter_mut().enumerate() {
            if Some(index) == self.player {
                active.push(ActiveObject::new(index, *state));
                continue;
            }

            let away = state.position - player_position;
            let was_interacting = state.interacting;
            state.interacting = away.truncate().length() < PUSH_RADIUS;
            if state.interacting {
                let push = away.truncate().normalize_or_zero().extend(0.0);
                state.linear_velocity += push * PUSH_STRENGTH * dt;
                state.angular_velocity += Vec3::new(push.y, -push.x, 1.0) * PUSH_STRENGTH * dt;
            }

            if state.at_rest(self.rest_threshold) {
                state.linear_velocity = Vec3::ZERO;
                state.angular_velocity = Vec3::ZERO;
                if state.interacting != was_interacting {
                    active.push(ActiveObject::new(index, *state));
                }
                continue;
            }

            state.position += state.linear_velocity * dt;
            state.position.z = state.position.z.max(CUBE_REST_HEIGHT);
            state.orientation =
                (Quat::from_scaled_axis(state.angular_velocity * dt) * state.orientation).normalize();
            state.linear_velocity *= (1.0 - LINEAR_DAMPING * dt).max(0.0);
            state.angular_velocity *= (1.0 - ANGULAR_DAMPING * dt).max(0.0);

            active.push(ActiveObject::new(index, *state));
        }
        active
    }
}
