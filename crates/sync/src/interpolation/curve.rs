use glam::{Quat, Vec3};

use crate::state::RigidBodyState;

/// Cubic Hermite spline between `p0` and `p1` with tangents `t0` and `t1`.
pub fn hermite(t: f32, p0: Vec3, p1: Vec3, t0: Vec3, t1: Vec3) -> Vec3 {
    let t2 = t * t;
    let t3 = t2 * t;
    let h1 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h2 = -2.0 * t3 + 3.0 * t2;
    let h3 = t3 - 2.0 * t2 + t;
    let h4 = t3 - t2;
    p0 * h1 + p1 * h2 + t0 * h3 + t1 * h4
}

/// Shortest-arc slerp.
pub fn slerp(a: Quat, b: Quat, t: f32) -> Quat {
    if a.dot(b) < 0.0 {
        a.slerp(-b, t)
    } else {
        a.slerp(b, t)
    }
}

pub fn linear(t: f32, a: &RigidBodyState, b: &RigidBodyState) -> RigidBodyState {
    RigidBodyState {
        position: a.position.lerp(b.position, t),
        orientation: slerp(a.orientation, b.orientation, t),
        linear_velocity: a.linear_velocity.lerp(b.linear_velocity, t),
        angular_velocity: a.angular_velocity.lerp(b.angular_velocity, t),
        interacting: a.interacting,
    }
}

/// Hermite position with velocity tangents scaled by the window length in seconds.
/// `extrapolation` pushes both endpoints forward along their velocity first.
pub fn hermite_state(
    t: f32,
    step_size: f32,
    extrapolation: f32,
    a: &RigidBodyState,
    b: &RigidBodyState,
) -> RigidBodyState {
    let p0 = a.position + a.linear_velocity * extrapolation;
    let p1 = b.position + b.linear_velocity * extrapolation;
    RigidBodyState {
        position: hermite(
            t,
            p0,
            p1,
            a.linear_velocity * step_size,
            b.linear_velocity * step_size,
        ),
        ..linear(t, a, b)
    }
}
