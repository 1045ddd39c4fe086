// src/enemy/systems.rs

use bevy::prelude::*;

use crate::enemy::components::Enemy;
use crate::setup::MainCamera;

/// Closest an enemy gets before it stops.
const STOP_DISTANCE: f32 = 0.3;

/// Step toward the camera and keep facing it.
pub fn seek_camera(
    time: Res<Time>,
    camera: Query<&GlobalTransform, With<MainCamera>>,
    mut enemies: Query<(&mut Transform, &Enemy), Without<MainCamera>>,
) {
    let Ok(cam) = camera.single() else { return; };
    let target = cam.translation();
    let dt = time.delta_secs();

    for (mut tf, enemy) in &mut enemies {
        advance_towards(&mut tf, target, enemy.speed * dt);
    }
}

fn advance_towards(tf: &mut Transform, target: Vec3, step: f32) {
    let to_target = target - tf.translation;
    let distance = to_target.length();
    if distance > STOP_DISTANCE {
        tf.translation += to_target / distance * step.min(distance - STOP_DISTANCE);
    }
    if distance > f32::EPSILON {
        tf.look_at(target, Vec3::Y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_at_speed_and_faces_target() {
        let mut tf = Transform::from_xyz(0.0, 0.0, -5.0);
        advance_towards(&mut tf, Vec3::ZERO, 0.5);
        assert!((tf.translation - Vec3::new(0.0, 0.0, -4.5)).length() < 1e-5);
        // forward (-Z local) points at the target
        assert!((tf.forward().as_vec3() - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn stops_short_of_the_camera() {
        let mut tf = Transform::from_xyz(0.0, 0.0, -0.4);
        advance_towards(&mut tf, Vec3::ZERO, 10.0);
        assert!((tf.translation.z + STOP_DISTANCE).abs() < 1e-5);
    }
}
