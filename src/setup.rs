use bevy::prelude::*;
use crate::input::HandheldRig;

#[derive(Component)]
pub struct MainCamera;

/// Eye height of the simulated handheld device.
pub const DEVICE_HEIGHT: f32 = 1.5;

pub fn setup(
    mut commands: Commands,
) {
    // 1) Light
    commands.spawn((
        PointLight {
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(2.0, 3.5, 1.0),
    ));

    // 2) Camera standing in for the device
    let rig = HandheldRig {
        yaw: 0.0,
        pitch: -0.45,
    };
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, DEVICE_HEIGHT, 2.5).with_rotation(rig.rotation()),
        MainCamera,
        rig,
    ));
}
