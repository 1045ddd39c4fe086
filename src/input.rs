use bevy::prelude::*;
use bevy::input::{mouse::MouseMotion, keyboard::KeyCode, ButtonInput};
use bevy::window::PrimaryWindow;

use crate::actions::{PlayerAction, ActionState};
use crate::ar::core::{ArCommand, PointerEvent, PointerPhase};
use crate::ar::plugin::{ArPlacement, PointerFeed};
use crate::ar::session::ArMode;
use crate::setup::MainCamera;

pub const MOVE_SPEED: f32 = 1.5;
pub const ROTATE_SPEED: f32 = 0.2;
pub const MAX_CAMERA_DT: f32 = 0.05; // never use a dt larger than 50ms

const SLOT_KEYS: [KeyCode; 3] = [KeyCode::Digit1, KeyCode::Digit2, KeyCode::Digit3];

/// Yaw/pitch of the simulated handheld; position moves on the floor plane.
#[derive(Component, Clone, Copy)]
pub struct HandheldRig {
    pub yaw: f32,
    pub pitch: f32,
}

impl HandheldRig {
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }
}

pub fn input_mapping_system(
    keys: Res<ButtonInput<KeyCode>>,
    mut action_state: ResMut<ActionState>,
) {
    action_state.set(PlayerAction::MoveForward, keys.pressed(KeyCode::KeyW));
    action_state.set(PlayerAction::MoveBackward, keys.pressed(KeyCode::KeyS));
    action_state.set(PlayerAction::MoveLeft, keys.pressed(KeyCode::KeyA));
    action_state.set(PlayerAction::MoveRight, keys.pressed(KeyCode::KeyD));

    action_state.clear_triggers();
    if keys.any_just_pressed([KeyCode::Enter, KeyCode::Space]) {
        action_state.trigger(PlayerAction::Advance);
    }
    if keys.just_pressed(KeyCode::KeyR) {
        action_state.trigger(PlayerAction::Reset);
    }
    if keys.just_pressed(KeyCode::Backspace) {
        action_state.trigger(PlayerAction::ResetAll);
    }
    for (i, key) in SLOT_KEYS.iter().enumerate() {
        if keys.just_pressed(*key) {
            action_state.trigger(PlayerAction::SelectSlot(i));
        }
    }
}

/// The next step of the session for the current mode.
pub fn advance_command(mode: ArMode) -> Option<ArCommand> {
    match mode {
        ArMode::Idle => Some(ArCommand::StartCalibration),
        ArMode::Calibrating => Some(ArCommand::ConfirmCalibration),
        ArMode::Placing => Some(ArCommand::StartGame),
        ArMode::Active => None,
    }
}

/// Turn triggered actions into session commands for the placement core.
pub fn command_system(
    action_state: Res<ActionState>,
    placement: Option<Res<ArPlacement>>,
    mut writer: EventWriter<ArCommand>,
) {
    let Some(placement) = placement else { return; };

    if action_state.just_pressed(PlayerAction::Advance) {
        if let Some(cmd) = advance_command(placement.mode()) {
            writer.write(cmd);
        }
    }
    if action_state.just_pressed(PlayerAction::Reset) {
        writer.write(ArCommand::Reset { teardown_spawns: false });
    }
    if action_state.just_pressed(PlayerAction::ResetAll) {
        writer.write(ArCommand::Reset { teardown_spawns: true });
    }
    for i in 0..SLOT_KEYS.len() {
        if action_state.just_pressed(PlayerAction::SelectSlot(i)) {
            writer.write(ArCommand::SelectSlot(i));
        }
    }
}

/// Left mouse stands in for a touch: press / drag / release.
pub fn pointer_feed_system(
    windows: Query<&Window, With<PrimaryWindow>>,
    buttons: Res<ButtonInput<MouseButton>>,
    widgets: Query<&Interaction>,
    mut feed: ResMut<PointerFeed>,
    mut last_cursor: Local<Option<Vec2>>,
) {
    let Ok(window) = windows.single() else { return; };
    let Some(cursor) = window.cursor_position() else { return; };
    let over_ui = widgets.iter().any(|i| *i != Interaction::None);

    let phase = if buttons.just_pressed(MouseButton::Left) {
        Some(PointerPhase::Began)
    } else if buttons.just_released(MouseButton::Left) {
        Some(PointerPhase::Ended)
    } else if buttons.pressed(MouseButton::Left) && *last_cursor != Some(cursor) {
        Some(PointerPhase::Moved)
    } else {
        None
    };
    *last_cursor = Some(cursor);

    if let Some(phase) = phase {
        feed.events.push(PointerEvent { phase, screen: cursor, over_ui });
    }
}

pub fn camera_controller(
    time: Res<Time>,
    mouse_buttons: Res<ButtonInput<MouseButton>>,
    mut motion_evr: EventReader<MouseMotion>,
    action_state: Res<ActionState>,
    mut query: Query<(&mut Transform, &mut HandheldRig), With<MainCamera>>,
) {
    // 0) Clamp delta
    let mut dt = time.delta_secs();
    if dt > MAX_CAMERA_DT {
        dt = MAX_CAMERA_DT;
    }

    let Ok((mut tf, mut rig)) = query.single_mut() else { return; };

    // 1) Look around while the right button is held
    if mouse_buttons.pressed(MouseButton::Right) {
        for ev in motion_evr.read() {
            rig.yaw -= ev.delta.x * ROTATE_SPEED * dt;
            rig.pitch -= ev.delta.y * ROTATE_SPEED * dt;
        }
    } else {
        motion_evr.clear();
    }
    rig.pitch = rig.pitch.clamp(
        -std::f32::consts::FRAC_PI_2 + 0.01,
        std::f32::consts::FRAC_PI_2 - 0.01,
    );

    // 2) Walk on the floor plane, relative to yaw
    let forward = Vec2::new(-rig.yaw.sin(), -rig.yaw.cos());
    let right = Vec2::new(-forward.y, forward.x);

    let mut dir = Vec2::ZERO;
    if action_state.pressed(PlayerAction::MoveForward) { dir += forward; }
    if action_state.pressed(PlayerAction::MoveBackward) { dir -= forward; }
    if action_state.pressed(PlayerAction::MoveLeft) { dir -= right; }
    if action_state.pressed(PlayerAction::MoveRight) { dir += right; }

    if dir != Vec2::ZERO {
        let delta = dir.normalize() * MOVE_SPEED * dt;
        tf.translation.x += delta.x;
        tf.translation.z += delta.y;
    }

    tf.rotation = rig.rotation();
}
