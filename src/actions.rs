use bevy::prelude::*;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerAction {
    MoveForward,
    MoveBackward,
    MoveLeft,
    MoveRight,
    /// Next session step: calibrate, confirm, start.
    Advance,
    Reset,
    /// Reset and also stop running spawners.
    ResetAll,
    SelectSlot(usize),
}

#[derive(Default, Resource)]
pub struct ActionState {
    pressed: HashMap<PlayerAction, bool>,
    just_pressed: HashSet<PlayerAction>,
}

impl ActionState {
    pub fn set(&mut self, action: PlayerAction, is_pressed: bool) {
        self.pressed.insert(action, is_pressed);
    }

    pub fn pressed(&self, action: PlayerAction) -> bool {
        *self.pressed.get(&action).unwrap_or(&false)
    }

    /// Triggers are edge-only; cleared every frame by the mapping system.
    pub fn trigger(&mut self, action: PlayerAction) {
        self.just_pressed.insert(action);
    }

    pub fn just_pressed(&self, action: PlayerAction) -> bool {
        self.just_pressed.contains(&action)
    }

    pub fn clear_triggers(&mut self) {
        self.just_pressed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triggers_clear_but_held_state_stays() {
        let mut state = ActionState::default();
        state.set(PlayerAction::MoveLeft, true);
        state.trigger(PlayerAction::SelectSlot(2));
        assert!(state.just_pressed(PlayerAction::SelectSlot(2)));
        assert!(!state.just_pressed(PlayerAction::SelectSlot(1)));

        state.clear_triggers();
        assert!(!state.just_pressed(PlayerAction::SelectSlot(2)));
        assert!(state.pressed(PlayerAction::MoveLeft));
    }
}
