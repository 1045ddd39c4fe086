use bevy::prelude::*;

/// Spawned by the placement core; walks at the player.
#[derive(Component)]
pub struct Enemy {
    /// Metres per second.
    pub speed: f32,
}
