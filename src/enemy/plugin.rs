use bevy::prelude::*;

use crate::ar::plugin::PlacementTick;
use crate::enemy::systems::seek_camera;

pub struct EnemyPlugin;

impl Plugin for EnemyPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, seek_camera.after(PlacementTick));
    }
}
