use bevy::prelude::*;

use ar_spawn::actions::ActionState;
use ar_spawn::ar::ArPlacementPlugin;
use ar_spawn::enemy::EnemyPlugin;
use ar_spawn::input::{camera_controller, command_system, input_mapping_system, pointer_feed_system};
use ar_spawn::ar::plugin::PlacementTick;
use ar_spawn::setup;
use ar_spawn::sim::DesktopTrackingPlugin;
use ar_spawn::ui::HudPlugin;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "AR spawn placement".into(),
                ..default()
            }),
            ..default()
        }))
        // placement core + its collaborators
        .add_plugins(ArPlacementPlugin)
        .add_plugins(DesktopTrackingPlugin) // fake tracker: room surfaces + device pose
        .add_plugins(EnemyPlugin)
        .add_plugins(HudPlugin)
        .init_resource::<ActionState>()
        // camera, lights
        .add_systems(Startup, setup::setup)
        // input feeds the core before it ticks
        .add_systems(
            Update,
            (
                input_mapping_system,
                (command_system, pointer_feed_system, camera_controller),
            )
                .chain()
                .before(PlacementTick),
        )
        .run();
}
