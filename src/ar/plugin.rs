//! AR placement plugin wiring (glue).
//! - Placement profile asset/loader
//! - Controller + settings resources
//! - Pointer feed in, notices out
//! - One driving system per frame + zone gizmos

use bevy::prelude::*;

use super::components::SpawnedEntities;
use super::config::{PlacementProfile, PlacementProfileAssetPlugin};
use super::controller::PlacementController;
use super::core::{ArCommand, PlaceableType, PointerEvent};
use super::surfaces::TrackingSnapshot;
use super::systems::{
    apply_profile_when_ready, draw_zone_gizmos, drive_placement, init_controller, load_profile,
    log_notices, setup_scene_assets, validate_setup,
};

/// Where the profile lives and the placement RNG seed.
#[derive(Resource, Clone)]
pub struct PlacementSettings {
    pub profile_path: String,
    pub seed: u64,
}
impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            profile_path: "config/default.placement.ron".to_string(),
            seed: 1337,
        }
    }
}

#[derive(Resource, Default)]
pub struct PlacementProfileHandle(pub Handle<PlacementProfile>);

#[derive(Resource, Deref, DerefMut)]
pub struct ArPlacement(pub PlacementController);

/// Pointer samples gathered since the last tick; drained by the core.
#[derive(Resource, Default)]
pub struct PointerFeed {
    pub events: Vec<PointerEvent>,
}

/// Inserted by whatever fills `TrackingSnapshot`.
#[derive(Resource, Clone)]
pub struct TrackingFeed {
    pub name: &'static str,
}

/// UI-facing callbacks from the core.
#[derive(Event, Clone, Debug, PartialEq)]
pub enum PlacementNotice {
    Placed(PlaceableType),
    CalibrationProgress { surfaces: usize, elapsed: f32 },
    CalibrationComplete,
    Error(String),
}

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlacementTick;

pub struct ArPlacementPlugin;
impl Plugin for ArPlacementPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(PlacementProfileAssetPlugin)
            .init_resource::<PlacementSettings>()
            .init_resource::<PlacementProfileHandle>()
            .init_resource::<TrackingSnapshot>()
            .init_resource::<PointerFeed>()
            .init_resource::<SpawnedEntities>()
            .add_event::<ArCommand>()
            .add_event::<PlacementNotice>()
            .add_systems(Startup, (init_controller, load_profile, setup_scene_assets))
            .add_systems(PostStartup, validate_setup)
            .add_systems(
                Update,
                (apply_profile_when_ready, drive_placement)
                    .chain()
                    .in_set(PlacementTick),
            )
            .add_systems(Update, (draw_zone_gizmos, log_notices).after(PlacementTick));
    }
}
