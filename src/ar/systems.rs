// src/ar/systems.rs
//! ECS side of the placement core: feed it once per frame and turn its
//! scene / UI callbacks into entities and events.

use bevy::asset::LoadState;
use bevy::prelude::*;

use super::components::{Anchor, SceneAssets, SpawnedEntities, ZoneOutline};
use super::config::PlacementProfile;
use super::controller::{ArContext, PlacementController, TickReport};
use super::core::{ArCommand, EntityHandle, PlaceableType, Pose, SceneSink, UiSink};
use super::plugin::{
    ArPlacement, PlacementNotice, PlacementProfileHandle, PlacementSettings, PointerFeed, TrackingFeed,
};
use super::raycast::SnapshotRaycaster;
use super::surfaces::TrackingSnapshot;
use crate::enemy::Enemy;

const ANCHOR_SIZE: Vec3 = Vec3::new(0.3, 0.5, 0.05);
const ENEMY_RADIUS: f32 = 0.15;
const ENEMY_SPEED: f32 = 0.5;
const ZONE_COLOR: Color = Color::srgb(1.0, 0.35, 0.2);
const DRAFT_COLOR: Color = Color::srgb(1.0, 0.85, 0.2);

// ---------- Scene / UI adapters ----------

/// `SceneSink` backed by deferred `Commands`.
pub struct CommandScene<'a, 'w, 's> {
    pub commands: &'a mut Commands<'w, 's>,
    pub assets: &'a SceneAssets,
    pub spawned: &'a mut SpawnedEntities,
}

impl SceneSink for CommandScene<'_, '_, '_> {
    fn spawn_anchor(&mut self, pose: Pose, tag: PlaceableType) -> EntityHandle {
        let mut tf = Transform::from(pose);
        // sit on the surface instead of straddling it
        tf.translation += pose.up() * ANCHOR_SIZE.y * 0.5;
        let ent = self
            .commands
            .spawn((
                Mesh3d(self.assets.anchor_mesh.clone()),
                MeshMaterial3d(self.assets.material_for(tag)),
                tf,
                Anchor { tag },
                Name::new(format!("Anchor ({})", tag.label())),
            ))
            .id();
        self.spawned.register(ent)
    }

    fn spawn_zone_outline(&mut self, zone: &[Vec3]) -> EntityHandle {
        let ent = self
            .commands
            .spawn((
                Transform::default(),
                ZoneOutline { points: zone.to_vec() },
                Name::new("Spawn zone"),
            ))
            .id();
        self.spawned.register(ent)
    }

    fn spawn_enemy(&mut self, pose: Pose) -> EntityHandle {
        let mut tf = Transform::from(pose);
        tf.translation += pose.up() * ENEMY_RADIUS;
        self.commands.spawn((
            Mesh3d(self.assets.enemy_mesh.clone()),
            MeshMaterial3d(self.assets.enemy.clone()),
            tf,
            Enemy { speed: ENEMY_SPEED },
            Name::new("Enemy"),
        ));
        self.spawned.issue()
    }

    fn destroy(&mut self, handle: EntityHandle) {
        match self.spawned.take(handle) {
            Some(ent) => self.commands.entity(ent).despawn(),
            None => warn!("Placement: destroy for unknown handle {:?}", handle),
        }
    }
}

/// Collects UI callbacks during a tick; flushed as `PlacementNotice` events.
#[derive(Default, Debug)]
pub struct NoticeBuffer(pub Vec<PlacementNotice>);

impl UiSink for NoticeBuffer {
    fn on_placed(&mut self, tag: PlaceableType) {
        self.0.push(PlacementNotice::Placed(tag));
    }

    fn on_calibration_progress(&mut self, surface_count: usize, elapsed: f32) {
        self.0.push(PlacementNotice::CalibrationProgress { surfaces: surface_count, elapsed });
    }

    fn on_calibration_complete(&mut self) {
        self.0.push(PlacementNotice::CalibrationComplete);
    }

    fn on_placement_error(&mut self, message: &str) {
        self.0.push(PlacementNotice::Error(message.to_string()));
    }
}

// ---------- Startup ----------

/// Startup: build the controller from settings (default profile until the asset loads).
pub fn init_controller(mut commands: Commands, settings: Res<PlacementSettings>) {
    commands.insert_resource(ArPlacement(PlacementController::new(default(), settings.seed)));
    info!("Placement: controller ready (seed={})", settings.seed);
}

/// Startup: request the placement profile.
pub fn load_profile(
    mut handle_res: ResMut<PlacementProfileHandle>,
    settings: Res<PlacementSettings>,
    assets: Res<AssetServer>,
) {
    if handle_res.0.is_strong() { return; }
    handle_res.0 = assets.load(settings.profile_path.as_str());
    info!("Placement: loading profile from '{}'", settings.profile_path);
}

pub fn setup_scene_assets(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let mut solid = |color: Color| {
        materials.add(StandardMaterial {
            base_color: color,
            ..default()
        })
    };
    commands.insert_resource(SceneAssets {
        door: solid(Color::srgb_u8(72, 196, 96)),
        window: solid(Color::srgb_u8(96, 160, 255)),
        hatch: solid(Color::srgb_u8(220, 170, 60)),
        entry: solid(Color::srgb_u8(180, 180, 180)),
        enemy: solid(Color::srgb_u8(210, 50, 50)),
        anchor_mesh: meshes.add(Cuboid::from_size(ANCHOR_SIZE)),
        enemy_mesh: meshes.add(Sphere::new(ENEMY_RADIUS)),
    });
}

/// PostStartup: complain early when a collaborator is missing.
pub fn validate_setup(cameras: Query<(), With<Camera3d>>, feed: Option<Res<TrackingFeed>>) {
    if cameras.is_empty() {
        warn!("Placement: no 3D camera in the scene; every placement will fail");
    }
    match feed {
        Some(feed) => info!("Placement: tracking feed '{}'", feed.name),
        None => warn!("Placement: no tracking feed registered; surfaces will never appear"),
    }
}

// ---------- Update ----------

/// Apply the profile when it (re)loads; keep defaults if it fails.
pub fn apply_profile_when_ready(
    mut events: EventReader<AssetEvent<PlacementProfile>>,
    handle_res: Res<PlacementProfileHandle>,
    profiles: Res<Assets<PlacementProfile>>,
    server: Res<AssetServer>,
    mut placement: ResMut<ArPlacement>,
    mut reported_failure: Local<bool>,
) {
    let id = handle_res.0.id();
    for ev in events.read() {
        let (AssetEvent::LoadedWithDependencies { id: changed } | AssetEvent::Modified { id: changed }) = ev else {
            continue;
        };
        if *changed != id { continue; }
        if let Some(profile) = profiles.get(id) {
            placement.apply_config(profile.config.clone());
            info!("Placement: profile applied (mode={:?})", profile.config.mode);
        }
    }

    if !*reported_failure {
        if let Some(LoadState::Failed(err)) = server.get_load_state(id) {
            *reported_failure = true;
            warn!("Placement: profile failed to load ({}); using built-in defaults", err);
        }
    }
}

/// The one per-frame entry into the core: commands first, then the tick.
#[allow(clippy::too_many_arguments)]
pub fn drive_placement(
    time: Res<Time>,
    snapshot: Res<TrackingSnapshot>,
    mut feed: ResMut<PointerFeed>,
    mut placement: ResMut<ArPlacement>,
    mut incoming: EventReader<ArCommand>,
    mut notices: EventWriter<PlacementNotice>,
    mut commands: Commands,
    assets: Res<SceneAssets>,
    mut spawned: ResMut<SpawnedEntities>,
) {
    let ray_cfg = placement.config().raycast.clone();
    let raycaster = SnapshotRaycaster::new(&*snapshot, &ray_cfg);
    let mut scene = CommandScene { commands: &mut commands, assets: &assets, spawned: &mut spawned };
    let mut ui = NoticeBuffer::default();
    let input = std::mem::take(&mut feed.events);

    let report = {
        let mut ctx = ArContext {
            surfaces: &*snapshot,
            camera: &*snapshot,
            raycaster: &raycaster,
            scene: &mut scene,
            ui: &mut ui,
        };
        for cmd in incoming.read() {
            placement.handle_command(*cmd, &mut ctx);
        }
        placement.tick(time.delta_secs(), &input, &mut ctx)
    };

    if report != TickReport::default() {
        debug!("Placement: {:?}", report);
    }
    for notice in ui.0 {
        notices.write(notice);
    }
}

pub fn draw_zone_gizmos(
    mut gizmos: Gizmos,
    outlines: Query<&ZoneOutline>,
    placement: Res<ArPlacement>,
) {
    for outline in &outlines {
        let Some(&first) = outline.points.first() else { continue; };
        gizmos.linestrip(outline.points.iter().copied().chain(std::iter::once(first)), ZONE_COLOR);
    }

    let draft = placement.draft_points();
    if draft.len() >= 2 {
        gizmos.linestrip(draft, DRAFT_COLOR);
    }
}

pub fn log_notices(mut evr: EventReader<PlacementNotice>) {
    for ev in evr.read() {
        match ev {
            PlacementNotice::Placed(tag) => info!("Placement: {} placed", tag.label()),
            PlacementNotice::CalibrationComplete => info!("Placement: calibration complete"),
            PlacementNotice::Error(msg) => warn!("Placement: {}", msg),
            PlacementNotice::CalibrationProgress { .. } => {}
        }
    }
}
