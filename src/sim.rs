// src/sim.rs
//! Desktop stand-in for an AR tracker: a small room whose surfaces are
//! "discovered" over time, plus the main camera as the device pose.

use std::f32::consts::FRAC_PI_2;

use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::ar::core::{
    CameraFrame, FeaturePoint, PlaneAlignment, Pose, SurfaceId, TrackedSurface, TrackingQuality,
};
use crate::ar::plugin::{ArPlacement, PlacementSettings, PlacementTick, TrackingFeed};
use crate::ar::surfaces::TrackingSnapshot;
use crate::setup::MainCamera;

const FEATURE_POINTS: usize = 48;

/// A room surface and when the tracker picks it up.
#[derive(Clone, Debug)]
pub struct SimSurface {
    pub surface: TrackedSurface,
    /// Seconds until first reported (as `Limited`).
    pub found_at: f32,
    /// Seconds until reported as `Tracking`.
    pub stable_at: f32,
}

#[derive(Resource, Clone, Debug, Default)]
pub struct SimRoom {
    pub surfaces: Vec<SimSurface>,
    pub feature_points: Vec<FeaturePoint>,
}

impl SimRoom {
    /// Floor, a coffee table and the back wall.
    pub fn living_room(seed: u64) -> Self {
        let floor = TrackedSurface::new(SurfaceId(1), Pose::IDENTITY, Vec2::new(6.0, 6.0));
        let table = TrackedSurface::new(
            SurfaceId(2),
            Pose::from_position(Vec3::new(1.2, 0.45, -1.8)),
            Vec2::new(1.2, 0.8),
        );
        let wall = TrackedSurface::new(
            SurfaceId(3),
            Pose::new(Vec3::new(0.0, 1.5, -3.0), Quat::from_rotation_x(FRAC_PI_2)),
            Vec2::new(6.0, 3.0),
        )
        .with_alignment(PlaneAlignment::Vertical);

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let feature_points = (0..FEATURE_POINTS)
            .map(|_| {
                let local = Vec2::new(rng.random_range(-2.5..=2.5), rng.random_range(-2.5..=2.5));
                FeaturePoint { position: floor.from_plane_2d(local) }
            })
            .collect();

        Self {
            surfaces: vec![
                SimSurface { surface: floor, found_at: 0.5, stable_at: 1.5 },
                SimSurface { surface: table, found_at: 2.0, stable_at: 3.0 },
                SimSurface { surface: wall, found_at: 3.5, stable_at: 4.5 },
            ],
            feature_points,
        }
    }

    /// What the tracker reports `elapsed` seconds into the session.
    pub fn surfaces_at(&self, elapsed: f32) -> Vec<TrackedSurface> {
        self.surfaces
            .iter()
            .filter(|s| elapsed >= s.found_at)
            .map(|s| {
                let quality = if elapsed >= s.stable_at { TrackingQuality::Tracking } else { TrackingQuality::Limited };
                s.surface.clone().with_quality(quality)
            })
            .collect()
    }
}

/// Seconds since the current scan started. Restarts whenever scanning stops.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScanClock {
    started_at: Option<f32>,
}

impl ScanClock {
    pub fn advance(&mut self, scanning: bool, now: f32) -> Option<f32> {
        if !scanning {
            self.started_at = None;
            return None;
        }
        let start = *self.started_at.get_or_insert(now);
        Some(now - start)
    }
}

/// Device pose + intrinsics from a perspective camera.
pub fn camera_frame(tf: &GlobalTransform, projection: &Projection, viewport: Vec2) -> Option<CameraFrame> {
    let Projection::Perspective(p) = projection else { return None; };
    let (_, rotation, translation) = tf.to_scale_rotation_translation();
    Some(CameraFrame { pose: Pose::new(translation, rotation), viewport, fov_y: p.fov })
}

pub struct DesktopTrackingPlugin;

impl Plugin for DesktopTrackingPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(TrackingFeed { name: "desktop-sim" })
            .add_systems(Startup, spawn_room)
            .add_systems(Update, (publish_tracking.before(PlacementTick), draw_tracked_surfaces));
    }
}

fn spawn_room(
    mut commands: Commands,
    settings: Res<PlacementSettings>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let room = SimRoom::living_room(settings.seed);

    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(6.0, 6.0))),
        MeshMaterial3d(materials.add(Color::srgb_u8(90, 84, 78))),
        Transform::IDENTITY,
        Name::new("Floor"),
    ));
    commands.spawn((
        Mesh3d(meshes.add(Cuboid::new(1.2, 0.45, 0.8))),
        MeshMaterial3d(materials.add(Color::srgb_u8(120, 80, 50))),
        Transform::from_xyz(1.2, 0.225, -1.8),
        Name::new("Table"),
    ));

    info!(
        "Sim: room with {} surfaces and {} feature points",
        room.surfaces.len(),
        room.feature_points.len()
    );
    commands.insert_resource(room);
}

/// Refresh the snapshot the placement core reads this frame. The tracker
/// only runs while the core is scanning; otherwise it reports nothing.
fn publish_tracking(
    time: Res<Time>,
    room: Option<Res<SimRoom>>,
    placement: Option<Res<ArPlacement>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    camera: Query<(&GlobalTransform, &Projection), With<MainCamera>>,
    mut snapshot: ResMut<TrackingSnapshot>,
    mut clock: Local<ScanClock>,
) {
    let Some(room) = room else { return; };
    let scanning = placement.is_some_and(|p| p.scanning());
    let Some(elapsed) = clock.advance(scanning, time.elapsed_secs()) else {
        if !snapshot.surfaces.is_empty() || snapshot.camera.is_some() {
            debug!("Sim: tracking paused");
            snapshot.clear();
        }
        return;
    };

    snapshot.surfaces = room.surfaces_at(elapsed);
    snapshot.feature_points.clone_from(&room.feature_points);

    snapshot.camera = match (windows.single(), camera.single()) {
        (Ok(window), Ok((tf, projection))) => {
            camera_frame(tf, projection, Vec2::new(window.width(), window.height()))
        }
        _ => None,
    };
}

fn draw_tracked_surfaces(mut gizmos: Gizmos, snapshot: Res<TrackingSnapshot>) {
    for s in &snapshot.surfaces {
        let color = match s.quality {
            TrackingQuality::Tracking => Color::srgb(0.2, 0.9, 0.9),
            _ => Color::srgb(0.5, 0.5, 0.5),
        };
        // gizmo rects lie in local XY; surfaces span local XZ
        let rotation = s.pose.rotation * Quat::from_rotation_x(-FRAC_PI_2);
        let center = s.pose.position + s.normal() * 0.005;
        gizmos.rect(Isometry3d::new(center, rotation), s.extents, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surfaces_show_up_then_stabilise() {
        let room = SimRoom::living_room(7);
        assert!(room.surfaces_at(0.1).is_empty());

        let early = room.surfaces_at(1.0);
        assert_eq!(early.len(), 1);
        assert_eq!(early[0].quality, TrackingQuality::Limited);

        let later = room.surfaces_at(10.0);
        assert_eq!(later.len(), 3);
        assert!(later.iter().all(|s| s.is_tracking()));
    }

    #[test]
    fn scan_clock_restarts_with_each_scan() {
        let mut clock = ScanClock::default();
        assert_eq!(clock.advance(false, 10.0), None);
        assert_eq!(clock.advance(true, 12.0), Some(0.0));
        assert_eq!(clock.advance(true, 13.5), Some(1.5));
        assert_eq!(clock.advance(false, 20.0), None);
        // a new session discovers the room from scratch
        assert_eq!(clock.advance(true, 30.0), Some(0.0));

        let room = SimRoom::living_room(7);
        let elapsed = clock.advance(true, 30.2).unwrap_or_default();
        assert!(room.surfaces_at(elapsed).is_empty());
    }

    #[test]
    fn wall_faces_into_the_room() {
        let room = SimRoom::living_room(7);
        let wall = &room.surfaces[2].surface;
        assert!((wall.normal() - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn feature_points_lie_on_the_floor() {
        let room = SimRoom::living_room(3);
        assert_eq!(room.feature_points.len(), FEATURE_POINTS);
        assert!(room.feature_points.iter().all(|p| p.position.y.abs() < 1e-5));
    }

    #[test]
    fn perspective_camera_becomes_frame() {
        let tf = GlobalTransform::from(Transform::from_xyz(0.0, 1.5, 2.0));
        let frame = camera_frame(&tf, &Projection::Perspective(PerspectiveProjection::default()), Vec2::new(800.0, 600.0))
            .expect("perspective projection");
        assert!((frame.pose.position - Vec3::new(0.0, 1.5, 2.0)).length() < 1e-5);
        assert_eq!(frame.fov_y, PerspectiveProjection::default().fov);

        let ortho = Projection::Orthographic(OrthographicProjection::default_3d());
        assert!(camera_frame(&tf, &ortho, Vec2::ONE).is_none());
    }
}
