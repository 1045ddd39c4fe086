// src/ar/core.rs
//! Core types/traits for surface-anchored placement.
//! Keep this file dependency-light; every other `ar` module builds on it.

use bevy::prelude::*; // Vec2, Vec3, Quat
use serde::{Deserialize, Serialize};

// ---------- Ids & poses ----------

/// Identity of a tracked planar surface (assigned by the tracking feed).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

/// Opaque handle to a visual entity created by the scene collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityHandle(pub u64);

/// World-space position + orientation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub const IDENTITY: Self = Self { position: Vec3::ZERO, rotation: Quat::IDENTITY };

    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub const fn from_position(position: Vec3) -> Self {
        Self { position, rotation: Quat::IDENTITY }
    }

    /// Forward is -Z, same as a Bevy camera.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// World -> local frame of this pose.
    pub fn inverse_transform_point(&self, world: Vec3) -> Vec3 {
        self.rotation.inverse() * (world - self.position)
    }

    /// Local frame of this pose -> world.
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }
}

impl From<Pose> for Transform {
    fn from(p: Pose) -> Self {
        Transform::from_translation(p.position).with_rotation(p.rotation)
    }
}

/// Yaw-only rotation whose forward (-Z) points along `dir` projected on XZ.
pub fn facing_rotation(dir: Vec3) -> Quat {
    Quat::from_rotation_y(f32::atan2(-dir.x, -dir.z))
}

// ---------- Surfaces ----------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaneAlignment {
    HorizontalUp,
    HorizontalDown,
    Vertical,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackingQuality {
    Tracking,
    Limited,
    Stopped,
}

/// A tracked, roughly planar region. Owned by the tracking feed; read-only here.
/// Local frame: plane normal is +Y, extents span local X (width) and Z (depth).
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedSurface {
    pub id: SurfaceId,
    pub pose: Pose,
    /// (width, depth), both >= 0.
    pub extents: Vec2,
    pub alignment: PlaneAlignment,
    pub quality: TrackingQuality,
    /// Precise boundary in local XZ. Empty means "use the extents rectangle".
    pub boundary: Vec<Vec2>,
}

impl TrackedSurface {
    pub fn new(id: SurfaceId, pose: Pose, extents: Vec2) -> Self {
        Self {
            id,
            pose,
            extents: extents.max(Vec2::ZERO),
            alignment: PlaneAlignment::HorizontalUp,
            quality: TrackingQuality::Tracking,
            boundary: Vec::new(),
        }
    }

    pub fn with_alignment(mut self, alignment: PlaneAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_quality(mut self, quality: TrackingQuality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_boundary(mut self, boundary: Vec<Vec2>) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn is_tracking(&self) -> bool {
        self.quality == TrackingQuality::Tracking
    }

    pub fn normal(&self) -> Vec3 {
        self.pose.up()
    }

    /// Local in-plane coordinates (X, Z) of a world point.
    pub fn to_plane_2d(&self, world: Vec3) -> Vec2 {
        let l = self.pose.inverse_transform_point(world);
        Vec2::new(l.x, l.z)
    }

    /// World point for local in-plane coordinates.
    pub fn from_plane_2d(&self, local: Vec2) -> Vec3 {
        self.pose.transform_point(Vec3::new(local.x, 0.0, local.y))
    }

    /// Drop the local normal-axis component so `world` lies on the plane.
    pub fn project_onto_plane(&self, world: Vec3) -> Vec3 {
        self.from_plane_2d(self.to_plane_2d(world))
    }

    /// Inside the extents rectangle scaled by `scale`.
    pub fn within_extents(&self, local: Vec2, scale: f32) -> bool {
        let half = self.extents * 0.5 * scale;
        local.x.abs() <= half.x && local.y.abs() <= half.y
    }
}

/// Raw feature point reported by the tracker (no orientation).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeaturePoint {
    pub position: Vec3,
}

// ---------- Slots ----------

/// Semantic tag for a placed anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaceableType {
    Door,
    Window,
    Hatch,
    Untyped,
}

impl PlaceableType {
    pub fn label(self) -> &'static str {
        match self {
            PlaceableType::Door => "Door",
            PlaceableType::Window => "Window",
            PlaceableType::Hatch => "Hatch",
            PlaceableType::Untyped => "Entry",
        }
    }
}

// ---------- Input ----------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerPhase {
    Began,
    Moved,
    Ended,
}

/// One pointer/touch sample from the input feed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub screen: Vec2,
    pub over_ui: bool,
}

/// Commands sent back by the UI collaborator.
#[derive(Event, Clone, Copy, Debug, PartialEq)]
pub enum ArCommand {
    SelectSlot(usize),
    StartCalibration,
    /// Operator tap confirming calibration once it is eligible.
    ConfirmCalibration,
    StartGame,
    Reset { teardown_spawns: bool },
}

// ---------- Camera ----------

/// Camera pose plus the intrinsics needed to turn a screen point into a ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraFrame {
    pub pose: Pose,
    /// Viewport size in logical pixels (origin top-left).
    pub viewport: Vec2,
    /// Vertical field of view (radians).
    pub fov_y: f32,
}

impl CameraFrame {
    /// World-space ray through `screen`. `None` for a degenerate viewport.
    pub fn ray_through(&self, screen: Vec2) -> Option<Ray3d> {
        if self.viewport.x <= 0.0 || self.viewport.y <= 0.0 {
            return None;
        }
        let ndc_x = 2.0 * screen.x / self.viewport.x - 1.0;
        let ndc_y = 1.0 - 2.0 * screen.y / self.viewport.y;
        let tan_half = (self.fov_y * 0.5).tan();
        let aspect = self.viewport.x / self.viewport.y;
        let local = Vec3::new(ndc_x * tan_half * aspect, ndc_y * tan_half, -1.0);
        let dir = Dir3::new(self.pose.rotation * local).ok()?;
        Some(Ray3d::new(self.pose.position, dir))
    }
}

// ---------- Collaborator traits ----------

/// Read-only view over the tracker's current snapshot.
pub trait SurfaceRegistry {
    /// Every surface, regardless of tracking quality.
    fn all_surfaces(&self) -> &[TrackedSurface];

    fn feature_points(&self) -> &[FeaturePoint] {
        &[]
    }

    /// Surfaces whose quality is `Tracking`.
    fn usable_surfaces(&self) -> Vec<&TrackedSurface> {
        self.all_surfaces().iter().filter(|s| s.is_tracking()).collect()
    }

    fn surface_by_id(&self, id: SurfaceId) -> Option<&TrackedSurface> {
        self.all_surfaces().iter().find(|s| s.id == id)
    }
}

/// Provides the current camera frame, if tracking has one.
pub trait CameraPoseProvider {
    fn camera_frame(&self) -> Option<CameraFrame>;
}

/// Renderer/scene collaborator: creates and destroys visual entities.
pub trait SceneSink {
    fn spawn_anchor(&mut self, pose: Pose, tag: PlaceableType) -> EntityHandle;
    fn spawn_zone_outline(&mut self, zone: &[Vec3]) -> EntityHandle;
    fn spawn_enemy(&mut self, pose: Pose) -> EntityHandle;
    fn destroy(&mut self, handle: EntityHandle);
}

/// UI collaborator notifications.
pub trait UiSink {
    fn on_placed(&mut self, _tag: PlaceableType) {}
    fn on_calibration_progress(&mut self, _surface_count: usize, _elapsed: f32) {}
    fn on_calibration_complete(&mut self) {}
    fn on_placement_error(&mut self, _message: &str) {}
}

/// Anything that can show a line of text (status widgets, debug labels).
pub trait Label {
    fn set_text(&mut self, text: &str);
}

/// Scene sink that drops everything (headless runs).
#[derive(Default)]
pub struct NullScene {
    next: u64,
}

impl SceneSink for NullScene {
    fn spawn_anchor(&mut self, _pose: Pose, _tag: PlaceableType) -> EntityHandle {
        self.next += 1;
        EntityHandle(self.next)
    }
    fn spawn_zone_outline(&mut self, _zone: &[Vec3]) -> EntityHandle {
        self.next += 1;
        EntityHandle(self.next)
    }
    fn spawn_enemy(&mut self, _pose: Pose) -> EntityHandle {
        self.next += 1;
        EntityHandle(self.next)
    }
    fn destroy(&mut self, _handle: EntityHandle) {}
}

impl UiSink for () {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_rotation_points_forward_along_direction() {
        let rot = facing_rotation(Vec3::X);
        let fwd = rot * Vec3::NEG_Z;
        assert!((fwd - Vec3::X).length() < 1e-5, "got {fwd}");
    }

    #[test]
    fn projection_zeroes_local_normal_component() {
        let s = TrackedSurface::new(
            SurfaceId(1),
            Pose::from_position(Vec3::new(0.0, 0.5, 0.0)),
            Vec2::splat(2.0),
        );
        let p = s.project_onto_plane(Vec3::new(0.3, 2.0, -0.4));
        assert!((p - Vec3::new(0.3, 0.5, -0.4)).length() < 1e-5);
    }

    #[test]
    fn center_ray_follows_camera_forward() {
        let cam = CameraFrame {
            pose: Pose::IDENTITY,
            viewport: Vec2::new(800.0, 600.0),
            fov_y: 1.0,
        };
        let ray = cam.ray_through(Vec2::new(400.0, 300.0)).unwrap();
        assert!((*ray.direction - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn degenerate_viewport_has_no_ray() {
        let cam = CameraFrame { pose: Pose::IDENTITY, viewport: Vec2::ZERO, fov_y: 1.0 };
        assert!(cam.ray_through(Vec2::ZERO).is_none());
    }
}
