// src/ar/surfaces.rs
//! Per-tick snapshot of the tracking feed.

use bevy::prelude::*;

use super::core::{CameraFrame, CameraPoseProvider, FeaturePoint, SurfaceRegistry, TrackedSurface};

/// What the tracker reported this frame: surfaces, raw points and the camera.
/// Written only by the feed; the placement core reads it through the
/// `SurfaceRegistry` / `CameraPoseProvider` traits.
#[derive(Resource, Clone, Debug, Default)]
pub struct TrackingSnapshot {
    pub surfaces: Vec<TrackedSurface>,
    pub feature_points: Vec<FeaturePoint>,
    pub camera: Option<CameraFrame>,
}

impl TrackingSnapshot {
    pub fn with_surface(mut self, surface: TrackedSurface) -> Self {
        self.surfaces.push(surface);
        self
    }

    pub fn with_camera(mut self, camera: CameraFrame) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Forget everything; the tracker is off.
    pub fn clear(&mut self) {
        self.surfaces.clear();
        self.feature_points.clear();
        self.camera = None;
    }
}

impl SurfaceRegistry for TrackingSnapshot {
    fn all_surfaces(&self) -> &[TrackedSurface] {
        &self.surfaces
    }

    fn feature_points(&self) -> &[FeaturePoint] {
        &self.feature_points
    }
}

impl CameraPoseProvider for TrackingSnapshot {
    fn camera_frame(&self) -> Option<CameraFrame> {
        self.camera
    }
}

/// Count of surfaces currently usable for placement.
pub fn detected_surface_count(registry: &dyn SurfaceRegistry) -> usize {
    registry.all_surfaces().iter().filter(|s| s.is_tracking()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ar::core::{CameraFrame, FeaturePoint, Pose, SurfaceId, TrackingQuality};

    fn surface(id: u64, quality: TrackingQuality) -> TrackedSurface {
        TrackedSurface::new(SurfaceId(id), Pose::IDENTITY, Vec2::ONE).with_quality(quality)
    }

    #[test]
    fn usable_surfaces_only_include_tracking() {
        let snap = TrackingSnapshot::default()
            .with_surface(surface(1, TrackingQuality::Tracking))
            .with_surface(surface(2, TrackingQuality::Limited))
            .with_surface(surface(3, TrackingQuality::Stopped));

        let ids: Vec<_> = snap.usable_surfaces().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![SurfaceId(1)]);
        assert_eq!(detected_surface_count(&snap), 1);
        // lookup by id still sees non-usable surfaces
        assert!(snap.surface_by_id(SurfaceId(3)).is_some());
        assert!(snap.surface_by_id(SurfaceId(9)).is_none());
    }

    #[test]
    fn cleared_snapshot_reports_nothing() {
        let mut snap = TrackingSnapshot::default()
            .with_surface(surface(1, TrackingQuality::Tracking))
            .with_camera(CameraFrame { pose: Pose::IDENTITY, viewport: Vec2::splat(100.0), fov_y: 1.0 });
        snap.feature_points.push(FeaturePoint { position: Vec3::ONE });

        snap.clear();
        assert!(snap.all_surfaces().is_empty());
        assert!(snap.feature_points().is_empty());
        assert!(snap.camera_frame().is_none());
    }
}
