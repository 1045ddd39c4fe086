// src/ar/raycast.rs
//! Screen tap -> world pose, trying trackable tiers in order and falling
//! back to a camera-relative pose.

use bevy::prelude::*;

use super::config::RaycastConfig;
use super::core::{
    facing_rotation, CameraFrame, Pose, SurfaceId, SurfaceRegistry, TrackedSurface,
};
use super::zone::contains;

/// Trackable classes, most precise first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HitTier {
    /// Inside the surface's precise boundary polygon.
    PlaneWithinPolygon,
    /// Inside the extrapolated (grown) surface bounds.
    PlaneEstimated,
    /// Anywhere on a tracked surface's infinite plane.
    PlaneInfinite,
    /// Near a raw feature point; orientation is identity.
    FeaturePoint,
    /// Any surface or point, whatever its tracking quality.
    AnyTrackable,
}

impl HitTier {
    pub const ORDER: [HitTier; 5] = [
        HitTier::PlaneWithinPolygon,
        HitTier::PlaneEstimated,
        HitTier::PlaneInfinite,
        HitTier::FeaturePoint,
        HitTier::AnyTrackable,
    ];
}

/// Where a resolved pose came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HitSource {
    Surface(SurfaceId),
    FeaturePoint,
    CameraFallback,
}

impl HitSource {
    pub fn surface(self) -> Option<SurfaceId> {
        match self {
            HitSource::Surface(id) => Some(id),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaycastHit {
    pub pose: Pose,
    /// Distance along the ray.
    pub distance: f32,
    pub source: HitSource,
}

/// Output of the Ray Cast Service.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedPlacement {
    pub pose: Pose,
    pub source: HitSource,
    /// `None` for the camera fallback.
    pub tier: Option<HitTier>,
}

impl ResolvedPlacement {
    pub fn is_fallback(&self) -> bool {
        self.source == HitSource::CameraFallback
    }
}

/// Matches a screen point against one class of trackables.
pub trait TrackableRaycaster {
    fn raycast(&self, screen: Vec2, camera: &CameraFrame, tier: HitTier) -> Option<RaycastHit>;
}

// ---------- Geometric raycaster over a snapshot ----------

/// Ray/plane raycaster over a `SurfaceRegistry` snapshot.
pub struct SnapshotRaycaster<'a> {
    pub registry: &'a dyn SurfaceRegistry,
    pub cfg: &'a RaycastConfig,
}

impl<'a> SnapshotRaycaster<'a> {
    pub fn new(registry: &'a dyn SurfaceRegistry, cfg: &'a RaycastConfig) -> Self {
        Self { registry, cfg }
    }

    fn hit_surface(ray: Ray3d, s: &TrackedSurface) -> Option<(f32, Vec3)> {
        let normal = Dir3::new(s.normal()).ok()?;
        let t = ray.intersect_plane(s.pose.position, InfinitePlane3d { normal })?;
        Some((t, ray.get_point(t)))
    }

    fn surface_tier_accepts(&self, s: &TrackedSurface, local: Vec2, tier: HitTier) -> bool {
        match tier {
            HitTier::PlaneWithinPolygon => {
                s.is_tracking()
                    && if s.boundary.len() >= 3 {
                        contains(&s.boundary, local)
                    } else {
                        s.within_extents(local, 1.0)
                    }
            }
            HitTier::PlaneEstimated => {
                s.is_tracking() && s.within_extents(local, self.cfg.estimated_bounds_scale)
            }
            HitTier::PlaneInfinite => s.is_tracking(),
            HitTier::AnyTrackable => true,
            HitTier::FeaturePoint => false,
        }
    }

    fn nearest_surface_hit(&self, ray: Ray3d, tier: HitTier) -> Option<RaycastHit> {
        self.registry
            .all_surfaces()
            .iter()
            .filter_map(|s| {
                let (t, point) = Self::hit_surface(ray, s)?;
                if !self.surface_tier_accepts(s, s.to_plane_2d(point), tier) {
                    return None;
                }
                Some(RaycastHit {
                    pose: Pose::new(point, s.pose.rotation),
                    distance: t,
                    source: HitSource::Surface(s.id),
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    fn nearest_feature_point(&self, ray: Ray3d) -> Option<RaycastHit> {
        let r2 = self.cfg.feature_point_radius * self.cfg.feature_point_radius;
        self.registry
            .feature_points()
            .iter()
            .filter_map(|fp| {
                let t = (fp.position - ray.origin).dot(*ray.direction);
                if t <= 0.0 {
                    return None;
                }
                if ray.get_point(t).distance_squared(fp.position) > r2 {
                    return None;
                }
                Some(RaycastHit {
                    pose: Pose::from_position(fp.position),
                    distance: t,
                    source: HitSource::FeaturePoint,
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

impl TrackableRaycaster for SnapshotRaycaster<'_> {
    fn raycast(&self, screen: Vec2, camera: &CameraFrame, tier: HitTier) -> Option<RaycastHit> {
        let ray = camera.ray_through(screen)?;
        match tier {
            HitTier::FeaturePoint => self.nearest_feature_point(ray),
            HitTier::AnyTrackable => {
                let plane = self.nearest_surface_hit(ray, tier);
                let point = self.nearest_feature_point(ray);
                match (plane, point) {
                    (Some(a), Some(b)) => Some(if a.distance <= b.distance { a } else { b }),
                    (a, b) => a.or(b),
                }
            }
            _ => self.nearest_surface_hit(ray, tier),
        }
    }
}

// ---------- Service ----------

/// Ordered tier search plus camera fallback.
pub struct RayCastService<'a> {
    raycaster: &'a dyn TrackableRaycaster,
    cfg: &'a RaycastConfig,
}

impl<'a> RayCastService<'a> {
    pub fn new(raycaster: &'a dyn TrackableRaycaster, cfg: &'a RaycastConfig) -> Self {
        Self { raycaster, cfg }
    }

    /// Full chain; only fails when there is no camera pose at all.
    pub fn cast(
        &self,
        screen: Vec2,
        camera: Option<&CameraFrame>,
    ) -> Result<ResolvedPlacement, PlacementError> {
        let camera = camera.ok_or(PlacementError::NoCameraPose)?;

        for tier in HitTier::ORDER {
            if let Some(hit) = self.raycaster.raycast(screen, camera, tier) {
                debug!("Raycast: {:?} hit via {:?} at {:?}", hit.source, tier, hit.pose.position);
                return Ok(ResolvedPlacement { pose: hit.pose, source: hit.source, tier: Some(tier) });
            }
        }

        let pose = camera_fallback_pose(&camera.pose, self.cfg);
        info!("Raycast: no trackable under {:?}, using camera fallback at {:?}", screen, pose.position);
        Ok(ResolvedPlacement { pose, source: HitSource::CameraFallback, tier: None })
    }

    /// One tier only, no fallback (zone drawing needs a real surface).
    pub fn cast_restricted(
        &self,
        screen: Vec2,
        camera: Option<&CameraFrame>,
        tier: HitTier,
    ) -> Result<Option<ResolvedPlacement>, PlacementError> {
        let camera = camera.ok_or(PlacementError::NoCameraPose)?;
        Ok(self
            .raycaster
            .raycast(screen, camera, tier)
            .map(|hit| ResolvedPlacement { pose: hit.pose, source: hit.source, tier: Some(tier) }))
    }
}

/// Pose a fixed distance ahead of the camera on the horizontal plane,
/// dropped below eye height and facing away from the camera.
pub fn camera_fallback_pose(camera: &Pose, cfg: &RaycastConfig) -> Pose {
    let fwd = camera.forward();
    let flat = Vec3::new(fwd.x, 0.0, fwd.z);
    let dir = if fwd.y.abs() > cfg.vertical_forward_threshold || flat.length_squared() < 1e-8 {
        Vec3::NEG_Z
    } else {
        flat.normalize()
    };

    let mut position = camera.position + dir * cfg.fallback_distance;
    position.y = camera.position.y - cfg.fallback_drop;
    Pose::new(position, facing_rotation(dir))
}

// ---------- Errors ----------

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PlacementError {
    #[error("no camera pose available")]
    NoCameraPose,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ar::core::{FeaturePoint, TrackingQuality};
    use crate::ar::surfaces::TrackingSnapshot;

    fn camera_at(position: Vec3, look: Vec3) -> CameraFrame {
        let rotation = Transform::from_translation(position).looking_at(look, Vec3::Y).rotation;
        CameraFrame {
            pose: Pose::new(position, rotation),
            viewport: Vec2::new(1000.0, 1000.0),
            fov_y: 1.0,
        }
    }

    const CENTER: Vec2 = Vec2::new(500.0, 500.0);

    /// Records which tiers were asked and answers only one of them.
    struct OnlyTier {
        tier: HitTier,
        asked: std::cell::RefCell<Vec<HitTier>>,
    }

    impl TrackableRaycaster for OnlyTier {
        fn raycast(&self, _screen: Vec2, _camera: &CameraFrame, tier: HitTier) -> Option<RaycastHit> {
            self.asked.borrow_mut().push(tier);
            (tier == self.tier).then(|| RaycastHit {
                pose: Pose::from_position(Vec3::new(0.0, 0.0, -2.0)),
                distance: 2.0,
                source: HitSource::FeaturePoint,
            })
        }
    }

    #[test]
    fn feature_point_only_resolves_from_feature_tier() {
        let mock = OnlyTier { tier: HitTier::FeaturePoint, asked: Default::default() };
        let cfg = RaycastConfig::default();
        let cam = camera_at(Vec3::new(0.0, 1.5, 0.0), Vec3::new(0.0, 0.0, -2.0));

        let resolved = RayCastService::new(&mock, &cfg).cast(CENTER, Some(&cam)).unwrap();

        assert_eq!(resolved.tier, Some(HitTier::FeaturePoint));
        assert_eq!(resolved.source, HitSource::FeaturePoint);
        assert_eq!(
            *mock.asked.borrow(),
            vec![HitTier::PlaneWithinPolygon, HitTier::PlaneEstimated, HitTier::PlaneInfinite, HitTier::FeaturePoint]
        );
    }

    #[test]
    fn snapshot_with_only_feature_points_hits_feature_tier() {
        let mut snap = TrackingSnapshot::default();
        snap.feature_points.push(FeaturePoint { position: Vec3::new(0.0, 0.0, -2.0) });
        let cfg = RaycastConfig::default();
        let cam = camera_at(Vec3::new(0.0, 1.5, 0.0), Vec3::new(0.0, 0.0, -2.0));
        let caster = SnapshotRaycaster::new(&snap, &cfg);

        let resolved = RayCastService::new(&caster, &cfg).cast(CENTER, Some(&cam)).unwrap();
        assert_eq!(resolved.tier, Some(HitTier::FeaturePoint));
        assert_eq!(resolved.pose.rotation, Quat::IDENTITY);
    }

    #[test]
    fn tiers_widen_from_polygon_to_infinite_plane() {
        let floor = TrackedSurface::new(SurfaceId(7), Pose::IDENTITY, Vec2::new(1.0, 1.0));
        let snap = TrackingSnapshot::default().with_surface(floor);
        let cfg = RaycastConfig::default();
        let caster = SnapshotRaycaster::new(&snap, &cfg);

        // looking straight at a point 0.6 off-centre: outside 1x1, inside 1.5x
        let cam = camera_at(Vec3::new(0.6, 1.5, 0.5), Vec3::new(0.6, 0.0, 0.0));
        assert!(caster.raycast(CENTER, &cam, HitTier::PlaneWithinPolygon).is_none());
        assert!(caster.raycast(CENTER, &cam, HitTier::PlaneEstimated).is_some());

        let far = camera_at(Vec3::new(5.0, 1.5, 0.5), Vec3::new(5.0, 0.0, 0.0));
        assert!(caster.raycast(CENTER, &far, HitTier::PlaneEstimated).is_none());
        let hit = caster.raycast(CENTER, &far, HitTier::PlaneInfinite).unwrap();
        assert_eq!(hit.source, HitSource::Surface(SurfaceId(7)));
        assert!(hit.pose.position.y.abs() < 1e-4);
    }

    #[test]
    fn limited_surface_only_matches_any_trackable() {
        let floor = TrackedSurface::new(SurfaceId(1), Pose::IDENTITY, Vec2::splat(4.0))
            .with_quality(TrackingQuality::Limited);
        let snap = TrackingSnapshot::default().with_surface(floor);
        let cfg = RaycastConfig::default();
        let caster = SnapshotRaycaster::new(&snap, &cfg);
        let cam = camera_at(Vec3::new(0.0, 1.5, 1.0), Vec3::ZERO);

        let resolved = RayCastService::new(&caster, &cfg).cast(CENTER, Some(&cam)).unwrap();
        assert_eq!(resolved.tier, Some(HitTier::AnyTrackable));
    }

    #[test]
    fn empty_world_falls_back_ahead_of_camera() {
        let snap = TrackingSnapshot::default();
        let cfg = RaycastConfig::default();
        let caster = SnapshotRaycaster::new(&snap, &cfg);
        let cam = camera_at(Vec3::new(0.0, 1.6, 0.0), Vec3::new(0.0, 1.0, -3.0));

        let resolved = RayCastService::new(&caster, &cfg).cast(CENTER, Some(&cam)).unwrap();
        assert!(resolved.is_fallback());
        let p = resolved.pose.position;
        assert!((p - Vec3::new(0.0, 0.6, -1.5)).length() < 1e-4, "got {p}");
    }

    #[test]
    fn fallback_substitutes_world_forward_when_looking_down() {
        let cfg = RaycastConfig::default();
        let down = Pose::new(Vec3::new(1.0, 2.0, 1.0), Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2));
        let pose = camera_fallback_pose(&down, &cfg);
        assert!((pose.position - Vec3::new(1.0, 1.0, -0.5)).length() < 1e-4);
        assert!((pose.forward() - Vec3::NEG_Z).length() < 1e-4);
    }

    #[test]
    fn no_camera_is_fatal_for_the_request() {
        let snap = TrackingSnapshot::default();
        let cfg = RaycastConfig::default();
        let caster = SnapshotRaycaster::new(&snap, &cfg);
        let err = RayCastService::new(&caster, &cfg).cast(CENTER, None).unwrap_err();
        assert_eq!(err, PlacementError::NoCameraPose);
    }
}
