// src/ar/zone.rs
//! Free-form spawn zones: gesture capture on one locked surface,
//! even-odd containment and rejection sampling inside the polygon.

use bevy::prelude::*;
use rand::Rng;

use super::core::{Pose, SurfaceId, SurfaceRegistry, TrackedSurface};

/// Even-odd point-in-polygon test on 2-D in-plane coordinates.
/// Edges with equal y are skipped, so horizontal edges never divide by zero.
pub fn contains(polygon: &[Vec2], point: Vec2) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[j];
        if a.y != b.y && ((a.y > point.y) != (b.y > point.y)) {
            let x_cross = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

// ---------- Draft ----------

/// In-progress boundary, alive only during one press/move/release gesture.
#[derive(Clone, Debug)]
pub struct ZoneDraft {
    surface: SurfaceId,
    /// Plane frame captured when the surface was locked.
    plane: Pose,
    local: Vec<Vec2>,
    bounds: Rect,
}

impl ZoneDraft {
    fn new(surface: &TrackedSurface, first: Vec3) -> Self {
        let p = surface.to_plane_2d(first);
        Self {
            surface: surface.id,
            plane: surface.pose,
            local: vec![p],
            bounds: Rect::from_corners(p, p),
        }
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    pub fn len(&self) -> usize {
        self.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Vertices in world space (all on the locked plane).
    pub fn world_points(&self) -> Vec<Vec3> {
        self.local.iter().map(|p| self.plane.transform_point(Vec3::new(p.x, 0.0, p.y))).collect()
    }

    fn to_local(&self, world: Vec3) -> Vec2 {
        let l = self.plane.inverse_transform_point(world);
        Vec2::new(l.x, l.z)
    }

    fn push(&mut self, p: Vec2) {
        self.local.push(p);
        self.bounds = self.bounds.union_point(p);
    }
}

// ---------- Finished zone ----------

/// Closed, immutable polygon on one surface plane.
#[derive(Clone, Debug)]
pub struct SpawnZone {
    pub id: u32,
    pub surface: SurfaceId,
    plane: Pose,
    local: Vec<Vec2>,
    bounds: Rect,
}

impl SpawnZone {
    /// Build directly from world points projected onto `plane`.
    /// `None` when fewer than 3 vertices are given.
    pub fn from_world(id: u32, surface: SurfaceId, plane: Pose, points: &[Vec3]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        let local: Vec<Vec2> = points
            .iter()
            .map(|w| {
                let l = plane.inverse_transform_point(*w);
                Vec2::new(l.x, l.z)
            })
            .collect();
        let bounds = local.iter().fold(Rect::from_corners(local[0], local[0]), |b, p| b.union_point(*p));
        Some(Self { id, surface, plane, local, bounds })
    }

    pub fn vertex_count(&self) -> usize {
        self.local.len()
    }

    /// Cached in-plane bounding box.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn world_points(&self) -> Vec<Vec3> {
        self.local.iter().map(|p| self.plane.transform_point(Vec3::new(p.x, 0.0, p.y))).collect()
    }

    pub fn contains_local(&self, p: Vec2) -> bool {
        self.bounds.contains(p) && contains(&self.local, p)
    }

    /// Projects `world` onto the zone plane before testing.
    pub fn contains_world(&self, world: Vec3) -> bool {
        let l = self.plane.inverse_transform_point(world);
        self.contains_local(Vec2::new(l.x, l.z))
    }

    /// Uniform point in the bounds, resampled until inside the polygon.
    pub fn sample_point<R: Rng + ?Sized>(&self, rng: &mut R, max_attempts: u32) -> Option<Vec3> {
        let (min, max) = (self.bounds.min, self.bounds.max);
        for _ in 0..max_attempts {
            let p = Vec2::new(rng.random_range(min.x..=max.x), rng.random_range(min.y..=max.y));
            if contains(&self.local, p) {
                return Some(self.plane.transform_point(Vec3::new(p.x, 0.0, p.y)));
            }
        }
        None
    }
}

// ---------- Builder ----------

/// Outcome of a finish event.
#[derive(Debug)]
pub enum FinishOutcome {
    Promoted(SpawnZone),
    /// Fewer than 3 vertices; draft dropped.
    Discarded { vertices: usize },
    NoDraft,
}

/// Begin / extend / finish state machine for one gesture at a time.
#[derive(Debug)]
pub struct ZoneBuilder {
    draft: Option<ZoneDraft>,
    min_point_distance: f32,
    next_id: u32,
}

impl ZoneBuilder {
    pub fn new(min_point_distance: f32) -> Self {
        Self { draft: None, min_point_distance, next_id: 0 }
    }

    pub fn set_min_point_distance(&mut self, d: f32) {
        self.min_point_distance = d;
    }

    pub fn draft(&self) -> Option<&ZoneDraft> {
        self.draft.as_ref()
    }

    /// Lock onto `surface` and start a fresh draft (any previous one is dropped).
    pub fn begin(&mut self, surface: &TrackedSurface, hit: Vec3) {
        self.draft = Some(ZoneDraft::new(surface, hit));
        debug!("Zone: draft started on {:?}", surface.id);
    }

    /// Append `hit` (projected onto the locked plane) if far enough from the
    /// last vertex. No-op without a draft or when the locked surface is gone
    /// or no longer tracking.
    pub fn extend(&mut self, registry: &dyn SurfaceRegistry, hit: Vec3) -> bool {
        let Some(draft) = self.draft.as_mut() else { return false; };
        if !registry.surface_by_id(draft.surface).is_some_and(|s| s.is_tracking()) {
            return false;
        }

        let p = draft.to_local(hit);
        let Some(last) = draft.local.last().copied() else { return false; };
        if last.distance(p) < self.min_point_distance {
            return false;
        }
        draft.push(p);
        true
    }

    pub fn finish(&mut self) -> FinishOutcome {
        let Some(draft) = self.draft.take() else { return FinishOutcome::NoDraft; };
        if draft.local.len() < 3 {
            debug!("Zone: discarded draft with {} vertices", draft.local.len());
            return FinishOutcome::Discarded { vertices: draft.local.len() };
        }

        let id = self.next_id;
        self.next_id += 1;
        info!("Zone: closed zone {} with {} vertices", id, draft.local.len());
        FinishOutcome::Promoted(SpawnZone {
            id,
            surface: draft.surface,
            plane: draft.plane,
            local: draft.local,
            bounds: draft.bounds,
        })
    }

    /// Drop any in-progress draft without promotion.
    pub fn cancel(&mut self) {
        if self.draft.take().is_some() {
            debug!("Zone: in-progress draft cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ar::core::TrackingQuality;
    use crate::ar::surfaces::TrackingSnapshot;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Reference: count crossings of the +x ray in f64 with the half-open rule.
    fn brute_force_inside(poly: &[Vec2], p: Vec2) -> bool {
        let (px, py) = (p.x as f64, p.y as f64);
        let mut crossings = 0;
        for i in 0..poly.len() {
            let a = poly[i];
            let b = poly[(i + 1) % poly.len()];
            let (ax, ay, bx, by) = (a.x as f64, a.y as f64, b.x as f64, b.y as f64);
            let (lo, hi) = if ay < by { ((ax, ay), (bx, by)) } else { ((bx, by), (ax, ay)) };
            if py < lo.1 || py >= hi.1 {
                continue;
            }
            let t = (py - lo.1) / (hi.1 - lo.1);
            let x = lo.0 + t * (hi.0 - lo.0);
            if x > px {
                crossings += 1;
            }
        }
        crossings % 2 == 1
    }

    /// Random simple (star-shaped) polygon around the origin.
    fn star_polygon(rng: &mut ChaCha8Rng, n: usize) -> Vec<Vec2> {
        (0..n)
            .map(|i| {
                let ang = i as f32 / n as f32 * std::f32::consts::TAU;
                let r = rng.random_range(0.5..3.0);
                Vec2::new(ang.cos() * r, ang.sin() * r)
            })
            .collect()
    }

    #[test]
    fn contains_agrees_with_reference_on_random_polygons() {
        let mut rng = ChaCha8Rng::seed_from_u64(0xC0FFEE);
        for _ in 0..200 {
            let n = rng.random_range(3..12);
            let poly = star_polygon(&mut rng, n);
            for _ in 0..50 {
                let p = Vec2::new(rng.random_range(-3.5..3.5), rng.random_range(-3.5..3.5));
                // skip points numerically on an edge
                let near_edge = (0..n).any(|i| {
                    let a = poly[i];
                    let b = poly[(i + 1) % n];
                    let ab = b - a;
                    let t = ((p - a).dot(ab) / ab.length_squared()).clamp(0.0, 1.0);
                    (a + ab * t).distance(p) < 1e-3
                });
                if near_edge {
                    continue;
                }
                assert_eq!(contains(&poly, p), brute_force_inside(&poly, p), "poly {poly:?} point {p}");
            }
        }
    }

    #[test]
    fn far_outside_bounds_is_never_inside() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..100 {
            let poly = star_polygon(&mut rng, 8);
            for p in [Vec2::new(50.0, 0.0), Vec2::new(-50.0, 3.0), Vec2::new(0.0, 40.0), Vec2::new(10.0, -10.0)] {
                assert!(!contains(&poly, p));
            }
        }
    }

    #[test]
    fn concave_notch_is_outside() {
        // U shape opening upward
        let poly = [
            Vec2::new(0.0, 0.0),
            Vec2::new(3.0, 0.0),
            Vec2::new(3.0, 3.0),
            Vec2::new(2.0, 3.0),
            Vec2::new(2.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 3.0),
            Vec2::new(0.0, 3.0),
        ];
        assert!(contains(&poly, Vec2::new(0.5, 2.0)));
        assert!(contains(&poly, Vec2::new(1.5, 0.5)));
        assert!(!contains(&poly, Vec2::new(1.5, 2.0)));
        // exactly on the y of horizontal edges
        assert!(contains(&poly, Vec2::new(0.5, 1.0)));
    }

    #[test]
    fn degenerate_polygons_contain_nothing() {
        assert!(!contains(&[], Vec2::ZERO));
        assert!(!contains(&[Vec2::ZERO, Vec2::X], Vec2::new(0.5, 0.0)));
        let flat = [Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)];
        assert!(!contains(&flat, Vec2::new(1.0, 0.0)));
    }

    fn floor() -> TrackedSurface {
        TrackedSurface::new(SurfaceId(1), Pose::from_position(Vec3::new(1.0, 0.0, 1.0)), Vec2::splat(4.0))
    }

    #[test]
    fn square_gesture_promotes_to_zone() {
        let snap = TrackingSnapshot::default().with_surface(floor());
        let surface = &snap.surfaces[0];
        let mut builder = ZoneBuilder::new(0.2);

        builder.begin(surface, Vec3::new(0.0, 0.0, 0.0));
        assert!(builder.extend(&snap, Vec3::new(2.0, 0.0, 0.0)));
        assert!(builder.extend(&snap, Vec3::new(2.0, 0.0, 2.0)));
        assert!(builder.extend(&snap, Vec3::new(0.0, 0.0, 2.0)));

        let FinishOutcome::Promoted(zone) = builder.finish() else { panic!("expected a zone"); };
        assert_eq!(zone.vertex_count(), 4);
        assert!(zone.contains_world(Vec3::new(1.0, 0.0, 1.0)));
        assert!(!zone.contains_world(Vec3::new(3.0, 0.0, 1.0)));
        assert!(builder.draft().is_none());
    }

    #[test]
    fn points_are_projected_onto_locked_plane() {
        let snap = TrackingSnapshot::default().with_surface(floor());
        let mut builder = ZoneBuilder::new(0.2);
        builder.begin(&snap.surfaces[0], Vec3::new(0.0, 0.4, 0.0));
        builder.extend(&snap, Vec3::new(1.0, -0.3, 0.0));

        for p in builder.draft().unwrap().world_points() {
            assert!(p.y.abs() < 1e-5, "vertex {p} off plane");
        }
    }

    #[test]
    fn trembling_points_are_debounced() {
        let snap = TrackingSnapshot::default().with_surface(floor());
        let mut builder = ZoneBuilder::new(0.2);
        builder.begin(&snap.surfaces[0], Vec3::ZERO);
        assert!(!builder.extend(&snap, Vec3::new(0.1, 0.0, 0.0)));
        assert!(!builder.extend(&snap, Vec3::new(0.0, 0.0, 0.19)));
        assert!(builder.extend(&snap, Vec3::new(0.25, 0.0, 0.0)));
        assert_eq!(builder.draft().unwrap().len(), 2);
    }

    #[test]
    fn extend_is_noop_without_locked_surface() {
        let mut snap = TrackingSnapshot::default().with_surface(floor());
        let mut builder = ZoneBuilder::new(0.2);
        assert!(!builder.extend(&snap, Vec3::ONE));

        builder.begin(&snap.surfaces[0].clone(), Vec3::ZERO);
        snap.surfaces.clear();
        assert!(!builder.extend(&snap, Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(builder.draft().unwrap().len(), 1);
    }

    #[test]
    fn extend_stops_when_locked_surface_degrades() {
        let mut snap = TrackingSnapshot::default().with_surface(floor());
        let mut builder = ZoneBuilder::new(0.2);
        builder.begin(&snap.surfaces[0].clone(), Vec3::ZERO);
        assert!(builder.extend(&snap, Vec3::new(1.0, 0.0, 0.0)));

        for quality in [TrackingQuality::Limited, TrackingQuality::Stopped] {
            snap.surfaces[0].quality = quality;
            assert!(!builder.extend(&snap, Vec3::new(1.0, 0.0, 1.0)), "{quality:?} surface took a vertex");
        }
        assert_eq!(builder.draft().unwrap().len(), 2);

        snap.surfaces[0].quality = TrackingQuality::Tracking;
        assert!(builder.extend(&snap, Vec3::new(1.0, 0.0, 1.0)));
    }

    #[test]
    fn short_draft_is_discarded() {
        let snap = TrackingSnapshot::default().with_surface(floor());
        let mut builder = ZoneBuilder::new(0.2);
        builder.begin(&snap.surfaces[0], Vec3::ZERO);
        builder.extend(&snap, Vec3::new(1.0, 0.0, 0.0));
        assert!(matches!(builder.finish(), FinishOutcome::Discarded { vertices: 2 }));
        assert!(matches!(builder.finish(), FinishOutcome::NoDraft));
    }

    #[test]
    fn sampled_points_land_inside() {
        let plane = Pose::IDENTITY;
        let tri = [Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 2.0)];
        let zone = SpawnZone::from_world(0, SurfaceId(1), plane, &tri).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..100 {
            let p = zone.sample_point(&mut rng, 256).expect("triangle covers half its box");
            assert!(zone.contains_world(p));
        }
    }

    #[test]
    fn sampling_gives_up_after_attempt_budget() {
        let sliver = [Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0001)];
        let zone = SpawnZone::from_world(0, SurfaceId(1), Pose::IDENTITY, &sliver).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        // zero attempts can never succeed
        assert!(zone.sample_point(&mut rng, 0).is_none());
    }
}
