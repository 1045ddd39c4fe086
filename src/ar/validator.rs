// src/ar/validator.rs
//! Accept / reject / self-heal candidate placements.

use bevy::prelude::*;

use super::config::{RaycastConfig, ValidationConfig};
use super::core::{PlaneAlignment, Pose, TrackedSurface, TrackingQuality};
use super::raycast::{camera_fallback_pose, HitSource};

/// Which extent minimum applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationProfile {
    /// Anchor placement: full distance / view-cone / surface rules.
    Point,
    /// Zone drawing: surface rules only, with the larger extent minimum.
    Zone,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RejectReason {
    TooClose { distance: f32 },
    TooFar { distance: f32 },
    OutsideViewCone { cos: f32 },
    SurfaceMissing,
    WrongAlignment(PlaneAlignment),
    NotTracking(TrackingQuality),
    SurfaceTooSmall { extents: Vec2 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Verdict {
    Accepted(Pose),
    /// Near-field hit replaced by the camera-forward position.
    Corrected(Pose),
    Rejected(RejectReason),
}

impl Verdict {
    pub fn pose(&self) -> Option<Pose> {
        match *self {
            Verdict::Accepted(p) | Verdict::Corrected(p) => Some(p),
            Verdict::Rejected(_) => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Verdict::Rejected(_))
    }
}

/// A pose to judge, plus the surface it was anchored to (if any).
#[derive(Clone, Copy, Debug)]
pub struct Candidate<'a> {
    pub pose: Pose,
    pub source: HitSource,
    pub surface: Option<&'a TrackedSurface>,
}

/// Seam for swapping placement rules.
pub trait PlacementPolicy {
    fn validate(&self, candidate: &Candidate<'_>, camera: &Pose, profile: ValidationProfile) -> Verdict;
}

/// Distance, view-cone and surface rules.
#[derive(Clone, Debug, Default)]
pub struct PlacementValidator {
    pub rules: ValidationConfig,
    pub fallback: RaycastConfig,
}

impl PlacementValidator {
    pub fn new(rules: ValidationConfig, fallback: RaycastConfig) -> Self {
        Self { rules, fallback }
    }

    pub fn min_extent(&self, profile: ValidationProfile) -> f32 {
        match profile {
            ValidationProfile::Point => self.rules.min_point_extent,
            ValidationProfile::Zone => self.rules.min_zone_extent,
        }
    }

    /// Alignment, tracking quality and size of a surface.
    pub fn check_surface(&self, surface: &TrackedSurface, profile: ValidationProfile) -> Result<(), RejectReason> {
        if surface.alignment != PlaneAlignment::HorizontalUp {
            return Err(RejectReason::WrongAlignment(surface.alignment));
        }
        if surface.quality != TrackingQuality::Tracking {
            return Err(RejectReason::NotTracking(surface.quality));
        }
        let min = self.min_extent(profile);
        if surface.extents.x < min || surface.extents.y < min {
            return Err(RejectReason::SurfaceTooSmall { extents: surface.extents });
        }
        Ok(())
    }
}

impl PlacementPolicy for PlacementValidator {
    fn validate(&self, candidate: &Candidate<'_>, camera: &Pose, profile: ValidationProfile) -> Verdict {
        if profile == ValidationProfile::Zone {
            return match (candidate.source, candidate.surface) {
                (HitSource::Surface(_), Some(s)) => match self.check_surface(s, profile) {
                    Ok(()) => Verdict::Accepted(candidate.pose),
                    Err(r) => Verdict::Rejected(r),
                },
                _ => Verdict::Rejected(RejectReason::SurfaceMissing),
            };
        }

        if candidate.source == HitSource::CameraFallback {
            return Verdict::Accepted(candidate.pose);
        }

        let to_candidate = candidate.pose.position - camera.position;
        let distance = to_candidate.length();
        if distance < self.rules.near_field_distance {
            let healed = camera_fallback_pose(camera, &self.fallback);
            debug!("Validator: near-field hit at {:.2}m, substituting camera-forward pose", distance);
            return Verdict::Corrected(healed);
        }

        if let HitSource::Surface(_) = candidate.source {
            let Some(surface) = candidate.surface else {
                return Verdict::Rejected(RejectReason::SurfaceMissing);
            };
            if let Err(r) = self.check_surface(surface, profile) {
                return Verdict::Rejected(r);
            }
        }

        if distance < self.rules.min_distance {
            return Verdict::Rejected(RejectReason::TooClose { distance });
        }
        if distance > self.rules.max_distance {
            return Verdict::Rejected(RejectReason::TooFar { distance });
        }

        let cos = camera.forward().dot(to_candidate / distance);
        if cos < self.rules.min_forward_cos {
            return Verdict::Rejected(RejectReason::OutsideViewCone { cos });
        }

        Verdict::Accepted(candidate.pose)
    }
}
