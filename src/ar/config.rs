// src/ar/config.rs
//! Data-driven placement profile + loader.

use bevy::asset::{io::Reader, AssetLoader, LoadContext};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::core::PlaceableType;

// ---------- Public plugin to register asset+loader ----------

pub struct PlacementProfileAssetPlugin;

impl Plugin for PlacementProfileAssetPlugin {
    fn build(&self, app: &mut App) {
        app.init_asset::<PlacementProfile>()
            .register_asset_loader(PlacementProfileLoader);
    }
}

// ---------- Mode ----------

/// Which input path feeds the shared raycast/validator core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlacementMode {
    /// Anchors are dropped automatically at random after calibration.
    AutoRandom,
    /// Each tap places into the currently selected slot.
    #[default]
    SlotSelected,
    /// Press/move/release draws polygon spawn zones.
    ZoneBased,
}

// ---------- Sections ----------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaycastConfig {
    /// Growth of surface extents for the "estimated bounds" tier.
    pub estimated_bounds_scale: f32,
    /// Max ray-to-point distance for a feature-point hit.
    pub feature_point_radius: f32,
    pub fallback_distance: f32,
    pub fallback_drop: f32,
    /// |forward.y| above this counts as looking straight up/down.
    pub vertical_forward_threshold: f32,
}

impl Default for RaycastConfig {
    fn default() -> Self {
        Self {
            estimated_bounds_scale: 1.5,
            feature_point_radius: 0.05,
            fallback_distance: 1.5,
            fallback_drop: 1.0,
            vertical_forward_threshold: 0.99,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub min_distance: f32,
    pub max_distance: f32,
    /// cos of the half view cone (0.5 = 60 degrees).
    pub min_forward_cos: f32,
    pub near_field_distance: f32,
    pub min_point_extent: f32,
    pub min_zone_extent: f32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_distance: 1.5,
            max_distance: 4.0,
            min_forward_cos: 0.5,
            near_field_distance: 0.3,
            min_point_extent: 0.5,
            min_zone_extent: 2.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Seconds after which completion is allowed even with no surface.
    pub grace_period: f32,
    pub min_surfaces: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self { grace_period: 5.0, min_surfaces: 1 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotConfig {
    pub types: Vec<PlaceableType>,
    /// `None` = free mode (never decrements).
    pub budget: Option<u32>,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            types: vec![PlaceableType::Door, PlaceableType::Window, PlaceableType::Hatch],
            budget: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    pub min_point_distance: f32,
    pub max_sample_attempts: u32,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self { min_point_distance: 0.2, max_sample_attempts: 256 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoPlaceConfig {
    pub delay: f32,
    pub count: u32,
    pub max_attempts: u32,
    /// Screen-edge margin for random taps (pixels).
    pub screen_margin: f32,
    /// Keep random spots this far inside the surface edge.
    pub surface_margin: f32,
}

impl Default for AutoPlaceConfig {
    fn default() -> Self {
        Self { delay: 1.0, count: 3, max_attempts: 20, screen_margin: 100.0, surface_margin: 0.3 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub slot_interval: f32,
    pub slot_count: u32,
    pub zone_interval: f32,
    pub zone_wave_size: u32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self { slot_interval: 2.0, slot_count: 5, zone_interval: 1.0, zone_wave_size: 5 }
    }
}

// ---------- Profile ----------

/// Every tunable of the placement core. All fields default, so a profile
/// file only needs to name what it changes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub mode: PlacementMode,
    pub raycast: RaycastConfig,
    pub validation: ValidationConfig,
    pub calibration: CalibrationConfig,
    pub slots: SlotConfig,
    pub zones: ZoneConfig,
    pub auto_place: AutoPlaceConfig,
    pub spawn: SpawnConfig,
}

impl PlacementConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ProfileLoadError> {
        let cfg: PlacementConfig =
            ron::de::from_str(text).map_err(|e| ProfileLoadError::Ron(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would make the core misbehave.
    pub fn validate(&self) -> Result<(), ProfileLoadError> {
        let v = &self.validation;
        if v.min_distance < 0.0 || v.near_field_distance < 0.0 {
            return Err(ProfileLoadError::Invalid("distances must be non-negative".into()));
        }
        if v.min_distance > v.max_distance {
            return Err(ProfileLoadError::Invalid(format!(
                "min_distance {} exceeds max_distance {}",
                v.min_distance, v.max_distance
            )));
        }
        if !(-1.0..=1.0).contains(&v.min_forward_cos) {
            return Err(ProfileLoadError::Invalid("min_forward_cos must be in [-1, 1]".into()));
        }
        if self.zones.min_point_distance < 0.0 {
            return Err(ProfileLoadError::Invalid("min_point_distance must be non-negative".into()));
        }
        if self.spawn.slot_interval <= 0.0 || self.spawn.zone_interval <= 0.0 {
            return Err(ProfileLoadError::Invalid("spawn intervals must be positive".into()));
        }
        if self.slots.types.is_empty() {
            return Err(ProfileLoadError::Invalid("at least one slot type is required".into()));
        }
        Ok(())
    }
}

// ---------- Asset ----------

#[derive(Asset, TypePath, Clone, Debug)]
pub struct PlacementProfile {
    pub config: PlacementConfig,
}

#[derive(Default)]
pub struct PlacementProfileLoader;

impl AssetLoader for PlacementProfileLoader {
    type Asset = PlacementProfile;
    type Settings = ();
    type Error = ProfileLoadError;

    fn extensions(&self) -> &[&str] {
        &["placement.ron"]
    }

    async fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &Self::Settings,
        _load_context: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        let text = std::str::from_utf8(&bytes).map_err(|e| ProfileLoadError::Ron(e.to_string()))?;
        let config = PlacementConfig::from_ron_str(text)?;
        Ok(PlacementProfile { config })
    }
}

// ---------- Loader errors ----------

#[derive(thiserror::Error, Debug)]
pub enum ProfileLoadError {
    #[error("I/O while reading placement profile: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(String),
    #[error("Invalid placement profile: {0}")]
    Invalid(String),
}
