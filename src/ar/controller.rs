// src/ar/controller.rs
//! Per-tick orchestration: mode gating, input routing, validation,
//! commits and spawn activation. All collaborators arrive through `ArContext`.

use std::fmt;

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::config::{PlacementConfig, PlacementMode};
use super::core::{
    ArCommand, CameraPoseProvider, EntityHandle, PlaceableType, PointerEvent, PointerPhase, Pose,
    SceneSink, SurfaceRegistry, TrackedSurface, UiSink,
};
use super::raycast::{HitSource, HitTier, PlacementError, RayCastService, ResolvedPlacement, TrackableRaycaster};
use super::scheduler::SpawnScheduler;
use super::session::{ArMode, ModeMachine};
use super::slots::SlotManager;
use super::surfaces::detected_surface_count;
use super::validator::{Candidate, PlacementPolicy, PlacementValidator, ValidationProfile, Verdict};
use super::zone::{FinishOutcome, SpawnZone, ZoneBuilder};

/// Everything the core needs from outside for one tick.
pub struct ArContext<'a> {
    pub surfaces: &'a dyn SurfaceRegistry,
    pub camera: &'a dyn CameraPoseProvider,
    pub raycaster: &'a dyn TrackableRaycaster,
    pub scene: &'a mut dyn SceneSink,
    pub ui: &'a mut dyn UiSink,
}

/// A tap asking for a placement into a slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementRequest {
    pub screen: Vec2,
    pub timestamp: f32,
    pub slot: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AutoPlaceReport {
    pub attempts: u32,
    pub placed: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub placed: u32,
    pub zones_closed: u32,
    pub enemies_spawned: u32,
    pub auto_place: Option<AutoPlaceReport>,
}

/// Diagnostic fields for the status overlay.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusSnapshot {
    pub mode: ArMode,
    pub time_in_mode: f32,
    pub placement_mode: PlacementMode,
    pub camera_available: bool,
    pub surfaces_tracked: usize,
    pub surfaces_total: usize,
    pub feature_points: usize,
    pub calibration_elapsed: Option<f32>,
    pub calibration_eligible: bool,
    pub selected_slot: usize,
    /// Tag and occupancy per slot, in index order.
    pub slots: Vec<(PlaceableType, bool)>,
    pub placed: usize,
    pub zones: usize,
    pub draft_vertices: usize,
    pub active_spawn_sources: usize,
    /// Enemies still to come from the active sources.
    pub pending_spawns: u32,
    /// Session clock of the last tap routed to placement.
    pub last_request_at: Option<f32>,
    pub last_tier: Option<HitTier>,
    pub last_source: Option<HitSource>,
    pub last_verdict: Option<Verdict>,
    pub last_error: Option<PlacementError>,
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "AR Status: {:?} for {:.1}s ({:?})", self.mode, self.time_in_mode, self.placement_mode)?;
        writeln!(f, "Camera: {}", if self.camera_available { "tracking" } else { "unavailable" })?;
        writeln!(f, "Surfaces detected: {} / {}", self.surfaces_tracked, self.surfaces_total)?;
        writeln!(f, "Feature points: {}", self.feature_points)?;
        if let Some(elapsed) = self.calibration_elapsed {
            writeln!(
                f,
                "Calibrating: {:.1}s{}",
                elapsed,
                if self.calibration_eligible { " (tap to continue)" } else { "" }
            )?;
        }
        write!(f, "Slots:")?;
        for (i, (tag, occupied)) in self.slots.iter().enumerate() {
            let cursor = if i == self.selected_slot { ">" } else { " " };
            write!(f, " {}{}{}", cursor, tag.label(), if *occupied { "*" } else { "" })?;
        }
        writeln!(f)?;
        writeln!(f, "Placed: {}  Zones: {}  Draft: {}", self.placed, self.zones, self.draft_vertices)?;
        writeln!(f, "Spawn sources: {} ({} enemies pending)", self.active_spawn_sources, self.pending_spawns)?;
        if let Some(t) = self.last_request_at {
            writeln!(f, "Last request: t={:.1}s", t)?;
        }
        match (self.last_tier, self.last_source) {
            (Some(t), Some(s)) => writeln!(f, "Last raycast: {:?} via {:?}", s, t)?,
            (None, Some(s)) => writeln!(f, "Last raycast: {:?}", s)?,
            _ => writeln!(f, "Last raycast: -")?,
        }
        if let Some(v) = &self.last_verdict {
            writeln!(f, "Last verdict: {:?}", v)?;
        }
        if let Some(e) = &self.last_error {
            write!(f, "Last error: {}", e)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct AutoPlaceState {
    waited: f32,
    done: bool,
}

#[derive(Debug, Default)]
struct Diagnostics {
    last_tier: Option<HitTier>,
    last_source: Option<HitSource>,
    last_verdict: Option<Verdict>,
    last_error: Option<PlacementError>,
    last_request_at: Option<f32>,
}

struct CommittedZone {
    zone: SpawnZone,
    outline: EntityHandle,
}

pub struct PlacementController {
    cfg: PlacementConfig,
    machine: ModeMachine,
    slots: SlotManager,
    builder: ZoneBuilder,
    zones: Vec<CommittedZone>,
    scheduler: SpawnScheduler,
    policy: Box<dyn PlacementPolicy + Send + Sync>,
    rng: ChaCha8Rng,
    auto: AutoPlaceState,
    diag: Diagnostics,
    clock: f32,
}

impl PlacementController {
    pub fn new(cfg: PlacementConfig, seed: u64) -> Self {
        let policy = PlacementValidator::new(cfg.validation.clone(), cfg.raycast.clone());
        Self {
            machine: ModeMachine::new(cfg.calibration.clone()),
            slots: SlotManager::new(&cfg.slots.types, cfg.slots.budget),
            builder: ZoneBuilder::new(cfg.zones.min_point_distance),
            zones: Vec::new(),
            scheduler: SpawnScheduler::default(),
            policy: Box::new(policy),
            rng: ChaCha8Rng::seed_from_u64(seed),
            auto: AutoPlaceState::default(),
            diag: Diagnostics::default(),
            clock: 0.0,
            cfg,
        }
    }

    /// Replace the placement rules (e.g. stricter policy, test doubles).
    pub fn with_policy(mut self, policy: impl PlacementPolicy + Send + Sync + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Swap in a new profile. Slots are rebuilt only while idle.
    pub fn apply_config(&mut self, cfg: PlacementConfig) {
        self.machine.set_config(cfg.calibration.clone());
        self.builder.set_min_point_distance(cfg.zones.min_point_distance);
        self.policy = Box::new(PlacementValidator::new(cfg.validation.clone(), cfg.raycast.clone()));
        if self.machine.mode() == ArMode::Idle {
            self.slots = SlotManager::new(&cfg.slots.types, cfg.slots.budget);
        }
        self.cfg = cfg;
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.cfg
    }

    pub fn mode(&self) -> ArMode {
        self.machine.mode()
    }

    /// Whether the tracking feed should be running (calibrating or placing).
    pub fn scanning(&self) -> bool {
        self.machine.scanning()
    }

    pub fn slots(&self) -> &SlotManager {
        &self.slots
    }

    pub fn zones(&self) -> impl Iterator<Item = &SpawnZone> {
        self.zones.iter().map(|z| &z.zone)
    }

    pub fn scheduler(&self) -> &SpawnScheduler {
        &self.scheduler
    }

    pub fn draft_vertices(&self) -> usize {
        self.builder.draft().map_or(0, |d| d.len())
    }

    /// World positions of the zone being drawn, for preview.
    pub fn draft_points(&self) -> Vec<Vec3> {
        self.builder.draft().map(|d| d.world_points()).unwrap_or_default()
    }

    pub fn placed_count(&self) -> usize {
        self.slots.placed_count()
    }

    pub fn detected_surface_count(&self, surfaces: &dyn SurfaceRegistry) -> usize {
        detected_surface_count(surfaces)
    }

    pub fn status_snapshot(&self, surfaces: &dyn SurfaceRegistry, camera: &dyn CameraPoseProvider) -> StatusSnapshot {
        StatusSnapshot {
            mode: self.machine.mode(),
            time_in_mode: self.machine.time_in_mode(),
            placement_mode: self.cfg.mode,
            camera_available: camera.camera_frame().is_some(),
            surfaces_tracked: detected_surface_count(surfaces),
            surfaces_total: surfaces.all_surfaces().len(),
            feature_points: surfaces.feature_points().len(),
            calibration_elapsed: self.machine.calibration().map(|c| c.elapsed),
            calibration_eligible: self.machine.calibration_eligible(),
            selected_slot: self.slots.selected_slot(),
            slots: self.slots.slots().iter().map(|s| (s.tag, s.occupant.is_some())).collect(),
            placed: self.slots.placed_count(),
            zones: self.zones.len(),
            draft_vertices: self.draft_vertices(),
            active_spawn_sources: self.scheduler.active_count(),
            pending_spawns: self.scheduler.sources().iter().map(|s| s.count - s.emitted()).sum(),
            last_request_at: self.diag.last_request_at,
            last_tier: self.diag.last_tier,
            last_source: self.diag.last_source,
            last_verdict: self.diag.last_verdict,
            last_error: self.diag.last_error.clone(),
        }
    }

    // ---------- Commands ----------

    pub fn handle_command(&mut self, cmd: ArCommand, ctx: &mut ArContext<'_>) {
        match cmd {
            ArCommand::SelectSlot(i) => {
                if let Err(e) = self.slots.select(i) {
                    warn!("Placement: {}", e);
                }
            }
            ArCommand::StartCalibration => {
                if let Err(e) = self.machine.start_calibration() {
                    warn!("Placement: {}", e);
                }
            }
            ArCommand::ConfirmCalibration => self.confirm_calibration(ctx),
            ArCommand::StartGame => self.start_game(),
            ArCommand::Reset { teardown_spawns } => self.reset(ctx, teardown_spawns),
        }
    }

    fn confirm_calibration(&mut self, ctx: &mut ArContext<'_>) {
        match self.machine.confirm_calibration() {
            Ok(()) => {
                self.auto = AutoPlaceState::default();
                ctx.ui.on_calibration_complete();
            }
            Err(e) => debug!("Placement: calibration confirm ignored: {}", e),
        }
    }

    /// Freeze placements and turn every committed slot and zone into a spawn source.
    fn start_game(&mut self) {
        if let Err(e) = self.machine.start_game() {
            warn!("Placement: {}", e);
            return;
        }
        self.builder.cancel();

        for slot in self.slots.occupied() {
            if let Some(occupant) = slot.occupant {
                self.scheduler.activate_slot(slot.index, occupant.pose, &self.cfg.spawn);
            }
        }
        for committed in &self.zones {
            self.scheduler.activate_zone(committed.zone.clone(), &self.cfg.spawn);
        }
        info!(
            "Placement: game started with {} anchors and {} zones",
            self.slots.placed_count(),
            self.zones.len()
        );
    }

    /// Back to Idle. Running spawn sources survive unless `teardown_spawns`.
    fn reset(&mut self, ctx: &mut ArContext<'_>, teardown_spawns: bool) {
        self.machine.reset();
        self.builder.cancel();
        self.slots.clear(ctx.scene, self.cfg.slots.budget);
        for committed in self.zones.drain(..) {
            ctx.scene.destroy(committed.outline);
        }
        if teardown_spawns {
            self.scheduler.clear();
        }
        self.auto = AutoPlaceState::default();
        self.diag = Diagnostics::default();
    }

    // ---------- Tick ----------

    pub fn tick(&mut self, dt: f32, input: &[PointerEvent], ctx: &mut ArContext<'_>) -> TickReport {
        let mut report = TickReport::default();
        self.clock += dt;

        let usable = detected_surface_count(ctx.surfaces);
        self.machine.tick(dt, usable);

        match self.machine.mode() {
            ArMode::Calibrating => {
                if let Some(cal) = self.machine.calibration().copied() {
                    ctx.ui.on_calibration_progress(cal.surface_count, cal.elapsed);
                }
                // one calibration tap per tick
                if first_of(input, PointerPhase::Began).is_some() {
                    self.confirm_calibration(ctx);
                }
            }
            ArMode::Placing => {
                if self.cfg.mode == PlacementMode::AutoRandom && !self.auto.done {
                    self.auto.waited += dt;
                    if self.auto.waited >= self.cfg.auto_place.delay {
                        let r = self.auto_place(ctx);
                        self.auto.done = true;
                        report.placed += r.placed;
                        report.auto_place = Some(r);
                    }
                }
                self.route_input(input, ctx, &mut report);
            }
            ArMode::Idle | ArMode::Active => {}
        }

        let max_attempts = self.cfg.zones.max_sample_attempts;
        for ev in self.scheduler.tick(dt, &mut self.rng, max_attempts) {
            ctx.scene.spawn_enemy(ev.pose);
            report.enemies_spawned += 1;
        }

        report
    }

    fn route_input(&mut self, input: &[PointerEvent], ctx: &mut ArContext<'_>, report: &mut TickReport) {
        match self.cfg.mode {
            PlacementMode::SlotSelected | PlacementMode::AutoRandom => {
                if let Some(ev) = first_of(input, PointerPhase::Began) {
                    let request = PlacementRequest {
                        screen: ev.screen,
                        timestamp: self.clock,
                        slot: self.slots.selected_slot(),
                    };
                    if let Ok(Some(_)) = self.place(request, ctx) {
                        report.placed += 1;
                    }
                }
            }
            PlacementMode::ZoneBased => {
                // arrival order, at most one event per phase
                let mut handled: Vec<PointerPhase> = Vec::with_capacity(3);
                for ev in input.iter().filter(|e| !e.over_ui) {
                    if handled.contains(&ev.phase) {
                        continue;
                    }
                    handled.push(ev.phase);
                    match ev.phase {
                        PointerPhase::Began => self.zone_begin(ev.screen, ctx),
                        PointerPhase::Moved => self.zone_extend(ev.screen, ctx),
                        PointerPhase::Ended => {
                            if self.zone_finish(ctx) {
                                report.zones_closed += 1;
                            }
                        }
                    }
                }
            }
        }
    }

    // ---------- Point placement ----------

    /// Cast, validate and commit one tap. `Ok(None)` = rejected by policy.
    pub fn place(
        &mut self,
        request: PlacementRequest,
        ctx: &mut ArContext<'_>,
    ) -> Result<Option<EntityHandle>, PlacementError> {
        self.diag.last_request_at = Some(request.timestamp);
        let camera = ctx.camera.camera_frame();
        let service = RayCastService::new(ctx.raycaster, &self.cfg.raycast);
        let resolved = match service.cast(request.screen, camera.as_ref()) {
            Ok(r) => r,
            Err(e) => return Err(self.report_error(e, ctx)),
        };
        self.note_hit(&resolved);

        let Some(camera) = camera else { return Err(self.report_error(PlacementError::NoCameraPose, ctx)); };
        let surface = resolved.source.surface().and_then(|id| ctx.surfaces.surface_by_id(id));
        let candidate = Candidate { pose: resolved.pose, source: resolved.source, surface };
        let verdict = self.policy.validate(&candidate, &camera.pose, ValidationProfile::Point);
        self.diag.last_verdict = Some(verdict);

        let Some(pose) = verdict.pose() else {
            debug!("Placement: request at {:?} rejected: {:?}", request.screen, verdict);
            return Ok(None);
        };
        match self.slots.assign(request.slot, pose, ctx.scene, ctx.ui) {
            Ok(handle) => Ok(Some(handle)),
            Err(e) => {
                warn!("Placement: {}", e);
                Ok(None)
            }
        }
    }

    /// Drop up to `auto_place.count` anchors (one per slot) at random taps.
    /// Always terminates after `auto_place.max_attempts`.
    pub fn auto_place(&mut self, ctx: &mut ArContext<'_>) -> AutoPlaceReport {
        let cfg = self.cfg.auto_place.clone();
        let target = cfg.count.min(self.slots.len() as u32);
        let mut report = AutoPlaceReport::default();
        info!("Placement: auto-placing {} anchors", target);

        let Some(camera) = ctx.camera.camera_frame() else {
            self.report_error(PlacementError::NoCameraPose, ctx);
            return report;
        };
        if self.slots.is_empty() {
            return report;
        }

        while report.placed < target && report.attempts < cfg.max_attempts {
            report.attempts += 1;
            let screen = random_screen_point(&mut self.rng, camera.viewport, cfg.screen_margin);

            let service = RayCastService::new(ctx.raycaster, &self.cfg.raycast);
            let Ok(Some(hit)) = service.cast_restricted(screen, Some(&camera), HitTier::PlaneWithinPolygon) else {
                continue;
            };
            let Some(surface) = hit.source.surface().and_then(|id| ctx.surfaces.surface_by_id(id)) else {
                continue;
            };

            let spot = safe_spot_on_surface(&mut self.rng, surface, cfg.surface_margin);
            let candidate = Candidate {
                pose: Pose::new(spot, surface.pose.rotation),
                source: hit.source,
                surface: Some(surface),
            };
            let Some(pose) = self.policy.validate(&candidate, &camera.pose, ValidationProfile::Point).pose() else {
                continue;
            };

            let slot = report.placed as usize;
            if self.slots.assign(slot, pose, ctx.scene, ctx.ui).is_ok() {
                report.placed += 1;
                debug!("Placement: auto-placed {}/{}", report.placed, target);
            }
        }

        if report.placed < target {
            warn!(
                "Placement: only auto-placed {}/{} after {} attempts",
                report.placed, target, report.attempts
            );
        } else {
            info!("Placement: auto-placed {} anchors", report.placed);
        }
        report
    }

    // ---------- Zone drawing ----------

    /// Tier-1 hit on a surface that passes the zone rules.
    fn resolve_zone_point<'s>(
        &mut self,
        screen: Vec2,
        ctx: &mut ArContext<'s>,
    ) -> Option<(&'s TrackedSurface, Vec3)> {
        let camera = ctx.camera.camera_frame();
        let service = RayCastService::new(ctx.raycaster, &self.cfg.raycast);
        let hit = match service.cast_restricted(screen, camera.as_ref(), HitTier::PlaneWithinPolygon) {
            Ok(Some(hit)) => hit,
            Ok(None) => return None,
            Err(e) => {
                self.report_error(e, ctx);
                return None;
            }
        };
        self.note_hit(&hit);

        let camera = camera?;
        let surfaces: &'s dyn SurfaceRegistry = ctx.surfaces;
        let surface = hit.source.surface().and_then(|id| surfaces.surface_by_id(id))?;
        let candidate = Candidate { pose: hit.pose, source: hit.source, surface: Some(surface) };
        let verdict = self.policy.validate(&candidate, &camera.pose, ValidationProfile::Zone);
        self.diag.last_verdict = Some(verdict);
        verdict.pose().map(|p| (surface, p.position))
    }

    fn zone_begin(&mut self, screen: Vec2, ctx: &mut ArContext<'_>) {
        if let Some((surface, point)) = self.resolve_zone_point(screen, ctx) {
            self.builder.begin(surface, point);
        }
    }

    fn zone_extend(&mut self, screen: Vec2, ctx: &mut ArContext<'_>) {
        if self.builder.draft().is_none() {
            return;
        }
        if let Some((_, point)) = self.resolve_zone_point(screen, ctx) {
            self.builder.extend(ctx.surfaces, point);
        }
    }

    fn zone_finish(&mut self, ctx: &mut ArContext<'_>) -> bool {
        match self.builder.finish() {
            FinishOutcome::Promoted(zone) => {
                let outline = ctx.scene.spawn_zone_outline(&zone.world_points());
                self.zones.push(CommittedZone { zone, outline });
                true
            }
            FinishOutcome::Discarded { .. } | FinishOutcome::NoDraft => false,
        }
    }

    // ---------- Helpers ----------

    fn note_hit(&mut self, hit: &ResolvedPlacement) {
        self.diag.last_tier = hit.tier;
        self.diag.last_source = Some(hit.source);
    }

    fn report_error(&mut self, e: PlacementError, ctx: &mut ArContext<'_>) -> PlacementError {
        error!("Placement: request failed: {}", e);
        ctx.ui.on_placement_error(&e.to_string());
        self.diag.last_error = Some(e.clone());
        e
    }
}

/// First non-UI event of `phase` this tick.
fn first_of(input: &[PointerEvent], phase: PointerPhase) -> Option<&PointerEvent> {
    input.iter().find(|e| e.phase == phase && !e.over_ui)
}

fn random_screen_point<R: Rng + ?Sized>(rng: &mut R, viewport: Vec2, margin: f32) -> Vec2 {
    let m = Vec2::splat(margin).min(viewport * 0.5);
    Vec2::new(
        rng.random_range(m.x..=viewport.x - m.x),
        rng.random_range(m.y..=viewport.y - m.y),
    )
}

/// Random point on the surface at least `margin` from its edges.
fn safe_spot_on_surface<R: Rng + ?Sized>(rng: &mut R, surface: &TrackedSurface, margin: f32) -> Vec3 {
    let half = (surface.extents * 0.5 - Vec2::splat(margin)).max(Vec2::ZERO);
    let local = Vec2::new(rng.random_range(-half.x..=half.x), rng.random_range(-half.y..=half.y));
    surface.from_plane_2d(local)
}
