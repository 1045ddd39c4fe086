// src/ar/scheduler.rs
//! Timed enemy-creation sources, advanced as countdowns each tick.

use bevy::prelude::*;
use rand::Rng;

use super::config::SpawnConfig;
use super::core::Pose;
use super::zone::SpawnZone;

/// What a source spawns around.
#[derive(Clone, Debug)]
pub enum SpawnOrigin {
    Slot { index: usize, pose: Pose },
    Zone(SpawnZone),
}

#[derive(Clone, Debug)]
pub struct SpawnSource {
    pub id: u32,
    pub origin: SpawnOrigin,
    pub interval: f32,
    pub count: u32,
    emitted: u32,
    since_last: f32,
}

impl SpawnSource {
    pub fn emitted(&self) -> u32 {
        self.emitted
    }

    pub fn is_finished(&self) -> bool {
        self.emitted >= self.count
    }
}

/// One "create entity" request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnEvent {
    pub source: u32,
    /// Strictly increasing per source.
    pub sequence: u32,
    pub pose: Pose,
}

#[derive(Debug, Default)]
pub struct SpawnScheduler {
    sources: Vec<SpawnSource>,
    next_id: u32,
}

impl SpawnScheduler {
    pub fn activate_slot(&mut self, index: usize, pose: Pose, cfg: &SpawnConfig) -> u32 {
        self.push(SpawnOrigin::Slot { index, pose }, cfg.slot_interval, cfg.slot_count)
    }

    pub fn activate_zone(&mut self, zone: SpawnZone, cfg: &SpawnConfig) -> u32 {
        self.push(SpawnOrigin::Zone(zone), cfg.zone_interval, cfg.zone_wave_size)
    }

    fn push(&mut self, origin: SpawnOrigin, interval: f32, count: u32) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        debug!("Spawner: source {} activated ({} every {:.1}s)", id, count, interval);
        self.sources.push(SpawnSource { id, origin, interval, count, emitted: 0, since_last: 0.0 });
        id
    }

    pub fn sources(&self) -> &[SpawnSource] {
        &self.sources
    }

    pub fn active_count(&self) -> usize {
        self.sources.len()
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }

    /// Advance every countdown by `dt`; finished sources drop out.
    pub fn tick<R: Rng + ?Sized>(&mut self, dt: f32, rng: &mut R, max_sample_attempts: u32) -> Vec<SpawnEvent> {
        let mut out = Vec::new();

        for src in &mut self.sources {
            src.since_last += dt;
            while src.since_last >= src.interval && !src.is_finished() {
                src.since_last -= src.interval;
                let sequence = src.emitted;
                src.emitted += 1;

                let pose = match &src.origin {
                    SpawnOrigin::Slot { pose, .. } => Some(*pose),
                    SpawnOrigin::Zone(zone) => zone.sample_point(rng, max_sample_attempts).map(Pose::from_position),
                };
                match pose {
                    Some(pose) => out.push(SpawnEvent { source: src.id, sequence, pose }),
                    None => warn!("Spawner: source {} found no point inside its zone, skipping", src.id),
                }
            }
        }

        self.sources.retain(|s| {
            if s.is_finished() {
                debug!("Spawner: source {} exhausted", s.id);
            }
            !s.is_finished()
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ar::core::SurfaceId;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn square_zone() -> SpawnZone {
        let pts = [Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 2.0), Vec3::new(0.0, 0.0, 2.0)];
        SpawnZone::from_world(0, SurfaceId(1), Pose::IDENTITY, &pts).unwrap()
    }

    #[test]
    fn waits_one_interval_before_each_emission() {
        let cfg = SpawnConfig { slot_interval: 2.0, slot_count: 3, ..default() };
        let mut sched = SpawnScheduler::default();
        sched.activate_slot(0, Pose::from_position(Vec3::X), &cfg);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        assert!(sched.tick(1.9, &mut rng, 16).is_empty());
        let ev = sched.tick(0.2, &mut rng, 16);
        assert_eq!(ev.len(), 1);
        assert_eq!(ev[0].sequence, 0);
        assert_eq!(ev[0].pose.position, Vec3::X);
    }

    #[test]
    fn source_terminates_after_count() {
        let cfg = SpawnConfig { slot_interval: 1.0, slot_count: 3, ..default() };
        let mut sched = SpawnScheduler::default();
        sched.activate_slot(0, Pose::IDENTITY, &cfg);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let mut seqs = Vec::new();
        for _ in 0..20 {
            seqs.extend(sched.tick(0.5, &mut rng, 16).into_iter().map(|e| e.sequence));
        }
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(sched.active_count(), 0);
    }

    #[test]
    fn sources_count_down_independently() {
        let cfg = SpawnConfig { slot_interval: 2.0, slot_count: 5, zone_interval: 1.0, zone_wave_size: 5 };
        let mut sched = SpawnScheduler::default();
        let slot = sched.activate_slot(0, Pose::IDENTITY, &cfg);
        let zone = sched.activate_zone(square_zone(), &cfg);
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        let mut per_source = std::collections::HashMap::<u32, Vec<u32>>::new();
        for _ in 0..40 {
            for e in sched.tick(0.25, &mut rng, 256) {
                per_source.entry(e.source).or_default().push(e.sequence);
            }
        }
        // 10 seconds: zone finished its wave, slot emitted every 2s
        assert_eq!(per_source[&zone], vec![0, 1, 2, 3, 4]);
        assert_eq!(per_source[&slot], vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn zone_spawns_land_inside_polygon() {
        let cfg = SpawnConfig::default();
        let zone = square_zone();
        let mut sched = SpawnScheduler::default();
        sched.activate_zone(zone.clone(), &cfg);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let events = sched.tick(10.0, &mut rng, 256);
        assert_eq!(events.len(), cfg.zone_wave_size as usize);
        assert!(events.iter().all(|e| zone.contains_world(e.pose.position)));
    }
}
