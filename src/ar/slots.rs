// src/ar/slots.rs
//! Slot index -> at most one live placed entity.

use bevy::prelude::*;

use super::core::{EntityHandle, PlaceableType, Pose, SceneSink, UiSink};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotBudget {
    /// "Level" mode: placements left.
    Bounded(u32),
    /// Free mode: never decrements.
    Unbounded,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacedEntity {
    pub handle: EntityHandle,
    pub pose: Pose,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlacementSlot {
    pub index: usize,
    pub tag: PlaceableType,
    pub occupant: Option<PlacedEntity>,
    pub budget: SlotBudget,
}

/// Owns every slot and the single selection.
#[derive(Debug, Default)]
pub struct SlotManager {
    slots: Vec<PlacementSlot>,
    selected: usize,
}

impl SlotManager {
    /// One slot per tag; `budget = None` means free mode.
    pub fn new(tags: &[PlaceableType], budget: Option<u32>) -> Self {
        let budget = budget.map_or(SlotBudget::Unbounded, SlotBudget::Bounded);
        let slots = tags
            .iter()
            .enumerate()
            .map(|(index, &tag)| PlacementSlot { index, tag, occupant: None, budget })
            .collect();
        Self { slots, selected: 0 }
    }

    pub fn slots(&self) -> &[PlacementSlot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&PlacementSlot> {
        self.slots.get(index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn selected_slot(&self) -> usize {
        self.selected
    }

    pub fn select(&mut self, index: usize) -> Result<(), SlotError> {
        if index >= self.slots.len() {
            return Err(SlotError::UnknownSlot(index));
        }
        self.selected = index;
        debug!("Slots: selected slot {} ({:?})", index, self.slots[index].tag);
        Ok(())
    }

    /// Live occupants across all slots.
    pub fn placed_count(&self) -> usize {
        self.slots.iter().filter(|s| s.occupant.is_some()).count()
    }

    /// Occupied slots, in index order.
    pub fn occupied(&self) -> impl Iterator<Item = &PlacementSlot> {
        self.slots.iter().filter(|s| s.occupant.is_some())
    }

    /// Place into `index`, tearing down any previous occupant first.
    pub fn assign(
        &mut self,
        index: usize,
        pose: Pose,
        scene: &mut dyn SceneSink,
        ui: &mut dyn UiSink,
    ) -> Result<EntityHandle, SlotError> {
        let slot = self.slots.get_mut(index).ok_or(SlotError::UnknownSlot(index))?;
        if slot.budget == SlotBudget::Bounded(0) {
            return Err(SlotError::Exhausted(index));
        }

        if let Some(old) = slot.occupant.take() {
            debug!("Slots: replacing occupant of slot {}", index);
            scene.destroy(old.handle);
        }

        let handle = scene.spawn_anchor(pose, slot.tag);
        slot.occupant = Some(PlacedEntity { handle, pose });
        if let SlotBudget::Bounded(n) = &mut slot.budget {
            *n -= 1;
        }

        info!("Slots: placed {} in slot {} at {:?}", slot.tag.label(), index, pose.position);
        ui.on_placed(slot.tag);
        Ok(handle)
    }

    /// Destroy every occupant and restore budgets (session reset).
    pub fn clear(&mut self, scene: &mut dyn SceneSink, budget: Option<u32>) {
        let budget = budget.map_or(SlotBudget::Unbounded, SlotBudget::Bounded);
        for slot in &mut self.slots {
            if let Some(old) = slot.occupant.take() {
                scene.destroy(old.handle);
            }
            slot.budget = budget;
        }
        self.selected = 0;
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("no slot with index {0}")]
    UnknownSlot(usize),
    #[error("slot {0} has no placements left")]
    Exhausted(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingScene {
        next: u64,
        live: Vec<EntityHandle>,
        destroyed: Vec<EntityHandle>,
    }

    impl SceneSink for RecordingScene {
        fn spawn_anchor(&mut self, _pose: Pose, _tag: PlaceableType) -> EntityHandle {
            self.next += 1;
            let h = EntityHandle(self.next);
            self.live.push(h);
            h
        }
        fn spawn_zone_outline(&mut self, _zone: &[Vec3]) -> EntityHandle {
            unreachable!()
        }
        fn spawn_enemy(&mut self, _pose: Pose) -> EntityHandle {
            unreachable!()
        }
        fn destroy(&mut self, handle: EntityHandle) {
            self.live.retain(|h| *h != handle);
            self.destroyed.push(handle);
        }
    }

    #[derive(Default)]
    struct PlacedLog(Vec<PlaceableType>);

    impl UiSink for PlacedLog {
        fn on_placed(&mut self, tag: PlaceableType) {
            self.0.push(tag);
        }
    }

    const TAGS: [PlaceableType; 3] = [PlaceableType::Door, PlaceableType::Window, PlaceableType::Hatch];

    #[test]
    fn reassigning_slot_replaces_entity() {
        let mut slots = SlotManager::new(&TAGS, None);
        let mut scene = RecordingScene::default();
        let mut ui = PlacedLog::default();

        let first = slots.assign(0, Pose::IDENTITY, &mut scene, &mut ui).unwrap();
        let second = slots.assign(0, Pose::from_position(Vec3::X), &mut scene, &mut ui).unwrap();

        assert_eq!(scene.live, vec![second]);
        assert_eq!(scene.destroyed, vec![first]);
        assert_eq!(slots.placed_count(), 1);
        assert_eq!(slots.slot(0).unwrap().occupant.unwrap().handle, second);
        assert_eq!(ui.0, vec![PlaceableType::Door, PlaceableType::Door]);
    }

    #[test]
    fn bounded_budget_decrements_until_exhausted() {
        let mut slots = SlotManager::new(&TAGS, Some(2));
        let mut scene = RecordingScene::default();

        slots.assign(1, Pose::IDENTITY, &mut scene, &mut ()).unwrap();
        assert_eq!(slots.slot(1).unwrap().budget, SlotBudget::Bounded(1));
        slots.assign(1, Pose::IDENTITY, &mut scene, &mut ()).unwrap();
        assert_eq!(
            slots.assign(1, Pose::IDENTITY, &mut scene, &mut ()),
            Err(SlotError::Exhausted(1))
        );
        // the exhausted attempt did not tear down the live entity
        assert_eq!(scene.live.len(), 1);
    }

    #[test]
    fn free_mode_never_decrements() {
        let mut slots = SlotManager::new(&TAGS, None);
        let mut scene = RecordingScene::default();
        for _ in 0..10 {
            slots.assign(2, Pose::IDENTITY, &mut scene, &mut ()).unwrap();
        }
        assert_eq!(slots.slot(2).unwrap().budget, SlotBudget::Unbounded);
    }

    #[test]
    fn selection_is_checked() {
        let mut slots = SlotManager::new(&TAGS, None);
        slots.select(2).unwrap();
        assert_eq!(slots.selected_slot(), 2);
        assert_eq!(slots.select(3), Err(SlotError::UnknownSlot(3)));
        assert_eq!(slots.selected_slot(), 2);
    }

    #[test]
    fn clear_destroys_everything() {
        let mut slots = SlotManager::new(&TAGS, Some(1));
        let mut scene = RecordingScene::default();
        slots.assign(0, Pose::IDENTITY, &mut scene, &mut ()).unwrap();
        slots.assign(1, Pose::IDENTITY, &mut scene, &mut ()).unwrap();

        slots.clear(&mut scene, Some(1));
        assert!(scene.live.is_empty());
        assert_eq!(slots.placed_count(), 0);
        assert_eq!(slots.slot(0).unwrap().budget, SlotBudget::Bounded(1));
    }
}
