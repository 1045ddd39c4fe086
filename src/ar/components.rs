// src/ar/components.rs
use bevy::prelude::*;
use std::collections::HashMap;

use super::core::{EntityHandle, PlaceableType};

/// Marker on every placed anchor entity.
#[derive(Component)]
pub struct Anchor {
    pub tag: PlaceableType,
}

/// Closed spawn-zone boundary, drawn as a gizmo loop.
#[derive(Component)]
pub struct ZoneOutline {
    pub points: Vec<Vec3>,
}

/// Core handle -> ECS entity for what the placement core may destroy later.
/// Enemies get a handle but no entry; they own their own lifetime.
#[derive(Resource, Default)]
pub struct SpawnedEntities {
    next: u64,
    by_handle: HashMap<EntityHandle, Entity>,
}

impl SpawnedEntities {
    pub fn register(&mut self, ent: Entity) -> EntityHandle {
        let handle = self.issue();
        self.by_handle.insert(handle, ent);
        handle
    }

    /// Fresh handle with no entity behind it.
    pub fn issue(&mut self) -> EntityHandle {
        self.next += 1;
        EntityHandle(self.next)
    }

    /// Forget the handle (does not despawn).
    pub fn take(&mut self, handle: EntityHandle) -> Option<Entity> {
        self.by_handle.remove(&handle)
    }

    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }
}

/// Meshes/materials shared by all spawned visuals.
#[derive(Resource)]
pub struct SceneAssets {
    pub anchor_mesh: Handle<Mesh>,
    pub enemy_mesh: Handle<Mesh>,
    pub door: Handle<StandardMaterial>,
    pub window: Handle<StandardMaterial>,
    pub hatch: Handle<StandardMaterial>,
    pub entry: Handle<StandardMaterial>,
    pub enemy: Handle<StandardMaterial>,
}

impl SceneAssets {
    pub fn material_for(&self, tag: PlaceableType) -> Handle<StandardMaterial> {
        match tag {
            PlaceableType::Door => self.door.clone(),
            PlaceableType::Window => self.window.clone(),
            PlaceableType::Hatch => self.hatch.clone(),
            PlaceableType::Untyped => self.entry.clone(),
        }
    }
}
