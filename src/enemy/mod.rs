// src/enemy/mod.rs

mod components;
mod systems;
mod plugin;

pub use components::Enemy;
pub use plugin::EnemyPlugin;
