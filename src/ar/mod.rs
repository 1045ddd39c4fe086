pub mod core;
pub mod config;
pub mod surfaces;
pub mod raycast;
pub mod validator;
pub mod zone;
pub mod slots;
pub mod session;
pub mod scheduler;
pub mod controller;
pub mod components;
pub mod systems;
pub mod plugin;

pub use controller::{ArContext, PlacementController, StatusSnapshot};
pub use plugin::{ArPlacement, ArPlacementPlugin, PlacementSettings};
