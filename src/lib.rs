//! AR spawn placement: a tracking-feed-agnostic core (`ar`) plus the Bevy
//! glue and a desktop harness that stands in for a real AR session.

pub mod actions;
pub mod ar;
pub mod enemy;
pub mod input;
pub mod setup;
pub mod sim;
pub mod ui;
