//! Hole in the Wall server library
//!
//! A last-player-standing minigame: walls with holes sweep across a floating
//! platform and anyone who cannot slip through a hole is knocked out.
//!
//! The simulation is driven by a fixed-rate tick clock calling
//! [`lobby::manager::GameManager::tick`]. The world grid and the player state
//! of the hosting server are reached through the [`world::WorldGrid`] and
//! [`host::PlayerHost`] traits.

pub mod config;
pub mod demo;
pub mod game;
pub mod host;
pub mod lobby;
pub mod metrics;
pub mod stats;
pub mod util;
pub mod world;
