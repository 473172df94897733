//! Match lifecycle
//!
//! Games, their participants, and the registry that routes players to them.

pub mod game;
pub mod manager;
pub mod player;
