pub mod arena;
pub mod arena_manager;
pub mod constants;
pub mod match_result;
pub mod pattern;
pub mod wall;
pub mod wall_manager;
