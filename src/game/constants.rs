/// Simulation clock constants
pub mod sim {
    /// Fixed simulation rate in Hz
    pub const TICK_RATE: u32 = 20;
    /// Tick duration in milliseconds
    pub const TICK_DURATION_MS: u64 = 1000 / TICK_RATE as u64;
    /// Log a warning at most this often when ticks overrun their budget
    pub const OVERRUN_WARN_INTERVAL_SECS: u64 = 5;
}

/// Arena geometry constants
pub mod arena {
    /// Height of the barrier ring above the platform
    pub const BARRIER_HEIGHT: i32 = 10;
    /// Distance beyond each platform edge where walls spawn
    pub const WALL_SPAWN_OFFSET: f64 = 5.0;
    /// Hard validity bounds on platform size
    pub const MIN_VALID_SIZE: u32 = 5;
    pub const MAX_VALID_SIZE: u32 = 50;
    /// Default creation bounds (configurable)
    pub const DEFAULT_MIN_SIZE: u32 = 10;
    pub const DEFAULT_MAX_SIZE: u32 = 30;
    /// Platform size used when a definition omits it
    pub const DEFAULT_SIZE: u32 = 15;
}

/// Wall constants
pub mod wall {
    /// Extra width beyond the platform size so walls overhang both edges
    pub const WIDTH_PADDING: u32 = 2;
    /// Height of a participant for the simplified collision box
    pub const PLAYER_HEIGHT: f64 = 2.0;
    /// Smallest hole a standing participant fits through (cells per side)
    pub const MIN_PASSABLE_HOLE: usize = 2;
    /// Ticks between shifting-pattern reseeds (roughly one second)
    pub const SHIFT_RESEED_TICKS: u64 = super::sim::TICK_RATE as u64;
}

/// Game/match constants
pub mod game {
    /// Ticks between periodic wall spawns (3 simulated seconds)
    pub const WALL_SPAWN_INTERVAL: u32 = 60;
    /// Round at which games start
    pub const FIRST_ROUND: u32 = 1;
    /// Default STARTING countdown in seconds
    pub const COUNTDOWN_SECONDS: u32 = 10;
    /// Game mode tag written to match records
    pub const MODE: &str = "classic";
}

/// Scoring constants
pub mod score {
    /// Points for every wall survived
    pub const WALL_DODGE_POINTS: u32 = 10;
    /// Bonus for the last participant standing
    pub const WIN_BONUS_POINTS: u32 = 50;
}

/// Convert a tick count into simulated milliseconds
#[inline]
pub fn ticks_to_ms(ticks: u64) -> u64 {
    ticks * sim::TICK_DURATION_MS
}

/// Convert a per-second rate into a per-tick amount
#[inline]
pub fn per_tick(per_second: f64) -> f64 {
    per_second / sim::TICK_RATE as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_conversions() {
        assert_eq!(sim::TICK_DURATION_MS, 50);
        assert_eq!(ticks_to_ms(60), 3000);
        assert!((per_tick(2.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_spawn_interval_is_three_seconds() {
        assert_eq!(game::WALL_SPAWN_INTERVAL / sim::TICK_RATE, 3);
    }
}
