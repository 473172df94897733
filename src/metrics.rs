//! Prometheus-compatible metrics endpoint
//!
//! Exposes simulation metrics in Prometheus text format and as JSON.
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::game::constants::sim::TICK_DURATION_MS;
use crate::lobby::manager::{Census, TickReport};

/// Rolling window for tick percentiles
const TICK_HISTORY: usize = 1000;

/// Metrics registry for the server
#[derive(Debug)]
pub struct Metrics {
    // Games
    pub games_total: AtomicU64,
    pub games_waiting: AtomicU64,
    pub games_starting: AtomicU64,
    pub games_active: AtomicU64,

    // Players
    pub players_total: AtomicU64,
    pub players_alive: AtomicU64,

    // Walls
    pub active_walls: AtomicU64,
    pub walls_spawned: AtomicU64,

    // Match outcomes
    pub eliminations: AtomicU64,
    pub matches_completed: AtomicU64,

    pub arenas_active: AtomicU64,

    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub budget_usage_percent: AtomicU64,
    pub tick_count: AtomicU64,

    start_time: Instant,
    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            games_total: AtomicU64::new(0),
            games_waiting: AtomicU64::new(0),
            games_starting: AtomicU64::new(0),
            games_active: AtomicU64::new(0),
            players_total: AtomicU64::new(0),
            players_alive: AtomicU64::new(0),
            active_walls: AtomicU64::new(0),
            walls_spawned: AtomicU64::new(0),
            eliminations: AtomicU64::new(0),
            matches_completed: AtomicU64::new(0),
            arenas_active: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            budget_usage_percent: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY)),
        }
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);
        self.budget_usage_percent
            .store(us * 100 / (TICK_DURATION_MS * 1000), Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us
                .store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us
                .store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us
                .store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Fold one manager tick into the gauges and counters
    pub fn observe(&self, census: &Census, report: &TickReport) {
        self.games_total.store(census.games as u64, Ordering::Relaxed);
        self.games_waiting.store(census.waiting as u64, Ordering::Relaxed);
        self.games_starting.store(census.starting as u64, Ordering::Relaxed);
        self.games_active.store(census.active as u64, Ordering::Relaxed);
        self.players_total.store(census.players as u64, Ordering::Relaxed);
        self.players_alive.store(census.alive_players as u64, Ordering::Relaxed);
        self.active_walls.store(census.active_walls as u64, Ordering::Relaxed);

        self.walls_spawned
            .fetch_add(report.walls_spawned as u64, Ordering::Relaxed);
        self.eliminations
            .fetch_add(report.eliminations as u64, Ordering::Relaxed);
        self.matches_completed
            .fetch_add(report.matches_completed as u64, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(4096);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("hitw_games", "Registered games", "gauge",
            self.games_total.load(Ordering::Relaxed));
        metric!("hitw_games_waiting", "Games gathering players", "gauge",
            self.games_waiting.load(Ordering::Relaxed));
        metric!("hitw_games_starting", "Games counting down", "gauge",
            self.games_starting.load(Ordering::Relaxed));
        metric!("hitw_games_active", "Games with walls running", "gauge",
            self.games_active.load(Ordering::Relaxed));

        metric!("hitw_players_total", "Players registered to a game", "gauge",
            self.players_total.load(Ordering::Relaxed));
        metric!("hitw_players_alive", "Players still standing", "gauge",
            self.players_alive.load(Ordering::Relaxed));

        metric!("hitw_walls_active", "Walls currently moving", "gauge",
            self.active_walls.load(Ordering::Relaxed));
        metric!("hitw_walls_spawned_total", "Walls spawned", "counter",
            self.walls_spawned.load(Ordering::Relaxed));
        metric!("hitw_eliminations_total", "Players eliminated by walls", "counter",
            self.eliminations.load(Ordering::Relaxed));
        metric!("hitw_matches_completed_total", "Matches that produced a result", "counter",
            self.matches_completed.load(Ordering::Relaxed));
        metric!("hitw_arenas_active", "Playable arenas", "gauge",
            self.arenas_active.load(Ordering::Relaxed));

        metric!("hitw_tick_time_microseconds", "Last tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("hitw_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("hitw_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("hitw_tick_time_max_microseconds", "Maximum tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("hitw_budget_usage_percent", "Tick budget usage percentage", "gauge",
            self.budget_usage_percent.load(Ordering::Relaxed));
        metric!("hitw_tick_count", "Total ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));
        metric!("hitw_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// JSON view of the same values
    pub fn to_json(&self) -> String {
        let load = |v: &AtomicU64| v.load(Ordering::Relaxed);
        serde_json::json!({
            "games": {
                "total": load(&self.games_total),
                "waiting": load(&self.games_waiting),
                "starting": load(&self.games_starting),
                "active": load(&self.games_active),
            },
            "players": {
                "total": load(&self.players_total),
                "alive": load(&self.players_alive),
            },
            "walls": {
                "active": load(&self.active_walls),
                "spawned": load(&self.walls_spawned),
            },
            "matches": {
                "completed": load(&self.matches_completed),
                "eliminations": load(&self.eliminations),
            },
            "arenas": {
                "active": load(&self.arenas_active),
            },
            "performance": {
                "tick_time_us": load(&self.tick_time_us),
                "tick_time_p95_us": load(&self.tick_time_p95_us),
                "tick_time_p99_us": load(&self.tick_time_p99_us),
                "tick_time_max_us": load(&self.tick_time_max_us),
                "budget_percent": load(&self.budget_usage_percent),
                "tick_count": load(&self.tick_count),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the HTTP response for a raw request
fn respond(metrics: &Metrics, request: &str) -> String {
    let path = request
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("GET "))
        .and_then(|rest| rest.split_whitespace().next());

    let (content_type, body) = match path {
        Some("/metrics/json") | Some("/json") => ("application/json", metrics.to_json()),
        Some("/metrics") => ("text/plain; version=0.0.4", metrics.to_prometheus()),
        Some("/health") | Some("/") => ("text/plain", "OK".to_string()),
        _ => return "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
    };

    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    )
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = respond(&metrics, &request);

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.games_total.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.tick_count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_tick_time() {
        let metrics = Metrics::new();

        for i in 0..100 {
            metrics.record_tick_time(Duration::from_micros(100 + i * 10));
        }

        assert_eq!(metrics.tick_count.load(Ordering::Relaxed), 100);
        assert!(metrics.tick_time_p95_us.load(Ordering::Relaxed) > 0);
        assert!(metrics.tick_time_p99_us.load(Ordering::Relaxed) > 0);
        assert_eq!(metrics.tick_time_max_us.load(Ordering::Relaxed), 1090);
    }

    #[test]
    fn test_budget_usage() {
        let metrics = Metrics::new();
        metrics.record_tick_time(Duration::from_millis(TICK_DURATION_MS / 2));
        assert_eq!(metrics.budget_usage_percent.load(Ordering::Relaxed), 50);
    }

    #[test]
    fn test_observe_accumulates_counters() {
        let metrics = Metrics::new();
        let census = Census {
            games: 3,
            waiting: 1,
            starting: 1,
            active: 1,
            players: 7,
            alive_players: 4,
            active_walls: 2,
        };
        let report = TickReport {
            walls_spawned: 2,
            eliminations: 1,
            matches_completed: 1,
            ..TickReport::default()
        };

        metrics.observe(&census, &report);
        metrics.observe(&census, &report);

        assert_eq!(metrics.games_active.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.players_alive.load(Ordering::Relaxed), 4);
        assert_eq!(metrics.walls_spawned.load(Ordering::Relaxed), 4);
        assert_eq!(metrics.eliminations.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.matches_completed.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.players_total.store(12, Ordering::Relaxed);
        metrics.active_walls.store(3, Ordering::Relaxed);

        let output = metrics.to_prometheus();

        assert!(output.contains("hitw_players_total 12"));
        assert!(output.contains("hitw_walls_active 3"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE hitw_walls_spawned_total counter"));
    }

    #[test]
    fn test_json_format() {
        let metrics = Metrics::new();
        metrics.players_total.store(100, Ordering::Relaxed);

        let value: serde_json::Value = serde_json::from_str(&metrics.to_json()).unwrap();

        assert_eq!(value["players"]["total"], 100);
        assert!(value["performance"].is_object());
    }

    #[test]
    fn test_routes() {
        let metrics = Metrics::new();

        let prom = respond(&metrics, "GET /metrics HTTP/1.1\r\n\r\n");
        assert!(prom.contains("text/plain; version=0.0.4"));

        let json = respond(&metrics, "GET /metrics/json HTTP/1.1\r\n\r\n");
        assert!(json.contains("application/json"));

        let health = respond(&metrics, "GET /health HTTP/1.1\r\n\r\n");
        assert!(health.ends_with("OK"));

        let missing = respond(&metrics, "GET /nope HTTP/1.1\r\n\r\n");
        assert!(missing.starts_with("HTTP/1.1 404"));
    }
}
