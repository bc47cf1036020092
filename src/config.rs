//! Environment-driven configuration.

use std::time::Duration;

use crate::engine::StressConfig;

/// All simulator configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,

    /// PRNG seed; 0 picks a nondeterministic seed.
    pub seed: i64,
    pub tick_interval: Duration,
    pub snapshot_interval: Duration,
    /// Per-client send buffer, in frames.
    pub send_buffer: usize,

    pub trade_channel_capacity: usize,
    pub trade_writers: usize,

    pub stress: StressConfig,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let stress = StressConfig {
            calm_min_ms: env_u64("STRESS_CALM_MIN_MS", 10),
            calm_max_ms: env_u64("STRESS_CALM_MAX_MS", 50),
            active_min_ms: env_u64("STRESS_ACTIVE_MIN_MS", 2),
            active_max_ms: env_u64("STRESS_ACTIVE_MAX_MS", 10),
            burst_min_ms: env_u64("STRESS_BURST_MIN_MS", 1),
            burst_max_ms: env_u64("STRESS_BURST_MAX_MS", 2),
        };

        Self {
            host: env_str("FEED_HOST", "0.0.0.0"),
            port: env_u64("FEED_PORT", 8100) as u16,
            database_path: env_str("DATABASE_PATH", "./feedsim.db"),
            seed: env_i64("FEED_SEED", 0),
            tick_interval: Duration::from_millis(env_u64("TICK_INTERVAL_MS", 100)),
            snapshot_interval: Duration::from_secs(env_u64("SNAPSHOT_INTERVAL_SECS", 30)),
            send_buffer: env_u64("SEND_BUFFER", 4096) as usize,
            trade_channel_capacity: env_u64("TRADE_CHANNEL_CAPACITY", 4096) as usize,
            trade_writers: env_u64("TRADE_WRITERS", 2) as usize,
            stress,
        }
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
