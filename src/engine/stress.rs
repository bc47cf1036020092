//! Variable-rate tick controller for the stress symbol.
//!
//! Intensity follows a sine wave plus a mean-reverting random walk, which
//! gives smooth ramps between calm, active, and burst phases instead of
//! square-wave load changes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::engine::rng::Rng;

/// Current intensity phase for the stress symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StressPhase {
    Calm,
    Active,
    Burst,
}

impl StressPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            StressPhase::Calm => "calm",
            StressPhase::Active => "active",
            StressPhase::Burst => "burst",
        }
    }
}

/// Tick-interval bounds per phase, in milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct StressConfig {
    pub calm_min_ms: u64,
    pub calm_max_ms: u64,
    pub active_min_ms: u64,
    pub active_max_ms: u64,
    pub burst_min_ms: u64,
    pub burst_max_ms: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            calm_min_ms: 10,
            calm_max_ms: 50,
            active_min_ms: 2,
            active_max_ms: 10,
            burst_min_ms: 1,
            burst_max_ms: 2,
        }
    }
}

pub struct StressController {
    rng: Arc<Rng>,
    config: StressConfig,

    phase: StressPhase,
    phase_start: Instant,
    phase_duration: Duration,
    intensity: f64,

    /// Sine-wave time parameter, advanced a fixed step per tick.
    t: f64,
    t_step: f64,
    random_walk: f64,
}

impl StressController {
    pub fn new(rng: Arc<Rng>, config: StressConfig) -> Self {
        let mut ctrl = Self {
            rng,
            config,
            phase: StressPhase::Calm,
            phase_start: Instant::now(),
            phase_duration: Duration::ZERO,
            intensity: 0.0,
            t: 0.0,
            t_step: 0.01,
            random_walk: 0.0,
        };
        ctrl.phase_duration = ctrl.random_duration(30, 120);
        ctrl
    }

    /// Advances the controller one step and returns the sleep interval and
    /// the number of order book actions for this tick.
    pub fn tick(&mut self) -> (Duration, usize) {
        self.t += self.t_step;
        let sine = (self.t.sin() + 1.0) / 2.0;

        // Random walk with mean reversion.
        self.random_walk += self.rng.gaussian() * 0.02;
        self.random_walk *= 0.98;

        self.intensity = (sine + self.random_walk).clamp(0.0, 1.0);

        // Rare mega-spike of maximum throughput.
        if self.rng.float64() < 0.001 {
            self.intensity = 1.0;
        }

        if self.phase_start.elapsed() >= self.phase_duration {
            self.phase_start = Instant::now();
            self.update_phase();
        }

        let (min_ms, max_ms, num_actions) = match self.phase {
            StressPhase::Calm => (
                self.config.calm_min_ms as f64,
                self.config.calm_max_ms as f64,
                1 + (self.intensity * 1.0) as usize, // 1-2
            ),
            StressPhase::Active => (
                self.config.active_min_ms as f64,
                self.config.active_max_ms as f64,
                3 + (self.intensity * 2.0) as usize, // 3-5
            ),
            StressPhase::Burst => (
                self.config.burst_min_ms as f64,
                self.config.burst_max_ms as f64,
                5 + (self.intensity * 5.0) as usize, // 5-10
            ),
        };

        let ms = max_ms - (max_ms - min_ms) * self.intensity;
        let interval = Duration::from_millis((ms as u64).max(1));

        (interval, num_actions)
    }

    pub fn phase(&self) -> StressPhase {
        self.phase
    }

    /// Current intensity in [0, 1].
    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    fn update_phase(&mut self) {
        if self.intensity < 0.3 {
            self.phase = StressPhase::Calm;
            self.phase_duration = self.random_duration(30, 120);
        } else if self.intensity < 0.7 {
            self.phase = StressPhase::Active;
            self.phase_duration = self.random_duration(10, 60);
        } else {
            self.phase = StressPhase::Burst;
            self.phase_duration = self.random_duration(5, 30);
        }
    }

    fn random_duration(&self, min_sec: i64, max_sec: i64) -> Duration {
        Duration::from_secs(self.rng.int_range(min_sec, max_sec) as u64)
    }
}
