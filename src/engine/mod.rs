//! Simulation engine: PRNG, GBM price movement, and stress-rate control.

pub mod market;
pub mod rng;
pub mod stress;

pub use market::MarketEngine;
pub use rng::{Rng, RngError};
pub use stress::{StressConfig, StressController, StressPhase};
