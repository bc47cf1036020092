//! GBM price engine with sector-correlated returns.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::engine::rng::Rng;
use crate::symbols::{Sector, Symbol};

/// 2% daily volatility before the per-symbol multiplier.
const BASE_DAILY_VOL: f64 = 0.02;
/// 60% sector shock, 40% idiosyncratic.
const SECTOR_BLEND: f64 = 0.60;
/// Zero drift for the simulation.
const DRIFT_PER_TICK: f64 = 0.0;
/// Approximate ticks per day, for vol scaling.
const TICKS_PER_DAY: f64 = 86_400.0;

struct MarketState {
    prices: HashMap<u16, f64>,
    /// Sector shocks regenerated once per tick cycle.
    sector_shocks: HashMap<Sector, f64>,
}

/// Drives per-symbol GBM price movement. One step per tick:
/// `S(t+1) = S(t) * exp(drift + vol * z)` with `z` blended from the
/// sector shock and an idiosyncratic draw.
pub struct MarketEngine {
    rng: Arc<Rng>,
    by_locate: HashMap<u16, Symbol>,
    state: RwLock<MarketState>,
}

impl MarketEngine {
    pub fn new(rng: Arc<Rng>, symbols: &[Symbol]) -> Self {
        let prices = symbols
            .iter()
            .map(|s| (s.locate_code, s.base_price))
            .collect();
        let by_locate = symbols.iter().map(|s| (s.locate_code, s.clone())).collect();
        Self {
            rng,
            by_locate,
            state: RwLock::new(MarketState {
                prices,
                sector_shocks: HashMap::new(),
            }),
        }
    }

    /// Produces one gaussian shock per sector. Call once per tick cycle
    /// before ticking individual symbols so all symbols in a sector see the
    /// same shock.
    pub fn generate_sector_shocks(&self) {
        let mut state = self.state.write();
        for sector in Sector::all() {
            state.sector_shocks.insert(sector, self.rng.gaussian());
        }
    }

    /// Advances the price for one symbol and returns the new price.
    /// Unknown locate codes yield 0 with no side effect.
    pub fn tick(&self, locate: u16) -> f64 {
        let Some(sym) = self.by_locate.get(&locate) else {
            return 0.0;
        };

        let mut state = self.state.write();
        let price = state.prices.get(&locate).copied().unwrap_or(sym.base_price);

        let tick_vol = BASE_DAILY_VOL / TICKS_PER_DAY.sqrt() * sym.volatility_multiplier;

        let sector_z = state.sector_shocks.get(&sym.sector).copied().unwrap_or(0.0);
        let idio_z = self.rng.gaussian();
        let z = SECTOR_BLEND * sector_z + (1.0 - SECTOR_BLEND) * idio_z;

        let log_return = DRIFT_PER_TICK + tick_vol * z;
        let mut price = price * log_return.exp();

        // Snap to tick size, floor at one tick.
        price = (price / sym.tick_size).round() * sym.tick_size;
        if price < sym.tick_size {
            price = sym.tick_size;
        }

        state.prices.insert(locate, price);
        price
    }

    /// Current price for a symbol, or 0 when unknown.
    pub fn price(&self, locate: u16) -> f64 {
        self.state.read().prices.get(&locate).copied().unwrap_or(0.0)
    }

    /// Overwrites a symbol's price (state restoration).
    pub fn set_price(&self, locate: u16, price: f64) {
        self.state.write().prices.insert(locate, price);
    }

    /// Copy of the full price map.
    pub fn snapshot(&self) -> HashMap<u16, f64> {
        self.state.read().prices.clone()
    }
}
