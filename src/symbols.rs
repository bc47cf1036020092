//! Static catalog of the 30 simulated instruments.

/// Market sector tag. Symbols in the same sector share a per-tick shock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sector {
    Tech,
    Finance,
    Healthcare,
    Energy,
    Consumer,
    Industrial,
    Stress,
    Etf,
}

impl Sector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Tech => "Tech",
            Sector::Finance => "Finance",
            Sector::Healthcare => "Healthcare",
            Sector::Energy => "Energy",
            Sector::Consumer => "Consumer",
            Sector::Industrial => "Industrial",
            Sector::Stress => "Stress",
            Sector::Etf => "ETF",
        }
    }

    /// All sectors, in a fixed order.
    pub fn all() -> [Sector; 8] {
        [
            Sector::Tech,
            Sector::Finance,
            Sector::Healthcare,
            Sector::Energy,
            Sector::Consumer,
            Sector::Industrial,
            Sector::Stress,
            Sector::Etf,
        ]
    }
}

/// Metadata for one simulated trading instrument. Immutable at runtime.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub locate_code: u16,
    pub ticker: &'static str,
    pub name: &'static str,
    pub sector: Sector,
    pub base_price: f64,
    pub tick_size: f64,
    pub volatility_multiplier: f64,
    pub is_stress: bool,
}

const fn sym(
    locate_code: u16,
    ticker: &'static str,
    name: &'static str,
    sector: Sector,
    base_price: f64,
    volatility_multiplier: f64,
    is_stress: bool,
) -> Symbol {
    Symbol {
        locate_code,
        ticker,
        name,
        sector,
        base_price,
        tick_size: 0.01,
        volatility_multiplier,
        is_stress,
    }
}

/// The 30 fake symbols across 7 sectors + ETFs.
pub static ALL_SYMBOLS: [Symbol; 30] = [
    // Tech (6), mid-high volatility
    sym(1, "NEXO", "Nexo Dynamics Inc", Sector::Tech, 185.00, 1.4, false),
    sym(2, "QBIT", "Qbit Quantum Corp", Sector::Tech, 92.50, 1.6, false),
    sym(3, "FLUX", "Flux Systems Ltd", Sector::Tech, 310.00, 1.3, false),
    sym(4, "SYNK", "Synk Networks Inc", Sector::Tech, 67.25, 1.5, false),
    sym(5, "PULS", "Puls Digital Corp", Sector::Tech, 145.00, 1.2, false),
    sym(6, "CYRA", "Cyra Robotics Inc", Sector::Tech, 220.00, 1.7, false),
    // Finance (5), low-mid volatility
    sym(7, "LEDG", "Ledger Capital Group", Sector::Finance, 78.50, 0.8, false),
    sym(8, "VALT", "Vault Securities Inc", Sector::Finance, 125.00, 0.7, false),
    sym(9, "CRDT", "Credt Financial Corp", Sector::Finance, 52.00, 0.9, false),
    sym(10, "MNTX", "Mintex Banking Corp", Sector::Finance, 165.00, 0.6, false),
    sym(11, "FNDX", "Fundex Asset Mgmt", Sector::Finance, 88.75, 0.8, false),
    // Healthcare (4), low volatility
    sym(12, "HELX", "Helix Biomedical Inc", Sector::Healthcare, 195.00, 0.5, false),
    sym(13, "CURA", "Cura Therapeutics", Sector::Healthcare, 72.00, 0.6, false),
    sym(14, "GENX", "GenX Genomics Corp", Sector::Healthcare, 148.50, 0.7, false),
    sym(15, "BIOS", "Bios Pharma Ltd", Sector::Healthcare, 55.25, 0.5, false),
    // Energy (4), mid volatility
    sym(16, "VOLT", "Volt Energy Corp", Sector::Energy, 98.00, 1.1, false),
    sym(17, "SOLR", "Solaris Power Inc", Sector::Energy, 42.50, 1.0, false),
    sym(18, "FUSE", "Fuse Petroleum Ltd", Sector::Energy, 175.00, 1.2, false),
    sym(19, "WATT", "Watt Grid Systems", Sector::Energy, 63.00, 1.0, false),
    // Consumer (4), low-mid volatility
    sym(20, "BRND", "Brand Global Inc", Sector::Consumer, 112.00, 0.8, false),
    sym(21, "LUXE", "Luxe Retail Corp", Sector::Consumer, 285.00, 0.7, false),
    sym(22, "DLVR", "Deliver Express Inc", Sector::Consumer, 78.00, 0.9, false),
    sym(23, "RSTK", "Restock Supply Corp", Sector::Consumer, 45.50, 0.8, false),
    // Industrial (4), mid volatility
    sym(24, "FORG", "Forge Manufacturing", Sector::Industrial, 132.00, 1.0, false),
    sym(25, "BLDR", "Builder Heavy Ind", Sector::Industrial, 88.00, 1.1, false),
    sym(26, "MACH", "Mach Precision Corp", Sector::Industrial, 205.00, 1.0, false),
    sym(27, "ALOY", "Aloy Materials Inc", Sector::Industrial, 56.75, 1.2, false),
    // Stress (1), always hot
    sym(28, "BLITZ", "Blitz Trading Corp", Sector::Stress, 125.00, 2.0, true),
    // ETFs (2), low volatility
    sym(29, "MKTS", "Markets Broad ETF", Sector::Etf, 350.00, 0.4, false),
    sym(30, "GRWT", "Growth Select ETF", Sector::Etf, 180.00, 0.5, false),
];

/// Looks up a symbol by locate code.
pub fn by_locate(locate: u16) -> Option<&'static Symbol> {
    ALL_SYMBOLS.iter().find(|s| s.locate_code == locate)
}

/// Looks up a symbol by ticker.
pub fn by_ticker(ticker: &str) -> Option<&'static Symbol> {
    ALL_SYMBOLS.iter().find(|s| s.ticker == ticker)
}
