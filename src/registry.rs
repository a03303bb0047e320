//! Static universe of tracked symbols.
//!
//! The dashboard shows two columns of 24 symbols each; ordering inside a
//! group is the display order and must be stable.

/// Left display group.
pub const SYMBOLS_LEFT: [&str; 24] = [
    "BANKNIFTY", "NIFTY", "MCX", "BSE", "TITAN", "SHREECEM",
    "BAJFINANCE", "DIVISLAB", "BEL", "ULTRACEMCO", "ETERNAL", "PAGEIND",
    "BRITANNIA", "ITC", "DLF", "HAL", "GLENMARK", "SUNPHARMA",
    "INDHOTEL", "SHRIRAMFIN", "INDUSTOWER", "BAJAJFINSV", "CANBK", "UNIONBANK",
];

/// Right display group.
pub const SYMBOLS_RIGHT: [&str; 24] = [
    "LT", "LTF", "OFSS", "PERSISTENT", "SOLARINDS", "ABCAPITAL",
    "COFORGE", "JIOFIN", "SRF", "SBIN", "BHARTIARTL", "POLYCAB",
    "MARUTI", "EICHERMOT", "BHEL", "TVSMOTOR", "CGPOWER", "SUPREMEIND",
    "TCS", "INFY", "PIDILITIND", "CUMMINSIND", "TRENT", "KALYANKJIL",
];

/// Every tracked symbol, left group first.
pub fn all_symbols() -> impl Iterator<Item = &'static str> {
    SYMBOLS_LEFT.iter().chain(SYMBOLS_RIGHT.iter()).copied()
}

/// Whether `symbol` belongs to the tracked universe.
pub fn is_tracked(symbol: &str) -> bool {
    all_symbols().any(|s| s == symbol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn universe_has_48_unique_symbols() {
        let unique: HashSet<&str> = all_symbols().collect();
        assert_eq!(unique.len(), 48);
        assert_eq!(SYMBOLS_LEFT.len(), 24);
        assert_eq!(SYMBOLS_RIGHT.len(), 24);
    }

    #[test]
    fn membership_lookup() {
        assert!(is_tracked("NIFTY"));
        assert!(is_tracked("KALYANKJIL"));
        assert!(!is_tracked("AAPL"));
        assert!(!is_tracked("nifty"));
    }
}
