//! Owned mapping from symbol to signal state.
//!
//! One store instance is the sole in-process source of truth; it is
//! constructed at bootstrap and injected behind `AppState`'s mutex rather
//! than living in a global. Every registered symbol has an entry from
//! construction onward; entries are never removed while the process runs.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::json;

use super::engine::{self, Transition};
use super::{ChannelKey, Family, Polarity, RangeRecord, RangeWindow, SymbolState};
use crate::registry;

/// Rejection for events naming a symbol outside the registry.
#[derive(Debug, Clone)]
pub struct UnknownSymbol(pub String);

impl fmt::Display for UnknownSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "symbol {:?} is not tracked", self.0)
    }
}

impl std::error::Error for UnknownSymbol {}

pub struct SignalStore {
    states: BTreeMap<String, SymbolState>,
}

impl SignalStore {
    /// One empty state per registered symbol.
    pub fn new() -> Self {
        let states = registry::all_symbols()
            .map(|symbol| (symbol.to_string(), SymbolState::default()))
            .collect();
        Self { states }
    }

    /// Merge persisted states over the initialized map. Rows for symbols no
    /// longer in the registry are ignored. Returns the restored count.
    pub fn hydrate(&mut self, loaded: BTreeMap<String, SymbolState>) -> usize {
        let mut restored = 0;
        for (symbol, persisted) in loaded {
            match self.states.get_mut(&symbol) {
                Some(slot) => {
                    *slot = persisted;
                    restored += 1;
                }
                None => tracing::debug!("ignoring persisted state for untracked symbol {symbol}"),
            }
        }
        restored
    }

    pub fn symbol_state(&self, symbol: &str) -> Option<&SymbolState> {
        self.states.get(symbol)
    }

    /// Run one signal event through the transition engine.
    pub fn apply_signal(
        &mut self,
        symbol: &str,
        family: Family,
        polarity: Polarity,
        price: f64,
        time: &str,
        now_ms: i64,
    ) -> Result<Transition, UnknownSymbol> {
        let state = self
            .states
            .get_mut(symbol)
            .ok_or_else(|| UnknownSymbol(symbol.to_string()))?;
        Ok(engine::apply(state, family, polarity, price, time, now_ms))
    }

    /// Store one range event's window.
    pub fn apply_range(
        &mut self,
        symbol: &str,
        window: RangeWindow,
        high: f64,
        low: f64,
        time: &str,
        now_ms: i64,
    ) -> Result<RangeRecord, UnknownSymbol> {
        let state = self
            .states
            .get_mut(symbol)
            .ok_or_else(|| UnknownSymbol(symbol.to_string()))?;
        Ok(engine::apply_range(state, window, high, low, time, now_ms))
    }

    /// Remove every record and the last-active pointer for `family` across
    /// all symbols. Returns the symbols that actually changed.
    pub fn clear_family(&mut self, family: Family) -> Vec<String> {
        let mut touched = Vec::new();
        for (symbol, state) in &mut self.states {
            let keys: Vec<ChannelKey> = state
                .channels
                .keys()
                .copied()
                .filter(|key| key.family() == family)
                .collect();
            let had_pointer = state.last_active.remove(&family).is_some();
            if keys.is_empty() && !had_pointer {
                continue;
            }
            for key in keys {
                state.channels.remove(&key);
            }
            touched.push(symbol.clone());
        }
        touched
    }

    /// Full outbound snapshot: every symbol's state plus both display groups.
    pub fn snapshot_message(&self) -> serde_json::Value {
        json!({
            "type": "state",
            "state": self.states,
            "symbols_left": registry::SYMBOLS_LEFT,
            "symbols_right": registry::SYMBOLS_RIGHT,
        })
    }
}

impl Default for SignalStore {
    fn default() -> Self {
        Self::new()
    }
}
