//! Signal domain model: channel families, channel keys, and per-symbol state.
//!
//! Wire identifiers (`call1_buy`, `call3_go`, `orb_15m`, …) are the only
//! representation that leaves the process — snapshots, persisted blobs and
//! request bodies all use them. In-process everything is typed; the string
//! form exists solely at the serde boundary.

pub mod engine;
pub mod store;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error for wire identifiers that don't name a known family, channel or window.
#[derive(Debug, Clone)]
pub struct ParseKeyError(String);

impl fmt::Display for ParseKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized identifier {:?}", self.0)
    }
}

impl std::error::Error for ParseKeyError {}

/// Signal direction. On gating families buy means GO and sell means STOP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Buy,
    Sell,
}

impl Polarity {
    pub fn flip(self) -> Self {
        match self {
            Polarity::Buy => Polarity::Sell,
            Polarity::Sell => Polarity::Buy,
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Polarity::Buy => "buy",
            Polarity::Sell => "sell",
        })
    }
}

impl FromStr for Polarity {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Polarity::Buy),
            "sell" => Ok(Polarity::Sell),
            _ => Err(ParseKeyError(s.to_string())),
        }
    }
}

/// One indicator+timeframe group of channels.
///
/// Polar families track independent buy/sell channels; gating families
/// track a single GO/STOP channel with the direction embedded in the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Family {
    Call1,
    Call2,
    Call3,
    Call1Hourly,
    Call2Hourly,
    Call3Hourly,
    Call1Page2,
    Call2Page2,
}

impl Family {
    pub const ALL: [Family; 8] = [
        Family::Call1,
        Family::Call2,
        Family::Call3,
        Family::Call1Hourly,
        Family::Call2Hourly,
        Family::Call3Hourly,
        Family::Call1Page2,
        Family::Call2Page2,
    ];

    /// Stable identifier used in snapshots, persisted blobs and request bodies.
    pub fn wire_id(self) -> &'static str {
        match self {
            Family::Call1 => "call1",
            Family::Call2 => "call2",
            Family::Call3 => "call3",
            Family::Call1Hourly => "call1_1h",
            Family::Call2Hourly => "call2_1h",
            Family::Call3Hourly => "call3_1h",
            Family::Call1Page2 => "call1_page2",
            Family::Call2Page2 => "call2_page2",
        }
    }

    /// Gating families fold GO and STOP onto one channel key.
    pub fn is_gating(self) -> bool {
        matches!(self, Family::Call3 | Family::Call3Hourly)
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_id())
    }
}

impl FromStr for Family {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Family::ALL
            .iter()
            .copied()
            .find(|family| family.wire_id() == s)
            .ok_or_else(|| ParseKeyError(s.to_string()))
    }
}

impl Serialize for Family {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.wire_id())
    }
}

impl<'de> Deserialize<'de> for Family {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Addresses one signal slot for a symbol, e.g. `call1_buy` or `call3_go`.
///
/// Constructed through [`ChannelKey::new`], which folds both polarities of a
/// gating family onto its single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelKey {
    family: Family,
    polarity: Option<Polarity>,
}

impl ChannelKey {
    pub fn new(family: Family, polarity: Polarity) -> Self {
        let polarity = if family.is_gating() { None } else { Some(polarity) };
        Self { family, polarity }
    }

    pub fn family(self) -> Family {
        self.family
    }

    /// The opposite-polarity channel in the same family; gating keys have none.
    pub fn sibling(self) -> Option<ChannelKey> {
        self.polarity.map(|p| ChannelKey {
            family: self.family,
            polarity: Some(p.flip()),
        })
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.polarity {
            Some(polarity) => write!(f, "{}_{}", self.family.wire_id(), polarity),
            None => write!(f, "{}_go", self.family.wire_id()),
        }
    }
}

impl FromStr for ChannelKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_suffix("_go") {
            let family: Family = id.parse()?;
            if !family.is_gating() {
                return Err(ParseKeyError(s.to_string()));
            }
            return Ok(ChannelKey { family, polarity: None });
        }
        for (suffix, polarity) in [("_buy", Polarity::Buy), ("_sell", Polarity::Sell)] {
            if let Some(id) = s.strip_suffix(suffix) {
                let family: Family = id.parse()?;
                if family.is_gating() {
                    return Err(ParseKeyError(s.to_string()));
                }
                return Ok(ChannelKey { family, polarity: Some(polarity) });
            }
        }
        Err(ParseKeyError(s.to_string()))
    }
}

impl Serialize for ChannelKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Fixed high/low window slots captured by range events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RangeWindow {
    Orb15m,
    Orb1h,
}

impl RangeWindow {
    pub fn wire_id(self) -> &'static str {
        match self {
            RangeWindow::Orb15m => "orb_15m",
            RangeWindow::Orb1h => "orb_1h",
        }
    }
}

impl fmt::Display for RangeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_id())
    }
}

impl FromStr for RangeWindow {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orb_15m" => Ok(RangeWindow::Orb15m),
            "orb_1h" => Ok(RangeWindow::Orb1h),
            _ => Err(ParseKeyError(s.to_string())),
        }
    }
}

impl Serialize for RangeWindow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.wire_id())
    }
}

impl<'de> Deserialize<'de> for RangeWindow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One channel's current signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub price: f64,
    /// Event timestamp from the indicator platform, passed through untouched.
    pub time: String,
    /// Start of the current run on this channel, epoch millis.
    pub first_seen_at: i64,
    /// Wall clock of the latest mutation, epoch millis.
    pub observed_at: i64,
    pub repeat_count: u32,
    pub active: bool,
    /// GO/STOP direction; present on gating channels only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polarity: Option<Polarity>,
}

/// High/low of one range window; no counter logic applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeRecord {
    pub high: f64,
    pub low: f64,
    pub time: String,
    pub observed_at: i64,
}

/// Ephemeral market tick; broadcast-only, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    pub symbol: String,
    pub open_price: f64,
    pub current_price: f64,
    pub change_percent: f64,
    pub time: String,
}

/// Full signal state for one symbol.
///
/// Channel absence in `channels` is the explicit "no prior signal" case.
/// `last_active` is the per-family pointer driving repeat counting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireSymbolState")]
pub struct SymbolState {
    pub channels: BTreeMap<ChannelKey, SignalRecord>,
    pub ranges: BTreeMap<RangeWindow, RangeRecord>,
    pub last_active: BTreeMap<Family, ChannelKey>,
}

impl SymbolState {
    pub fn channel(&self, key: ChannelKey) -> Option<&SignalRecord> {
        self.channels.get(&key)
    }
}

/// Persisted-blob mirror with plain string keys.
///
/// Conversion is lossy by design: identifiers that no longer parse are
/// dropped so a retired channel never poisons the rest of a symbol's state.
#[derive(Deserialize)]
struct WireSymbolState {
    #[serde(default)]
    channels: BTreeMap<String, SignalRecord>,
    #[serde(default)]
    ranges: BTreeMap<String, RangeRecord>,
    #[serde(default)]
    last_active: BTreeMap<String, String>,
}

impl From<WireSymbolState> for SymbolState {
    fn from(wire: WireSymbolState) -> Self {
        let channels = wire
            .channels
            .into_iter()
            .filter_map(|(k, v)| k.parse::<ChannelKey>().ok().map(|k| (k, v)))
            .collect();
        let ranges = wire
            .ranges
            .into_iter()
            .filter_map(|(k, v)| k.parse::<RangeWindow>().ok().map(|k| (k, v)))
            .collect();
        let last_active = wire
            .last_active
            .into_iter()
            .filter_map(|(family, key)| {
                let family = family.parse::<Family>().ok()?;
                let key = key.parse::<ChannelKey>().ok()?;
                (key.family() == family).then_some((family, key))
            })
            .collect();
        Self { channels, ranges, last_active }
    }
}
