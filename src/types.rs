//! Core types used throughout TokenDesk
//!
//! Defines the canonical token record, provider identities, and the
//! request vocabulary shared by the HTTP API and the polling tick.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Upstream data providers, listed in structural precedence order.
///
/// DexScreener beats GeckoTerminal for any field both populate; Jupiter is
/// price-only and never contributes structural fields.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Provider {
    DexScreener,
    GeckoTerminal,
    Jupiter,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::DexScreener => "DexScreener",
            Provider::GeckoTerminal => "GeckoTerminal",
            Provider::Jupiter => "Jupiter",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical merged token record, keyed by `address`.
///
/// Every optional field may be filled by a different provider; the merge
/// engine guarantees that any non-null field is attributable to at least
/// one entry in `source_hints`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub address: String,
    pub name: Option<String>,
    pub ticker: Option<String>,
    pub price_usd: Option<f64>,
    pub price_native: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume: Option<f64>,
    pub liquidity: Option<f64>,
    pub tx_count: Option<u64>,
    pub change_1h: Option<f64>,
    pub change_24h: Option<f64>,
    pub change_7d: Option<f64>,
    pub protocol: Option<String>,
    /// Providers that contributed at least one field to this record.
    pub source_hints: BTreeSet<Provider>,
}

impl Token {
    /// Empty record for an address, ready to be filled by the merge.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
            ticker: None,
            price_usd: None,
            price_native: None,
            market_cap: None,
            volume: None,
            liquidity: None,
            tx_count: None,
            change_1h: None,
            change_24h: None,
            change_7d: None,
            protocol: None,
            source_hints: BTreeSet::new(),
        }
    }

    /// Percentage-change field for the requested timeframe.
    pub fn change_for(&self, timeframe: Timeframe) -> Option<f64> {
        match timeframe {
            Timeframe::H1 => self.change_1h,
            Timeframe::H24 => self.change_24h,
            Timeframe::D7 => self.change_7d,
        }
    }
}

/// Sort keys accepted by the listing endpoint and the subscribe message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Volume,
    PriceChange,
    MarketCap,
    Price,
    Liquidity,
    Txs,
}

impl Default for SortKey {
    fn default() -> Self {
        SortKey::Volume
    }
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Volume => "volume",
            SortKey::PriceChange => "price_change",
            SortKey::MarketCap => "market_cap",
            SortKey::Price => "price",
            SortKey::Liquidity => "liquidity",
            SortKey::Txs => "txs",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Percentage-change timeframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "24h")]
    H24,
    #[serde(rename = "7d")]
    D7,
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::H24
    }
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::H1 => "1h",
            Timeframe::H24 => "24h",
            Timeframe::D7 => "7d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The upstream-facing portion of a request: what gets fetched, as opposed
/// to how the result is ranked and sliced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingQuery {
    /// Free-text search forwarded to providers that support it.
    pub q: Option<String>,
    /// Upstream page pass-through (1-based).
    pub page: Option<u32>,
}

/// Cache key for the default full listing.
pub const FULL_LISTING_CACHE_KEY: &str = "tokens:all";

impl ListingQuery {
    /// Canonical cache-key serialization. Identical queries must map to
    /// identical keys, so the shape is fixed here rather than derived.
    pub fn cache_key(&self) -> String {
        match (&self.q, self.page) {
            (None, None) => FULL_LISTING_CACHE_KEY.to_string(),
            (q, page) => format!(
                "tokens:q={}:page={}",
                q.as_deref().unwrap_or(""),
                page.unwrap_or(1)
            ),
        }
    }

    pub fn is_default_listing(&self) -> bool {
        self.q.is_none() && self.page.is_none()
    }
}
