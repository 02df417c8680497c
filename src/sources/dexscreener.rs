//! DexScreener source: highest-precedence structural provider
//!
//! Uses the pair search endpoint. A token usually trades in several pairs;
//! the deepest pair by USD liquidity represents the token before
//! normalization.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::{http_client, parse_decimal, NormalizedBatch, TokenSource};
use crate::config::ProviderConfig;
use crate::error::{FetchError, NormalizeError};
use crate::fetch::{retry_with_backoff, RetryPolicy};
use crate::types::{ListingQuery, Provider, Token};

const PROVIDER: Provider = Provider::DexScreener;

/// Search term used for the default (unscoped) listing.
const DEFAULT_SEARCH: &str = "solana";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    pairs: Vec<RawPair>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPair {
    base_token: Option<RawBaseToken>,
    price_usd: Option<String>,
    price_native: Option<String>,
    market_cap: Option<f64>,
    #[serde(default)]
    volume: RawWindowed,
    #[serde(default)]
    liquidity: RawLiquidity,
    #[serde(default)]
    txns: RawTxns,
    #[serde(default)]
    price_change: RawWindowed,
    dex_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawBaseToken {
    address: Option<String>,
    name: Option<String>,
    symbol: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawWindowed {
    h1: Option<f64>,
    h24: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawLiquidity {
    usd: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawTxns {
    h24: Option<RawTxnCounts>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTxnCounts {
    #[serde(default)]
    buys: u64,
    #[serde(default)]
    sells: u64,
}

pub struct DexScreenerSource {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl DexScreenerSource {
    pub fn new(cfg: &ProviderConfig) -> Self {
        Self {
            client: http_client(cfg.timeout_ms),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            policy: RetryPolicy::from(cfg),
        }
    }

    async fn search(&self, term: &str) -> Result<Vec<RawPair>, FetchError> {
        let url = format!("{}/search", self.base_url);
        let url = url.as_str();
        let client = &self.client;
        retry_with_backoff(self.policy, move || async move {
            let resp = client
                .get(url)
                .query(&[("q", term)])
                .send()
                .await
                .map_err(|e| FetchError::network(PROVIDER, e))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::from_status(PROVIDER, status.as_u16()));
            }

            let body: SearchResponse = resp
                .json()
                .await
                .map_err(|e| FetchError::payload(PROVIDER, e.to_string()))?;
            Ok(body.pairs)
        })
        .await
    }
}

#[async_trait]
impl TokenSource for DexScreenerSource {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    async fn fetch(&self, query: &ListingQuery) -> Result<NormalizedBatch, FetchError> {
        let term = query.q.as_deref().unwrap_or(DEFAULT_SEARCH);
        let pairs = self.search(term).await?;
        Ok(normalize_pairs(pairs))
    }
}

/// Coalesce pairs per token (deepest liquidity wins), then normalize each
/// surviving pair. Normalization failures drop the record, never the batch.
fn normalize_pairs(pairs: Vec<RawPair>) -> NormalizedBatch {
    let mut order: Vec<RawPair> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut dropped = 0usize;

    for pair in pairs {
        let addr = match pair.base_token.as_ref().and_then(|t| t.address.clone()) {
            Some(addr) if !addr.is_empty() => addr,
            _ => {
                dropped += 1;
                continue;
            }
        };
        match index.get(&addr) {
            Some(&idx) => {
                let held = order[idx].liquidity.usd.unwrap_or(0.0);
                let candidate = pair.liquidity.usd.unwrap_or(0.0);
                if candidate > held {
                    order[idx] = pair;
                }
            }
            None => {
                index.insert(addr, order.len());
                order.push(pair);
            }
        }
    }

    let mut tokens = Vec::with_capacity(order.len());
    for pair in order {
        match normalize_pair(pair) {
            Ok(token) => tokens.push(token),
            Err(err) => {
                dropped += 1;
                debug!(error = %err, "Dropped DexScreener record");
            }
        }
    }

    NormalizedBatch {
        provider: PROVIDER,
        tokens,
        dropped,
    }
}

fn normalize_pair(pair: RawPair) -> Result<Token, NormalizeError> {
    let base = pair
        .base_token
        .ok_or(NormalizeError::MissingField {
            provider: PROVIDER,
            field: "baseToken",
        })?;
    let address = base
        .address
        .filter(|a| !a.is_empty())
        .ok_or(NormalizeError::MissingAddress { provider: PROVIDER })?;

    let mut token = Token::new(address);
    token.name = base.name;
    token.ticker = base.symbol;
    token.price_usd = parse_decimal(pair.price_usd.as_deref());
    token.price_native = parse_decimal(pair.price_native.as_deref());
    token.market_cap = pair.market_cap;
    token.volume = pair.volume.h24;
    token.liquidity = pair.liquidity.usd;
    token.tx_count = pair.txns.h24.map(|c| c.buys + c.sells);
    token.change_1h = pair.price_change.h1;
    token.change_24h = pair.price_change.h24;
    token.protocol = pair.dex_id;
    token.source_hints.insert(PROVIDER);
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pair(addr: &str, liquidity: f64) -> RawPair {
        serde_json::from_value(json!({
            "baseToken": { "address": addr, "name": "DexCoin", "symbol": "DC" },
            "priceUsd": "1.5",
            "priceNative": "0.01",
            "marketCap": 150000.0,
            "volume": { "h24": 2000.0 },
            "liquidity": { "usd": liquidity },
            "txns": { "h24": { "buys": 20, "sells": 10 } },
            "priceChange": { "h1": 3.0, "h24": 4.0 },
            "dexId": "raydium"
        }))
        .unwrap()
    }

    #[test]
    fn normalizes_a_complete_pair() {
        let batch = normalize_pairs(vec![pair("addr1", 6000.0)]);
        assert_eq!(batch.dropped, 0);
        assert_eq!(batch.tokens.len(), 1);

        let token = &batch.tokens[0];
        assert_eq!(token.address, "addr1");
        assert_eq!(token.price_usd, Some(1.5));
        assert_eq!(token.tx_count, Some(30));
        assert_eq!(token.protocol.as_deref(), Some("raydium"));
        assert!(token.source_hints.contains(&Provider::DexScreener));
    }

    #[test]
    fn deepest_liquidity_pair_represents_the_token() {
        let mut shallow = pair("addr1", 100.0);
        shallow.price_usd = Some("9.9".into());
        let deep = pair("addr1", 6000.0);

        let batch = normalize_pairs(vec![shallow, deep]);
        assert_eq!(batch.tokens.len(), 1);
        assert_eq!(batch.tokens[0].price_usd, Some(1.5));
    }

    #[test]
    fn record_without_address_is_dropped_not_fatal() {
        let bad: RawPair = serde_json::from_value(json!({ "priceUsd": "1.0" })).unwrap();
        let batch = normalize_pairs(vec![bad, pair("addr2", 10.0)]);
        assert_eq!(batch.dropped, 1);
        assert_eq!(batch.tokens.len(), 1);
        assert_eq!(batch.tokens[0].address, "addr2");
    }

    #[test]
    fn missing_optional_windows_default_to_none() {
        let minimal: RawPair = serde_json::from_value(json!({
            "baseToken": { "address": "addr3", "name": "MinCoin", "symbol": "MIN" },
            "priceUsd": "150"
        }))
        .unwrap();
        let batch = normalize_pairs(vec![minimal]);
        let token = &batch.tokens[0];
        assert_eq!(token.volume, None);
        assert_eq!(token.liquidity, None);
        assert_eq!(token.tx_count, None);
        assert_eq!(token.change_1h, None);
    }
}
