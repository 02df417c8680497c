//! GeckoTerminal source: second-precedence structural provider
//!
//! Reads the Solana pools listing. Pool names look like "TOKEN / SOL";
//! the base-token side of the name supplies name and ticker. Numeric
//! attributes arrive as strings and are parsed defensively.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{http_client, parse_decimal, NormalizedBatch, TokenSource};
use crate::config::ProviderConfig;
use crate::error::{FetchError, NormalizeError};
use crate::fetch::{retry_with_backoff, RetryPolicy};
use crate::types::{ListingQuery, Provider, Token};

const PROVIDER: Provider = Provider::GeckoTerminal;

/// Pool ids are network-prefixed ("solana_<mint>"); the prefix is stripped
/// so addresses line up with the other providers.
const NETWORK_PREFIX: &str = "solana_";

#[derive(Debug, Deserialize)]
struct PoolsResponse {
    #[serde(default)]
    data: Vec<RawPool>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawPool {
    attributes: Option<RawPoolAttributes>,
    relationships: Option<RawRelationships>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawPoolAttributes {
    name: Option<String>,
    base_token_price_usd: Option<String>,
    base_token_price_native_currency: Option<String>,
    market_cap_usd: Option<String>,
    reserve_in_usd: Option<String>,
    #[serde(default)]
    volume_usd: RawWindowedStr,
    #[serde(default)]
    transactions: RawTransactions,
    #[serde(default)]
    price_change_percentage: RawWindowedStr,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawWindowedStr {
    h1: Option<String>,
    h24: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawTransactions {
    h24: Option<RawTxnCounts>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTxnCounts {
    #[serde(default)]
    buys: u64,
    #[serde(default)]
    sells: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRelationships {
    base_token: Option<RawRelated>,
    dex: Option<RawRelated>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRelated {
    data: Option<RawRelatedData>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRelatedData {
    id: Option<String>,
}

pub struct GeckoTerminalSource {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl GeckoTerminalSource {
    pub fn new(cfg: &ProviderConfig) -> Self {
        Self {
            client: http_client(cfg.timeout_ms),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            policy: RetryPolicy::from(cfg),
        }
    }

    async fn pools(&self, page: u32) -> Result<Vec<RawPool>, FetchError> {
        let url = format!("{}/networks/solana/pools", self.base_url);
        let page = page.to_string();
        let url = url.as_str();
        let page = page.as_str();
        let client = &self.client;
        retry_with_backoff(self.policy, move || async move {
            let resp = client
                .get(url)
                .query(&[("page", page), ("include", "base_token,dex")])
                .send()
                .await
                .map_err(|e| FetchError::network(PROVIDER, e))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::from_status(PROVIDER, status.as_u16()));
            }

            let body: PoolsResponse = resp
                .json()
                .await
                .map_err(|e| FetchError::payload(PROVIDER, e.to_string()))?;
            Ok(body.data)
        })
        .await
    }
}

#[async_trait]
impl TokenSource for GeckoTerminalSource {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    async fn fetch(&self, query: &ListingQuery) -> Result<NormalizedBatch, FetchError> {
        let pools = self.pools(query.page.unwrap_or(1)).await?;
        Ok(normalize_pools(pools))
    }
}

fn normalize_pools(pools: Vec<RawPool>) -> NormalizedBatch {
    let mut tokens = Vec::with_capacity(pools.len());
    let mut dropped = 0usize;

    for pool in pools {
        match normalize_pool(pool) {
            Ok(token) => tokens.push(token),
            Err(err) => {
                dropped += 1;
                debug!(error = %err, "Dropped GeckoTerminal record");
            }
        }
    }

    NormalizedBatch {
        provider: PROVIDER,
        tokens,
        dropped,
    }
}

fn normalize_pool(pool: RawPool) -> Result<Token, NormalizeError> {
    let attr = pool.attributes.ok_or(NormalizeError::MissingField {
        provider: PROVIDER,
        field: "attributes",
    })?;
    let relationships = pool.relationships.unwrap_or(RawRelationships {
        base_token: None,
        dex: None,
    });

    let raw_id = relationships
        .base_token
        .and_then(|r| r.data)
        .and_then(|d| d.id)
        .filter(|id| !id.is_empty())
        .ok_or(NormalizeError::MissingAddress { provider: PROVIDER })?;
    let address = raw_id
        .strip_prefix(NETWORK_PREFIX)
        .unwrap_or(&raw_id)
        .to_string();

    let base_name = attr
        .name
        .as_deref()
        .and_then(|n| n.split('/').next())
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let mut token = Token::new(address);
    token.name = base_name.clone();
    token.ticker = base_name;
    token.price_usd = parse_decimal(attr.base_token_price_usd.as_deref());
    token.price_native = parse_decimal(attr.base_token_price_native_currency.as_deref());
    token.market_cap = parse_decimal(attr.market_cap_usd.as_deref());
    token.volume = parse_decimal(attr.volume_usd.h24.as_deref());
    token.liquidity = parse_decimal(attr.reserve_in_usd.as_deref());
    token.tx_count = attr.transactions.h24.map(|c| c.buys + c.sells);
    token.change_1h = parse_decimal(attr.price_change_percentage.h1.as_deref());
    token.change_24h = parse_decimal(attr.price_change_percentage.h24.as_deref());
    token.protocol = relationships.dex.and_then(|r| r.data).and_then(|d| d.id);
    token.source_hints.insert(PROVIDER);
    Ok(token)
}
