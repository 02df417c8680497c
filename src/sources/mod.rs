//! Upstream provider integrations (DexScreener, GeckoTerminal, Jupiter)
//!
//! Each structural provider implements [`TokenSource`]: fetch one raw
//! payload, normalize it record-by-record into canonical tokens, and
//! report per-record drops. Raw provider shapes never leave their module.

mod dexscreener;
mod geckoterminal;
mod jupiter;

pub use dexscreener::DexScreenerSource;
pub use geckoterminal::GeckoTerminalSource;
pub use jupiter::JupiterClient;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use std::time::Duration;

use crate::error::FetchError;
use crate::types::{ListingQuery, Provider, Token};

/// One provider's normalized contribution to a merge pass.
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    pub provider: Provider,
    pub tokens: Vec<Token>,
    /// Records that failed normalization and were dropped.
    pub dropped: usize,
}

impl NormalizedBatch {
    pub fn empty(provider: Provider) -> Self {
        Self {
            provider,
            tokens: Vec::new(),
            dropped: 0,
        }
    }
}

/// Settled result of one provider's fetch+normalize. Failures are data,
/// not exceptions: the merge engine aggregates them into its report.
#[derive(Debug)]
pub enum SourceOutcome {
    Batch(NormalizedBatch),
    Failed {
        provider: Provider,
        error: FetchError,
    },
}

impl SourceOutcome {
    pub fn settle(provider: Provider, result: Result<NormalizedBatch, FetchError>) -> Self {
        match result {
            Ok(batch) => SourceOutcome::Batch(batch),
            Err(error) => SourceOutcome::Failed { provider, error },
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            SourceOutcome::Batch(batch) => batch.provider,
            SourceOutcome::Failed { provider, .. } => *provider,
        }
    }
}

/// A structural token provider. Implementations are side-effect-free
/// reads and safe to retry.
#[async_trait]
pub trait TokenSource: Send + Sync {
    fn provider(&self) -> Provider;

    /// Fetch and normalize the provider's view of `query`.
    async fn fetch(&self, query: &ListingQuery) -> Result<NormalizedBatch, FetchError>;
}

/// Shared HTTP client construction: fixed per-call timeout, JSON accept.
pub(crate) fn http_client(timeout_ms: u64) -> Client {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .default_headers(headers)
        .build()
        .expect("Failed to create HTTP client")
}

/// Parse a provider's stringly-typed decimal, rejecting non-finite values.
pub(crate) fn parse_decimal(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
