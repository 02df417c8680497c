//! Aggregator service: the cache-aside pipeline orchestrator
//!
//! Request handlers and the polling tick both come through here:
//! cache get → on miss, concurrent settle-all fetch of every configured
//! structural source → merge → price enrichment → cache set. A degraded
//! upstream yields a degraded merged view, never an error.

use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::config::AppConfig;
use crate::merge::{apply_price_enrichment, merge_sources, MergeReport};
use crate::sources::{
    DexScreenerSource, GeckoTerminalSource, JupiterClient, SourceOutcome, TokenSource,
};
use crate::types::{ListingQuery, Token};

pub struct AggregatorService {
    /// Structural sources in precedence order (highest first).
    sources: Vec<Box<dyn TokenSource>>,
    enricher: Option<JupiterClient>,
    cache: CacheStore,
}

impl AggregatorService {
    pub fn new(
        sources: Vec<Box<dyn TokenSource>>,
        enricher: Option<JupiterClient>,
        cache: CacheStore,
    ) -> Self {
        Self {
            sources,
            enricher,
            cache,
        }
    }

    /// Wire up the configured providers. Source order here fixes the
    /// merge precedence for the process lifetime.
    pub fn from_config(cfg: &AppConfig, cache: CacheStore) -> Arc<Self> {
        let mut sources: Vec<Box<dyn TokenSource>> = Vec::new();
        if cfg.providers.dexscreener.enabled {
            sources.push(Box::new(DexScreenerSource::new(&cfg.providers.dexscreener)));
        }
        if cfg.providers.geckoterminal.enabled {
            sources.push(Box::new(GeckoTerminalSource::new(
                &cfg.providers.geckoterminal,
            )));
        }
        let enricher = cfg
            .providers
            .jupiter
            .enabled
            .then(|| JupiterClient::new(&cfg.providers.jupiter));

        Arc::new(Self::new(sources, enricher, cache))
    }

    /// Merged view for a query, cache-aside. Never fails: a fully
    /// degraded upstream set yields an empty listing.
    pub async fn merged_view(&self, query: &ListingQuery) -> Vec<Token> {
        let key = query.cache_key();
        if let Some(tokens) = self.cache.get::<Vec<Token>>(&key).await {
            debug!(key, count = tokens.len(), "Serving merged view from cache");
            return tokens;
        }

        let report = self.fetch_and_merge(query).await;
        let tokens = report.tokens_vec();
        self.cache.set(&key, &tokens).await;
        tokens
    }

    /// Tick-facing recompute of the default listing: always fetches,
    /// rewrites the full-listing cache entry, and hands the report back
    /// for diffing.
    pub async fn refresh_listing(&self) -> MergeReport {
        let query = ListingQuery::default();
        let report = self.fetch_and_merge(&query).await;
        self.cache.set(&query.cache_key(), &report.tokens_vec()).await;
        report
    }

    async fn fetch_and_merge(&self, query: &ListingQuery) -> MergeReport {
        // Settle-all join: every source resolves to an outcome, failures
        // included, before the merge starts.
        let fetches = self.sources.iter().map(|source| async move {
            let provider = source.provider();
            SourceOutcome::settle(provider, source.fetch(query).await)
        });
        let outcomes = join_all(fetches).await;

        let mut report = merge_sources(outcomes);
        for failure in &report.source_failures {
            warn!(
                provider = %failure.provider,
                error = %failure.error,
                "Provider contributed nothing to this merge"
            );
        }

        if let Some(jupiter) = &self.enricher {
            let missing = report.addresses_missing_price();
            if !missing.is_empty() {
                match jupiter.prices(&missing).await {
                    Ok(prices) => {
                        let filled = apply_price_enrichment(&mut report, &prices);
                        debug!(requested = missing.len(), filled, "Price enrichment applied");
                    }
                    Err(err) => {
                        warn!(error = %err, "Price enrichment failed; serving unenriched merge");
                        report.enrichment_failure = Some(err.to_string());
                    }
                }
            }
        }

        debug!(
            tokens = report.tokens.len(),
            dropped = report.dropped_records,
            failed_sources = report.source_failures.len(),
            "Merge pass complete"
        );
        report
    }
}
