//! Merge/deduplication engine
//!
//! Unions per-source token batches into one deduplicated set keyed by
//! address. Sources arrive in precedence order; conflicts resolve
//! field-by-field (first writer wins per field, not per record).
//! Failure visibility is part of the return value: contained source
//! failures, per-record drop counts, and enrichment state all travel on
//! the [`MergeReport`].

use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::sources::SourceOutcome;
use crate::types::{Provider, Token};

/// A provider whose contribution to this merge pass failed entirely.
#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub provider: Provider,
    pub error: String,
}

/// Outcome of one merge pass.
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    /// Merged set, exactly one token per address. BTreeMap keeps the
    /// mapping deterministic for identical inputs.
    pub tokens: BTreeMap<String, Token>,
    pub source_failures: Vec<SourceFailure>,
    /// Records dropped during normalization across all sources.
    pub dropped_records: usize,
    /// Tokens whose `price_usd` was filled by the enrichment pass.
    pub enriched: usize,
    pub enrichment_failure: Option<String>,
}

impl MergeReport {
    /// Tokens in deterministic (address) order.
    pub fn tokens_vec(&self) -> Vec<Token> {
        self.tokens.values().cloned().collect()
    }

    /// Addresses still lacking a USD price after the structural merge;
    /// the enrichment pass targets exactly these.
    pub fn addresses_missing_price(&self) -> Vec<String> {
        self.tokens
            .values()
            .filter(|t| t.price_usd.is_none())
            .map(|t| t.address.clone())
            .collect()
    }
}

/// Merge settled source outcomes, highest-precedence source first.
///
/// Deterministic: identical outcomes in identical order always produce an
/// identical report.
pub fn merge_sources(outcomes: Vec<SourceOutcome>) -> MergeReport {
    let mut report = MergeReport::default();

    for outcome in outcomes {
        match outcome {
            SourceOutcome::Batch(batch) => {
                report.dropped_records += batch.dropped;
                for token in batch.tokens {
                    match report.tokens.get_mut(&token.address) {
                        Some(existing) => merge_into(existing, token),
                        None => {
                            report.tokens.insert(token.address.clone(), token);
                        }
                    }
                }
            }
            SourceOutcome::Failed { provider, error } => {
                debug!(provider = %provider, error = %error, "Source contributed nothing to merge");
                report.source_failures.push(SourceFailure {
                    provider,
                    error: error.to_string(),
                });
            }
        }
    }

    report
}

/// Fill an existing record from a lower-precedence one: every field of
/// the existing record wins unless it is null. `source_hints` is a plain
/// set union, independent of field precedence.
fn merge_into(existing: &mut Token, incoming: Token) {
    fill(&mut existing.name, incoming.name);
    fill(&mut existing.ticker, incoming.ticker);
    fill(&mut existing.price_usd, incoming.price_usd);
    fill(&mut existing.price_native, incoming.price_native);
    fill(&mut existing.market_cap, incoming.market_cap);
    fill(&mut existing.volume, incoming.volume);
    fill(&mut existing.liquidity, incoming.liquidity);
    fill(&mut existing.tx_count, incoming.tx_count);
    fill(&mut existing.change_1h, incoming.change_1h);
    fill(&mut existing.change_24h, incoming.change_24h);
    fill(&mut existing.change_7d, incoming.change_7d);
    fill(&mut existing.protocol, incoming.protocol);
    existing.source_hints.extend(incoming.source_hints);
}

fn fill<T>(slot: &mut Option<T>, incoming: Option<T>) {
    if slot.is_none() {
        *slot = incoming;
    }
}

/// Price-only enrichment: may set `price_usd` where it is still null, and
/// nothing else. Returns how many tokens were filled.
pub fn apply_price_enrichment(
    report: &mut MergeReport,
    prices: &HashMap<String, f64>,
) -> usize {
    let mut enriched = 0usize;
    for token in report.tokens.values_mut() {
        if token.price_usd.is_some() {
            continue;
        }
        if let Some(price) = prices.get(&token.address) {
            token.price_usd = Some(*price);
            token.source_hints.insert(Provider::Jupiter);
            enriched += 1;
        }
    }
    report.enriched += enriched;
    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::NormalizedBatch;

    fn batch(provider: Provider, tokens: Vec<Token>) -> SourceOutcome {
        SourceOutcome::Batch(NormalizedBatch {
            provider,
            tokens,
            dropped: 0,
        })
    }

    fn token(provider: Provider, address: &str) -> Token {
        let mut t = Token::new(address);
        t.source_hints.insert(provider);
        t
    }

    #[test]
    fn field_level_precedence_not_whole_record() {
        // Source A: price but no tx count; source B: both, lower precedence.
        let mut a = token(Provider::DexScreener, "A1");
        a.price_usd = Some(0.0010);

        let mut b = token(Provider::GeckoTerminal, "A1");
        b.price_usd = Some(0.0009);
        b.tx_count = Some(180);

        let report = merge_sources(vec![
            batch(Provider::DexScreener, vec![a]),
            batch(Provider::GeckoTerminal, vec![b]),
        ]);

        let merged = &report.tokens["A1"];
        assert_eq!(merged.price_usd, Some(0.0010));
        assert_eq!(merged.tx_count, Some(180));
        assert!(merged.source_hints.contains(&Provider::DexScreener));
        assert!(merged.source_hints.contains(&Provider::GeckoTerminal));
    }

    #[test]
    fn source_hints_union_is_exact() {
        let a = token(Provider::DexScreener, "X");
        let b = token(Provider::GeckoTerminal, "X");

        let report = merge_sources(vec![
            batch(Provider::DexScreener, vec![a]),
            batch(Provider::GeckoTerminal, vec![b]),
        ]);

        let hints = &report.tokens["X"].source_hints;
        assert_eq!(hints.len(), 2);
    }

    #[test]
    fn unseen_addresses_insert_as_is() {
        let mut a = token(Provider::DexScreener, "only-ds");
        a.volume = Some(5.0);

        let report = merge_sources(vec![batch(Provider::DexScreener, vec![a.clone()])]);
        assert_eq!(report.tokens["only-ds"], a);
    }

    #[test]
    fn merge_is_deterministic() {
        let build = || {
            let mut a = token(Provider::DexScreener, "A1");
            a.price_usd = Some(1.0);
            let mut b = token(Provider::GeckoTerminal, "B2");
            b.volume = Some(2.0);
            let mut b2 = token(Provider::GeckoTerminal, "A1");
            b2.liquidity = Some(3.0);
            merge_sources(vec![
                batch(Provider::DexScreener, vec![a]),
                batch(Provider::GeckoTerminal, vec![b, b2]),
            ])
        };

        let first = serde_json::to_string(&build().tokens).unwrap();
        let second = serde_json::to_string(&build().tokens).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn failed_source_is_contained_and_reported() {
        let a = token(Provider::DexScreener, "A1");
        let report = merge_sources(vec![
            batch(Provider::DexScreener, vec![a]),
            SourceOutcome::Failed {
                provider: Provider::GeckoTerminal,
                error: crate::error::FetchError::from_status(Provider::GeckoTerminal, 503),
            },
        ]);

        assert_eq!(report.tokens.len(), 1);
        assert_eq!(report.source_failures.len(), 1);
        assert_eq!(report.source_failures[0].provider, Provider::GeckoTerminal);
    }

    #[test]
    fn enrichment_fills_only_null_prices() {
        let mut priced = token(Provider::DexScreener, "has-price");
        priced.price_usd = Some(2.0);
        let bare = token(Provider::GeckoTerminal, "needs-price");

        let mut report = merge_sources(vec![
            batch(Provider::DexScreener, vec![priced]),
            batch(Provider::GeckoTerminal, vec![bare]),
        ]);
        assert_eq!(report.addresses_missing_price(), vec!["needs-price"]);

        let prices = HashMap::from([
            ("has-price".to_string(), 9.0),
            ("needs-price".to_string(), 0.5),
        ]);
        let enriched = apply_price_enrichment(&mut report, &prices);

        assert_eq!(enriched, 1);
        assert_eq!(report.tokens["has-price"].price_usd, Some(2.0));
        assert_eq!(report.tokens["needs-price"].price_usd, Some(0.5));
        assert!(report.tokens["needs-price"]
            .source_hints
            .contains(&Provider::Jupiter));
        assert!(!report.tokens["has-price"]
            .source_hints
            .contains(&Provider::Jupiter));
    }
}
