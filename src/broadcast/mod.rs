//! Snapshot-diff engine for push notifications
//!
//! One broadcaster instance owns one snapshot: the last-broadcast merged
//! state, keyed by address. Each tick compares a fresh merged set against
//! it and yields per-token change events: `new` for unseen addresses,
//! a field-level `{field: {from, to}}` map for changed ones, nothing for
//! unchanged ones. Tokens that disappear from the fresh set are not
//! signaled and stay in the snapshot.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};

use crate::types::Token;

/// A single changed field, with normalized before/after values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub from: Value,
    pub to: Value,
}

/// The change payload attached to a `token:update` event: either the
/// literal string `"new"` or a map of changed fields.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenDiff {
    New,
    Fields(BTreeMap<String, FieldChange>),
}

impl Serialize for TokenDiff {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TokenDiff::New => serializer.serialize_str("new"),
            TokenDiff::Fields(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (field, change) in fields {
                    map.serialize_entry(field, change)?;
                }
                map.end()
            }
        }
    }
}

/// One emitted change event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenUpdate {
    pub token: Token,
    pub diff: TokenDiff,
}

/// Owns the last-broadcast snapshot; mutated only by the serialized tick.
#[derive(Debug, Default)]
pub struct DiffBroadcaster {
    snapshot: HashMap<String, Token>,
}

impl DiffBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare a fresh merged set against the snapshot, update the
    /// snapshot for every emitted event, and return the events.
    pub fn apply(&mut self, fresh: &BTreeMap<String, Token>) -> Vec<TokenUpdate> {
        let mut updates = Vec::new();

        for (address, token) in fresh {
            match self.snapshot.get(address) {
                None => {
                    self.snapshot.insert(address.clone(), token.clone());
                    updates.push(TokenUpdate {
                        token: token.clone(),
                        diff: TokenDiff::New,
                    });
                }
                Some(prev) => {
                    let changed = diff_tokens(prev, token);
                    if !changed.is_empty() {
                        self.snapshot.insert(address.clone(), token.clone());
                        updates.push(TokenUpdate {
                            token: token.clone(),
                            diff: TokenDiff::Fields(changed),
                        });
                    }
                }
            }
        }

        updates
    }

    pub fn snapshot_len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.snapshot.contains_key(address)
    }
}

/// Field-by-field inequality on normalized values. Numbers compare as
/// numbers, so differing string renderings upstream cannot produce
/// spurious diffs.
pub fn diff_tokens(prev: &Token, next: &Token) -> BTreeMap<String, FieldChange> {
    let mut changed = BTreeMap::new();

    record(&mut changed, "name", json!(prev.name), json!(next.name));
    record(&mut changed, "ticker", json!(prev.ticker), json!(next.ticker));
    record(
        &mut changed,
        "price_usd",
        json!(prev.price_usd),
        json!(next.price_usd),
    );
    record(
        &mut changed,
        "price_native",
        json!(prev.price_native),
        json!(next.price_native),
    );
    record(
        &mut changed,
        "market_cap",
        json!(prev.market_cap),
        json!(next.market_cap),
    );
    record(&mut changed, "volume", json!(prev.volume), json!(next.volume));
    record(
        &mut changed,
        "liquidity",
        json!(prev.liquidity),
        json!(next.liquidity),
    );
    record(
        &mut changed,
        "tx_count",
        json!(prev.tx_count),
        json!(next.tx_count),
    );
    record(
        &mut changed,
        "change_1h",
        json!(prev.change_1h),
        json!(next.change_1h),
    );
    record(
        &mut changed,
        "change_24h",
        json!(prev.change_24h),
        json!(next.change_24h),
    );
    record(
        &mut changed,
        "change_7d",
        json!(prev.change_7d),
        json!(next.change_7d),
    );
    record(
        &mut changed,
        "protocol",
        json!(prev.protocol),
        json!(next.protocol),
    );
    record(
        &mut changed,
        "source_hints",
        json!(prev.source_hints),
        json!(next.source_hints),
    );

    changed
}

fn record(changed: &mut BTreeMap<String, FieldChange>, field: &str, from: Value, to: Value) {
    if from != to {
        changed.insert(field.to_string(), FieldChange { from, to });
    }
}
