//! Deterministic ranking and cursor pagination
//!
//! Orders a merged set descending by the requested sort key, with
//! `-infinity` standing in for missing fields so data-poor tokens sort
//! last, and the address as tie-break so the order is total. Cursors
//! encode `(sort_value, address)` as url-safe base64; anything that fails
//! to decode or no longer resolves means "start from the beginning".

use base64::{engine::general_purpose, Engine as _};

use crate::types::{SortKey, Timeframe, Token};

/// One page of a ranked listing.
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<Token>,
    pub next_cursor: Option<String>,
}

/// Decoded cursor position.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub sort_value: f64,
    pub address: String,
}

/// Sort value for a token under the requested key; missing data ranks
/// below every real value.
pub fn sort_value(token: &Token, sort: SortKey, timeframe: Timeframe) -> f64 {
    let value = match sort {
        SortKey::Volume => token.volume,
        SortKey::PriceChange => token.change_for(timeframe),
        SortKey::MarketCap => token.market_cap,
        SortKey::Price => token.price_usd,
        SortKey::Liquidity => token.liquidity,
        SortKey::Txs => token.tx_count.map(|n| n as f64),
    };
    value.unwrap_or(f64::NEG_INFINITY)
}

/// Total descending order: sort value first, address ascending on ties.
pub fn rank(mut tokens: Vec<Token>, sort: SortKey, timeframe: Timeframe) -> Vec<Token> {
    tokens.sort_by(|a, b| {
        sort_value(b, sort, timeframe)
            .total_cmp(&sort_value(a, sort, timeframe))
            .then_with(|| a.address.cmp(&b.address))
    });
    tokens
}

pub fn encode_cursor(sort_value: f64, address: &str) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(format!("{}|{}", sort_value, address))
}

/// Decode an opaque cursor. Returns `None` for anything malformed.
pub fn decode_cursor(cursor: &str) -> Option<Cursor> {
    let bytes = general_purpose::URL_SAFE_NO_PAD.decode(cursor).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let (value, address) = text.split_once('|')?;
    let sort_value = value.parse::<f64>().ok()?;
    if address.is_empty() {
        return None;
    }
    Some(Cursor {
        sort_value,
        address: address.to_string(),
    })
}

/// Walk the ranked order starting just after the cursor's position, or
/// from the start when the cursor is absent, malformed, or references an
/// address no longer present. `next_cursor` is `None` once the page is
/// short or the ordering is exhausted.
pub fn paginate(
    ranked: &[Token],
    sort: SortKey,
    timeframe: Timeframe,
    cursor: Option<&str>,
    limit: usize,
) -> Page {
    let start = cursor
        .and_then(decode_cursor)
        .and_then(|c| ranked.iter().position(|t| t.address == c.address))
        .map(|idx| idx + 1)
        .unwrap_or(0);

    let items: Vec<Token> = ranked.iter().skip(start).take(limit).cloned().collect();

    let next_cursor = if items.len() == limit && start + limit < ranked.len() {
        items
            .last()
            .map(|t| encode_cursor(sort_value(t, sort, timeframe), &t.address))
    } else {
        None
    };

    Page { items, next_cursor }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(address: &str, volume: Option<f64>) -> Token {
        let mut t = Token::new(address);
        t.volume = volume;
        t
    }

    fn fixture() -> Vec<Token> {
        vec![
            token("a", Some(50.0)),
            token("b", Some(40.0)),
            token("c", Some(30.0)),
            token("d", Some(20.0)),
            token("e", Some(10.0)),
        ]
    }

    fn addresses(items: &[Token]) -> Vec<&str> {
        items.iter().map(|t| t.address.as_str()).collect()
    }

    #[test]
    fn ranks_descending_with_missing_values_last() {
        let tokens = vec![
            token("poor", None),
            token("mid", Some(5.0)),
            token("rich", Some(50.0)),
        ];
        let ranked = rank(tokens, SortKey::Volume, Timeframe::H24);
        assert_eq!(addresses(&ranked), vec!["rich", "mid", "poor"]);
    }

    #[test]
    fn ties_break_by_address_for_a_total_order() {
        let tokens = vec![token("z", Some(1.0)), token("a", Some(1.0))];
        let ranked = rank(tokens, SortKey::Volume, Timeframe::H24);
        assert_eq!(addresses(&ranked), vec!["a", "z"]);
    }

    #[test]
    fn cursor_roundtrips() {
        let encoded = encode_cursor(42.5, "addr");
        let decoded = decode_cursor(&encoded).unwrap();
        assert_eq!(decoded.sort_value, 42.5);
        assert_eq!(decoded.address, "addr");
    }

    #[test]
    fn five_assets_limit_two_walks_in_three_pages() {
        let ranked = rank(fixture(), SortKey::Volume, Timeframe::H24);

        let first = paginate(&ranked, SortKey::Volume, Timeframe::H24, None, 2);
        assert_eq!(addresses(&first.items), vec!["a", "b"]);
        let c1 = first.next_cursor.expect("more pages");

        let second = paginate(&ranked, SortKey::Volume, Timeframe::H24, Some(&c1), 2);
        assert_eq!(addresses(&second.items), vec!["c", "d"]);
        let c2 = second.next_cursor.expect("one more page");

        let third = paginate(&ranked, SortKey::Volume, Timeframe::H24, Some(&c2), 2);
        assert_eq!(addresses(&third.items), vec!["e"]);
        assert_eq!(third.next_cursor, None);
    }

    #[test]
    fn concatenated_pages_cover_the_order_exactly_once() {
        let ranked = rank(fixture(), SortKey::Volume, Timeframe::H24);
        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = paginate(&ranked, SortKey::Volume, Timeframe::H24, cursor.as_deref(), 2);
            seen.extend(page.items.iter().map(|t| t.address.clone()));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(seen, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn malformed_cursor_starts_from_the_beginning() {
        let ranked = rank(fixture(), SortKey::Volume, Timeframe::H24);
        let page = paginate(
            &ranked,
            SortKey::Volume,
            Timeframe::H24,
            Some("!!not-base64!!"),
            2,
        );
        assert_eq!(addresses(&page.items), vec!["a", "b"]);
    }

    #[test]
    fn stale_cursor_starts_from_the_beginning() {
        let ranked = rank(fixture(), SortKey::Volume, Timeframe::H24);
        let stale = encode_cursor(99.0, "delisted");
        let page = paginate(&ranked, SortKey::Volume, Timeframe::H24, Some(&stale), 2);
        assert_eq!(addresses(&page.items), vec!["a", "b"]);
    }

    #[test]
    fn exact_final_page_has_no_next_cursor() {
        let ranked = rank(fixture(), SortKey::Volume, Timeframe::H24);
        let first = paginate(&ranked, SortKey::Volume, Timeframe::H24, None, 3);
        let second = paginate(
            &ranked,
            SortKey::Volume,
            Timeframe::H24,
            first.next_cursor.as_deref(),
            3,
        );
        assert_eq!(addresses(&second.items), vec!["d", "e"]);
        assert_eq!(second.next_cursor, None);
    }

    #[test]
    fn short_page_has_no_next_cursor() {
        let ranked = rank(fixture(), SortKey::Volume, Timeframe::H24);
        let page = paginate(&ranked, SortKey::Volume, Timeframe::H24, None, 10);
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.next_cursor, None);
    }
}
