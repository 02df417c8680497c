//! API DTOs
//!
//! Wire shapes for the listing endpoint and the WebSocket push channel.

use serde::{Deserialize, Serialize};

use crate::broadcast::TokenUpdate;
use crate::types::{SortKey, Timeframe, Token};

/// Default and bounds for the listing page size.
pub const DEFAULT_PAGE_SIZE: usize = 30;
pub const MAX_PAGE_SIZE: usize = 100;
/// Upstream page pass-through bound.
pub const MAX_UPSTREAM_PAGE: u32 = 10;

/// Query parameters for `GET /tokens`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TokensParams {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub limit: usize,
    pub cursor: Option<String>,
    pub sort: SortKey,
    pub timeframe: Timeframe,
}

impl Default for TokensParams {
    fn default() -> Self {
        Self {
            q: None,
            page: None,
            limit: DEFAULT_PAGE_SIZE,
            cursor: None,
            sort: SortKey::default(),
            timeframe: Timeframe::default(),
        }
    }
}

impl TokensParams {
    /// Clamp numeric ranges into their documented bounds. Out-of-range
    /// values degrade to the nearest bound rather than erroring.
    pub fn clamped(mut self) -> Self {
        self.limit = self.limit.clamp(1, MAX_PAGE_SIZE);
        self.page = self.page.map(|p| p.clamp(1, MAX_UPSTREAM_PAGE));
        self
    }
}

/// Response body for `GET /tokens`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPage {
    pub data: Vec<Token>,
    pub next_cursor: Option<String>,
    pub page_size: usize,
}

/// A subscriber's listing preferences, carried by the `subscribe` event.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubscribeRequest {
    pub q: Option<String>,
    pub sort: SortKey,
    pub timeframe: Timeframe,
    pub limit: usize,
}

impl Default for SubscribeRequest {
    fn default() -> Self {
        Self {
            q: None,
            sort: SortKey::default(),
            timeframe: Timeframe::default(),
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Client → server WebSocket messages.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    #[serde(rename = "subscribe")]
    Subscribe(SubscribeRequest),
}

/// Server → client WebSocket messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum WsMessage {
    /// Initial ranked slice for a subscriber's preferences.
    #[serde(rename = "tokens:init")]
    Init(Vec<Token>),
    /// One changed or newly seen token.
    #[serde(rename = "token:update")]
    Update(TokenUpdate),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_default_and_clamp() {
        let params = TokensParams::default().clamped();
        assert_eq!(params.limit, 30);
        assert_eq!(params.sort, SortKey::Volume);
        assert_eq!(params.timeframe, Timeframe::H24);

        let wild = TokensParams {
            limit: 5000,
            page: Some(99),
            ..TokensParams::default()
        }
        .clamped();
        assert_eq!(wild.limit, MAX_PAGE_SIZE);
        assert_eq!(wild.page, Some(MAX_UPSTREAM_PAGE));
    }

    #[test]
    fn subscribe_event_deserializes_with_defaults() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"event":"subscribe","data":{"sort":"price_change","timeframe":"1h"}}"#,
        )
        .unwrap();
        let ClientMessage::Subscribe(prefs) = msg;
        assert_eq!(prefs.sort, SortKey::PriceChange);
        assert_eq!(prefs.timeframe, Timeframe::H1);
        assert_eq!(prefs.limit, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn ws_message_is_event_tagged() {
        let msg = WsMessage::Init(Vec::new());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"], "tokens:init");
        assert!(json["data"].is_array());
    }
}
