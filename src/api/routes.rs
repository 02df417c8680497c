//! HTTP routes and WebSocket connection handling

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use super::types::*;
use super::AppState;
use crate::rank::{paginate, rank};
use crate::types::ListingQuery;

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/tokens", get(get_tokens))
        .route("/health", get(get_health))
        // WebSocket
        .route("/ws", get(websocket_handler))
        // State
        .with_state(state)
        // CORS for frontends
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

// ─────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────

/// GET /tokens - ranked, cursor-paginated merged listing
async fn get_tokens(
    State(state): State<AppState>,
    Query(params): Query<TokensParams>,
) -> impl IntoResponse {
    let params = params.clamped();
    let query = ListingQuery {
        q: params.q.clone(),
        page: params.page,
    };

    let tokens = state.service.merged_view(&query).await;
    let ranked = rank(tokens, params.sort, params.timeframe);
    let page = paginate(
        &ranked,
        params.sort,
        params.timeframe,
        params.cursor.as_deref(),
        params.limit,
    );

    Json(TokenPage {
        data: page.items,
        next_cursor: page.next_cursor,
        page_size: params.limit,
    })
}

/// GET /health - liveness probe
async fn get_health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

// ─────────────────────────────────────────────────────────────────
// WebSocket Handler
// ─────────────────────────────────────────────────────────────────

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::Response,
};

/// WebSocket upgrade handler
async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Outgoing message type for WebSocket
enum OutgoingMessage {
    Text(String),
    Pong(Vec<u8>),
}

/// Handle one WebSocket connection: `subscribe` yields a `tokens:init`
/// slice for the subscriber's preferences; every `token:update` broadcast
/// is forwarded globally.
async fn handle_websocket(socket: WebSocket, state: AppState) {
    use futures_util::{SinkExt, StreamExt};

    tracing::info!("New WebSocket connection");

    let (mut sender, mut receiver) = socket.split();

    // Subscribe to broadcasts
    let mut rx = state.ws.subscribe();

    // Channel for outgoing messages
    let (out_tx, mut out_rx) = tokio::sync::mpsc::channel::<OutgoingMessage>(32);

    // Spawn task to send outgoing messages
    let send_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let result = match msg {
                OutgoingMessage::Text(text) => sender.send(Message::Text(text)).await,
                OutgoingMessage::Pong(data) => sender.send(Message::Pong(data)).await,
            };
            if result.is_err() {
                break;
            }
        }
    });

    // Handle incoming messages (subscribe/ping) and broadcast updates
    loop {
        tokio::select! {
            // Broadcast updates
            broadcast_msg = rx.recv() => {
                if let Ok(msg) = broadcast_msg {
                    if out_tx.send(OutgoingMessage::Text(msg)).await.is_err() {
                        break;
                    }
                }
            }
            // Incoming messages
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Subscribe(prefs)) => {
                                if send_init(&state, &out_tx, &prefs).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                tracing::debug!(error = %err, "Ignoring unrecognized WebSocket message");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        // Respond with pong via the outgoing channel
                        if out_tx.send(OutgoingMessage::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    send_task.abort();
    tracing::info!("WebSocket connection closed");
}

/// Compute and queue the initial ranked slice for a subscriber.
async fn send_init(
    state: &AppState,
    out_tx: &tokio::sync::mpsc::Sender<OutgoingMessage>,
    prefs: &SubscribeRequest,
) -> Result<(), ()> {
    let query = ListingQuery {
        q: prefs.q.clone(),
        page: None,
    };
    let tokens = state.service.merged_view(&query).await;
    let ranked = rank(tokens, prefs.sort, prefs.timeframe);
    let slice: Vec<_> = ranked
        .into_iter()
        .take(prefs.limit.clamp(1, MAX_PAGE_SIZE))
        .collect();

    let msg = WsMessage::Init(slice);
    match serde_json::to_string(&msg) {
        Ok(json) => out_tx
            .send(OutgoingMessage::Text(json))
            .await
            .map_err(|_| ()),
        Err(_) => Ok(()),
    }
}
