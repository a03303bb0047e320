//! Viewer sessions over WebSocket.
//!
//! Every connection gets the current snapshot and any cached price ticks
//! immediately on accept, then receives broadcast updates. The server pings
//! on a fixed interval; a viewer that fails to pong before the next ping is
//! due is forcibly dropped. All failures are isolated to their connection.

pub mod broadcast;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::StreamExt;
use futures::SinkExt;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use crate::signals::PriceTick;
use crate::state::AppState;

/// Wire form of a price tick on the ticks channel.
pub fn tick_message(tick: &PriceTick) -> String {
    json!({ "type": "tick", "data": tick }).to_string()
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[derive(Debug, Deserialize)]
struct WsClientMsg {
    #[serde(rename = "type")]
    msg_type: String,
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the replay so no update published in between is missed.
    let mut state_rx = state.broadcast.subscribe_state();
    let mut ticks_rx = state.broadcast.subscribe_ticks();

    // Replay: current snapshot first, then any known price ticks.
    let snapshot = {
        let store = state.store.lock().await;
        store.snapshot_message().to_string()
    };
    if sender.send(Message::Text(snapshot.into())).await.is_err() {
        return;
    }
    let cached: Vec<String> = {
        let ticks = state.ticks.read().await;
        ticks.values().map(tick_message).collect()
    };
    for msg in cached {
        if sender.send(Message::Text(msg.into())).await.is_err() {
            return;
        }
    }

    tracing::debug!("viewer connected");

    let mut ping = tokio::time::interval(Duration::from_secs(state.config.ws_ping_secs));
    let mut alive = true;

    loop {
        tokio::select! {
            _ = ping.tick() => {
                if !alive {
                    tracing::debug!("viewer missed pong, dropping connection");
                    break;
                }
                alive = false;
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => alive = true,
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(parsed) = serde_json::from_str::<WsClientMsg>(&text) {
                            if parsed.msg_type == "ping"
                                && sender
                                    .send(Message::Text(r#"{"type":"pong"}"#.into()))
                                    .await
                                    .is_err()
                            {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
            update = state_rx.recv() => {
                match update {
                    Ok(msg) => {
                        if sender.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Snapshots are full-state; skipping stale ones is harmless.
                        tracing::warn!("slow viewer skipped {skipped} snapshots");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tick = ticks_rx.recv() => {
                match tick {
                    Ok(msg) => {
                        if sender.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("slow viewer skipped {skipped} ticks");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("viewer disconnected");
}
