//! Live price stream relay: one Binance trade WebSocket per user, ticks
//! relayed by editing a single Telegram message.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use teloxide::prelude::*;
use teloxide::types::MessageId;
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{info, warn};

use crate::state::AppState;

const BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/ws";

/// Telegram throttles message edits, so ticks are coalesced to one edit
/// every couple of seconds.
const EDIT_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct TradeTick {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "p")]
    price: String,
}

/// Starts a relay for the user, replacing any stream they already had. The
/// session slot is freed on every exit path: normal close, remote close,
/// error, or cancellation through [`stop_stream`].
pub async fn start_stream(
    state: Arc<AppState>,
    bot: Bot,
    chat_id: ChatId,
    user_id: i64,
    pair: String,
) -> Result<()> {
    if let Some(previous) = state.sessions.take_stream(user_id).await {
        previous.abort();
    }

    let placeholder = bot
        .send_message(
            chat_id,
            format!("🔴 Connecting to live stream for <b>{}</b>…", pair.to_uppercase()),
        )
        .parse_mode(teloxide::types::ParseMode::Html)
        .await?;

    let task_state = state.clone();
    let handle = tokio::spawn(async move {
        if let Err(err) = relay_loop(&bot, chat_id, placeholder.id, &pair).await {
            warn!("livestream for user {} ended with error: {}", user_id, err);
            let _ = bot
                .send_message(chat_id, "⚠️ Live stream disconnected. Use /livestream to restart.")
                .await;
        }
        task_state.sessions.clear_stream(user_id).await;
        info!("livestream slot freed for user {}", user_id);
    });

    let _ = state.sessions.put_stream(user_id, handle).await;
    Ok(())
}

/// Cancels the user's stream. Returns false when no stream was running.
pub async fn stop_stream(state: &AppState, user_id: i64) -> bool {
    match state.sessions.take_stream(user_id).await {
        Some(handle) => {
            handle.abort();
            true
        }
        None => false,
    }
}

async fn relay_loop(bot: &Bot, chat_id: ChatId, message_id: MessageId, pair: &str) -> Result<()> {
    let url = format!("{}/{}@trade", BINANCE_WS_URL, pair.to_lowercase());
    let (ws, _) = connect_async(url.as_str()).await?;
    let (mut write, mut read) = ws.split();

    let mut last_edit = Instant::now() - EDIT_INTERVAL;
    while let Some(message) = read.next().await {
        match message? {
            WsMessage::Text(text) => {
                let Ok(tick) = serde_json::from_str::<TradeTick>(&text) else {
                    continue;
                };
                if last_edit.elapsed() < EDIT_INTERVAL {
                    continue;
                }
                last_edit = Instant::now();
                let body = format!(
                    "🔴 <b>LIVE {}</b>\n💰 <code>{}</code> USDT\n\nUse /stopstream to stop.",
                    tick.symbol, tick.price
                );
                if let Err(err) = bot
                    .edit_message_text(chat_id, message_id, body)
                    .parse_mode(teloxide::types::ParseMode::Html)
                    .await
                {
                    // The message may have been deleted by the user; stop relaying.
                    warn!("live tick edit failed, closing stream: {}", err);
                    break;
                }
            }
            WsMessage::Ping(payload) => {
                write.send(WsMessage::Pong(payload)).await?;
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}
