use anyhow::Result;
use shared::market::to_binance_pair;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::warn;

use super::{acting_user, TRY_AGAIN};
use crate::services::stream_service;
use crate::state::AppState;

pub async fn handle_livestream(bot: Bot, msg: Message, state: Arc<AppState>, args: String) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(user) = acting_user(&state, from).await? else {
        return Ok(());
    };

    let raw = args.trim();
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_alphanumeric()) {
        bot.send_message(msg.chat.id, "Usage: /livestream <pair>, e.g. /livestream btcusdt")
            .await?;
        return Ok(());
    }
    let pair = to_binance_pair(raw);

    if let Err(err) = stream_service::start_stream(
        state.clone(),
        bot.clone(),
        msg.chat.id,
        user.telegram_id,
        pair,
    )
    .await
    {
        warn!("livestream start for user {} failed: {}", user.telegram_id, err);
        bot.send_message(msg.chat.id, TRY_AGAIN).await?;
    }
    Ok(())
}

pub async fn handle_stopstream(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(user) = acting_user(&state, from).await? else {
        return Ok(());
    };

    if stream_service::stop_stream(&state, user.telegram_id).await {
        bot.send_message(msg.chat.id, "⏹ Live stream stopped.").await?;
    } else {
        bot.send_message(msg.chat.id, "You have no live stream running. Start one with /livestream.")
            .await?;
    }
    Ok(())
}
