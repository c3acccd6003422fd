use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::warn;

use super::{acting_user, TRY_AGAIN};
use crate::state::AppState;

pub async fn handle_price(bot: Bot, msg: Message, state: Arc<AppState>, symbol: String) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(_user) = acting_user(&state, from).await? else {
        return Ok(());
    };

    let symbol = symbol.trim().to_string();
    if symbol.is_empty() {
        bot.send_message(msg.chat.id, "Usage: /price <symbol>, e.g. /price btc")
            .await?;
        return Ok(());
    }

    match state.market.get_price(&symbol).await {
        Ok(Some(price)) => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "💰 <b>{}</b>: <code>{:.4}</code> USD",
                    symbol.to_uppercase(),
                    price
                ),
            )
            .parse_mode(teloxide::types::ParseMode::Html)
            .await?;
        }
        Ok(None) => {
            bot.send_message(
                msg.chat.id,
                format!("🤷 I don't know the symbol <code>{}</code>.", symbol),
            )
            .parse_mode(teloxide::types::ParseMode::Html)
            .await?;
        }
        Err(err) => {
            warn!("/price lookup for {} failed: {}", symbol, err);
            bot.send_message(msg.chat.id, TRY_AGAIN).await?;
        }
    }
    Ok(())
}

pub async fn handle_history(bot: Bot, msg: Message, state: Arc<AppState>, args: String) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(_user) = acting_user(&state, from).await? else {
        return Ok(());
    };

    let usage = "Usage: /history <symbol> <days>, e.g. /history bitcoin 7 (1-90 days)";
    let parts: Vec<&str> = args.split_whitespace().collect();
    let (symbol, days) = match parts.as_slice() {
        [symbol, days] => match days.parse::<usize>() {
            Ok(days) if (1..=90).contains(&days) => (symbol.to_string(), days),
            _ => {
                bot.send_message(msg.chat.id, usage).await?;
                return Ok(());
            }
        },
        _ => {
            bot.send_message(msg.chat.id, usage).await?;
            return Ok(());
        }
    };

    let klines = match state.market.get_klines(&symbol, "1d", days).await {
        Ok(klines) if !klines.is_empty() => klines,
        Ok(_) => {
            bot.send_message(
                msg.chat.id,
                format!("🤷 No history available for <code>{}</code>.", symbol),
            )
            .parse_mode(teloxide::types::ParseMode::Html)
            .await?;
            return Ok(());
        }
        Err(err) => {
            warn!("/history lookup for {} failed: {}", symbol, err);
            bot.send_message(msg.chat.id, TRY_AGAIN).await?;
            return Ok(());
        }
    };

    let open = klines[0].open;
    let close = klines[klines.len() - 1].close;
    let high = klines.iter().map(|k| k.high).fold(f64::MIN, f64::max);
    let low = klines.iter().map(|k| k.low).fold(f64::MAX, f64::min);
    let change = if open == 0.0 {
        0.0
    } else {
        (close - open) / open * 100.0
    };
    let trend = if change >= 0.0 { "📈" } else { "📉" };

    bot.send_message(
        msg.chat.id,
        format!(
            "{} <b>{}</b> — last {} day(s)\n\n\
            Open: <code>{:.4}</code>\n\
            Close: <code>{:.4}</code>\n\
            High: <code>{:.4}</code>\n\
            Low: <code>{:.4}</code>\n\
            Change: <code>{:+.2}%</code>",
            trend,
            symbol.to_uppercase(),
            days,
            open,
            close,
            high,
            low,
            change
        ),
    )
    .parse_mode(teloxide::types::ParseMode::Html)
    .await?;
    Ok(())
}
