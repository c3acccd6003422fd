use anyhow::Result;
use shared::models::AlertDirection;
use std::sync::Arc;
use teloxide::prelude::*;

use super::acting_user;
use crate::state::AppState;

pub async fn handle_setalert(bot: Bot, msg: Message, state: Arc<AppState>, args: String) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(user) = acting_user(&state, from).await? else {
        return Ok(());
    };

    let usage = "Usage: /setalert <symbol> <price> <above|below>, e.g. /setalert btc 50000 above";
    let parts: Vec<&str> = args.split_whitespace().collect();
    let (symbol, price, direction) = match parts.as_slice() {
        [symbol, price, direction] => {
            match (price.parse::<f64>(), AlertDirection::parse(direction)) {
                (Ok(price), Some(direction)) if price > 0.0 => {
                    (symbol.to_string(), price, direction)
                }
                _ => {
                    bot.send_message(msg.chat.id, usage).await?;
                    return Ok(());
                }
            }
        }
        _ => {
            bot.send_message(msg.chat.id, usage).await?;
            return Ok(());
        }
    };

    let alert = state
        .alerts
        .create_alert(user.telegram_id, &symbol, price, direction)
        .await?;

    bot.send_message(
        msg.chat.id,
        format!(
            "🔔 Alert #{} set: I'll tell you when <b>{}</b> goes {} <code>{:.4}</code>.",
            alert.id,
            alert.symbol,
            direction.as_str(),
            alert.target_price
        ),
    )
    .parse_mode(teloxide::types::ParseMode::Html)
    .await?;
    Ok(())
}

pub async fn handle_myalerts(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(user) = acting_user(&state, from).await? else {
        return Ok(());
    };

    let alerts = state.alerts.alerts_for_user(user.telegram_id).await?;
    if alerts.is_empty() {
        bot.send_message(msg.chat.id, "You have no alerts. Set one with /setalert.")
            .await?;
        return Ok(());
    }

    let mut text = String::from("🗒 <b>Your alerts</b>\n\n");
    for alert in &alerts {
        text.push_str(&format!(
            "<b>#{}</b> {} {} <code>{:.4}</code>\n",
            alert.id, alert.symbol, alert.direction, alert.target_price
        ));
    }
    text.push_str("\nRemove one with /removealert <id>.");

    bot.send_message(msg.chat.id, text)
        .parse_mode(teloxide::types::ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn handle_removealert(bot: Bot, msg: Message, state: Arc<AppState>, args: String) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(user) = acting_user(&state, from).await? else {
        return Ok(());
    };

    let Ok(alert_id) = args.trim().parse::<i64>() else {
        bot.send_message(msg.chat.id, "Usage: /removealert <id> (see /myalerts)")
            .await?;
        return Ok(());
    };

    if state.alerts.remove_alert(user.telegram_id, alert_id).await? {
        bot.send_message(msg.chat.id, format!("🔕 Alert #{} removed.", alert_id))
            .await?;
    } else {
        bot.send_message(msg.chat.id, format!("Alert #{} is not yours or does not exist.", alert_id))
            .await?;
    }
    Ok(())
}
