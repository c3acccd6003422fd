use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use shared::entity::portfolio;
use shared::market::normalize_symbol;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::warn;

use super::{acting_user, TRY_AGAIN};
use crate::state::AppState;

pub async fn handle_addposition(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
    args: String,
) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(user) = acting_user(&state, from).await? else {
        return Ok(());
    };

    let usage = "Usage: /addposition <symbol> <amount> <entry price>, e.g. /addposition btc 0.5 42000";
    let parts: Vec<&str> = args.split_whitespace().collect();
    let (symbol, amount, entry) = match parts.as_slice() {
        [symbol, amount, entry] => match (amount.parse::<f64>(), entry.parse::<f64>()) {
            (Ok(amount), Ok(entry)) if amount > 0.0 && entry > 0.0 => {
                (symbol.to_string(), amount, entry)
            }
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

    let position = portfolio::ActiveModel {
        user_id: Set(user.telegram_id),
        symbol: Set(normalize_symbol(&symbol)),
        amount: Set(amount),
        entry_price: Set(entry),
        created_at: Set(Some(Utc::now())),
        ..Default::default()
    };
    let saved = portfolio::Entity::insert(position)
        .exec_with_returning(state.db.as_ref())
        .await?;

    bot.send_message(
        msg.chat.id,
        format!(
            "✅ Position #{} added: <code>{}</code> {} @ <code>{:.4}</code>",
            saved.id, saved.amount, saved.symbol, saved.entry_price
        ),
    )
    .parse_mode(teloxide::types::ParseMode::Html)
    .await?;
    Ok(())
}

pub async fn handle_myportfolio(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(user) = acting_user(&state, from).await? else {
        return Ok(());
    };

    let positions = portfolio::Entity::find()
        .filter(portfolio::Column::UserId.eq(user.telegram_id))
        .order_by_asc(portfolio::Column::Id)
        .all(state.db.as_ref())
        .await?;

    if positions.is_empty() {
        bot.send_message(
            msg.chat.id,
            "Your portfolio is empty. Add a position with /addposition.",
        )
        .await?;
        return Ok(());
    }

    let mut symbols: Vec<String> = positions.iter().map(|p| p.symbol.clone()).collect();
    symbols.sort();
    symbols.dedup();
    let prices = match state.market.get_prices(&symbols).await {
        Ok(prices) => prices,
        Err(err) => {
            warn!("/myportfolio price fetch failed: {}", err);
            bot.send_message(msg.chat.id, TRY_AGAIN).await?;
            return Ok(());
        }
    };

    let mut text = String::from("💼 <b>Your portfolio</b>\n\n");
    let mut total_value = 0.0;
    let mut total_cost = 0.0;
    for position in &positions {
        total_cost += position.amount * position.entry_price;
        match prices.get(&position.symbol) {
            Some(&price) => {
                let (value, pnl_pct) =
                    position_value(position.amount, position.entry_price, price);
                total_value += value;
                text.push_str(&format!(
                    "<b>#{} {}</b> — {} @ <code>{:.4}</code>\n    now <code>{:.4}</code> · value <code>{:.2}</code> USD · {:+.2}%\n",
                    position.id,
                    position.symbol,
                    position.amount,
                    position.entry_price,
                    price,
                    value,
                    pnl_pct
                ));
            }
            None => {
                text.push_str(&format!(
                    "<b>#{} {}</b> — {} @ <code>{:.4}</code>\n    price unavailable right now\n",
                    position.id, position.symbol, position.amount, position.entry_price
                ));
            }
        }
    }
    let total_pnl = if total_cost == 0.0 {
        0.0
    } else {
        (total_value - total_cost) / total_cost * 100.0
    };
    text.push_str(&format!(
        "\nTotal value: <code>{:.2}</code> USD ({:+.2}%)",
        total_value, total_pnl
    ));

    bot.send_message(msg.chat.id, text)
        .parse_mode(teloxide::types::ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn handle_removeposition(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
    args: String,
) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(user) = acting_user(&state, from).await? else {
        return Ok(());
    };

    let Ok(position_id) = args.trim().parse::<i64>() else {
        bot.send_message(msg.chat.id, "Usage: /removeposition <id> (see /myportfolio)")
            .await?;
        return Ok(());
    };

    let result = portfolio::Entity::delete_many()
        .filter(portfolio::Column::Id.eq(position_id))
        .filter(portfolio::Column::UserId.eq(user.telegram_id))
        .exec(state.db.as_ref())
        .await?;

    if result.rows_affected == 1 {
        bot.send_message(msg.chat.id, format!("🗑 Position #{} removed.", position_id))
            .await?;
    } else {
        bot.send_message(
            msg.chat.id,
            format!("Position #{} is not in your portfolio.", position_id),
        )
        .await?;
    }
    Ok(())
}

fn position_value(amount: f64, entry: f64, current: f64) -> (f64, f64) {
    let value = amount * current;
    let pnl_pct = if entry == 0.0 {
        0.0
    } else {
        (current - entry) / entry * 100.0
    };
    (value, pnl_pct)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_value_and_pnl() {
        let (value, pnl) = position_value(2.0, 100.0, 110.0);
        assert_eq!(value, 220.0);
        assert!((pnl - 10.0).abs() < 1e-9);

        let (value, pnl) = position_value(1.0, 100.0, 90.0);
        assert_eq!(value, 90.0);
        assert!((pnl + 10.0).abs() < 1e-9);
    }

    #[test]
    fn zero_entry_does_not_divide_by_zero() {
        let (_, pnl) = position_value(1.0, 0.0, 50.0);
        assert_eq!(pnl, 0.0);
    }
}
