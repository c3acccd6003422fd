use anyhow::Result;
use chrono::Utc;
use shared::entity::signals;
use shared::models::{SignalDirection, SignalOutcome};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::warn;

use super::{acting_user, TRY_AGAIN};
use crate::services::signal_service::free_signal_board;
use crate::state::AppState;

const PAGE_SIZE: usize = 5;
const BOARD_SIZE: usize = 10;

pub async fn handle_signals(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(_user) = acting_user(&state, from).await? else {
        return Ok(());
    };

    let markets = match state.market.get_top_markets(BOARD_SIZE).await {
        Ok(markets) => markets,
        Err(err) => {
            warn!("/signals market fetch failed: {}", err);
            bot.send_message(msg.chat.id, TRY_AGAIN).await?;
            return Ok(());
        }
    };

    let hour = Utc::now().timestamp() / 3600;
    let board = free_signal_board(&markets, hour);

    let mut text = String::from("📊 <b>Free Signal Board</b>\n\n");
    for entry in &board {
        let tag = match entry.setup {
            Some(SignalDirection::Long) => "🟢 long setup",
            Some(SignalDirection::Short) => "🔴 short setup",
            None => "⏸ neutral",
        };
        text.push_str(&format!(
            "<b>{}</b> — <code>{:.4}</code> USD ({:+.2}% 24h)\n    momentum {:.0} · {}\n",
            entry.market.name,
            entry.market.current_price,
            entry.market.price_change_percentage_24h.unwrap_or(0.0),
            entry.oscillator,
            tag
        ));
    }
    text.push_str("\n💎 VIP members get curated entries with targets and stops — /subscribe");

    bot.send_message(msg.chat.id, text)
        .parse_mode(teloxide::types::ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn handle_vipsignals(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(user) = acting_user(&state, from).await? else {
        return Ok(());
    };

    if !state.subscriptions.is_entitled(user.telegram_id).await? {
        bot.send_message(
            msg.chat.id,
            "💎 VIP signals are for subscribers.\n\nUse /subscribe to unlock them.",
        )
        .await?;
        return Ok(());
    }

    let vip_signals = state.signals.list_signals(true, 50).await?;
    if vip_signals.is_empty() {
        bot.send_message(msg.chat.id, "No VIP signals published yet — check back soon.")
            .await?;
        return Ok(());
    }

    state
        .sessions
        .set_signal_page(user.telegram_id, vip_signals.clone())
        .await;

    let (text, keyboard) = render_page(&vip_signals, 0);
    bot.send_message(msg.chat.id, text)
        .parse_mode(teloxide::types::ParseMode::Html)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

pub async fn handle_vipsignals_callback(bot: Bot, q: CallbackQuery, state: Arc<AppState>) -> Result<()> {
    let page = q
        .data
        .as_deref()
        .and_then(|data| data.strip_prefix("vipsig:"))
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(0);
    let user_id = q.from.id.0 as i64;

    let Some(cached) = state.sessions.signal_page(user_id).await else {
        bot.answer_callback_query(q.id)
            .text("This list has gone stale — run /vipsignals again.")
            .await?;
        return Ok(());
    };

    bot.answer_callback_query(q.id).await?;
    if let Some(message) = q.message {
        let (text, keyboard) = render_page(&cached, page);
        bot.edit_message_text(message.chat().id, message.id(), text)
            .parse_mode(teloxide::types::ParseMode::Html)
            .reply_markup(keyboard)
            .await?;
    }
    Ok(())
}

fn page_bounds(len: usize, page: usize) -> (usize, usize, usize, usize) {
    let pages = len.div_ceil(PAGE_SIZE).max(1);
    let page = page.min(pages - 1);
    let start = page * PAGE_SIZE;
    let end = (start + PAGE_SIZE).min(len);
    (start, end, page, pages)
}

fn render_page(signals: &[signals::Model], page: usize) -> (String, InlineKeyboardMarkup) {
    let (start, end, page, pages) = page_bounds(signals.len(), page);

    let mut text = format!("💎 <b>VIP Signals</b> — page {}/{}\n\n", page + 1, pages);
    for signal in &signals[start..end] {
        text.push_str(&format_signal_line(signal));
    }

    let mut row = Vec::new();
    if page > 0 {
        row.push(InlineKeyboardButton::callback(
            "⬅️ Prev",
            format!("vipsig:{}", page - 1),
        ));
    }
    if page + 1 < pages {
        row.push(InlineKeyboardButton::callback(
            "Next ➡️",
            format!("vipsig:{}", page + 1),
        ));
    }
    let keyboard = if row.is_empty() {
        InlineKeyboardMarkup::new(Vec::<Vec<InlineKeyboardButton>>::new())
    } else {
        InlineKeyboardMarkup::new(vec![row])
    };
    (text, keyboard)
}

fn format_signal_line(signal: &signals::Model) -> String {
    let status = match SignalOutcome::from_column(signal.hit_target) {
        SignalOutcome::Open => "🟡 open",
        SignalOutcome::HitTarget => "✅ target hit",
        SignalOutcome::HitStop => "🛑 stopped out",
    };
    format!(
        "<b>#{} {}</b> {} — entry <code>{:.4}</code> · 🎯 <code>{:.4}</code> · 🛑 <code>{:.4}</code> · {}\n",
        signal.id,
        signal.pair.to_uppercase(),
        signal.direction.to_uppercase(),
        signal.entry_price,
        signal.target_price,
        signal.stop_loss,
        status
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_bounds_clamp_and_slice() {
        // 12 entries, 5 per page -> 3 pages
        assert_eq!(page_bounds(12, 0), (0, 5, 0, 3));
        assert_eq!(page_bounds(12, 2), (10, 12, 2, 3));
        // out-of-range page clamps to the last one
        assert_eq!(page_bounds(12, 99), (10, 12, 2, 3));
        // empty list still renders one (empty) page
        assert_eq!(page_bounds(0, 0), (0, 0, 0, 1));
    }
}
