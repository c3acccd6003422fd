//! Admin-only commands. A non-admin calling any of these is ignored without
//! a reply.

use anyhow::Result;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use shared::entity::{payments, subscriptions, users};
use shared::models::{PaymentStatus, SignalDirection};
use std::collections::HashMap;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{info, warn};

use super::TRY_AGAIN;
use crate::state::AppState;

fn admin_sender(state: &AppState, msg: &Message) -> Option<i64> {
    let from = msg.from.as_ref()?;
    let id = from.id.0 as i64;
    state.is_admin(id).then_some(id)
}

pub async fn handle_addsignal(bot: Bot, msg: Message, state: Arc<AppState>, args: String) -> Result<()> {
    let Some(admin_id) = admin_sender(&state, &msg) else {
        return Ok(());
    };

    let usage = "Usage: /addsignal <pair> <long|short> <entry> <target> <stop> [vip]";
    let Some(parsed) = parse_addsignal(&args) else {
        bot.send_message(msg.chat.id, usage).await?;
        return Ok(());
    };
    let (pair, direction, entry, target, stop, is_vip) = parsed;

    let signal = state
        .signals
        .create_signal(&pair, direction, entry, target, stop, is_vip)
        .await?;
    info!("admin {} published signal {}", admin_id, signal.id);

    bot.send_message(
        msg.chat.id,
        format!(
            "📣 Signal #{} published: {} <b>{}</b> — entry <code>{:.4}</code>, 🎯 <code>{:.4}</code>, 🛑 <code>{:.4}</code>{}",
            signal.id,
            signal.direction.to_uppercase(),
            signal.pair.to_uppercase(),
            signal.entry_price,
            signal.target_price,
            signal.stop_loss,
            if signal.is_vip { " (VIP)" } else { "" }
        ),
    )
    .parse_mode(teloxide::types::ParseMode::Html)
    .await?;
    Ok(())
}

pub async fn handle_delsignal(bot: Bot, msg: Message, state: Arc<AppState>, args: String) -> Result<()> {
    let Some(_admin_id) = admin_sender(&state, &msg) else {
        return Ok(());
    };

    let Ok(signal_id) = args.trim().parse::<i64>() else {
        bot.send_message(msg.chat.id, "Usage: /delsignal <id>").await?;
        return Ok(());
    };

    if state.signals.delete_signal(signal_id).await? {
        bot.send_message(msg.chat.id, format!("🗑 Signal #{} deleted.", signal_id))
            .await?;
    } else {
        bot.send_message(msg.chat.id, format!("Signal #{} does not exist.", signal_id))
            .await?;
    }
    Ok(())
}

pub async fn handle_stats(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(_admin_id) = admin_sender(&state, &msg) else {
        return Ok(());
    };
    let db = state.db.as_ref();

    let total_users = users::Entity::find().count(db).await?;
    let banned = users::Entity::find()
        .filter(users::Column::IsBanned.eq(true))
        .count(db)
        .await?;
    let active_subs = subscriptions::Entity::find()
        .filter(subscriptions::Column::EndDate.gte(Utc::now()))
        .count(db)
        .await?;
    let signal_stats = state.signals.stats().await?;

    bot.send_message(
        msg.chat.id,
        format!(
            "📊 <b>Bot statistics</b>\n\n\
            Users: <code>{}</code> (banned: <code>{}</code>)\n\
            Active subscriptions: <code>{}</code>\n\
            Signals: <code>{}</code> total, <code>{}</code> open",
            total_users, banned, active_subs, signal_stats.total, signal_stats.open
        ),
    )
    .parse_mode(teloxide::types::ParseMode::Html)
    .await?;
    Ok(())
}

pub async fn handle_broadcast(bot: Bot, msg: Message, state: Arc<AppState>, text: String) -> Result<()> {
    let Some(admin_id) = admin_sender(&state, &msg) else {
        return Ok(());
    };
    let text = text.trim().to_string();
    if text.is_empty() {
        bot.send_message(msg.chat.id, "Usage: /broadcast <message>").await?;
        return Ok(());
    }

    let recipients = users::Entity::find()
        .filter(users::Column::IsBanned.eq(false))
        .all(state.db.as_ref())
        .await?;
    info!("admin {} broadcasting to {} users", admin_id, recipients.len());

    let mut delivered = 0u32;
    let mut failed = 0u32;
    for user in &recipients {
        match bot
            .send_message(ChatId(user.telegram_id), format!("📢 {}", text))
            .await
        {
            Ok(_) => delivered += 1,
            Err(err) => {
                // Users who blocked the bot just count as failures.
                warn!("broadcast to {} failed: {}", user.telegram_id, err);
                failed += 1;
            }
        }
    }

    bot.send_message(
        msg.chat.id,
        format!("📢 Broadcast done: {} delivered, {} failed.", delivered, failed),
    )
    .await?;
    Ok(())
}

pub async fn handle_userinfo(bot: Bot, msg: Message, state: Arc<AppState>, args: String) -> Result<()> {
    let Some(_admin_id) = admin_sender(&state, &msg) else {
        return Ok(());
    };

    let Ok(user_id) = args.trim().parse::<i64>() else {
        bot.send_message(msg.chat.id, "Usage: /userinfo <telegram id>").await?;
        return Ok(());
    };

    let Some(user) = users::Entity::find_by_id(user_id).one(state.db.as_ref()).await? else {
        bot.send_message(msg.chat.id, format!("User {} is unknown.", user_id))
            .await?;
        return Ok(());
    };

    let subscription = subscriptions::Entity::find_by_id(user_id)
        .one(state.db.as_ref())
        .await?;
    let payment_count = payments::Entity::find()
        .filter(payments::Column::UserId.eq(user_id))
        .count(state.db.as_ref())
        .await?;

    let sub_line = match subscription {
        Some(sub) if sub.end_date >= Utc::now() => format!(
            "active until {}",
            sub.end_date
                .with_timezone(&state.config.timezone)
                .format("%Y-%m-%d %H:%M %Z")
        ),
        Some(_) => "expired".to_string(),
        None => "none".to_string(),
    };

    bot.send_message(
        msg.chat.id,
        format!(
            "👤 <b>User {}</b>\n\n\
            Username: {}\n\
            Tier: <code>{}</code>\n\
            Banned: <code>{}</code>\n\
            Subscription: {}\n\
            Payments: <code>{}</code>",
            user.telegram_id,
            user.username.as_deref().unwrap_or("-"),
            user.tier,
            user.is_banned,
            sub_line,
            payment_count
        ),
    )
    .parse_mode(teloxide::types::ParseMode::Html)
    .await?;
    Ok(())
}

pub async fn handle_dashboard(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(_admin_id) = admin_sender(&state, &msg) else {
        return Ok(());
    };
    let db = state.db.as_ref();

    let total_users = users::Entity::find().count(db).await?;
    let active_subs = subscriptions::Entity::find()
        .filter(subscriptions::Column::EndDate.gte(Utc::now()))
        .count(db)
        .await?;
    let signal_stats = state.signals.stats().await?;
    let completed = payments::Entity::find()
        .filter(payments::Column::Status.eq(PaymentStatus::Completed.as_str()))
        .all(db)
        .await?;
    let (revenue, payment_count, _) = summarize_revenue(&completed);

    let win_rate = signal_stats
        .win_rate()
        .map(|rate| format!("{:.1}%", rate))
        .unwrap_or_else(|| "n/a".to_string());

    bot.send_message(
        msg.chat.id,
        format!(
            "🖥 <b>Dashboard</b>\n\n\
            Users: <code>{}</code>\n\
            Active VIPs: <code>{}</code>\n\
            Open signals: <code>{}</code>\n\
            Win rate: <code>{}</code>\n\
            Revenue: <code>{:.2}</code> USDT over <code>{}</code> payments",
            total_users, active_subs, signal_stats.open, win_rate, revenue, payment_count
        ),
    )
    .parse_mode(teloxide::types::ParseMode::Html)
    .await?;
    Ok(())
}

pub async fn handle_banuser(bot: Bot, msg: Message, state: Arc<AppState>, args: String) -> Result<()> {
    set_ban_flag(bot, msg, state, args, true).await
}

pub async fn handle_unbanuser(bot: Bot, msg: Message, state: Arc<AppState>, args: String) -> Result<()> {
    set_ban_flag(bot, msg, state, args, false).await
}

async fn set_ban_flag(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
    args: String,
    banned: bool,
) -> Result<()> {
    let Some(admin_id) = admin_sender(&state, &msg) else {
        return Ok(());
    };
    let verb = if banned { "banned" } else { "unbanned" };

    let Ok(user_id) = args.trim().parse::<i64>() else {
        bot.send_message(
            msg.chat.id,
            format!("Usage: /{}user <telegram id>", if banned { "ban" } else { "unban" }),
        )
        .await?;
        return Ok(());
    };

    let result = users::Entity::update_many()
        .col_expr(users::Column::IsBanned, Expr::value(banned))
        .filter(users::Column::TelegramId.eq(user_id))
        .exec(state.db.as_ref())
        .await?;

    if result.rows_affected == 1 {
        info!("admin {} {} user {}", admin_id, verb, user_id);
        bot.send_message(msg.chat.id, format!("User {} {}.", user_id, verb))
            .await?;
    } else {
        bot.send_message(msg.chat.id, format!("User {} is unknown.", user_id))
            .await?;
    }
    Ok(())
}

pub async fn handle_vipgrant(bot: Bot, msg: Message, state: Arc<AppState>, args: String) -> Result<()> {
    let Some(admin_id) = admin_sender(&state, &msg) else {
        return Ok(());
    };

    let usage = "Usage: /vipgrant <telegram id> <days>";
    let parts: Vec<&str> = args.split_whitespace().collect();
    let (user_id, days) = match parts.as_slice() {
        [user_id, days] => match (user_id.parse::<i64>(), days.parse::<i64>()) {
            (Ok(user_id), Ok(days)) if (1..=3650).contains(&days) => (user_id, days),
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

    if users::Entity::find_by_id(user_id)
        .one(state.db.as_ref())
        .await?
        .is_none()
    {
        bot.send_message(
            msg.chat.id,
            format!("User {} is unknown; they need to /start the bot first.", user_id),
        )
        .await?;
        return Ok(());
    }

    let subscription = state.subscriptions.grant_vip(user_id, days).await?;
    info!("admin {} granted {} VIP days to user {}", admin_id, days, user_id);

    bot.send_message(
        msg.chat.id,
        format!(
            "⭐ User {} is VIP until <code>{}</code>.",
            user_id,
            subscription
                .end_date
                .with_timezone(&state.config.timezone)
                .format("%Y-%m-%d %H:%M %Z")
        ),
    )
    .parse_mode(teloxide::types::ParseMode::Html)
    .await?;
    Ok(())
}

pub async fn handle_signalstats(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(_admin_id) = admin_sender(&state, &msg) else {
        return Ok(());
    };

    let stats = state.signals.stats().await?;
    let win_rate = stats
        .win_rate()
        .map(|rate| format!("{:.1}%", rate))
        .unwrap_or_else(|| "n/a (no resolved signals)".to_string());

    bot.send_message(
        msg.chat.id,
        format!(
            "🎯 <b>Signal statistics</b>\n\n\
            Total: <code>{}</code>\n\
            Open: <code>{}</code>\n\
            Hit target: <code>{}</code>\n\
            Hit stop: <code>{}</code>\n\
            Win rate: <code>{}</code>",
            stats.total, stats.open, stats.hit_target, stats.hit_stop, win_rate
        ),
    )
    .parse_mode(teloxide::types::ParseMode::Html)
    .await?;
    Ok(())
}

pub async fn handle_bestpairs(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(_admin_id) = admin_sender(&state, &msg) else {
        return Ok(());
    };

    let mut markets = match state.market.get_top_markets(50).await {
        Ok(markets) => markets,
        Err(err) => {
            warn!("/bestpairs market fetch failed: {}", err);
            bot.send_message(msg.chat.id, TRY_AGAIN).await?;
            return Ok(());
        }
    };
    markets.sort_by(|a, b| {
        let a_change = a.price_change_percentage_24h.unwrap_or(0.0);
        let b_change = b.price_change_percentage_24h.unwrap_or(0.0);
        b_change.partial_cmp(&a_change).unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut text = String::from("🏆 <b>Top movers (24h)</b>\n\n📈 Gainers:\n");
    for market in markets.iter().take(5) {
        text.push_str(&format!(
            "  <b>{}</b> {:+.2}% — <code>{:.4}</code> USD\n",
            market.name,
            market.price_change_percentage_24h.unwrap_or(0.0),
            market.current_price
        ));
    }
    text.push_str("\n📉 Losers:\n");
    for market in markets.iter().rev().take(5) {
        text.push_str(&format!(
            "  <b>{}</b> {:+.2}% — <code>{:.4}</code> USD\n",
            market.name,
            market.price_change_percentage_24h.unwrap_or(0.0),
            market.current_price
        ));
    }

    bot.send_message(msg.chat.id, text)
        .parse_mode(teloxide::types::ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn handle_revenuereport(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(_admin_id) = admin_sender(&state, &msg) else {
        return Ok(());
    };

    let completed = payments::Entity::find()
        .filter(payments::Column::Status.eq(PaymentStatus::Completed.as_str()))
        .all(state.db.as_ref())
        .await?;
    let (total, count, by_plan) = summarize_revenue(&completed);

    let mut text = format!(
        "💵 <b>Revenue report</b>\n\nTotal: <code>{:.2}</code> USDT over <code>{}</code> payments\n",
        total, count
    );
    let mut plans: Vec<_> = by_plan.into_iter().collect();
    plans.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    for (plan, amount) in plans {
        text.push_str(&format!("  {}: <code>{:.2}</code> USDT\n", plan, amount));
    }

    bot.send_message(msg.chat.id, text)
        .parse_mode(teloxide::types::ParseMode::Html)
        .await?;
    Ok(())
}

fn parse_addsignal(args: &str) -> Option<(String, SignalDirection, f64, f64, f64, bool)> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    if parts.len() < 5 || parts.len() > 6 {
        return None;
    }
    let pair = parts[0].to_string();
    let direction = SignalDirection::parse(parts[1])?;
    let entry = parts[2].parse().ok().filter(|v: &f64| *v > 0.0)?;
    let target = parts[3].parse().ok().filter(|v: &f64| *v > 0.0)?;
    let stop = parts[4].parse().ok().filter(|v: &f64| *v > 0.0)?;
    let is_vip = match parts.get(5) {
        None => false,
        Some(&"vip") => true,
        Some(_) => return None,
    };
    Some((pair, direction, entry, target, stop, is_vip))
}

fn summarize_revenue(rows: &[payments::Model]) -> (f64, usize, HashMap<String, f64>) {
    let mut total = 0.0;
    let mut by_plan: HashMap<String, f64> = HashMap::new();
    for payment in rows {
        total += payment.amount;
        let plan = payment.plan.clone().unwrap_or_else(|| "other".to_string());
        *by_plan.entry(plan).or_insert(0.0) += payment.amount;
    }
    (total, rows.len(), by_plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_addsignal_arguments() {
        let (pair, direction, entry, target, stop, vip) =
            parse_addsignal("btc long 100 110 90 vip").unwrap();
        assert_eq!(pair, "btc");
        assert_eq!(direction, SignalDirection::Long);
        assert_eq!((entry, target, stop), (100.0, 110.0, 90.0));
        assert!(vip);

        let (_, direction, .., vip) = parse_addsignal("eth short 2000 1800 2100").unwrap();
        assert_eq!(direction, SignalDirection::Short);
        assert!(!vip);
    }

    #[test]
    fn rejects_malformed_addsignal_arguments() {
        assert!(parse_addsignal("").is_none());
        assert!(parse_addsignal("btc long 100 110").is_none());
        assert!(parse_addsignal("btc sideways 100 110 90").is_none());
        assert!(parse_addsignal("btc long abc 110 90").is_none());
        assert!(parse_addsignal("btc long -1 110 90").is_none());
        assert!(parse_addsignal("btc long 100 110 90 premium").is_none());
    }

    fn payment(amount: f64, plan: Option<&str>) -> payments::Model {
        payments::Model {
            id: 1,
            user_id: 1,
            amount,
            currency: "USDT".to_string(),
            status: "completed".to_string(),
            payment_id: None,
            plan: plan.map(|p| p.to_string()),
            created_at: None,
        }
    }

    #[test]
    fn revenue_sums_by_plan() {
        let rows = vec![
            payment(29.99, Some("monthly")),
            payment(29.99, Some("monthly")),
            payment(249.99, Some("yearly")),
            payment(10.0, None),
        ];
        let (total, count, by_plan) = summarize_revenue(&rows);
        assert!((total - 319.97).abs() < 1e-9);
        assert_eq!(count, 4);
        assert!((by_plan["monthly"] - 59.98).abs() < 1e-9);
        assert!((by_plan["yearly"] - 249.99).abs() < 1e-9);
        assert!((by_plan["other"] - 10.0).abs() < 1e-9);
    }
}
