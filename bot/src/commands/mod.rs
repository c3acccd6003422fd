use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveValue::Set, EntityTrait};
use shared::entity::users;
use shared::models::UserTier;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::state::AppState;

pub mod admin;
pub mod alerts;
pub mod portfolio;
pub mod price;
pub mod signals;
pub mod start;
pub mod stream;
pub mod subscribe;

pub use admin::{
    handle_addsignal, handle_banuser, handle_bestpairs, handle_broadcast, handle_dashboard,
    handle_delsignal, handle_revenuereport, handle_signalstats, handle_stats, handle_unbanuser,
    handle_userinfo, handle_vipgrant,
};
pub use alerts::{handle_myalerts, handle_removealert, handle_setalert};
pub use portfolio::{handle_addposition, handle_myportfolio, handle_removeposition};
pub use price::{handle_history, handle_price};
pub use signals::{handle_signals, handle_vipsignals};
pub use start::{handle_help, handle_start};
pub use stream::{handle_livestream, handle_stopstream};
pub use subscribe::{handle_mysub, handle_subscribe};

/// 🤖 <b>Crypto Signal Bot</b> 📈 available commands
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    /// 🚀 Register and show the welcome message
    Start,
    /// 📖 List all commands
    Help,
    /// 💰 Spot price, e.g. /price btc
    Price(String),
    /// 📈 Market history, e.g. /history bitcoin 7
    History(String),
    /// 📊 Free signal board
    Signals,
    /// 💎 VIP signals
    VipSignals,
    /// ⭐ Buy or renew a VIP subscription
    Subscribe,
    /// 📅 Your subscription status
    MySub,
    /// 🔴 Live price stream, e.g. /livestream btcusdt
    Livestream(String),
    /// ⏹ Stop your live stream
    StopStream,
    /// ➕ Track a position: /addposition btc 0.5 42000
    AddPosition(String),
    /// 💼 Your portfolio
    MyPortfolio,
    /// ➖ Drop a position: /removeposition 3
    RemovePosition(String),
    /// 🔔 Price alert: /setalert btc 50000 above
    SetAlert(String),
    /// 🗒 Your alerts
    MyAlerts,
    /// ❌ Remove an alert: /removealert 3
    RemoveAlert(String),
    /// Publish a signal (admin)
    AddSignal(String),
    /// Delete a signal (admin)
    DelSignal(String),
    /// Bot statistics (admin)
    Stats,
    /// Message every user (admin)
    Broadcast(String),
    /// Inspect a user (admin)
    UserInfo(String),
    /// Overview dashboard (admin)
    Dashboard,
    /// Ban a user (admin)
    BanUser(String),
    /// Lift a ban (admin)
    UnbanUser(String),
    /// Grant VIP days (admin)
    VipGrant(String),
    /// Win/loss statistics (admin)
    SignalStats,
    /// Top market movers (admin)
    BestPairs,
    /// Revenue summary (admin)
    RevenueReport,
}

/// Generic reply for transient gateway trouble.
pub(crate) const TRY_AGAIN: &str = "⚠️ That did not work right now, please try again in a moment.";

/// Looks the sender up, creating the row on first contact. Returns `None`
/// for banned users (and for channel posts with no sender): the handler
/// backs out without replying.
pub(crate) async fn acting_user(
    state: &AppState,
    from: &teloxide::types::User,
) -> Result<Option<users::Model>> {
    let telegram_id = from.id.0 as i64;
    let existing = users::Entity::find_by_id(telegram_id)
        .one(state.db.as_ref())
        .await?;

    let user = match existing {
        Some(user) => user,
        None => {
            let new_user = users::ActiveModel {
                telegram_id: Set(telegram_id),
                username: Set(from.username.clone()),
                tier: Set(UserTier::Free.as_str().to_string()),
                is_banned: Set(false),
                created_at: Set(Some(Utc::now())),
            };
            users::Entity::insert(new_user)
                .exec_with_returning(state.db.as_ref())
                .await?
        }
    };

    if user.is_banned {
        return Ok(None);
    }
    Ok(Some(user))
}

pub async fn handle_invalid(bot: Bot, msg: Message) -> Result<()> {
    // Only slash-likes get a reply; ordinary chatter is ignored.
    if msg.text().map(|t| t.starts_with('/')).unwrap_or(false) {
        bot.send_message(
            msg.chat.id,
            "🤔 I don't know that command. Use /help to see what I can do.",
        )
        .await?;
    }
    Ok(())
}

/// Routes callback queries by their data prefix.
pub async fn handle_callback(bot: Bot, q: CallbackQuery, state: Arc<AppState>) -> Result<()> {
    let Some(data) = q.data.clone() else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    if data.starts_with("plan:") || data.starts_with("pay:") || data == "sub_cancel" {
        subscribe::handle_subscribe_callback(bot, q, state).await
    } else if data.starts_with("vipsig:") {
        signals::handle_vipsignals_callback(bot, q, state).await
    } else {
        bot.answer_callback_query(q.id).await?;
        Ok(())
    }
}
