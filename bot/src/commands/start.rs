use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::info;

use super::acting_user;
use crate::state::AppState;

const DISCLAIMER: &str = "⚠️ <b>Disclaimer</b>\n\
    The signals and analysis provided are for informational purposes only and \
    should not be considered as financial advice. Cryptocurrency trading \
    involves substantial risk of loss and is not suitable for every investor.\n\n\
    🔄 <b>Refund Policy</b>\n\
    All subscriptions are final - no refunds will be issued under any circumstances.";

pub async fn handle_start(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(user) = acting_user(&state, from).await? else {
        return Ok(());
    };
    info!("Processing /start for user {}", user.telegram_id);

    let name = from.first_name.clone();
    let welcome = format!(
        "👋 Welcome, <b>{}</b>!\n\n\
        I track crypto prices, publish trade signals and watch your alerts.\n\n\
        📊 /signals — free signal board\n\
        💎 /vipsignals — VIP signals (subscribers)\n\
        💰 /price — current prices\n\
        🔔 /setalert — price alerts\n\
        💼 /myportfolio — track positions\n\
        ⭐ /subscribe — go VIP\n\n\
        Use /help for the full command list.\n\n{}",
        name, DISCLAIMER
    );

    bot.send_message(msg.chat.id, welcome)
        .parse_mode(teloxide::types::ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn handle_help(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(user) = acting_user(&state, from).await? else {
        return Ok(());
    };

    let mut help_text = String::from(
        "📖 <b>Commands</b>\n\n\
        /start - register and show the welcome message\n\
        /price &lt;symbol&gt; - current price, e.g. /price btc\n\
        /history &lt;symbol&gt; &lt;days&gt; - recent market history\n\
        /signals - free signal board\n\
        /vipsignals - VIP signals\n\
        /subscribe - buy or renew VIP\n\
        /mysub - your subscription status\n\
        /livestream &lt;pair&gt; - live price stream\n\
        /stopstream - stop your stream\n\
        /addposition &lt;symbol&gt; &lt;amount&gt; &lt;entry&gt; - track a position\n\
        /myportfolio - your positions\n\
        /removeposition &lt;id&gt; - drop a position\n\
        /setalert &lt;symbol&gt; &lt;price&gt; &lt;above|below&gt; - price alert\n\
        /myalerts - your alerts\n\
        /removealert &lt;id&gt; - remove an alert\n",
    );

    if state.is_admin(user.telegram_id) {
        help_text.push_str(
            "\n🛠 <b>Admin</b>\n\n\
            /addsignal &lt;pair&gt; &lt;long|short&gt; &lt;entry&gt; &lt;target&gt; &lt;stop&gt; [vip]\n\
            /delsignal &lt;id&gt;\n\
            /stats - user and signal counts\n\
            /broadcast &lt;text&gt; - message every user\n\
            /userinfo &lt;id&gt;\n\
            /dashboard - overview\n\
            /banuser &lt;id&gt; | /unbanuser &lt;id&gt;\n\
            /vipgrant &lt;id&gt; &lt;days&gt;\n\
            /signalstats - win/loss\n\
            /bestpairs - top movers\n\
            /revenuereport - payments summary\n",
        );
    }

    help_text.push_str("\n");
    help_text.push_str(DISCLAIMER);

    bot.send_message(msg.chat.id, help_text)
        .parse_mode(teloxide::types::ParseMode::Html)
        .await?;
    Ok(())
}
