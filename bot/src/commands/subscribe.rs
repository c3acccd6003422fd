use anyhow::Result;
use shared::models::SubscriptionPlan;
use shared::InvoiceStatus;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::{error, info, warn};

use super::acting_user;
use crate::state::AppState;

pub async fn handle_subscribe(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(_user) = acting_user(&state, from).await? else {
        return Ok(());
    };

    let mut rows: Vec<Vec<InlineKeyboardButton>> = SubscriptionPlan::all()
        .iter()
        .map(|plan| {
            vec![InlineKeyboardButton::callback(
                format!("⭐ {} — {:.2} USDT", plan.label(), plan.price_usdt()),
                format!("plan:{}", plan.as_str()),
            )]
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback("Cancel", "sub_cancel")]);

    bot.send_message(
        msg.chat.id,
        "💎 <b>VIP Subscription</b>\n\n\
        VIP members receive curated signals with entries, targets and stops, \
        plus resolution notices when a signal plays out.\n\n\
        Pick a plan — payment is in USDT via @CryptoBot:",
    )
    .parse_mode(teloxide::types::ParseMode::Html)
    .reply_markup(InlineKeyboardMarkup::new(rows))
    .await?;
    Ok(())
}

pub async fn handle_mysub(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(user) = acting_user(&state, from).await? else {
        return Ok(());
    };

    match state.subscriptions.active_subscription(user.telegram_id).await? {
        Some(subscription) => {
            let ends = subscription
                .end_date
                .with_timezone(&state.config.timezone)
                .format("%Y-%m-%d %H:%M %Z");
            bot.send_message(
                msg.chat.id,
                format!(
                    "📅 <b>Your subscription</b>\n\nTier: <b>{}</b>\nActive until: <code>{}</code>",
                    subscription.tier.to_uppercase(),
                    ends
                ),
            )
            .parse_mode(teloxide::types::ParseMode::Html)
            .await?;
        }
        None => {
            bot.send_message(
                msg.chat.id,
                "You have no active subscription. Use /subscribe to go VIP.",
            )
            .await?;
        }
    }
    Ok(())
}

pub async fn handle_subscribe_callback(bot: Bot, q: CallbackQuery, state: Arc<AppState>) -> Result<()> {
    let Some(data) = q.data.clone() else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };
    let Some(_user) = acting_user(&state, &q.from).await? else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };
    let user_id = q.from.id.0 as i64;

    match data.as_str() {
        "sub_cancel" => {
            bot.answer_callback_query(q.id).await?;
            if let Some(message) = q.message {
                bot.edit_message_text(message.chat().id, message.id(), "Subscription cancelled.")
                    .await?;
            }
        }
        plan_data if plan_data.starts_with("plan:") => {
            let Some(plan) = SubscriptionPlan::parse(&plan_data["plan:".len()..]) else {
                bot.answer_callback_query(q.id).await?;
                return Ok(());
            };
            handle_plan_chosen(bot, q, state, user_id, plan).await?;
        }
        pay_data if pay_data.starts_with("pay:") => {
            let Some((invoice_id, plan)) = parse_pay_callback(pay_data) else {
                bot.answer_callback_query(q.id).await?;
                return Ok(());
            };
            handle_payment_check(bot, q, state, user_id, invoice_id, plan).await?;
        }
        _ => {
            bot.answer_callback_query(q.id).await?;
        }
    }
    Ok(())
}

async fn handle_plan_chosen(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
    user_id: i64,
    plan: SubscriptionPlan,
) -> Result<()> {
    let description = format!("VIP Subscription ({})", plan.label());
    let invoice = match state
        .crypto_pay
        .create_invoice(plan.price_usdt(), "USDT", &description)
        .await
    {
        Ok(invoice) => invoice,
        Err(err) => {
            warn!("invoice creation for user {} failed: {}", user_id, err);
            bot.answer_callback_query(q.id)
                .text("Payment provider is unavailable right now — please try again later.")
                .show_alert(true)
                .await?;
            return Ok(());
        }
    };
    info!(
        "Created invoice {} for user {} ({})",
        invoice.invoice_id,
        user_id,
        plan.as_str()
    );

    let pay_url = invoice.pay_url.unwrap_or_default();
    let body = format!(
        "🧾 <b>Invoice created</b>\n\n\
        Plan: <b>{}</b>\nAmount: <code>{:.2}</code> USDT\n\n\
        1. Pay here: {}\n\
        2. Then press the button below.\n\n\
        The invoice expires in one hour.",
        plan.label(),
        plan.price_usdt(),
        pay_url
    );
    let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "✅ I've paid",
        format!("pay:{}:{}", invoice.invoice_id, plan.as_str()),
    )]]);

    bot.answer_callback_query(q.id).await?;
    if let Some(message) = q.message {
        bot.edit_message_text(message.chat().id, message.id(), body)
            .parse_mode(teloxide::types::ParseMode::Html)
            .reply_markup(keyboard)
            .await?;
    }
    Ok(())
}

async fn handle_payment_check(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
    user_id: i64,
    invoice_id: i64,
    plan: SubscriptionPlan,
) -> Result<()> {
    let invoice = match state.crypto_pay.get_invoice(invoice_id).await {
        Ok(invoice) => invoice,
        Err(err) => {
            // Unknown, not unpaid: the user can simply press the button again.
            warn!("invoice {} status check failed: {}", invoice_id, err);
            bot.answer_callback_query(q.id)
                .text("Could not check the payment right now — please try again in a moment.")
                .show_alert(true)
                .await?;
            return Ok(());
        }
    };

    let Some(invoice) = invoice else {
        bot.answer_callback_query(q.id)
            .text("That invoice no longer exists. Use /subscribe to create a new one.")
            .show_alert(true)
            .await?;
        return Ok(());
    };

    match invoice.status {
        InvoiceStatus::Paid => {
            let confirmed = state
                .subscriptions
                .confirm_payment(
                    user_id,
                    plan,
                    plan.price_usdt(),
                    &invoice_id.to_string(),
                    plan.duration(),
                )
                .await;
            match confirmed {
                Ok(subscription) => {
                    info!("user {} subscribed via invoice {}", user_id, invoice_id);
                    let ends = subscription
                        .end_date
                        .with_timezone(&state.config.timezone)
                        .format("%Y-%m-%d %H:%M %Z");
                    bot.answer_callback_query(q.id).text("Welcome to VIP! 🎉").await?;
                    if let Some(message) = q.message {
                        bot.edit_message_text(
                            message.chat().id,
                            message.id(),
                            format!(
                                "🎉 <b>You're VIP now!</b>\n\nActive until <code>{}</code>.\n\nTry /vipsignals.",
                                ends
                            ),
                        )
                        .parse_mode(teloxide::types::ParseMode::Html)
                        .await?;
                    }
                }
                Err(err) => {
                    error!(
                        "confirming paid invoice {} for user {} failed: {:#}",
                        invoice_id, user_id, err
                    );
                    bot.answer_callback_query(q.id)
                        .text("Processing error — nothing was charged twice. Please press the button again.")
                        .show_alert(true)
                        .await?;
                }
            }
        }
        InvoiceStatus::Active => {
            bot.answer_callback_query(q.id)
                .text("Payment not seen yet. Finish paying, then press the button again.")
                .show_alert(true)
                .await?;
        }
        InvoiceStatus::Expired => {
            bot.answer_callback_query(q.id).await?;
            if let Some(message) = q.message {
                bot.edit_message_text(
                    message.chat().id,
                    message.id(),
                    "⌛ This invoice has expired. Use /subscribe to create a new one.",
                )
                .await?;
            }
        }
        InvoiceStatus::Unknown => {
            warn!("invoice {} returned an unrecognized status", invoice_id);
            bot.answer_callback_query(q.id)
                .text("Could not check the payment right now — please try again in a moment.")
                .show_alert(true)
                .await?;
        }
    }
    Ok(())
}

fn parse_pay_callback(data: &str) -> Option<(i64, SubscriptionPlan)> {
    let mut parts = data.strip_prefix("pay:")?.splitn(2, ':');
    let invoice_id = parts.next()?.parse().ok()?;
    let plan = SubscriptionPlan::parse(parts.next()?)?;
    Some((invoice_id, plan))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pay_callbacks() {
        assert_eq!(
            parse_pay_callback("pay:123456:monthly"),
            Some((123456, SubscriptionPlan::Monthly))
        );
        assert_eq!(
            parse_pay_callback("pay:9:yearly"),
            Some((9, SubscriptionPlan::Yearly))
        );
    }

    #[test]
    fn rejects_malformed_pay_callbacks() {
        assert_eq!(parse_pay_callback("pay:abc:monthly"), None);
        assert_eq!(parse_pay_callback("pay:123"), None);
        assert_eq!(parse_pay_callback("pay:123:lifetime"), None);
        assert_eq!(parse_pay_callback("plan:monthly"), None);
    }
}
