//! Periodic background jobs. Each job is an interval loop that logs a failed
//! cycle and carries on with the next tick; nothing a cycle does can take the
//! process down.

pub mod alert_monitor;
pub mod signal_monitor;
pub mod subscription_monitor;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;

use crate::state::AppState;

/// Delivery seam for job notifications, so cycles can be exercised in tests
/// without a live bot.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: i64, text: &str) -> Result<()>;
}

pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, user_id: i64, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(user_id), text)
            .parse_mode(teloxide::types::ParseMode::Html)
            .await?;
        Ok(())
    }
}

pub fn spawn_all(state: Arc<AppState>, bot: Bot) {
    let _ = signal_monitor::spawn(state.clone(), bot.clone());
    let _ = alert_monitor::spawn(state.clone(), bot.clone());
    let _ = subscription_monitor::spawn(state, bot);
    tracing::info!("Background jobs started");
}
