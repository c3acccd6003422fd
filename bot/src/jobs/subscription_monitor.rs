//! Subscription expiry: tell users once when their term has lapsed and drop
//! their tier back to free.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use shared::entity::{subscriptions, users};
use shared::models::UserTier;
use teloxide::prelude::*;
use tokio::time::interval;
use tracing::{error, warn};

use super::{Notifier, TelegramNotifier};
use crate::state::AppState;

const CYCLE_INTERVAL: Duration = Duration::from_secs(600);

const EXPIRY_NOTICE: &str = "⌛ <b>Your VIP subscription has expired.</b>\n\n\
    Use /subscribe to renew and keep receiving VIP signals.";

pub fn spawn(state: Arc<AppState>, bot: Bot) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let notifier = TelegramNotifier::new(bot);
        let mut ticker = interval(CYCLE_INTERVAL);
        ticker.tick().await; // the first tick fires immediately, skip it
        loop {
            ticker.tick().await;
            if let Err(err) = run_cycle(state.db.as_ref(), &notifier).await {
                error!("subscription expiry cycle failed: {:#}", err);
            }
        }
    })
}

/// Finds lapsed, un-notified subscriptions. The notice goes out first; only
/// then is the row marked notified and the tier downgraded, so a failed
/// delivery is retried on the next cycle.
pub async fn run_cycle<C: ConnectionTrait>(db: &C, notifier: &dyn Notifier) -> Result<u32> {
    let lapsed = subscriptions::Entity::find()
        .filter(subscriptions::Column::EndDate.lt(Utc::now()))
        .filter(subscriptions::Column::Notified.eq(false))
        .all(db)
        .await?;

    let mut handled = 0;
    for subscription in lapsed {
        if let Err(err) = notifier.notify(subscription.user_id, EXPIRY_NOTICE).await {
            warn!(
                "expiry notice to user {} failed, will retry: {}",
                subscription.user_id, err
            );
            continue;
        }

        subscriptions::Entity::update_many()
            .col_expr(subscriptions::Column::Notified, Expr::value(true))
            .filter(subscriptions::Column::UserId.eq(subscription.user_id))
            .exec(db)
            .await?;
        users::Entity::update_many()
            .col_expr(users::Column::Tier, Expr::value(UserTier::Free.as_str()))
            .filter(users::Column::TelegramId.eq(subscription.user_id))
            .exec(db)
            .await?;
        handled += 1;
    }
    Ok(handled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use tokio::sync::Mutex;

    struct RecordingNotifier {
        sent: Mutex<Vec<i64>>,
    }

    #[async_trait::async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, user_id: i64, _text: &str) -> Result<()> {
            self.sent.lock().await.push(user_id);
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait::async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _user_id: i64, _text: &str) -> Result<()> {
            anyhow::bail!("telegram unavailable")
        }
    }

    fn lapsed_sub(user_id: i64) -> subscriptions::Model {
        subscriptions::Model {
            user_id,
            tier: "vip".to_string(),
            start_date: Utc::now() - ChronoDuration::days(40),
            end_date: Utc::now() - ChronoDuration::days(10),
            payment_id: None,
            notified: false,
        }
    }

    fn exec_ok() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    #[tokio::test]
    async fn notifies_once_and_downgrades() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![lapsed_sub(7)]])
            .append_exec_results([exec_ok(), exec_ok()])
            .into_connection();
        let notifier = RecordingNotifier {
            sent: Mutex::new(Vec::new()),
        };

        let handled = run_cycle(&db, &notifier).await.unwrap();
        assert_eq!(handled, 1);
        assert_eq!(*notifier.sent.lock().await, vec![7]);
    }

    #[tokio::test]
    async fn failed_notice_leaves_the_row_for_retry() {
        // No exec results queued: any write after the failed notice would
        // error the test.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![lapsed_sub(7)]])
            .into_connection();

        let handled = run_cycle(&db, &FailingNotifier).await.unwrap();
        assert_eq!(handled, 0);
    }

    #[tokio::test]
    async fn nothing_lapsed_means_nothing_to_do() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<subscriptions::Model>::new()])
            .into_connection();
        let notifier = RecordingNotifier {
            sent: Mutex::new(Vec::new()),
        };

        let handled = run_cycle(&db, &notifier).await.unwrap();
        assert_eq!(handled, 0);
        assert!(notifier.sent.lock().await.is_empty());
    }
}
