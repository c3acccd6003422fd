//! Alert reconciliation: diff live prices against stored alert thresholds,
//! notify, delete fired rows.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sea_orm::{ConnectionTrait, EntityTrait};
use shared::entity::alerts;
use shared::market::MarketClient;
use shared::models::AlertDirection;
use teloxide::prelude::*;
use tokio::time::interval;
use tracing::{error, warn};

use super::{Notifier, TelegramNotifier};
use crate::services::alert_service::alert_triggered;
use crate::state::AppState;

const CYCLE_INTERVAL: Duration = Duration::from_secs(60);

pub fn spawn(state: Arc<AppState>, bot: Bot) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let notifier = TelegramNotifier::new(bot);
        let mut ticker = interval(CYCLE_INTERVAL);
        ticker.tick().await; // the first tick fires immediately, skip it
        loop {
            ticker.tick().await;
            if let Err(err) = run_cycle(state.db.as_ref(), &state.market, &notifier).await {
                error!("alert reconciliation cycle failed: {:#}", err);
            }
        }
    })
}

/// One stateless pass: read every alert, fetch prices for the distinct
/// symbol set in one batch, fire what crossed. Returns how many alerts fired.
pub async fn run_cycle<C: ConnectionTrait>(
    db: &C,
    market: &MarketClient,
    notifier: &dyn Notifier,
) -> Result<u32> {
    let alerts = alerts::Entity::find().all(db).await?;
    if alerts.is_empty() {
        return Ok(0);
    }

    let mut symbols: Vec<String> = alerts.iter().map(|a| a.symbol.clone()).collect();
    symbols.sort();
    symbols.dedup();
    let prices = market.get_prices(&symbols).await?;

    apply_prices(db, &alerts, &prices, notifier).await
}

/// Evaluates alerts against an already-fetched price map. An alert whose
/// symbol is absent from the map is skipped for this cycle. The row is only
/// deleted after its notification went out: a failed delivery leaves the
/// alert in place for the next cycle.
pub async fn apply_prices<C: ConnectionTrait>(
    db: &C,
    alerts: &[alerts::Model],
    prices: &HashMap<String, f64>,
    notifier: &dyn Notifier,
) -> Result<u32> {
    let mut fired = 0;
    for alert in alerts {
        let Some(direction) = AlertDirection::parse(&alert.direction) else {
            warn!("alert {} has unknown direction {:?}", alert.id, alert.direction);
            continue;
        };
        let Some(&price) = prices.get(&alert.symbol) else {
            continue;
        };
        if !alert_triggered(direction, alert.target_price, price) {
            continue;
        }

        let text = format_trigger(alert, price);
        if let Err(err) = notifier.notify(alert.user_id, &text).await {
            warn!(
                "alert {} notification to user {} failed, keeping row: {}",
                alert.id, alert.user_id, err
            );
            continue;
        }
        alerts::Entity::delete_by_id(alert.id).exec(db).await?;
        fired += 1;
    }
    Ok(fired)
}

fn format_trigger(alert: &alerts::Model, price: f64) -> String {
    let crossed = match AlertDirection::parse(&alert.direction) {
        Some(AlertDirection::Above) => "rose above",
        _ => "fell below",
    };
    format!(
        "🔔 <b>Price Alert</b>\n\n<b>{}</b> is now <code>{:.4}</code> USD — it {} your target of <code>{:.4}</code>.",
        alert.symbol, price, crossed, alert.target_price
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use tokio::sync::Mutex;

    struct RecordingNotifier {
        sent: Mutex<Vec<(i64, String)>>,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, user_id: i64, text: &str) -> Result<()> {
            self.sent.lock().await.push((user_id, text.to_string()));
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

    fn alert(id: i64, symbol: &str, target: f64, direction: &str) -> alerts::Model {
        alerts::Model {
            id,
            user_id: 100 + id,
            symbol: symbol.to_string(),
            target_price: target,
            direction: direction.to_string(),
            created_at: None,
        }
    }

    fn delete_ok() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    #[tokio::test]
    async fn exact_target_price_does_not_fire() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let notifier = RecordingNotifier::new();
        let alerts = vec![alert(1, "bitcoin", 50_000.0, "above")];
        let prices = HashMap::from([("bitcoin".to_string(), 50_000.0)]);

        let fired = apply_prices(&db, &alerts, &prices, &notifier).await.unwrap();
        assert_eq!(fired, 0);
        assert!(notifier.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn crossing_fires_and_deletes_after_delivery() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([delete_ok()])
            .into_connection();
        let notifier = RecordingNotifier::new();
        let alerts = vec![alert(1, "bitcoin", 50_000.0, "above")];
        let prices = HashMap::from([("bitcoin".to_string(), 50_000.01)]);

        let fired = apply_prices(&db, &alerts, &prices, &notifier).await.unwrap();
        assert_eq!(fired, 1);

        let sent = notifier.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 101);
        assert!(sent[0].1.contains("bitcoin"));
    }

    #[tokio::test]
    async fn failed_delivery_keeps_the_row() {
        // No exec results queued: a delete attempt would error the test.
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let alerts = vec![alert(1, "bitcoin", 50_000.0, "above")];
        let prices = HashMap::from([("bitcoin".to_string(), 60_000.0)]);

        let fired = apply_prices(&db, &alerts, &prices, &FailingNotifier)
            .await
            .unwrap();
        assert_eq!(fired, 0);
    }

    #[tokio::test]
    async fn missing_symbol_skips_only_that_alert() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([delete_ok()])
            .into_connection();
        let notifier = RecordingNotifier::new();
        let alerts = vec![
            alert(1, "ethereum", 1_000.0, "below"),
            alert(2, "unlisted-coin", 1.0, "above"),
        ];
        // The batch came back without the second symbol.
        let prices = HashMap::from([("ethereum".to_string(), 900.0)]);

        let fired = apply_prices(&db, &alerts, &prices, &notifier).await.unwrap();
        assert_eq!(fired, 1);
        assert_eq!(notifier.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn below_alert_fires_on_strict_cross() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([delete_ok()])
            .into_connection();
        let notifier = RecordingNotifier::new();
        let alerts = vec![alert(3, "solana", 100.0, "below")];
        let prices = HashMap::from([("solana".to_string(), 99.99)]);

        let fired = apply_prices(&db, &alerts, &prices, &notifier).await.unwrap();
        assert_eq!(fired, 1);
    }
}
