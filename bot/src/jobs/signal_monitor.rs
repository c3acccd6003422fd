//! Signal outcome resolution: poll open signals against live prices and
//! write the one-way open -> hit-target/hit-stop transition.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use shared::entity::signals;
use shared::market::MarketClient;
use shared::models::{SignalDirection, SignalOutcome};
use teloxide::prelude::*;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::services::signal_service::{mark_outcome, resolve_outcome};
use crate::state::AppState;

const CYCLE_INTERVAL: Duration = Duration::from_secs(120);

pub fn spawn(state: Arc<AppState>, bot: Bot) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(CYCLE_INTERVAL);
        ticker.tick().await; // the first tick fires immediately, skip it
        loop {
            ticker.tick().await;
            match run_cycle(state.db.as_ref(), &state.market).await {
                Ok(resolved) => announce(&bot, &state, &resolved).await,
                Err(err) => error!("signal resolution cycle failed: {:#}", err),
            }
        }
    })
}

/// One pass over all open signals. Terminal signals are excluded by the read
/// filter, so they are never re-queried once resolved.
pub async fn run_cycle<C: ConnectionTrait>(
    db: &C,
    market: &MarketClient,
) -> Result<Vec<(signals::Model, SignalOutcome)>> {
    let open = signals::Entity::find()
        .filter(signals::Column::HitTarget.eq(SignalOutcome::Open.to_column()))
        .all(db)
        .await?;
    if open.is_empty() {
        return Ok(Vec::new());
    }

    let mut pairs: Vec<String> = open.iter().map(|s| s.pair.clone()).collect();
    pairs.sort();
    pairs.dedup();
    let prices = market.get_prices(&pairs).await?;

    apply_prices(db, &open, &prices).await
}

/// Resolves the given open signals against an already-fetched price map.
/// Signals whose pair is missing from the map are a transient data gap and
/// stay untouched for the next cycle. Exactly one write per newly-resolved
/// signal.
pub async fn apply_prices<C: ConnectionTrait>(
    db: &C,
    open: &[signals::Model],
    prices: &HashMap<String, f64>,
) -> Result<Vec<(signals::Model, SignalOutcome)>> {
    let mut resolved = Vec::new();
    for signal in open {
        let Some(direction) = SignalDirection::parse(&signal.direction) else {
            warn!("signal {} has unknown direction {:?}", signal.id, signal.direction);
            continue;
        };
        let Some(&price) = prices.get(&signal.pair) else {
            continue;
        };

        let outcome = resolve_outcome(direction, signal.target_price, signal.stop_loss, price);
        if !outcome.is_terminal() {
            continue;
        }
        if mark_outcome(db, signal.id, outcome).await? {
            info!("signal {} ({}) resolved: {:?}", signal.id, signal.pair, outcome);
            resolved.push((signal.clone(), outcome));
        }
    }
    Ok(resolved)
}

async fn announce(bot: &Bot, state: &AppState, resolved: &[(signals::Model, SignalOutcome)]) {
    let Some(channel_id) = state.config.vip_channel_id else {
        return;
    };
    for (signal, outcome) in resolved {
        if let Err(err) = bot
            .send_message(ChatId(channel_id), format_resolution(signal, *outcome))
            .parse_mode(teloxide::types::ParseMode::Html)
            .await
        {
            warn!("failed to announce resolution of signal {}: {}", signal.id, err);
        }
    }
}

pub fn format_resolution(signal: &signals::Model, outcome: SignalOutcome) -> String {
    let (headline, level) = match outcome {
        SignalOutcome::HitTarget => ("✅ <b>Target hit</b>", signal.target_price),
        SignalOutcome::HitStop => ("🛑 <b>Stop hit</b>", signal.stop_loss),
        SignalOutcome::Open => ("📊 <b>Signal update</b>", signal.entry_price),
    };
    format!(
        "{}\n\n<b>{}</b> {} — entry <code>{:.4}</code>, closed at <code>{:.4}</code>.",
        headline,
        signal.pair.to_uppercase(),
        signal.direction,
        signal.entry_price,
        level
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn signal(id: i64, pair: &str, direction: &str, target: f64, stop: f64) -> signals::Model {
        signals::Model {
            id,
            pair: pair.to_string(),
            direction: direction.to_string(),
            entry_price: (target + stop) / 2.0,
            target_price: target,
            stop_loss: stop,
            is_vip: false,
            hit_target: SignalOutcome::Open.to_column(),
            created_at: None,
        }
    }

    fn update_rows(n: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: n,
        }
    }

    #[tokio::test]
    async fn long_signal_resolves_to_target_above_threshold() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([update_rows(1)])
            .into_connection();
        let open = vec![signal(1, "bitcoin", "long", 110.0, 90.0)];
        let prices = HashMap::from([("bitcoin".to_string(), 111.0)]);

        let resolved = apply_prices(&db, &open, &prices).await.unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].1, SignalOutcome::HitTarget);
    }

    #[tokio::test]
    async fn long_signal_resolves_to_stop_below_threshold() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([update_rows(1)])
            .into_connection();
        let open = vec![signal(1, "bitcoin", "long", 110.0, 90.0)];
        let prices = HashMap::from([("bitcoin".to_string(), 89.0)]);

        let resolved = apply_prices(&db, &open, &prices).await.unwrap();
        assert_eq!(resolved[0].1, SignalOutcome::HitStop);
    }

    #[tokio::test]
    async fn price_between_levels_leaves_the_signal_open() {
        // No exec results queued: a write here would error the test.
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let open = vec![signal(1, "bitcoin", "long", 110.0, 90.0)];
        let prices = HashMap::from([("bitcoin".to_string(), 105.0)]);

        let resolved = apply_prices(&db, &open, &prices).await.unwrap();
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn short_signal_resolution() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([update_rows(1), update_rows(1)])
            .into_connection();
        let open = vec![
            signal(1, "ethereum", "short", 90.0, 110.0),
            signal(2, "solana", "short", 90.0, 110.0),
        ];
        let prices = HashMap::from([
            ("ethereum".to_string(), 89.0),
            ("solana".to_string(), 111.0),
        ]);

        let resolved = apply_prices(&db, &open, &prices).await.unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].1, SignalOutcome::HitTarget);
        assert_eq!(resolved[1].1, SignalOutcome::HitStop);
    }

    #[tokio::test]
    async fn missing_pair_is_left_for_the_next_cycle() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let open = vec![signal(1, "delisted-coin", "long", 110.0, 90.0)];
        let prices = HashMap::new();

        let resolved = apply_prices(&db, &open, &prices).await.unwrap();
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn concurrent_resolution_is_not_double_reported() {
        // The guarded update affected zero rows (someone else already resolved
        // the signal), so the cycle must not report it again.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([update_rows(0)])
            .into_connection();
        let open = vec![signal(1, "bitcoin", "long", 110.0, 90.0)];
        let prices = HashMap::from([("bitcoin".to_string(), 120.0)]);

        let resolved = apply_prices(&db, &open, &prices).await.unwrap();
        assert!(resolved.is_empty());
    }
}
