//! Signal lifecycle: creation, the open -> hit-target/hit-stop resolution
//! rules, and the free signal board.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use shared::entity::signals;
use shared::market::{normalize_symbol, MarketSnapshot};
use shared::models::{SignalDirection, SignalOutcome};

/// Resolution rule for one signal against the latest price. Target is checked
/// before stop: a bar gapping through both levels resolves to target. That
/// ordering is a policy, kept stable for reproducibility.
pub fn resolve_outcome(
    direction: SignalDirection,
    target: f64,
    stop: f64,
    price: f64,
) -> SignalOutcome {
    match direction {
        SignalDirection::Long => {
            if price >= target {
                SignalOutcome::HitTarget
            } else if price <= stop {
                SignalOutcome::HitStop
            } else {
                SignalOutcome::Open
            }
        }
        SignalDirection::Short => {
            if price <= target {
                SignalOutcome::HitTarget
            } else if price >= stop {
                SignalOutcome::HitStop
            } else {
                SignalOutcome::Open
            }
        }
    }
}

/// Marks a signal resolved. The filter on the open state makes the
/// transition one-way at the store: a signal that already carries a terminal
/// outcome is never rewritten, so the returned flag is false for it.
pub async fn mark_outcome<C: ConnectionTrait>(
    conn: &C,
    signal_id: i64,
    outcome: SignalOutcome,
) -> Result<bool> {
    let result = signals::Entity::update_many()
        .col_expr(signals::Column::HitTarget, Expr::value(outcome.to_column()))
        .filter(signals::Column::Id.eq(signal_id))
        .filter(signals::Column::HitTarget.eq(SignalOutcome::Open.to_column()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Placeholder oscillator inherited from the first version of the bot: a
/// stable hash of the coin and the current hour scaled into 0..100. Not a
/// real RSI; kept so the free board stays deterministic within an hour.
pub fn pseudo_rsi(coin_id: &str, hour: i64) -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    coin_id.hash(&mut hasher);
    hour.hash(&mut hasher);
    (hasher.finish() % 10_001) as f64 / 100.0
}

pub fn setup_for(oscillator: f64) -> Option<SignalDirection> {
    if oscillator < 30.0 {
        Some(SignalDirection::Long)
    } else if oscillator > 70.0 {
        Some(SignalDirection::Short)
    } else {
        None
    }
}

pub struct BoardEntry {
    pub market: MarketSnapshot,
    pub oscillator: f64,
    pub setup: Option<SignalDirection>,
}

pub fn free_signal_board(markets: &[MarketSnapshot], hour: i64) -> Vec<BoardEntry> {
    markets
        .iter()
        .map(|market| {
            let oscillator = pseudo_rsi(&market.id, hour);
            BoardEntry {
                market: market.clone(),
                oscillator,
                setup: setup_for(oscillator),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct SignalStats {
    pub total: u64,
    pub open: u64,
    pub hit_target: u64,
    pub hit_stop: u64,
}

impl SignalStats {
    pub fn win_rate(&self) -> Option<f64> {
        let resolved = self.hit_target + self.hit_stop;
        if resolved == 0 {
            None
        } else {
            Some(self.hit_target as f64 / resolved as f64 * 100.0)
        }
    }
}

pub struct SignalService {
    db: Arc<DatabaseConnection>,
}

impl SignalService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn create_signal(
        &self,
        pair: &str,
        direction: SignalDirection,
        entry_price: f64,
        target_price: f64,
        stop_loss: f64,
        is_vip: bool,
    ) -> Result<signals::Model> {
        let signal = signals::ActiveModel {
            pair: Set(normalize_symbol(pair)),
            direction: Set(direction.as_str().to_string()),
            entry_price: Set(entry_price),
            target_price: Set(target_price),
            stop_loss: Set(stop_loss),
            is_vip: Set(is_vip),
            hit_target: Set(SignalOutcome::Open.to_column()),
            created_at: Set(Some(Utc::now())),
            ..Default::default()
        };
        let saved = signals::Entity::insert(signal)
            .exec_with_returning(self.db.as_ref())
            .await?;
        Ok(saved)
    }

    pub async fn delete_signal(&self, signal_id: i64) -> Result<bool> {
        let result = signals::Entity::delete_by_id(signal_id)
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected == 1)
    }

    pub async fn list_signals(&self, is_vip: bool, limit: u64) -> Result<Vec<signals::Model>> {
        let rows = signals::Entity::find()
            .filter(signals::Column::IsVip.eq(is_vip))
            .order_by_desc(signals::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        Ok(rows)
    }

    pub async fn stats(&self) -> Result<SignalStats> {
        let db = self.db.as_ref();
        let total = signals::Entity::find().count(db).await?;
        let open = signals::Entity::find()
            .filter(signals::Column::HitTarget.eq(SignalOutcome::Open.to_column()))
            .count(db)
            .await?;
        let hit_target = signals::Entity::find()
            .filter(signals::Column::HitTarget.eq(SignalOutcome::HitTarget.to_column()))
            .count(db)
            .await?;
        let hit_stop = signals::Entity::find()
            .filter(signals::Column::HitTarget.eq(SignalOutcome::HitStop.to_column()))
            .count(db)
            .await?;
        Ok(SignalStats {
            total,
            open,
            hit_target,
            hit_stop,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_signal_resolution_table() {
        let dir = SignalDirection::Long;
        // entry 100, target 110, stop 90
        assert_eq!(resolve_outcome(dir, 110.0, 90.0, 111.0), SignalOutcome::HitTarget);
        assert_eq!(resolve_outcome(dir, 110.0, 90.0, 110.0), SignalOutcome::HitTarget);
        assert_eq!(resolve_outcome(dir, 110.0, 90.0, 89.0), SignalOutcome::HitStop);
        assert_eq!(resolve_outcome(dir, 110.0, 90.0, 90.0), SignalOutcome::HitStop);
        assert_eq!(resolve_outcome(dir, 110.0, 90.0, 105.0), SignalOutcome::Open);
    }

    #[test]
    fn short_signal_resolution_table() {
        let dir = SignalDirection::Short;
        // entry 100, target 90, stop 110
        assert_eq!(resolve_outcome(dir, 90.0, 110.0, 89.0), SignalOutcome::HitTarget);
        assert_eq!(resolve_outcome(dir, 90.0, 110.0, 90.0), SignalOutcome::HitTarget);
        assert_eq!(resolve_outcome(dir, 90.0, 110.0, 111.0), SignalOutcome::HitStop);
        assert_eq!(resolve_outcome(dir, 90.0, 110.0, 110.0), SignalOutcome::HitStop);
        assert_eq!(resolve_outcome(dir, 90.0, 110.0, 95.0), SignalOutcome::Open);
    }

    #[test]
    fn gap_through_both_levels_prefers_the_target() {
        // A degenerate configuration where both checks are true at once: the
        // target branch wins because it is evaluated first.
        assert_eq!(
            resolve_outcome(SignalDirection::Long, 100.0, 100.0, 100.0),
            SignalOutcome::HitTarget
        );
    }

    #[test]
    fn pseudo_rsi_is_deterministic_and_bounded() {
        for (coin, hour) in [("bitcoin", 0i64), ("ethereum", 491_000), ("solana", 1)] {
            let a = pseudo_rsi(coin, hour);
            let b = pseudo_rsi(coin, hour);
            assert_eq!(a, b);
            assert!((0.0..=100.0).contains(&a));
        }
    }

    #[test]
    fn setup_thresholds() {
        assert_eq!(setup_for(10.0), Some(SignalDirection::Long));
        assert_eq!(setup_for(30.0), None);
        assert_eq!(setup_for(50.0), None);
        assert_eq!(setup_for(70.0), None);
        assert_eq!(setup_for(88.0), Some(SignalDirection::Short));
    }

    #[test]
    fn win_rate_needs_resolved_signals() {
        let none = SignalStats {
            total: 3,
            open: 3,
            hit_target: 0,
            hit_stop: 0,
        };
        assert!(none.win_rate().is_none());

        let some = SignalStats {
            total: 10,
            open: 2,
            hit_target: 6,
            hit_stop: 2,
        };
        assert_eq!(some.win_rate(), Some(75.0));
    }
}
