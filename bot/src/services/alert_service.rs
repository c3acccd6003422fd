//! Price alerts: user CRUD plus the trigger predicate used by the
//! reconciliation job.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use shared::entity::alerts;
use shared::market::normalize_symbol;
use shared::models::AlertDirection;

/// Strict on both sides: a price sitting exactly on the target does not fire.
/// This is asymmetric with the signal tracker's >=/<= on purpose.
pub fn alert_triggered(direction: AlertDirection, target: f64, price: f64) -> bool {
    match direction {
        AlertDirection::Above => price > target,
        AlertDirection::Below => price < target,
    }
}

pub struct AlertService {
    db: Arc<DatabaseConnection>,
}

impl AlertService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn create_alert(
        &self,
        user_id: i64,
        symbol: &str,
        target_price: f64,
        direction: AlertDirection,
    ) -> Result<alerts::Model> {
        let alert = alerts::ActiveModel {
            user_id: Set(user_id),
            symbol: Set(normalize_symbol(symbol)),
            target_price: Set(target_price),
            direction: Set(direction.as_str().to_string()),
            created_at: Set(Some(Utc::now())),
            ..Default::default()
        };
        let saved = alerts::Entity::insert(alert)
            .exec_with_returning(self.db.as_ref())
            .await?;
        Ok(saved)
    }

    pub async fn alerts_for_user(&self, user_id: i64) -> Result<Vec<alerts::Model>> {
        let rows = alerts::Entity::find()
            .filter(alerts::Column::UserId.eq(user_id))
            .order_by_asc(alerts::Column::Id)
            .all(self.db.as_ref())
            .await?;
        Ok(rows)
    }

    /// Deletes an alert only if it belongs to the requesting user.
    pub async fn remove_alert(&self, user_id: i64, alert_id: i64) -> Result<bool> {
        let result = alerts::Entity::delete_many()
            .filter(alerts::Column::Id.eq(alert_id))
            .filter(alerts::Column::UserId.eq(user_id))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn above_alert_uses_strict_inequality() {
        let dir = AlertDirection::Above;
        assert!(!alert_triggered(dir, 50_000.0, 50_000.0));
        assert!(alert_triggered(dir, 50_000.0, 50_000.01));
        assert!(!alert_triggered(dir, 50_000.0, 49_999.99));
    }

    #[test]
    fn below_alert_uses_strict_inequality() {
        let dir = AlertDirection::Below;
        assert!(!alert_triggered(dir, 50_000.0, 50_000.0));
        assert!(alert_triggered(dir, 50_000.0, 49_999.99));
        assert!(!alert_triggered(dir, 50_000.0, 50_000.01));
    }
}
