//! Subscription state machine: entitlement reads, payment confirmation and
//! the admin grant path.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, TransactionTrait,
};
use shared::entity::{payments, subscriptions, users};
use shared::models::{PaymentStatus, RenewalPolicy, SubscriptionPlan, UserTier};
use uuid::Uuid;

pub struct SubscriptionService {
    db: Arc<DatabaseConnection>,
    admin_ids: Vec<i64>,
    renewal_policy: RenewalPolicy,
}

impl SubscriptionService {
    pub fn new(db: Arc<DatabaseConnection>, admin_ids: Vec<i64>, renewal_policy: RenewalPolicy) -> Self {
        Self {
            db,
            admin_ids,
            renewal_policy,
        }
    }

    /// Entitlement check. Admin identities are always entitled; everyone else
    /// is entitled iff their subscription row has not ended. Reads the store
    /// on every call so a just-committed payment is visible immediately.
    pub async fn is_entitled(&self, user_id: i64) -> Result<bool> {
        if self.admin_ids.contains(&user_id) {
            return Ok(true);
        }
        let subscription = subscriptions::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?;
        Ok(entitled_at(false, subscription.map(|s| s.end_date), Utc::now()))
    }

    pub async fn active_subscription(&self, user_id: i64) -> Result<Option<subscriptions::Model>> {
        let subscription = subscriptions::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?;
        Ok(subscription.filter(|s| s.end_date >= Utc::now()))
    }

    /// Invoked only once the payment gateway has reported the invoice as
    /// paid. The subscription upsert and the payment record are one
    /// transaction: either both land or neither does.
    pub async fn confirm_payment(
        &self,
        user_id: i64,
        plan: SubscriptionPlan,
        amount: f64,
        invoice_ref: &str,
        duration: Duration,
    ) -> Result<subscriptions::Model> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let subscription = upsert_subscription(
            &txn,
            user_id,
            self.renewal_policy,
            now,
            duration,
            Some(invoice_ref.to_string()),
        )
        .await?;

        payments::ActiveModel {
            user_id: Set(user_id),
            amount: Set(amount),
            currency: Set("USDT".to_string()),
            status: Set(PaymentStatus::Completed.as_str().to_string()),
            payment_id: Set(Some(invoice_ref.to_string())),
            plan: Set(Some(plan.as_str().to_string())),
            created_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        set_tier(&txn, user_id, UserTier::Vip).await?;
        txn.commit().await?;
        Ok(subscription)
    }

    /// Admin grant: same subscription row shape with a synthetic payment
    /// reference. No payment row is written, no revenue is implied.
    pub async fn grant_vip(&self, user_id: i64, days: i64) -> Result<subscriptions::Model> {
        let now = Utc::now();
        let reference = format!("admin-grant-{}", Uuid::new_v4());
        let txn = self.db.begin().await?;

        let subscription = upsert_subscription(
            &txn,
            user_id,
            self.renewal_policy,
            now,
            Duration::days(days),
            Some(reference),
        )
        .await?;

        set_tier(&txn, user_id, UserTier::Vip).await?;
        txn.commit().await?;
        Ok(subscription)
    }
}

/// Term computation for a (re)subscription confirmed at `now`.
pub fn compute_term(
    current_end: Option<DateTime<Utc>>,
    policy: RenewalPolicy,
    now: DateTime<Utc>,
    duration: Duration,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let base = match policy {
        RenewalPolicy::FromNow => now,
        RenewalPolicy::ExtendExpiry => current_end.filter(|end| *end > now).unwrap_or(now),
    };
    (now, base + duration)
}

pub fn entitled_at(is_admin: bool, sub_end: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    is_admin || sub_end.map(|end| end >= now).unwrap_or(false)
}

/// Writes the single subscription row for the user: an update when a row
/// exists, an insert otherwise. The primary key on `user_id` keeps it at one
/// row per user whichever path is taken.
async fn upsert_subscription<C: ConnectionTrait>(
    conn: &C,
    user_id: i64,
    policy: RenewalPolicy,
    now: DateTime<Utc>,
    duration: Duration,
    payment_ref: Option<String>,
) -> Result<subscriptions::Model> {
    let existing = subscriptions::Entity::find_by_id(user_id).one(conn).await?;
    let (start, end) = compute_term(existing.as_ref().map(|s| s.end_date), policy, now, duration);

    let row = subscriptions::ActiveModel {
        user_id: Set(user_id),
        tier: Set(UserTier::Vip.as_str().to_string()),
        start_date: Set(start),
        end_date: Set(end),
        payment_id: Set(payment_ref),
        notified: Set(false),
    };

    let saved = if existing.is_some() {
        subscriptions::Entity::update(row).exec(conn).await?
    } else {
        subscriptions::Entity::insert(row)
            .exec_with_returning(conn)
            .await?
    };
    Ok(saved)
}

async fn set_tier<C: ConnectionTrait>(conn: &C, user_id: i64, tier: UserTier) -> Result<()> {
    users::Entity::update_many()
        .col_expr(users::Column::Tier, Expr::value(tier.as_str()))
        .filter(users::Column::TelegramId.eq(user_id))
        .exec(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn sub_row(user_id: i64, end: DateTime<Utc>) -> subscriptions::Model {
        subscriptions::Model {
            user_id,
            tier: "vip".to_string(),
            start_date: end - Duration::days(30),
            end_date: end,
            payment_id: Some("inv-1".to_string()),
            notified: false,
        }
    }

    #[test]
    fn grant_expiry_is_start_plus_duration() {
        let now = Utc::now();
        for days in [1, 7, 30, 365] {
            let (start, end) = compute_term(None, RenewalPolicy::FromNow, now, Duration::days(days));
            assert_eq!(start, now);
            assert_eq!(end, now + Duration::days(days));
        }
    }

    #[test]
    fn renewal_from_now_discards_the_remainder() {
        let now = Utc::now();
        let current_end = now + Duration::days(10);
        let (_, end) = compute_term(
            Some(current_end),
            RenewalPolicy::FromNow,
            now,
            Duration::days(30),
        );
        assert_eq!(end, now + Duration::days(30));
    }

    #[test]
    fn renewal_extend_expiry_stacks_onto_the_current_term() {
        let now = Utc::now();
        let current_end = now + Duration::days(10);
        let (_, end) = compute_term(
            Some(current_end),
            RenewalPolicy::ExtendExpiry,
            now,
            Duration::days(30),
        );
        assert_eq!(end, current_end + Duration::days(30));
    }

    #[test]
    fn extend_expiry_ignores_an_already_lapsed_term() {
        let now = Utc::now();
        let lapsed = now - Duration::days(3);
        let (_, end) = compute_term(
            Some(lapsed),
            RenewalPolicy::ExtendExpiry,
            now,
            Duration::days(30),
        );
        assert_eq!(end, now + Duration::days(30));
    }

    #[test]
    fn admins_are_entitled_without_any_subscription() {
        assert!(entitled_at(true, None, Utc::now()));
    }

    #[test]
    fn entitlement_tracks_end_date_inclusively() {
        let now = Utc::now();
        assert!(entitled_at(false, Some(now), now));
        assert!(entitled_at(false, Some(now + Duration::seconds(1)), now));
        assert!(!entitled_at(false, Some(now - Duration::seconds(1)), now));
        assert!(!entitled_at(false, None, now));
    }

    #[tokio::test]
    async fn is_entitled_reads_the_store_for_non_admins() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sub_row(42, Utc::now() + Duration::days(5))]])
            .append_query_results([Vec::<subscriptions::Model>::new()])
            .into_connection();
        let service = SubscriptionService::new(Arc::new(db), vec![], RenewalPolicy::FromNow);

        assert!(service.is_entitled(42).await.unwrap());
        assert!(!service.is_entitled(43).await.unwrap());
    }

    #[tokio::test]
    async fn admin_identity_short_circuits_the_store() {
        // No query results are queued: an admin check must not hit the store.
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = SubscriptionService::new(Arc::new(db), vec![99], RenewalPolicy::FromNow);

        assert!(service.is_entitled(99).await.unwrap());
    }

    #[tokio::test]
    async fn renewal_updates_the_single_subscription_row() {
        let existing = sub_row(42, Utc::now() + Duration::days(3));
        let renewed = sub_row(42, Utc::now() + Duration::days(30));
        let payment = payments::Model {
            id: 1,
            user_id: 42,
            amount: 29.99,
            currency: "USDT".to_string(),
            status: "completed".to_string(),
            payment_id: Some("777".to_string()),
            plan: Some("monthly".to_string()),
            created_at: None,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing]])
            .append_query_results([vec![renewed]])
            .append_query_results([vec![payment]])
            .append_exec_results([sea_orm::MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let service = SubscriptionService::new(Arc::new(db), vec![], RenewalPolicy::FromNow);

        let subscription = service
            .confirm_payment(
                42,
                SubscriptionPlan::Monthly,
                29.99,
                "777",
                Duration::days(30),
            )
            .await
            .unwrap();
        assert_eq!(subscription.user_id, 42);

        // A user with an existing row gets an update, never a second row.
        let db = Arc::try_unwrap(service.db).expect("sole owner of the mock connection");
        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains(r#"UPDATE \"subscriptions\""#));
        assert!(log.contains(r#"INSERT INTO \"payments\""#));
        assert!(!log.contains(r#"INSERT INTO \"subscriptions\""#));
    }

    #[tokio::test]
    async fn expired_subscription_is_not_entitled() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sub_row(42, Utc::now() - Duration::days(1))]])
            .into_connection();
        let service = SubscriptionService::new(Arc::new(db), vec![], RenewalPolicy::FromNow);

        assert!(!service.is_entitled(42).await.unwrap());
    }
}
