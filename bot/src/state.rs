use std::sync::Arc;

use sea_orm::DatabaseConnection;
use shared::models::RenewalPolicy;
use shared::{get_db_connection, Config, CryptoPayClient, MarketClient};

use crate::services::alert_service::AlertService;
use crate::services::session::SessionStore;
use crate::services::signal_service::SignalService;
use crate::services::subscription_service::SubscriptionService;

pub type HandlerResult = Result<(), anyhow::Error>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<DatabaseConnection>,
    pub market: Arc<MarketClient>,
    pub crypto_pay: Arc<CryptoPayClient>,
    pub sessions: Arc<SessionStore>,
    pub subscriptions: Arc<SubscriptionService>,
    pub signals: Arc<SignalService>,
    pub alerts: Arc<AlertService>,
}

impl AppState {
    pub async fn new() -> Result<Self, anyhow::Error> {
        let config = Config::from_env()?;
        let db = Arc::new(get_db_connection(&config.database_url).await?);
        tracing::info!("Connected to database successfully");

        let market = MarketClient::new()?;
        let crypto_pay = CryptoPayClient::new(config.crypto_pay_token.clone())?;
        let subscriptions = Arc::new(SubscriptionService::new(
            db.clone(),
            config.admin_ids.clone(),
            RenewalPolicy::default(),
        ));
        let signals = Arc::new(SignalService::new(db.clone()));
        let alerts = Arc::new(AlertService::new(db.clone()));

        Ok(AppState {
            config: Arc::new(config),
            db,
            market: Arc::new(market),
            crypto_pay: Arc::new(crypto_pay),
            sessions: Arc::new(SessionStore::new()),
            subscriptions,
            signals,
            alerts,
        })
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.config.is_admin(user_id)
    }
}
