pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_users_and_billing;
mod m20250308_000001_create_signals;
mod m20250315_000001_create_portfolio_and_alerts;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_users_and_billing::Migration),
            Box::new(m20250308_000001_create_signals::Migration),
            Box::new(m20250315_000001_create_portfolio_and_alerts::Migration),
        ]
    }
}
