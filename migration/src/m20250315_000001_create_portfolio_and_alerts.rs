use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Portfolio::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Portfolio::Id).big_integer().auto_increment().primary_key())
                    .col(ColumnDef::new(Portfolio::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Portfolio::Symbol).text().not_null())
                    .col(ColumnDef::new(Portfolio::Amount).double().not_null())
                    .col(ColumnDef::new(Portfolio::EntryPrice).double().not_null())
                    .col(
                        ColumnDef::new(Portfolio::CreatedAt)
                            .timestamp_with_time_zone()
                            .null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_portfolio_user")
                            .from(Portfolio::Table, Portfolio::UserId)
                            .to(Users::Table, Users::TelegramId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alerts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Alerts::Id).big_integer().auto_increment().primary_key())
                    .col(ColumnDef::new(Alerts::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Alerts::Symbol).text().not_null())
                    .col(ColumnDef::new(Alerts::TargetPrice).double().not_null())
                    .col(ColumnDef::new(Alerts::Direction).text().not_null())
                    .col(
                        ColumnDef::new(Alerts::CreatedAt)
                            .timestamp_with_time_zone()
                            .null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_alerts_user")
                            .from(Alerts::Table, Alerts::UserId)
                            .to(Users::Table, Users::TelegramId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alerts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Portfolio::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    TelegramId,
}

#[derive(DeriveIden)]
enum Portfolio {
    Table,
    Id,
    UserId,
    Symbol,
    Amount,
    EntryPrice,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Alerts {
    Table,
    Id,
    UserId,
    Symbol,
    TargetPrice,
    Direction,
    CreatedAt,
}
