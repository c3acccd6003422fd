use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::TelegramId).big_integer().not_null().primary_key())
                    .col(ColumnDef::new(Users::Username).text().null())
                    .col(ColumnDef::new(Users::Tier).text().not_null().default("free"))
                    .col(ColumnDef::new(Users::IsBanned).boolean().not_null().default(false))
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Subscriptions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Subscriptions::UserId).big_integer().not_null().primary_key())
                    .col(ColumnDef::new(Subscriptions::Tier).text().not_null())
                    .col(ColumnDef::new(Subscriptions::StartDate).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Subscriptions::EndDate).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Subscriptions::PaymentId).text().null())
                    .col(ColumnDef::new(Subscriptions::Notified).boolean().not_null().default(false))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscriptions_user")
                            .from(Subscriptions::Table, Subscriptions::UserId)
                            .to(Users::Table, Users::TelegramId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Payments::Id).big_integer().auto_increment().primary_key())
                    .col(ColumnDef::new(Payments::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Payments::Amount).double().not_null())
                    .col(ColumnDef::new(Payments::Currency).text().not_null().default("USDT"))
                    .col(ColumnDef::new(Payments::Status).text().not_null())
                    .col(ColumnDef::new(Payments::PaymentId).text().null())
                    .col(ColumnDef::new(Payments::Plan).text().null())
                    .col(
                        ColumnDef::new(Payments::CreatedAt)
                            .timestamp_with_time_zone()
                            .null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payments_user")
                            .from(Payments::Table, Payments::UserId)
                            .to(Users::Table, Users::TelegramId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Subscriptions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    TelegramId,
    Username,
    Tier,
    IsBanned,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Subscriptions {
    Table,
    UserId,
    Tier,
    StartDate,
    EndDate,
    PaymentId,
    Notified,
}

#[derive(DeriveIden)]
enum Payments {
    Table,
    Id,
    UserId,
    Amount,
    Currency,
    Status,
    PaymentId,
    Plan,
    CreatedAt,
}
