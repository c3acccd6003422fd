use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Signals::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Signals::Id).big_integer().auto_increment().primary_key())
                    .col(ColumnDef::new(Signals::Pair).text().not_null())
                    .col(ColumnDef::new(Signals::Direction).text().not_null())
                    .col(ColumnDef::new(Signals::EntryPrice).double().not_null())
                    .col(ColumnDef::new(Signals::TargetPrice).double().not_null())
                    .col(ColumnDef::new(Signals::StopLoss).double().not_null())
                    .col(ColumnDef::new(Signals::IsVip).boolean().not_null().default(false))
                    // 0 = open, 1 = hit target, -1 = hit stop
                    .col(ColumnDef::new(Signals::HitTarget).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Signals::CreatedAt)
                            .timestamp_with_time_zone()
                            .null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Signals::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Signals {
    Table,
    Id,
    Pair,
    Direction,
    EntryPrice,
    TargetPrice,
    StopLoss,
    IsVip,
    HitTarget,
    CreatedAt,
}
