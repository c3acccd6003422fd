//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "signals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub pair: String,
    pub direction: String, // "long" or "short"
    pub entry_price: f64,
    pub target_price: f64,
    pub stop_loss: f64,
    pub is_vip: bool,
    pub hit_target: i32, // 0 = open, 1 = hit target, -1 = hit stop
    pub created_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
