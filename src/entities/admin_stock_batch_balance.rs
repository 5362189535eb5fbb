use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Batch-level central pool. A batch number is unique per medicine: the same
/// batch may be refilled repeatedly, but always with the same expiry date.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "admin_stock_batch_balances")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub medicine_id: i64,
    pub batch_number: String,
    pub expiry_date: Date,
    pub quantity: i32,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::medicine::Entity",
        from = "Column::MedicineId",
        to = "super::medicine::Column::Id"
    )]
    Medicine,
}

impl Related<super::medicine::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Medicine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
