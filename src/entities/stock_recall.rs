use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Audit record written when a batch is pulled back from a franchise.
/// Does not itself mutate balances.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_recalls")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub franchise_id: i64,
    pub medicine_id: i64,
    pub batch_number: String,
    pub expiry_date: Date,
    pub quantity: i32,
    pub stock_transaction_id: Option<i64>,
    pub notes: Option<String>,
    pub recalled_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::franchise::Entity",
        from = "Column::FranchiseId",
        to = "super::franchise::Column::Id"
    )]
    Franchise,
    #[sea_orm(
        belongs_to = "super::medicine::Entity",
        from = "Column::MedicineId",
        to = "super::medicine::Column::Id"
    )]
    Medicine,
    #[sea_orm(
        belongs_to = "super::stock_transaction::Entity",
        from = "Column::StockTransactionId",
        to = "super::stock_transaction::Column::Id"
    )]
    Transaction,
}

impl Related<super::franchise::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Franchise.def()
    }
}

impl Related<super::medicine::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Medicine.def()
    }
}

impl Related<super::stock_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
