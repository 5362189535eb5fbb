use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Delivery lifecycle of a sale's goods. Forward-only:
/// PENDING → DISPATCHED → DELIVERED.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TransportStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "DISPATCHED")]
    Dispatched,
    #[sea_orm(string_value = "DELIVERED")]
    Delivered,
}

impl TransportStatus {
    /// Whether `next` is a legal forward move from `self`.
    pub fn can_advance_to(self, next: TransportStatus) -> bool {
        matches!(
            (self, next),
            (TransportStatus::Pending, TransportStatus::Dispatched)
                | (TransportStatus::Dispatched, TransportStatus::Delivered)
        )
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transports")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// A sale has at most one transport.
    #[sea_orm(unique)]
    pub sale_id: i64,
    pub franchise_id: i64,
    pub status: TransportStatus,
    pub dispatched_at: Option<DateTimeUtc>,
    pub delivered_at: Option<DateTimeUtc>,
    /// One-time guard: set when ledger lines for the sale were posted.
    pub stock_posted_at: Option<DateTimeUtc>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub transport_fee: Decimal,
    pub transporter_name: String,
    pub company_name: String,
    pub receipt_number: Option<String>,
    pub vehicle_number: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    /// Optimistic concurrency token; bumped on every update.
    pub version: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sale::Entity",
        from = "Column::SaleId",
        to = "super::sale::Column::Id"
    )]
    Sale,
    #[sea_orm(
        belongs_to = "super::franchise::Entity",
        from = "Column::FranchiseId",
        to = "super::franchise::Column::Id"
    )]
    Franchise,
}

impl Related<super::sale::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sale.def()
    }
}

impl Related<super::franchise::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Franchise.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
