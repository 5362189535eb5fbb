use crate::{
    db::DbPool,
    entities::{franchise, stock_recall, stock_transaction},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct RecordRecall {
    pub franchise_id: i64,
    pub medicine_id: i64,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: i32,
    pub stock_transaction_id: Option<i64>,
    pub notes: Option<String>,
}

/// Audit trail for batches pulled back from franchises. Recording a recall
/// does not mutate any balance; reversals go through the ledger.
#[derive(Clone)]
pub struct RecallService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl RecallService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, command))]
    pub async fn record_recall(
        &self,
        command: RecordRecall,
    ) -> Result<stock_recall::Model, ServiceError> {
        if command.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "recall quantity must be positive".into(),
            ));
        }

        let db = self.db_pool.as_ref();

        franchise::Entity::find_by_id(command.franchise_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Franchise {} not found", command.franchise_id))
            })?;

        if let Some(transaction_id) = command.stock_transaction_id {
            stock_transaction::Entity::find_by_id(transaction_id)
                .one(db)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Stock transaction {} not found",
                        transaction_id
                    ))
                })?;
        }

        let created = stock_recall::ActiveModel {
            franchise_id: Set(command.franchise_id),
            medicine_id: Set(command.medicine_id),
            batch_number: Set(command.batch_number),
            expiry_date: Set(command.expiry_date),
            quantity: Set(command.quantity),
            stock_transaction_id: Set(command.stock_transaction_id),
            notes: Set(command.notes),
            recalled_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        self.event_sender
            .send_or_log(Event::StockRecalled {
                recall_id: created.id,
                franchise_id: created.franchise_id,
                medicine_id: created.medicine_id,
                quantity: created.quantity,
            })
            .await;

        Ok(created)
    }

    /// Lists recalls with pagination, optionally scoped to one franchise.
    #[instrument(skip(self))]
    pub async fn list_recalls(
        &self,
        page: u64,
        limit: u64,
        franchise_id: Option<i64>,
    ) -> Result<(Vec<stock_recall::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = stock_recall::Entity::find();
        if let Some(franchise_id) = franchise_id {
            query = query.filter(stock_recall::Column::FranchiseId.eq(franchise_id));
        }

        let paginator = query
            .order_by_desc(stock_recall::Column::RecalledAt)
            .paginate(db, limit);

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((items, total))
    }
}
