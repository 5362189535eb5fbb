use crate::{
    db::DbPool,
    entities::{admin_stock_balance, admin_stock_batch_balance},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};

/// A batch must expire strictly more than this many days out to be accepted
/// into the central pool.
const MIN_EXPIRY_DAYS: i64 = 90;

/// One batch being added to the central pool.
#[derive(Debug, Clone)]
pub struct RefillItem {
    pub medicine_id: i64,
    pub quantity: i32,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
}

/// Whether a batch expiring on `expiry` may be refilled as of `today`.
/// Exactly `MIN_EXPIRY_DAYS` out is rejected; one day later is accepted.
pub fn expiry_acceptable(today: NaiveDate, expiry: NaiveDate) -> bool {
    (expiry - today).num_days() > MIN_EXPIRY_DAYS
}

/// Service owning the central (pre-franchise) stock pool.
#[derive(Clone)]
pub struct AdminStockService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl AdminStockService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Adds batches to the central pool. The whole request is validated
    /// before anything is written and applied in one transaction:
    /// an invalid item rejects every item.
    #[instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn refill(
        &self,
        items: Vec<RefillItem>,
    ) -> Result<Vec<admin_stock_batch_balance::Model>, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "refill requires at least one item".into(),
            ));
        }

        let today = Utc::now().date_naive();
        let mut seen: HashSet<(i64, String)> = HashSet::new();
        for item in &items {
            if item.quantity <= 0 {
                return Err(ServiceError::ValidationError(format!(
                    "refill quantity for batch {} must be positive",
                    item.batch_number
                )));
            }
            if item.batch_number.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "batch number must not be empty".into(),
                ));
            }
            if !expiry_acceptable(today, item.expiry_date) {
                return Err(ServiceError::ValidationError(format!(
                    "batch {} expires {}, which is not more than {} days out",
                    item.batch_number, item.expiry_date, MIN_EXPIRY_DAYS
                )));
            }
            if !seen.insert((item.medicine_id, item.batch_number.clone())) {
                return Err(ServiceError::ValidationError(format!(
                    "batch {} appears more than once for medicine {}",
                    item.batch_number, item.medicine_id
                )));
            }
        }

        let medicine_count = seen
            .iter()
            .map(|(medicine_id, _)| *medicine_id)
            .collect::<HashSet<_>>()
            .len();
        let total_quantity: i64 = items.iter().map(|i| i.quantity as i64).sum();

        let upserted = self
            .db_pool
            .transaction::<_, Vec<admin_stock_batch_balance::Model>, ServiceError>(move |txn| {
                Box::pin(async move {
                    let mut rows = Vec::with_capacity(items.len());
                    for item in items {
                        let row = Self::upsert_batch(txn, &item).await?;
                        Self::upsert_medicine_total(txn, item.medicine_id, item.quantity).await?;
                        rows.push(row);
                    }
                    Ok(rows)
                })
            })
            .await
            .map_err(|e| match e {
                sea_orm::TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                sea_orm::TransactionError::Transaction(service_err) => service_err,
            })?;

        info!(medicine_count, total_quantity, "admin stock refilled");
        self.event_sender
            .send_or_log(Event::AdminStockRefilled {
                medicine_count,
                total_quantity,
            })
            .await;

        Ok(upserted)
    }

    /// Create-or-increment for one batch row. A batch number already recorded
    /// for the medicine with a different expiry date is a conflict.
    async fn upsert_batch<C: ConnectionTrait>(
        txn: &C,
        item: &RefillItem,
    ) -> Result<admin_stock_batch_balance::Model, ServiceError> {
        let existing = admin_stock_batch_balance::Entity::find()
            .filter(admin_stock_batch_balance::Column::MedicineId.eq(item.medicine_id))
            .filter(admin_stock_batch_balance::Column::BatchNumber.eq(item.batch_number.clone()))
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?;

        match existing {
            Some(row) => {
                if row.expiry_date != item.expiry_date {
                    return Err(ServiceError::Conflict(format!(
                        "batch {} for medicine {} is already recorded with expiry {}",
                        item.batch_number, item.medicine_id, row.expiry_date
                    )));
                }
                let new_quantity = row.quantity + item.quantity;
                let mut active: admin_stock_batch_balance::ActiveModel = row.into();
                active.quantity = Set(new_quantity);
                active.updated_at = Set(Utc::now());
                active.update(txn).await.map_err(ServiceError::db_error)
            }
            None => admin_stock_batch_balance::ActiveModel {
                medicine_id: Set(item.medicine_id),
                batch_number: Set(item.batch_number.clone()),
                expiry_date: Set(item.expiry_date),
                quantity: Set(item.quantity),
                updated_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(txn)
            .await
            .map_err(ServiceError::db_error),
        }
    }

    async fn upsert_medicine_total<C: ConnectionTrait>(
        txn: &C,
        medicine_id: i64,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        let existing = admin_stock_balance::Entity::find()
            .filter(admin_stock_balance::Column::MedicineId.eq(medicine_id))
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?;

        match existing {
            Some(row) => {
                let new_quantity = row.quantity + quantity;
                let mut active: admin_stock_balance::ActiveModel = row.into();
                active.quantity = Set(new_quantity);
                active.updated_at = Set(Utc::now());
                active.update(txn).await.map_err(ServiceError::db_error)?;
            }
            None => {
                admin_stock_balance::ActiveModel {
                    medicine_id: Set(medicine_id),
                    quantity: Set(quantity),
                    updated_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(txn)
                .await
                .map_err(ServiceError::db_error)?;
            }
        }
        Ok(())
    }

    /// Current pool quantity for a medicine; absent row reads 0.
    pub async fn pool_quantity(&self, medicine_id: i64) -> Result<i32, ServiceError> {
        let db = self.db_pool.as_ref();
        let row = admin_stock_balance::Entity::find()
            .filter(admin_stock_balance::Column::MedicineId.eq(medicine_id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(row.map(|r| r.quantity).unwrap_or(0))
    }

    /// Paginated batch-level pool rows, optionally filtered to one medicine.
    #[instrument(skip(self))]
    pub async fn list_rows(
        &self,
        page: u64,
        limit: u64,
        medicine_id: Option<i64>,
    ) -> Result<(Vec<admin_stock_batch_balance::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = admin_stock_batch_balance::Entity::find();
        if let Some(medicine_id) = medicine_id {
            query = query.filter(admin_stock_batch_balance::Column::MedicineId.eq(medicine_id));
        }

        let paginator = query
            .order_by_asc(admin_stock_batch_balance::Column::MedicineId)
            .order_by_asc(admin_stock_batch_balance::Column::BatchNumber)
            .paginate(db, limit);

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::db_error)?;
        let rows = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((rows, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use test_case::test_case;

    #[test_case(-1, false ; "already expired")]
    #[test_case(1, false ; "one day out")]
    #[test_case(89, false ; "just under the cutoff")]
    #[test_case(90, false ; "exactly at the cutoff")]
    #[test_case(91, true ; "one day past the cutoff")]
    #[test_case(365, true ; "a year out")]
    fn expiry_boundary_is_exclusive_at_90_days(days_out: i64, accepted: bool) {
        let today = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        assert_eq!(
            expiry_acceptable(today, today + Duration::days(days_out)),
            accepted
        );
    }
}
