use crate::{
    db::DbPool,
    entities::stock_balance,
    errors::ServiceError,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use tracing::instrument;

/// Read-only projections over the balance tables. Pure consumers of the
/// ledger-append path's output; no invariants of their own.
#[derive(Clone)]
pub struct ReportService {
    db_pool: Arc<DbPool>,
}

impl ReportService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Closing stock per (franchise, medicine), paginated. Franchise callers
    /// are scoped by the handler to their own rows.
    #[instrument(skip(self))]
    pub async fn closing_stock(
        &self,
        page: u64,
        limit: u64,
        franchise_id: Option<i64>,
        medicine_id: Option<i64>,
    ) -> Result<(Vec<stock_balance::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = stock_balance::Entity::find();
        if let Some(franchise_id) = franchise_id {
            query = query.filter(stock_balance::Column::FranchiseId.eq(franchise_id));
        }
        if let Some(medicine_id) = medicine_id {
            query = query.filter(stock_balance::Column::MedicineId.eq(medicine_id));
        }

        let paginator = query
            .order_by_asc(stock_balance::Column::FranchiseId)
            .order_by_asc(stock_balance::Column::MedicineId)
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
