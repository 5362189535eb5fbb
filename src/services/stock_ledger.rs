use crate::{
    db::DbPool,
    entities::{stock_balance, stock_batch_balance, stock_ledger},
    errors::ServiceError,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Rows are rebuilt in batches of this many inserts to bound statement size.
const REBUILD_BATCH_SIZE: usize = 1000;

/// One quantity change to append to the ledger.
#[derive(Debug, Clone)]
pub struct LedgerLine {
    pub franchise_id: i64,
    pub medicine_id: i64,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    /// Signed: negative for recalls and reversals.
    pub qty_change: i32,
    pub rate: Decimal,
    pub amount: Decimal,
}

/// Outcome of a full projection rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildSummary {
    pub ledger_rows: u64,
    pub balance_rows: u64,
    pub batch_rows: u64,
}

/// Snapshot used to detect concurrent ledger writers around a rebuild.
#[derive(Debug, Default, PartialEq, Eq, FromQueryResult)]
struct LedgerFingerprint {
    rows: i64,
    qty_sum: Option<i64>,
    max_id: Option<i64>,
}

#[derive(Debug, FromQueryResult)]
struct BalanceGroup {
    franchise_id: i64,
    medicine_id: i64,
    total: i64,
}

#[derive(Debug, FromQueryResult)]
struct BatchBalanceGroup {
    franchise_id: i64,
    medicine_id: i64,
    batch_number: String,
    expiry_date: NaiveDate,
    total: i64,
}

/// Maintains the append-only stock ledger and its two derived balance
/// projections as a consistent pair. The only other legitimate writer of the
/// projection tables is [`StockLedgerService::rebuild_balances`].
#[derive(Clone)]
pub struct StockLedgerService {
    db_pool: Arc<DbPool>,
}

impl StockLedgerService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Appends ledger rows and applies the matching balance deltas inside the
    /// caller's open transaction. The transaction is the atomicity boundary:
    /// a ledger row without its balance update can never become visible.
    pub async fn post_ledger_lines<C: ConnectionTrait>(
        &self,
        txn: &C,
        transaction_id: i64,
        lines: &[LedgerLine],
    ) -> Result<usize, ServiceError> {
        let now = Utc::now();

        for line in lines {
            stock_ledger::ActiveModel {
                transaction_id: Set(transaction_id),
                franchise_id: Set(line.franchise_id),
                medicine_id: Set(line.medicine_id),
                batch_number: Set(line.batch_number.clone()),
                expiry_date: Set(line.expiry_date),
                qty_change: Set(line.qty_change),
                rate: Set(line.rate),
                amount: Set(line.amount),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(txn)
            .await
            .map_err(ServiceError::db_error)?;

            let new_quantity = self
                .apply_balance_delta(txn, line.franchise_id, line.medicine_id, line.qty_change)
                .await?;
            if new_quantity < 0 {
                // Legitimately reachable only through an upstream bug
                // (oversold or double-posted); the ledger stays authoritative.
                warn!(
                    franchise_id = line.franchise_id,
                    medicine_id = line.medicine_id,
                    quantity = new_quantity,
                    "stock balance went negative"
                );
            }

            if let (Some(batch), Some(expiry)) = (&line.batch_number, line.expiry_date) {
                self.apply_batch_delta(
                    txn,
                    line.franchise_id,
                    line.medicine_id,
                    batch,
                    expiry,
                    line.qty_change,
                )
                .await?;
            }
        }

        Ok(lines.len())
    }

    /// Increment-upserts a (franchise, medicine) balance row, returning the
    /// resulting quantity.
    async fn apply_balance_delta<C: ConnectionTrait>(
        &self,
        txn: &C,
        franchise_id: i64,
        medicine_id: i64,
        delta: i32,
    ) -> Result<i32, ServiceError> {
        let existing = stock_balance::Entity::find()
            .filter(stock_balance::Column::FranchiseId.eq(franchise_id))
            .filter(stock_balance::Column::MedicineId.eq(medicine_id))
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?;

        match existing {
            Some(row) => {
                let new_quantity = row.quantity + delta;
                let mut active: stock_balance::ActiveModel = row.into();
                active.quantity = Set(new_quantity);
                active.updated_at = Set(Utc::now());
                active.update(txn).await.map_err(ServiceError::db_error)?;
                Ok(new_quantity)
            }
            None => {
                stock_balance::ActiveModel {
                    franchise_id: Set(franchise_id),
                    medicine_id: Set(medicine_id),
                    quantity: Set(delta),
                    updated_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(txn)
                .await
                .map_err(ServiceError::db_error)?;
                Ok(delta)
            }
        }
    }

    /// Increment-upserts a batch-level balance row.
    async fn apply_batch_delta<C: ConnectionTrait>(
        &self,
        txn: &C,
        franchise_id: i64,
        medicine_id: i64,
        batch_number: &str,
        expiry_date: NaiveDate,
        delta: i32,
    ) -> Result<i32, ServiceError> {
        let existing = stock_batch_balance::Entity::find()
            .filter(stock_batch_balance::Column::FranchiseId.eq(franchise_id))
            .filter(stock_batch_balance::Column::MedicineId.eq(medicine_id))
            .filter(stock_batch_balance::Column::BatchNumber.eq(batch_number))
            .filter(stock_batch_balance::Column::ExpiryDate.eq(expiry_date))
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?;

        match existing {
            Some(row) => {
                let new_quantity = row.quantity + delta;
                let mut active: stock_batch_balance::ActiveModel = row.into();
                active.quantity = Set(new_quantity);
                active.updated_at = Set(Utc::now());
                active.update(txn).await.map_err(ServiceError::db_error)?;
                Ok(new_quantity)
            }
            None => {
                stock_batch_balance::ActiveModel {
                    franchise_id: Set(franchise_id),
                    medicine_id: Set(medicine_id),
                    batch_number: Set(batch_number.to_string()),
                    expiry_date: Set(expiry_date),
                    quantity: Set(delta),
                    updated_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(txn)
                .await
                .map_err(ServiceError::db_error)?;
                Ok(delta)
            }
        }
    }

    /// Current balance for a (franchise, medicine) pair; absent row reads 0.
    pub async fn balance_quantity(
        &self,
        franchise_id: i64,
        medicine_id: i64,
    ) -> Result<i32, ServiceError> {
        let db = self.db_pool.as_ref();
        let row = stock_balance::Entity::find()
            .filter(stock_balance::Column::FranchiseId.eq(franchise_id))
            .filter(stock_balance::Column::MedicineId.eq(medicine_id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(row.map(|r| r.quantity).unwrap_or(0))
    }

    /// Wipes and recomputes both balance projections from the full ledger.
    ///
    /// Requires a quiet ledger: a fingerprint (row count, qty sum, max id) is
    /// taken before and after, and a mismatch fails the run rather than
    /// leaving silently stale projections behind. Safe to re-run; two
    /// consecutive runs over the same ledger produce identical rows.
    #[instrument(skip(self))]
    pub async fn rebuild_balances(&self) -> Result<RebuildSummary, ServiceError> {
        let db = self.db_pool.as_ref();

        let before = self.ledger_fingerprint(db).await?;
        info!(
            ledger_rows = before.rows,
            "rebuilding stock balance projections"
        );

        let groups = stock_ledger::Entity::find()
            .select_only()
            .column(stock_ledger::Column::FranchiseId)
            .column(stock_ledger::Column::MedicineId)
            .column_as(stock_ledger::Column::QtyChange.sum(), "total")
            .group_by(stock_ledger::Column::FranchiseId)
            .group_by(stock_ledger::Column::MedicineId)
            .into_model::<BalanceGroup>()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let batch_groups = stock_ledger::Entity::find()
            .select_only()
            .column(stock_ledger::Column::FranchiseId)
            .column(stock_ledger::Column::MedicineId)
            .column(stock_ledger::Column::BatchNumber)
            .column(stock_ledger::Column::ExpiryDate)
            .column_as(stock_ledger::Column::QtyChange.sum(), "total")
            .filter(stock_ledger::Column::BatchNumber.is_not_null())
            .filter(stock_ledger::Column::ExpiryDate.is_not_null())
            .group_by(stock_ledger::Column::FranchiseId)
            .group_by(stock_ledger::Column::MedicineId)
            .group_by(stock_ledger::Column::BatchNumber)
            .group_by(stock_ledger::Column::ExpiryDate)
            .into_model::<BatchBalanceGroup>()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let now = Utc::now();
        let balance_models: Vec<stock_balance::ActiveModel> = groups
            .into_iter()
            .filter(|g| g.total != 0)
            .map(|g| stock_balance::ActiveModel {
                franchise_id: Set(g.franchise_id),
                medicine_id: Set(g.medicine_id),
                quantity: Set(g.total as i32),
                updated_at: Set(now),
                ..Default::default()
            })
            .collect();

        let batch_models: Vec<stock_batch_balance::ActiveModel> = batch_groups
            .into_iter()
            .filter(|g| g.total != 0)
            .map(|g| stock_batch_balance::ActiveModel {
                franchise_id: Set(g.franchise_id),
                medicine_id: Set(g.medicine_id),
                batch_number: Set(g.batch_number),
                expiry_date: Set(g.expiry_date),
                quantity: Set(g.total as i32),
                updated_at: Set(now),
                ..Default::default()
            })
            .collect();

        let balance_rows = balance_models.len() as u64;
        let batch_rows = batch_models.len() as u64;

        db.transaction::<_, (), ServiceError>(move |txn| {
            Box::pin(async move {
                stock_balance::Entity::delete_many()
                    .exec(txn)
                    .await
                    .map_err(ServiceError::db_error)?;
                stock_batch_balance::Entity::delete_many()
                    .exec(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                for chunk in balance_models.chunks(REBUILD_BATCH_SIZE) {
                    stock_balance::Entity::insert_many(chunk.to_vec())
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                }
                for chunk in batch_models.chunks(REBUILD_BATCH_SIZE) {
                    stock_batch_balance::Entity::insert_many(chunk.to_vec())
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                }
                Ok(())
            })
        })
        .await
        .map_err(|e| match e {
            sea_orm::TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            sea_orm::TransactionError::Transaction(service_err) => service_err,
        })?;

        let after = self.ledger_fingerprint(db).await?;
        if before != after {
            return Err(ServiceError::LedgerIntegrity(format!(
                "ledger changed during rebuild (rows {} -> {}, qty sum {:?} -> {:?}, \
                 max id {:?} -> {:?}); projections are stale, re-run with ledger \
                 writers paused",
                before.rows, after.rows, before.qty_sum, after.qty_sum, before.max_id,
                after.max_id
            )));
        }

        info!(balance_rows, batch_rows, "stock balance rebuild complete");

        Ok(RebuildSummary {
            ledger_rows: before.rows as u64,
            balance_rows,
            batch_rows,
        })
    }

    async fn ledger_fingerprint<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<LedgerFingerprint, ServiceError> {
        let fingerprint = stock_ledger::Entity::find()
            .select_only()
            .column_as(stock_ledger::Column::Id.count(), "rows")
            .column_as(stock_ledger::Column::QtyChange.sum(), "qty_sum")
            .column_as(stock_ledger::Column::Id.max(), "max_id")
            .into_model::<LedgerFingerprint>()
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(fingerprint.unwrap_or_default())
    }
}
