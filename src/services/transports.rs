use crate::{
    db::DbPool,
    entities::{
        admin_stock_balance, admin_stock_batch_balance, sale, sale_detail, stock_transaction,
        transport, TransportStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::stock_ledger::{LedgerLine, StockLedgerService},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};

/// Fields accepted when an admin creates a transport for a sale.
#[derive(Debug, Clone)]
pub struct CreateTransport {
    pub sale_id: i64,
    pub status: TransportStatus,
    pub transport_fee: Decimal,
    pub transporter_name: String,
    pub company_name: String,
    pub receipt_number: Option<String>,
    pub vehicle_number: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

/// Admin-side update. `status` may move the transport forward but never to
/// DELIVERED; that transition belongs to the franchise confirmation path.
#[derive(Debug, Clone, Default)]
pub struct UpdateTransport {
    pub transport_fee: Option<Decimal>,
    pub transporter_name: Option<String>,
    pub company_name: Option<String>,
    pub receipt_number: Option<String>,
    pub vehicle_number: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub status: Option<TransportStatus>,
}

/// Service owning the transport lifecycle and the delivery posting that
/// bridges it to the stock ledger.
#[derive(Clone)]
pub struct TransportService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    ledger: StockLedgerService,
}

impl TransportService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        ledger: StockLedgerService,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            ledger,
        }
    }

    /// Creates a transport for a sale at PENDING or DISPATCHED.
    #[instrument(skip(self, command))]
    pub async fn create_transport(
        &self,
        command: CreateTransport,
    ) -> Result<transport::Model, ServiceError> {
        if command.status == TransportStatus::Delivered {
            return Err(ServiceError::ValidationError(
                "a transport cannot be created as DELIVERED".into(),
            ));
        }

        let db = self.db_pool.as_ref();

        let sale = sale::Entity::find_by_id(command.sale_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Sale {} not found", command.sale_id))
            })?;

        let existing = transport::Entity::find()
            .filter(transport::Column::SaleId.eq(command.sale_id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "sale {} already has a transport",
                command.sale_id
            )));
        }

        let now = Utc::now();
        let dispatched_at = (command.status == TransportStatus::Dispatched).then_some(now);

        let created = transport::ActiveModel {
            sale_id: Set(sale.id),
            franchise_id: Set(sale.franchise_id),
            status: Set(command.status),
            dispatched_at: Set(dispatched_at),
            delivered_at: Set(None),
            stock_posted_at: Set(None),
            transport_fee: Set(command.transport_fee),
            transporter_name: Set(command.transporter_name),
            company_name: Set(command.company_name),
            receipt_number: Set(command.receipt_number),
            vehicle_number: Set(command.vehicle_number),
            tracking_number: Set(command.tracking_number),
            notes: Set(command.notes),
            version: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        self.event_sender
            .send_or_log(Event::TransportCreated {
                transport_id: created.id,
                sale_id: created.sale_id,
            })
            .await;
        if let Some(at) = created.dispatched_at {
            self.event_sender
                .send_or_log(Event::TransportDispatched {
                    transport_id: created.id,
                    dispatched_at: at,
                })
                .await;
        }

        Ok(created)
    }

    /// Admin update of carrier fields and forward status moves.
    /// Setting DELIVERED here is rejected outright.
    #[instrument(skip(self, command))]
    pub async fn update_transport(
        &self,
        transport_id: i64,
        command: UpdateTransport,
    ) -> Result<transport::Model, ServiceError> {
        if command.status == Some(TransportStatus::Delivered) {
            return Err(ServiceError::Conflict(
                "delivery is confirmed by the receiving franchise, not via this endpoint".into(),
            ));
        }

        let db = self.db_pool.as_ref();
        let current = transport::Entity::find_by_id(transport_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Transport {} not found", transport_id))
            })?;

        if let Some(next) = command.status {
            if next != current.status && !current.status.can_advance_to(next) {
                return Err(ServiceError::Conflict(format!(
                    "transport {} cannot move from {} to {}",
                    transport_id, current.status, next
                )));
            }
        }

        let now = Utc::now();
        let newly_dispatched = command.status == Some(TransportStatus::Dispatched)
            && current.status == TransportStatus::Pending;

        let mut update = transport::Entity::update_many()
            .col_expr(transport::Column::Version, Expr::value(current.version + 1))
            .col_expr(transport::Column::UpdatedAt, Expr::value(now));

        if let Some(fee) = command.transport_fee {
            update = update.col_expr(transport::Column::TransportFee, Expr::value(fee));
        }
        if let Some(name) = command.transporter_name {
            update = update.col_expr(transport::Column::TransporterName, Expr::value(name));
        }
        if let Some(name) = command.company_name {
            update = update.col_expr(transport::Column::CompanyName, Expr::value(name));
        }
        if let Some(value) = command.receipt_number {
            update = update.col_expr(transport::Column::ReceiptNumber, Expr::value(Some(value)));
        }
        if let Some(value) = command.vehicle_number {
            update = update.col_expr(transport::Column::VehicleNumber, Expr::value(Some(value)));
        }
        if let Some(value) = command.tracking_number {
            update = update.col_expr(transport::Column::TrackingNumber, Expr::value(Some(value)));
        }
        if let Some(value) = command.notes {
            update = update.col_expr(transport::Column::Notes, Expr::value(Some(value)));
        }
        if let Some(status) = command.status {
            update = update.col_expr(transport::Column::Status, Expr::value(status));
        }
        if newly_dispatched {
            update = update.col_expr(transport::Column::DispatchedAt, Expr::value(Some(now)));
        }

        let result = update
            .filter(transport::Column::Id.eq(transport_id))
            .filter(transport::Column::Version.eq(current.version))
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(transport_id));
        }

        if newly_dispatched {
            self.event_sender
                .send_or_log(Event::TransportDispatched {
                    transport_id,
                    dispatched_at: now,
                })
                .await;
        }

        self.get_transport(transport_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Transport {} not found", transport_id)))
    }

    /// Franchise confirmation of receipt: the DISPATCHED → DELIVERED
    /// transition plus the one-time stock posting, in a single transaction.
    ///
    /// Calling this again on an already delivered transport is a no-op that
    /// returns the stored record, so client retries are safe. Two concurrent
    /// confirmations are serialized by the version column: the loser's
    /// filtered UPDATE matches zero rows and its transaction rolls back.
    #[instrument(skip(self))]
    pub async fn mark_delivered(
        &self,
        transport_id: i64,
        acting_franchise_id: i64,
    ) -> Result<transport::Model, ServiceError> {
        let ledger = self.ledger.clone();

        let (delivered, posting, transitioned) = self
            .db_pool
            .transaction::<_, (transport::Model, Option<(i64, usize)>, bool), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        Self::deliver_in_txn(txn, &ledger, transport_id, acting_franchise_id)
                            .await
                    })
                },
            )
            .await
            .map_err(|e| match e {
                sea_orm::TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                sea_orm::TransactionError::Transaction(service_err) => service_err,
            })?;

        if transitioned {
            if let Some(at) = delivered.delivered_at {
                self.event_sender
                    .send_or_log(Event::TransportDelivered {
                        transport_id: delivered.id,
                        sale_id: delivered.sale_id,
                        franchise_id: delivered.franchise_id,
                        delivered_at: at,
                    })
                    .await;
            }
        }
        if let Some((transaction_id, line_count)) = posting {
            self.event_sender
                .send_or_log(Event::StockPosted {
                    transaction_id,
                    transport_id: delivered.id,
                    line_count,
                })
                .await;
        }

        Ok(delivered)
    }

    async fn deliver_in_txn<C: ConnectionTrait>(
        txn: &C,
        ledger: &StockLedgerService,
        transport_id: i64,
        acting_franchise_id: i64,
    ) -> Result<(transport::Model, Option<(i64, usize)>, bool), ServiceError> {
        let transport = transport::Entity::find_by_id(transport_id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Transport {} not found", transport_id))
            })?;

        if transport.franchise_id != acting_franchise_id {
            return Err(ServiceError::Forbidden(format!(
                "transport {} belongs to another franchise",
                transport_id
            )));
        }

        // Retried confirmation of an already delivered transport is a no-op.
        if transport.status == TransportStatus::Delivered {
            return Ok((transport, None, false));
        }

        if transport.status != TransportStatus::Dispatched {
            return Err(ServiceError::Conflict(format!(
                "transport {} must be DISPATCHED before DELIVERED (currently {})",
                transport_id, transport.status
            )));
        }

        let sale = sale::Entity::find_by_id(transport.sale_id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Sale {} missing for transport {}",
                    transport.sale_id, transport_id
                ))
            })?;

        let details = sale_detail::Entity::find()
            .filter(sale_detail::Column::SaleId.eq(sale.id))
            .order_by_asc(sale_detail::Column::Id)
            .all(txn)
            .await
            .map_err(ServiceError::db_error)?;
        if details.is_empty() {
            return Err(ServiceError::Conflict(format!(
                "sale {} has no line items to deliver",
                sale.id
            )));
        }

        // All-or-nothing availability check against the central pool before
        // any mutation, aggregated per medicine across the sale's lines.
        let mut required: BTreeMap<i64, i64> = BTreeMap::new();
        for detail in &details {
            *required.entry(detail.medicine_id).or_insert(0) += detail.quantity as i64;
        }

        for (&medicine_id, &needed) in &required {
            let available = admin_stock_balance::Entity::find()
                .filter(admin_stock_balance::Column::MedicineId.eq(medicine_id))
                .one(txn)
                .await
                .map_err(ServiceError::db_error)?
                .map(|row| row.quantity as i64)
                .unwrap_or(0);
            if available < needed {
                return Err(ServiceError::InsufficientStock(format!(
                    "medicine {}: required {}, available {}",
                    medicine_id, needed, available
                )));
            }
        }

        let now = Utc::now();

        for (&medicine_id, &needed) in &required {
            let row = admin_stock_balance::Entity::find()
                .filter(admin_stock_balance::Column::MedicineId.eq(medicine_id))
                .one(txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "admin stock row for medicine {} vanished mid-transaction",
                        medicine_id
                    ))
                })?;
            let new_quantity = row.quantity - needed as i32;
            let mut active: admin_stock_balance::ActiveModel = row.into();
            active.quantity = Set(new_quantity);
            active.updated_at = Set(now);
            active.update(txn).await.map_err(ServiceError::db_error)?;
        }

        // Keep the batch-level pool aligned where the sale line names a batch
        // that exists centrally; availability is enforced per medicine above.
        for detail in &details {
            if let Some(batch) = &detail.batch_number {
                let row = admin_stock_batch_balance::Entity::find()
                    .filter(admin_stock_batch_balance::Column::MedicineId.eq(detail.medicine_id))
                    .filter(admin_stock_batch_balance::Column::BatchNumber.eq(batch.clone()))
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?;
                if let Some(row) = row {
                    let new_quantity = row.quantity - detail.quantity;
                    let mut active: admin_stock_batch_balance::ActiveModel = row.into();
                    active.quantity = Set(new_quantity);
                    active.updated_at = Set(now);
                    active.update(txn).await.map_err(ServiceError::db_error)?;
                }
            }
        }

        let stock_posted_at = transport.stock_posted_at;
        let will_post = stock_posted_at.is_none();

        let update = transport::Entity::update_many()
            .col_expr(
                transport::Column::Status,
                Expr::value(TransportStatus::Delivered),
            )
            .col_expr(transport::Column::DeliveredAt, Expr::value(Some(now)))
            .col_expr(transport::Column::Version, Expr::value(transport.version + 1))
            .col_expr(transport::Column::UpdatedAt, Expr::value(now));
        let update = if will_post {
            update.col_expr(transport::Column::StockPostedAt, Expr::value(Some(now)))
        } else {
            update
        };

        let result = update
            .filter(transport::Column::Id.eq(transport.id))
            .filter(transport::Column::Version.eq(transport.version))
            .exec(txn)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(transport.id));
        }

        // stock_posted_at is the single idempotence guard for the posting:
        // it is only ever set together with the ledger lines, in this
        // transaction.
        let posting = if will_post {
            let tx_row = Self::find_or_create_sale_transaction(txn, sale.id).await?;

            let lines: Vec<LedgerLine> = details
                .iter()
                .map(|detail| LedgerLine {
                    franchise_id: sale.franchise_id,
                    medicine_id: detail.medicine_id,
                    batch_number: detail.batch_number.clone(),
                    expiry_date: detail.expiry_date,
                    qty_change: detail.quantity,
                    rate: detail.rate,
                    amount: detail.amount,
                })
                .collect();

            let line_count = ledger.post_ledger_lines(txn, tx_row.id, &lines).await?;
            Some((tx_row.id, line_count))
        } else {
            None
        };

        let delivered = transport::Entity::find_by_id(transport.id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "transport {} vanished mid-transaction",
                    transport.id
                ))
            })?;

        info!(
            transport_id = delivered.id,
            sale_id = delivered.sale_id,
            franchise_id = delivered.franchise_id,
            posted = posting.is_some(),
            "transport delivered"
        );

        Ok((delivered, posting, true))
    }

    async fn find_or_create_sale_transaction<C: ConnectionTrait>(
        txn: &C,
        sale_id: i64,
    ) -> Result<stock_transaction::Model, ServiceError> {
        let existing = stock_transaction::Entity::find()
            .filter(stock_transaction::Column::SaleId.eq(sale_id))
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?;

        match existing {
            Some(row) => Ok(row),
            None => stock_transaction::ActiveModel {
                sale_id: Set(sale_id),
                kind: Set(stock_transaction::TransactionKind::SaleDelivery),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(txn)
            .await
            .map_err(ServiceError::db_error),
        }
    }

    /// Gets a transport by ID
    #[instrument(skip(self))]
    pub async fn get_transport(
        &self,
        transport_id: i64,
    ) -> Result<Option<transport::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        transport::Entity::find_by_id(transport_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists transports with pagination, optionally filtered by status and
    /// scoped to one franchise.
    #[instrument(skip(self))]
    pub async fn list_transports(
        &self,
        page: u64,
        limit: u64,
        status: Option<TransportStatus>,
        franchise_id: Option<i64>,
    ) -> Result<(Vec<transport::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = transport::Entity::find();
        if let Some(status) = status {
            query = query.filter(transport::Column::Status.eq(status));
        }
        if let Some(franchise_id) = franchise_id {
            query = query.filter(transport::Column::FranchiseId.eq(franchise_id));
        }

        let paginator = query
            .order_by_desc(transport::Column::CreatedAt)
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
