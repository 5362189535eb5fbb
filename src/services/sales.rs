use crate::{
    db::DbPool,
    entities::{franchise, medicine, sale, sale_detail},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct CreateSaleLine {
    pub medicine_id: i64,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub quantity: i32,
    pub rate: Decimal,
}

#[derive(Debug, Clone)]
pub struct CreateSale {
    pub franchise_id: i64,
    pub sale_number: String,
    pub lines: Vec<CreateSaleLine>,
}

/// Sales are written once and then serve as the immutable read source for
/// delivery posting.
#[derive(Clone)]
pub struct SaleService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl SaleService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, command), fields(franchise_id = command.franchise_id))]
    pub async fn create_sale(
        &self,
        command: CreateSale,
    ) -> Result<(sale::Model, Vec<sale_detail::Model>), ServiceError> {
        if command.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "a sale requires at least one line item".into(),
            ));
        }
        for line in &command.lines {
            if line.quantity <= 0 {
                return Err(ServiceError::ValidationError(format!(
                    "quantity for medicine {} must be positive",
                    line.medicine_id
                )));
            }
            if line.batch_number.is_some() != line.expiry_date.is_some() {
                return Err(ServiceError::ValidationError(format!(
                    "medicine {}: batch number and expiry date must be given together",
                    line.medicine_id
                )));
            }
        }

        let db = self.db_pool.as_ref();

        franchise::Entity::find_by_id(command.franchise_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Franchise {} not found", command.franchise_id))
            })?;

        for line in &command.lines {
            medicine::Entity::find_by_id(line.medicine_id)
                .one(db)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Medicine {} not found", line.medicine_id))
                })?;
        }

        let existing = sale::Entity::find()
            .filter(sale::Column::SaleNumber.eq(command.sale_number.clone()))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "sale number {} already exists",
                command.sale_number
            )));
        }

        let total_amount: Decimal = command
            .lines
            .iter()
            .map(|l| l.rate * Decimal::from(l.quantity))
            .sum();

        let (created, details) = self
            .db_pool
            .transaction::<_, (sale::Model, Vec<sale_detail::Model>), ServiceError>(move |txn| {
                Box::pin(async move {
                    let created = sale::ActiveModel {
                        franchise_id: Set(command.franchise_id),
                        sale_number: Set(command.sale_number.clone()),
                        total_amount: Set(total_amount),
                        created_at: Set(Utc::now()),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    let mut details = Vec::with_capacity(command.lines.len());
                    for line in command.lines {
                        let amount = line.rate * Decimal::from(line.quantity);
                        let detail = sale_detail::ActiveModel {
                            sale_id: Set(created.id),
                            medicine_id: Set(line.medicine_id),
                            batch_number: Set(line.batch_number),
                            expiry_date: Set(line.expiry_date),
                            quantity: Set(line.quantity),
                            rate: Set(line.rate),
                            amount: Set(amount),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                        details.push(detail);
                    }

                    Ok((created, details))
                })
            })
            .await
            .map_err(|e| match e {
                sea_orm::TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                sea_orm::TransactionError::Transaction(service_err) => service_err,
            })?;

        self.event_sender
            .send_or_log(Event::SaleCreated {
                sale_id: created.id,
                franchise_id: created.franchise_id,
            })
            .await;

        Ok((created, details))
    }

    /// Gets a sale with its line items.
    #[instrument(skip(self))]
    pub async fn get_sale(
        &self,
        sale_id: i64,
    ) -> Result<Option<(sale::Model, Vec<sale_detail::Model>)>, ServiceError> {
        let db = self.db_pool.as_ref();

        let Some(header) = sale::Entity::find_by_id(sale_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
        else {
            return Ok(None);
        };

        let details = sale_detail::Entity::find()
            .filter(sale_detail::Column::SaleId.eq(sale_id))
            .order_by_asc(sale_detail::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(Some((header, details)))
    }

    /// Lists sales with pagination, optionally scoped to one franchise.
    #[instrument(skip(self))]
    pub async fn list_sales(
        &self,
        page: u64,
        limit: u64,
        franchise_id: Option<i64>,
    ) -> Result<(Vec<sale::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = sale::Entity::find();
        if let Some(franchise_id) = franchise_id {
            query = query.filter(sale::Column::FranchiseId.eq(franchise_id));
        }

        let paginator = query
            .order_by_desc(sale::Column::CreatedAt)
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
