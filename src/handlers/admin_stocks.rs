use crate::{
    entities::admin_stock_batch_balance,
    errors::ServiceError,
    services::admin_stock::RefillItem,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefillItemRequest {
    pub medicine_id: i64,
    pub quantity: i32,
    pub batch_number: String,
    /// Must be more than 90 days in the future.
    pub expiry_date: NaiveDate,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "items": [
        {"medicine_id": 7, "quantity": 100, "batch_number": "B1", "expiry_date": "2027-02-01"}
    ]
}))]
pub struct RefillRequest {
    #[validate(length(min = 1))]
    pub items: Vec<RefillItemRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminStockRow {
    pub id: i64,
    pub medicine_id: i64,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<admin_stock_batch_balance::Model> for AdminStockRow {
    fn from(model: admin_stock_batch_balance::Model) -> Self {
        Self {
            id: model.id,
            medicine_id: model.medicine_id,
            batch_number: model.batch_number,
            expiry_date: model.expiry_date,
            quantity: model.quantity,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminStockListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub medicine_id: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/api/v1/admin-stocks/refill",
    request_body = RefillRequest,
    responses(
        (status = 201, description = "Central pool refilled", body = ApiResponse<Vec<AdminStockRow>>),
        (status = 400, description = "Invalid item (expiry too soon, duplicate batch)", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Batch number collision with different expiry", body = crate::errors::ErrorResponse)
    ),
    tag = "admin-stocks"
)]
pub async fn refill(
    State(state): State<AppState>,
    Json(payload): Json<RefillRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let items: Vec<RefillItem> = payload
        .items
        .into_iter()
        .map(|item| RefillItem {
            medicine_id: item.medicine_id,
            quantity: item.quantity,
            batch_number: item.batch_number,
            expiry_date: item.expiry_date,
        })
        .collect();

    let rows = state.services.admin_stock.refill(items).await?;
    let rows: Vec<AdminStockRow> = rows.into_iter().map(AdminStockRow::from).collect();

    Ok((StatusCode::CREATED, Json(ApiResponse::success(rows))))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin-stocks/rows",
    params(AdminStockListQuery),
    responses(
        (status = 200, description = "Batch-level pool rows", body = ApiResponse<PaginatedResponse<AdminStockRow>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "admin-stocks"
)]
pub async fn list_rows(
    State(state): State<AppState>,
    Query(query): Query<AdminStockListQuery>,
) -> ApiResult<PaginatedResponse<AdminStockRow>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let (rows, total) = state
        .services
        .admin_stock
        .list_rows(page, limit, query.medicine_id)
        .await?;

    let items: Vec<AdminStockRow> = rows.into_iter().map(AdminStockRow::from).collect();
    let total_pages = (total + limit - 1) / limit;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    })))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PoolQuantity {
    pub medicine_id: i64,
    pub quantity: i32,
}

#[utoipa::path(
    get,
    path = "/api/v1/admin-stocks/{medicine_id}",
    params(("medicine_id" = i64, Path, description = "Medicine ID")),
    responses(
        (status = 200, description = "Pool quantity for one medicine", body = ApiResponse<PoolQuantity>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "admin-stocks"
)]
pub async fn get_pool_quantity(
    State(state): State<AppState>,
    Path(medicine_id): Path<i64>,
) -> ApiResult<PoolQuantity> {
    let quantity = state.services.admin_stock.pool_quantity(medicine_id).await?;
    Ok(Json(ApiResponse::success(PoolQuantity {
        medicine_id,
        quantity,
    })))
}
