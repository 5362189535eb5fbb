use crate::{
    auth::AuthContext,
    entities::{sale, sale_detail},
    errors::ServiceError,
    services::sales::{CreateSale, CreateSaleLine},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SaleListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub franchise_id: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaleLineView {
    pub id: i64,
    pub medicine_id: i64,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub quantity: i32,
    pub rate: Decimal,
    pub amount: Decimal,
}

impl From<sale_detail::Model> for SaleLineView {
    fn from(model: sale_detail::Model) -> Self {
        Self {
            id: model.id,
            medicine_id: model.medicine_id,
            batch_number: model.batch_number,
            expiry_date: model.expiry_date,
            quantity: model.quantity,
            rate: model.rate,
            amount: model.amount,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaleSummary {
    pub id: i64,
    pub franchise_id: i64,
    pub sale_number: String,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<sale::Model> for SaleSummary {
    fn from(model: sale::Model) -> Self {
        Self {
            id: model.id,
            franchise_id: model.franchise_id,
            sale_number: model.sale_number,
            total_amount: model.total_amount,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaleView {
    #[serde(flatten)]
    pub summary: SaleSummary,
    pub lines: Vec<SaleLineView>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateSaleLineRequest {
    pub medicine_id: i64,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub quantity: i32,
    pub rate: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "franchise_id": 3,
    "sale_number": "S-2026-0040",
    "lines": [
        {"medicine_id": 7, "batch_number": "B1", "expiry_date": "2026-12-05", "quantity": 10, "rate": "12.5"}
    ]
}))]
pub struct CreateSaleRequest {
    pub franchise_id: i64,
    #[validate(length(min = 1))]
    pub sale_number: String,
    #[validate(length(min = 1))]
    pub lines: Vec<CreateSaleLineRequest>,
}

#[utoipa::path(
    post,
    path = "/api/v1/sales",
    request_body = CreateSaleRequest,
    responses(
        (status = 201, description = "Sale created", body = ApiResponse<SaleView>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Franchise or medicine not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Sale number already exists", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn create_sale(
    State(state): State<AppState>,
    Json(payload): Json<CreateSaleRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let command = CreateSale {
        franchise_id: payload.franchise_id,
        sale_number: payload.sale_number,
        lines: payload
            .lines
            .into_iter()
            .map(|line| CreateSaleLine {
                medicine_id: line.medicine_id,
                batch_number: line.batch_number,
                expiry_date: line.expiry_date,
                quantity: line.quantity,
                rate: line.rate,
            })
            .collect(),
    };

    let (created, details) = state.services.sales.create_sale(command).await?;

    let view = SaleView {
        summary: SaleSummary::from(created),
        lines: details.into_iter().map(SaleLineView::from).collect(),
    };

    Ok((StatusCode::CREATED, Json(ApiResponse::success(view))))
}

#[utoipa::path(
    get,
    path = "/api/v1/sales",
    params(SaleListQuery),
    responses(
        (status = 200, description = "Sales listed", body = ApiResponse<PaginatedResponse<SaleSummary>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn list_sales(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<SaleListQuery>,
) -> ApiResult<PaginatedResponse<SaleSummary>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let franchise_scope = if ctx.is_admin() {
        query.franchise_id
    } else {
        Some(ctx.require_franchise()?)
    };

    let (records, total) = state
        .services
        .sales
        .list_sales(page, limit, franchise_scope)
        .await?;

    let items: Vec<SaleSummary> = records.into_iter().map(SaleSummary::from).collect();
    let total_pages = (total + limit - 1) / limit;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/sales/{id}",
    params(("id" = i64, Path, description = "Sale ID")),
    responses(
        (status = 200, description = "Sale fetched", body = ApiResponse<SaleView>),
        (status = 404, description = "Sale not found", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn get_sale(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> ApiResult<SaleView> {
    let (header, details) = state
        .services
        .sales
        .get_sale(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", id)))?;

    if !ctx.is_admin() && header.franchise_id != ctx.require_franchise()? {
        return Err(ServiceError::Forbidden(format!(
            "sale {} belongs to another franchise",
            id
        )));
    }

    let view = SaleView {
        summary: SaleSummary::from(header),
        lines: details.into_iter().map(SaleLineView::from).collect(),
    };

    Ok(Json(ApiResponse::success(view)))
}
