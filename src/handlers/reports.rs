use crate::{
    auth::AuthContext,
    entities::stock_balance,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ClosingStockQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub franchise_id: Option<i64>,
    pub medicine_id: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClosingStockRow {
    pub franchise_id: i64,
    pub medicine_id: i64,
    pub quantity: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<stock_balance::Model> for ClosingStockRow {
    fn from(model: stock_balance::Model) -> Self {
        Self {
            franchise_id: model.franchise_id,
            medicine_id: model.medicine_id,
            quantity: model.quantity,
            updated_at: model.updated_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/closing-stock-report",
    params(ClosingStockQuery),
    responses(
        (status = 200, description = "Closing stock per franchise and medicine", body = ApiResponse<PaginatedResponse<ClosingStockRow>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "reports"
)]
pub async fn closing_stock_report(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<ClosingStockQuery>,
) -> ApiResult<PaginatedResponse<ClosingStockRow>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    // Franchise callers only see their own closing stock.
    let franchise_scope = if ctx.is_admin() {
        query.franchise_id
    } else {
        Some(ctx.require_franchise()?)
    };

    let (rows, total) = state
        .services
        .reports
        .closing_stock(page, limit, franchise_scope, query.medicine_id)
        .await?;

    let items: Vec<ClosingStockRow> = rows.into_iter().map(ClosingStockRow::from).collect();
    let total_pages = (total + limit - 1) / limit;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    })))
}
