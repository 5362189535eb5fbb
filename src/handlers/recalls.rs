use crate::{
    entities::stock_recall,
    errors::ServiceError,
    services::recalls::RecordRecall,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecallListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub franchise_id: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecallView {
    pub id: i64,
    pub franchise_id: i64,
    pub medicine_id: i64,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: i32,
    pub stock_transaction_id: Option<i64>,
    pub notes: Option<String>,
    pub recalled_at: DateTime<Utc>,
}

impl From<stock_recall::Model> for RecallView {
    fn from(model: stock_recall::Model) -> Self {
        Self {
            id: model.id,
            franchise_id: model.franchise_id,
            medicine_id: model.medicine_id,
            batch_number: model.batch_number,
            expiry_date: model.expiry_date,
            quantity: model.quantity,
            stock_transaction_id: model.stock_transaction_id,
            notes: model.notes,
            recalled_at: model.recalled_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "franchise_id": 3,
    "medicine_id": 7,
    "batch_number": "B1",
    "expiry_date": "2026-12-05",
    "quantity": 4,
    "notes": "damaged packaging"
}))]
pub struct RecordRecallRequest {
    pub franchise_id: i64,
    pub medicine_id: i64,
    #[validate(length(min = 1))]
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: i32,
    pub stock_transaction_id: Option<i64>,
    pub notes: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/recalls",
    request_body = RecordRecallRequest,
    responses(
        (status = 201, description = "Recall recorded", body = ApiResponse<RecallView>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Franchise or transaction not found", body = crate::errors::ErrorResponse)
    ),
    tag = "recalls"
)]
pub async fn record_recall(
    State(state): State<AppState>,
    Json(payload): Json<RecordRecallRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let command = RecordRecall {
        franchise_id: payload.franchise_id,
        medicine_id: payload.medicine_id,
        batch_number: payload.batch_number,
        expiry_date: payload.expiry_date,
        quantity: payload.quantity,
        stock_transaction_id: payload.stock_transaction_id,
        notes: payload.notes,
    };

    let created = state.services.recalls.record_recall(command).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(RecallView::from(created))),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/recalls",
    params(RecallListQuery),
    responses(
        (status = 200, description = "Recalls listed", body = ApiResponse<PaginatedResponse<RecallView>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "recalls"
)]
pub async fn list_recalls(
    State(state): State<AppState>,
    Query(query): Query<RecallListQuery>,
) -> ApiResult<PaginatedResponse<RecallView>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let (records, total) = state
        .services
        .recalls
        .list_recalls(page, limit, query.franchise_id)
        .await?;

    let items: Vec<RecallView> = records.into_iter().map(RecallView::from).collect();
    let total_pages = (total + limit - 1) / limit;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    })))
}
