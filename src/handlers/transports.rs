use crate::{
    auth::AuthContext,
    entities::{transport, TransportStatus},
    errors::ServiceError,
    services::transports::{CreateTransport, UpdateTransport},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransportListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Filter by lifecycle status (PENDING, DISPATCHED, DELIVERED)
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 12,
    "sale_id": 40,
    "franchise_id": 3,
    "status": "DISPATCHED",
    "dispatched_at": "2026-08-01T09:00:00Z",
    "delivered_at": null,
    "stock_posted_at": null,
    "transport_fee": "450.0000",
    "transporter_name": "R. Sharma",
    "company_name": "Metro Logistics",
    "receipt_number": "MTR-8841",
    "vehicle_number": "KA-01-AB-1234",
    "tracking_number": "TRK99120",
    "notes": null,
    "created_at": "2026-08-01T08:45:00Z",
    "updated_at": "2026-08-01T09:00:00Z"
}))]
pub struct TransportSummary {
    pub id: i64,
    pub sale_id: i64,
    pub franchise_id: i64,
    pub status: TransportStatus,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub stock_posted_at: Option<DateTime<Utc>>,
    pub transport_fee: Decimal,
    pub transporter_name: String,
    pub company_name: String,
    pub receipt_number: Option<String>,
    pub vehicle_number: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<transport::Model> for TransportSummary {
    fn from(model: transport::Model) -> Self {
        Self {
            id: model.id,
            sale_id: model.sale_id,
            franchise_id: model.franchise_id,
            status: model.status,
            dispatched_at: model.dispatched_at,
            delivered_at: model.delivered_at,
            stock_posted_at: model.stock_posted_at,
            transport_fee: model.transport_fee,
            transporter_name: model.transporter_name,
            company_name: model.company_name,
            receipt_number: model.receipt_number,
            vehicle_number: model.vehicle_number,
            tracking_number: model.tracking_number,
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "sale_id": 40,
    "status": "DISPATCHED",
    "transport_fee": "450.0",
    "transporter_name": "R. Sharma",
    "company_name": "Metro Logistics",
    "vehicle_number": "KA-01-AB-1234"
}))]
pub struct CreateTransportRequest {
    pub sale_id: i64,
    /// Initial status: PENDING or DISPATCHED
    pub status: Option<String>,
    pub transport_fee: Option<Decimal>,
    #[validate(length(min = 1))]
    pub transporter_name: String,
    #[validate(length(min = 1))]
    pub company_name: String,
    pub receipt_number: Option<String>,
    pub vehicle_number: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

/// PATCH body. A franchise caller may only send `{"status": "DELIVERED"}`;
/// an admin may update carrier fields and move the status forward, but never
/// to DELIVERED.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateTransportRequest {
    pub status: Option<String>,
    pub transport_fee: Option<Decimal>,
    pub transporter_name: Option<String>,
    pub company_name: Option<String>,
    pub receipt_number: Option<String>,
    pub vehicle_number: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

impl UpdateTransportRequest {
    fn has_non_status_fields(&self) -> bool {
        self.transport_fee.is_some()
            || self.transporter_name.is_some()
            || self.company_name.is_some()
            || self.receipt_number.is_some()
            || self.vehicle_number.is_some()
            || self.tracking_number.is_some()
            || self.notes.is_some()
    }
}

fn parse_status(value: &str) -> Result<TransportStatus, ServiceError> {
    value.parse::<TransportStatus>().map_err(|_| {
        ServiceError::ValidationError(format!("unsupported transport status '{}'", value))
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/transports",
    params(TransportListQuery),
    responses(
        (status = 200, description = "Transports listed", body = ApiResponse<PaginatedResponse<TransportSummary>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "transports"
)]
pub async fn list_transports(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<TransportListQuery>,
) -> ApiResult<PaginatedResponse<TransportSummary>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let status = query.status.as_deref().map(parse_status).transpose()?;

    // Franchise callers only see their own transports.
    let franchise_scope = if ctx.is_admin() {
        None
    } else {
        Some(ctx.require_franchise()?)
    };

    let (records, total) = state
        .services
        .transports
        .list_transports(page, limit, status, franchise_scope)
        .await?;

    let items: Vec<TransportSummary> = records.into_iter().map(TransportSummary::from).collect();
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
    path = "/api/v1/transports/{id}",
    params(("id" = i64, Path, description = "Transport ID")),
    responses(
        (status = 200, description = "Transport fetched", body = ApiResponse<TransportSummary>),
        (status = 404, description = "Transport not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transports"
)]
pub async fn get_transport(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> ApiResult<TransportSummary> {
    let transport = state
        .services
        .transports
        .get_transport(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Transport {} not found", id)))?;

    if !ctx.is_admin() && transport.franchise_id != ctx.require_franchise()? {
        return Err(ServiceError::Forbidden(format!(
            "transport {} belongs to another franchise",
            id
        )));
    }

    Ok(Json(ApiResponse::success(TransportSummary::from(
        transport,
    ))))
}

#[utoipa::path(
    post,
    path = "/api/v1/transports",
    request_body = CreateTransportRequest,
    responses(
        (status = 201, description = "Transport created", body = ApiResponse<TransportSummary>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Sale not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Sale already has a transport", body = crate::errors::ErrorResponse)
    ),
    tag = "transports"
)]
pub async fn create_transport(
    State(state): State<AppState>,
    Json(payload): Json<CreateTransportRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let status = match payload.status.as_deref() {
        Some(raw) => parse_status(raw)?,
        None => TransportStatus::Pending,
    };

    let command = CreateTransport {
        sale_id: payload.sale_id,
        status,
        transport_fee: payload.transport_fee.unwrap_or_default(),
        transporter_name: payload.transporter_name,
        company_name: payload.company_name,
        receipt_number: payload.receipt_number,
        vehicle_number: payload.vehicle_number,
        tracking_number: payload.tracking_number,
        notes: payload.notes,
    };

    let created = state.services.transports.create_transport(command).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(TransportSummary::from(created))),
    ))
}

#[utoipa::path(
    patch,
    path = "/api/v1/transports/{id}",
    params(("id" = i64, Path, description = "Transport ID")),
    request_body = UpdateTransportRequest,
    responses(
        (status = 200, description = "Transport updated", body = ApiResponse<TransportSummary>),
        (status = 400, description = "Invalid request for caller role", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Transport or sale not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Wrong current status or insufficient admin stock", body = crate::errors::ErrorResponse)
    ),
    tag = "transports"
)]
pub async fn update_transport(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTransportRequest>,
) -> ApiResult<TransportSummary> {
    let updated = if ctx.is_admin() {
        let status = payload.status.as_deref().map(parse_status).transpose()?;
        let command = UpdateTransport {
            transport_fee: payload.transport_fee,
            transporter_name: payload.transporter_name,
            company_name: payload.company_name,
            receipt_number: payload.receipt_number,
            vehicle_number: payload.vehicle_number,
            tracking_number: payload.tracking_number,
            notes: payload.notes,
            status,
        };
        state.services.transports.update_transport(id, command).await?
    } else {
        // Franchise path: the only accepted instruction is the delivery
        // confirmation.
        if payload.has_non_status_fields() {
            return Err(ServiceError::ValidationError(
                "franchise callers may only confirm delivery".into(),
            ));
        }
        match payload.status.as_deref().map(parse_status).transpose()? {
            Some(TransportStatus::Delivered) => {}
            _ => {
                return Err(ServiceError::ValidationError(
                    "franchise callers may only set status to DELIVERED".into(),
                ))
            }
        }

        let franchise_id = ctx.require_franchise()?;
        state
            .services
            .transports
            .mark_delivered(id, franchise_id)
            .await?
    };

    Ok(Json(ApiResponse::success(TransportSummary::from(updated))))
}
