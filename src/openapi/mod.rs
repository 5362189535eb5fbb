use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Franchise Stock API",
        version = "0.1.0",
        description = r#"
# Franchise Stock API

Back-office inventory service for a pharmacy franchise network.

- **Stock ledger**: append-only log of quantity changes, the source of truth
  for inventory; balance tables are derived projections.
- **Transports**: dispatch → delivery lifecycle of a sale's goods; the
  delivery confirmation posts ledger lines exactly once.
- **Admin stock**: central pool refilled batch-by-batch and drawn down at
  delivery time.
- **Recalls**: audit trail for batches pulled back from franchises.

## Authentication

All endpoints require a JWT bearer token:

```
Authorization: Bearer <token>
```

Tokens carry a `role` claim (`admin` or `franchise`); franchise tokens also
carry the `franchise_id` they act for.

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 20, max 100).
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "sales", description = "Sale capture and lookup"),
        (name = "transports", description = "Transport lifecycle and delivery confirmation"),
        (name = "admin-stocks", description = "Central stock pool"),
        (name = "recalls", description = "Stock recall audit trail"),
        (name = "reports", description = "Balance projections"),
    ),
    paths(
        handlers::sales::create_sale,
        handlers::sales::list_sales,
        handlers::sales::get_sale,
        handlers::transports::create_transport,
        handlers::transports::list_transports,
        handlers::transports::get_transport,
        handlers::transports::update_transport,
        handlers::admin_stocks::refill,
        handlers::admin_stocks::list_rows,
        handlers::admin_stocks::get_pool_quantity,
        handlers::recalls::record_recall,
        handlers::recalls::list_recalls,
        handlers::reports::closing_stock_report,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        handlers::sales::CreateSaleRequest,
        handlers::sales::CreateSaleLineRequest,
        handlers::sales::SaleSummary,
        handlers::sales::SaleLineView,
        handlers::sales::SaleView,
        handlers::transports::CreateTransportRequest,
        handlers::transports::UpdateTransportRequest,
        handlers::transports::TransportSummary,
        handlers::admin_stocks::RefillRequest,
        handlers::admin_stocks::RefillItemRequest,
        handlers::admin_stocks::AdminStockRow,
        handlers::admin_stocks::PoolQuantity,
        handlers::recalls::RecordRecallRequest,
        handlers::recalls::RecallView,
        handlers::reports::ClosingStockRow,
        crate::entities::TransportStatus,
    ))
)]
pub struct ApiDoc;

/// Swagger UI mounted at `/docs`, serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
