mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{days_from_now, seed_franchise, seed_medicine, setup, TestApp};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

use franchise_stock_api as api;
use franchise_stock_api::auth::{AuthService, Role};
use franchise_stock_api::config::AppConfig;
use franchise_stock_api::entities::TransportStatus;
use franchise_stock_api::services::admin_stock::RefillItem;
use franchise_stock_api::services::sales::{CreateSale, CreateSaleLine};
use franchise_stock_api::services::transports::CreateTransport;

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        jwt_secret: "t".repeat(64),
        jwt_expiration: 3600,
        host: "127.0.0.1".into(),
        port: 0,
        environment: "development".into(),
        log_level: "info".into(),
        log_json: false,
        auto_migrate: false,
        cors_allowed_origins: None,
        cors_allow_any_origin: false,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 30,
        db_idle_timeout_secs: 600,
        db_acquire_timeout_secs: 8,
    }
}

struct TestServer {
    app: TestApp,
    router: Router,
    auth: Arc<AuthService>,
}

async fn server() -> TestServer {
    let app = setup().await;
    let cfg = test_config();
    let auth = Arc::new(AuthService::new(&cfg.jwt_secret, cfg.jwt_expiration));

    let (event_tx, event_rx) = tokio::sync::mpsc::channel(64);
    tokio::spawn(api::events::process_events(event_rx));

    let state = api::AppState {
        db: app.db.clone(),
        config: cfg,
        event_sender: api::events::EventSender::new(event_tx),
        services: app.services.clone(),
    };

    let router = Router::new()
        .nest("/api/v1", api::api_v1_routes())
        .layer(axum::middleware::from_fn_with_state(
            auth.clone(),
            api::auth::auth_context_middleware,
        ))
        .layer(axum::middleware::from_fn(
            api::tracing::request_id_middleware,
        ))
        .with_state(state);

    TestServer { app, router, auth }
}

fn bearer(auth: &AuthService, role: Role, franchise_id: Option<i64>) -> String {
    let token = auth.issue_token("tester", role, franchise_id).unwrap();
    format!("Bearer {}", token)
}

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, token);
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn seed_dispatched_transport(app: &TestApp) -> (i64, i64) {
    let db = app.db.as_ref();
    let franchise = seed_franchise(db, "F1").await;
    let medicine = seed_medicine(db, "AMOX-500").await;

    app.services
        .admin_stock
        .refill(vec![RefillItem {
            medicine_id: medicine.id,
            quantity: 15,
            batch_number: "B1".into(),
            expiry_date: days_from_now(120),
        }])
        .await
        .unwrap();

    let (sale, _) = app
        .services
        .sales
        .create_sale(CreateSale {
            franchise_id: franchise.id,
            sale_number: "S-0001".into(),
            lines: vec![CreateSaleLine {
                medicine_id: medicine.id,
                batch_number: Some("B1".into()),
                expiry_date: Some(days_from_now(120)),
                quantity: 10,
                rate: Decimal::new(125, 1),
            }],
        })
        .await
        .unwrap();

    let transport = app
        .services
        .transports
        .create_transport(CreateTransport {
            sale_id: sale.id,
            status: TransportStatus::Dispatched,
            transport_fee: Decimal::ZERO,
            transporter_name: "R. Sharma".into(),
            company_name: "Metro Logistics".into(),
            receipt_number: None,
            vehicle_number: None,
            tracking_number: None,
            notes: None,
        })
        .await
        .unwrap();

    (transport.id, franchise.id)
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let srv = server().await;
    let (status, _) = send(&srv.router, "GET", "/api/v1/transports", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn franchise_confirms_delivery_via_patch() {
    let srv = server().await;
    let (transport_id, franchise_id) = seed_dispatched_transport(&srv.app).await;
    let token = bearer(&srv.auth, Role::Franchise, Some(franchise_id));

    let (status, body) = send(
        &srv.router,
        "PATCH",
        &format!("/api/v1/transports/{}", transport_id),
        Some(&token),
        Some(json!({"status": "DELIVERED"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "DELIVERED");
    assert!(body["data"]["stock_posted_at"].is_string());
}

#[tokio::test]
async fn franchise_patch_with_carrier_fields_is_rejected() {
    let srv = server().await;
    let (transport_id, franchise_id) = seed_dispatched_transport(&srv.app).await;
    let token = bearer(&srv.auth, Role::Franchise, Some(franchise_id));

    let (status, _) = send(
        &srv.router,
        "PATCH",
        &format!("/api/v1/transports/{}", transport_id),
        Some(&token),
        Some(json!({"status": "DELIVERED", "notes": "sneaky edit"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_patch_cannot_deliver() {
    let srv = server().await;
    let (transport_id, _) = seed_dispatched_transport(&srv.app).await;
    let token = bearer(&srv.auth, Role::Admin, None);

    let (status, _) = send(
        &srv.router,
        "PATCH",
        &format!("/api/v1/transports/{}", transport_id),
        Some(&token),
        Some(json!({"status": "DELIVERED"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn wrong_franchise_gets_forbidden_on_delivery() {
    let srv = server().await;
    let (transport_id, franchise_id) = seed_dispatched_transport(&srv.app).await;
    let token = bearer(&srv.auth, Role::Franchise, Some(franchise_id + 999));

    let (status, _) = send(
        &srv.router,
        "PATCH",
        &format!("/api/v1/transports/{}", transport_id),
        Some(&token),
        Some(json!({"status": "DELIVERED"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn refill_is_admin_only_and_returns_created() {
    let srv = server().await;
    let medicine = seed_medicine(srv.app.db.as_ref(), "AMOX-500").await;

    let payload = json!({
        "items": [{
            "medicine_id": medicine.id,
            "quantity": 100,
            "batch_number": "B1",
            "expiry_date": days_from_now(120).to_string(),
        }]
    });

    let franchise_token = bearer(&srv.auth, Role::Franchise, Some(1));
    let (status, _) = send(
        &srv.router,
        "POST",
        "/api/v1/admin-stocks/refill",
        Some(&franchise_token),
        Some(payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin_token = bearer(&srv.auth, Role::Admin, None);
    let (status, body) = send(
        &srv.router,
        "POST",
        "/api/v1/admin-stocks/refill",
        Some(&admin_token),
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"][0]["quantity"], 100);
}

#[tokio::test]
async fn refill_with_near_expiry_is_bad_request() {
    let srv = server().await;
    let medicine = seed_medicine(srv.app.db.as_ref(), "AMOX-500").await;
    let admin_token = bearer(&srv.auth, Role::Admin, None);

    let (status, body) = send(
        &srv.router,
        "POST",
        "/api/v1/admin-stocks/refill",
        Some(&admin_token),
        Some(json!({
            "items": [{
                "medicine_id": medicine.id,
                "quantity": 100,
                "batch_number": "B90",
                "expiry_date": days_from_now(90).to_string(),
            }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn closing_stock_report_is_scoped_to_the_calling_franchise() {
    let srv = server().await;
    let (transport_id, franchise_id) = seed_dispatched_transport(&srv.app).await;
    srv.app
        .services
        .transports
        .mark_delivered(transport_id, franchise_id)
        .await
        .unwrap();

    let other = seed_franchise(srv.app.db.as_ref(), "F2").await;
    let token = bearer(&srv.auth, Role::Franchise, Some(other.id));
    let (status, body) = send(
        &srv.router,
        "GET",
        "/api/v1/closing-stock-report",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);

    let owner_token = bearer(&srv.auth, Role::Franchise, Some(franchise_id));
    let (status, body) = send(
        &srv.router,
        "GET",
        "/api/v1/closing-stock-report",
        Some(&owner_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["quantity"], 10);
}
