mod common;

use assert_matches::assert_matches;
use common::{days_from_now, seed_franchise, seed_medicine, setup, TestApp};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

use franchise_stock_api::entities::{
    admin_stock_balance, stock_batch_balance, stock_ledger, transport, TransportStatus,
};
use franchise_stock_api::errors::ServiceError;
use franchise_stock_api::services::admin_stock::RefillItem;
use franchise_stock_api::services::sales::{CreateSale, CreateSaleLine};
use franchise_stock_api::services::transports::{CreateTransport, UpdateTransport};

struct DeliveryFixture {
    franchise_id: i64,
    medicine_id: i64,
    transport_id: i64,
}

/// Seeds the worked example: a dispatched transport for a one-line sale of
/// 10 units of batch B1 (+120d), with `pool` units in the central pool.
async fn dispatched_sale(app: &TestApp, pool: i32) -> DeliveryFixture {
    let db = app.db.as_ref();
    let franchise = seed_franchise(db, "F1").await;
    let medicine = seed_medicine(db, "AMOX-500").await;

    if pool > 0 {
        app.services
            .admin_stock
            .refill(vec![RefillItem {
                medicine_id: medicine.id,
                quantity: pool,
                batch_number: "B1".into(),
                expiry_date: days_from_now(120),
            }])
            .await
            .unwrap();
    }

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
            transport_fee: Decimal::new(4500, 1),
            transporter_name: "R. Sharma".into(),
            company_name: "Metro Logistics".into(),
            receipt_number: None,
            vehicle_number: Some("KA-01-AB-1234".into()),
            tracking_number: None,
            notes: None,
        })
        .await
        .unwrap();

    DeliveryFixture {
        franchise_id: franchise.id,
        medicine_id: medicine.id,
        transport_id: transport.id,
    }
}

#[tokio::test]
async fn delivery_posts_stock_exactly_once() {
    let app = setup().await;
    let fx = dispatched_sale(&app, 15).await;
    let db = app.db.as_ref();

    let delivered = app
        .services
        .transports
        .mark_delivered(fx.transport_id, fx.franchise_id)
        .await
        .unwrap();

    assert_eq!(delivered.status, TransportStatus::Delivered);
    assert!(delivered.delivered_at.is_some());
    assert!(delivered.stock_posted_at.is_some());

    // Central pool drawn down 15 -> 5; franchise projections up by 10.
    assert_eq!(
        app.services
            .admin_stock
            .pool_quantity(fx.medicine_id)
            .await
            .unwrap(),
        5
    );
    assert_eq!(
        app.services
            .ledger
            .balance_quantity(fx.franchise_id, fx.medicine_id)
            .await
            .unwrap(),
        10
    );
    let batch = stock_batch_balance::Entity::find()
        .filter(stock_batch_balance::Column::FranchiseId.eq(fx.franchise_id))
        .filter(stock_batch_balance::Column::MedicineId.eq(fx.medicine_id))
        .filter(stock_batch_balance::Column::BatchNumber.eq("B1"))
        .one(db)
        .await
        .unwrap()
        .expect("batch balance row");
    assert_eq!(batch.quantity, 10);

    let ledger_rows = stock_ledger::Entity::find().count(db).await.unwrap();
    assert_eq!(ledger_rows, 1);
}

#[tokio::test]
async fn repeated_delivery_confirmation_is_a_no_op() {
    let app = setup().await;
    let fx = dispatched_sale(&app, 15).await;
    let db = app.db.as_ref();

    let first = app
        .services
        .transports
        .mark_delivered(fx.transport_id, fx.franchise_id)
        .await
        .unwrap();
    let second = app
        .services
        .transports
        .mark_delivered(fx.transport_id, fx.franchise_id)
        .await
        .unwrap();

    // Same stored record, and the ledger/balance effect happened once.
    assert_eq!(first, second);
    assert_eq!(
        stock_ledger::Entity::find().count(db).await.unwrap(),
        1,
        "posting must not be repeated"
    );
    assert_eq!(
        app.services
            .admin_stock
            .pool_quantity(fx.medicine_id)
            .await
            .unwrap(),
        5
    );
    assert_eq!(
        app.services
            .ledger
            .balance_quantity(fx.franchise_id, fx.medicine_id)
            .await
            .unwrap(),
        10
    );
}

#[tokio::test]
async fn insufficient_admin_stock_rejects_without_any_effect() {
    let app = setup().await;
    let fx = dispatched_sale(&app, 3).await;
    let db = app.db.as_ref();

    let pool_before = admin_stock_balance::Entity::find()
        .all(db)
        .await
        .unwrap();
    let transport_before = transport::Entity::find_by_id(fx.transport_id)
        .one(db)
        .await
        .unwrap()
        .unwrap();

    let err = app
        .services
        .transports
        .mark_delivered(fx.transport_id, fx.franchise_id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(ref msg) if msg.contains("required 10"));
    assert_eq!(err.status_code(), http::StatusCode::CONFLICT);

    // Nothing moved: pool, transport, ledger, and balances are untouched.
    let pool_after = admin_stock_balance::Entity::find().all(db).await.unwrap();
    assert_eq!(pool_before, pool_after);

    let transport_after = transport::Entity::find_by_id(fx.transport_id)
        .one(db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transport_before, transport_after);

    assert_eq!(stock_ledger::Entity::find().count(db).await.unwrap(), 0);
    assert_eq!(
        app.services
            .ledger
            .balance_quantity(fx.franchise_id, fx.medicine_id)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn delivery_by_another_franchise_is_forbidden() {
    let app = setup().await;
    let fx = dispatched_sale(&app, 15).await;
    let other = seed_franchise(app.db.as_ref(), "F2").await;

    let err = app
        .services
        .transports
        .mark_delivered(fx.transport_id, other.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));
}

#[tokio::test]
async fn delivery_requires_dispatched_status() {
    let app = setup().await;
    let db = app.db.as_ref();
    let franchise = seed_franchise(db, "F1").await;
    let medicine = seed_medicine(db, "AMOX-500").await;

    let (sale, _) = app
        .services
        .sales
        .create_sale(CreateSale {
            franchise_id: franchise.id,
            sale_number: "S-0002".into(),
            lines: vec![CreateSaleLine {
                medicine_id: medicine.id,
                batch_number: None,
                expiry_date: None,
                quantity: 1,
                rate: Decimal::ONE,
            }],
        })
        .await
        .unwrap();

    let pending = app
        .services
        .transports
        .create_transport(CreateTransport {
            sale_id: sale.id,
            status: TransportStatus::Pending,
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

    let err = app
        .services
        .transports
        .mark_delivered(pending.id, franchise.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(ref msg) if msg.contains("DISPATCHED"));
}

#[tokio::test]
async fn admin_update_cannot_set_delivered_but_can_dispatch() {
    let app = setup().await;
    let db = app.db.as_ref();
    let franchise = seed_franchise(db, "F1").await;
    let medicine = seed_medicine(db, "AMOX-500").await;

    let (sale, _) = app
        .services
        .sales
        .create_sale(CreateSale {
            franchise_id: franchise.id,
            sale_number: "S-0003".into(),
            lines: vec![CreateSaleLine {
                medicine_id: medicine.id,
                batch_number: None,
                expiry_date: None,
                quantity: 2,
                rate: Decimal::ONE,
            }],
        })
        .await
        .unwrap();

    let pending = app
        .services
        .transports
        .create_transport(CreateTransport {
            sale_id: sale.id,
            status: TransportStatus::Pending,
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
    assert!(pending.dispatched_at.is_none());

    // The delivery transition is reserved for the franchise confirmation.
    let err = app
        .services
        .transports
        .update_transport(
            pending.id,
            UpdateTransport {
                status: Some(TransportStatus::Delivered),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    let dispatched = app
        .services
        .transports
        .update_transport(
            pending.id,
            UpdateTransport {
                status: Some(TransportStatus::Dispatched),
                tracking_number: Some("TRK99120".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(dispatched.status, TransportStatus::Dispatched);
    assert!(dispatched.dispatched_at.is_some());
    assert_eq!(dispatched.tracking_number.as_deref(), Some("TRK99120"));

    // Backward moves are conflicts.
    let err = app
        .services
        .transports
        .update_transport(
            pending.id,
            UpdateTransport {
                status: Some(TransportStatus::Pending),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}

#[tokio::test]
async fn a_sale_gets_at_most_one_transport() {
    let app = setup().await;
    let fx = dispatched_sale(&app, 15).await;

    let transport = app
        .services
        .transports
        .get_transport(fx.transport_id)
        .await
        .unwrap()
        .unwrap();

    let err = app
        .services
        .transports
        .create_transport(CreateTransport {
            sale_id: transport.sale_id,
            status: TransportStatus::Pending,
            transport_fee: Decimal::ZERO,
            transporter_name: "Again".into(),
            company_name: "Again Co".into(),
            receipt_number: None,
            vehicle_number: None,
            tracking_number: None,
            notes: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}
