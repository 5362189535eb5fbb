mod common;

use assert_matches::assert_matches;
use common::{days_from_now, seed_medicine, setup};
use sea_orm::EntityTrait;
use sea_orm::PaginatorTrait;

use franchise_stock_api::entities::{admin_stock_balance, admin_stock_batch_balance};
use franchise_stock_api::errors::ServiceError;
use franchise_stock_api::services::admin_stock::RefillItem;

fn item(medicine_id: i64, quantity: i32, batch: &str, days_out: i64) -> RefillItem {
    RefillItem {
        medicine_id,
        quantity,
        batch_number: batch.into(),
        expiry_date: days_from_now(days_out),
    }
}

#[tokio::test]
async fn expiry_exactly_90_days_out_is_rejected_91_accepted() {
    let app = setup().await;
    let medicine = seed_medicine(app.db.as_ref(), "AMOX-500").await;

    let err = app
        .services
        .admin_stock
        .refill(vec![item(medicine.id, 50, "B90", 90)])
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);

    let rows = app
        .services
        .admin_stock
        .refill(vec![item(medicine.id, 50, "B91", 91)])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].quantity, 50);
}

#[tokio::test]
async fn duplicate_batch_within_one_request_is_rejected() {
    let app = setup().await;
    let medicine = seed_medicine(app.db.as_ref(), "AMOX-500").await;

    let err = app
        .services
        .admin_stock
        .refill(vec![
            item(medicine.id, 10, "B1", 120),
            item(medicine.id, 20, "B1", 120),
        ])
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(ref msg) if msg.contains("B1"));

    // All-or-nothing: the valid first item was not applied either.
    assert_eq!(
        admin_stock_batch_balance::Entity::find()
            .count(app.db.as_ref())
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn same_batch_number_for_different_medicines_is_allowed() {
    let app = setup().await;
    let db = app.db.as_ref();
    let m1 = seed_medicine(db, "AMOX-500").await;
    let m2 = seed_medicine(db, "PARA-650").await;

    let rows = app
        .services
        .admin_stock
        .refill(vec![item(m1.id, 10, "B1", 120), item(m2.id, 20, "B1", 120)])
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn existing_batch_with_different_expiry_conflicts() {
    let app = setup().await;
    let medicine = seed_medicine(app.db.as_ref(), "AMOX-500").await;

    app.services
        .admin_stock
        .refill(vec![item(medicine.id, 10, "B1", 120)])
        .await
        .unwrap();

    let err = app
        .services
        .admin_stock
        .refill(vec![item(medicine.id, 5, "B1", 150)])
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
    assert_eq!(err.status_code(), http::StatusCode::CONFLICT);

    // Same batch with the same expiry increments instead.
    let rows = app
        .services
        .admin_stock
        .refill(vec![item(medicine.id, 5, "B1", 120)])
        .await
        .unwrap();
    assert_eq!(rows[0].quantity, 15);
}

#[tokio::test]
async fn refill_accumulates_medicine_level_totals() {
    let app = setup().await;
    let db = app.db.as_ref();
    let medicine = seed_medicine(db, "AMOX-500").await;

    app.services
        .admin_stock
        .refill(vec![
            item(medicine.id, 10, "B1", 120),
            item(medicine.id, 20, "B2", 150),
        ])
        .await
        .unwrap();

    assert_eq!(
        app.services
            .admin_stock
            .pool_quantity(medicine.id)
            .await
            .unwrap(),
        30
    );

    // One medicine-level row, two batch rows.
    assert_eq!(
        admin_stock_balance::Entity::find().count(db).await.unwrap(),
        1
    );
    assert_eq!(
        admin_stock_batch_balance::Entity::find()
            .count(db)
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn non_positive_quantities_and_empty_requests_are_rejected() {
    let app = setup().await;
    let medicine = seed_medicine(app.db.as_ref(), "AMOX-500").await;

    let err = app.services.admin_stock.refill(vec![]).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = app
        .services
        .admin_stock
        .refill(vec![item(medicine.id, 0, "B1", 120)])
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn list_rows_paginates_the_batch_pool() {
    let app = setup().await;
    let db = app.db.as_ref();
    let m1 = seed_medicine(db, "AMOX-500").await;
    let m2 = seed_medicine(db, "PARA-650").await;

    app.services
        .admin_stock
        .refill(vec![
            item(m1.id, 10, "B1", 120),
            item(m1.id, 20, "B2", 150),
            item(m2.id, 5, "C1", 200),
        ])
        .await
        .unwrap();

    let (rows, total) = app
        .services
        .admin_stock
        .list_rows(1, 2, None)
        .await
        .unwrap();
    assert_eq!(total, 3);
    assert_eq!(rows.len(), 2);

    let (m1_rows, m1_total) = app
        .services
        .admin_stock
        .list_rows(1, 10, Some(m1.id))
        .await
        .unwrap();
    assert_eq!(m1_total, 2);
    assert!(m1_rows.iter().all(|r| r.medicine_id == m1.id));
}
