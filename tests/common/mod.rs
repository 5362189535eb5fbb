#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use tokio::sync::mpsc;

use franchise_stock_api::{
    db::{self, DbConfig, DbPool},
    entities::{franchise, medicine, stock_transaction},
    events::{self, EventSender},
    handlers::AppServices,
};

pub struct TestApp {
    pub db: Arc<DbPool>,
    pub services: AppServices,
}

/// Fresh in-memory database with migrations applied. A single-connection
/// pool keeps every query on the same SQLite memory database.
pub async fn setup() -> TestApp {
    let config = DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    };
    let pool = db::establish_connection_with_config(&config)
        .await
        .expect("db connect");
    db::run_migrations(&pool).await.expect("migrations");

    let db = Arc::new(pool);
    let (tx, rx) = mpsc::channel(256);
    tokio::spawn(events::process_events(rx));
    let services = AppServices::new(db.clone(), Arc::new(EventSender::new(tx)));

    TestApp { db, services }
}

pub async fn seed_franchise(db: &DbPool, code: &str) -> franchise::Model {
    franchise::ActiveModel {
        name: Set(format!("Franchise {}", code)),
        code: Set(code.to_string()),
        active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed franchise")
}

pub async fn seed_medicine(db: &DbPool, sku: &str) -> medicine::Model {
    medicine::ActiveModel {
        name: Set(format!("Medicine {}", sku)),
        sku: Set(sku.to_string()),
        unit_price: Set(Decimal::new(125, 1)),
        active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed medicine")
}

/// A stock transaction row to hang ledger lines off in ledger-level tests.
pub async fn seed_transaction(db: &DbPool, sale_id: i64) -> stock_transaction::Model {
    stock_transaction::ActiveModel {
        sale_id: Set(sale_id),
        kind: Set(stock_transaction::TransactionKind::Adjustment),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed transaction")
}

pub fn days_from_now(days: i64) -> NaiveDate {
    Utc::now().date_naive() + Duration::days(days)
}
