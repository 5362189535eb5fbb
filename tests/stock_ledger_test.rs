mod common;

use chrono::NaiveDate;
use common::{days_from_now, seed_franchise, seed_medicine, seed_transaction, setup};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

use franchise_stock_api::entities::{stock_balance, stock_batch_balance};
use franchise_stock_api::services::stock_ledger::LedgerLine;

fn line(
    franchise_id: i64,
    medicine_id: i64,
    batch: Option<(&str, NaiveDate)>,
    qty_change: i32,
) -> LedgerLine {
    LedgerLine {
        franchise_id,
        medicine_id,
        batch_number: batch.map(|(b, _)| b.to_string()),
        expiry_date: batch.map(|(_, expiry)| expiry),
        qty_change,
        rate: Decimal::new(125, 1),
        amount: Decimal::new(125, 1) * Decimal::from(qty_change),
    }
}

#[tokio::test]
async fn balances_track_ledger_sums_across_interleaved_postings() {
    let app = setup().await;
    let db = app.db.as_ref();

    let f1 = seed_franchise(db, "F1").await;
    let f2 = seed_franchise(db, "F2").await;
    let m1 = seed_medicine(db, "AMOX-500").await;
    let m2 = seed_medicine(db, "PARA-650").await;

    let tx1 = seed_transaction(db, 101).await;
    let tx2 = seed_transaction(db, 102).await;
    let tx3 = seed_transaction(db, 103).await;

    let ledger = &app.services.ledger;
    let b1_expiry = days_from_now(120);

    // Interleave appends across keys and transactions, including a negative
    // reversal on the batched key.
    ledger
        .post_ledger_lines(
            db,
            tx1.id,
            &[
                line(f1.id, m1.id, Some(("B1", b1_expiry)), 10),
                line(f1.id, m2.id, None, 7),
            ],
        )
        .await
        .unwrap();
    ledger
        .post_ledger_lines(
            db,
            tx2.id,
            &[line(f2.id, m1.id, Some(("B9", days_from_now(200))), 4)],
        )
        .await
        .unwrap();
    ledger
        .post_ledger_lines(
            db,
            tx3.id,
            &[
                line(f1.id, m1.id, Some(("B1", b1_expiry)), -3),
                line(f1.id, m1.id, None, 5),
            ],
        )
        .await
        .unwrap();

    // StockBalance.quantity == sum(qty_change) for every key.
    assert_eq!(ledger.balance_quantity(f1.id, m1.id).await.unwrap(), 12);
    assert_eq!(ledger.balance_quantity(f1.id, m2.id).await.unwrap(), 7);
    assert_eq!(ledger.balance_quantity(f2.id, m1.id).await.unwrap(), 4);

    // Batch-level projection tracks only lines carrying batch + expiry.
    let batch = stock_batch_balance::Entity::find()
        .filter(stock_batch_balance::Column::FranchiseId.eq(f1.id))
        .filter(stock_batch_balance::Column::MedicineId.eq(m1.id))
        .filter(stock_batch_balance::Column::BatchNumber.eq("B1"))
        .one(db)
        .await
        .unwrap()
        .expect("batch balance row");
    assert_eq!(batch.quantity, 7);
}

#[tokio::test]
async fn balance_may_pass_through_zero_and_go_negative_without_failing() {
    let app = setup().await;
    let db = app.db.as_ref();

    let f = seed_franchise(db, "F1").await;
    let m = seed_medicine(db, "AMOX-500").await;
    let tx = seed_transaction(db, 201).await;

    let ledger = &app.services.ledger;
    ledger
        .post_ledger_lines(db, tx.id, &[line(f.id, m.id, None, 5)])
        .await
        .unwrap();
    ledger
        .post_ledger_lines(db, tx.id, &[line(f.id, m.id, None, -5)])
        .await
        .unwrap();
    assert_eq!(ledger.balance_quantity(f.id, m.id).await.unwrap(), 0);

    // A second reversal drives the balance negative; the append path records
    // it (it signals an upstream bug) rather than erroring.
    ledger
        .post_ledger_lines(db, tx.id, &[line(f.id, m.id, None, -2)])
        .await
        .unwrap();
    assert_eq!(ledger.balance_quantity(f.id, m.id).await.unwrap(), -2);
}

#[tokio::test]
async fn rebuild_restores_drifted_balances_from_the_ledger() {
    let app = setup().await;
    let db = app.db.as_ref();

    let f = seed_franchise(db, "F1").await;
    let m1 = seed_medicine(db, "AMOX-500").await;
    let m2 = seed_medicine(db, "PARA-650").await;
    let tx = seed_transaction(db, 301).await;

    let ledger = &app.services.ledger;
    ledger
        .post_ledger_lines(
            db,
            tx.id,
            &[
                line(f.id, m1.id, Some(("B1", days_from_now(120))), 10),
                line(f.id, m2.id, None, 6),
            ],
        )
        .await
        .unwrap();

    // Corrupt the projection the way a buggy writer would.
    let row = stock_balance::Entity::find()
        .filter(stock_balance::Column::FranchiseId.eq(f.id))
        .filter(stock_balance::Column::MedicineId.eq(m1.id))
        .one(db)
        .await
        .unwrap()
        .unwrap();
    let mut active: stock_balance::ActiveModel = row.into();
    active.quantity = Set(999);
    active.update(db).await.unwrap();

    let summary = ledger.rebuild_balances().await.unwrap();
    assert_eq!(summary.ledger_rows, 2);
    assert_eq!(summary.balance_rows, 2);
    assert_eq!(summary.batch_rows, 1);

    assert_eq!(ledger.balance_quantity(f.id, m1.id).await.unwrap(), 10);
    assert_eq!(ledger.balance_quantity(f.id, m2.id).await.unwrap(), 6);
}

#[tokio::test]
async fn rebuild_is_idempotent_and_drops_zero_sum_keys() {
    let app = setup().await;
    let db = app.db.as_ref();

    let f = seed_franchise(db, "F1").await;
    let m1 = seed_medicine(db, "AMOX-500").await;
    let m2 = seed_medicine(db, "PARA-650").await;
    let tx = seed_transaction(db, 401).await;

    let ledger = &app.services.ledger;
    ledger
        .post_ledger_lines(
            db,
            tx.id,
            &[
                line(f.id, m1.id, None, 8),
                // Nets to zero; the rebuild writes only non-zero results.
                line(f.id, m2.id, None, 5),
                line(f.id, m2.id, None, -5),
            ],
        )
        .await
        .unwrap();

    let first = ledger.rebuild_balances().await.unwrap();
    let rows_after_first: Vec<(i64, i64, i32)> = stock_balance::Entity::find()
        .all(db)
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.franchise_id, r.medicine_id, r.quantity))
        .collect();

    let second = ledger.rebuild_balances().await.unwrap();
    let rows_after_second: Vec<(i64, i64, i32)> = stock_balance::Entity::find()
        .all(db)
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.franchise_id, r.medicine_id, r.quantity))
        .collect();

    assert_eq!(first, second);
    assert_eq!(rows_after_first, rows_after_second);
    assert_eq!(rows_after_first, vec![(f.id, m1.id, 8)]);
}
