pub mod admin_stocks;
pub mod recalls;
pub mod reports;
pub mod sales;
pub mod transports;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub ledger: services::stock_ledger::StockLedgerService,
    pub sales: Arc<services::sales::SaleService>,
    pub transports: Arc<services::transports::TransportService>,
    pub admin_stock: Arc<services::admin_stock::AdminStockService>,
    pub recalls: Arc<services::recalls::RecallService>,
    pub reports: Arc<services::reports::ReportService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        let ledger = services::stock_ledger::StockLedgerService::new(db_pool.clone());

        let sales = Arc::new(services::sales::SaleService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let transports = Arc::new(services::transports::TransportService::new(
            db_pool.clone(),
            event_sender.clone(),
            ledger.clone(),
        ));
        let admin_stock = Arc::new(services::admin_stock::AdminStockService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let recalls = Arc::new(services::recalls::RecallService::new(
            db_pool.clone(),
            event_sender,
        ));
        let reports = Arc::new(services::reports::ReportService::new(db_pool));

        Self {
            ledger,
            sales,
            transports,
            admin_stock,
            recalls,
            reports,
        }
    }
}
