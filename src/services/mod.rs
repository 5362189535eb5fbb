pub mod admin_stock;
pub mod recalls;
pub mod reports;
pub mod sales;
pub mod stock_ledger;
pub mod transports;
