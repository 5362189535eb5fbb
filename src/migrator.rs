use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_franchises_table::Migration),
            Box::new(m20250101_000002_create_medicines_table::Migration),
            Box::new(m20250101_000003_create_sales_tables::Migration),
            Box::new(m20250101_000004_create_transports_table::Migration),
            Box::new(m20250101_000005_create_stock_ledger_tables::Migration),
            Box::new(m20250101_000006_create_stock_balance_tables::Migration),
            Box::new(m20250101_000007_create_admin_stock_tables::Migration),
            Box::new(m20250101_000008_create_stock_recalls_table::Migration),
        ]
    }
}

// Migration implementations

mod m20250101_000001_create_franchises_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_franchises_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Franchises::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Franchises::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Franchises::Name).string().not_null())
                        .col(
                            ColumnDef::new(Franchises::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Franchises::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Franchises::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Franchises::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Franchises {
        Table,
        Id,
        Name,
        Code,
        Active,
        CreatedAt,
    }
}

mod m20250101_000002_create_medicines_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_medicines_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Medicines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Medicines::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Medicines::Name).string().not_null())
                        .col(
                            ColumnDef::new(Medicines::Sku)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Medicines::UnitPrice)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Medicines::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Medicines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Medicines::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Medicines {
        Table,
        Id,
        Name,
        Sku,
        UnitPrice,
        Active,
        CreatedAt,
    }
}

mod m20250101_000003_create_sales_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_sales_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sales::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Sales::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Sales::FranchiseId).big_integer().not_null())
                        .col(
                            ColumnDef::new(Sales::SaleNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Sales::TotalAmount)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Sales::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SaleDetails::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SaleDetails::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(SaleDetails::SaleId).big_integer().not_null())
                        .col(
                            ColumnDef::new(SaleDetails::MedicineId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SaleDetails::BatchNumber).string().null())
                        .col(ColumnDef::new(SaleDetails::ExpiryDate).date().null())
                        .col(ColumnDef::new(SaleDetails::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(SaleDetails::Rate)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SaleDetails::Amount)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_sale_details_sale_id")
                        .table(SaleDetails::Table)
                        .col(SaleDetails::SaleId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SaleDetails::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Sales::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Sales {
        Table,
        Id,
        FranchiseId,
        SaleNumber,
        TotalAmount,
        CreatedAt,
    }

    #[derive(Iden)]
    enum SaleDetails {
        Table,
        Id,
        SaleId,
        MedicineId,
        BatchNumber,
        ExpiryDate,
        Quantity,
        Rate,
        Amount,
    }
}

mod m20250101_000004_create_transports_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_transports_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Transports::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Transports::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Transports::SaleId)
                                .big_integer()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Transports::FranchiseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transports::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transports::DispatchedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Transports::DeliveredAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Transports::StockPostedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Transports::TransportFee)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Transports::TransporterName)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Transports::CompanyName).string().not_null())
                        .col(ColumnDef::new(Transports::ReceiptNumber).string().null())
                        .col(ColumnDef::new(Transports::VehicleNumber).string().null())
                        .col(ColumnDef::new(Transports::TrackingNumber).string().null())
                        .col(ColumnDef::new(Transports::Notes).string().null())
                        .col(
                            ColumnDef::new(Transports::Version)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Transports::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transports::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_transports_franchise_status")
                        .table(Transports::Table)
                        .col(Transports::FranchiseId)
                        .col(Transports::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Transports::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Transports {
        Table,
        Id,
        SaleId,
        FranchiseId,
        Status,
        DispatchedAt,
        DeliveredAt,
        StockPostedAt,
        TransportFee,
        TransporterName,
        CompanyName,
        ReceiptNumber,
        VehicleNumber,
        TrackingNumber,
        Notes,
        Version,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000005_create_stock_ledger_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000005_create_stock_ledger_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockTransactions::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::SaleId)
                                .big_integer()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::Kind)
                                .string_len(24)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockLedger::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockLedger::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockLedger::TransactionId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLedger::FranchiseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLedger::MedicineId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockLedger::BatchNumber).string().null())
                        .col(ColumnDef::new(StockLedger::ExpiryDate).date().null())
                        .col(ColumnDef::new(StockLedger::QtyChange).integer().not_null())
                        .col(
                            ColumnDef::new(StockLedger::Rate)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockLedger::Amount)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockLedger::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_ledger_franchise_medicine")
                        .table(StockLedger::Table)
                        .col(StockLedger::FranchiseId)
                        .col(StockLedger::MedicineId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_ledger_transaction")
                        .table(StockLedger::Table)
                        .col(StockLedger::TransactionId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockLedger::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockTransactions::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum StockTransactions {
        Table,
        Id,
        SaleId,
        Kind,
        CreatedAt,
    }

    #[derive(Iden)]
    enum StockLedger {
        Table,
        Id,
        TransactionId,
        FranchiseId,
        MedicineId,
        BatchNumber,
        ExpiryDate,
        QtyChange,
        Rate,
        Amount,
        CreatedAt,
    }
}

mod m20250101_000006_create_stock_balance_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000006_create_stock_balance_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockBalances::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockBalances::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockBalances::FranchiseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockBalances::MedicineId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockBalances::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockBalances::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("uq_stock_balances_franchise_medicine")
                        .table(StockBalances::Table)
                        .col(StockBalances::FranchiseId)
                        .col(StockBalances::MedicineId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockBatchBalances::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockBatchBalances::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockBatchBalances::FranchiseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockBatchBalances::MedicineId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockBatchBalances::BatchNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockBatchBalances::ExpiryDate)
                                .date()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockBatchBalances::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockBatchBalances::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("uq_stock_batch_balances_key")
                        .table(StockBatchBalances::Table)
                        .col(StockBatchBalances::FranchiseId)
                        .col(StockBatchBalances::MedicineId)
                        .col(StockBatchBalances::BatchNumber)
                        .col(StockBatchBalances::ExpiryDate)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockBatchBalances::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockBalances::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum StockBalances {
        Table,
        Id,
        FranchiseId,
        MedicineId,
        Quantity,
        UpdatedAt,
    }

    #[derive(Iden)]
    enum StockBatchBalances {
        Table,
        Id,
        FranchiseId,
        MedicineId,
        BatchNumber,
        ExpiryDate,
        Quantity,
        UpdatedAt,
    }
}

mod m20250101_000007_create_admin_stock_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000007_create_admin_stock_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(AdminStockBalances::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AdminStockBalances::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(AdminStockBalances::MedicineId)
                                .big_integer()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(AdminStockBalances::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(AdminStockBalances::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(AdminStockBatchBalances::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AdminStockBatchBalances::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(AdminStockBatchBalances::MedicineId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AdminStockBatchBalances::BatchNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AdminStockBatchBalances::ExpiryDate)
                                .date()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AdminStockBatchBalances::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(AdminStockBatchBalances::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Batch numbers are unique per medicine in the central pool.
            manager
                .create_index(
                    Index::create()
                        .name("uq_admin_stock_batch_medicine_batch")
                        .table(AdminStockBatchBalances::Table)
                        .col(AdminStockBatchBalances::MedicineId)
                        .col(AdminStockBatchBalances::BatchNumber)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(
                    Table::drop()
                        .table(AdminStockBatchBalances::Table)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_table(Table::drop().table(AdminStockBalances::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum AdminStockBalances {
        Table,
        Id,
        MedicineId,
        Quantity,
        UpdatedAt,
    }

    #[derive(Iden)]
    enum AdminStockBatchBalances {
        Table,
        Id,
        MedicineId,
        BatchNumber,
        ExpiryDate,
        Quantity,
        UpdatedAt,
    }
}

mod m20250101_000008_create_stock_recalls_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000008_create_stock_recalls_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockRecalls::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockRecalls::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockRecalls::FranchiseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockRecalls::MedicineId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockRecalls::BatchNumber)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockRecalls::ExpiryDate).date().not_null())
                        .col(ColumnDef::new(StockRecalls::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(StockRecalls::StockTransactionId)
                                .big_integer()
                                .null(),
                        )
                        .col(ColumnDef::new(StockRecalls::Notes).string().null())
                        .col(
                            ColumnDef::new(StockRecalls::RecalledAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_recalls_franchise")
                        .table(StockRecalls::Table)
                        .col(StockRecalls::FranchiseId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockRecalls::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum StockRecalls {
        Table,
        Id,
        FranchiseId,
        MedicineId,
        BatchNumber,
        ExpiryDate,
        Quantity,
        StockTransactionId,
        Notes,
        RecalledAt,
    }
}
