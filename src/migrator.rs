// sea-orm-migration's MigrationTrait declares `&SchemaManager` with a
// late-bound elided lifetime; naming it (`<'_>`) makes it early-bound and
// fails E0195. The crate-level `deny(rust_2018_idioms)` would otherwise
// reject the required elision, so allow it in this module tree only.
#![allow(elided_lifetimes_in_paths)]

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_catalog_tables::Migration),
            Box::new(m20240101_000002_create_customers_table::Migration),
            Box::new(m20240101_000003_create_order_tables::Migration),
            Box::new(m20240101_000004_create_payments_table::Migration),
            Box::new(m20240101_000005_create_reviews_table::Migration),
        ]
    }
}

mod m20240101_000001_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Categories::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Categories::Name).string().not_null())
                        .col(ColumnDef::new(Categories::Description).text().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PackSizes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PackSizes::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(PackSizes::Size).string().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Products::CategoryId).big_integer().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(ColumnDef::new(Products::Slug).string().not_null())
                        .col(
                            ColumnDef::new(Products::OriginalPrice)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Products::DiscountPercentage).integer().null())
                        .col(
                            ColumnDef::new(Products::Stock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::Available)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_category")
                                .from(Products::Table, Products::CategoryId)
                                .to(Categories::Table, Categories::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_slug")
                        .table(Products::Table)
                        .col(Products::Slug)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductPackSizes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductPackSizes::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ProductPackSizes::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductPackSizes::PackSizeId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductPackSizes::Price)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_pack_sizes_product")
                                .from(ProductPackSizes::Table, ProductPackSizes::ProductId)
                                .to(Products::Table, Products::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_pack_sizes_pack_size")
                                .from(ProductPackSizes::Table, ProductPackSizes::PackSizeId)
                                .to(PackSizes::Table, PackSizes::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_pack_sizes_pair")
                        .table(ProductPackSizes::Table)
                        .col(ProductPackSizes::ProductId)
                        .col(ProductPackSizes::PackSizeId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductPackSizes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PackSizes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Categories {
        Table,
        Id,
        Name,
        Description,
    }

    #[derive(DeriveIden)]
    enum PackSizes {
        Table,
        Id,
        Size,
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Id,
        CategoryId,
        Name,
        Description,
        Slug,
        OriginalPrice,
        DiscountPercentage,
        Stock,
        Available,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ProductPackSizes {
        Table,
        Id,
        ProductId,
        PackSizeId,
        Price,
    }
}

mod m20240101_000002_create_customers_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_customers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Customers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Customers::Id)
                                .big_integer()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Customers::Username)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Customers::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Customers::FullName).string().not_null())
                        .col(ColumnDef::new(Customers::PhoneNumber).string().null())
                        .col(ColumnDef::new(Customers::Address).text().null())
                        .col(
                            ColumnDef::new(Customers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Customers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Customers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Customers {
        Table,
        Id,
        Username,
        Email,
        FullName,
        PhoneNumber,
        Address,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Orders::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Orders::OrderId).string().null())
                        .col(ColumnDef::new(Orders::CustomerId).big_integer().not_null())
                        .col(
                            ColumnDef::new(Orders::Paid)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_customer")
                                .from(Orders::Table, Orders::CustomerId)
                                .to(super::m20240101_000002_create_customers_table::Customers::Table,
                                    super::m20240101_000002_create_customers_table::Customers::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_customer_id")
                        .table(Orders::Table)
                        .col(Orders::CustomerId)
                        .to_owned(),
                )
                .await?;

            // At most one open (unpaid) order per customer. Partial unique
            // indexes are supported by both SQLite and Postgres.
            manager
                .get_connection()
                .execute_unprepared(
                    "CREATE UNIQUE INDEX IF NOT EXISTS idx_orders_open_per_customer \
                     ON orders (customer_id) WHERE paid = FALSE",
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).big_integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::Quantity)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(ColumnDef::new(OrderItems::Packsize).string().null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::Price).decimal_len(10, 2).null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_product")
                                .from(OrderItems::Table, OrderItems::ProductId)
                                .to(super::m20240101_000001_create_catalog_tables::Products::Table,
                                    super::m20240101_000001_create_catalog_tables::Products::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // One line per (order, product, packsize); a missing packsize
            // participates as the empty string so it is not exempt.
            manager
                .get_connection()
                .execute_unprepared(
                    "CREATE UNIQUE INDEX IF NOT EXISTS idx_order_items_line \
                     ON order_items (order_id, product_id, COALESCE(packsize, ''))",
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Orders {
        Table,
        Id,
        OrderId,
        CustomerId,
        Paid,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        Quantity,
        Packsize,
        UnitPrice,
        Price,
    }
}

mod m20240101_000004_create_payments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_payments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Payments::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Payments::OrderId)
                                .big_integer()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Payments::PaymentMethod)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Payments::PaymentId).string().null())
                        .col(
                            ColumnDef::new(Payments::Amount)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Payments::Currency).string().not_null())
                        .col(ColumnDef::new(Payments::Status).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Payments::NotificationSent)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Payments::Notes).text().null())
                        .col(
                            ColumnDef::new(Payments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Payments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_payments_order")
                                .from(Payments::Table, Payments::OrderId)
                                .to(super::m20240101_000003_create_order_tables::Orders::Table,
                                    super::m20240101_000003_create_order_tables::Orders::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Payments {
        Table,
        Id,
        OrderId,
        PaymentMethod,
        PaymentId,
        Amount,
        Currency,
        Status,
        NotificationSent,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000005_create_reviews_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_reviews_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Reviews::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Reviews::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Reviews::ProductId).big_integer().not_null())
                        .col(ColumnDef::new(Reviews::CustomerId).big_integer().not_null())
                        .col(ColumnDef::new(Reviews::Email).string().not_null())
                        .col(ColumnDef::new(Reviews::Rating).integer().not_null())
                        .col(ColumnDef::new(Reviews::Review).text().not_null())
                        .col(
                            ColumnDef::new(Reviews::SubmittedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_reviews_product")
                                .from(Reviews::Table, Reviews::ProductId)
                                .to(super::m20240101_000001_create_catalog_tables::Products::Table,
                                    super::m20240101_000001_create_catalog_tables::Products::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_reviews_customer")
                                .from(Reviews::Table, Reviews::CustomerId)
                                .to(super::m20240101_000002_create_customers_table::Customers::Table,
                                    super::m20240101_000002_create_customers_table::Customers::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_reviews_product_id")
                        .table(Reviews::Table)
                        .col(Reviews::ProductId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Reviews::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Reviews {
        Table,
        Id,
        ProductId,
        CustomerId,
        Email,
        Rating,
        Review,
        SubmittedAt,
    }
}
