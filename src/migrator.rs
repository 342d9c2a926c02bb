use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_catalog_tables::Migration),
            Box::new(m20250101_000002_create_orders_table::Migration),
            Box::new(m20250101_000003_create_order_items_table::Migration),
            Box::new(m20250101_000004_create_delivery_shipments_table::Migration),
            Box::new(m20250101_000005_create_delivery_tracking_updates_table::Migration),
            Box::new(m20250101_000006_create_delivery_rates_table::Migration),
        ]
    }
}

mod m20250101_000001_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(
                            ColumnDef::new(Products::Price)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::WeightGrams).double().null())
                        .col(ColumnDef::new(Products::LengthCm).double().null())
                        .col(ColumnDef::new(Products::WidthCm).double().null())
                        .col(ColumnDef::new(Products::HeightCm).double().null())
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CartItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CartItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CartItems::UserId).string().not_null())
                        .col(ColumnDef::new(CartItems::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(CartItems::Quantity)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(CartItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cart_items_product_id")
                                .from(CartItems::Table, CartItems::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_cart_items_user_id")
                        .table(CartItems::Table)
                        .col(CartItems::UserId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CartItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        Name,
        Price,
        WeightGrams,
        LengthCm,
        WidthCm,
        HeightCm,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum CartItems {
        Table,
        Id,
        UserId,
        ProductId,
        Quantity,
        CreatedAt,
    }
}

mod m20250101_000002_create_orders_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_orders_table"
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
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Orders::OrderNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::UserId).string().not_null())
                        // Unique so a replayed checkout webhook cannot create a second order
                        .col(
                            ColumnDef::new(Orders::PaymentSessionId)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(ColumnDef::new(Orders::PaymentStatus).string().not_null())
                        .col(
                            ColumnDef::new(Orders::TotalAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Currency).string().not_null())
                        .col(ColumnDef::new(Orders::TrackingNumber).string().null())
                        .col(ColumnDef::new(Orders::DeliveryProvider).string().null())
                        .col(
                            ColumnDef::new(Orders::EstimatedDelivery)
                                .timestamp_with_time_zone()
                                .null(),
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
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_user_id")
                        .table(Orders::Table)
                        .col(Orders::UserId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_tracking_number")
                        .table(Orders::Table)
                        .col(Orders::TrackingNumber)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        OrderNumber,
        UserId,
        PaymentSessionId,
        Status,
        PaymentStatus,
        TotalAmount,
        Currency,
        TrackingNumber,
        DeliveryProvider,
        EstimatedDelivery,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000003_create_order_items_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_order_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::Name).string().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(OrderItems::UnitPrice).decimal().not_null())
                        .col(ColumnDef::new(OrderItems::WeightGrams).double().null())
                        .col(ColumnDef::new(OrderItems::LengthCm).double().null())
                        .col(ColumnDef::new(OrderItems::WidthCm).double().null())
                        .col(ColumnDef::new(OrderItems::HeightCm).double().null())
                        .col(
                            ColumnDef::new(OrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        Name,
        Quantity,
        UnitPrice,
        WeightGrams,
        LengthCm,
        WidthCm,
        HeightCm,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
    }
}

mod m20250101_000004_create_delivery_shipments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_delivery_shipments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DeliveryShipments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryShipments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        // One shipment per order
                        .col(
                            ColumnDef::new(DeliveryShipments::OrderId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(DeliveryShipments::TrackingNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(DeliveryShipments::Provider).string().not_null())
                        .col(ColumnDef::new(DeliveryShipments::OriginName).string().not_null())
                        .col(ColumnDef::new(DeliveryShipments::OriginPhone).string().not_null())
                        .col(
                            ColumnDef::new(DeliveryShipments::OriginAddress)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryShipments::OriginCity).string().not_null())
                        .col(
                            ColumnDef::new(DeliveryShipments::OriginCountry)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryShipments::DestinationName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryShipments::DestinationPhone)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryShipments::DestinationAddress)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryShipments::DestinationCity)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryShipments::DestinationCountry)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryShipments::WeightKg).double().not_null())
                        .col(ColumnDef::new(DeliveryShipments::LengthCm).double().not_null())
                        .col(ColumnDef::new(DeliveryShipments::WidthCm).double().not_null())
                        .col(ColumnDef::new(DeliveryShipments::HeightCm).double().not_null())
                        .col(ColumnDef::new(DeliveryShipments::Description).string().null())
                        .col(
                            ColumnDef::new(DeliveryShipments::Status)
                                .string()
                                .not_null()
                                .default("pending"),
                        )
                        .col(
                            ColumnDef::new(DeliveryShipments::EstimatedDelivery)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryShipments::ActualDelivery)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(DeliveryShipments::ShippingCost).double().null())
                        .col(
                            ColumnDef::new(DeliveryShipments::Currency)
                                .string()
                                .not_null()
                                .default("AED"),
                        )
                        .col(ColumnDef::new(DeliveryShipments::ProviderResponse).json().null())
                        .col(
                            ColumnDef::new(DeliveryShipments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryShipments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_shipments_order_id")
                                .from(DeliveryShipments::Table, DeliveryShipments::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_delivery_shipments_status", DeliveryShipments::Status),
                ("idx_delivery_shipments_provider", DeliveryShipments::Provider),
                ("idx_delivery_shipments_created_at", DeliveryShipments::CreatedAt),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(DeliveryShipments::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DeliveryShipments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum DeliveryShipments {
        Table,
        Id,
        OrderId,
        TrackingNumber,
        Provider,
        OriginName,
        OriginPhone,
        OriginAddress,
        OriginCity,
        OriginCountry,
        DestinationName,
        DestinationPhone,
        DestinationAddress,
        DestinationCity,
        DestinationCountry,
        WeightKg,
        LengthCm,
        WidthCm,
        HeightCm,
        Description,
        Status,
        EstimatedDelivery,
        ActualDelivery,
        ShippingCost,
        Currency,
        ProviderResponse,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
    }
}

mod m20250101_000005_create_delivery_tracking_updates_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000005_create_delivery_tracking_updates_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DeliveryTrackingUpdates::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryTrackingUpdates::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryTrackingUpdates::ShipmentId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryTrackingUpdates::TrackingNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryTrackingUpdates::Status)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryTrackingUpdates::Location)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryTrackingUpdates::Description)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryTrackingUpdates::Timestamp)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryTrackingUpdates::ProviderData)
                                .json()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryTrackingUpdates::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_tracking_updates_shipment_id")
                                .from(
                                    DeliveryTrackingUpdates::Table,
                                    DeliveryTrackingUpdates::ShipmentId,
                                )
                                .to(DeliveryShipments::Table, DeliveryShipments::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                (
                    "idx_delivery_tracking_updates_shipment_id",
                    DeliveryTrackingUpdates::ShipmentId,
                ),
                (
                    "idx_delivery_tracking_updates_tracking_number",
                    DeliveryTrackingUpdates::TrackingNumber,
                ),
                (
                    "idx_delivery_tracking_updates_timestamp",
                    DeliveryTrackingUpdates::Timestamp,
                ),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(DeliveryTrackingUpdates::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DeliveryTrackingUpdates::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum DeliveryTrackingUpdates {
        Table,
        Id,
        ShipmentId,
        TrackingNumber,
        Status,
        Location,
        Description,
        Timestamp,
        ProviderData,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum DeliveryShipments {
        Table,
        Id,
    }
}

mod m20250101_000006_create_delivery_rates_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000006_create_delivery_rates_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DeliveryRates::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryRates::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryRates::OriginCity).string().not_null())
                        .col(ColumnDef::new(DeliveryRates::OriginCountry).string().not_null())
                        .col(
                            ColumnDef::new(DeliveryRates::DestinationCity)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryRates::DestinationCountry)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryRates::WeightKg).double().not_null())
                        .col(ColumnDef::new(DeliveryRates::LengthCm).double().not_null())
                        .col(ColumnDef::new(DeliveryRates::WidthCm).double().not_null())
                        .col(ColumnDef::new(DeliveryRates::HeightCm).double().not_null())
                        .col(ColumnDef::new(DeliveryRates::Provider).string().not_null())
                        .col(ColumnDef::new(DeliveryRates::ServiceName).string().not_null())
                        .col(ColumnDef::new(DeliveryRates::Cost).double().not_null())
                        .col(ColumnDef::new(DeliveryRates::Currency).string().not_null())
                        .col(
                            ColumnDef::new(DeliveryRates::EstimatedDaysMin)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryRates::EstimatedDaysMax)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryRates::Description).string().null())
                        .col(
                            ColumnDef::new(DeliveryRates::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryRates::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_delivery_rates_quote_key")
                        .table(DeliveryRates::Table)
                        .col(DeliveryRates::OriginCity)
                        .col(DeliveryRates::OriginCountry)
                        .col(DeliveryRates::DestinationCity)
                        .col(DeliveryRates::DestinationCountry)
                        .col(DeliveryRates::WeightKg)
                        .col(DeliveryRates::LengthCm)
                        .col(DeliveryRates::WidthCm)
                        .col(DeliveryRates::HeightCm)
                        .col(DeliveryRates::Provider)
                        .col(DeliveryRates::ServiceName)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_delivery_rates_provider")
                        .table(DeliveryRates::Table)
                        .col(DeliveryRates::Provider)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_delivery_rates_expires_at")
                        .table(DeliveryRates::Table)
                        .col(DeliveryRates::ExpiresAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DeliveryRates::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum DeliveryRates {
        Table,
        Id,
        OriginCity,
        OriginCountry,
        DestinationCity,
        DestinationCountry,
        WeightKg,
        LengthCm,
        WidthCm,
        HeightCm,
        Provider,
        ServiceName,
        Cost,
        Currency,
        EstimatedDaysMin,
        EstimatedDaysMax,
        Description,
        ExpiresAt,
        CreatedAt,
    }
}
