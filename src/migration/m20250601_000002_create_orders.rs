use sea_orm::Schema;
use sea_orm_migration::prelude::*;

use crate::entity::{OrderItems, Orders, orders};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(manager.get_database_backend());

        manager
            .create_table(schema.create_table_from_entity(Orders).if_not_exists().to_owned())
            .await?;
        manager
            .create_table(schema.create_table_from_entity(OrderItems).if_not_exists().to_owned())
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_orders_owner_created")
                    .table(Orders)
                    .col(orders::Column::OwnerId)
                    .col(orders::Column::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderItems).to_owned())
            .await?;
        manager.drop_table(Table::drop().table(Orders).to_owned()).await
    }
}
