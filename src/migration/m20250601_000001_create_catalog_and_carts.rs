use sea_orm::Schema;
use sea_orm_migration::prelude::*;

use crate::entity::{CartLines, Carts, Products, cart_lines};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(manager.get_database_backend());

        manager
            .create_table(schema.create_table_from_entity(Products).if_not_exists().to_owned())
            .await?;
        manager
            .create_table(schema.create_table_from_entity(Carts).if_not_exists().to_owned())
            .await?;
        manager
            .create_table(schema.create_table_from_entity(CartLines).if_not_exists().to_owned())
            .await?;

        // one line per product per cart
        manager
            .create_index(
                Index::create()
                    .name("idx_cart_lines_cart_product")
                    .table(CartLines)
                    .col(cart_lines::Column::CartId)
                    .col(cart_lines::Column::ProductId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CartLines).to_owned())
            .await?;
        manager.drop_table(Table::drop().table(Carts).to_owned()).await?;
        manager
            .drop_table(Table::drop().table(Products).to_owned())
            .await
    }
}
