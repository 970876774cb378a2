pub use sea_orm_migration::prelude::*;

mod m20250601_000001_create_catalog_and_carts;
mod m20250601_000002_create_orders;
mod m20250601_000003_create_wishlist_and_audit;
mod m20250601_000004_create_gateway_orders;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_catalog_and_carts::Migration),
            Box::new(m20250601_000002_create_orders::Migration),
            Box::new(m20250601_000003_create_wishlist_and_audit::Migration),
            Box::new(m20250601_000004_create_gateway_orders::Migration),
        ]
    }
}
