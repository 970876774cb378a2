use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use storefront_checkout::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    dto::inventory::NewProduct,
    entity::products::{Column as ProdCol, Entity as Products},
    middleware::auth::{ADMIN_ROLE, issue_token},
    services::inventory_service,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url, config.db_acquire_timeout).await?;
    // Ensure migrations are applied.
    run_migrations(&orm).await?;

    seed_products(&orm).await?;

    // Identities live in an external service; mint local tokens for manual testing.
    let ttl = chrono::Duration::days(7);
    let admin_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    let admin_token = issue_token(&config.jwt_secret, admin_id, ADMIN_ROLE, ttl)?;
    let user_token = issue_token(&config.jwt_secret, user_id, "user", ttl)?;

    println!("Seed completed.");
    println!("Admin {admin_id}: Bearer {admin_token}");
    println!("User  {user_id}: Bearer {user_token}");
    Ok(())
}

async fn seed_products(orm: &sea_orm::DatabaseConnection) -> anyhow::Result<()> {
    let products = vec![
        ("Brass Table Lamp", 450_000, 25),
        ("Handloom Cotton Throw", 120_000, 60),
        ("Terracotta Planter", 35_000, 140),
        ("Ceramic Tea Set", 210_000, 3),
    ];

    for (name, price, stock) in products {
        let exists = Products::find()
            .filter(ProdCol::Name.eq(name))
            .one(orm)
            .await?
            .is_some();
        if exists {
            continue;
        }
        inventory_service::register_product(
            orm,
            NewProduct {
                name: name.to_string(),
                image: None,
                price,
                stock,
            },
        )
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
