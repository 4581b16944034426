use uuid::Uuid;
use wholecart::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    models::{Role, StockStatus},
    services::auth_service::hash_password,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&pool, "admin", "admin@wholecart.local", "admin123", Role::Admin).await?;
    let user_id = ensure_user(&pool, "shopper", "shopper@wholecart.local", "shopper123", Role::User).await?;
    seed_products(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, Shopper ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, username, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = [
        ("Basmati Rice 25kg", "Long grain rice, wholesale sack", "Grains", 185_000_i64, 40),
        ("Sunflower Oil 5L", "Refined cooking oil", "Oils", 92_000, 60),
        ("Arabica Beans 1kg", "Medium roast coffee beans", "Beverages", 145_000, 8),
        ("Cane Sugar 50kg", "Granulated white sugar", "Baking", 310_000, 0),
        ("Black Tea 500g", "Loose leaf breakfast tea", "Beverages", 38_000, 120),
    ];

    for (name, desc, category, price, quantity) in products {
        let status = StockStatus::for_quantity(quantity);
        let image = format!(
            "/uploads/products/{}.png",
            name.to_lowercase().replace(' ', "-")
        );
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, category, price, quantity, status_stock, images)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(category)
        .bind(price)
        .bind(quantity)
        .bind(status.as_str())
        .bind(serde_json::json!([image]))
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
