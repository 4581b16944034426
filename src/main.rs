use std::net::{IpAddr, SocketAddr};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wholecart::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    routes::build_app,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wholecart=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let addr = SocketAddr::from((config.host.parse::<IpAddr>()?, config.port));

    let pool = create_pool(&config.database_url).await?;
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let app = build_app(AppState::new(pool, orm, config));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "wholecart listening");
    axum::serve(listener, app).await?;

    Ok(())
}
