use std::net::SocketAddr;

use anyhow::Context;
use mimalloc::MiMalloc;
use stigmap::config::AppConfig;
use stigmap::services::catalog::{self, CatalogHandle};
use stigmap::{db, routes, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// M-MIMALLOC-APP: Use mimalloc as global allocator for improved performance.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stigmap=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let pool = db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    let loaded = catalog::load_from_db(&pool)
        .await
        .context("Failed to load CCI catalog")?;
    if loaded.is_empty() {
        tracing::warn!("CCI catalog is empty; import a CCI list before uploading checklists");
    } else {
        tracing::info!(entries = loaded.len(), "CCI catalog loaded");
    }

    let host: std::net::IpAddr = config
        .host
        .parse()
        .with_context(|| format!("Invalid BACKEND_HOST '{}'", config.host))?;
    let addr = SocketAddr::from((host, config.port));

    let state = AppState {
        db: pool,
        config,
        catalog: CatalogHandle::new(loaded),
    };
    let app = routes::router(state);

    tracing::info!(host = %addr, "Starting stigmap API server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
