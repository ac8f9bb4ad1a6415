use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use users_backend::{
    config::Config,
    db::connection::{create_pool, run_migrations},
    routes,
    state::AppState,
};

fn redact_database_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "users_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        database_url = %redact_database_url(&config.database_url),
        ssl_mode = ?config.database_ssl_mode,
        max_connections = config.database_max_connections,
        migrations_dir = ?config.migrations_dir,
        production_mode = config.production_mode,
        "Loaded configuration from environment/.env"
    );

    let pool = create_pool(&config).await?;
    run_migrations(&pool, &config).await?;

    let app = routes::app(AppState::new(pool.clone()));

    tracing::info!("Server listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}
