use reversi_server::config::Config;
use reversi_server::error::StartupError;
use reversi_server::transport::{router, AppState};
use reversi_server::db;

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "reversi_server=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(bind_addr = %config.bind_addr, "starting reversi server");

    let pool = db::connect(&config.database_url).await?;
    tracing::info!("connected to database and ran migrations");

    let bind_addr = config.bind_addr;
    let state = AppState::new(pool, config);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("listening on {bind_addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
