//! AgriSuggest AI - Farm Dashboard Server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use agrisuggest_backend::{
    config::Config,
    create_app,
    external::{GeminiClient, OpenMeteoClient, PgSensorStore},
    services::{ChatService, ExportService, RefreshController, RefreshSettings},
    AppState,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "agrisuggest_server=debug,agrisuggest_backend=debug,tower_http=debug,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting AgriSuggest Farm Dashboard Server");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("Device location: {}", config.location.device_location().display_name());

    if config.gemini.api_key.is_empty() {
        tracing::warn!("No Gemini API key configured; recommendations and chat will fail");
    }

    // Sensor store pool; connections are opened on first use so an
    // unreachable database surfaces as the dashboard's fatal error
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .connect_lazy(&config.database.url)?;

    // External clients
    let weather = Arc::new(OpenMeteoClient::new(
        config.weather.api_endpoint.clone(),
        config.weather.geocoding_endpoint.clone(),
        Duration::from_secs(config.weather.timeout_secs),
    )?);
    let gemini = Arc::new(GeminiClient::new(
        config.gemini.api_endpoint.clone(),
        config.gemini.api_key.clone(),
        config.gemini.model.clone(),
        Duration::from_secs(config.gemini.timeout_secs),
    )?);
    let sensors = Arc::new(PgSensorStore::new(db_pool.clone()));

    let controller = RefreshController::new(
        weather,
        sensors,
        gemini.clone(),
        config.location.device_location(),
        RefreshSettings::from_config(&config),
    );

    // Initial load; on failure the server still runs and reports the fatal error
    let _refresh = match controller.start().await {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::error!("Dashboard polling disabled: {}", e);
            None
        }
    };

    // Create application state
    let state = AppState {
        config: Arc::new(config.clone()),
        db: db_pool,
        chat: ChatService::new(gemini),
        exporter: ExportService::new(controller.clone(), &config.export),
        controller,
    };

    // Build application
    let app = create_app(state);

    // Start server
    let ip: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((ip, config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
