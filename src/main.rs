use axum::http::{HeaderValue, Method, header};
use clinic_backend::core::{
    AppState, Config, EmailSender, LogEmailSender, SmtpEmailSender, TemplateEngine,
};
use clinic_backend::{create_router, repositories};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing, RUST_LOG overrides the default filter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,clinic_backend=debug")),
        )
        .with_target(true)
        .init();

    // Load the configuration
    let config = Config::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;
    config.print_info();

    // Connect the database and run the migrations
    let pool = repositories::connect(&config.database_url, config.max_connections).await?;

    // Email delivery: SMTP when configured, the log otherwise
    let email: Arc<dyn EmailSender> = match &config.smtp {
        Some(settings) => Arc::new(SmtpEmailSender::new(settings)?),
        None => {
            if config.is_production() {
                warn!("SMTP not configured in production, emails will only be logged");
            }
            Arc::new(LogEmailSender)
        }
    };
    info!("Email sender: {}", email.name());
    let templates = TemplateEngine::new()?;

    let cors = build_cors(&config.cors_origins);
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let state = Arc::new(AppState::new(pool, config, email, templates));

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// CORS for the configured frontend origins; credentials are allowed for the refresh cookie
fn build_cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::AUTHORIZATION])
        .allow_credentials(true)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for the shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
