use anyhow::Context;
use spam_detection_api::{
    api::{build_router, AppState},
    config::{Config, ObservabilityConfig},
    ml::ResourceLoader,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize tracing
    init_tracing(&config.observability);

    config.validate().context("invalid configuration")?;

    tracing::info!("Starting Spam Detection API v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        variant = %config.model.variant,
        tokenizer_path = %config.model.tokenizer_path.display(),
        model_path = %config.model.model_path.display(),
        "Model configuration"
    );

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = spam_detection_api::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    let loader = Arc::new(ResourceLoader::new(config.model.clone()));
    if config.model.preload {
        // A failed preload is retried on the first prediction request
        match loader.ensure_loaded().await {
            Ok(_) => tracing::info!("Artifacts preloaded"),
            Err(e) => tracing::warn!("Artifact preload failed: {}", e),
        }
    } else {
        tracing::info!("Artifacts will be loaded on the first prediction request");
    }

    let state = AppState::new(loader).with_metrics(config.observability.prometheus_enabled);
    let app = build_router(state);

    // Start HTTP server
    let http_addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("failed to bind {}", http_addr))?;

    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "spam_detection_api={level},tower_http={level}",
            level = observability.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
