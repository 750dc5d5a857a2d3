use actix_web::{middleware::Logger, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nodestatus::{load_chains, MetricsConfig, Verifier};
use nodestatus_server::{config::ServerConfig, routes, runner};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().expect("Failed to load configuration");
    let chains = load_chains(&config.config_path).unwrap_or_else(|e| {
        tracing::error!(
            "Error getting config from {}: {e}",
            config.config_path.display()
        );
        std::process::exit(1);
    });

    tracing::info!("Starting nodestatus-server on port {}", config.port);
    tracing::info!("Chains: {}", chains.len());
    tracing::info!("Publishing to: {}", config.pub_path.display());
    tracing::info!(
        "Metrics push: {}",
        config.prometheus_endpoint.as_deref().unwrap_or("disabled")
    );

    std::fs::create_dir_all(&config.pub_path)?;

    let http = Verifier::http_client().expect("failed to create HTTP client");
    let metrics =
        MetricsConfig::with_resolved_ip(config.prometheus_endpoint.clone(), config.checker_host.clone())
            .await;
    let verifier = Verifier::new(http, metrics).with_concurrency(config.concurrency);

    let pub_path = config.pub_path.clone();
    let interval = config.check_interval;
    let jitter = config.check_jitter;
    tokio::spawn(async move {
        runner::run_forever(verifier, chains, &pub_path, interval, jitter).await;
    });

    let pub_path = config.pub_path.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .configure(routes::configure(pub_path.clone()))
    })
    .bind(("0.0.0.0", config.port))?
    .run()
    .await
}
