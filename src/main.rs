use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use orchestrator_api::agents::Orchestrator;
use orchestrator_api::api;
use orchestrator_api::config::OrchestratorConfig;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Optional config path as the first argument
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = OrchestratorConfig::load(config_path.as_deref());

    let orchestrator = Arc::new(
        Orchestrator::from_config(&config).expect("Failed to initialize orchestrator"),
    );

    if let Some(ttl_secs) = config.retention.finished_task_ttl_secs {
        tracing::info!(ttl_secs, "Finished-task retention enabled");
        orchestrator.spawn_retention_sweeper(
            Duration::from_secs(ttl_secs),
            Duration::from_secs(config.retention.sweep_interval_secs.max(1)),
        );
    }

    let app = api::router(orchestrator);

    // Start server
    let addr = config.server.socket_addr();
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .await
        .expect("Server failed");
}
