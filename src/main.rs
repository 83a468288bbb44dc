use std::error::Error;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use clinicore::api::server::start_server;
use clinicore::api::types::ApiContext;
use clinicore::config;
use clinicore::db::open_database;
use clinicore::triage::HttpTriageAdvisor;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "fatal");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let db_path = config::database_path();
    // Opening runs pending migrations; startup connection is dropped,
    // each request opens its own.
    open_database(&db_path)?;
    tracing::info!(path = %db_path.display(), "database ready");

    let advisor = HttpTriageAdvisor::from_env();
    tracing::info!(url = advisor.base_url(), "triage advisor configured");

    let ctx = ApiContext::new(db_path, Arc::new(advisor));
    let server = start_server(ctx, config::listen_addr()).await?;
    tracing::info!(addr = %server.addr, "{} v{} started", config::APP_NAME, config::APP_VERSION);

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    server.shutdown().await;
    Ok(())
}
