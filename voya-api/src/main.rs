use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voya_api::{app, AppState};
use voya_approval::{ApprovalService, NoDynamicPricing, SystemIdentity};
use voya_store::{Config, PgStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voya_api=debug,voya_approval=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!("starting approval API on port {}", config.server.port);

    let store = PgStore::connect(&config.database.url, config.database.max_connections).await?;
    store.migrate().await?;

    let approvals = ApprovalService::new(
        store,
        config.approval.clone(),
        config.provisioning.clone(),
        Arc::new(NoDynamicPricing),
        Arc::new(SystemIdentity),
    );
    let state = AppState::new(approvals);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}
