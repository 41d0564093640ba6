use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use worklock_pool::{api, config::Config, db::init_db, Repository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("configuration error")?;
    let port = config.port;

    let pool = init_db(&config.database_path)
        .await
        .context("failed to initialize database")?;
    let repo = Arc::new(Repository::new(pool));

    let state = api::AppState::new(repo, config.clone()).context("invalid pool configuration")?;
    let last_seq = state
        .resume_sequence()
        .await
        .context("failed to read the event log")?;
    tracing::info!(
        pool = %config.pool_address,
        owner = %config.owner_address,
        worker = %config.worker_address,
        worker_fraction = %config.worker_fraction,
        last_seq,
        "Pool engine ready over simulated collaborators"
    );
    let app = api::create_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
