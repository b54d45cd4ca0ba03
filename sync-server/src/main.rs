use sync_server::{Server, ServerState, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. .env, work dir, logging
    let config = setup_environment()?;
    tracing::info!(
        environment = %config.environment,
        work_dir = %config.work_dir,
        "Sync server starting..."
    );

    // 2. Store, vendor registry, startup recovery
    let state = ServerState::initialize(&config).await?;

    // 3. HTTP API and scheduler until Ctrl-C
    Server::with_state(config, state).run().await?;

    Ok(())
}
