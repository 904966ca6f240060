use anyhow::Result;
use holdings_indexer::config::Config;
use holdings_indexer::dispatcher::Dispatcher;
use holdings_indexer::rpc::RpcClient;
use holdings_indexer::store::Database;
use holdings_indexer::tracker::HeadTracker;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    info!("Starting token holdings indexer");

    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("Contract address: {:?}", config.contract_address);
    info!("Confirmation lag: {} block(s)", config.confirmations);
    info!(
        "RPC URLs: {} endpoint(s) configured",
        config.json_rpc_urls.len()
    );

    let db = Database::new(&config.database_url)?;
    info!("Database initialized");

    let client = RpcClient::new(&config.json_rpc_urls)?;
    info!("RPC client connected");

    let mut dispatcher = Dispatcher::start(
        db.clone(),
        config.worker_count,
        config.task_timeout,
        config.max_task_attempts,
    );
    info!("Started {} worker(s)", config.worker_count);

    if let Some(mut dead_rx) = dispatcher.take_dead_letters() {
        tokio::spawn(async move {
            while let Some(dead) = dead_rx.recv().await {
                error!(
                    "Dead-lettered task after {} attempt(s): {:?} ({})",
                    dead.attempts, dead.kind, dead.error
                );
            }
        });
    }

    let tracker = HeadTracker::new(
        client,
        db,
        dispatcher.handle(),
        config.contract_address,
        config.confirmations,
        config.log_page_size,
        config.sync_interval,
    );

    if let Err(e) = tracker.run().await {
        error!("Tracker error: {}", e);
        return Err(e);
    }

    Ok(())
}
