use stakeledger::config::EventSourceConfig;
use stakeledger::{
    init_db, AppError, ChainTimeline, Config, EventSource, FileEventSource, HttpEventSource,
    Indexer, Repository,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "indexer stopped");
        eprintln!("Indexer error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let chain_json = std::fs::read_to_string(&config.chain_state_file).map_err(|e| {
        AppError::ChainState(format!("{}: {}", config.chain_state_file.display(), e))
    })?;
    let chain = ChainTimeline::from_json(&chain_json)
        .map_err(|e| AppError::ChainState(e.to_string()))?;

    let source: Arc<dyn EventSource> = match &config.event_source {
        EventSourceConfig::File(path) => Arc::new(FileEventSource::open(path)?),
        EventSourceConfig::Http(url) => Arc::new(HttpEventSource::new(url.clone())),
    };

    let pool = init_db(&config.database_path).await.map_err(AppError::from)?;
    let repo = Repository::new(pool);

    let mut indexer = Indexer::open(repo, source, chain, config.deployment.clone())
        .await
        .map_err(AppError::from)?
        .with_batch_size(config.batch_size)
        .with_poll_interval(Duration::from_millis(config.poll_interval_ms));

    let summary = indexer.run().await.map_err(AppError::from)?;
    tracing::info!(
        applied = summary.applied,
        digest = %summary.digest,
        "run complete"
    );
    Ok(())
}
