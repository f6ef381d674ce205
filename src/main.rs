mod cli;
mod engine;
mod supervisor;
mod worker;

use anyhow::{Context, Result};
use clap::Parser;

use newsbot_core::AppConfig;
use newsbot_frontier::FrontierStore;
use newsbot_storage::CorpusStore;

// High worker-count, long-running crawl loops fragment glibc malloc over
// time; mimalloc doesn't.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let config = load_config(&cli.config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads((config.logic.workers + 4).max(4))
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

fn load_config(path: &str) -> Result<AppConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {path}"))?;
    let config: AppConfig =
        toml::from_str(&raw).with_context(|| format!("parsing config file {path}"))?;
    Ok(config)
}

async fn async_main(config: AppConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let pool_size = (config.logic.workers as u32 + 4).max(8);
    let corpus = CorpusStore::connect(&config.db.uri, &config.db.pages_collection, pool_size)
        .await
        .context("connecting corpus store")?;
    corpus.run_migrations().await.context("running migrations")?;

    let frontier = FrontierStore::new(corpus.pool().clone(), &config.db.queue_collection);

    let engine = engine::Engine::new(frontier, corpus, config);

    supervisor::seed(&engine).await;
    supervisor::run(engine).await;

    tracing::info!("shutdown complete");
    Ok(())
}
