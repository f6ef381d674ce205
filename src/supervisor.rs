//! Supervisor (§4.7): seeds the frontier, spawns the worker pool, restarts
//! crashed workers, and stops the pool on a shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use newsbot_parser::{canonicalize, identify_source};

use crate::engine::Engine;
use crate::worker;

const LIVENESS_INTERVAL: Duration = Duration::from_secs(1);
/// Pool-level counters (§6a) are cheap to log but cost a database round
/// trip; sampling every 30th liveness sweep keeps that cost off the
/// per-second respawn check.
const COUNTER_LOG_EVERY: u32 = 30;

/// Canonicalizes and enqueues every configured seed URL with priority 1,
/// ready to claim immediately.
pub async fn seed(engine: &Engine) {
    for raw in &engine.config.seeds {
        let canonical = match canonicalize(raw) {
            Ok(c) => c,
            Err(e) => {
                warn!(seed = %raw, error = %e, "skipping unparseable seed");
                continue;
            }
        };
        let Some(source) = identify_source(&canonical) else {
            warn!(seed = %raw, "skipping seed with unrecognized publisher");
            continue;
        };
        let now = now_unix();
        if let Err(e) = engine.frontier.enqueue(&canonical, source, now, 1).await {
            error!(seed = %canonical, error = %e, "failed to enqueue seed");
        }
    }
    info!(count = engine.config.seeds.len(), "seeds enqueued");
}

/// Spawns `workers` worker tasks and keeps them alive until `engine`'s stop
/// flag is set (via `ctrl_c`), respawning any that terminate early.
pub async fn run(engine: Arc<Engine>) {
    let worker_count = engine.config.logic.workers;
    let mut handles: Vec<JoinHandle<()>> = (0..worker_count)
        .map(|id| spawn_worker(id, Arc::clone(&engine)))
        .collect();

    info!(worker_count, "worker pool started");

    let mut sweep: u32 = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                engine.request_stop();
                break;
            }
            _ = tokio::time::sleep(LIVENESS_INTERVAL) => {
                let mut respawned = 0usize;
                for (id, handle) in handles.iter_mut().enumerate() {
                    if handle.is_finished() {
                        if let Err(e) = std::mem::replace(handle, spawn_worker(id, Arc::clone(&engine))).await {
                            if e.is_panic() {
                                warn!(worker_id = id, "worker panicked, respawned");
                            } else {
                                info!(worker_id = id, "worker exited, respawned");
                            }
                        }
                        respawned += 1;
                    }
                }
                let alive = handles.len() - respawned;
                info!(alive, respawned, "liveness sweep");

                sweep += 1;
                if sweep >= COUNTER_LOG_EVERY {
                    sweep = 0;
                    log_pool_counters(&engine).await;
                }
            }
        }
    }

    for handle in handles {
        let _ = handle.await;
    }
}

fn spawn_worker(id: usize, engine: Arc<Engine>) -> JoinHandle<()> {
    tokio::spawn(async move { worker::run(id, engine).await })
}

/// §6a observability surface: frontier depth and per-source saved counts
/// are otherwise invisible outside the database, so the supervisor samples
/// and logs them alongside the liveness sweep rather than leaving
/// `frontier_size`/`saved_counts`/`article_count` unread.
async fn log_pool_counters(engine: &Engine) {
    let frontier_size = engine.frontier.frontier_size().await.ok();
    let article_count = engine.corpus.article_count().await.ok();
    let saved_counts = engine.corpus.saved_counts();
    info!(?frontier_size, ?article_count, ?saved_counts, "pool counters");
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
