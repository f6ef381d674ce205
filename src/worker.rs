//! Fetch worker (§4.6): claim → pace → fetch → extract → save → enqueue
//! links → reschedule, looped until the engine's stop flag is observed.

use std::sync::Arc;
use std::time::Duration;

use newsbot_core::{CrawlError, FrontierEntry};
use newsbot_fetch::HttpFetcher;
use newsbot_parser::{extract_links, identify_source, is_article};
use tracing::{error, info, warn};

use crate::engine::Engine;

const CLAIM_IDLE_SLEEP: Duration = Duration::from_millis(200);
const TRANSIENT_BACKOFF_SECS: i64 = 60;
const EXHAUSTED_BACKOFF_SECS: i64 = 3600;

/// Runs one worker's claim loop until `engine.should_stop()`. Owns its own
/// HTTP client (§5: workers never share a session).
pub async fn run(worker_id: usize, engine: Arc<Engine>) {
    let fetcher = match HttpFetcher::new(&engine.fetch_config) {
        Ok(f) => f,
        Err(e) => {
            error!(worker_id, error = %e, "failed to build http client, worker exiting");
            return;
        }
    };

    info!(worker_id, "worker started");
    while !engine.should_stop() {
        let claimed = match engine.frontier.claim_next().await {
            Ok(entry) => entry,
            Err(e) => {
                error!(worker_id, error = %e, "claim failed");
                tokio::time::sleep(CLAIM_IDLE_SLEEP).await;
                continue;
            }
        };

        let Some(entry) = claimed else {
            tokio::time::sleep(CLAIM_IDLE_SLEEP).await;
            continue;
        };

        if let Err(e) = process(worker_id, &engine, &fetcher, &entry).await {
            handle_failure(worker_id, &engine, &entry, e).await;
        }
    }
    info!(worker_id, "worker stopping");
}

/// The happy path of one claimed entry. On success this also performs the
/// reschedule; on any error it returns without touching the frontier so the
/// caller can make the single fail-update (§9 exception-driven control flow
/// -> result propagation).
async fn process(
    worker_id: usize,
    engine: &Engine,
    fetcher: &HttpFetcher,
    entry: &FrontierEntry,
) -> Result<(), CrawlError> {
    let url = url::Url::parse(&entry.url).map_err(|e| CrawlError::InvalidUrl(e.to_string()))?;
    let article = is_article(&entry.url);

    engine.pacer.wait(&url).await;

    info!(worker_id, url = %entry.url, tries = entry.tries, article, "fetching");
    let response = fetcher.fetch(&url, &engine.fetch_config).await?;

    if !(200..400).contains(&response.status) {
        return Err(CrawlError::BadStatus(response.status));
    }

    let body = String::from_utf8_lossy(&response.body).into_owned();

    if article {
        let outcome = engine
            .corpus
            .save_article_if_changed(&entry.url, &entry.source, &body)
            .await?;
        info!(worker_id, url = %entry.url, ?outcome, "save outcome");
    }

    let links = extract_links(&entry.url, &body, engine.config.logic.links_per_page);
    let now = now_unix();
    for link in &links {
        let link_source = match identify_source(link) {
            Some(s) => s,
            None => continue,
        };
        let result = if is_article(link) {
            engine.frontier.enqueue(link, link_source, now, 0).await
        } else {
            engine
                .frontier
                .enqueue(link, link_source, now + engine.non_article_refetch(), 1)
                .await
        };
        if let Err(e) = result {
            warn!(worker_id, link = %link, error = %e, "failed to enqueue link");
        }
    }
    if !links.is_empty() {
        info!(worker_id, url = %entry.url, count = links.len(), "links enqueued");
    }

    let next_fetch_at = now
        + if article {
            engine.recrawl_after()
        } else {
            engine.non_article_refetch()
        };
    engine.frontier.reschedule(&entry.url, next_fetch_at).await?;

    Ok(())
}

async fn handle_failure(worker_id: usize, engine: &Engine, entry: &FrontierEntry, error: CrawlError) {
    let (backoff, message) = classify_failure(entry.tries, engine.config.logic.max_retries, &error);
    let exhausted = backoff == EXHAUSTED_BACKOFF_SECS;

    warn!(worker_id, url = %entry.url, tries = entry.tries, exhausted, error = %message, "fetch failed");

    if let Err(fail_err) = engine.frontier.fail(&entry.url, &message, backoff).await {
        error!(worker_id, url = %entry.url, error = %fail_err, "fail-update itself failed");
    }
}

/// Pure retry-budget decision behind `handle_failure` (§4.6, §7): once
/// `tries + 1` would meet or exceed `max_retries`, park the entry for an
/// hour with a `max_retries`-prefixed error instead of retrying in a minute.
fn classify_failure(tries: i32, max_retries: u32, error: &CrawlError) -> (i64, String) {
    if (tries + 1) as u32 >= max_retries {
        (EXHAUSTED_BACKOFF_SECS, format!("max_retries: {error}"))
    } else {
        (TRANSIENT_BACKOFF_SECS, error.to_string())
    }
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_budget_exhausts_after_max_retries_transient_failures() {
        // §8 "Retry budget": with max_retries=3, three consecutive
        // transient failures on a URL produce tries=3 (checked by the
        // caller against the claimed entry's pre-increment `tries`) and a
        // one-hour backoff with a `max_retries:`-prefixed error.
        let err = CrawlError::Network("connection reset".to_string());

        let (backoff0, msg0) = classify_failure(0, 3, &err);
        assert_eq!(backoff0, TRANSIENT_BACKOFF_SECS);
        assert!(!msg0.starts_with("max_retries"));

        let (backoff1, msg1) = classify_failure(1, 3, &err);
        assert_eq!(backoff1, TRANSIENT_BACKOFF_SECS);
        assert!(!msg1.starts_with("max_retries"));

        let (backoff2, msg2) = classify_failure(2, 3, &err);
        assert_eq!(backoff2, EXHAUSTED_BACKOFF_SECS);
        assert!(msg2.starts_with("max_retries:"));
    }

    #[test]
    fn permanent_failures_follow_the_same_retry_budget() {
        // §7: 4xx ("permanent") errors are bookkept identically to
        // transient ones — only the exhausted retry budget changes backoff.
        let err = CrawlError::BadStatus(404);
        let (backoff, msg) = classify_failure(0, 3, &err);
        assert_eq!(backoff, TRANSIENT_BACKOFF_SECS);
        assert!(msg.contains("404"));
    }
}
