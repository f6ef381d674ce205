//! The crawl engine's HTTP boundary (§4.6 step 3-4, §6 HTTP contract): GET
//! with configurable connect/read timeouts, following redirects. The engine
//! depends on the `Fetcher` trait from `newsbot-core`, not this concrete
//! client, so workers can be tested against a stub.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use newsbot_core::{CrawlError, FetchConfig, FetchResponse, Fetcher};
use reqwest::redirect::Policy;
use url::Url;

/// A `reqwest`-backed fetcher. Each worker owns one `HttpFetcher` (and thus
/// one underlying connection pool) — workers never share a client (§5).
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, CrawlError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .redirect(Policy::limited(10))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CrawlError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, config: &FetchConfig) -> Result<FetchResponse, CrawlError> {
        let start = Instant::now();

        let resp = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                CrawlError::Timeout(config.read_timeout.as_secs())
            } else {
                CrawlError::Network(e.to_string())
            }
        })?;

        let status = resp.status().as_u16();
        let final_url = resp.url().clone();

        let body = resp
            .bytes()
            .await
            .map_err(|e| CrawlError::Network(e.to_string()))?;

        Ok(FetchResponse {
            url: url.clone(),
            final_url,
            status,
            body: body.to_vec(),
            fetched_at: now_unix(),
            response_time_ms: start.elapsed().as_millis() as u64,
        })
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

    fn config() -> FetchConfig {
        FetchConfig {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(20),
            user_agent: "newsbot-test/0.1".to_string(),
        }
    }

    #[tokio::test]
    async fn builds_client_from_config() {
        assert!(HttpFetcher::new(&config()).is_ok());
    }

    #[tokio::test]
    async fn rejects_unparseable_url_before_any_network_call() {
        let bad = Url::parse("not-a-url");
        assert!(bad.is_err());
    }
}
