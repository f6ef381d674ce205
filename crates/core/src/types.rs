use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::error::CrawlError;

/// The crawl engine's only network seam. A single `reqwest`-backed
/// implementation exists today, but workers depend on this trait rather
/// than a concrete client so tests can substitute a stub.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &Url, config: &FetchConfig) -> Result<FetchResponse, CrawlError>;
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(20),
            user_agent: "newsbot/0.1".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub url: Url,
    pub final_url: Url,
    pub status: u16,
    pub body: Vec<u8>,
    pub fetched_at: i64,
    pub response_time_ms: u64,
}

/// State of a frontier entry. Stored as text in the backing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontierState {
    New,
    Processing,
}

impl FrontierState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrontierState::New => "new",
            FrontierState::Processing => "processing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(FrontierState::New),
            "processing" => Some(FrontierState::Processing),
            _ => None,
        }
    }
}

/// A single row of the durable frontier (§3 Frontier entry).
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub url: String,
    pub source: String,
    pub state: FrontierState,
    pub discovered_at: i64,
    pub next_fetch_at: i64,
    pub priority: i32,
    pub tries: i32,
    pub processing_at: Option<i64>,
    pub last_error: Option<String>,
}

/// A single row of the durable corpus (§3 Corpus entry).
#[derive(Debug, Clone)]
pub struct CorpusEntry {
    pub url: String,
    pub source: String,
    pub fetched_at: i64,
    pub html: String,
    pub text: String,
    pub html_hash: String,
}

/// Result of `save_article_if_changed` (§4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Hash matched the stored entry; only `fetched_at` was touched.
    Unchanged,
    /// Extraction produced no usable text; nothing was written.
    NoText,
    /// A new or changed record was written. `is_new` distinguishes
    /// first capture from an update to an existing article.
    Saved { is_new: bool },
}
