use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub db: DbConfig,
    #[serde(default)]
    pub logic: LogicConfig,
    #[serde(default)]
    pub seeds: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub uri: String,
    /// Unused with the Postgres backing store; kept for config compat with
    /// the document-store contract's `db.database` key.
    #[serde(default)]
    pub database: String,
    #[serde(default = "default_pages_collection")]
    pub pages_collection: String,
    #[serde(default = "default_queue_collection")]
    pub queue_collection: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogicConfig {
    #[serde(default = "default_delay_seconds")]
    pub delay_seconds: f64,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Reserved; not enforced by the core (see design notes).
    #[serde(default)]
    pub per_source_limit: Option<u64>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_recrawl_after_seconds")]
    pub recrawl_after_seconds: i64,
    #[serde(default = "default_non_article_refetch_seconds")]
    pub non_article_refetch_seconds: i64,
    #[serde(default = "default_links_per_page")]
    pub links_per_page: usize,
}

impl Default for LogicConfig {
    fn default() -> Self {
        LogicConfig {
            delay_seconds: default_delay_seconds(),
            workers: default_workers(),
            per_source_limit: None,
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            recrawl_after_seconds: default_recrawl_after_seconds(),
            non_article_refetch_seconds: default_non_article_refetch_seconds(),
            links_per_page: default_links_per_page(),
        }
    }
}

fn default_pages_collection() -> String {
    "pages".to_string()
}
fn default_queue_collection() -> String {
    "queue".to_string()
}
fn default_delay_seconds() -> f64 {
    0.7
}
fn default_workers() -> usize {
    4
}
fn default_request_timeout() -> u64 {
    20
}
fn default_max_retries() -> u32 {
    3
}
fn default_recrawl_after_seconds() -> i64 {
    7 * 86_400
}
fn default_non_article_refetch_seconds() -> i64 {
    120
}
fn default_links_per_page() -> usize {
    500
}
