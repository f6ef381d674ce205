//! The durable corpus (§4.4): a Postgres-backed table of captured article
//! pages, keyed by canonical URL, with change-aware upsert.

use anyhow::Result;
use dashmap::DashMap;
use newsbot_core::{CorpusEntry, SaveOutcome};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use newsbot_parser::{extract_article, hash_bytes};

#[derive(Clone)]
pub struct CorpusStore {
    pool: PgPool,
    table: String,
    /// Per-source count of documents newly written (not merely touched) —
    /// observability only, never read back by the engine (§4.4 step 5).
    saved_counts: std::sync::Arc<DashMap<String, u64>>,
}

impl CorpusStore {
    pub async fn connect(database_url: &str, table: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        info!(max_connections, table, "connected corpus store to postgres");
        Ok(Self {
            pool,
            table: table.to_string(),
            saved_counts: std::sync::Arc::new(DashMap::new()),
        })
    }

    pub fn with_pool(pool: PgPool, table: &str) -> Self {
        Self {
            pool,
            table: table.to_string(),
            saved_counts: std::sync::Arc::new(DashMap::new()),
        }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("../migrations/001_init.sql"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// §4.4: compute the hash, and either touch `fetched_at` (unchanged),
    /// skip the write (no usable text), or upsert the full record.
    pub async fn save_article_if_changed(
        &self,
        url: &str,
        source: &str,
        html: &str,
    ) -> Result<SaveOutcome> {
        let hash = hash_bytes(html.as_bytes());
        let now = now_unix();

        let existing_hash: Option<String> = sqlx::query_scalar(&format!(
            "SELECT html_hash FROM {} WHERE url = $1",
            self.table
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        if existing_hash.as_deref() == Some(hash.as_str()) {
            sqlx::query(&format!(
                "UPDATE {} SET fetched_at = $2, source = $3 WHERE url = $1",
                self.table
            ))
            .bind(url)
            .bind(now)
            .bind(source)
            .execute(&self.pool)
            .await?;
            debug!(url, "corpus entry unchanged");
            return Ok(SaveOutcome::Unchanged);
        }

        let text = extract_article(url, html);
        if text.is_empty() {
            debug!(url, "extraction produced no text, skipping save");
            return Ok(SaveOutcome::NoText);
        }

        let is_new = existing_hash.is_none();
        sqlx::query(&format!(
            "INSERT INTO {table} (url, source, fetched_at, html, text, html_hash)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (url) DO UPDATE SET
                source = EXCLUDED.source,
                fetched_at = EXCLUDED.fetched_at,
                html = EXCLUDED.html,
                text = EXCLUDED.text,
                html_hash = EXCLUDED.html_hash",
            table = self.table
        ))
        .bind(url)
        .bind(source)
        .bind(now)
        .bind(html)
        .bind(&text)
        .bind(&hash)
        .execute(&self.pool)
        .await?;

        if is_new {
            *self.saved_counts.entry(source.to_string()).or_insert(0) += 1;
        }
        info!(url, source, is_new, "corpus entry saved");
        Ok(SaveOutcome::Saved { is_new })
    }

    pub async fn get(&self, url: &str) -> Result<Option<CorpusEntry>> {
        let row = sqlx::query(&format!(
            "SELECT url, source, fetched_at, html, text, html_hash FROM {} WHERE url = $1",
            self.table
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| CorpusEntry {
            url: r.get("url"),
            source: r.get("source"),
            fetched_at: r.get("fetched_at"),
            html: r.get("html"),
            text: r.get("text"),
            html_hash: r.get("html_hash"),
        }))
    }

    /// Snapshot of per-source saved counts (observability only).
    pub fn saved_counts(&self) -> std::collections::HashMap<String, u64> {
        self.saved_counts
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }

    pub async fn article_count(&self) -> Result<i64> {
        let row: (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", self.table))
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
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

    // Exercised against a disposable Postgres instance; no-ops when
    // DATABASE_URL isn't set so a plain test run doesn't require one.
    #[tokio::test]
    #[ignore]
    async fn unchanged_save_preserves_html_and_bumps_fetched_at() {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return;
        };
        let store = CorpusStore::connect(&url, "pages", 2).await.unwrap();
        store.run_migrations().await.unwrap();

        let html = "<html><body><h1>Title</h1><article><p>A sufficiently long paragraph of article text for extraction.</p></article></body></html>";
        let first = store
            .save_article_if_changed("https://lenta.ru/news/2024/01/05/x", "lenta.ru", html)
            .await
            .unwrap();
        assert_eq!(first, SaveOutcome::Saved { is_new: true });

        let second = store
            .save_article_if_changed("https://lenta.ru/news/2024/01/05/x", "lenta.ru", html)
            .await
            .unwrap();
        assert_eq!(second, SaveOutcome::Unchanged);

        let entry = store
            .get("https://lenta.ru/news/2024/01/05/x")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.html, html);
    }
}
