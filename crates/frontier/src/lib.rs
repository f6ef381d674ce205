//! The durable frontier (§4.3): a Postgres-backed queue keyed by canonical
//! URL. All ordering under contention comes from the store's atomic
//! find-and-modify; no in-process locks guard these operations.

use anyhow::Result;
use newsbot_core::{FrontierEntry, FrontierState};
use sqlx::{PgPool, Row};
use tracing::debug;

const MAX_ERROR_LEN: usize = 4000;

#[derive(Clone)]
pub struct FrontierStore {
    pool: PgPool,
    table: String,
}

impl FrontierStore {
    pub fn new(pool: PgPool, table: &str) -> Self {
        Self {
            pool,
            table: table.to_string(),
        }
    }

    /// §4.3 enqueue: upsert-if-absent on every field but `priority`, which
    /// is replaced with `min(stored, supplied)`.
    pub async fn enqueue(
        &self,
        url: &str,
        source: &str,
        next_fetch_at: i64,
        priority: i32,
    ) -> Result<()> {
        let now = now_unix();
        sqlx::query(&format!(
            "INSERT INTO {table} (url, source, state, discovered_at, next_fetch_at, priority, tries)
             VALUES ($1, $2, 'new', $3, $4, $5, 0)
             ON CONFLICT (url) DO UPDATE SET
                priority = LEAST({table}.priority, EXCLUDED.priority)",
            table = self.table
        ))
        .bind(url)
        .bind(source)
        .bind(now)
        .bind(next_fetch_at)
        .bind(priority)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// §4.3 claim_next: atomically selects the highest-priority ready entry
    /// (lowest `priority`, then earliest `next_fetch_at`, then earliest
    /// `discovered_at`) and flips it to `processing`.
    pub async fn claim_next(&self) -> Result<Option<FrontierEntry>> {
        let now = now_unix();
        let row = sqlx::query(&format!(
            "UPDATE {table} SET state = 'processing', processing_at = $1
             WHERE url = (
                SELECT url FROM {table}
                WHERE state = 'new' AND next_fetch_at <= $1
                ORDER BY priority ASC, next_fetch_at ASC, discovered_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
             )
             RETURNING url, source, state, discovered_at, next_fetch_at, priority, tries, processing_at, last_error",
            table = self.table
        ))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_entry))
    }

    /// §4.3 reschedule: returns the holder of `url` to `new` with a future
    /// `next_fetch_at` and a cleared error.
    pub async fn reschedule(&self, url: &str, next_fetch_at: i64) -> Result<()> {
        sqlx::query(&format!(
            "UPDATE {} SET state = 'new', next_fetch_at = $2, last_error = NULL WHERE url = $1",
            self.table
        ))
        .bind(url)
        .bind(next_fetch_at)
        .execute(&self.pool)
        .await?;
        debug!(url, next_fetch_at, "rescheduled");
        Ok(())
    }

    /// §4.3 fail: returns to `new` with an incremented `tries`, a truncated
    /// error, and a backoff.
    pub async fn fail(&self, url: &str, error_message: &str, backoff_seconds: i64) -> Result<()> {
        let truncated: String = error_message.chars().take(MAX_ERROR_LEN).collect();
        let next_fetch_at = now_unix() + backoff_seconds;
        sqlx::query(&format!(
            "UPDATE {} SET state = 'new', next_fetch_at = $2, last_error = $3, tries = tries + 1
             WHERE url = $1",
            self.table
        ))
        .bind(url)
        .bind(next_fetch_at)
        .bind(&truncated)
        .execute(&self.pool)
        .await?;
        debug!(url, backoff_seconds, "failed");
        Ok(())
    }

    pub async fn frontier_size(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}

fn row_to_entry(row: sqlx::postgres::PgRow) -> FrontierEntry {
    let state: String = row.get("state");
    FrontierEntry {
        url: row.get("url"),
        source: row.get("source"),
        state: FrontierState::parse(&state).unwrap_or(FrontierState::New),
        discovered_at: row.get("discovered_at"),
        next_fetch_at: row.get("next_fetch_at"),
        priority: row.get("priority"),
        tries: row.get("tries"),
        processing_at: row.get("processing_at"),
        last_error: row.get("last_error"),
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

    #[tokio::test]
    #[ignore]
    async fn priority_is_monotonically_non_increasing() {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return;
        };
        let pool = PgPool::connect(&url).await.unwrap();
        sqlx::raw_sql(include_str!("../../storage/migrations/001_init.sql"))
            .execute(&pool)
            .await
            .unwrap();
        let frontier = FrontierStore::new(pool, "queue");

        let target = "https://lenta.ru/news/2099/01/01/unique-priority-test";
        frontier.enqueue(target, "lenta.ru", 0, 5).await.unwrap();
        frontier.enqueue(target, "lenta.ru", 0, 2).await.unwrap();
        frontier.enqueue(target, "lenta.ru", 0, 4).await.unwrap();

        let row: (i32,) = sqlx::query_as("SELECT priority FROM queue WHERE url = $1")
            .bind(target)
            .fetch_one(frontier_pool(&frontier))
            .await
            .unwrap();
        assert_eq!(row.0, 2);
    }

    #[tokio::test]
    #[ignore]
    async fn claim_orders_by_priority_then_next_fetch_at_then_discovered_at() {
        // §8 "Claim fairness": A (priority 0, nfa=+10), B (priority 1,
        // nfa=+5), C (priority 0, nfa=+20), all already eligible -> three
        // successive claims return A, C, B in that order.
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return;
        };
        let pool = PgPool::connect(&url).await.unwrap();
        sqlx::raw_sql(include_str!("../../storage/migrations/001_init.sql"))
            .execute(&pool)
            .await
            .unwrap();
        let frontier = FrontierStore::new(pool, "queue");

        let base = now_unix() - 1_000;
        let a = "https://lenta.ru/news/2099/02/01/claim-fairness-a";
        let b = "https://lenta.ru/news/2099/02/01/claim-fairness-b";
        let c = "https://lenta.ru/news/2099/02/01/claim-fairness-c";
        frontier.enqueue(a, "lenta.ru", base + 10, 0).await.unwrap();
        frontier.enqueue(b, "lenta.ru", base + 5, 1).await.unwrap();
        frontier.enqueue(c, "lenta.ru", base + 20, 0).await.unwrap();

        let first = frontier.claim_next().await.unwrap().unwrap();
        let second = frontier.claim_next().await.unwrap().unwrap();
        let third = frontier.claim_next().await.unwrap().unwrap();

        assert_eq!(first.url, a);
        assert_eq!(second.url, c);
        assert_eq!(third.url, b);
    }

    fn frontier_pool(f: &FrontierStore) -> &PgPool {
        &f.pool
    }
}
