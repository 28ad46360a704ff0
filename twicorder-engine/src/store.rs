//! App-Data Store (§4.2): durable last-seen-id and per-query tweet-history
//! tables backing the Query state machine's dedup and resume logic.
//!
//! Kept on the teacher's own persistence shape: one `SqlitePool`, a
//! single-writer `Semaphore` so concurrent workers never race on SQLite's
//! writer lock, and a `tokio::spawn` + `oneshot` reply per message so a slow
//! write never blocks the actor's mailbox.

use crate::actor::{Actor, Context};
use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::{oneshot, Semaphore};
use tracing::error;

#[derive(Debug)]
pub enum StoreMsg {
    PutLastId {
        uid: String,
        id: String,
    },
    GetLastId {
        uid: String,
        reply: oneshot::Sender<Option<String>>,
    },
    PutQueryTweets {
        kind: String,
        items: Vec<(String, i64)>,
    },
    GetQueryTweets {
        kind: String,
        reply: oneshot::Sender<Vec<(String, i64)>>,
    },
}

pub struct AppDataStore {
    pool: SqlitePool,
    write_limit: Arc<Semaphore>,
}

impl AppDataStore {
    /// Open (or create) the app-data database at `pool`'s target and run
    /// the idempotent schema migration.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        run_migrations(&pool).await?;
        Ok(Self {
            pool,
            write_limit: Arc::new(Semaphore::new(1)),
        })
    }
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS last_id (
             uid TEXT PRIMARY KEY,
             id TEXT NOT NULL
           )"#,
    )
    .execute(pool)
    .await?;
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS query_tweets (
             kind TEXT NOT NULL,
             tweet_id TEXT NOT NULL,
             seen_at INTEGER NOT NULL,
             PRIMARY KEY (kind, tweet_id)
           )"#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[async_trait::async_trait]
impl Actor for AppDataStore {
    type Msg = StoreMsg;

    async fn handle(&mut self, msg: Self::Msg, _ctx: &mut Context<Self>) -> Result<()> {
        match msg {
            StoreMsg::PutLastId { uid, id } => {
                let pool = self.pool.clone();
                let permit_src = self.write_limit.clone();
                tokio::spawn(async move {
                    let _permit = match permit_src.acquire_owned().await {
                        Ok(p) => p,
                        Err(err) => {
                            error!(error = ?err, "store.put_last_id.acquire_failed");
                            return;
                        }
                    };
                    if let Err(err) = put_last_id(&pool, &uid, &id).await {
                        error!(error = ?err, uid = %uid, "store.put_last_id.failed");
                    }
                });
            }
            StoreMsg::GetLastId { uid, reply } => {
                let pool = self.pool.clone();
                tokio::spawn(async move {
                    let res = get_last_id(&pool, &uid).await.unwrap_or_else(|err| {
                        error!(error = ?err, uid = %uid, "store.get_last_id.failed");
                        None
                    });
                    let _ = reply.send(res);
                });
            }
            StoreMsg::PutQueryTweets { kind, items } => {
                let pool = self.pool.clone();
                let permit_src = self.write_limit.clone();
                tokio::spawn(async move {
                    let _permit = match permit_src.acquire_owned().await {
                        Ok(p) => p,
                        Err(err) => {
                            error!(error = ?err, "store.put_query_tweets.acquire_failed");
                            return;
                        }
                    };
                    if let Err(err) = put_query_tweets(&pool, &kind, &items).await {
                        error!(error = ?err, kind = %kind, "store.put_query_tweets.failed");
                    }
                });
            }
            StoreMsg::GetQueryTweets { kind, reply } => {
                let pool = self.pool.clone();
                tokio::spawn(async move {
                    let res = get_query_tweets(&pool, &kind).await.unwrap_or_else(|err| {
                        error!(error = ?err, kind = %kind, "store.get_query_tweets.failed");
                        Vec::new()
                    });
                    let _ = reply.send(res);
                });
            }
        }
        Ok(())
    }
}

async fn put_last_id(pool: &SqlitePool, uid: &str, id: &str) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO last_id (uid, id) VALUES (?1, ?2)
           ON CONFLICT(uid) DO UPDATE SET id = excluded.id"#,
    )
    .bind(uid)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn get_last_id(pool: &SqlitePool, uid: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT id FROM last_id WHERE uid = ?1")
        .bind(uid)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(id,)| id))
}

async fn put_query_tweets(pool: &SqlitePool, kind: &str, items: &[(String, i64)]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for (tweet_id, seen_at) in items {
        sqlx::query(
            r#"INSERT INTO query_tweets (kind, tweet_id, seen_at) VALUES (?1, ?2, ?3)
               ON CONFLICT(kind, tweet_id) DO UPDATE SET seen_at = excluded.seen_at"#,
        )
        .bind(kind)
        .bind(tweet_id)
        .bind(seen_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

async fn get_query_tweets(pool: &SqlitePool, kind: &str) -> Result<Vec<(String, i64)>> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT tweet_id, seen_at FROM query_tweets WHERE kind = ?1")
            .bind(kind)
            .fetch_all(pool)
            .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn last_id_round_trips_and_upserts() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();
        assert_eq!(get_last_id(&pool, "uid-1").await.unwrap(), None);
        put_last_id(&pool, "uid-1", "100").await.unwrap();
        assert_eq!(
            get_last_id(&pool, "uid-1").await.unwrap(),
            Some("100".to_string())
        );
        put_last_id(&pool, "uid-1", "200").await.unwrap();
        assert_eq!(
            get_last_id(&pool, "uid-1").await.unwrap(),
            Some("200".to_string())
        );
    }

    #[tokio::test]
    async fn query_tweets_accumulate_per_kind() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();
        put_query_tweets(
            &pool,
            "user_timeline",
            &[("1".into(), 10), ("2".into(), 20)],
        )
        .await
        .unwrap();
        put_query_tweets(&pool, "user_timeline", &[("3".into(), 30)])
            .await
            .unwrap();
        let mut rows = get_query_tweets(&pool, "user_timeline").await.unwrap();
        rows.sort();
        assert_eq!(
            rows,
            vec![
                ("1".to_string(), 10),
                ("2".to_string(), 20),
                ("3".to_string(), 30),
            ]
        );
        assert!(get_query_tweets(&pool, "free_search")
            .await
            .unwrap()
            .is_empty());
    }
}
