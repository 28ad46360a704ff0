//! Query Exchange (§4.7): one FIFO queue and one dedicated worker per
//! endpoint, deduplicating pending/running queries by `uid` so that a
//! shared rate-limit window is never hit by more than one in-flight
//! request at a time (the endpoint-keyed queue *is* the mechanism that
//! makes spec.md §4.6 step 1's single-endpoint gate sufficient).
//!
//! A direct Rust port of `QueryExchange`/`QueryWorker` in
//! `examples/original_source/python/twicorder/search/exchange.py`: queues
//! are unbounded (spec.md §5's only backpressure is the rate-limit sleep),
//! workers sleep ~200ms between pages and ~500ms between queries, and
//! `wait()` pushes a sentinel onto every queue before joining.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::info;

use crate::actor::Addr;
use crate::output::OutputWriter;
use crate::query::Query;
use crate::rate_limit::RateLimitCentral;
use crate::store::AppDataStore;
use crate::user_cache::UserCache;
use twicorder_social::TwitterClient;

const INTER_PAGE_SLEEP: Duration = Duration::from_millis(200);
const INTER_QUERY_SLEEP: Duration = Duration::from_millis(500);

enum WorkerMsg {
    Run(Query),
    Stop,
}

struct QueueEntry {
    tx: mpsc::UnboundedSender<WorkerMsg>,
    handle: JoinHandle<()>,
    /// uids currently sitting in the channel, unrun.
    pending: HashSet<String>,
    /// uid the worker is presently executing, if any.
    running: Option<String>,
}

/// Shared collaborators every endpoint worker needs to drive
/// [`Query::run`]; cloned once per worker spawn.
#[derive(Clone)]
struct Collaborators {
    client: TwitterClient,
    rate_limit: Addr<RateLimitCentral>,
    store: Addr<AppDataStore>,
    output: Arc<OutputWriter>,
    user_cache: Option<Addr<UserCache>>,
}

pub struct QueryExchange {
    queues: Arc<Mutex<HashMap<String, QueueEntry>>>,
    collaborators: Collaborators,
}

impl QueryExchange {
    pub fn new(
        client: TwitterClient,
        rate_limit: Addr<RateLimitCentral>,
        store: Addr<AppDataStore>,
        output: OutputWriter,
        user_cache: Option<Addr<UserCache>>,
    ) -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
            collaborators: Collaborators {
                client,
                rate_limit,
                store,
                output: Arc::new(output),
                user_cache,
            },
        }
    }

    /// Look up or create the queue for `query.endpoint()`; drop silently
    /// if an equivalent query (by `uid`) is already queued or running on
    /// that endpoint's worker, otherwise inject the resume token and
    /// enqueue (spec.md §4.6's "at construction" rule is applied here,
    /// right before dispatch, since resume-token lookup is async).
    pub async fn add(&self, mut query: Query) {
        let endpoint = query.endpoint().to_string();
        let uid = query.uid.clone();

        let mut queues = self.queues.lock().await;
        let entry = queues
            .entry(endpoint.clone())
            .or_insert_with(|| self.spawn_worker(endpoint.clone()));

        if entry.pending.contains(&uid) {
            info!(endpoint = %endpoint, uid = %uid, "exchange.add.already_pending");
            return;
        }
        if entry.running.as_deref() == Some(uid.as_str()) {
            info!(endpoint = %endpoint, uid = %uid, "exchange.add.already_running");
            return;
        }

        entry.pending.insert(uid.clone());
        drop(queues);

        query.load_resume_token(&self.collaborators.store).await;

        let queues = self.queues.lock().await;
        if let Some(entry) = queues.get(&endpoint) {
            if entry.tx.send(WorkerMsg::Run(query)).is_err() {
                tracing::warn!(endpoint = %endpoint, uid = %uid, "exchange.add.worker_gone");
            } else {
                info!(endpoint = %endpoint, uid = %uid, "exchange.add.enqueued");
            }
        }
    }

    fn spawn_worker(&self, endpoint: String) -> QueueEntry {
        let (tx, rx) = mpsc::unbounded_channel();
        let queues = self.queues.clone();
        let collaborators = self.collaborators.clone();
        let handle = tokio::spawn(worker_loop(endpoint, rx, queues, collaborators));
        QueueEntry {
            tx,
            handle,
            pending: HashSet::new(),
            running: None,
        }
    }

    /// Push a sentinel onto every queue and join every worker, per
    /// spec.md §4.7's `wait()` / cooperative shutdown (spec.md §5).
    pub async fn wait(&self) {
        let mut handles = Vec::new();
        {
            let queues = self.queues.lock().await;
            for entry in queues.values() {
                let _ = entry.tx.send(WorkerMsg::Stop);
            }
        }
        let mut queues = self.queues.lock().await;
        for (_, entry) in queues.drain() {
            handles.push(entry.handle);
        }
        drop(queues);
        for handle in handles {
            let _ = handle.await;
        }
    }
}

async fn worker_loop(
    endpoint: String,
    mut rx: mpsc::UnboundedReceiver<WorkerMsg>,
    queues: Arc<Mutex<HashMap<String, QueueEntry>>>,
    collaborators: Collaborators,
) {
    loop {
        let mut query = match rx.recv().await {
            Some(WorkerMsg::Run(query)) => query,
            Some(WorkerMsg::Stop) | None => break,
        };
        let uid = query.uid.clone();
        {
            let mut queues = queues.lock().await;
            if let Some(entry) = queues.get_mut(&endpoint) {
                entry.pending.remove(&uid);
                entry.running = Some(uid.clone());
            }
        }

        while !query.done {
            let state = query
                .run(
                    &collaborators.client,
                    &collaborators.rate_limit,
                    &collaborators.store,
                    &collaborators.output,
                    collaborators.user_cache.as_ref(),
                )
                .await;
            info!(endpoint = %endpoint, uid = %uid, ?state, done = query.done, "exchange.worker.page");
            sleep(INTER_PAGE_SLEEP).await;
        }

        {
            let mut queues = queues.lock().await;
            if let Some(entry) = queues.get_mut(&endpoint) {
                entry.running = None;
            }
        }
        sleep(INTER_QUERY_SLEEP).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimitCentral;
    use crate::store::AppDataStore;
    use std::collections::BTreeMap;
    use twicorder_auth::{CredentialProvider, OAuth1Credentials};
    use twicorder_social::QueryKind;

    async fn test_exchange() -> QueryExchange {
        let creds = CredentialProvider::new(OAuth1Credentials {
            consumer_key: "ck".into(),
            consumer_secret: "cs".into(),
            token: "tk".into(),
            token_secret: "ts".into(),
        });
        let client = TwitterClient::new(creds).unwrap();
        let rate_limit = crate::actor::spawn_actor(RateLimitCentral::new(), 8).addr;
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store_actor = AppDataStore::new(pool).await.unwrap();
        let store = crate::actor::spawn_actor(store_actor, 8).addr;
        let dir = tempfile::tempdir().unwrap();
        let output = OutputWriter::new(dir.path(), ".json");
        QueryExchange::new(client, rate_limit, store, output, None)
    }

    fn kwargs(screen_name: &str) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert("screen_name".to_string(), screen_name.to_string());
        m
    }

    #[tokio::test]
    async fn duplicate_pending_query_is_dropped() {
        let exchange = test_exchange().await;
        let q1 = Query::new(QueryKind::UserTimeline, None, kwargs("alice"));
        let q2 = Query::new(QueryKind::UserTimeline, None, kwargs("alice"));
        assert_eq!(q1.uid, q2.uid);

        exchange.add(q1).await;
        exchange.add(q2).await;

        let queues = exchange.queues.lock().await;
        let entry = queues.get("/statuses/user_timeline").unwrap();
        // The first add may already have been picked up by the worker, so
        // assert the invariant indirectly: at most one of pending/running
        // carries this uid, never both counted separately (no double entry).
        let pending_count = entry.pending.len();
        assert!(pending_count <= 1);
    }

    #[tokio::test]
    async fn different_uids_both_enqueue() {
        let exchange = test_exchange().await;
        exchange
            .add(Query::new(QueryKind::UserTimeline, None, kwargs("alice")))
            .await;
        exchange
            .add(Query::new(QueryKind::UserTimeline, None, kwargs("bob")))
            .await;
        // Both share the same endpoint queue.
        let queues = exchange.queues.lock().await;
        assert_eq!(queues.len(), 1);
    }
}
