//! Scheduler (§4.9): owns the Task Manager and Query Exchange, and on
//! every tick casts each due task into a concrete query and submits it.
//!
//! A direct Rust port of `Scheduler`/`WorkerThread` in
//! `examples/original_source/python/twicorder/search/scheduler.py`, with
//! spec.md §9's redesign applied: the Python source discovers concrete
//! query classes via `inspect.getmembers`; this uses the explicit
//! `QueryKind`/`queries::build` registry instead.

use std::time::Duration;

use tokio::time::interval;
use tracing::{info, warn};

use crate::exchange::QueryExchange;
use crate::queries;
use crate::task::{Task, TaskManager};

const DEFAULT_TICK: Duration = Duration::from_secs(5);

/// Polling loop: every tick, iterate tasks and submit the due ones.
///
/// Owns the [`TaskManager`] and a reference to the [`QueryExchange`] it
/// submits into; has no concept of its own concurrency beyond the single
/// tick loop (spec.md §5: "one scheduler worker").
pub struct Scheduler {
    task_manager: TaskManager,
    exchange: QueryExchange,
    tick: Duration,
}

impl Scheduler {
    pub fn new(task_manager: TaskManager, exchange: QueryExchange) -> Self {
        Self {
            task_manager,
            exchange,
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Run ticks until `shutdown` fires, then `exchange.wait()` for every
    /// worker to drain (spec.md §4.9's `stop()` contract).
    pub async fn run(&mut self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        let mut ticker = interval(self.tick);
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("scheduler.stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.dispatch_due().await;
                }
            }
        }
        self.exchange.wait().await;
    }

    /// One tick: cast every due task into a query and submit it.
    async fn dispatch_due(&mut self) {
        for task in self.task_manager.due_tasks() {
            match self.cast_query(&task) {
                Some(query) => self.exchange.add(query).await,
                None => warn!(kind = %task.kind, "scheduler.unknown_query_kind"),
            }
        }
    }

    fn cast_query(&self, task: &Task) -> Option<crate::query::Query> {
        let kind = task.query_kind()?;
        Some(queries::build(kind, task.output.clone(), task.string_kwargs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn cast_query_resolves_known_kind() {
        let task = Task::new("user_timeline", 15, true, None, Map::new());
        assert!(task.query_kind().is_some());
    }

    #[test]
    fn cast_query_rejects_unknown_kind() {
        let task = Task::new("not_a_kind", 15, true, None, Map::new());
        assert!(task.query_kind().is_none());
    }
}
