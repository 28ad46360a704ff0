//! Task Manager (§4.8): loads the declarative task list and tracks which
//! tasks are due to be dispatched.
//!
//! A direct Rust port of `Task`/`TaskManager` in
//! `examples/original_source/python/twicorder/search/tasks.py`: `due`
//! returns true on first access and again once `frequency` minutes have
//! elapsed since the previous true, stamping the edge as a side effect of
//! the check itself.

use std::time::{Duration, Instant};

use serde_json::Map;
use twicorder_social::QueryKind;

/// One declarative unit from the task list YAML (spec.md §3/§6): a query
/// kind, how often to cast it, whether to follow pagination, an optional
/// output bucket, and free-form kwargs. Immutable once constructed; `due`
/// state lives in [`TaskManager`], not here, matching the Python source's
/// `_last_run` being an instance attribute mutated by the property getter.
#[derive(Debug, Clone)]
pub struct Task {
    pub kind: String,
    pub frequency_minutes: u64,
    pub multipart: bool,
    pub output: Option<String>,
    pub kwargs: Map<String, serde_json::Value>,
}

impl Task {
    pub fn new(
        kind: impl Into<String>,
        frequency_minutes: u64,
        multipart: bool,
        output: Option<String>,
        kwargs: Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            kind: kind.into(),
            frequency_minutes,
            multipart,
            output,
            kwargs,
        }
    }

    /// The kwargs as plain string pairs, the shape [`crate::query::Query`]
    /// consumes. Non-string values are rendered with their JSON text (so a
    /// YAML `frequency: 10` style integer kwarg still reaches the query).
    pub fn string_kwargs(&self) -> std::collections::BTreeMap<String, String> {
        self.kwargs
            .iter()
            .map(|(k, v)| {
                let s = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), s)
            })
            .collect()
    }

    pub fn query_kind(&self) -> Option<QueryKind> {
        QueryKind::from_str(&self.kind)
    }
}

/// Per-task dispatch bookkeeping: whether it's due, and when it last was.
struct TaskState {
    task: Task,
    last_run: Option<Instant>,
}

/// Loads and holds the task list for the Scheduler's tick loop.
///
/// Kept as a plain owned collection (spec.md §9 removes the Python
/// source's class-level `_tasks` singleton) injected into
/// [`crate::scheduler::Scheduler`] rather than reached for globally.
pub struct TaskManager {
    tasks: Vec<TaskState>,
}

impl TaskManager {
    /// Build a manager from an already-parsed task list (one per
    /// `kind -> Vec<task entry>` mapping, per spec.md §6).
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks: tasks
                .into_iter()
                .map(|task| TaskState {
                    task,
                    last_run: None,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Iterate tasks that are due right now, stamping the dispatch edge
    /// for each one returned (matching the Python property's side effect:
    /// calling `due` *is* the act of marking it dispatched).
    pub fn due_tasks(&mut self) -> Vec<Task> {
        let now = Instant::now();
        let mut due = Vec::new();
        for state in &mut self.tasks {
            let is_due = match state.last_run {
                None => true,
                Some(last) => now.duration_since(last) >= Duration::from_secs(state.task.frequency_minutes * 60),
            };
            if is_due {
                state.last_run = Some(now);
                due.push(state.task.clone());
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(frequency_minutes: u64) -> Task {
        Task::new("user_timeline", frequency_minutes, true, None, Map::new())
    }

    #[test]
    fn due_on_first_access_only_once_until_frequency_elapses() {
        let mut mgr = TaskManager::new(vec![task(15)]);
        assert_eq!(mgr.due_tasks().len(), 1);
        assert_eq!(mgr.due_tasks().len(), 0);
    }

    #[test]
    fn due_again_once_frequency_window_has_elapsed() {
        let mut mgr = TaskManager::new(vec![task(0)]);
        assert_eq!(mgr.due_tasks().len(), 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(mgr.due_tasks().len(), 1);
    }

    #[test]
    fn string_kwargs_stringifies_non_string_values() {
        let mut kwargs = Map::new();
        kwargs.insert("screen_name".into(), serde_json::json!("slpng_giants"));
        kwargs.insert("count".into(), serde_json::json!(200));
        let t = Task::new("user_timeline", 15, true, None, kwargs);
        let sk = t.string_kwargs();
        assert_eq!(sk.get("screen_name").unwrap(), "slpng_giants");
        assert_eq!(sk.get("count").unwrap(), "200");
    }
}
