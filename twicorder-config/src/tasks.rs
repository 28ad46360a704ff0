//! Task-list YAML (spec.md §3/§6): a mapping from query kind to a list of
//! task entries. This crate only parses the document — turning a
//! `RawTask` into a `twicorder_engine::task::Task` is `twicorder-app`'s
//! job, since `twicorder-engine` already depends on `twicorder-config`
//! and a reverse dependency would cycle.
//!
//! Grounded on `TaskManager.load` in
//! `examples/original_source/python/twicorder/search/tasks.py`: the same
//! `{kind: [{frequency, multipart, kwargs}]}` shape, with the same
//! `frequency` default of 15 minutes and `multipart` default of `true`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Map;

use crate::{load_yaml, ConfigError};

fn default_frequency() -> u64 {
    15
}

fn default_multipart() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTask {
    #[serde(default = "default_frequency")]
    pub frequency: u64,
    #[serde(default = "default_multipart")]
    pub multipart: bool,
    pub output: Option<String>,
    #[serde(default)]
    pub kwargs: Map<String, serde_json::Value>,
}

/// `query kind -> Vec<RawTask>`, exactly the YAML shape in spec.md §6.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct TaskList(BTreeMap<String, Vec<RawTask>>);

impl TaskList {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_yaml(path.as_ref())
    }

    /// Flatten into `(kind, task)` pairs, in kind-then-declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &RawTask)> {
        self.0
            .iter()
            .flat_map(|(kind, tasks)| tasks.iter().map(move |t| (kind.as_str(), t)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &tempfile::TempDir, yaml: &str) -> std::path::PathBuf {
        let path = dir.path().join("tasks.yaml");
        std::fs::write(&path, yaml).unwrap();
        path
    }

    #[test]
    fn parses_the_spec_example() {
        let dir = tempdir().unwrap();
        let path = write(
            &dir,
            r#"
user_timeline:
  - frequency: 15
    kwargs: {screen_name: slpng_giants}
free_search:
  - frequency: 10
    kwargs: {q: "@slpng_giants"}
"#,
        );
        let tasks = TaskList::load(&path).unwrap();
        let entries: Vec<_> = tasks.entries().collect();
        assert_eq!(entries.len(), 2);
        let (kind, task) = entries
            .iter()
            .find(|(kind, _)| *kind == "user_timeline")
            .unwrap();
        assert_eq!(*kind, "user_timeline");
        assert_eq!(task.frequency, 15);
        assert!(task.multipart);
        assert_eq!(
            task.kwargs.get("screen_name").unwrap().as_str(),
            Some("slpng_giants")
        );
    }

    #[test]
    fn frequency_and_multipart_default_when_absent() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "user_timeline:\n  - kwargs: {screen_name: alice}\n");
        let tasks = TaskList::load(&path).unwrap();
        let (_, task) = tasks.entries().next().unwrap();
        assert_eq!(task.frequency, 15);
        assert!(task.multipart);
    }
}
