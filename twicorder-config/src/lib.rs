//! Configuration loading for Twicorder (spec.md §4.10/§6): the runtime
//! config YAML, the credentials YAML, and the task-list YAML.
//!
//! Kept on the teacher's own `config`-crate + `serde_yaml` stack
//! (`NowhereConfigLoader` in this crate's earlier form); configuration
//! errors are always fatal at startup (spec.md §7), so every loader here
//! returns a plain `Result` for `main` to surface and exit non-zero on.

pub mod credentials;
pub mod runtime;
pub mod tasks;

pub use credentials::{ApplicationCredentials, Credentials, UserCredentials};
pub use runtime::{ConfigService, RuntimeConfig};
pub use tasks::{RawTask, TaskList};

use thiserror::Error;

/// Fatal at startup, per spec.md §7's "Configuration error" taxonomy entry.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

pub(crate) fn load_yaml<T: serde::de::DeserializeOwned>(
    path: &std::path::Path,
) -> Result<T, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}
