//! Runtime config YAML (spec.md §6/§4.10): output paths, file-naming
//! affixes, cache TTLs, feature toggles, plus the inert stream-listener
//! fields the core carries but never acts on (the listener itself is a
//! collaborator, spec.md §1).
//!
//! `ConfigService::get` mirrors `Config.get` in
//! `examples/original_source/python/twicorder/config.py`: serve the
//! cached snapshot until `config_reload_interval` seconds have elapsed
//! since the last load, then re-read from disk.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::{load_yaml, ConfigError};

fn default_reload_interval() -> u64 {
    300
}
fn default_output_dir() -> String {
    "output".to_string()
}
fn default_save_postfix() -> String {
    ".json".to_string()
}
fn default_user_lookup_interval() -> u64 {
    15
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    Filter,
    Sample,
}

/// Process-wide configuration, spec.md §6's "Recognised options".
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Seconds between on-disk reloads (`ConfigService::get`).
    #[serde(default = "default_reload_interval")]
    pub config_reload_interval: u64,
    /// Base directory captured files are written under.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Output filename prefix (spec.md §3's naming policy).
    #[serde(default)]
    pub save_prefix: String,
    /// Output filename postfix; its extension selects plain vs. gzip
    /// (spec.md §4.5).
    #[serde(default = "default_save_postfix")]
    pub save_postfix: String,
    /// Max items per output file. Listener-only (spec.md §6); carried but
    /// unused by the core scheduler/query path.
    #[serde(default)]
    pub tweets_per_file: Option<u64>,
    /// User Cache TTL, in minutes (spec.md §3's `CachedUser` invariant).
    #[serde(default = "default_user_lookup_interval")]
    pub user_lookup_interval: u64,
    /// Enable mention expansion (spec.md §4.4).
    #[serde(default = "default_true")]
    pub full_user_mentions: bool,
    /// Enable the document-DB upsert (spec.md §4.5).
    #[serde(default)]
    pub use_mongo: bool,

    // Stream-listener options (spec.md §6): parsed and carried, never
    // acted on by this core — the listener is an out-of-scope collaborator.
    #[serde(default)]
    pub track: Option<Vec<String>>,
    #[serde(default)]
    pub follow: Option<Vec<String>>,
    #[serde(default)]
    pub locations: Option<Vec<f64>>,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    #[serde(default)]
    pub stall_warnings: Option<bool>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub filter_level: Option<String>,
    #[serde(default)]
    pub follow_also_tracks: Option<bool>,
    #[serde(default)]
    pub stream_mode: Option<StreamMode>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            config_reload_interval: default_reload_interval(),
            output_dir: default_output_dir(),
            save_prefix: String::new(),
            save_postfix: default_save_postfix(),
            tweets_per_file: None,
            user_lookup_interval: default_user_lookup_interval(),
            full_user_mentions: true,
            use_mongo: false,
            track: None,
            follow: None,
            locations: None,
            languages: None,
            stall_warnings: None,
            encoding: None,
            filter_level: None,
            follow_also_tracks: None,
            stream_mode: None,
        }
    }
}

impl RuntimeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_yaml(path.as_ref())
    }
}

struct Cache {
    config: RuntimeConfig,
    loaded_at: Instant,
}

/// Owns the on-disk path and the cached snapshot; reloads on access once
/// `config_reload_interval` has elapsed since the last load.
pub struct ConfigService {
    path: PathBuf,
    cache: Mutex<Cache>,
}

impl ConfigService {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = RuntimeConfig::load(&path)?;
        Ok(Self {
            path,
            cache: Mutex::new(Cache {
                config,
                loaded_at: Instant::now(),
            }),
        })
    }

    /// Return the current snapshot, reloading from disk first if the
    /// configured interval has elapsed. A reload failure (e.g. the file
    /// was briefly truncated mid-write) keeps serving the last-good
    /// snapshot rather than propagating a transient read error.
    pub fn get(&self) -> RuntimeConfig {
        let mut cache = self.cache.lock().expect("config cache mutex poisoned");
        let max_age = Duration::from_secs(cache.config.config_reload_interval);
        if cache.loaded_at.elapsed() > max_age {
            match RuntimeConfig::load(&self.path) {
                Ok(fresh) => {
                    cache.config = fresh;
                    cache.loaded_at = Instant::now();
                }
                Err(err) => {
                    tracing::warn!(error = %err, path = %self.path.display(), "config.reload_failed");
                }
            }
        }
        cache.config.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_fill_in_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "output_dir: captures\n").unwrap();
        let cfg = RuntimeConfig::load(&path).unwrap();
        assert_eq!(cfg.output_dir, "captures");
        assert_eq!(cfg.save_postfix, ".json");
        assert_eq!(cfg.user_lookup_interval, 15);
        assert!(cfg.full_user_mentions);
        assert!(!cfg.use_mongo);
    }

    #[test]
    fn service_serves_cached_snapshot_until_interval_elapses() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "config_reload_interval: 3600\noutput_dir: first\n").unwrap();
        let service = ConfigService::load(&path).unwrap();
        assert_eq!(service.get().output_dir, "first");

        std::fs::write(&path, "config_reload_interval: 3600\noutput_dir: second\n").unwrap();
        // Interval hasn't elapsed yet; still serves the cached snapshot.
        assert_eq!(service.get().output_dir, "first");
    }

    #[test]
    fn service_reloads_once_interval_elapses() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "config_reload_interval: 0\noutput_dir: first\n").unwrap();
        let service = ConfigService::load(&path).unwrap();
        assert_eq!(service.get().output_dir, "first");

        std::fs::write(&path, "config_reload_interval: 0\noutput_dir: second\n").unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(service.get().output_dir, "second");
    }
}
