//! User Cache (§4.4): a TTL-filtered profile cache plus the mention
//! expansion critical section.
//!
//! Actor-owned rather than the `DashMap` pattern `registry.rs` shows
//! elsewhere in this workspace, because `expand_mentions` must serialise
//! lookup bursts across the whole cache (spec.md §4.4/§5) — a single
//! mailbox gives that exclusion for free instead of requiring a separate
//! lock around a concurrent map.

use crate::actor::{Actor, Context};
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

const USERS_PER_LOOKUP_CHUNK: usize = 100;
const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
pub struct CachedUser {
    pub payload: Value,
    pub fetched_at: Instant,
}

#[derive(Debug)]
pub enum UserCacheMsg {
    /// Stamp `payload` with now and store it by `id_str`.
    Add {
        payload: Value,
    },
    /// Flat-merge cached-and-fresh profiles onto every `user_mentions` entry
    /// of `tweets`, fetching anything missing through `lookup` first.
    ExpandMentions {
        tweets: Vec<Value>,
        lookup: UserLookupFn,
        reply: oneshot::Sender<Vec<Value>>,
    },
}

/// Callback the caller supplies to resolve a chunk of missing user ids
/// through the Query Exchange (a synthetic `users/lookup` query per
/// spec.md §4.4); kept as a boxed closure so this actor never depends on
/// `exchange.rs` directly.
pub type UserLookupFn =
    Box<dyn Fn(Vec<String>) -> futures_lookup::BoxFuture<Vec<Value>> + Send + 'static>;

/// Tiny local shim so this crate doesn't need to pull in the `futures`
/// crate just for `BoxFuture`.
pub mod futures_lookup {
    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
}

pub struct UserCache {
    ttl: Duration,
    users: HashMap<String, CachedUser>,
}

impl UserCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            users: HashMap::new(),
        }
    }

    fn add(&mut self, payload: Value) {
        let Some(id) = payload.get("id_str").and_then(|v| v.as_str()) else {
            return;
        };
        self.users.insert(
            id.to_string(),
            CachedUser {
                payload,
                fetched_at: Instant::now(),
            },
        );
    }

    fn fresh(&self, id: &str) -> Option<&Value> {
        self.users.get(id).and_then(|cached| {
            if cached.fetched_at.elapsed() <= self.ttl {
                Some(&cached.payload)
            } else {
                None
            }
        })
    }

    async fn expand_mentions(&mut self, mut tweets: Vec<Value>, lookup: UserLookupFn) -> Vec<Value> {
        let mut missing: Vec<String> = Vec::new();
        for tweet in &tweets {
            let Some(mentions) = tweet
                .get("entities")
                .and_then(|e| e.get("user_mentions"))
                .and_then(|m| m.as_array())
            else {
                continue;
            };
            for mention in mentions {
                if let Some(id) = mention.get("id_str").and_then(|v| v.as_str()) {
                    if self.fresh(id).is_none() && !missing.contains(&id.to_string()) {
                        missing.push(id.to_string());
                    }
                }
            }
        }

        for chunk in missing.chunks(USERS_PER_LOOKUP_CHUNK) {
            let profiles = lookup(chunk.to_vec()).await;
            for profile in profiles {
                self.add(profile);
            }
        }

        for tweet in &mut tweets {
            let Some(mentions) = tweet
                .get_mut("entities")
                .and_then(|e| e.get_mut("user_mentions"))
                .and_then(|m| m.as_array_mut())
            else {
                continue;
            };
            for mention in mentions {
                if let Some(id) = mention.get("id_str").and_then(|v| v.as_str()).map(str::to_string) {
                    if let Some(profile) = self.fresh(&id) {
                        if let (Some(profile_obj), Some(obj)) =
                            (profile.as_object(), mention.as_object_mut())
                        {
                            for (k, v) in profile_obj {
                                obj.insert(k.clone(), v.clone());
                            }
                        }
                    }
                }
            }
        }
        tweets
    }
}

#[async_trait::async_trait]
impl Actor for UserCache {
    type Msg = UserCacheMsg;

    async fn handle(&mut self, msg: Self::Msg, _ctx: &mut Context<Self>) -> Result<()> {
        match msg {
            UserCacheMsg::Add { payload } => self.add(payload),
            UserCacheMsg::ExpandMentions {
                tweets,
                lookup,
                reply,
            } => {
                let expanded = self.expand_mentions(tweets, lookup).await;
                let _ = reply.send(expanded);
            }
        }
        Ok(())
    }
}

impl Default for UserCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_is_none_past_ttl() {
        let mut cache = UserCache::new(Duration::from_millis(0));
        cache.add(serde_json::json!({"id_str": "1", "screen_name": "a"}));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.fresh("1").is_none());
    }

    #[test]
    fn fresh_returns_payload_within_ttl() {
        let mut cache = UserCache::new(Duration::from_secs(60));
        cache.add(serde_json::json!({"id_str": "1", "screen_name": "a"}));
        assert!(cache.fresh("1").is_some());
        assert!(cache.fresh("2").is_none());
    }

    #[tokio::test]
    async fn expand_mentions_chunks_missing_ids_and_splices_profiles() {
        let mut cache = UserCache::new(Duration::from_secs(60));
        let tweet = serde_json::json!({
            "id_str": "900",
            "entities": {"user_mentions": [{"id_str": "42", "screen_name": "stub"}]}
        });
        let lookup: UserLookupFn = Box::new(|ids| {
            Box::pin(async move {
                ids.into_iter()
                    .map(|id| serde_json::json!({"id_str": id, "screen_name": "resolved"}))
                    .collect()
            })
        });
        let expanded = cache.expand_mentions(vec![tweet], lookup).await;
        let mention = &expanded[0]["entities"]["user_mentions"][0];
        assert_eq!(mention["screen_name"], "resolved");
        assert_eq!(mention["id_str"], "42");
    }
}
