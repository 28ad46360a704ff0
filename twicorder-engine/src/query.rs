//! The Query state machine (§4.6): one instance per dispatched task,
//! mutated only by the worker that owns it, discarded once `done`.
//!
//! `run()` is a direct Rust port of `RequestQuery.run` in
//! `examples/original_source/python/twicorder/search/queries/__init__.py`:
//! consult Rate-Limit Central, build the request, attempt it with bounded
//! backoff, then pickle/save the page. The five fields concrete queries
//! differ by (endpoint, results path, pagination path, resume key, method)
//! come from `twicorder_social::QueryKind::spec`; the two behavioural
//! overrides (`Timeline`, `FreeSearch`) and `UserLookup`'s save-to-cache
//! live in `queries/`.

use crate::actor::Addr;
use crate::output::OutputWriter;
use crate::rate_limit::{RateLimitCentral, RateLimitMsg};
use crate::store::{AppDataStore, StoreMsg};
use crate::user_cache::{UserCache, UserCacheMsg};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};
use twicorder_social::{EndpointSpec, QueryKind, TwitterClient, TwitterClientError};

const MAX_ATTEMPTS: u32 = 5;
const RATE_LIMIT_JITTER_SECS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Pending,
    Running,
    PageOk,
    WaitingForQuota,
    TransientError,
    Done,
    Failed,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("transport error after {attempts} attempts: {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: TwitterClientError,
    },
    #[error("navigation error: no such path {path:?} in response body")]
    Navigation { path: String },
    #[error("parse error: {0}")]
    Parse(String),
}

/// One in-flight execution of a concrete query kind.
pub struct Query {
    pub kind: QueryKind,
    spec: EndpointSpec,
    pub uid: String,
    pub output: Option<String>,
    kwargs: BTreeMap<String, String>,
    pub done: bool,
    more_results: Option<String>,
    pub last_id: Option<String>,
    results: Vec<Value>,
}

impl Query {
    /// Construct a query for `kind`, computing its stable `uid` from the
    /// declarative inputs (endpoint, paths, original kwargs, base URL) per
    /// spec.md §3, before any resume-token injection.
    pub fn new(kind: QueryKind, output: Option<String>, kwargs: BTreeMap<String, String>) -> Self {
        let spec = kind.spec();
        let uid = compute_uid(&spec, &kwargs);
        Self {
            kind,
            spec,
            uid,
            output,
            kwargs,
            done: false,
            more_results: None,
            last_id: None,
            results: Vec::new(),
        }
    }

    pub fn endpoint(&self) -> &'static str {
        self.spec.endpoint
    }

    /// Inject a previously persisted resume token under the kind's declared
    /// resume key, if one exists for this `uid`.
    pub async fn load_resume_token(&mut self, store: &Addr<AppDataStore>) {
        let Some(key) = self.spec.resume_key else {
            return;
        };
        let (tx, rx) = oneshot::channel();
        if store
            .send(StoreMsg::GetLastId {
                uid: self.uid.clone(),
                reply: tx,
            })
            .await
            .is_err()
        {
            return;
        }
        if let Ok(Some(last_id)) = rx.await {
            self.kwargs.insert(key.to_string(), last_id);
        }
    }

    /// Run exactly one page of this query, per the nine numbered steps of
    /// spec.md §4.6.
    pub async fn run(
        &mut self,
        client: &TwitterClient,
        rate_limit: &Addr<RateLimitCentral>,
        store: &Addr<AppDataStore>,
        output: &OutputWriter,
        user_cache: Option<&Addr<UserCache>>,
    ) -> QueryState {
        // 1. Rate-Limit Central gate.
        if let Some(limit) = current_limit(rate_limit, self.spec.endpoint).await {
            if limit.remaining == 0 {
                let now = unix_now();
                let sleep_secs = (limit.reset - now).max(0) + RATE_LIMIT_JITTER_SECS;
                info!(endpoint = %self.spec.endpoint, sleep_secs, "query.rate_limited.sleeping");
                sleep(Duration::from_secs(sleep_secs.max(0) as u64)).await;
            }
        }

        // 2. Build request: either the opaque raw cursor, or a kwargs merge.
        let raw_cursor = if self.kind == QueryKind::FreeSearch {
            self.more_results.as_deref()
        } else {
            None
        };
        let params = self.effective_params();

        // 3. Attempt with exponential backoff on transport failure.
        let page = match self.attempt(client, &params, raw_cursor).await {
            Ok(page) => page,
            Err(_) => return QueryState::TransientError,
        };
        let (body, headers) = match page {
            Some(ok) => ok,
            None => return QueryState::WaitingForQuota,
        };

        // 5. Update Rate-Limit Central from response headers.
        let _ = rate_limit
            .send(RateLimitMsg::Update {
                endpoint: self.spec.endpoint.to_string(),
                headers,
            })
            .await;

        // 6. Navigate fetch_more_path.
        self.advance_cursor(&body);

        // 7. Navigate results_path.
        let page_items = navigate(&body, self.spec.results_path)
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default();
        self.results = page_items;

        // 8. pickle() + save() on a non-empty page.
        if !self.results.is_empty() {
            self.pickle(store).await;
            if self.last_id.is_none() {
                if let Some(id) = self
                    .results
                    .first()
                    .and_then(|r| r.get("id_str"))
                    .and_then(|v| v.as_str())
                {
                    self.last_id = Some(id.to_string());
                }
            }
            if self.needs_mention_expansion() {
                if let Some(cache) = user_cache {
                    self.results = self.expand_mentions(cache, client, rate_limit).await;
                }
            }
            self.save(output, user_cache).await;
        }

        // 9. Persist LastID only once the whole paged walk is clean.
        if self.done {
            if let Some(last_id) = self.last_id.clone() {
                let _ = store
                    .send(StoreMsg::PutLastId {
                        uid: self.uid.clone(),
                        id: last_id,
                    })
                    .await;
            }
        }

        QueryState::PageOk
    }

    /// Merge kwargs with the pagination cursor for kinds whose
    /// `more_results` token is a plain opaque value meant to ride along as
    /// a `next` parameter rather than being re-parsed as a query string
    /// (`FreeSearch`'s `next_results` fragment is handled separately, via
    /// `raw_cursor` in `run()`).
    fn effective_params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = self
            .kwargs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if matches!(
            self.kind,
            QueryKind::FullArchiveGet | QueryKind::FullArchivePost
        ) {
            if let Some(cursor) = &self.more_results {
                params.push(("next".to_string(), cursor.clone()));
            }
        }
        params
    }

    async fn attempt(
        &self,
        client: &TwitterClient,
        params: &[(String, String)],
        raw_cursor: Option<&str>,
    ) -> Result<Option<(Value, reqwest::header::HeaderMap)>, QueryError> {
        for attempt in 0..MAX_ATTEMPTS {
            match client.fetch_page(&self.spec, params, raw_cursor).await {
                Ok(ok) => return Ok(Some(ok)),
                Err(TwitterClientError::Http(twicorder_http::HttpError::Api {
                    status,
                    message,
                    ..
                })) if status.as_u16() == 429 => {
                    warn!(endpoint = %self.spec.endpoint, %message, "query.rate_limited.response");
                    return Ok(None);
                }
                Err(TwitterClientError::Http(twicorder_http::HttpError::Api {
                    status,
                    message,
                    ..
                })) => {
                    warn!(endpoint = %self.spec.endpoint, %status, %message, "query.http_error");
                    return Ok(None);
                }
                Err(err) => {
                    let backoff = 2u64.saturating_pow(attempt);
                    debug!(endpoint = %self.spec.endpoint, attempt, backoff, error = %err, "query.transport_error.retrying");
                    if attempt + 1 == MAX_ATTEMPTS {
                        warn!(endpoint = %self.spec.endpoint, attempts = MAX_ATTEMPTS, error = %err, "query.transport_error.exhausted");
                        return Err(QueryError::Transport {
                            attempts: MAX_ATTEMPTS,
                            source: err,
                        });
                    }
                    sleep(Duration::from_secs(backoff)).await;
                }
            }
        }
        unreachable!("loop always returns before exhausting MAX_ATTEMPTS iterations")
    }

    /// Advance the pagination cursor. `Timeline` synthesises its own cursor
    /// from the freshest item id instead of following `fetch_more_path`; a
    /// kind with no declared pagination path at all (`user`, `status`,
    /// `friends_list`, `rate_limit_status` — spec.md §4.6's table entries
    /// with a `—` pagination column) is always done after its one page,
    /// since `navigate(body, "")` would otherwise hand back the whole body
    /// as a non-empty "cursor" and the walk would never terminate.
    fn advance_cursor(&mut self, body: &Value) {
        if self.kind == QueryKind::UserTimeline {
            self.advance_timeline_cursor(body);
            return;
        }
        if self.spec.fetch_more_path.is_empty() {
            self.more_results = None;
            self.done = true;
            return;
        }
        match navigate(body, self.spec.fetch_more_path) {
            Some(Value::String(s)) if !s.is_empty() => self.more_results = Some(s),
            Some(v) if !v.is_null() && v != Value::String(String::new()) => {
                self.more_results = Some(v.to_string())
            }
            _ => {
                self.more_results = None;
                self.done = true;
            }
        }
    }

    fn advance_timeline_cursor(&mut self, body: &Value) {
        let items = body.as_array().cloned().unwrap_or_default();
        let Some(last) = items.last().and_then(|v| v.get("id_str")).and_then(|v| v.as_str())
        else {
            self.done = true;
            return;
        };
        let prior = self.more_results.clone();
        if items.is_empty() || prior.as_deref() == Some(last) {
            self.done = true;
            return;
        }
        self.more_results = Some(last.to_string());
        self.kwargs.insert("max_id".to_string(), last.to_string());
    }

    /// Dedup the page against this query kind's tweet history, persisting
    /// the survivors' `(id, created_at_unix)` pairs.
    async fn pickle(&mut self, store: &Addr<AppDataStore>) {
        if self.kind == QueryKind::UserLookup {
            return;
        }
        let kind_tag = self.kind.as_str().to_string();
        let (tx, rx) = oneshot::channel();
        if store
            .send(StoreMsg::GetQueryTweets {
                kind: kind_tag.clone(),
                reply: tx,
            })
            .await
            .is_err()
        {
            return;
        }
        let seen: std::collections::HashSet<String> = rx
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        self.results.retain(|item| {
            item.get("id_str")
                .and_then(|v| v.as_str())
                .map(|id| !seen.contains(id))
                .unwrap_or(true)
        });

        let fresh: Vec<(String, i64)> = self
            .results
            .iter()
            .filter_map(|item| {
                let id = item.get("id_str")?.as_str()?.to_string();
                let ts = item
                    .get("created_at")
                    .and_then(|v| v.as_str())
                    .and_then(|raw| twicorder_social::twitter::types::parse_tw_time(raw).ok())
                    .map(|dt| dt.timestamp())
                    .unwrap_or_else(unix_now);
                Some((id, ts))
            })
            .collect();
        if !fresh.is_empty() {
            let _ = store
                .send(StoreMsg::PutQueryTweets {
                    kind: kind_tag,
                    items: fresh,
                })
                .await;
        }
    }

    /// `Timeline` and `FreeSearch` expand `user_mentions` stubs into full
    /// profiles before saving (spec.md §4.6's two behavioural overrides);
    /// every other kind leaves mentions untouched.
    fn needs_mention_expansion(&self) -> bool {
        matches!(self.kind, QueryKind::UserTimeline | QueryKind::FreeSearch)
    }

    /// Drive the User Cache's mention-expansion critical section,
    /// resolving any missing mentioned users through a synthetic
    /// `users/lookup` call (spec.md §4.4) rather than the full Query
    /// Exchange, since the result must splice back into this page before
    /// it returns.
    async fn expand_mentions(
        &self,
        cache: &Addr<UserCache>,
        client: &TwitterClient,
        rate_limit: &Addr<RateLimitCentral>,
    ) -> Vec<Value> {
        let client = client.clone();
        let rate_limit = rate_limit.clone();
        let lookup: crate::user_cache::UserLookupFn = Box::new(move |ids| {
            let client = client.clone();
            let rate_limit = rate_limit.clone();
            Box::pin(fetch_user_lookup_chunk(client, rate_limit, ids))
        });
        let (tx, rx) = oneshot::channel();
        if cache
            .send(UserCacheMsg::ExpandMentions {
                tweets: self.results.clone(),
                lookup,
                reply: tx,
            })
            .await
            .is_err()
        {
            return self.results.clone();
        }
        rx.await.unwrap_or_else(|_| self.results.clone())
    }

    /// `UserLookup` suppresses the disk write and instead feeds the User
    /// Cache; every other kind writes one JSON record per line.
    async fn save(&self, output: &OutputWriter, user_cache: Option<&Addr<UserCache>>) {
        if self.kind == QueryKind::UserLookup {
            if let Some(cache) = user_cache {
                for user in &self.results {
                    let _ = cache
                        .send(UserCacheMsg::Add {
                            payload: user.clone(),
                        })
                        .await;
                }
            }
            return;
        }
        let Some(bucket) = self.output.clone().or_else(|| Some(self.uid.clone())) else {
            return;
        };
        if let Err(err) = output
            .write_records(self.kind.as_str(), &bucket, &self.results)
            .await
        {
            warn!(kind = %self.kind, bucket = %bucket, error = %err, "query.save.failed");
        }
    }
}

/// One `users/lookup` call for a chunk of up to 100 ids (spec.md §4.4),
/// respecting the same rate-limit gate a regular query page would.
async fn fetch_user_lookup_chunk(
    client: TwitterClient,
    rate_limit: Addr<RateLimitCentral>,
    ids: Vec<String>,
) -> Vec<Value> {
    let spec = QueryKind::UserLookup.spec();
    if let Some(limit) = current_limit(&rate_limit, spec.endpoint).await {
        if limit.remaining == 0 {
            let now = unix_now();
            let sleep_secs = (limit.reset - now).max(0) + RATE_LIMIT_JITTER_SECS;
            sleep(Duration::from_secs(sleep_secs.max(0) as u64)).await;
        }
    }
    let params = vec![("user_id".to_string(), ids.join(","))];
    match client.fetch_page(&spec, &params, None).await {
        Ok((body, headers)) => {
            let _ = rate_limit
                .send(RateLimitMsg::Update {
                    endpoint: spec.endpoint.to_string(),
                    headers,
                })
                .await;
            body.as_array().cloned().unwrap_or_default()
        }
        Err(err) => {
            warn!(error = %err, "query.mention_expansion.lookup_failed");
            Vec::new()
        }
    }
}

async fn current_limit(
    rate_limit: &Addr<RateLimitCentral>,
    endpoint: &str,
) -> Option<crate::rate_limit::RateLimit> {
    let (tx, rx) = oneshot::channel();
    rate_limit
        .send(RateLimitMsg::Get {
            endpoint: endpoint.to_string(),
            reply: tx,
        })
        .await
        .ok()?;
    rx.await.ok().flatten()
}

fn compute_uid(spec: &EndpointSpec, original_kwargs: &BTreeMap<String, String>) -> String {
    let mut hasher_input = String::new();
    hasher_input.push_str(spec.endpoint);
    hasher_input.push('\0');
    hasher_input.push_str(spec.results_path);
    hasher_input.push('\0');
    hasher_input.push_str(spec.fetch_more_path);
    hasher_input.push('\0');
    for (k, v) in original_kwargs {
        hasher_input.push_str(k);
        hasher_input.push('=');
        hasher_input.push_str(v);
        hasher_input.push('&');
    }
    hasher_input.push('\0');
    hasher_input.push_str("https://api.twitter.com/1.1");
    hex::encode(blake3::hash(hasher_input.as_bytes()).as_bytes())
}

fn navigate<'a>(value: &'a Value, dot_path: &str) -> Option<&'a Value> {
    if dot_path.is_empty() {
        return Some(value);
    }
    dot_path
        .split('.')
        .try_fold(value, |current, segment| current.get(segment))
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_is_stable_for_identical_inputs() {
        let spec = QueryKind::UserTimeline.spec();
        let mut kwargs = BTreeMap::new();
        kwargs.insert("screen_name".to_string(), "slpng_giants".to_string());
        let a = compute_uid(&spec, &kwargs);
        let b = compute_uid(&spec, &kwargs);
        assert_eq!(a, b);
    }

    #[test]
    fn uid_differs_for_different_kwargs() {
        let spec = QueryKind::UserTimeline.spec();
        let mut kwargs_a = BTreeMap::new();
        kwargs_a.insert("screen_name".to_string(), "slpng_giants".to_string());
        let mut kwargs_b = BTreeMap::new();
        kwargs_b.insert("screen_name".to_string(), "slpng_giants_no".to_string());
        assert_ne!(compute_uid(&spec, &kwargs_a), compute_uid(&spec, &kwargs_b));
    }

    #[test]
    fn navigate_handles_dot_paths_and_missing_segments() {
        let body = serde_json::json!({"search_metadata": {"next_results": "?cursor=1"}});
        assert_eq!(
            navigate(&body, "search_metadata.next_results").and_then(|v| v.as_str()),
            Some("?cursor=1")
        );
        assert!(navigate(&body, "search_metadata.missing").is_none());
        assert_eq!(navigate(&body, ""), Some(&body));
    }

    #[test]
    fn new_query_computes_uid_before_resume_token_injection() {
        let mut kwargs = BTreeMap::new();
        kwargs.insert("q".to_string(), "@slpng_giants".to_string());
        let query = Query::new(QueryKind::FreeSearch, None, kwargs);
        assert_eq!(query.uid.len(), 64);
        assert!(!query.done);
    }
}
