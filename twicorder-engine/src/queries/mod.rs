//! Concrete query kinds. Per spec.md §4.6 they differ only in the five
//! declared fields already captured by `twicorder_social::QueryKind::spec`,
//! so each submodule here is a thin constructor rather than a distinct
//! type — the behavioural differences (`Timeline`'s synthesised cursor,
//! `FreeSearch`'s verbatim cursor + `tweet_mode` fixup, `UserLookup`'s
//! cache-only save) live in `Query::run`/`Query::save` and are dispatched
//! on `QueryKind` there.

pub mod free_search;
pub mod fullarchive;
pub mod friends_list;
pub mod rate_limit_status;
pub mod status_lookup;
pub mod user_lookup;
pub mod user_timeline;

use crate::query::Query;
use std::collections::BTreeMap;
use twicorder_social::QueryKind;

/// Instantiate the query for `kind` with a task's output bucket and kwargs
/// (the Scheduler's per-tick dispatch, spec.md §4.9).
pub fn build(kind: QueryKind, output: Option<String>, kwargs: BTreeMap<String, String>) -> Query {
    match kind {
        QueryKind::UserTimeline => user_timeline::build(output, kwargs),
        QueryKind::FreeSearch => free_search::build(output, kwargs),
        QueryKind::UserLookup => user_lookup::build(output, kwargs),
        QueryKind::StatusLookup => status_lookup::build(output, kwargs),
        QueryKind::FullArchiveGet => fullarchive::build_get(output, kwargs),
        QueryKind::FullArchivePost => fullarchive::build_post(output, kwargs),
        QueryKind::FriendsList => friends_list::build(output, kwargs),
        QueryKind::RateLimitStatus => rate_limit_status::build(output, kwargs),
    }
}
