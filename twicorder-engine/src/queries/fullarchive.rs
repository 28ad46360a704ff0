//! `fullarchive_get`/`fullarchive_post` (`FullArchiveGetQuery`,
//! `FullArchivePostQuery`): the premium full-archive search endpoint, hit
//! either two-legged (GET, user context) or app-only (POST, bearer). Both
//! page via the bare `next` token; empty `save()` overrides upstream
//! (spec.md §4.9) so both fall through to the default disk write.

use crate::query::Query;
use std::collections::BTreeMap;
use twicorder_social::QueryKind;

pub fn build_get(output: Option<String>, kwargs: BTreeMap<String, String>) -> Query {
    Query::new(QueryKind::FullArchiveGet, output, kwargs)
}

pub fn build_post(output: Option<String>, kwargs: BTreeMap<String, String>) -> Query {
    Query::new(QueryKind::FullArchivePost, output, kwargs)
}
