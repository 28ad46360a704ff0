//! `free_search` (`StandardSearchQuery`): appends the opaque
//! `search_metadata.next_results` cursor verbatim rather than re-merging
//! kwargs, and forces `tweet_mode=extended` when the caller didn't set it
//! — a workaround for the v1.1 search endpoint silently truncating text
//! otherwise.
//!
//! The verbatim cursor can itself omit `tweet_mode` on later pages (the
//! server doesn't echo it back into `next_results`); the repair is reapplied
//! there too, in `twitter::client::fetch_page`.

use crate::query::Query;
use std::collections::BTreeMap;
use twicorder_social::QueryKind;

pub fn build(output: Option<String>, mut kwargs: BTreeMap<String, String>) -> Query {
    kwargs
        .entry("tweet_mode".to_string())
        .or_insert_with(|| "extended".to_string());
    Query::new(QueryKind::FreeSearch, output, kwargs)
}
