//! `user_timeline` (`TimelineQuery` in `request_queries.py`): no declared
//! pagination path of its own — `Query::run` synthesises `max_id` from the
//! freshest item's `id_str` after every page and halts once that token
//! stops advancing or a page comes back empty.

use crate::query::Query;
use std::collections::BTreeMap;
use twicorder_social::QueryKind;

pub fn build(output: Option<String>, kwargs: BTreeMap<String, String>) -> Query {
    Query::new(QueryKind::UserTimeline, output, kwargs)
}
