//! `user` (`UserQuery` in `request_queries.py`): `Query::save` suppresses
//! the disk write for this kind and pushes every returned profile into the
//! User Cache instead, per spec.md §4.6's table footnote.

use crate::query::Query;
use std::collections::BTreeMap;
use twicorder_social::QueryKind;

pub fn build(output: Option<String>, kwargs: BTreeMap<String, String>) -> Query {
    Query::new(QueryKind::UserLookup, output, kwargs)
}
