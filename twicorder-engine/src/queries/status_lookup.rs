//! `status` (`StatusQuery`): single-page lookup of specific tweet ids, no
//! pagination and no resume token. Its `save()` override is empty in the
//! Python source (spec.md §4.9's open question) so this kind still writes
//! to disk via the default `Query::save` path rather than inventing a
//! side-effect the spec leaves unspecified.

use crate::query::Query;
use std::collections::BTreeMap;
use twicorder_social::QueryKind;

pub fn build(output: Option<String>, kwargs: BTreeMap<String, String>) -> Query {
    Query::new(QueryKind::StatusLookup, output, kwargs)
}
