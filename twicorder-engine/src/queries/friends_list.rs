//! `friends_list` (`FriendsListQuery`): single-page, no pagination path and
//! no resume token. Empty `save()` override upstream (spec.md §4.9); falls
//! through to the default disk write.

use crate::query::Query;
use std::collections::BTreeMap;
use twicorder_social::QueryKind;

pub fn build(output: Option<String>, kwargs: BTreeMap<String, String>) -> Query {
    Query::new(QueryKind::FriendsList, output, kwargs)
}
