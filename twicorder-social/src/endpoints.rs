//! Explicit query-kind registry.
//!
//! `thimic/twicorder`'s Python scheduler discovered concrete query classes
//! by reflecting over a module (`inspect.getmembers(request_queries,
//! inspect.isclass)`), keyed by each class's `_name` attribute. This is the
//! tagged-variant replacement: [`QueryKind`] enumerates every concrete query
//! by name, and [`QueryKind::spec`] is the constructor table, mapping a kind
//! to its five declared fields (endpoint, results path, pagination path,
//! resume-token key, request method/auth).

use std::fmt;

/// One of the eight concrete query kinds a task list may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    UserTimeline,
    FreeSearch,
    UserLookup,
    StatusLookup,
    FullArchiveGet,
    FullArchivePost,
    FriendsList,
    RateLimitStatus,
}

impl QueryKind {
    /// All kinds the scheduler's registry recognises, in table order.
    pub const ALL: [QueryKind; 8] = [
        QueryKind::UserTimeline,
        QueryKind::FreeSearch,
        QueryKind::UserLookup,
        QueryKind::StatusLookup,
        QueryKind::FullArchiveGet,
        QueryKind::FullArchivePost,
        QueryKind::FriendsList,
        QueryKind::RateLimitStatus,
    ];

    /// The string tag used in the task list YAML (§6).
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::UserTimeline => "user_timeline",
            QueryKind::FreeSearch => "free_search",
            QueryKind::UserLookup => "user",
            QueryKind::StatusLookup => "status",
            QueryKind::FullArchiveGet => "fullarchive_get",
            QueryKind::FullArchivePost => "fullarchive_post",
            QueryKind::FriendsList => "friends_list",
            QueryKind::RateLimitStatus => "rate_limit_status",
        }
    }

    /// Look up a kind by its task-list tag. Returns `None` for unknown tags
    /// rather than panicking — an unrecognised kind in the task list is a
    /// configuration error the caller reports, not a crash.
    pub fn from_str(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == tag)
    }

    /// The declarative shape of this query kind, per spec.md §4.6's table.
    pub fn spec(&self) -> EndpointSpec {
        match self {
            QueryKind::UserTimeline => EndpointSpec {
                endpoint: "/statuses/user_timeline",
                results_path: "",
                fetch_more_path: "",
                resume_key: Some("since_id"),
                method: RequestMethod::Get,
                token_auth: false,
            },
            QueryKind::FreeSearch => EndpointSpec {
                endpoint: "/search/tweets",
                results_path: "statuses",
                fetch_more_path: "search_metadata.next_results",
                resume_key: Some("since_id"),
                method: RequestMethod::Get,
                token_auth: false,
            },
            QueryKind::UserLookup => EndpointSpec {
                endpoint: "/users/lookup",
                results_path: "",
                fetch_more_path: "",
                resume_key: None,
                method: RequestMethod::Get,
                token_auth: false,
            },
            QueryKind::StatusLookup => EndpointSpec {
                endpoint: "/statuses/lookup",
                results_path: "",
                fetch_more_path: "",
                resume_key: None,
                method: RequestMethod::Get,
                token_auth: false,
            },
            QueryKind::FullArchiveGet => EndpointSpec {
                endpoint: "/tweets/search/fullarchive/production",
                results_path: "",
                fetch_more_path: "next",
                resume_key: None,
                method: RequestMethod::Get,
                token_auth: false,
            },
            QueryKind::FullArchivePost => EndpointSpec {
                endpoint: "/tweets/search/fullarchive/production",
                results_path: "",
                fetch_more_path: "next",
                resume_key: None,
                method: RequestMethod::Post,
                token_auth: true,
            },
            QueryKind::FriendsList => EndpointSpec {
                endpoint: "/friends/list",
                results_path: "",
                fetch_more_path: "",
                resume_key: None,
                method: RequestMethod::Get,
                token_auth: false,
            },
            QueryKind::RateLimitStatus => EndpointSpec {
                endpoint: "/application/rate_limit_status",
                results_path: "",
                fetch_more_path: "",
                resume_key: None,
                method: RequestMethod::Get,
                token_auth: false,
            },
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GET or POST, matching `RequestQuery._request_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
}

/// The five fields the spec says concrete queries differ by, plus the
/// request method/auth scheme that `fullarchive_post` needs.
///
/// `results_path` and `fetch_more_path` of `""` mean "root of the response"
/// and "no further pages", matching the Python base class's
/// `_results_path = 'results'` default being overridden to plain array
/// endpoints in the request_queries.py subclasses that return a bare list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointSpec {
    pub endpoint: &'static str,
    pub results_path: &'static str,
    pub fetch_more_path: &'static str,
    pub resume_key: Option<&'static str>,
    pub method: RequestMethod,
    pub token_auth: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_round_trips_through_its_tag() {
        for kind in QueryKind::ALL {
            assert_eq!(QueryKind::from_str(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn unknown_tag_is_none() {
        assert_eq!(QueryKind::from_str("not_a_kind"), None);
    }
}
