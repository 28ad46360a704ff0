//! v1.1-shaped response types. Several endpoints return a bare JSON array
//! at the document root rather than an envelope — callers decode into
//! `Vec<Tweet>`/`Vec<User>` directly for those.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Twitter's own `created_at` strftime shape, carried over from
/// `constants.TW_TIME_FORMAT` in the original Python source.
pub const TW_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Parse a v1.1 `created_at` string into an offset-aware timestamp.
pub fn parse_tw_time(raw: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_str(raw, TW_TIME_FORMAT)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tweet {
    pub id: i64,
    pub id_str: String,
    pub created_at: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub entities: Entities,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub favorite_count: u64,
    #[serde(default)]
    pub in_reply_to_status_id_str: Option<String>,
    #[serde(default)]
    pub in_reply_to_user_id_str: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub id_str: String,
    pub screen_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub followers_count: Option<u64>,
    #[serde(default)]
    pub friends_count: Option<u64>,
    #[serde(default)]
    pub statuses_count: Option<u64>,
    #[serde(default)]
    pub favourites_count: Option<u64>,
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub user_mentions: Vec<UserMention>,
    #[serde(default)]
    pub hashtags: Vec<serde_json::Value>,
    #[serde(default)]
    pub urls: Vec<serde_json::Value>,
}

/// A tweet's embedded stub of a mentioned user. `expand_mentions` (User
/// Cache, §4.4) splices the full [`User`] profile into `profile` once the
/// corresponding `users/lookup` query resolves it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMention {
    pub id: i64,
    pub id_str: String,
    pub screen_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub profile: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub statuses: Vec<Tweet>,
    #[serde(default)]
    pub search_metadata: SearchMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchMetadata {
    #[serde(default)]
    pub next_results: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_twitter_timestamp() {
        let parsed = parse_tw_time("Wed Oct 10 20:19:24 +0000 2018").unwrap();
        assert_eq!(parsed.timestamp(), 1539202764);
    }
}
