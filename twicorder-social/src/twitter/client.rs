//! Signed GET/POST against the Twitter v1.1 REST base.
//!
//! This client performs exactly one HTTP attempt per call (`retries: 0`):
//! the query state machine (`twicorder-engine::query`) owns the
//! transport-exception backoff loop described in spec.md §4.6 step 3, so
//! retrying here too would double the delay.

use crate::endpoints::{EndpointSpec, RequestMethod};
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::Method;
use std::borrow::Cow;
use twicorder_auth::CredentialProvider;
use twicorder_http::{Auth, HttpClient, HttpError, RequestOpts};

const BASE_URL: &str = "https://api.twitter.com/1.1";

#[derive(thiserror::Error, Debug)]
pub enum TwitterClientError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Auth(#[from] twicorder_auth::AuthError),
    #[error("invalid authorization header value: {0}")]
    InvalidHeader(String),
}

/// A single-attempt, signed Twitter v1.1 request executor.
#[derive(Clone)]
pub struct TwitterClient {
    http: HttpClient,
    credentials: CredentialProvider,
    base_url: String,
}

impl TwitterClient {
    pub fn new(credentials: CredentialProvider) -> Result<Self, TwitterClientError> {
        Self::with_base_url(credentials, BASE_URL)
    }

    /// Point requests at `base_url` instead of the real Twitter API.
    /// Used by integration tests that drive a `wiremock` double.
    pub fn with_base_url(
        credentials: CredentialProvider,
        base_url: &str,
    ) -> Result<Self, TwitterClientError> {
        let http = HttpClient::new(&format!("{base_url}/"))?;
        Ok(Self {
            http,
            credentials,
            base_url: base_url.to_string(),
        })
    }

    /// Perform one page fetch for `spec`, returning the decoded JSON body
    /// and response headers (so the caller can update Rate-Limit Central).
    ///
    /// `params` are the query kind's effective kwargs; `raw_cursor`, when
    /// present, is an opaque pagination string (e.g. free-search's
    /// `search_metadata.next_results`) sent verbatim instead of `params`,
    /// matching spec.md §4.6 step 2.
    pub async fn fetch_page(
        &self,
        spec: &EndpointSpec,
        params: &[(String, String)],
        raw_cursor: Option<&str>,
    ) -> Result<(serde_json::Value, HeaderMap), TwitterClientError> {
        let effective: Vec<(String, String)> = match raw_cursor {
            // `next_results` is free search's own opaque cursor: ride it
            // verbatim, but repair the `tweet_mode=extended` gap it doesn't
            // carry (spec.md §8 scenario 4 — the search endpoint silently
            // truncates text once extended mode isn't re-asserted).
            Some(raw) => {
                let mut parsed = parse_query_string(raw);
                if !parsed.iter().any(|(k, _)| k == "tweet_mode") {
                    parsed.push(("tweet_mode".to_string(), "extended".to_string()));
                }
                parsed
            }
            None => params.to_vec(),
        };
        let path = format!("{}.json", spec.endpoint.trim_start_matches('/'));

        match spec.method {
            RequestMethod::Get => self.get(&path, spec, &effective).await,
            RequestMethod::Post => self.post(&path, spec, &effective).await,
        }
    }

    async fn get(
        &self,
        path: &str,
        spec: &EndpointSpec,
        params: &[(String, String)],
    ) -> Result<(serde_json::Value, HeaderMap), TwitterClientError> {
        let full_url = format!("{}/{path}", self.base_url);
        let param_refs: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let auth_header = if spec.token_auth {
            self.credentials.bearer_header()?
        } else {
            self.credentials
                .oauth1_header(&Method::GET, &full_url, &param_refs)?
        };
        let auth_value = reqwest::header::HeaderValue::from_str(&auth_header)
            .map_err(|e| TwitterClientError::InvalidHeader(e.to_string()))?;

        let query: Vec<(&str, Cow<'_, str>)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), Cow::Borrowed(v.as_str())))
            .collect();

        let opts = RequestOpts {
            auth: Some(Auth::Header {
                name: AUTHORIZATION,
                value: auth_value,
            }),
            query: Some(query),
            retries: Some(0),
            ..Default::default()
        };
        Ok(self
            .http
            .get_json_with_headers::<serde_json::Value>(path, opts)
            .await?)
    }

    async fn post(
        &self,
        path: &str,
        spec: &EndpointSpec,
        params: &[(String, String)],
    ) -> Result<(serde_json::Value, HeaderMap), TwitterClientError> {
        debug_assert!(spec.token_auth, "only bearer-auth POST is supported");
        let auth_header = self.credentials.bearer_header()?;
        let auth_value = reqwest::header::HeaderValue::from_str(&auth_header)
            .map_err(|e| TwitterClientError::InvalidHeader(e.to_string()))?;

        let body: serde_json::Value = serde_json::Value::Object(
            params
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
        );
        let opts = RequestOpts {
            auth: Some(Auth::Header {
                name: AUTHORIZATION,
                value: auth_value,
            }),
            retries: Some(0),
            ..Default::default()
        };
        Ok(self
            .http
            .post_json_with_headers::<serde_json::Value, serde_json::Value>(path, &body, opts)
            .await?)
    }
}

fn parse_query_string(raw: &str) -> Vec<(String, String)> {
    let raw = raw.trim_start_matches('?');
    url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_leading_question_mark() {
        let pairs = parse_query_string("?max_id=42&q=foo");
        assert_eq!(
            pairs,
            vec![
                ("max_id".to_string(), "42".to_string()),
                ("q".to_string(), "foo".to_string()),
            ]
        );
    }
}
