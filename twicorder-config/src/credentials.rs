//! Credentials YAML (spec.md §6): `application.{consumer_key,
//! consumer_secret}` and `user.{key,secret}`, the two application secrets
//! and two user secrets `twicorder-auth::CredentialProvider` signs
//! requests with. Grounded on `get_auth_handler` in
//! `examples/original_source/python/twicorder/auth.py`, which reads the
//! same four fields from an `auth.yaml` before handing them to tweepy's
//! `OAuthHandler`.

use std::path::Path;

use serde::Deserialize;

use crate::{load_yaml, ConfigError};

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserCredentials {
    pub key: String,
    pub secret: String,
}

/// A process may also carry a bearer token for app-only requests
/// (`fullarchive_post`, spec.md §4.1); it is optional because not every
/// deployment exercises that endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub application: ApplicationCredentials,
    pub user: UserCredentials,
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Credentials {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_yaml(path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_required_fields_and_optional_bearer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.yaml");
        std::fs::write(
            &path,
            r#"
application:
  consumer_key: ck
  consumer_secret: cs
user:
  key: uk
  secret: us
bearer_token: abc123
"#,
        )
        .unwrap();
        let creds = Credentials::load(&path).unwrap();
        assert_eq!(creds.application.consumer_key, "ck");
        assert_eq!(creds.user.secret, "us");
        assert_eq!(creds.bearer_token.as_deref(), Some("abc123"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Credentials::load("/nonexistent/credentials.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.yaml");
        std::fs::write(&path, "application: [not a map").unwrap();
        let err = Credentials::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
