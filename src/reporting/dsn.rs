//! Error-tracker connection strings.
//!
//! Format: `{scheme}://{public_key}@{host}[:port][/path]/{project_id}`.

use std::fmt;
use std::str::FromStr;

use url::Url;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DsnError {
    #[error("invalid DSN URL: {0}")]
    InvalidUrl(String),
    #[error("DSN scheme must be http or https, got {0}")]
    UnsupportedScheme(String),
    #[error("DSN is missing the public key")]
    MissingPublicKey,
    #[error("DSN is missing the host")]
    MissingHost,
    #[error("DSN is missing the project id")]
    MissingProjectId,
}

/// Parsed connection string for the error-tracking ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    scheme: String,
    public_key: String,
    host: String,
    port: Option<u16>,
    path: String,
    project_id: String,
}

impl Dsn {
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Event ingestion endpoint.
    pub fn store_url(&self) -> String {
        let port = self.port.map(|p| format!(":{}", p)).unwrap_or_default();
        format!(
            "{}://{}{}{}/api/{}/store/",
            self.scheme, self.host, port, self.path, self.project_id
        )
    }

    /// Value of the `X-Sentry-Auth` header for `client` (e.g. `telemetry-demo/0.1.0`).
    pub fn auth_header(&self, client: &str) -> String {
        format!(
            "Sentry sentry_version=7, sentry_client={}, sentry_key={}",
            client, self.public_key
        )
    }
}

impl FromStr for Dsn {
    type Err = DsnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s.trim()).map_err(|e| DsnError::InvalidUrl(e.to_string()))?;

        let scheme = url.scheme().to_string();
        if scheme != "http" && scheme != "https" {
            return Err(DsnError::UnsupportedScheme(scheme));
        }

        let public_key = url.username().to_string();
        if public_key.is_empty() {
            return Err(DsnError::MissingPublicKey);
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or(DsnError::MissingHost)?
            .to_string();

        let trimmed = url.path().trim_end_matches('/');
        let (path, project_id) = match trimmed.rsplit_once('/') {
            Some((prefix, id)) if !id.is_empty() => (prefix.to_string(), id.to_string()),
            _ => return Err(DsnError::MissingProjectId),
        };

        Ok(Self {
            scheme,
            public_key,
            host,
            port: url.port(),
            path,
            project_id,
        })
    }
}

impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let port = self.port.map(|p| format!(":{}", p)).unwrap_or_default();
        write!(
            f,
            "{}://{}@{}{}{}/{}",
            self.scheme, self.public_key, self.host, port, self.path, self.project_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hosted_dsn() {
        let dsn: Dsn = "https://abc123@o42.ingest.sentry.io/4505".parse().unwrap();
        assert_eq!(dsn.public_key(), "abc123");
        assert_eq!(dsn.host(), "o42.ingest.sentry.io");
        assert_eq!(dsn.project_id(), "4505");
        assert_eq!(dsn.store_url(), "https://o42.ingest.sentry.io/api/4505/store/");
    }

    #[test]
    fn test_parse_self_hosted_with_port_and_path() {
        let dsn: Dsn = "http://key@localhost:9000/sentry/2".parse().unwrap();
        assert_eq!(dsn.store_url(), "http://localhost:9000/sentry/api/2/store/");
        assert_eq!(dsn.to_string(), "http://key@localhost:9000/sentry/2");
    }

    #[test]
    fn test_auth_header() {
        let dsn: Dsn = "https://pub@example.com/1".parse().unwrap();
        assert_eq!(
            dsn.auth_header("telemetry-demo/0.1.0"),
            "Sentry sentry_version=7, sentry_client=telemetry-demo/0.1.0, sentry_key=pub"
        );
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!("https://example.com/1".parse::<Dsn>(), Err(DsnError::MissingPublicKey));
        assert_eq!("https://key@example.com/".parse::<Dsn>(), Err(DsnError::MissingProjectId));
        assert!(matches!(
            "ftp://key@example.com/1".parse::<Dsn>(),
            Err(DsnError::UnsupportedScheme(_))
        ));
        assert!(matches!("not a url".parse::<Dsn>(), Err(DsnError::InvalidUrl(_))));
    }
}
