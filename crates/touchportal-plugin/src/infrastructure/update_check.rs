//! One-shot check for a newer plugin version.
//!
//! Fetches `{"version": "x.y.z"}` from the configured URL and compares it to
//! the running plugin's version.  A strictly newer remote version produces a
//! [`PluginEvent::Update`]; everything else, including every kind of failure,
//! produces nothing.  Failures are logged here and never reach the session.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use semver::Version;
use serde::Deserialize;
use thiserror::Error;
use touchportal_core::PluginEvent;
use tracing::{debug, info, warn};

/// Reasons an update check produced no answer.
#[derive(Debug, Error)]
pub enum UpdateCheckError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Network failure or timeout.
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Anything other than `200 OK`.
    #[error("request to {url} returned status {status}")]
    Status { url: String, status: StatusCode },

    /// The body was not `{"version": "..."}`.
    #[error("invalid response body: {0}")]
    Body(String),

    /// A version string is not semver, even after normalization.
    #[error("invalid version {version:?}: {source}")]
    Version {
        version: String,
        #[source]
        source: semver::Error,
    },
}

/// Where the latest published version comes from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Returns the latest published version string.
    async fn fetch_latest(&self) -> Result<String, UpdateCheckError>;
}

#[derive(Debug, Deserialize)]
struct VersionBody {
    version: Option<String>,
}

/// [`VersionSource`] backed by an HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpVersionSource {
    client: reqwest::Client,
    url: String,
}

impl HttpVersionSource {
    /// Builds a source for `url`; the whole request must finish within
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// [`UpdateCheckError::Client`] if the TLS backend cannot be initialised.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, UpdateCheckError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("touchportal-plugin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(UpdateCheckError::Client)?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl VersionSource for HttpVersionSource {
    async fn fetch_latest(&self) -> Result<String, UpdateCheckError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|source| UpdateCheckError::Request {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(UpdateCheckError::Status {
                url: self.url.clone(),
                status,
            });
        }

        let body: VersionBody = response
            .json()
            .await
            .map_err(|e| UpdateCheckError::Body(e.to_string()))?;
        body.version
            .ok_or_else(|| UpdateCheckError::Body("missing `version` field".to_string()))
    }
}

/// Parses a version leniently: surrounding whitespace and a leading `v` are
/// ignored, and missing minor/patch components count as zero (`1.2` is
/// `1.2.0`).
///
/// # Errors
///
/// [`UpdateCheckError::Version`] if the result is still not valid semver.
pub fn parse_version(raw: &str) -> Result<Version, UpdateCheckError> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix(|c: char| c == 'v' || c == 'V')
        .unwrap_or(trimmed);

    let core_end = trimmed
        .find(|c: char| c == '-' || c == '+')
        .unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(core_end);

    let mut normalized = core.to_string();
    for _ in core.split('.').count()..3 {
        normalized.push_str(".0");
    }
    normalized.push_str(suffix);

    Version::parse(&normalized).map_err(|source| UpdateCheckError::Version {
        version: raw.to_string(),
        source,
    })
}

/// Compares `latest` against `current` and builds the `Update` event if
/// `latest` is strictly newer.
///
/// # Errors
///
/// [`UpdateCheckError::Version`] if either side is not a version.
pub fn compare_versions(current: &str, latest: &str) -> Result<Option<PluginEvent>, UpdateCheckError> {
    let current_version = parse_version(current)?;
    let latest_version = parse_version(latest)?;

    if latest_version > current_version {
        Ok(Some(PluginEvent::Update {
            current: current.to_string(),
            latest: latest.to_string(),
        }))
    } else {
        debug!("plugin is up to date (current {current}, latest {latest})");
        Ok(None)
    }
}

/// Runs one update check against `source`.
///
/// Never fails: errors are logged at WARN and turn into `None`.
pub async fn check_for_update(
    source: &dyn VersionSource,
    current_version: &str,
) -> Option<PluginEvent> {
    let outcome = match source.fetch_latest().await {
        Ok(latest) => compare_versions(current_version, &latest),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(Some(event)) => {
            if let PluginEvent::Update { current, latest } = &event {
                info!("update available: {current} -> {latest}");
            }
            Some(event)
        }
        Ok(None) => None,
        Err(e) => {
            warn!("check for update failed: {e}");
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_version_normalizes_short_and_prefixed_forms() {
        assert_eq!(parse_version("1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(parse_version("v1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(parse_version(" 2 ").unwrap(), Version::new(2, 0, 0));
        assert_eq!(parse_version("1.4").unwrap(), Version::new(1, 4, 0));
        assert_eq!(
            parse_version("1.4-beta.1").unwrap(),
            Version::parse("1.4.0-beta.1").unwrap()
        );
    }

    #[test]
    fn test_parse_version_rejects_garbage() {
        assert!(matches!(
            parse_version("not-a-version"),
            Err(UpdateCheckError::Version { .. })
        ));
    }

    #[test]
    fn test_compare_versions_only_reports_strictly_newer() {
        // Arrange / Act / Assert
        assert_eq!(
            compare_versions("1.0.0", "1.0.1").unwrap(),
            Some(PluginEvent::Update {
                current: "1.0.0".into(),
                latest: "1.0.1".into()
            })
        );
        assert_eq!(compare_versions("1.0.0", "1.0.0").unwrap(), None);
        assert_eq!(compare_versions("2.0.0", "1.9.9").unwrap(), None);
        // Semantic, not lexical, ordering.
        assert!(compare_versions("1.9.0", "1.10.0").unwrap().is_some());
        // A pre-release is older than its release.
        assert_eq!(compare_versions("1.2.0", "1.2.0-rc.1").unwrap(), None);
    }

    #[tokio::test]
    async fn test_check_for_update_emits_event_for_newer_version() {
        let mut source = MockVersionSource::new();
        source
            .expect_fetch_latest()
            .times(1)
            .returning(|| Ok("1.3.0".to_string()));

        let event = check_for_update(&source, "1.2.0").await;

        assert_eq!(
            event,
            Some(PluginEvent::Update {
                current: "1.2.0".into(),
                latest: "1.3.0".into()
            })
        );
    }

    #[tokio::test]
    async fn test_check_for_update_swallows_source_errors() {
        let mut source = MockVersionSource::new();
        source
            .expect_fetch_latest()
            .returning(|| Err(UpdateCheckError::Body("missing `version` field".into())));

        assert_eq!(check_for_update(&source, "1.0.0").await, None);
    }

    #[tokio::test]
    async fn test_check_for_update_swallows_unparsable_remote_version() {
        let mut source = MockVersionSource::new();
        source
            .expect_fetch_latest()
            .returning(|| Ok("latest".to_string()));

        assert_eq!(check_for_update(&source, "1.0.0").await, None);
    }

    /// Serves exactly one canned HTTP response and returns the URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        });
        format!("http://{addr}/version.json")
    }

    #[tokio::test]
    async fn test_http_source_reads_version_field() {
        let url = serve_once("200 OK", "{\"version\":\"3.1.4\"}").await;
        let source = HttpVersionSource::new(url, Duration::from_secs(5)).unwrap();

        assert_eq!(source.fetch_latest().await.unwrap(), "3.1.4");
    }

    #[tokio::test]
    async fn test_http_source_rejects_non_200_status() {
        let url = serve_once("404 Not Found", "{}").await;
        let source = HttpVersionSource::new(url, Duration::from_secs(5)).unwrap();

        let result = source.fetch_latest().await;

        assert!(matches!(
            result,
            Err(UpdateCheckError::Status { status, .. }) if status == StatusCode::NOT_FOUND
        ));
    }

    #[tokio::test]
    async fn test_http_source_rejects_body_without_version() {
        let url = serve_once("200 OK", "{\"name\":\"demo\"}").await;
        let source = HttpVersionSource::new(url, Duration::from_secs(5)).unwrap();

        assert!(matches!(
            source.fetch_latest().await,
            Err(UpdateCheckError::Body(_))
        ));
    }

    #[tokio::test]
    async fn test_check_for_update_with_refused_connection_is_none() {
        // Bind then drop to get a loopback port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let source =
            HttpVersionSource::new(format!("http://{addr}/v.json"), Duration::from_secs(2)).unwrap();

        assert_eq!(check_for_update(&source, "1.0.0").await, None);
    }
}
