//! # gcs: Google Cloud Storage over its JSON API
//!
//! [`GcsClient`] implements [`StorageClient`] with `reqwest`:
//! - bucket creation: `POST {endpoint}/storage/v1/b?project={project}`
//! - object upload: `POST {endpoint}/upload/storage/v1/b/{bucket}/o?uploadType=media&name={key}`
//!
//! Authentication is a pre-minted OAuth2 access token (for example the output of
//! `gcloud auth print-access-token`) sent as a bearer token. Acquiring or refreshing
//! it is left to the caller.
//!
//! The sink returned by [`GcsClient::open_write_stream`] buffers written bytes and
//! performs the upload when it is closed, so most transfer failures surface on close.

use std::env;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::contract::{ObjectSink, StorageClient};
use crate::error::{StorageError, StorageErrorKind, UploadError};

pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Connection settings for [`GcsClient`].
#[derive(Clone)]
pub struct GcsConfig {
    /// Project that owns newly created buckets.
    pub project: String,
    pub access_token: String,
    /// Base URL of the API; override to target an emulator.
    pub endpoint: String,
}

impl GcsConfig {
    pub fn new(project: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            access_token: access_token.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Read `GCS_PROJECT_ID`, `GCS_ACCESS_TOKEN` and optional `GCS_ENDPOINT`.
    pub fn from_env() -> Result<Self, UploadError> {
        Self::from_env_with(None, None)
    }

    /// Like [`GcsConfig::from_env`], but a given `project` or `endpoint` wins over
    /// its environment variable. The token always comes from `GCS_ACCESS_TOKEN`.
    pub fn from_env_with(
        project: Option<String>,
        endpoint: Option<String>,
    ) -> Result<Self, UploadError> {
        let project = match project {
            Some(project) => project,
            None => env::var("GCS_PROJECT_ID").map_err(|e| {
                error!(error = ?e, "GCS_PROJECT_ID missing in environment");
                UploadError::Auth(format!("GCS_PROJECT_ID: {e}"))
            })?,
        };
        let token = env::var("GCS_ACCESS_TOKEN").map_err(|e| {
            error!(error = ?e, "GCS_ACCESS_TOKEN missing in environment");
            UploadError::Auth(format!("GCS_ACCESS_TOKEN: {e}"))
        })?;
        let endpoint = endpoint
            .or_else(|| env::var("GCS_ENDPOINT").ok())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        Ok(GcsConfig::new(project, token).with_endpoint(endpoint))
    }
}

impl fmt::Debug for GcsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcsConfig")
            .field("project", &self.project)
            .field("access_token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// HTTP-backed [`StorageClient`] for Google Cloud Storage.
#[derive(Clone)]
pub struct GcsClient {
    http: reqwest::Client,
    endpoint: Arc<Url>,
    project: String,
    auth: HeaderValue,
}

impl GcsClient {
    /// Validate `config` and build the client. No network call is made here.
    pub fn new(config: GcsConfig) -> Result<Self, UploadError> {
        let project = config.project.trim();
        if project.is_empty() {
            return Err(UploadError::Auth("project id is empty".into()));
        }
        let token = config.access_token.trim();
        if token.is_empty() {
            return Err(UploadError::Auth("access token is empty".into()));
        }
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            UploadError::Auth("access token contains characters not allowed in a header".into())
        })?;
        auth.set_sensitive(true);

        let endpoint = config.endpoint.trim_end_matches('/');
        let endpoint_url = Url::parse(endpoint)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https") && !url.cannot_be_a_base())
            .ok_or_else(|| {
                UploadError::Auth(format!("endpoint '{endpoint}' must be an http(s) URL"))
            })?;

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| UploadError::Auth(format!("failed to build HTTP client: {e}")))?;

        info!(project, endpoint, "Initialized GcsClient");
        Ok(Self {
            http,
            endpoint: Arc::new(endpoint_url),
            project: project.to_string(),
            auth,
        })
    }

    /// Build an API URL below the endpoint; each segment is percent-encoded.
    fn api_url(&self, segments: &[&str]) -> Result<Url, StorageError> {
        let mut url = Url::clone(&self.endpoint);
        url.path_segments_mut()
            .map_err(|()| {
                StorageError::new(
                    StorageErrorKind::Other,
                    format!("endpoint '{}' cannot carry a path", self.endpoint),
                )
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl fmt::Debug for GcsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcsClient")
            .field("endpoint", &self.endpoint)
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StorageClient for GcsClient {
    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let url = self.api_url(&["storage", "v1", "b"])?;
        debug!(bucket, url = %url, "GCS CREATE BUCKET");
        let resp = self
            .http
            .post(url)
            .query(&[("project", self.project.as_str())])
            .header(AUTHORIZATION, self.auth.clone())
            .json(&serde_json::json!({ "name": bucket }))
            .send()
            .await
            .map_err(transport_error)?;
        check_response(resp).await
    }

    async fn open_write_stream(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Box<dyn ObjectSink>, StorageError> {
        Ok(Box::new(GcsObjectWriter {
            http: self.http.clone(),
            url: self.api_url(&["upload", "storage", "v1", "b", bucket, "o"])?,
            auth: self.auth.clone(),
            key: key.to_string(),
            content_type: None,
            buf: Vec::new(),
            closed: false,
        }))
    }
}

/// Buffers an object in memory and uploads it on close.
struct GcsObjectWriter {
    http: reqwest::Client,
    url: Url,
    auth: HeaderValue,
    key: String,
    content_type: Option<String>,
    buf: Vec<u8>,
    closed: bool,
}

#[async_trait]
impl ObjectSink for GcsObjectWriter {
    fn set_content_type(&mut self, content_type: &str) {
        self.content_type = Some(content_type.to_string());
    }

    async fn write(&mut self, buf: &[u8]) -> Result<(), StorageError> {
        if self.closed {
            return Err(StorageError::new(
                StorageErrorKind::Other,
                format!("write to closed object '{}'", self.key),
            ));
        }
        self.buf.extend_from_slice(buf);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StorageError> {
        if self.closed {
            return Err(StorageError::new(
                StorageErrorKind::Other,
                format!("object '{}' already closed", self.key),
            ));
        }
        self.closed = true;
        let body = std::mem::take(&mut self.buf);
        let content_type = self
            .content_type
            .as_deref()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        debug!(key = %self.key, size = body.len(), content_type = %content_type, "GCS PUT OBJECT");

        let resp = self
            .http
            .post(self.url.clone())
            .query(&[("uploadType", "media"), ("name", self.key.as_str())])
            .header(AUTHORIZATION, self.auth.clone())
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;
        check_response(resp).await
    }
}

fn transport_error(e: reqwest::Error) -> StorageError {
    error!(error = %e, "GCS request failed before a response was received");
    StorageError::new(StorageErrorKind::Transport, e.to_string())
}

async fn check_response(resp: reqwest::Response) -> Result<(), StorageError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| String::from("<failed to decode response body>"));
    let err = classify_error(status, &body);
    error!(status = %status, kind = ?err.kind, message = %err.message, "GCS API returned error");
    Err(err)
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Map an error response onto a [`StorageError`].
pub(crate) fn classify_error(status: StatusCode, body: &str) -> StorageError {
    let (message, reasons) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => (
            env.error.message,
            env.error
                .errors
                .into_iter()
                .map(|d| d.reason)
                .collect::<Vec<_>>(),
        ),
        Err(_) => (body.trim().to_string(), Vec::new()),
    };
    let message = if message.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        message
    };
    let has_reason = |r: &str| reasons.iter().any(|reason| reason == r);

    let kind = match status {
        StatusCode::CONFLICT if message.contains("already own") => StorageErrorKind::AlreadyOwned,
        StatusCode::CONFLICT => StorageErrorKind::Conflict,
        StatusCode::UNAUTHORIZED => StorageErrorKind::Unauthenticated,
        StatusCode::FORBIDDEN if has_reason("quotaExceeded") || has_reason("rateLimitExceeded") => {
            StorageErrorKind::QuotaExceeded
        }
        StatusCode::FORBIDDEN => StorageErrorKind::PermissionDenied,
        StatusCode::NOT_FOUND => StorageErrorKind::NotFound,
        StatusCode::TOO_MANY_REQUESTS => StorageErrorKind::QuotaExceeded,
        _ => StorageErrorKind::Other,
    };
    StorageError::new(kind, message).with_status(status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn gcs_error(code: u16, message: &str, reason: &str) -> String {
        serde_json::json!({
            "error": {
                "code": code,
                "message": message,
                "errors": [{ "domain": "global", "reason": reason, "message": message }]
            }
        })
        .to_string()
    }

    #[test]
    fn conflict_with_ownership_message_is_already_owned() {
        let body = gcs_error(
            409,
            "Your previous request to create the named bucket succeeded and you already own it.",
            "conflict",
        );
        let err = classify_error(StatusCode::CONFLICT, &body);
        assert_eq!(err.kind(), StorageErrorKind::AlreadyOwned);
        assert_eq!(err.status, Some(409));
    }

    #[test]
    fn conflict_with_foreign_owner_is_conflict() {
        let body = gcs_error(
            409,
            "The requested bucket name is not available. Please select a different name and try again.",
            "conflict",
        );
        assert_eq!(
            classify_error(StatusCode::CONFLICT, &body).kind(),
            StorageErrorKind::Conflict
        );
    }

    #[test]
    fn forbidden_is_split_by_reason() {
        let quota = gcs_error(403, "The project exceeded the quota.", "quotaExceeded");
        let denied = gcs_error(403, "does not have storage.buckets.create access", "forbidden");
        assert_eq!(
            classify_error(StatusCode::FORBIDDEN, &quota).kind(),
            StorageErrorKind::QuotaExceeded
        );
        assert_eq!(
            classify_error(StatusCode::FORBIDDEN, &denied).kind(),
            StorageErrorKind::PermissionDenied
        );
    }

    #[test]
    fn non_json_body_is_kept_as_message() {
        let err = classify_error(StatusCode::BAD_GATEWAY, "upstream timeout\n");
        assert_eq!(err.kind(), StorageErrorKind::Other);
        assert_eq!(err.message, "upstream timeout");
    }

    #[test]
    fn empty_body_falls_back_to_status_reason() {
        let err = classify_error(StatusCode::UNAUTHORIZED, "");
        assert_eq!(err.kind(), StorageErrorKind::Unauthenticated);
        assert_eq!(err.message, "Unauthorized");
    }

    #[test]
    fn rejects_empty_token() {
        let err = GcsClient::new(GcsConfig::new("proj", "  ")).unwrap_err();
        assert!(matches!(err, UploadError::Auth(_)));
    }

    #[test]
    fn rejects_empty_project() {
        let err = GcsClient::new(GcsConfig::new("", "tok")).unwrap_err();
        assert!(matches!(err, UploadError::Auth(_)));
    }

    #[test]
    fn rejects_token_with_newline() {
        let err = GcsClient::new(GcsConfig::new("proj", "abc\ndef")).unwrap_err();
        assert!(matches!(err, UploadError::Auth(_)));
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let config = GcsConfig::new("proj", "tok").with_endpoint("storage.googleapis.com");
        assert!(matches!(GcsClient::new(config), Err(UploadError::Auth(_))));
    }

    #[test]
    fn debug_output_never_contains_token() {
        let config = GcsConfig::new("proj", "super-secret-token");
        assert!(!format!("{config:?}").contains("super-secret-token"));
    }

    #[tokio::test]
    async fn write_after_close_is_rejected_without_network() {
        let client = GcsClient::new(GcsConfig::new("proj", "tok")).unwrap();
        let mut sink = GcsObjectWriter {
            http: client.http.clone(),
            url: Url::parse("http://127.0.0.1:9/unused").unwrap(),
            auth: client.auth.clone(),
            key: "k".into(),
            content_type: None,
            buf: Vec::new(),
            closed: true,
        };
        let err = sink.write(b"late").await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::Other);
    }

    #[test]
    fn api_url_percent_encodes_each_segment() {
        let client =
            GcsClient::new(GcsConfig::new("proj", "tok").with_endpoint("http://localhost:4443/"))
                .unwrap();

        let url = client
            .api_url(&["upload", "storage", "v1", "b", "odd name/x", "o"])
            .unwrap();

        assert_eq!(
            url.as_str(),
            "http://localhost:4443/upload/storage/v1/b/odd%20name%2Fx/o"
        );
    }

    #[test]
    fn api_url_keeps_endpoint_path_prefix() {
        let client = GcsClient::new(
            GcsConfig::new("proj", "tok").with_endpoint("http://localhost:4443/emulator"),
        )
        .unwrap();

        let url = client.api_url(&["storage", "v1", "b"]).unwrap();

        assert_eq!(url.as_str(), "http://localhost:4443/emulator/storage/v1/b");
    }

    fn clear_gcs_env() {
        for var in ["GCS_PROJECT_ID", "GCS_ACCESS_TOKEN", "GCS_ENDPOINT"] {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn from_env_reads_project_token_and_endpoint() {
        clear_gcs_env();
        env::set_var("GCS_PROJECT_ID", "env-project");
        env::set_var("GCS_ACCESS_TOKEN", "env-token");
        env::set_var("GCS_ENDPOINT", "http://localhost:4443");

        let config = GcsConfig::from_env().expect("config should load");

        clear_gcs_env();
        assert_eq!(config.project, "env-project");
        assert_eq!(config.access_token, "env-token");
        assert_eq!(config.endpoint, "http://localhost:4443");
    }

    #[test]
    #[serial]
    fn from_env_with_prefers_given_values_and_defaults_endpoint() {
        clear_gcs_env();
        env::set_var("GCS_PROJECT_ID", "env-project");
        env::set_var("GCS_ACCESS_TOKEN", "env-token");

        let config = GcsConfig::from_env_with(Some("file-project".into()), None)
            .expect("config should load");

        clear_gcs_env();
        assert_eq!(config.project, "file-project");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    #[serial]
    fn from_env_without_token_is_auth_error() {
        clear_gcs_env();
        env::set_var("GCS_PROJECT_ID", "env-project");

        let err = GcsConfig::from_env().unwrap_err();

        clear_gcs_env();
        match err {
            UploadError::Auth(message) => assert!(message.contains("GCS_ACCESS_TOKEN")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
