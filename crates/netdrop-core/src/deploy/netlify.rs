//! Netlify deploy API client.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication and an
//! explicit per-request timeout.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::artifact::DeployPayload;
use crate::error::DeployError;

use super::backend::{CreateRequest, CreatedDeploy, HostingBackend, PromotedDeploy};
use super::{DeployPhase, PromoteEndpoint};

pub const DEFAULT_API_BASE: &str = "https://api.netlify.com/api/v1";

/// Characters left unescaped in a single path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode a value for use as one URL path segment.
pub fn encode_segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    required: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct PromoteResponse {
    #[serde(default)]
    deploy_ssl_url: Option<String>,
    #[serde(default)]
    ssl_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Netlify deploy API client bound to one site.
#[derive(Debug, Clone)]
pub struct NetlifyClient {
    http: reqwest::Client,
    api_base: String,
    site_id: String,
}

impl NetlifyClient {
    /// Creates a new client for `site_id` with the given access token.
    pub fn new(token: &str, site_id: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .context("Hosting token contains characters not allowed in a header")?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .user_agent(concat!("netdrop/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
            site_id: site_id.to_string(),
        })
    }

    /// Sets a custom API base URL (self-hosted proxies, tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    /// Reads the body of an accepted response, or turns anything outside
    /// 200–201 into `BackendRejected`.
    async fn accepted_body(
        &self,
        response: reqwest::Response,
        phase: DeployPhase,
    ) -> Result<String, DeployError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| DeployError::TransportFailure { phase, source })?;

        if !is_accepted(status) {
            tracing::warn!(
                phase = %phase,
                status = status.as_u16(),
                body = %body,
                "hosting backend rejected request"
            );
            return Err(DeployError::BackendRejected {
                phase,
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

fn is_accepted(status: StatusCode) -> bool {
    matches!(status.as_u16(), 200 | 201)
}

#[async_trait]
impl HostingBackend for NetlifyClient {
    async fn create_deploy(&self, request: &CreateRequest) -> Result<CreatedDeploy, DeployError> {
        let phase = DeployPhase::Create;
        let url = self.url(&format!("sites/{}/deploys", encode_segment(&self.site_id)));

        let mut builder = self.http.post(&url);
        builder = match &request.files {
            Some(files) => builder.json(&serde_json::json!({ "files": files })),
            None => builder.header(CONTENT_LENGTH, 0),
        };

        let response = builder
            .send()
            .await
            .map_err(|source| DeployError::TransportFailure { phase, source })?;
        let body = self.accepted_body(response, phase).await?;

        let parsed: CreateResponse =
            serde_json::from_str(&body).map_err(|e| DeployError::InternalInconsistency {
                phase,
                detail: format!("malformed create response: {e}"),
            })?;

        let id = parsed
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DeployError::InternalInconsistency {
                phase,
                detail: "create response is missing the deploy id".to_string(),
            })?;

        Ok(CreatedDeploy {
            id,
            required: parsed.required,
        })
    }

    async fn upload_content(
        &self,
        deploy_id: &str,
        payload: &DeployPayload,
    ) -> Result<(), DeployError> {
        let phase = DeployPhase::Upload;
        let url = self.url(&format!(
            "deploys/{}/files/{}",
            encode_segment(deploy_id),
            encode_segment(payload.target_name().as_str())
        ));
        let bytes = payload.bytes();

        let response = self
            .http
            .put(&url)
            .header(CONTENT_TYPE, payload.content_type())
            .header(CONTENT_LENGTH, bytes.len())
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|source| DeployError::TransportFailure { phase, source })?;

        self.accepted_body(response, phase).await?;
        Ok(())
    }

    async fn promote(
        &self,
        deploy_id: &str,
        endpoint: PromoteEndpoint,
    ) -> Result<PromotedDeploy, DeployError> {
        let phase = DeployPhase::Publish;
        let url = self.url(&format!(
            "deploys/{}/{}",
            encode_segment(deploy_id),
            endpoint.path_segment()
        ));

        let response = self
            .http
            .post(&url)
            .header(CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(|source| DeployError::TransportFailure { phase, source })?;
        let body = self.accepted_body(response, phase).await?;

        // The URL field is optional; an empty or non-JSON body just means none.
        let parsed: PromoteResponse = serde_json::from_str(&body).unwrap_or_default();
        let site_url = parsed
            .deploy_ssl_url
            .or(parsed.ssl_url)
            .or(parsed.url)
            .filter(|u| !u.is_empty());

        Ok(PromotedDeploy { site_url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::FileArtifact;
    use crate::fs::sanitize_filename;
    use mockito::{Matcher, Server};

    fn client(server: &Server) -> NetlifyClient {
        NetlifyClient::new("tok", "site-1", Duration::from_secs(5))
            .expect("client should build")
            .with_api_base(server.url())
    }

    fn payload(name: &str, bytes: &[u8]) -> DeployPayload {
        DeployPayload::single(FileArtifact::new(
            sanitize_filename(name).unwrap(),
            bytes.to_vec(),
        ))
    }

    // =========================================================================
    // Path Encoding Tests
    // =========================================================================

    #[test]
    fn encode_segment_escapes_unsafe_characters() {
        assert_eq!(encode_segment("Q3 report.xlsx"), "Q3%20report.xlsx");
        assert_eq!(encode_segment("a#b?.csv"), "a%23b%3F.csv");
        assert_eq!(encode_segment("a/b"), "a%2Fb");
        assert_eq!(encode_segment("plain-name_1.csv"), "plain-name_1.csv");
    }

    #[test]
    fn api_base_trailing_slash_is_trimmed() {
        let c = NetlifyClient::new("tok", "s", Duration::from_secs(1))
            .unwrap()
            .with_api_base("http://localhost:1234/api/v1/");
        assert_eq!(c.api_base(), "http://localhost:1234/api/v1");
    }

    // =========================================================================
    // Create Tests
    // =========================================================================

    #[tokio::test]
    async fn create_direct_sends_bearer_and_parses_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/sites/site-1/deploys")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(r#"{"id":"d1"}"#)
            .create_async()
            .await;

        let created = client(&server)
            .create_deploy(&CreateRequest::direct())
            .await
            .expect("create should succeed");

        mock.assert_async().await;
        assert_eq!(created.id, "d1");
        assert_eq!(created.required, None);
    }

    #[tokio::test]
    async fn create_with_digest_declares_files() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/sites/site-1/deploys")
            .match_body(Matcher::Json(serde_json::json!({
                "files": { "/report.xlsx": "abc123" }
            })))
            .with_status(201)
            .with_body(r#"{"id":"d2","required":[]}"#)
            .create_async()
            .await;

        let created = client(&server)
            .create_deploy(&CreateRequest::declaring(
                "/report.xlsx".into(),
                "abc123".into(),
            ))
            .await
            .expect("create should succeed");

        mock.assert_async().await;
        assert_eq!(created.required, Some(vec![]));
        assert!(!created.needs_upload("abc123"));
    }

    #[tokio::test]
    async fn create_missing_id_is_inconsistency() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/sites/site-1/deploys")
            .with_status(200)
            .with_body(r#"{"state":"new"}"#)
            .create_async()
            .await;

        let err = client(&server)
            .create_deploy(&CreateRequest::direct())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DeployError::InternalInconsistency {
                phase: DeployPhase::Create,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn create_rejection_keeps_status_and_body() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/sites/site-1/deploys")
            .with_status(401)
            .with_body("Access Denied")
            .create_async()
            .await;

        let err = client(&server)
            .create_deploy(&CreateRequest::direct())
            .await
            .unwrap_err();

        match err {
            DeployError::BackendRejected {
                phase,
                status,
                body,
            } => {
                assert_eq!(phase, DeployPhase::Create);
                assert_eq!(status, 401);
                assert_eq!(body, "Access Denied");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn create_with_202_is_rejected() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/sites/site-1/deploys")
            .with_status(202)
            .with_body(r#"{"id":"d1"}"#)
            .create_async()
            .await;

        let err = client(&server)
            .create_deploy(&CreateRequest::direct())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::BackendRejected { status: 202, .. }));
    }

    // =========================================================================
    // Upload Tests
    // =========================================================================

    #[tokio::test]
    async fn upload_sets_content_headers_and_encodes_name() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/deploys/d1/files/Q3%20report.xlsx")
            .match_header("authorization", "Bearer tok")
            .match_header("content-type", "application/octet-stream")
            .match_header("content-length", "5")
            .match_body("hello")
            .with_status(200)
            .create_async()
            .await;

        client(&server)
            .upload_content("d1", &payload("Q3 report.xlsx", b"hello"))
            .await
            .expect("upload should succeed");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn upload_failure_is_attributed_to_upload() {
        let mut server = Server::new_async().await;
        server
            .mock("PUT", "/deploys/d1/files/a.csv")
            .with_status(422)
            .with_body(r#"{"message":"bad"}"#)
            .create_async()
            .await;

        let err = client(&server)
            .upload_content("d1", &payload("a.csv", b"1"))
            .await
            .unwrap_err();
        assert_eq!(err.phase(), Some(DeployPhase::Upload));
    }

    // =========================================================================
    // Promote Tests
    // =========================================================================

    #[tokio::test]
    async fn promote_reads_deploy_ssl_url() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/deploys/d1/publish")
            .with_status(200)
            .with_body(r#"{"deploy_ssl_url":"https://x.netlify.app","ssl_url":"https://other"}"#)
            .create_async()
            .await;

        let promoted = client(&server)
            .promote("d1", PromoteEndpoint::Publish)
            .await
            .expect("promote should succeed");

        mock.assert_async().await;
        assert_eq!(promoted.site_url.as_deref(), Some("https://x.netlify.app"));
    }

    #[tokio::test]
    async fn promote_restore_endpoint_and_empty_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/deploys/d1/restore")
            .with_status(201)
            .create_async()
            .await;

        let promoted = client(&server)
            .promote("d1", PromoteEndpoint::Restore)
            .await
            .expect("promote should succeed");

        mock.assert_async().await;
        assert_eq!(promoted.site_url, None);
    }

    #[tokio::test]
    async fn transport_error_is_reported_with_phase() {
        // Nothing listens on port 9 of the loopback interface
        let c = NetlifyClient::new("tok", "site-1", Duration::from_secs(2))
            .unwrap()
            .with_api_base("http://127.0.0.1:9");

        let err = c.create_deploy(&CreateRequest::direct()).await.unwrap_err();
        assert!(matches!(
            err,
            DeployError::TransportFailure {
                phase: DeployPhase::Create,
                ..
            }
        ));
    }
}
