//! End-to-end tests for the inbound upload pipeline
//!
//! Drives UploadPipeline against a mock hosting API: identity gate → validator
//! → staging → create/upload/publish. Documents come from an in-memory source.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use mockito::{Matcher, Mock, Server, ServerGuard};
use tempfile::TempDir;

use netdrop_core::artifact::content_digest;
use netdrop_core::deploy::{
    DeployOrchestrator, DeployOutcome, DeployPhase, DeployStrategy, NetlifyClient,
    OrchestratorSettings,
};
use netdrop_core::error::{ArtifactError, BoxError, DeployError};
use netdrop_core::fs::StagingArea;
use netdrop_core::identity::{AllowList, IdentityGate, Principal};
use netdrop_core::pipeline::{DocumentRef, DocumentSource, InboundEvent, UploadPipeline};
use netdrop_core::validate::{ExtensionPolicy, FileValidator};

// =========================================================================
// Helper Functions
// =========================================================================

const REPORT: &str = "quarterly numbers";

/// Serves fixed bytes and records where it was asked to write them.
///
/// Like a streaming download, it stops one byte past the requested limit.
#[derive(Default)]
struct MemorySource {
    bytes: Vec<u8>,
    fetched: Mutex<Vec<PathBuf>>,
    limits: Mutex<Vec<u64>>,
}

impl MemorySource {
    fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            ..Default::default()
        }
    }

    fn fetched(&self) -> Vec<PathBuf> {
        self.fetched.lock().unwrap().clone()
    }

    fn limits(&self) -> Vec<u64> {
        self.limits.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    async fn fetch(
        &self,
        _document: &DocumentRef,
        dest: &Path,
        limit: u64,
    ) -> Result<u64, BoxError> {
        let take = self.bytes.len().min(limit.saturating_add(1) as usize);
        tokio::fs::write(dest, &self.bytes[..take]).await?;
        self.fetched.lock().unwrap().push(dest.to_path_buf());
        self.limits.lock().unwrap().push(limit);
        Ok(take as u64)
    }
}

struct Harness {
    pipeline: UploadPipeline<NetlifyClient, MemorySource>,
    staging: TempDir,
}

impl Harness {
    fn new(server: &ServerGuard, strategy: DeployStrategy) -> Self {
        Self::with_source(server, strategy, MemorySource::new(REPORT.as_bytes()))
    }

    fn with_source(server: &ServerGuard, strategy: DeployStrategy, source: MemorySource) -> Self {
        let staging = TempDir::new().unwrap();
        let client = NetlifyClient::new("tok", "site-1", Duration::from_secs(5))
            .unwrap()
            .with_api_base(server.url());
        let orchestrator = DeployOrchestrator::new(
            client,
            OrchestratorSettings {
                strategy,
                ..Default::default()
            },
        );
        let pipeline = UploadPipeline::new(
            IdentityGate::new(AllowList::new([42])),
            FileValidator::new(ExtensionPolicy::only(["xlsx", "csv"])),
            StagingArea::new(staging.path().to_path_buf()),
            orchestrator,
            source,
        )
        .with_max_file_bytes(1024);

        Self { pipeline, staging }
    }

    fn staging_is_empty(&self) -> bool {
        std::fs::read_dir(self.staging.path())
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }
}

fn event(principal: i64, file_name: &str, size: Option<u64>) -> InboundEvent {
    InboundEvent {
        principal: Principal::new(principal),
        document: DocumentRef {
            handle: "file-handle".to_string(),
            file_name: Some(file_name.to_string()),
            declared_size: size,
        },
    }
}

async fn mock_create(server: &mut ServerGuard, body: &str, hits: usize) -> Mock {
    server
        .mock("POST", "/sites/site-1/deploys")
        .with_status(200)
        .with_body(body)
        .expect(hits)
        .create_async()
        .await
}

async fn mock_upload(server: &mut ServerGuard, hits: usize) -> Mock {
    server
        .mock("PUT", "/deploys/d1/files/report.xlsx")
        .match_header("content-type", "application/octet-stream")
        .match_header("content-length", REPORT.len().to_string().as_str())
        .match_body(REPORT)
        .with_status(201)
        .expect(hits)
        .create_async()
        .await
}

async fn mock_publish(server: &mut ServerGuard, status: usize, hits: usize) -> Mock {
    server
        .mock("POST", "/deploys/d1/publish")
        .with_status(status)
        .with_body(r#"{"deploy_ssl_url":"https://x.netlify.app"}"#)
        .expect(hits)
        .create_async()
        .await
}

async fn mock_nothing(server: &mut ServerGuard) -> Vec<Mock> {
    let mut mocks = Vec::new();
    for method in ["GET", "POST", "PUT"] {
        mocks.push(
            server
                .mock(method, Matcher::Any)
                .expect(0)
                .create_async()
                .await,
        );
    }
    mocks
}

async fn assert_untouched(mocks: Vec<Mock>) {
    for mock in mocks {
        mock.assert_async().await;
    }
}

// =========================================================================
// Success Path
// =========================================================================

#[tokio::test]
async fn authorized_upload_is_published_at_site_url() {
    let mut server = Server::new_async().await;
    let create = mock_create(&mut server, r#"{"id":"d1"}"#, 1).await;
    let upload = mock_upload(&mut server, 1).await;
    let publish = mock_publish(&mut server, 200, 1).await;

    let harness = Harness::new(&server, DeployStrategy::DirectPut);
    let outcome = harness
        .pipeline
        .handle(event(42, "report.xlsx", Some(REPORT.len() as u64)))
        .await;

    assert_eq!(outcome.url(), Some("https://x.netlify.app/report.xlsx"));
    create.assert_async().await;
    upload.assert_async().await;
    publish.assert_async().await;

    assert_eq!(harness.pipeline.source().fetched().len(), 1);
    assert!(harness.staging_is_empty());
}

#[tokio::test]
async fn digest_declared_skips_upload_when_backend_has_content() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/sites/site-1/deploys")
        .match_body(Matcher::Json(serde_json::json!({
            "files": { "/report.xlsx": content_digest(REPORT.as_bytes()) }
        })))
        .with_status(201)
        .with_body(r#"{"id":"d1","required":[]}"#)
        .create_async()
        .await;
    let upload = mock_upload(&mut server, 0).await;
    let publish = mock_publish(&mut server, 200, 1).await;

    let harness = Harness::new(&server, DeployStrategy::DigestDeclared);
    let outcome = harness.pipeline.handle(event(42, "report.xlsx", None)).await;

    match &outcome {
        DeployOutcome::Published(published) => {
            assert!(published.upload_skipped);
            assert_eq!(published.url, "https://x.netlify.app/report.xlsx");
        }
        DeployOutcome::Failed(err) => panic!("unexpected failure: {err}"),
    }
    create.assert_async().await;
    upload.assert_async().await;
    publish.assert_async().await;
}

#[tokio::test]
async fn digest_declared_uploads_when_required() {
    let mut server = Server::new_async().await;
    let body = format!(r#"{{"id":"d1","required":["{}"]}}"#, content_digest(REPORT.as_bytes()));
    let create = mock_create(&mut server, &body, 1).await;
    let upload = mock_upload(&mut server, 1).await;
    let publish = mock_publish(&mut server, 200, 1).await;

    let harness = Harness::new(&server, DeployStrategy::DigestDeclared);
    let outcome = harness.pipeline.handle(event(42, "report.xlsx", None)).await;

    assert!(outcome.is_published());
    create.assert_async().await;
    upload.assert_async().await;
    publish.assert_async().await;
}

// =========================================================================
// Rejections Before Any Network Call
// =========================================================================

#[tokio::test]
async fn unauthorized_principal_never_reaches_backend() {
    let mut server = Server::new_async().await;
    let untouched = mock_nothing(&mut server).await;

    let harness = Harness::new(&server, DeployStrategy::DirectPut);
    let outcome = harness.pipeline.handle(event(99, "report.xlsx", None)).await;

    assert!(matches!(
        outcome.error(),
        Some(DeployError::Unauthorized { principal: 99 })
    ));
    assert_untouched(untouched).await;
    assert!(harness.pipeline.source().fetched().is_empty());
    assert!(harness.staging_is_empty());
}

#[tokio::test]
async fn unsupported_extension_is_rejected_without_download() {
    let mut server = Server::new_async().await;
    let untouched = mock_nothing(&mut server).await;

    let harness = Harness::new(&server, DeployStrategy::DirectPut);
    let outcome = harness.pipeline.handle(event(42, "payload.exe", None)).await;

    assert!(matches!(
        outcome.error(),
        Some(DeployError::InvalidArtifact(
            ArtifactError::UnsupportedExtension { .. }
        ))
    ));
    assert_untouched(untouched).await;
    assert!(harness.pipeline.source().fetched().is_empty());
}

#[tokio::test]
async fn oversized_declaration_is_rejected_without_download() {
    let mut server = Server::new_async().await;
    let untouched = mock_nothing(&mut server).await;

    let harness = Harness::new(&server, DeployStrategy::DirectPut);
    let outcome = harness
        .pipeline
        .handle(event(42, "report.xlsx", Some(4096)))
        .await;

    assert!(matches!(
        outcome.error(),
        Some(DeployError::InvalidArtifact(ArtifactError::FileTooLarge {
            size: 4096,
            limit: 1024
        }))
    ));
    assert_untouched(untouched).await;
    assert!(harness.pipeline.source().fetched().is_empty());
}

#[tokio::test]
async fn short_download_fails_size_check_and_cleans_up() {
    let mut server = Server::new_async().await;
    let untouched = mock_nothing(&mut server).await;

    let harness = Harness::new(&server, DeployStrategy::DirectPut);
    let outcome = harness
        .pipeline
        .handle(event(42, "report.xlsx", Some(REPORT.len() as u64 + 10)))
        .await;

    assert!(matches!(
        outcome.error(),
        Some(DeployError::InvalidArtifact(
            ArtifactError::SizeMismatch { .. }
        ))
    ));
    assert_untouched(untouched).await;
    assert!(harness.staging_is_empty());
}

#[tokio::test]
async fn undeclared_oversized_download_is_cut_off_and_rejected() {
    let mut server = Server::new_async().await;
    let untouched = mock_nothing(&mut server).await;

    let harness = Harness::with_source(
        &server,
        DeployStrategy::DirectPut,
        MemorySource::new(&[b'x'; 4096]),
    );
    let outcome = harness
        .pipeline
        .handle(event(42, "report.xlsx", None))
        .await;

    assert!(matches!(
        outcome.error(),
        Some(DeployError::InvalidArtifact(ArtifactError::FileTooLarge {
            size: 1025,
            limit: 1024
        }))
    ));
    assert_eq!(harness.pipeline.source().limits(), vec![1024]);
    assert_untouched(untouched).await;
    assert!(harness.staging_is_empty());
}

// =========================================================================
// Protocol Failures
// =========================================================================

#[tokio::test]
async fn publish_failure_is_reported_once_without_retry() {
    let mut server = Server::new_async().await;
    let create = mock_create(&mut server, r#"{"id":"d1"}"#, 1).await;
    let upload = mock_upload(&mut server, 1).await;
    let publish = mock_publish(&mut server, 500, 1).await;

    let harness = Harness::new(&server, DeployStrategy::DirectPut);
    let outcome = harness.pipeline.handle(event(42, "report.xlsx", None)).await;

    let err = outcome.error().expect("publish should fail");
    assert_eq!(err.phase(), Some(DeployPhase::Publish));
    assert!(matches!(err, DeployError::BackendRejected { status: 500, .. }));

    create.assert_async().await;
    upload.assert_async().await;
    publish.assert_async().await;
    assert!(harness.staging_is_empty());
}

#[tokio::test]
async fn create_failure_stops_before_upload() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/sites/site-1/deploys")
        .with_status(401)
        .with_body("Access Denied")
        .expect(1)
        .create_async()
        .await;
    let upload = mock_upload(&mut server, 0).await;
    let publish = mock_publish(&mut server, 200, 0).await;

    let harness = Harness::new(&server, DeployStrategy::DirectPut);
    let outcome = harness.pipeline.handle(event(42, "report.xlsx", None)).await;

    assert_eq!(
        outcome.error().and_then(|e| e.phase()),
        Some(DeployPhase::Create)
    );
    create.assert_async().await;
    upload.assert_async().await;
    publish.assert_async().await;
}

#[tokio::test]
async fn repeated_uploads_create_independent_deploys() {
    let mut server = Server::new_async().await;
    let create = mock_create(&mut server, r#"{"id":"d1"}"#, 2).await;
    let upload = mock_upload(&mut server, 2).await;
    let publish = mock_publish(&mut server, 200, 2).await;

    let harness = Harness::new(&server, DeployStrategy::DirectPut);
    let first = harness.pipeline.handle(event(42, "report.xlsx", None)).await;
    let second = harness.pipeline.handle(event(42, "report.xlsx", None)).await;

    assert_eq!(first.url(), second.url());
    create.assert_async().await;
    upload.assert_async().await;
    publish.assert_async().await;
}
