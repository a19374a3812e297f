//! Inbound file pipeline
//!
//! Runs one inbound document through IdentityGate → FileValidator → staging →
//! DeployOrchestrator. Each stage short-circuits; the staging directory is
//! removed on every exit path.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::artifact::FileArtifact;
use crate::config::NetdropConfig;
use crate::deploy::{DeployOrchestrator, DeployOutcome, HostingBackend};
use crate::error::{ArtifactError, BoxError, DeployError};
use crate::fs::{SafeFileName, StagedAttempt, StagingArea};
use crate::identity::{IdentityGate, Principal};
use crate::validate::FileValidator;

/// Transport-side reference to a submitted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    /// Opaque handle the transport uses to retrieve the bytes
    pub handle: String,
    pub file_name: Option<String>,
    pub declared_size: Option<u64>,
}

/// One inbound file event from the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub principal: Principal,
    pub document: DocumentRef,
}

/// Retrieves document bytes from the chat transport.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Write the referenced document to `dest`, returning the bytes written.
    ///
    /// Implementations stop reading once more than `limit` bytes have
    /// arrived; the returned count then exceeds `limit`.
    async fn fetch(&self, document: &DocumentRef, dest: &Path, limit: u64)
    -> Result<u64, BoxError>;
}

/// Authorizes, validates, stages and deploys inbound documents.
pub struct UploadPipeline<B, S> {
    gate: IdentityGate,
    validator: FileValidator,
    staging: StagingArea,
    max_file_bytes: u64,
    orchestrator: Arc<DeployOrchestrator<B>>,
    source: S,
}

impl<B, S> UploadPipeline<B, S>
where
    B: HostingBackend + 'static,
    S: DocumentSource,
{
    pub fn new(
        gate: IdentityGate,
        validator: FileValidator,
        staging: StagingArea,
        orchestrator: DeployOrchestrator<B>,
        source: S,
    ) -> Self {
        Self {
            gate,
            validator,
            staging,
            max_file_bytes: u64::MAX,
            orchestrator: Arc::new(orchestrator),
            source,
        }
    }

    /// Build the gate, validator and staging area from `[access]` and `[files]`.
    pub fn from_config(
        config: &NetdropConfig,
        orchestrator: DeployOrchestrator<B>,
        source: S,
    ) -> Self {
        Self::new(
            IdentityGate::new(config.access.allow_list()),
            FileValidator::new(config.files.extension_policy()),
            config.files.staging_area(),
            orchestrator,
            source,
        )
        .with_max_file_bytes(config.files.max_file_bytes)
    }

    pub fn with_max_file_bytes(mut self, limit: u64) -> Self {
        self.max_file_bytes = limit;
        self
    }

    pub fn gate(&self) -> &IdentityGate {
        &self.gate
    }

    pub fn validator(&self) -> &FileValidator {
        &self.validator
    }

    pub fn orchestrator(&self) -> &DeployOrchestrator<B> {
        &self.orchestrator
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Process one event to its single outcome.
    pub async fn handle(&self, event: InboundEvent) -> DeployOutcome {
        let principal = event.principal.id;
        let file = event.document.file_name.as_deref().unwrap_or("-");
        tracing::info!(principal, file, "file received");

        let outcome = match self.admit(&event) {
            Ok(name) => self.stage_and_deploy(name, &event.document).await,
            Err(err) => DeployOutcome::Failed(err),
        };

        match &outcome {
            DeployOutcome::Published(published) => {
                tracing::info!(principal, file, url = %published.url, "upload complete");
            }
            DeployOutcome::Failed(err) => {
                tracing::warn!(principal, file, error = %err, "upload failed");
            }
        }
        outcome
    }

    /// Checks that cost nothing beyond the event itself.
    fn admit(&self, event: &InboundEvent) -> Result<SafeFileName, DeployError> {
        if !self.gate.authorize(&event.principal) {
            return Err(DeployError::Unauthorized {
                principal: event.principal.id,
            });
        }

        let name = self
            .validator
            .validate(event.document.file_name.as_deref())?;

        if let Some(size) = event.document.declared_size {
            self.check_size(size)?;
        }
        Ok(name)
    }

    fn check_size(&self, size: u64) -> Result<(), ArtifactError> {
        if size > self.max_file_bytes {
            return Err(ArtifactError::FileTooLarge {
                size,
                limit: self.max_file_bytes,
            });
        }
        Ok(())
    }

    async fn stage_and_deploy(&self, name: SafeFileName, document: &DocumentRef) -> DeployOutcome {
        let attempt = match self.staging.begin().await {
            Ok(attempt) => attempt,
            Err(e) => {
                return DeployOutcome::Failed(DeployError::staging(
                    "could not create staging directory",
                    e,
                ));
            }
        };

        let outcome = match self.download(&attempt, name, document).await {
            Ok(artifact) => self.deploy_detached(artifact).await,
            Err(err) => DeployOutcome::Failed(err),
        };

        attempt.discard().await;
        outcome
    }

    async fn download(
        &self,
        attempt: &StagedAttempt,
        name: SafeFileName,
        document: &DocumentRef,
    ) -> Result<FileArtifact, DeployError> {
        let path = attempt.file_path(&name);

        let written = self
            .source
            .fetch(document, &path, self.max_file_bytes)
            .await
            .map_err(|e| DeployError::staging(format!("download of {name} failed"), e))?;
        self.check_size(written)?;

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| DeployError::staging(format!("staged {name} is unreadable"), e))?;

        let artifact = match document.declared_size {
            Some(declared) => FileArtifact::with_declared_size(name, bytes, declared)?,
            None => FileArtifact::new(name, bytes),
        };
        Ok(artifact)
    }

    /// Run the deploy on its own task so dropping the caller never aborts a
    /// backend call that is already in flight; its result is then discarded.
    async fn deploy_detached(&self, artifact: FileArtifact) -> DeployOutcome {
        let orchestrator = Arc::clone(&self.orchestrator);
        let task =
            tokio::spawn(async move { orchestrator.deploy_artifacts(vec![artifact]).await });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => DeployOutcome::Failed(DeployError::TaskAborted(e)),
        }
    }
}
