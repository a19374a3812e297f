//! Deploy orchestration across the create/upload/promote phases.

use crate::artifact::{DeployPayload, FileArtifact};
use crate::bundle::ArtifactBundler;
use crate::error::DeployError;
use crate::fs::SafeFileName;

use super::backend::{CreateRequest, HostingBackend};
use super::netlify::encode_segment;
use super::session::{DeployOutcome, DeploySession};
use super::{DeployPhase, DeployStrategy, PromoteEndpoint, UrlMode};

/// Protocol choices made by configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub strategy: DeployStrategy,
    pub promote: PromoteEndpoint,
    pub url_mode: UrlMode,
}

/// Drives one deploy attempt per call.
///
/// Holds no per-attempt state: every call builds a fresh [`DeploySession`],
/// so a shared orchestrator can run concurrent deploys. Nothing is retried;
/// a failed phase ends the attempt.
#[derive(Debug)]
pub struct DeployOrchestrator<B> {
    backend: B,
    settings: OrchestratorSettings,
    bundler: ArtifactBundler,
}

impl<B: HostingBackend> DeployOrchestrator<B> {
    pub fn new(backend: B, settings: OrchestratorSettings) -> Self {
        Self {
            backend,
            settings,
            bundler: ArtifactBundler::new(),
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Decide how the artifacts are shipped: a lone file goes as-is when the
    /// strategy allows it, anything else is bundled.
    pub fn prepare(&self, mut artifacts: Vec<FileArtifact>) -> Result<DeployPayload, DeployError> {
        if artifacts.len() == 1 && self.settings.strategy.allows_single_file() {
            return Ok(DeployPayload::single(artifacts.remove(0)));
        }
        let bundle = self.bundler.bundle(&artifacts)?;
        Ok(DeployPayload::Bundle(bundle))
    }

    /// Prepare and deploy in one step.
    pub async fn deploy_artifacts(&self, artifacts: Vec<FileArtifact>) -> DeployOutcome {
        match self.prepare(artifacts) {
            Ok(payload) => self.deploy(payload).await,
            Err(err) => DeployOutcome::Failed(err),
        }
    }

    /// Run a fresh session for `payload` to a terminal state.
    pub async fn deploy(&self, payload: DeployPayload) -> DeployOutcome {
        let mut session = DeploySession::new(payload);

        if let Err(err) = self.drive(&mut session).await {
            tracing::warn!(
                deploy_id = session.deploy_id().unwrap_or("-"),
                state = ?session.state(),
                error = %err,
                "deploy failed"
            );
            session.fail(err);
        }

        session.finish()
    }

    async fn drive(&self, session: &mut DeploySession) -> Result<(), DeployError> {
        let strategy = self.settings.strategy;
        let name = session.payload().target_name().clone();
        let digest = session.payload().digest().to_string();

        // Init → Created
        let request = if strategy.declares_digest() {
            CreateRequest::declaring(format!("/{name}"), digest.clone())
        } else {
            CreateRequest::direct()
        };
        let created = self.backend.create_deploy(&request).await?;
        let upload_required = !strategy.declares_digest() || created.needs_upload(&digest);
        session.mark_created(created.id.clone(), upload_required)?;
        tracing::info!(
            deploy_id = %created.id,
            file = %name,
            digest = %digest,
            ?strategy,
            "deploy created"
        );

        // Created → ContentUploaded
        // Sizes reported by the transport were checked when the artifact was
        // built; the content length sent is always the payload's byte count.
        if upload_required {
            let payload = session.payload();
            let bytes = payload.bytes().len();
            self.backend.upload_content(&created.id, payload).await?;
            session.mark_uploaded()?;
            tracing::info!(deploy_id = %created.id, bytes, "content uploaded");
        } else {
            tracing::info!(
                deploy_id = %created.id,
                digest = %digest,
                "content already known to backend, skipping upload"
            );
        }

        // → Published
        let promoted = self
            .backend
            .promote(&created.id, self.settings.promote)
            .await?;
        let url = self.public_url(promoted.site_url.as_deref(), &name)?;
        session.mark_published(url.clone())?;
        tracing::info!(deploy_id = %created.id, url = %url, "deploy published");

        Ok(())
    }

    fn public_url(&self, site_url: Option<&str>, name: &SafeFileName) -> Result<String, DeployError> {
        let base = match &self.settings.url_mode {
            UrlMode::Backend => site_url.ok_or_else(|| DeployError::InternalInconsistency {
                phase: DeployPhase::Publish,
                detail: "promote response did not include a site URL".to_string(),
            })?,
            UrlMode::Templated { public_base_url } => public_base_url.as_str(),
        };
        Ok(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            encode_segment(name.as_str())
        ))
    }
}
