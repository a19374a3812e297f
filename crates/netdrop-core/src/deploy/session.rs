//! Per-attempt deploy state machine.
//!
//! ```text
//! Init → Created → ContentUploaded → Published
//!          └──────(content known)──────┘
//! any non-terminal state → Failed
//! ```
//!
//! A session only moves forward and is consumed by [`DeploySession::finish`];
//! a terminal session can never be driven again.

use crate::artifact::DeployPayload;
use crate::error::DeployError;

use super::DeployPhase;

/// Lifecycle position of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Init,
    Created,
    ContentUploaded,
    Published,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Published | Self::Failed)
    }
}

/// Successful result of a deploy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedDeploy {
    pub deploy_id: String,
    pub url: String,
    pub digest: String,
    /// True when the backend already held the content and no bytes were sent.
    pub upload_skipped: bool,
}

/// Final result of an attempt, handed to the reporter.
#[derive(Debug)]
pub enum DeployOutcome {
    Published(PublishedDeploy),
    Failed(DeployError),
}

impl DeployOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published(_))
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Published(published) => Some(&published.url),
            Self::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&DeployError> {
        match self {
            Self::Published(_) => None,
            Self::Failed(err) => Some(err),
        }
    }
}

impl From<DeployError> for DeployOutcome {
    fn from(err: DeployError) -> Self {
        Self::Failed(err)
    }
}

/// Mutable state of one deploy attempt.
#[derive(Debug)]
pub struct DeploySession {
    state: SessionState,
    payload: DeployPayload,
    deploy_id: Option<String>,
    upload_required: bool,
    url: Option<String>,
    error: Option<DeployError>,
}

impl DeploySession {
    pub fn new(payload: DeployPayload) -> Self {
        Self {
            state: SessionState::Init,
            payload,
            deploy_id: None,
            upload_required: true,
            url: None,
            error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn payload(&self) -> &DeployPayload {
        &self.payload
    }

    pub fn deploy_id(&self) -> Option<&str> {
        self.deploy_id.as_deref()
    }

    pub fn upload_required(&self) -> bool {
        self.upload_required
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn error(&self) -> Option<&DeployError> {
        self.error.as_ref()
    }

    /// Init → Created, recording the backend-assigned id.
    pub fn mark_created(
        &mut self,
        deploy_id: String,
        upload_required: bool,
    ) -> Result<(), DeployError> {
        self.expect_state(SessionState::Init, DeployPhase::Create)?;
        self.deploy_id = Some(deploy_id);
        self.upload_required = upload_required;
        self.state = SessionState::Created;
        Ok(())
    }

    /// Created → ContentUploaded.
    pub fn mark_uploaded(&mut self) -> Result<(), DeployError> {
        self.expect_state(SessionState::Created, DeployPhase::Upload)?;
        if !self.upload_required {
            return Err(DeployError::InternalInconsistency {
                phase: DeployPhase::Upload,
                detail: "content was already known, upload must be skipped".to_string(),
            });
        }
        self.state = SessionState::ContentUploaded;
        Ok(())
    }

    /// ContentUploaded → Published, or Created → Published when the upload
    /// was skipped because the backend already held the content.
    pub fn mark_published(&mut self, url: String) -> Result<(), DeployError> {
        let ready = match self.state {
            SessionState::ContentUploaded => true,
            SessionState::Created => !self.upload_required,
            _ => false,
        };
        if !ready {
            return Err(self.transition_error(DeployPhase::Publish));
        }
        self.url = Some(url);
        self.state = SessionState::Published;
        Ok(())
    }

    /// Any non-terminal state → Failed.
    pub fn fail(&mut self, err: DeployError) {
        if self.state.is_terminal() {
            tracing::warn!(state = ?self.state, error = %err, "ignoring failure on terminal session");
            return;
        }
        self.error = Some(err);
        self.state = SessionState::Failed;
    }

    /// Consume the session into its outcome.
    pub fn finish(self) -> DeployOutcome {
        match (self.state, self.deploy_id, self.url, self.error) {
            (SessionState::Published, Some(deploy_id), Some(url), _) => {
                DeployOutcome::Published(PublishedDeploy {
                    deploy_id,
                    url,
                    digest: self.payload.digest().to_string(),
                    upload_skipped: !self.upload_required,
                })
            }
            (SessionState::Failed, _, _, Some(err)) => DeployOutcome::Failed(err),
            (state, ..) => DeployOutcome::Failed(DeployError::InternalInconsistency {
                phase: DeployPhase::Publish,
                detail: format!("session finished in non-terminal state {state:?}"),
            }),
        }
    }

    fn expect_state(&self, expected: SessionState, phase: DeployPhase) -> Result<(), DeployError> {
        if self.state != expected {
            return Err(self.transition_error(phase));
        }
        Ok(())
    }

    fn transition_error(&self, phase: DeployPhase) -> DeployError {
        DeployError::InternalInconsistency {
            phase,
            detail: format!("invalid transition from {:?}", self.state),
        }
    }
}
