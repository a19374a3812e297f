//! Hosting backend seam.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::artifact::DeployPayload;
use crate::error::DeployError;

use super::PromoteEndpoint;

/// Body of a create-deploy request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateRequest {
    /// Deploy path → content digest, present for digest-declared creation.
    pub files: Option<BTreeMap<String, String>>,
}

impl CreateRequest {
    pub fn direct() -> Self {
        Self { files: None }
    }

    pub fn declaring(path: String, digest: String) -> Self {
        Self {
            files: Some(BTreeMap::from([(path, digest)])),
        }
    }
}

/// Response of a successful create-deploy request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedDeploy {
    pub id: String,
    /// Digests the backend still needs; `None` when the backend did not say.
    pub required: Option<Vec<String>>,
}

impl CreatedDeploy {
    /// Whether content with `digest` still has to be transferred.
    pub fn needs_upload(&self, digest: &str) -> bool {
        match &self.required {
            Some(required) => required.iter().any(|d| d.eq_ignore_ascii_case(digest)),
            None => true,
        }
    }
}

/// Response of a successful promote request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromotedDeploy {
    /// Public site URL, when the backend reports one.
    pub site_url: Option<String>,
}

/// The three remote operations of a deploy.
///
/// Implementations hold no per-deploy state; everything an attempt needs is
/// passed in, so one backend can serve concurrent attempts.
#[async_trait]
pub trait HostingBackend: Send + Sync {
    async fn create_deploy(&self, request: &CreateRequest) -> Result<CreatedDeploy, DeployError>;

    async fn upload_content(
        &self,
        deploy_id: &str,
        payload: &DeployPayload,
    ) -> Result<(), DeployError>;

    async fn promote(
        &self,
        deploy_id: &str,
        endpoint: PromoteEndpoint,
    ) -> Result<PromotedDeploy, DeployError>;
}
