//! Netdrop Core Library
//!
//! Provides the domain logic for publishing operator-submitted files to a
//! static-hosting backend: identity gating, file validation, bundling and
//! the create/upload/promote deploy protocol.

pub mod artifact;
pub mod bundle;
pub mod config;
pub mod deploy;
pub mod error;
pub mod fs;
pub mod identity;
pub mod pipeline;
pub mod report;
pub mod validate;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{
        AccessSection, FilesSection, HostingSection, NetdropConfig, Secret, TelegramSection,
    };

    // Identity and validation
    pub use crate::identity::{AllowList, IdentityGate, Principal};
    pub use crate::validate::{ExtensionPolicy, FileValidator};

    // Artifacts
    pub use crate::artifact::{DeployPayload, FileArtifact};
    pub use crate::bundle::{ArtifactBundler, Bundle};
    pub use crate::fs::{SafeFileName, StagingArea};

    // Deploy protocol
    pub use crate::deploy::{
        DeployOrchestrator, DeployOutcome, DeployPhase, DeploySession, DeployStrategy,
        HostingBackend, NetlifyClient, PromoteEndpoint, PublishedDeploy, SessionState, UrlMode,
    };

    // Errors
    pub use crate::error::{ArtifactError, DeployError};

    // Pipeline and reporting
    pub use crate::pipeline::{DocumentRef, DocumentSource, InboundEvent, UploadPipeline};
    pub use crate::report::ResultReporter;
}
