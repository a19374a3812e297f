//! Three-phase remote deploy protocol.
//!
//! A deploy is driven through `create → upload → promote` against a hosting
//! backend. [`DeployOrchestrator`] owns the transitions, [`DeploySession`]
//! owns the per-attempt state, and [`HostingBackend`] is the HTTP seam.

pub mod backend;
pub mod netlify;
pub mod orchestrator;
pub mod session;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use backend::{CreateRequest, CreatedDeploy, HostingBackend, PromotedDeploy};
pub use netlify::NetlifyClient;
pub use orchestrator::{DeployOrchestrator, OrchestratorSettings};
pub use session::{DeployOutcome, DeploySession, PublishedDeploy, SessionState};

/// Protocol phase a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeployPhase {
    Create,
    Upload,
    Publish,
}

impl DeployPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Upload => "upload",
            Self::Publish => "publish",
        }
    }
}

impl fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a deploy unit is created and what content is shipped.
///
/// - `DirectPut`: plain creation; a single file is uploaded as-is, several
///   files are bundled. Every run is an independent deploy unit.
/// - `ThreePhaseExplicit`: plain creation; content is always shipped as a
///   bundle. Every run is an independent deploy unit.
/// - `DigestDeclared`: creation declares the payload digest; when the backend
///   already holds that content the upload phase is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeployStrategy {
    #[default]
    DirectPut,
    ThreePhaseExplicit,
    DigestDeclared,
}

impl DeployStrategy {
    /// Whether a lone file may skip bundling.
    pub fn allows_single_file(self) -> bool {
        !matches!(self, Self::ThreePhaseExplicit)
    }

    pub fn declares_digest(self) -> bool {
        matches!(self, Self::DigestDeclared)
    }
}

/// Endpoint used to promote an uploaded deploy to live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromoteEndpoint {
    #[default]
    Publish,
    Restore,
}

impl PromoteEndpoint {
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Restore => "restore",
        }
    }
}

/// How the final public URL is built.
///
/// Reads either `url = "backend"` or a table such as
/// `url = { mode = "templated", public_base_url = "https://..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case", try_from = "UrlModeRepr")]
pub enum UrlMode {
    /// Site URL reported by the promote response, plus the file name.
    #[default]
    Backend,
    /// Fixed public base URL, plus the file name.
    Templated { public_base_url: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UrlModeRepr {
    Name(String),
    Table(UrlModeTable),
}

#[derive(Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
enum UrlModeTable {
    Backend,
    Templated { public_base_url: String },
}

impl TryFrom<UrlModeRepr> for UrlMode {
    type Error = String;

    fn try_from(repr: UrlModeRepr) -> Result<Self, Self::Error> {
        match repr {
            UrlModeRepr::Name(name) => match name.trim() {
                "backend" => Ok(Self::Backend),
                "templated" => Err(
                    "templated URLs need a base: url = { mode = \"templated\", public_base_url = \"...\" }"
                        .to_string(),
                ),
                other => Err(format!(
                    "unknown url mode '{other}', expected 'backend' or 'templated'"
                )),
            },
            UrlModeRepr::Table(UrlModeTable::Backend) => Ok(Self::Backend),
            UrlModeRepr::Table(UrlModeTable::Templated { public_base_url }) => {
                Ok(Self::Templated { public_base_url })
            }
        }
    }
}
