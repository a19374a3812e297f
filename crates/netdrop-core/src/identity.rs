//! Principal identity and the allow-list gate.

use std::collections::HashSet;

/// The requester of an upload, as reported by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    pub display_name: Option<String>,
}

impl Principal {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Set of principal identifiers permitted to upload.
///
/// An empty list denies everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    ids: HashSet<i64>,
}

impl AllowList {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Decides whether a principal may start an upload.
#[derive(Debug, Clone)]
pub struct IdentityGate {
    allow: AllowList,
}

impl IdentityGate {
    pub fn new(allow: AllowList) -> Self {
        if allow.is_empty() {
            tracing::warn!("allow-list is empty; every upload request will be rejected");
        }
        Self { allow }
    }

    /// Membership test without side effects.
    pub fn is_member(&self, principal: &Principal) -> bool {
        self.allow.contains(principal.id)
    }

    /// Membership test that records rejections for audit.
    pub fn authorize(&self, principal: &Principal) -> bool {
        let allowed = self.is_member(principal);
        if !allowed {
            tracing::warn!(
                principal = principal.id,
                name = principal.display_name.as_deref().unwrap_or(""),
                "unauthorized upload attempt"
            );
        }
        allowed
    }
}
