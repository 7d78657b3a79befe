//! Verified principals and organisation roles.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Role a principal holds inside an organisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgRole {
    Admin,
    Member,
    Agent,
    Viewer,
}

impl OrgRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
            Self::Agent => "agent",
            Self::Viewer => "viewer",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            "agent" => Some(Self::Agent),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }
}

/// Membership of a principal in one organisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgMembership {
    pub role: OrgRole,
}

/// A verified principal: the identity behind a bearer token after the
/// auth provider has validated it. Tokens themselves never reach the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub email: String,
    #[serde(default)]
    pub organizations: HashMap<String, OrgMembership>,
}

impl Principal {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            organizations: HashMap::new(),
        }
    }

    /// Add an organisation membership (builder, used heavily in tests).
    pub fn with_org(mut self, org_id: impl Into<String>, role: OrgRole) -> Self {
        self.organizations
            .insert(org_id.into(), OrgMembership { role });
        self
    }
}

/// The kind of operation being authorised. Each kind maps to the set of
/// organisation roles allowed to perform it on org-owned resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Read,
    Mutate,
    Delete,
}

impl OpKind {
    /// Organisation roles permitted to act for this operation kind.
    pub fn allowed_roles(&self) -> &'static [OrgRole] {
        match self {
            Self::Read => &[OrgRole::Admin, OrgRole::Member, OrgRole::Agent, OrgRole::Viewer],
            Self::Mutate => &[OrgRole::Admin, OrgRole::Member, OrgRole::Agent],
            Self::Delete => &[OrgRole::Admin, OrgRole::Member],
        }
    }
}
