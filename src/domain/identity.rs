//! Caller identity as supplied by the external session/authentication layer.

use serde::{Deserialize, Serialize};

use super::url::SITE_CONTEXT;

/// Editorial roles a user may hold within a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SiteAdmin,
    Manager,
    Editor,
    Author,
    Reviewer,
    Reader,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SiteAdmin => "site_admin",
            Role::Manager => "manager",
            Role::Editor => "editor",
            Role::Author => "author",
            Role::Reviewer => "reviewer",
            Role::Reader => "reader",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Context path the role applies to; `index` means site-wide.
    pub context: String,
    pub role: Role,
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    #[serde(default)]
    pub roles: Vec<RoleAssignment>,
}

impl Principal {
    /// True if the principal holds any of `roles` in `context`.
    ///
    /// Site administrators pass every check; site-wide assignments apply to every
    /// tenant.
    pub fn has_any_role(&self, context: &str, roles: &[Role]) -> bool {
        self.roles.iter().any(|assignment| {
            assignment.role == Role::SiteAdmin
                || ((assignment.context == context || assignment.context == SITE_CONTEXT)
                    && roles.contains(&assignment.role))
        })
    }
}

/// Session state attached to a request by the session middleware.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub principal: Option<Principal>,
    pub locale: Option<String>,
}
