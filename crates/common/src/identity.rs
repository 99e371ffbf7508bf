//! Authenticated caller identity.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Role granted to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The already-authenticated subject of a request and its role.
///
/// Authorization decisions are pure functions of an `Identity` and the
/// resource being touched; nothing is looked up from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    subject: UserId,
    role: Role,
}

impl Identity {
    pub fn new(subject: UserId, role: Role) -> Self {
        Self { subject, role }
    }

    /// Identity of a regular customer.
    pub fn customer(subject: UserId) -> Self {
        Self::new(subject, Role::User)
    }

    /// Identity holding the elevated role.
    pub fn admin(subject: UserId) -> Self {
        Self::new(subject, Role::Admin)
    }

    pub fn subject(&self) -> UserId {
        self.subject
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this caller may read a resource owned by `owner`.
    pub fn can_access(&self, owner: UserId) -> bool {
        self.is_admin() || self.subject == owner
    }

    /// Whether this caller may change the catalog (categories and products).
    pub fn can_manage_catalog(&self) -> bool {
        self.is_admin()
    }
}
