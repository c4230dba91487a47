//! Portal roles. The wire form is the upper-case name the API issues in both
//! the login response and the credential's `role` claim.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Student,
    Mentor,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Student, Role::Mentor, Role::Admin];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Mentor => "MENTOR",
            Role::Admin => "ADMIN",
        }
    }

    /// Landing page the UI navigates to right after a successful login.
    #[must_use]
    pub const fn home_path(self) -> &'static str {
        match self {
            Role::Student => "/student/dashboard",
            Role::Mentor => "/mentor/dashboard",
            Role::Admin => "/admin/dashboard",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "STUDENT" => Ok(Role::Student),
            "MENTOR" => Ok(Role::Mentor),
            "ADMIN" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
