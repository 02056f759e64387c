//! Principals: the authenticated actors behind every mutation.
//!
//! Credential issuance and verification live in an external collaborator;
//! this module only models the opaque descriptor it produces. The one
//! invariant enforced here is that a college-role principal always carries
//! the single college code it is scoped to, and an admin never does.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Actor role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access to every record and field.
    Admin,
    /// Access restricted to one record and a field subset.
    College,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => f.write_str("admin"),
            Self::College => f.write_str("college"),
        }
    }
}

/// Errors from principal construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PrincipalError {
    /// A college principal was built without a scoped code.
    #[error("college principal {id} is missing a scoped college code")]
    MissingScopedCode {
        /// The offending principal id.
        id: String,
    },

    /// An admin principal was built with a scoped code.
    #[error("admin principal {id} must not carry a scoped college code")]
    UnexpectedScopedCode {
        /// The offending principal id.
        id: String,
    },
}

/// An authenticated actor.
///
/// Construct through [`Principal::admin`], [`Principal::college`], or the
/// validating [`Principal::new`]; the scoped-code invariant cannot be
/// violated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    id: String,
    role: Role,
    scoped_code: Option<String>,
}

impl Principal {
    /// Creates a principal, enforcing that a scoped code is present iff the
    /// role is [`Role::College`].
    ///
    /// # Errors
    ///
    /// Returns [`PrincipalError`] when the scoped code does not match the
    /// role.
    pub fn new(
        id: impl Into<String>,
        role: Role,
        scoped_code: Option<String>,
    ) -> Result<Self, PrincipalError> {
        let id = id.into();
        match (role, &scoped_code) {
            (Role::College, None) => Err(PrincipalError::MissingScopedCode { id }),
            (Role::Admin, Some(_)) => Err(PrincipalError::UnexpectedScopedCode { id }),
            _ => Ok(Self {
                id,
                role,
                scoped_code,
            }),
        }
    }

    /// Creates an admin principal.
    #[must_use]
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Admin,
            scoped_code: None,
        }
    }

    /// Creates a college principal scoped to `code`.
    #[must_use]
    pub fn college(id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::College,
            scoped_code: Some(code.into()),
        }
    }

    /// The principal's id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The principal's role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// The single college code a college principal may act on. `None` for
    /// admins.
    #[must_use]
    pub fn scoped_code(&self) -> Option<&str> {
        self.scoped_code.as_deref()
    }

    /// Whether this principal may act on the record with `code`.
    #[must_use]
    pub fn may_access(&self, code: &str) -> bool {
        match self.role {
            Role::Admin => true,
            Role::College => self.scoped_code.as_deref() == Some(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn college_principal_requires_scoped_code() {
        let err = Principal::new("u1", Role::College, None).unwrap_err();
        assert!(matches!(err, PrincipalError::MissingScopedCode { .. }));
    }

    #[test]
    fn admin_principal_rejects_scoped_code() {
        let err = Principal::new("u1", Role::Admin, Some("COL001".to_string())).unwrap_err();
        assert!(matches!(err, PrincipalError::UnexpectedScopedCode { .. }));
    }

    #[test]
    fn scope_check() {
        let admin = Principal::admin("a1");
        let college = Principal::college("c1", "COL001");

        assert!(admin.may_access("COL001"));
        assert!(admin.may_access("COL002"));
        assert!(college.may_access("COL001"));
        assert!(!college.may_access("COL002"));
    }
}
