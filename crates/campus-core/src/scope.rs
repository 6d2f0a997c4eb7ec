//! Tenant/role visibility scope derived from an identity.

use std::fmt;

use crate::models::{Identity, Role};

/// What an identity may subscribe to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Platform-wide: collections are not filtered by college
    Global { role: Role },
    College { college_id: String, role: Role },
    /// Nothing to subscribe to. Not an error: the UI renders an empty state.
    Empty,
}

impl Scope {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn college_id(&self) -> Option<&str> {
        match self {
            Self::College { college_id, .. } => Some(college_id),
            Self::Global { .. } | Self::Empty => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Self::Global { role } | Self::College { role, .. } => Some(*role),
            Self::Empty => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global { role } => write!(f, "GLOBAL/{}", role.label()),
            Self::College { college_id, role } => write!(f, "{}/{}", college_id, role.label()),
            Self::Empty => write!(f, "(empty)"),
        }
    }
}

/// Outcome of resolving an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Active(Scope),
    /// The account is frozen; the host must end the session.
    Terminate,
}

pub struct ScopeResolver;

impl ScopeResolver {
    pub fn resolve(identity: &Identity) -> Resolution {
        if identity.frozen {
            return Resolution::Terminate;
        }
        Resolution::Active(Self::scope_for(identity))
    }

    /// Scope ignoring the frozen flag. Unapproved identities get a full scope.
    pub fn scope_for(identity: &Identity) -> Scope {
        if identity.role.is_global() {
            return Scope::Global {
                role: identity.role,
            };
        }

        match identity.college_id.as_deref().map(str::trim) {
            Some(college_id) if !college_id.is_empty() => Scope::College {
                college_id: college_id.to_string(),
                role: identity.role,
            },
            _ => Scope::Empty,
        }
    }
}
