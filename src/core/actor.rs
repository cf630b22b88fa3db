//! Calling identity for mutating operations.
//!
//! Authentication and admin-role verification happen outside this crate; callers
//! hand in the outcome as [`Actor::authorized`] and every mutating operation checks it
//! before touching storage.

use crate::errors::{Error, Result};

/// Identity used for audit fields (`approved_by`, `created_by`, ...).
pub const SYSTEM_ACTOR: &str = "system";

/// The caller of a lifecycle or ledger operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Identifier recorded in audit fields
    pub id: String,
    /// Result of the external admin capability check
    pub authorized: bool,
}

impl Actor {
    /// An admin that passed the capability check.
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            authorized: true,
        }
    }

    /// The platform itself, e.g. the order-completion hook.
    #[must_use]
    pub fn system() -> Self {
        Self::admin(SYSTEM_ACTOR)
    }

    /// A caller that failed the capability check.
    pub fn unauthorized(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            authorized: false,
        }
    }

    /// Fails with [`Error::Unauthorized`] unless the actor passed the capability check.
    pub fn require(&self, action: &str) -> Result<()> {
        if self.authorized {
            Ok(())
        } else {
            Err(Error::Unauthorized {
                actor: self.id.clone(),
                action: action.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require() {
        assert!(Actor::admin("alex").require("approve tenants").is_ok());
        assert!(Actor::system().require("record earnings").is_ok());
        assert!(matches!(
            Actor::unauthorized("mallory").require("approve tenants"),
            Err(Error::Unauthorized { actor, .. }) if actor == "mallory"
        ));
    }
}
