//! The principal on whose behalf an operation runs.

use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// Authenticated caller as handed over by the request layer.
///
/// Operations not attributable to a user (seeding, maintenance jobs) run as
/// [`Actor::System`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Actor {
    User { id: UserId, name: String },
    System,
}

impl Actor {
    pub fn user(id: UserId, name: impl Into<String>) -> Self {
        Self::User {
            id,
            name: name.into(),
        }
    }

    pub fn system() -> Self {
        Self::System
    }

    /// Name recorded in audit events.
    pub fn name(&self) -> &str {
        match self {
            Actor::User { name, .. } => name,
            Actor::System => "system",
        }
    }
}

impl core::fmt::Display for Actor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
