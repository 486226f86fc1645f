//! Directory principals and batch identifiers.

use serde::{Deserialize, Serialize};
use tenantdesk_core::{AppResult, NonEmptyString};
use uuid::Uuid;

/// Newly created directory principal that assignments are applied to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    id: NonEmptyString,
    user_principal_name: NonEmptyString,
    display_name: NonEmptyString,
}

impl Identity {
    /// Creates a validated identity reference.
    pub fn new(
        id: impl Into<String>,
        user_principal_name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            id: NonEmptyString::new(id)?,
            user_principal_name: NonEmptyString::new(user_principal_name)?,
            display_name: NonEmptyString::new(display_name)?,
        })
    }

    /// Returns the opaque object id assigned by the directory service.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Returns the login identifier used by the mailbox service.
    #[must_use]
    pub fn user_principal_name(&self) -> &str {
        self.user_principal_name.as_str()
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }
}

/// Unique identifier for one provisioning batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(Uuid);

impl BatchId {
    /// Creates a new random batch identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Identity;

    #[test]
    fn identity_rejects_blank_principal_name() {
        assert!(Identity::new("c1b2", "  ", "Jo Bloggs").is_err());
    }

    #[test]
    fn identity_deserializes_from_batch_file_shape() {
        let identity = serde_json::from_str::<Identity>(
            r#"{"id":"c1b2","user_principal_name":"jo@contoso.com","display_name":"Jo Bloggs"}"#,
        );
        assert!(identity.is_ok());
        let identity = identity.unwrap_or_else(|_| unreachable!());
        assert_eq!(identity.user_principal_name(), "jo@contoso.com");
    }
}
