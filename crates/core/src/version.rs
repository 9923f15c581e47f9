//! Optimistic concurrency tokens.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Opaque row version attached to a stored record.
///
/// A new token is generated on every successful write. Tokens are only ever
/// compared for byte equality; their content carries no ordering.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(Vec<u8>);

impl ValueObject for VersionToken {}

impl VersionToken {
    /// Generate a token that differs from every previously issued one.
    pub fn fresh() -> Self {
        Self(Uuid::now_v7().as_bytes().to_vec())
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Require `actual` to equal this (expected) token.
    pub fn check(&self, actual: &VersionToken) -> DomainResult<()> {
        if self == actual {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self}, actual: {actual})"
            )))
        }
    }
}

impl core::fmt::Display for VersionToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl core::fmt::Debug for VersionToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "VersionToken({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_tokens_are_distinct() {
        let a = VersionToken::fresh();
        let b = VersionToken::fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn check_compares_bytes_exactly() {
        let stored = VersionToken::from_bytes(vec![1, 2, 3]);
        assert!(VersionToken::from_bytes(vec![1, 2, 3]).check(&stored).is_ok());
        assert!(matches!(
            VersionToken::from_bytes(vec![1, 2]).check(&stored),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn display_is_lower_hex() {
        assert_eq!(VersionToken::from_bytes(vec![0x0a, 0xff]).to_string(), "0aff");
    }
}
