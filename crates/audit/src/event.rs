use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::AuditEventId;

/// What happened. Stored as a plain tag (`"OrderPlaced"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum AuditKind {
    OrderPlaced,
    ProductCreated,
    ProductUpdated,
    ProductDeleted,
    StockUpdated,
    /// Free-form tag from a collaborator outside this crate.
    Other(String),
}

impl AuditKind {
    pub fn as_str(&self) -> &str {
        match self {
            AuditKind::OrderPlaced => "OrderPlaced",
            AuditKind::ProductCreated => "ProductCreated",
            AuditKind::ProductUpdated => "ProductUpdated",
            AuditKind::ProductDeleted => "ProductDeleted",
            AuditKind::StockUpdated => "StockUpdated",
            AuditKind::Other(tag) => tag,
        }
    }
}

impl From<String> for AuditKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "OrderPlaced" => AuditKind::OrderPlaced,
            "ProductCreated" => AuditKind::ProductCreated,
            "ProductUpdated" => AuditKind::ProductUpdated,
            "ProductDeleted" => AuditKind::ProductDeleted,
            "StockUpdated" => AuditKind::StockUpdated,
            _ => AuditKind::Other(value),
        }
    }
}

impl From<AuditKind> for String {
    fn from(value: AuditKind) -> Self {
        match value {
            AuditKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl core::fmt::Display for AuditKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single write-once audit record.
///
/// Audit events are facts: they are appended, never updated, and never read
/// back by the business engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: AuditEventId,
    pub occurred_at: DateTime<Utc>,
    pub kind: AuditKind,
    /// Actor identity: a user id, a user name, or `"system"`.
    pub actor: String,
    pub detail: String,
}

impl AuditEvent {
    pub fn new(kind: AuditKind, actor: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            id: AuditEventId::new(),
            occurred_at: Utc::now(),
            kind,
            actor: actor.into(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_round_trip_through_strings() {
        for kind in [
            AuditKind::OrderPlaced,
            AuditKind::ProductCreated,
            AuditKind::ProductUpdated,
            AuditKind::ProductDeleted,
            AuditKind::StockUpdated,
        ] {
            let tag: String = kind.clone().into();
            assert_eq!(AuditKind::from(tag), kind);
        }
    }

    #[test]
    fn unknown_tags_are_kept_verbatim() {
        let kind = AuditKind::from("PriceReviewed".to_string());
        assert_eq!(kind, AuditKind::Other("PriceReviewed".into()));
        assert_eq!(kind.as_str(), "PriceReviewed");
    }

    #[test]
    fn serializes_kind_as_plain_tag() {
        let event = AuditEvent::new(AuditKind::StockUpdated, "bob", "Added: 2");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "StockUpdated");
        assert_eq!(json["actor"], "bob");
    }
}
