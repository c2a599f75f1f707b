//! Evidence attached to an inspection record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The evidence portion of an inspection record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionEvidence {
    /// Record identifier.
    pub id: String,
    /// Every evidence URL attached to the record, oldest first.
    pub evidence_urls: Vec<String>,
    /// Named evidence slots, each holding at most one URL.
    pub evidence_slots: BTreeMap<String, String>,
}

impl InspectionEvidence {
    /// Create a record with no evidence.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Append a URL to the evidence list.
    pub fn append(&mut self, url: impl Into<String>) {
        self.evidence_urls.push(url.into());
    }

    /// Point `slot` at `url`, returning the URL it replaced.
    pub fn set_slot(&mut self, slot: impl Into<String>, url: impl Into<String>) -> Option<String> {
        self.evidence_slots.insert(slot.into(), url.into())
    }
}

/// Row shape of the `inspections` table's evidence columns.
#[derive(Debug, Clone, FromRow)]
pub struct EvidenceRow {
    pub id: String,
    pub evidence_urls: serde_json::Value,
    pub evidence_slots: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl EvidenceRow {
    /// Convert the JSON columns into typed evidence, ignoring malformed values.
    pub fn into_evidence(self) -> InspectionEvidence {
        let evidence_urls = serde_json::from_value(self.evidence_urls).unwrap_or_default();
        let evidence_slots = serde_json::from_value(self.evidence_slots).unwrap_or_default();
        InspectionEvidence {
            id: self.id,
            evidence_urls,
            evidence_slots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_overwrite_keeps_one_url() {
        let mut ev = InspectionEvidence::new("r1");
        assert_eq!(ev.set_slot("foto_bano", "u1"), None);
        assert_eq!(ev.set_slot("foto_bano", "u2"), Some("u1".to_string()));
        assert_eq!(ev.evidence_slots.len(), 1);
        assert_eq!(ev.evidence_slots["foto_bano"], "u2");
    }

    #[test]
    fn test_row_conversion() {
        let row = EvidenceRow {
            id: "r1".into(),
            evidence_urls: serde_json::json!(["a", "b"]),
            evidence_slots: serde_json::json!({"foto": "a"}),
            updated_at: Utc::now(),
        };
        let ev = row.into_evidence();
        assert_eq!(ev.evidence_urls, vec!["a", "b"]);
        assert_eq!(ev.evidence_slots.get("foto").map(String::as_str), Some("a"));
    }
}
