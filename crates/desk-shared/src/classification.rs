//! Strictly-validated classification results from the oracle.
//!
//! The oracle returns JSON; anything missing a required field, carrying
//! an unknown category tag, or with a confidence outside [0,1] is
//! rejected at the parse boundary. There is no default classification.

use crate::category::SupportCategory;
use crate::error::DeskError;
use crate::ticket::TicketStatus;
use serde::{Deserialize, Serialize};

/// Structured metadata extracted from the ticket text.
///
/// The oracle marks absent fields with a `MISSING` sentinel string;
/// those are normalized to `None` here so downstream code only ever
/// checks `Option`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketMetadata {
    #[serde(default, deserialize_with = "missing_as_none")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "missing_as_none")]
    pub payment_method: Option<String>,
    pub has_payment_proof: bool,
    pub is_info_complete: bool,
    #[serde(default)]
    pub missing_fields: Vec<String>,
    /// Decision-tree path the oracle took, for operator display
    #[serde(default)]
    pub branch_path: Vec<String>,
}

fn missing_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty() && !s.contains("MISSING")))
}

/// A complete oracle verdict for one ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub category: SupportCategory,
    /// Oracle confidence in [0, 1]
    pub confidence: f32,
    pub should_auto_send: bool,
    /// Generated reply draft (template text verbatim, or free-form)
    #[serde(rename = "reply_email")]
    pub reply_draft: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_summary: Option<String>,
    /// Rolling structured summary passed as continuity context on the
    /// next classification in the same thread
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_summary: Option<String>,
    #[serde(rename = "extracted_metadata")]
    pub metadata: TicketMetadata,
    /// Template the oracle chose; informational, the deterministic
    /// recommendation mapping is computed separately
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_template_id: Option<String>,
}

impl Classification {
    /// Parse and validate oracle output. Rejects malformed payloads
    /// rather than substituting defaults.
    pub fn from_json(text: &str) -> Result<Self, DeskError> {
        let parsed: Classification = serde_json::from_str(text)
            .map_err(|e| DeskError::Oracle(format!("unparseable oracle output: {e}")))?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Structural checks beyond what serde enforces.
    pub fn validate(&self) -> Result<(), DeskError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(DeskError::Oracle(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        if self.reply_draft.is_empty() {
            return Err(DeskError::Oracle("empty reply draft".to_string()));
        }
        Ok(())
    }

    /// Derive the ticket's next lifecycle status. First match wins:
    /// complete info beats everything, then the missing-info category,
    /// then the general processing state. Total over all inputs.
    pub fn derive_status(&self) -> TicketStatus {
        if self.metadata.is_info_complete {
            TicketStatus::ReadyToResolve
        } else if self.category == SupportCategory::SubscriptionMissingInfo {
            TicketStatus::InfoMissing
        } else {
            TicketStatus::InProgress
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(category: SupportCategory, complete: bool) -> Classification {
        Classification {
            category,
            confidence: 0.9,
            should_auto_send: false,
            reply_draft: "Dear Customer,".into(),
            reasoning_summary: None,
            thread_summary: None,
            metadata: TicketMetadata {
                is_info_complete: complete,
                ..Default::default()
            },
            selected_template_id: None,
        }
    }

    #[test]
    fn test_status_derivation_totality() {
        for cat in SupportCategory::ALL {
            for complete in [false, true] {
                let status = base(cat, complete).derive_status();
                assert!(matches!(
                    status,
                    TicketStatus::ReadyToResolve
                        | TicketStatus::InfoMissing
                        | TicketStatus::InProgress
                ));
            }
        }
    }

    #[test]
    fn test_complete_info_wins() {
        let c = base(SupportCategory::SubscriptionMissingInfo, true);
        assert_eq!(c.derive_status(), TicketStatus::ReadyToResolve);
    }

    #[test]
    fn test_missing_info_category() {
        let c = base(SupportCategory::SubscriptionMissingInfo, false);
        assert_eq!(c.derive_status(), TicketStatus::InfoMissing);
    }

    #[test]
    fn test_other_categories_in_progress() {
        let c = base(SupportCategory::NsfwIssue, false);
        assert_eq!(c.derive_status(), TicketStatus::InProgress);
    }

    #[test]
    fn test_missing_sentinel_normalized() {
        let json = r#"{
            "category": "SUBSCRIPTION_MISSING_INFO",
            "confidence": 0.8,
            "should_auto_send": false,
            "reply_email": "Dear Customer,",
            "extracted_metadata": {
                "user_id": "MISSING",
                "payment_method": "Stripe",
                "has_payment_proof": false,
                "is_info_complete": false,
                "missing_fields": ["user_id", "payment_proof"],
                "branch_path": ["BRANCH 1"]
            }
        }"#;
        let c = Classification::from_json(json).unwrap();
        assert_eq!(c.metadata.user_id, None);
        assert_eq!(c.metadata.payment_method.as_deref(), Some("Stripe"));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let json = r#"{
            "category": "REFUND",
            "confidence": 0.8,
            "should_auto_send": false,
            "reply_email": "x",
            "extracted_metadata": {"has_payment_proof": false, "is_info_complete": false}
        }"#;
        assert!(Classification::from_json(json).is_err());
    }

    #[test]
    fn test_missing_required_field_rejected() {
        // no extracted_metadata
        let json = r#"{
            "category": "OTHER",
            "confidence": 0.5,
            "should_auto_send": false,
            "reply_email": "x"
        }"#;
        assert!(Classification::from_json(json).is_err());
    }

    #[test]
    fn test_out_of_range_confidence_rejected() {
        let mut c = base(SupportCategory::Other, false);
        c.confidence = 1.2;
        assert!(c.validate().is_err());
    }
}
