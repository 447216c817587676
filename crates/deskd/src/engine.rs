//! Triage engine: one ticket in, a freshly classified ticket out.
//!
//! The engine owns the contract with the classification oracle: it
//! assembles the request (override notes, thread continuity context,
//! template set) and derives the ticket's next lifecycle status from
//! the result. Output validation happens in the oracle client.

use crate::gateway::MailGateway;
use crate::oracle::{ClassificationOracle, ClassifyRequest, ImageInsights};
use desk_shared::{DeskError, TemplateStore, Ticket};
use std::sync::Arc;
use tracing::{debug, info};

/// Manual operator overrides for one classification run.
///
/// Any value supplied here is authoritative: the oracle treats it as
/// present even when the raw ticket text lacks it.
#[derive(Debug, Clone, Default)]
pub struct TriageOverrides {
    pub user_id: Option<String>,
    pub payment_method: Option<String>,
    pub supplement: Option<String>,
}

impl TriageOverrides {
    /// Render the overrides as agent notes, one per line. `None` when
    /// no override was supplied.
    pub fn as_agent_notes(&self) -> Option<String> {
        let mut lines = Vec::new();
        if let Some(uid) = &self.user_id {
            lines.push(format!("[USER ID]: {uid}"));
        }
        if let Some(method) = &self.payment_method {
            lines.push(format!("[PAYMENT METHOD]: {method}"));
        }
        if let Some(extra) = &self.supplement {
            lines.push(format!("[HUMAN SUPPLEMENT]: {extra}"));
        }
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }

    /// Fill gaps from scanned payment evidence. Values the operator
    /// typed stay authoritative; the scan only supplies what is absent.
    pub fn absorb_insights(&mut self, insights: &ImageInsights) {
        if self.user_id.is_none() {
            self.user_id = insights.extracted_uid.clone();
        }
        if self.payment_method.is_none() {
            self.payment_method = insights.extracted_payment_platform.clone();
        }
    }
}

/// Classification orchestrator. Takes the oracle as an injected
/// capability so tests substitute a scripted double.
pub struct TriageEngine {
    oracle: Arc<dyn ClassificationOracle>,
    /// Model override forwarded on every request; the client default
    /// applies when unset
    model: Option<String>,
}

impl TriageEngine {
    pub fn new(oracle: Arc<dyn ClassificationOracle>) -> Self {
        Self { oracle, model: None }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Locate the continuity context: among thread siblings carrying a
    /// rolling summary, the one with the latest timestamp.
    fn previous_summary<'a>(ticket: &Ticket, thread_history: &'a [Ticket]) -> Option<&'a str> {
        thread_history
            .iter()
            .filter(|t| t.thread_id == ticket.thread_id && t.id != ticket.id)
            .filter(|t| t.thread_summary().is_some())
            .max_by_key(|t| t.timestamp)
            .and_then(|t| t.thread_summary())
    }

    /// Scan the ticket's first image attachment for payment evidence.
    ///
    /// Returns `Ok(None)` when the ticket carries no image attachment;
    /// the gateway is not called in that case. The extracted uid and
    /// payment platform are meant to flow back into `TriageOverrides`
    /// via `absorb_insights` before the next classification.
    pub async fn scan_evidence(
        &self,
        ticket: &Ticket,
        gateway: &dyn MailGateway,
    ) -> Result<Option<ImageInsights>, DeskError> {
        let Some(attachment) = ticket.attachments.iter().find(|a| a.is_image()) else {
            return Ok(None);
        };

        let bytes = gateway.fetch_attachment(&ticket.id, &attachment.id).await?;
        let context = format!("Support ticket: {}", ticket.subject);
        let insights = self
            .oracle
            .classify_image(&bytes, &attachment.mime_type, &context)
            .await?;
        info!(
            "evidence scan {}: uid {:?}, platform {:?}",
            ticket.id, insights.extracted_uid, insights.extracted_payment_platform
        );
        Ok(Some(insights))
    }

    /// Classify one ticket and derive its next status.
    ///
    /// On failure the ticket is left untouched (the error is returned,
    /// nothing is written). A `Resolved` ticket passed here is
    /// re-triaged as-is: the bulk path filters terminal tickets before
    /// dispatch, but a direct operator call deliberately may not.
    pub async fn classify(
        &self,
        ticket: &Ticket,
        thread_history: &[Ticket],
        overrides: &TriageOverrides,
        templates: &TemplateStore,
    ) -> Result<Ticket, DeskError> {
        let notes = overrides.as_agent_notes();
        let previous_summary = Self::previous_summary(ticket, thread_history);
        debug!(
            "triage {}: {} override lines, prior context: {}",
            ticket.id,
            notes.as_deref().map(|n| n.lines().count()).unwrap_or(0),
            previous_summary.is_some()
        );

        let request = ClassifyRequest {
            subject: &ticket.subject,
            body: &ticket.body,
            attachments: &ticket.attachments,
            previous_summary,
            agent_notes: notes.as_deref(),
            templates: templates.all(),
            model: self.model.as_deref(),
        };

        let classification = self.oracle.classify(&request).await?;
        let status = classification.derive_status();
        info!(
            "triage {}: {} (confidence {:.2}) -> {}",
            ticket.id, classification.category, classification.confidence, status
        );

        let mut updated = ticket.clone();
        updated.status = status;
        if let Some(n) = notes {
            updated.agent_notes = Some(n);
        }
        updated.classification = Some(classification);
        updated.selected = false;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_notes_one_per_line() {
        let overrides = TriageOverrides {
            user_id: Some("99228811".into()),
            payment_method: Some("Stripe".into()),
            supplement: Some("Receipt verified by phone.".into()),
        };
        let notes = overrides.as_agent_notes().unwrap();
        let lines: Vec<&str> = notes.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "[USER ID]: 99228811");
        assert_eq!(lines[1], "[PAYMENT METHOD]: Stripe");
        assert_eq!(lines[2], "[HUMAN SUPPLEMENT]: Receipt verified by phone.");
    }

    #[test]
    fn test_empty_overrides_yield_no_notes() {
        assert_eq!(TriageOverrides::default().as_agent_notes(), None);
    }

    #[test]
    fn test_insights_fill_gaps_without_clobbering() {
        let insights = ImageInsights {
            summary: "Stripe receipt".into(),
            detected_issues: vec![],
            recommendation: "verify transaction".into(),
            extracted_uid: Some("882731".into()),
            extracted_payment_platform: Some("Stripe".into()),
        };

        let mut overrides = TriageOverrides {
            user_id: Some("99228811".into()),
            payment_method: None,
            supplement: None,
        };
        overrides.absorb_insights(&insights);

        // The operator's uid stays; only the missing method is filled.
        assert_eq!(overrides.user_id.as_deref(), Some("99228811"));
        assert_eq!(overrides.payment_method.as_deref(), Some("Stripe"));
    }
}
