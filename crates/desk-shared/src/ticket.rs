//! Ticket types for the triage workflow.
//!
//! A ticket is one inbound support item, either a mail message or a
//! backend database row, tracked through the triage lifecycle.

use crate::classification::Classification;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a ticket came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketSource {
    /// Pulled from the mail inbox
    #[default]
    Mail,
    /// Row from the backend ticket database
    Database,
}

impl std::fmt::Display for TicketSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mail => write!(f, "mail"),
            Self::Database => write!(f, "database"),
        }
    }
}

/// Ticket lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Just arrived, not yet triaged
    #[default]
    New,
    /// Being processed
    InProgress,
    /// Being processed, mandatory extraction fields still missing
    InfoMissing,
    /// Being processed, all mandatory fields present
    ReadyToResolve,
    /// Done. Terminal for every automatic path.
    Resolved,
}

impl TicketStatus {
    /// Resolved tickets never re-enter automatic triage or dispatch.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved)
    }

    /// True for the "in progress" dashboard rollup, which folds the two
    /// processing sub-states in with `InProgress`.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            Self::InProgress | Self::InfoMissing | Self::ReadyToResolve
        )
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::InProgress => write!(f, "in_progress"),
            Self::InfoMissing => write!(f, "info_missing"),
            Self::ReadyToResolve => write!(f, "ready_to_resolve"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

/// Attachment descriptor. Bytes are fetched on demand through the mail
/// gateway, never stored on the ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
}

impl Attachment {
    /// Image attachments count as potential payment-proof evidence.
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// One inbound support item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    /// Stable opaque identifier
    pub id: String,
    /// Conversation grouping key
    pub thread_id: String,
    /// Provider wire id of the originating message, used for reply threading
    pub message_id: String,
    #[serde(default)]
    pub source: TicketSource,
    /// Sender address; lowercased form is the customer grouping key
    pub sender: String,
    pub sender_name: String,
    pub subject: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub status: TicketStatus,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Present once the oracle has run for this ticket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    /// Accumulated manual operator notes passed to the oracle as overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_notes: Option<String>,
    /// Exact text transmitted at send time (may differ from the draft)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_reply: Option<String>,
    /// Transient bulk-operation membership flag, not business state
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selected: bool,
}

impl Ticket {
    /// Customer grouping key: sender identity under case-folding.
    pub fn customer_key(&self) -> String {
        self.sender.to_lowercase()
    }

    /// True if any attachment is an image.
    pub fn has_image_attachment(&self) -> bool {
        self.attachments.iter().any(|a| a.is_image())
    }

    /// The oracle's reply draft, if a classification exists.
    pub fn reply_draft(&self) -> Option<&str> {
        self.classification.as_ref().map(|c| c.reply_draft.as_str())
    }

    /// Rolling thread summary carried by this ticket's classification.
    pub fn thread_summary(&self) -> Option<&str> {
        self.classification
            .as_ref()
            .and_then(|c| c.thread_summary.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket() -> Ticket {
        Ticket {
            id: "m1".into(),
            thread_id: "t1".into(),
            message_id: "<msg1@mail>".into(),
            source: TicketSource::Mail,
            sender: "Alex.Jones@gmail.com".into(),
            sender_name: "Alex Jones".into(),
            subject: "My character is not responding".into(),
            body: "It keeps saying rate limit reached.".into(),
            timestamp: Utc::now(),
            is_read: false,
            status: TicketStatus::New,
            attachments: vec![],
            classification: None,
            agent_notes: None,
            sent_reply: None,
            selected: false,
        }
    }

    #[test]
    fn test_customer_key_case_folds() {
        assert_eq!(ticket().customer_key(), "alex.jones@gmail.com");
    }

    #[test]
    fn test_terminal_status() {
        assert!(TicketStatus::Resolved.is_terminal());
        assert!(!TicketStatus::ReadyToResolve.is_terminal());
        assert!(!TicketStatus::New.is_terminal());
    }

    #[test]
    fn test_open_rollup() {
        assert!(TicketStatus::InProgress.is_open());
        assert!(TicketStatus::InfoMissing.is_open());
        assert!(TicketStatus::ReadyToResolve.is_open());
        assert!(!TicketStatus::New.is_open());
        assert!(!TicketStatus::Resolved.is_open());
    }

    #[test]
    fn test_image_attachment_detection() {
        let mut t = ticket();
        assert!(!t.has_image_attachment());
        t.attachments.push(Attachment {
            id: "a1".into(),
            filename: "receipt.png".into(),
            mime_type: "image/png".into(),
            size: 2048,
        });
        assert!(t.has_image_attachment());
    }

    #[test]
    fn test_selected_flag_not_serialized_when_false() {
        let t = ticket();
        let json = serde_json::to_string(&t).unwrap();
        assert!(!json.contains("selected"));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TicketStatus::New.to_string(), "new");
        assert_eq!(TicketStatus::InfoMissing.to_string(), "info_missing");
        assert_eq!(TicketStatus::ReadyToResolve.to_string(), "ready_to_resolve");
    }
}
